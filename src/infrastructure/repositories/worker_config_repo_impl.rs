// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::worker_config::WorkerConfig;
use crate::domain::repositories::outbox_repository::RepositoryError;
use crate::domain::repositories::worker_config_repository::WorkerConfigRepository;
use crate::infrastructure::database::entities::worker_config as config_entity;
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;

/// Worker配置仓库实现
#[derive(Clone)]
pub struct WorkerConfigRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl WorkerConfigRepositoryImpl {
    /// 创建新的Worker配置仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的Worker配置仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<config_entity::Model> for WorkerConfig {
    fn from(model: config_entity::Model) -> Self {
        Self {
            id: model.id,
            owner_id: model.owner_id,
            name: model.name,
            routing_group: model.routing_group,
            application_filter: model.application_filter,
            message_kind: model.message_kind.parse().unwrap_or_default(),
            interval_seconds: model.interval_seconds.max(0) as u32,
            interval_max_seconds: model.interval_max_seconds.map(|v| v.max(0) as u32),
            enabled: model.enabled,
            allow_media: model.allow_media,
            webhook_url: model.webhook_url,
            webhook_secret: model.webhook_secret,
            updated_at: model.updated_at,
        }
    }
}

#[async_trait]
impl WorkerConfigRepository for WorkerConfigRepositoryImpl {
    async fn list_enabled(&self) -> Result<Vec<WorkerConfig>, RepositoryError> {
        let models = config_entity::Entity::find()
            .filter(config_entity::Column::Enabled.eq(true))
            .order_by_asc(config_entity::Column::Id)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(WorkerConfig::from).collect())
    }
}

#[cfg(test)]
#[path = "worker_config_repo_impl_test.rs"]
mod tests;
