// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::worker_config::WorkerConfig;
use crate::domain::repositories::outbox_repository::RepositoryError;
use async_trait::async_trait;

/// Worker配置仓库特质
///
/// 配置只读。Manager在每轮对账时通过`list_enabled`拉取全量
/// 启用配置；拉取失败时本轮对账被整体跳过。
#[async_trait]
pub trait WorkerConfigRepository: Send + Sync {
    /// 列出所有启用的Worker配置
    async fn list_enabled(&self) -> Result<Vec<WorkerConfig>, RepositoryError>;
}
