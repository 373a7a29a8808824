// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::outbox::{OutboxMessage, OutboxStatus};
use crate::domain::models::worker_config::APPLICATION_WILDCARD;
use crate::domain::repositories::outbox_repository::{OutboxRepository, RepositoryError};
use crate::infrastructure::database::entities::outbox as outbox_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType},
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Select, TransactionTrait,
};
use std::sync::Arc;

/// 出站队列仓库实现
///
/// 基于SeaORM实现的队列存储层。认领策略按后端方言选择：
/// Postgres走SELECT ... FOR UPDATE SKIP LOCKED，MySQL系走阻塞的
/// SELECT ... FOR UPDATE，SQLite依赖单写者串行化；三者统一汇入
/// 一次条件化的Pending→Claimed更新，输掉竞争则重新扫描。
#[derive(Clone)]
pub struct OutboxRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl OutboxRepositoryImpl {
    /// 创建新的出站队列仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的出站队列仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// 认领扫描的基础查询：匹配过滤器的Pending行，最老的在前
    fn claim_scan(application_filter: &str) -> Select<outbox_entity::Entity> {
        let mut query = outbox_entity::Entity::find()
            .filter(outbox_entity::Column::Status.eq(OutboxStatus::Pending.code()));

        if application_filter != APPLICATION_WILDCARD {
            query = query.filter(outbox_entity::Column::Application.eq(application_filter));
        }

        // FIFO: oldest insertion first, IDs break ties (assigned in insert order)
        query
            .order_by_asc(outbox_entity::Column::InsertedAt)
            .order_by_asc(outbox_entity::Column::Id)
    }

    /// 条件化的Pending→Claimed转换
    ///
    /// 恰好影响一行才算认领成功；影响零行说明在扫描和更新之间
    /// 输给了另一个认领者。
    async fn try_transition_to_claimed<C: ConnectionTrait>(
        conn: &C,
        id: i64,
    ) -> Result<bool, RepositoryError> {
        let result = outbox_entity::Entity::update_many()
            .col_expr(
                outbox_entity::Column::Status,
                Expr::value(OutboxStatus::Claimed.code()),
            )
            .filter(outbox_entity::Column::Id.eq(id))
            .filter(outbox_entity::Column::Status.eq(OutboxStatus::Pending.code()))
            .exec(conn)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// 行锁认领策略（Postgres / MySQL系）
    ///
    /// 在一个事务内完成扫描与状态转换。Postgres用SKIP LOCKED让
    /// 已被其他认领者锁住的行对扫描不可见，竞争不阻塞；MySQL系
    /// 退化为阻塞的SELECT ... FOR UPDATE，认领者在锁上串行但
    /// 依然不会重复认领。
    async fn claim_with_row_locks(
        &self,
        application_filter: &str,
    ) -> Result<Option<OutboxMessage>, RepositoryError> {
        loop {
            let txn = self.db.begin().await?;

            let query = match self.db.get_database_backend() {
                DbBackend::Postgres => Self::claim_scan(application_filter)
                    .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked),
                _ => Self::claim_scan(application_filter).lock(LockType::Update),
            };

            let Some(row) = query.one(&txn).await? else {
                txn.commit().await?;
                return Ok(None);
            };

            let claimed = Self::try_transition_to_claimed(&txn, row.id).await?;
            txn.commit().await?;

            if claimed {
                let mut message = OutboxMessage::from(row);
                message.status = OutboxStatus::Claimed;
                return Ok(Some(message));
            }
            // Lost the row between scan and update; rescan.
        }
    }

    /// 乐观认领策略（SQLite）
    ///
    /// SQLite没有行锁，靠单写者模型加单条条件更新语句保证原子性；
    /// 输掉竞争就重新扫描下一个候选行。
    async fn claim_optimistic(
        &self,
        application_filter: &str,
    ) -> Result<Option<OutboxMessage>, RepositoryError> {
        loop {
            let Some(row) = Self::claim_scan(application_filter)
                .one(self.db.as_ref())
                .await?
            else {
                return Ok(None);
            };

            if Self::try_transition_to_claimed(self.db.as_ref(), row.id).await? {
                let mut message = OutboxMessage::from(row);
                message.status = OutboxStatus::Claimed;
                return Ok(Some(message));
            }
        }
    }
}

impl From<outbox_entity::Model> for OutboxMessage {
    fn from(model: outbox_entity::Model) -> Self {
        Self {
            id: model.id,
            destination: model.destination,
            payload: model.payload,
            application: model.application,
            status: OutboxStatus::from_code(model.status).unwrap_or_default(),
            media_ref: model.media_ref,
            inserted_at: model.inserted_at,
            sent_at: model.sent_at,
            from_identity: model.from_identity,
            last_error: model.last_error,
        }
    }
}

#[async_trait]
impl OutboxRepository for OutboxRepositoryImpl {
    async fn claim_next(
        &self,
        application_filter: &str,
    ) -> Result<Option<OutboxMessage>, RepositoryError> {
        match self.db.get_database_backend() {
            DbBackend::Postgres | DbBackend::MySql => {
                self.claim_with_row_locks(application_filter).await
            }
            _ => self.claim_optimistic(application_filter).await,
        }
    }

    async fn mark_sent(&self, id: i64, identity_used: &str) -> Result<(), RepositoryError> {
        let result = outbox_entity::Entity::update_many()
            .col_expr(
                outbox_entity::Column::Status,
                Expr::value(OutboxStatus::Sent.code()),
            )
            .col_expr(
                outbox_entity::Column::SentAt,
                Expr::value::<Option<DateTime<FixedOffset>>>(Some(Utc::now().into())),
            )
            .col_expr(
                outbox_entity::Column::FromIdentity,
                Expr::value(Some(identity_used.to_string())),
            )
            .filter(outbox_entity::Column::Id.eq(id))
            .filter(outbox_entity::Column::Status.eq(OutboxStatus::Claimed.code()))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected != 1 {
            return Err(RepositoryError::Inconsistent(format!(
                "mark_sent for message {} affected {} rows, expected exactly 1",
                id, result.rows_affected
            )));
        }

        Ok(())
    }

    async fn mark_failed(&self, id: i64, error_text: &str) -> Result<(), RepositoryError> {
        let result = outbox_entity::Entity::update_many()
            .col_expr(
                outbox_entity::Column::Status,
                Expr::value(OutboxStatus::Failed.code()),
            )
            .col_expr(
                outbox_entity::Column::LastError,
                Expr::value(Some(error_text.to_string())),
            )
            .filter(outbox_entity::Column::Id.eq(id))
            .filter(outbox_entity::Column::Status.eq(OutboxStatus::Claimed.code()))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected != 1 {
            return Err(RepositoryError::Inconsistent(format!(
                "mark_failed for message {} affected {} rows, expected exactly 1",
                id, result.rows_affected
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "outbox_repo_impl_test.rs"]
mod tests;
