// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::outbox::OutboxMessage;
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 一致性故障：条件更新命中了非预期的行数
    ///
    /// 终态写入必须恰好影响一行；影响零行说明状态机被违反
    /// （例如消息并未处于Claimed状态），按编程故障大声上报。
    #[error("Consistency fault: {0}")]
    Inconsistent(String),
}

/// 出站队列仓库特质
///
/// 队列存储层的完整契约。认领（claim）是唯一的跨进程互斥点：
/// 两个并发调用者绝不会认领到同一行，方言细节不泄漏到本边界之上。
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// 原子认领下一条待处理消息
    ///
    /// 在匹配过滤器的Pending行中选出`inserted_at`最早的一行
    /// （同刻按ID决胜），并原子地转换为Claimed。
    ///
    /// # 参数
    ///
    /// * `application_filter` - application精确匹配值，`*`匹配全部
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(OutboxMessage))` - 已认领的消息
    /// * `Ok(None)` - 没有可认领的消息
    /// * `Err(RepositoryError)` - 存储错误
    async fn claim_next(
        &self,
        application_filter: &str,
    ) -> Result<Option<OutboxMessage>, RepositoryError>;

    /// 将已认领的消息标记为已发送
    ///
    /// 条件更新（仅Claimed行），必须恰好影响一行
    async fn mark_sent(&self, id: i64, identity_used: &str) -> Result<(), RepositoryError>;

    /// 将已认领的消息标记为失败
    ///
    /// 条件更新（仅Claimed行），必须恰好影响一行
    async fn mark_failed(&self, id: i64, error_text: &str) -> Result<(), RepositoryError>;
}
