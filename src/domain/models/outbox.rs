// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 出站消息实体
///
/// 表示出站队列（outbox）中的一条待投递消息。消息由外部生产者
/// 以 Pending 状态写入，由 Worker 通过原子认领（claim）独占获取，
/// 并且只会被认领它的 Worker 写入终态（Sent/Failed）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// 消息唯一标识符，插入时单调分配，用于FIFO排序的决胜键
    pub id: i64,
    /// 原始收件人标识（号码或群组ID），在归一化之前不可信
    pub destination: String,
    /// 消息正文
    pub payload: String,
    /// 逻辑租户/应用标签，用于在多个Worker之间划分队列
    pub application: String,
    /// 消息状态，跟踪消息在其生命周期中的当前阶段
    pub status: OutboxStatus,
    /// 附件引用（URL），可选
    pub media_ref: Option<String>,
    /// 入队时间，FIFO排序键
    pub inserted_at: DateTime<FixedOffset>,
    /// 投递成功时间
    pub sent_at: Option<DateTime<FixedOffset>>,
    /// 实际执行投递的发送身份
    pub from_identity: Option<String>,
    /// 最后一次失败的错误描述
    pub last_error: Option<String>,
}

/// 出站消息状态枚举
///
/// 状态转换遵循以下流程，且永不回退：
/// Pending → Claimed → Sent/Failed
///
/// 同一时刻最多只有一个Worker持有处于Claimed状态的行；
/// Claimed只能由认领该行的Worker通过终态写入离开。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// 待处理，消息已入队但尚未被认领
    #[default]
    Pending,
    /// 已发送，消息已成功投递
    Sent,
    /// 已失败，投递被终态拒绝或目标无效
    Failed,
    /// 已认领，某个Worker正在独占处理该消息
    Claimed,
}

impl OutboxStatus {
    /// 数据库中持久化的数值编码
    pub fn code(self) -> i16 {
        match self {
            OutboxStatus::Pending => 0,
            OutboxStatus::Sent => 1,
            OutboxStatus::Failed => 2,
            OutboxStatus::Claimed => 3,
        }
    }

    /// 从数值编码还原状态
    ///
    /// # 返回值
    ///
    /// * `Some(OutboxStatus)` - 合法编码
    /// * `None` - 未知编码
    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(OutboxStatus::Pending),
            1 => Some(OutboxStatus::Sent),
            2 => Some(OutboxStatus::Failed),
            3 => Some(OutboxStatus::Claimed),
            _ => None,
        }
    }

    /// 判断状态是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, OutboxStatus::Sent | OutboxStatus::Failed)
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutboxStatus::Pending => write!(f, "pending"),
            OutboxStatus::Sent => write!(f, "sent"),
            OutboxStatus::Failed => write!(f, "failed"),
            OutboxStatus::Claimed => write!(f, "claimed"),
        }
    }
}
