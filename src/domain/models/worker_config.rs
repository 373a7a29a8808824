// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 应用过滤器的通配值，匹配所有application
pub const APPLICATION_WILDCARD: &str = "*";

/// Worker配置实体
///
/// 一条持久化的路由策略。配置仅由外部管理端写入，Worker侧只读；
/// 被禁用或删除的配置会在下一次对账（reconciliation）时停止其
/// 对应的存活Worker实例。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// 配置唯一标识符
    pub id: i64,
    /// 所属操作者ID
    pub owner_id: String,
    /// 配置名称
    pub name: String,
    /// 路由组（circle），决定哪些发送身份可用
    pub routing_group: String,
    /// 本Worker负责消费的application值，`*`匹配全部
    pub application_filter: String,
    /// 消息种类，决定收件人归一化规则
    pub message_kind: MessageKind,
    /// 基础休眠间隔（秒）
    pub interval_seconds: u32,
    /// 抖动休眠的上界（秒），可选；大于基础间隔时启用均匀随机休眠
    pub interval_max_seconds: Option<u32>,
    /// 软开关，仅在对账时生效
    pub enabled: bool,
    /// 是否允许投递带附件引用的消息
    pub allow_media: bool,
    /// 结果回调URL，可选
    pub webhook_url: Option<String>,
    /// 回调签名密钥，可选
    pub webhook_secret: Option<String>,
    /// 配置最后更新时间
    pub updated_at: DateTime<FixedOffset>,
}

impl WorkerConfig {
    /// 判断两份配置的有效参数是否一致
    ///
    /// 有效参数发生变化的存活Worker会被停止并以新配置重启；
    /// 单纯的 `updated_at` 变化不会触发重启。
    pub fn effective_eq(&self, other: &WorkerConfig) -> bool {
        self.routing_group == other.routing_group
            && self.application_filter == other.application_filter
            && self.message_kind == other.message_kind
            && self.interval_seconds == other.interval_seconds
            && self.interval_max_seconds == other.interval_max_seconds
            && self.allow_media == other.allow_media
            && self.webhook_url == other.webhook_url
            && self.webhook_secret == other.webhook_secret
    }

    /// 判断过滤器是否为通配
    pub fn matches_all_applications(&self) -> bool {
        self.application_filter == APPLICATION_WILDCARD
    }
}

/// 消息种类枚举
///
/// 决定收件人归一化规则：Direct走号码归一化，Group走群组后缀补全。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// 点对点消息
    #[default]
    Direct,
    /// 群组消息
    Group,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MessageKind::Direct => write!(f, "direct"),
            MessageKind::Group => write!(f, "group"),
        }
    }
}

impl FromStr for MessageKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(MessageKind::Direct),
            "group" => Ok(MessageKind::Group),
            _ => Err(()),
        }
    }
}
