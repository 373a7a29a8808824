// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 发送身份实体
///
/// 路由组内一个可用的发送凭据。由Gateway返回，按路由组
/// 做短TTL缓存，多个Worker只读共享。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendingIdentity {
    /// 身份唯一标识符
    pub id: String,
    /// 对外句柄（号码或账号名）
    pub handle: String,
    /// 是否可用
    pub available: bool,
    /// 所属路由组
    pub routing_group: String,
}
