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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含数据库、网关、Worker运行时、Webhook和服务器等所有配置项
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 发送网关配置
    pub gateway: GatewaySettings,
    /// Worker运行时配置
    pub workers: WorkersSettings,
    /// Webhook配置
    pub webhook: WebhookSettings,
    /// 服务器配置
    pub server: ServerSettings,
}

/// 数据库配置设置
#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 发送网关配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// 网关API基础URL
    pub base_url: String,
    /// 登录用户名
    pub username: String,
    /// 登录密码
    pub password: String,
    /// 访问令牌的过期安全边际（秒），进入边际即触发刷新
    pub token_expiry_margin: u64,
    /// 发送身份缓存TTL（秒）
    pub identity_cache_ttl: u64,
    /// HTTP请求超时时间（秒）
    pub request_timeout: u64,
}

/// Worker运行时配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkersSettings {
    /// 对账间隔（秒）
    pub reconcile_interval: u64,
    /// 号码归一化的国家码
    pub country_code: String,
    /// 归一化后号码的最少位数
    pub msisdn_min_digits: usize,
    /// 归一化后号码的最多位数
    pub msisdn_max_digits: usize,
    /// 群组消息的域名后缀
    pub group_suffix: String,
    /// 发送成功后的礼貌延迟下界（秒）
    pub post_send_delay_min: u64,
    /// 发送成功后的礼貌延迟上界（秒）
    pub post_send_delay_max: u64,
}

/// Webhook配置设置
#[derive(Debug, Deserialize)]
pub struct WebhookSettings {
    /// 回调投递超时时间（秒）
    pub timeout_seconds: u64,
}

/// 服务器配置设置
#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Start with default settings
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Default DB pool settings, sized for worker count rather than
            // request throughput
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 2)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Default Gateway settings
            .set_default("gateway.token_expiry_margin", 30)?
            .set_default("gateway.identity_cache_ttl", 60)?
            .set_default("gateway.request_timeout", 15)?
            // Default Worker runtime settings
            .set_default("workers.reconcile_interval", 30)?
            .set_default("workers.country_code", "62")?
            .set_default("workers.msisdn_min_digits", 10)?
            .set_default("workers.msisdn_max_digits", 15)?
            .set_default("workers.group_suffix", "@g.us")?
            .set_default("workers.post_send_delay_min", 1)?
            .set_default("workers.post_send_delay_max", 3)?
            // Default Webhook settings
            .set_default("webhook.timeout_seconds", 10)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("RELAYRS").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
