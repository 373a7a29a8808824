// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::WebhookSettings;
use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// 一条消息的处理结果，作为回调事件的data负载
#[derive(Debug, Clone, Serialize)]
pub struct OutboxEventData {
    /// 消息ID
    pub id: i64,
    /// 终态（sent或failed）
    pub status: String,
    /// 归一化后的目标地址
    pub destination: String,
    /// 实际使用的发送身份，失败时可能为空
    pub identity: Option<String>,
    /// 来源应用
    pub application: String,
    /// 失败原因，成功时为空
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutboxEvent<'a> {
    event: &'static str,
    timestamp: String,
    data: &'a OutboxEventData,
}

/// 处理结果回调通知器
///
/// 消息到达终态后向Worker配置的URL推送一次事件。投递是
/// 尽力而为的：失败只记日志，不重试也不影响消息本身的终态。
pub struct WebhookNotifier {
    /// HTTP 客户端
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// 创建新的回调通知器
    ///
    /// # 返回值
    ///
    /// * `Ok(WebhookNotifier)` - 新的通知器实例
    /// * `Err` - HTTP客户端构建失败，配置的投递超时无法生效
    pub fn new(settings: &WebhookSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()?;

        Ok(Self { client })
    }

    /// 对请求体字节生成十六进制HMAC-SHA256签名
    fn generate_signature(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    /// 推送一条处理结果事件，失败只记日志
    pub async fn notify(&self, url: &str, secret: Option<&str>, data: &OutboxEventData) {
        match self.deliver(url, secret, data).await {
            Ok(()) => debug!("Webhook for message {} delivered to {}", data.id, url),
            Err(e) => warn!("Webhook for message {} failed: {}", data.id, e),
        }
    }

    async fn deliver(&self, url: &str, secret: Option<&str>, data: &OutboxEventData) -> Result<()> {
        let event = OutboxEvent {
            event: "outbox.processed",
            timestamp: chrono::Utc::now().to_rfc3339(),
            data,
        };
        // The signature covers the exact bytes on the wire, so the body is
        // serialized once and sent as-is.
        let body = serde_json::to_vec(&event)?;

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json");

        if let Some(secret) = secret {
            request = request.header("X-Signature", Self::generate_signature(secret, &body));
        }

        let response = request.body(body).send().await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(anyhow!(
                "Webhook delivery failed with status {}: {}",
                status,
                text
            ))
        }
    }
}

#[cfg(test)]
#[path = "webhook_notifier_test.rs"]
mod tests;
