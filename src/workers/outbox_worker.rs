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

use crate::config::settings::WorkersSettings;
use crate::domain::models::destination::{self, NormalizationRules};
use crate::domain::models::outbox::{OutboxMessage, OutboxStatus};
use crate::domain::models::worker_config::WorkerConfig;
use crate::domain::repositories::outbox_repository::OutboxRepository;
use crate::infrastructure::gateway::client::SendingGateway;
use crate::workers::webhook_notifier::{OutboxEventData, WebhookNotifier};
use metrics::counter;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// 出站队列Worker实例
///
/// 每个启用的Worker配置对应一个实例。循环认领一条消息、归一化
/// 目标地址、轮询选择发送身份、投递、回写终态，然后按配置的
/// 抖动间隔休眠。取消信号在每轮开始和休眠中检查，绝不打断
/// 进行中的投递。
pub struct OutboxWorker {
    /// 本实例的Worker配置
    config: WorkerConfig,
    /// 出站队列仓库
    outbox: Arc<dyn OutboxRepository>,
    /// 发送网关
    gateway: Arc<dyn SendingGateway>,
    /// 结果回调通知器
    notifier: Arc<WebhookNotifier>,
    /// 目标地址归一化规则
    rules: NormalizationRules,
    /// 发送成功后的礼貌延迟区间（秒）
    post_send_delay: (u64, u64),
    /// 轮询计数器，只在实例生命周期内存在
    rotation: usize,
    /// 停止信号
    stop: watch::Receiver<bool>,
}

impl OutboxWorker {
    /// 创建新的Worker实例
    ///
    /// # 参数
    ///
    /// * `config` - Worker配置
    /// * `outbox` - 出站队列仓库
    /// * `gateway` - 发送网关
    /// * `notifier` - 回调通知器
    /// * `runtime` - Worker运行时配置
    /// * `stop` - 停止信号接收端
    pub fn new(
        config: WorkerConfig,
        outbox: Arc<dyn OutboxRepository>,
        gateway: Arc<dyn SendingGateway>,
        notifier: Arc<WebhookNotifier>,
        runtime: &WorkersSettings,
        stop: watch::Receiver<bool>,
    ) -> Self {
        let rules = NormalizationRules {
            country_code: runtime.country_code.clone(),
            min_digits: runtime.msisdn_min_digits,
            max_digits: runtime.msisdn_max_digits,
            group_suffix: runtime.group_suffix.clone(),
        };

        Self {
            config,
            outbox,
            gateway,
            notifier,
            rules,
            post_send_delay: (runtime.post_send_delay_min, runtime.post_send_delay_max),
            rotation: 0,
            stop,
        }
    }

    /// 运行Worker主循环直到收到停止信号
    pub async fn run(mut self) {
        info!(
            "Worker {} ({}) started: filter={}, kind={}, group={}",
            self.config.id,
            self.config.name,
            self.config.application_filter,
            self.config.message_kind,
            self.config.routing_group
        );

        loop {
            if *self.stop.borrow() {
                break;
            }

            self.process_one().await;

            // A stop may have arrived mid-iteration (e.g. during the
            // courtesy delay); observe it before committing to the
            // configured interval.
            if *self.stop.borrow() {
                break;
            }

            if self.pause().await {
                break;
            }
        }

        info!("Worker {} ({}) stopped", self.config.id, self.config.name);
    }

    /// 执行一轮认领与投递
    async fn process_one(&mut self) {
        let message = match self.outbox.claim_next(&self.config.application_filter).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                debug!("Worker {}: no pending messages", self.config.id);
                return;
            }
            Err(e) => {
                error!("Worker {}: claim failed: {}", self.config.id, e);
                counter!("outbox_claim_errors_total").increment(1);
                return;
            }
        };

        debug!(
            "Worker {} claimed message {} for {}",
            self.config.id, message.id, message.application
        );

        let destination = match destination::normalize(
            &message.destination,
            self.config.message_kind,
            &self.rules,
        ) {
            Ok(normalized) => normalized,
            Err(_) => {
                self.finish_failed(&message, &message.destination, "invalid destination format")
                    .await;
                return;
            }
        };

        let payload = match (&message.media_ref, self.config.allow_media) {
            (Some(media_ref), true) => format!("{}\n{}", message.payload, media_ref),
            (Some(_), false) => {
                self.finish_failed(&message, &destination, "media attachments not allowed")
                    .await;
                return;
            }
            (None, _) => message.payload.clone(),
        };

        let identities = match self.gateway.list_identities(&self.config.routing_group).await {
            Ok(identities) => identities,
            Err(e) => {
                // Pre-dispatch transport failure: the row stays Claimed and
                // will need operator attention if the gateway never recovers.
                warn!(
                    "Worker {}: identity lookup failed, message {} left claimed: {}",
                    self.config.id, message.id, e
                );
                return;
            }
        };

        if identities.is_empty() {
            warn!(
                "Worker {}: no available identities in routing group {}, message {} left claimed",
                self.config.id, self.config.routing_group, message.id
            );
            return;
        }

        let identity = identities[self.rotation % identities.len()].clone();
        self.rotation = self.rotation.wrapping_add(1);

        match self
            .gateway
            .dispatch(&identity, &destination, &payload, self.config.message_kind)
            .await
        {
            Ok(outcome) if outcome.accepted => {
                if let Err(e) = self.outbox.mark_sent(message.id, &identity.handle).await {
                    error!(
                        "Worker {}: mark_sent for message {} failed: {}",
                        self.config.id, message.id, e
                    );
                    return;
                }

                counter!("outbox_messages_sent_total", "worker" => self.config.name.clone())
                    .increment(1);
                self.fire_webhook(OutboxEventData {
                    id: message.id,
                    status: OutboxStatus::Sent.to_string(),
                    destination,
                    identity: Some(identity.handle.clone()),
                    application: message.application.clone(),
                    error: None,
                });

                self.courtesy_delay().await;
            }
            Ok(outcome) => {
                self.finish_failed(&message, &destination, &outcome.provider_message)
                    .await;
            }
            Err(e) => {
                self.finish_failed(&message, &destination, &e.to_string())
                    .await;
            }
        }
    }

    /// 把消息置为Failed并推送结果事件
    async fn finish_failed(&self, message: &OutboxMessage, destination: &str, reason: &str) {
        warn!(
            "Worker {}: message {} failed: {}",
            self.config.id, message.id, reason
        );

        if let Err(e) = self.outbox.mark_failed(message.id, reason).await {
            error!(
                "Worker {}: mark_failed for message {} failed: {}",
                self.config.id, message.id, e
            );
            return;
        }

        counter!("outbox_messages_failed_total", "worker" => self.config.name.clone()).increment(1);
        self.fire_webhook(OutboxEventData {
            id: message.id,
            status: OutboxStatus::Failed.to_string(),
            destination: destination.to_string(),
            identity: None,
            application: message.application.clone(),
            error: Some(reason.to_string()),
        });
    }

    /// 异步推送结果事件，不阻塞下一轮认领
    fn fire_webhook(&self, data: OutboxEventData) {
        let Some(url) = self.config.webhook_url.clone() else {
            return;
        };
        let secret = self.config.webhook_secret.clone();
        let notifier = self.notifier.clone();

        tokio::spawn(async move {
            notifier.notify(&url, secret.as_deref(), &data).await;
        });
    }

    /// 发送成功后的反限流礼貌延迟，与轮间休眠相互独立
    async fn courtesy_delay(&mut self) {
        let (min, max) = self.post_send_delay;
        let secs = if max > min {
            rand::rng().random_range(min..=max)
        } else {
            min
        };
        self.interruptible_sleep(Duration::from_secs(secs)).await;
    }

    /// 轮间休眠：固定间隔，或在区间内均匀抖动
    ///
    /// 返回true表示休眠被停止信号打断。
    async fn pause(&mut self) -> bool {
        let base = u64::from(self.config.interval_seconds);
        let secs = match self.config.interval_max_seconds.map(u64::from) {
            Some(max) if max > base => rand::rng().random_range(base..=max),
            _ => base,
        };
        self.interruptible_sleep(Duration::from_secs(secs)).await
    }

    async fn interruptible_sleep(&mut self, duration: Duration) -> bool {
        // An already-delivered stop was consumed by a previous changed()
        // call; the flag itself stays set, so check it before waiting.
        if *self.stop.borrow() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.stop.changed() => return true,
        }
        *self.stop.borrow()
    }
}

#[cfg(test)]
#[path = "outbox_worker_test.rs"]
mod tests;
