// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::WorkersSettings;
use crate::domain::models::worker_config::WorkerConfig;
use crate::domain::repositories::outbox_repository::OutboxRepository;
use crate::domain::repositories::worker_config_repository::WorkerConfigRepository;
use crate::infrastructure::gateway::client::SendingGateway;
use crate::workers::outbox_worker::OutboxWorker;
use crate::workers::webhook_notifier::WebhookNotifier;
use metrics::gauge;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// 一个存活的Worker实例及其控制句柄
struct LiveWorker {
    /// 实例启动时使用的配置
    config: WorkerConfig,
    /// 停止信号发送端
    stop: watch::Sender<bool>,
    /// 实例任务句柄
    handle: JoinHandle<()>,
}

/// 工作管理器
///
/// 周期性地把存活Worker实例集合对账到配置表的启用集合：新配置
/// 启动实例，有效参数变化的实例停止后用新配置重启（不支持原地
/// 换参数），被禁用或删除的实例停止并移除。配置拉取失败时跳过
/// 本轮，存活实例继续用最后一次成功的配置运行。
pub struct WorkerManager {
    /// Worker配置仓库
    configs: Arc<dyn WorkerConfigRepository>,
    /// 出站队列仓库
    outbox: Arc<dyn OutboxRepository>,
    /// 发送网关
    gateway: Arc<dyn SendingGateway>,
    /// 结果回调通知器
    notifier: Arc<WebhookNotifier>,
    /// Worker运行时配置
    runtime: WorkersSettings,
    /// 按配置ID索引的存活实例
    live: HashMap<i64, LiveWorker>,
}

impl WorkerManager {
    /// 创建新的工作管理器
    pub fn new(
        configs: Arc<dyn WorkerConfigRepository>,
        outbox: Arc<dyn OutboxRepository>,
        gateway: Arc<dyn SendingGateway>,
        notifier: Arc<WebhookNotifier>,
        runtime: WorkersSettings,
    ) -> Self {
        Self {
            configs,
            outbox,
            gateway,
            notifier,
            runtime,
            live: HashMap::new(),
        }
    }

    /// 执行一轮对账
    pub async fn reconcile(&mut self) {
        let fetched = match self.configs.list_enabled().await {
            Ok(configs) => configs
                .into_iter()
                .map(|c| (c.id, c))
                .collect::<HashMap<_, _>>(),
            Err(e) => {
                // Availability over freshness: keep running with the
                // last-known-good worker set.
                warn!("Config fetch failed, skipping reconciliation pass: {}", e);
                return;
            }
        };

        let mut to_stop = Vec::new();
        for (id, live) in &self.live {
            match fetched.get(id) {
                None => {
                    info!("Worker {} disabled or removed, stopping", id);
                    to_stop.push(*id);
                }
                Some(config) if !config.effective_eq(&live.config) => {
                    info!("Worker {} config changed, restarting", id);
                    to_stop.push(*id);
                }
                Some(_) => {}
            }
        }

        for id in to_stop {
            self.stop_worker(id).await;
        }

        for (id, config) in fetched {
            if !self.live.contains_key(&id) {
                self.start_worker(config);
            }
        }

        gauge!("outbox_workers_live").set(self.live.len() as f64);
    }

    /// 运行对账循环直到收到进程级关闭信号
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.reconcile().await;

        let mut ticker = tokio::time::interval(Duration::from_secs(self.runtime.reconcile_interval));
        // The first tick of an interval fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.reconcile().await,
                _ = shutdown.changed() => break,
            }
        }

        self.shutdown().await;
    }

    /// 停止全部存活实例并等待它们退出
    ///
    /// 先向所有实例广播停止信号，再逐个等待退出，停止过程是
    /// 并发的而不是串行的信号-等待。
    pub async fn shutdown(&mut self) {
        info!("Stopping {} workers...", self.live.len());

        for live in self.live.values() {
            let _ = live.stop.send(true);
        }
        for (id, live) in self.live.drain() {
            if let Err(e) = live.handle.await {
                error!("Worker {} exited abnormally: {}", id, e);
            }
        }

        gauge!("outbox_workers_live").set(0.0);
        info!("All workers stopped");
    }

    /// 当前存活实例的配置ID，升序
    pub fn live_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.live.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn start_worker(&mut self, config: WorkerConfig) {
        info!("Starting worker {} ({})", config.id, config.name);
        let (stop, stop_rx) = watch::channel(false);
        let worker = OutboxWorker::new(
            config.clone(),
            self.outbox.clone(),
            self.gateway.clone(),
            self.notifier.clone(),
            &self.runtime,
            stop_rx,
        );
        let handle = tokio::spawn(worker.run());
        self.live.insert(
            config.id,
            LiveWorker {
                config,
                stop,
                handle,
            },
        );
    }

    async fn stop_worker(&mut self, id: i64) {
        if let Some(live) = self.live.remove(&id) {
            let _ = live.stop.send(true);
            if let Err(e) = live.handle.await {
                error!("Worker {} exited abnormally: {}", id, e);
            }
        }
    }

    #[cfg(test)]
    fn live_config(&self, id: i64) -> Option<&WorkerConfig> {
        self.live.get(&id).map(|live| &live.config)
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
