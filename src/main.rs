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

use migration::{Migrator, MigratorTrait};
use relayrs::config::settings::Settings;
use relayrs::domain::repositories::outbox_repository::OutboxRepository;
use relayrs::domain::repositories::worker_config_repository::WorkerConfigRepository;
use relayrs::infrastructure::database::connection;
use relayrs::infrastructure::gateway::client::{HttpGatewayClient, SendingGateway};
use relayrs::infrastructure::repositories::outbox_repo_impl::OutboxRepositoryImpl;
use relayrs::infrastructure::repositories::worker_config_repo_impl::WorkerConfigRepositoryImpl;
use relayrs::presentation::routes;
use relayrs::utils::telemetry;
use relayrs::workers::manager::WorkerManager;
use relayrs::workers::webhook_notifier::WebhookNotifier;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting relayrs...");

    // Initialize Prometheus Metrics
    relayrs::infrastructure::metrics::init_metrics();

    // 2. Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded");

    // 3. Connect to database
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Database connection established");

    // Run database migrations
    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Initialize Components
    let outbox_repo: Arc<dyn OutboxRepository> = Arc::new(OutboxRepositoryImpl::new(db.clone()));
    let config_repo: Arc<dyn WorkerConfigRepository> =
        Arc::new(WorkerConfigRepositoryImpl::new(db.clone()));
    let gateway: Arc<dyn SendingGateway> = Arc::new(HttpGatewayClient::new(&settings.gateway)?);
    let notifier = Arc::new(WebhookNotifier::new(&settings.webhook)?);

    // 5. Start the Worker Manager
    let manager = WorkerManager::new(
        config_repo,
        outbox_repo,
        gateway,
        notifier,
        settings.workers.clone(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let manager_handle = tokio::spawn(manager.run(shutdown_rx));

    // 6. Start HTTP server
    let app = routes::routes();
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // 7. Stop workers and wait for them to finish in-flight iterations
    let _ = shutdown_tx.send(true);
    manager_handle.await?;

    info!("relayrs stopped");
    Ok(())
}
