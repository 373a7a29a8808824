// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    let addr: SocketAddr = "0.0.0.0:9000".parse().expect("Invalid metrics address");

    // Ignore error if address is already in use (for development/testing)
    if let Err(e) = builder.with_http_listener(addr).install() {
        tracing::warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_counter!(
        "outbox_messages_sent_total",
        "Messages accepted by the provider, labelled by worker"
    );
    describe_counter!(
        "outbox_messages_failed_total",
        "Messages that ended in Failed, labelled by worker"
    );
    describe_counter!(
        "outbox_claim_errors_total",
        "Queue claim attempts that hit a database error"
    );
    describe_gauge!(
        "outbox_workers_live",
        "Worker instances currently running under the manager"
    );

    info!("Metrics exporter listening on {}", addr);
}
