// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 迁移CLI入口
///
/// `cargo run -p migration -- up` 在部署时手动应用迁移；
/// relayrs 自身也会在启动时应用未完成的迁移。
#[async_std::main]
async fn main() {
    cli::run_cli(migration::Migrator).await;
}
