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

use crate::config::settings::DatabaseSettings;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

/// 创建数据库连接池
///
/// 池由全部Worker实例与Manager的对账循环共享。每个Worker一轮
/// 最多占用一个连接（认领与终态写入串行），所以池上限跟随
/// 预期的Worker数量而不是请求吞吐。
///
/// # 参数
///
/// * `settings` - 数据库配置
///
/// # 返回值
///
/// * `Ok(DatabaseConnection)` - 数据库连接池
/// * `Err(DbErr)` - 连接过程中出现的错误
pub async fn create_pool(settings: &DatabaseSettings) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(settings.url.to_owned());

    options
        .max_connections(settings.max_connections.unwrap_or(20))
        .min_connections(settings.min_connections.unwrap_or(2))
        .max_lifetime(Duration::from_secs(3600))
        .sqlx_logging(true);

    if let Some(secs) = settings.connect_timeout {
        options
            .connect_timeout(Duration::from_secs(secs))
            .acquire_timeout(Duration::from_secs(secs));
    }

    if let Some(secs) = settings.idle_timeout {
        options.idle_timeout(Duration::from_secs(secs));
    }

    Database::connect(options).await
}
