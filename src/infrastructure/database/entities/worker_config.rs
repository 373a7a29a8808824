// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "worker_configs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub owner_id: String,
    pub name: String,
    pub routing_group: String,
    pub application_filter: String,
    pub message_kind: String,
    pub interval_seconds: i32,
    pub interval_max_seconds: Option<i32>,
    pub enabled: bool,
    pub allow_media: bool,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub updated_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
