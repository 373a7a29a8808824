// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "outbox")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub destination: String,
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    pub status: i16,
    pub application: String,
    pub media_ref: Option<String>,
    pub inserted_at: ChronoDateTimeWithTimeZone,
    pub sent_at: Option<ChronoDateTimeWithTimeZone>,
    pub from_identity: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
