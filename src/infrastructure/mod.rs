// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod database;
pub mod gateway;
pub mod metrics;
pub mod repositories;
