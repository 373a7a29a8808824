// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod outbox_repo_impl;
pub mod worker_config_repo_impl;
