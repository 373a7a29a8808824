// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体和仓库接口
pub mod domain;

/// 基础设施模块
///
/// 提供外部服务集成，如数据库、发送网关、指标等
pub mod infrastructure;

/// 表示层模块
///
/// 暴露健康检查等运维端点
pub mod presentation;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现出站队列Worker及其动态编排
pub mod workers;
