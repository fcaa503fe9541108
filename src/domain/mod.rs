// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：任务、文档、内容与来源配置
/// - 仓库接口（repositories）：下游存储抽象接口
/// - 服务（services）：分类、提取与指标收集
///
/// 领域层是系统的核心，不依赖于任何外部实现，
/// 体现了纯粹的业务逻辑和业务规则。
pub mod models;
pub mod repositories;
pub mod services;
