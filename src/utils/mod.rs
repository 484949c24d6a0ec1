// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 取消令牌
pub mod cancel;
/// 指标导出
pub mod metrics;
/// 日志初始化
pub mod telemetry;
/// URL工具函数
pub mod url_utils;
