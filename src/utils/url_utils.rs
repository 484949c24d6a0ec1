// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 提取URL的主机键，用于按主机限速
///
/// 主机名转换为小写；无主机的URL（如data:）返回None
pub fn host_key(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
