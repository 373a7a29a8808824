// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::worker_config::MessageKind;
use thiserror::Error;

/// 收件人归一化错误类型
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DestinationError {
    /// 收件人格式无效
    #[error("invalid destination format")]
    InvalidFormat,
}

/// 收件人归一化规则
///
/// Direct消息的国家码改写与长度范围、Group消息的域名后缀
/// 均来自配置，而不是写死在代码里。
#[derive(Debug, Clone)]
pub struct NormalizationRules {
    /// 国家码，用于改写国内长途前缀（如 0812... → 62812...）
    pub country_code: String,
    /// 归一化后号码允许的最少位数
    pub min_digits: usize,
    /// 归一化后号码允许的最多位数
    pub max_digits: usize,
    /// 群组消息的域名后缀（如 @g.us）
    pub group_suffix: String,
}

impl Default for NormalizationRules {
    fn default() -> Self {
        Self {
            country_code: "62".to_string(),
            min_digits: 10,
            max_digits: 15,
            group_suffix: "@g.us".to_string(),
        }
    }
}

/// 归一化收件人标识
///
/// 归一化是幂等的：对已归一化的值再次归一化得到相同结果。
///
/// # 参数
///
/// * `raw` - 原始收件人标识
/// * `kind` - 消息种类
/// * `rules` - 归一化规则
///
/// # 返回值
///
/// * `Ok(String)` - 归一化后的收件人
/// * `Err(DestinationError)` - 收件人无效，消息应立即标记为失败
pub fn normalize(
    raw: &str,
    kind: MessageKind,
    rules: &NormalizationRules,
) -> Result<String, DestinationError> {
    match kind {
        MessageKind::Group => normalize_group(raw, rules),
        MessageKind::Direct => normalize_direct(raw, rules),
    }
}

/// 群组收件人：缺少域名式后缀时补全
fn normalize_group(raw: &str, rules: &NormalizationRules) -> Result<String, DestinationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DestinationError::InvalidFormat);
    }

    if trimmed.contains('@') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}{}", trimmed, rules.group_suffix))
    }
}

/// 点对点收件人：剥离非数字字符，改写国内长途前缀，校验国家码与长度
fn normalize_direct(raw: &str, rules: &NormalizationRules) -> Result<String, DestinationError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(DestinationError::InvalidFormat);
    }

    let normalized = if let Some(rest) = digits.strip_prefix('0') {
        format!("{}{}", rules.country_code, rest)
    } else {
        digits
    };

    if !normalized.starts_with(&rules.country_code) {
        return Err(DestinationError::InvalidFormat);
    }

    if normalized.len() < rules.min_digits || normalized.len() > rules.max_digits {
        return Err(DestinationError::InvalidFormat);
    }

    Ok(normalized)
}

#[cfg(test)]
#[path = "destination_test.rs"]
mod tests;
