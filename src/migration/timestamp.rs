//! 时间戳的显式联合类型
//!
//! 历史记录中的时间戳可能是整数，也可能是字符串（数字字符串或日期字符串）。
//! 先按原样解码为 `RawTimestamp`，再统一规范化为整数秒。

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;

use crate::extraction::dates::DateParser;

/// 解码后、规范化前的时间戳
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RawTimestamp {
    #[default]
    Absent,
    Integer(i64),
    RawString(String),
}

/// 时间戳无法规范化
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("时间戳既不是数字也不是可识别的日期: {0:?}")]
pub struct TimestampError(pub String);

impl RawTimestamp {
    /// 规范化为整数秒
    pub fn normalize(&self, dates: &DateParser) -> Result<Option<i64>, TimestampError> {
        match self {
            RawTimestamp::Absent => Ok(None),
            RawTimestamp::Integer(value) => Ok(Some(*value)),
            RawTimestamp::RawString(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                if let Ok(value) = trimmed.parse::<i64>() {
                    return Ok(Some(value));
                }
                dates
                    .parse_epoch(trimmed)
                    .map(Some)
                    .ok_or_else(|| TimestampError(raw.clone()))
            }
        }
    }
}

struct RawTimestampVisitor;

impl<'de> Visitor<'de> for RawTimestampVisitor {
    type Value = RawTimestamp;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an integer, a string, or null")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(RawTimestamp::Integer(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        i64::try_from(value)
            .map(RawTimestamp::Integer)
            .map_err(|_| E::custom(format!("timestamp out of range: {}", value)))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Ok(RawTimestamp::Integer(value as i64))
        } else {
            Err(E::custom(format!("fractional timestamp: {}", value)))
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Ok(RawTimestamp::RawString(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
        Ok(RawTimestamp::RawString(value))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(RawTimestamp::Absent)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(RawTimestamp::Absent)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(RawTimestampVisitor)
    }
}

impl<'de> Deserialize<'de> for RawTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RawTimestampVisitor)
    }
}

/// 目录中的时间戳：接受整数或字符串，统一为十进制字符串
pub fn deserialize_decimal_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Absent => Ok(None),
        RawTimestamp::Integer(value) => Ok(Some(value.to_string())),
        RawTimestamp::RawString(raw) if raw.trim().is_empty() => Ok(None),
        RawTimestamp::RawString(raw) => Ok(Some(raw.trim().to_string())),
    }
}
