//! Human-readable size, duration and count formatting
//!
//! Sizes use binary multiples throughout: `KB` and `KiB` both mean 1024 bytes.
//! The downloader prints either form depending on the source, and progress
//! ratios only need both sides of a comparison normalised the same way.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;
const TIB: u64 = 1024 * GIB;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid size format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),
}

/// Bytes per unit for a size suffix (`B`, `K`/`KB`/`KiB`, ... up to `T`).
///
/// Matching is case-insensitive. Returns `None` for unknown suffixes.
pub fn unit_multiplier(unit: &str) -> Option<u64> {
    match unit.trim().to_ascii_uppercase().as_str() {
        "B" => Some(1),
        "K" | "KB" | "KIB" => Some(KIB),
        "M" | "MB" | "MIB" => Some(MIB),
        "G" | "GB" | "GIB" => Some(GIB),
        "T" | "TB" | "TIB" => Some(TIB),
        _ => None,
    }
}

/// Normalise a fractional size such as `5.2` + `MiB` into bytes.
pub fn scaled_bytes(value: &str, unit: &str) -> Option<f64> {
    let number: f64 = value.trim().replace(',', "").parse().ok()?;
    if !number.is_finite() || number < 0.0 {
        return None;
    }
    Some(number * unit_multiplier(unit)? as f64)
}

/// Byte size wrapper with human-readable parsing, used for config limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn as_usize(&self) -> usize {
        usize::try_from(self.0).unwrap_or(usize::MAX)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ByteSizeVisitor;

        impl serde::de::Visitor<'_> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte size as string (e.g., \"64KB\", \"1MB\") or integer")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteSize(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom("byte size must not be negative"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<ByteSize>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if let Ok(num) = s.parse::<u64>() {
            return Ok(ByteSize(num));
        }

        let Some(pos) = s.find(|c: char| !c.is_ascii_digit()) else {
            return Err(ParseError::InvalidFormat(s.to_string()));
        };
        let (num_str, unit) = s.split_at(pos);
        if num_str.is_empty() {
            return Err(ParseError::InvalidFormat(s.to_string()));
        }

        let num: u64 = num_str.parse()?;
        let multiplier =
            unit_multiplier(unit).ok_or_else(|| ParseError::InvalidUnit(unit.to_string()))?;

        Ok(ByteSize(num.saturating_mul(multiplier)))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_file_size(Some(self.0)))
    }
}

/// `512 B`, `1.5 KB`, `10.0 MB`, `2.3 GB`; `Unknown size` when absent.
pub fn format_file_size(bytes: Option<u64>) -> String {
    let Some(size) = bytes else {
        return "Unknown size".to_string();
    };

    if size < KIB {
        format!("{size} B")
    } else if size < MIB {
        format!("{:.1} KB", size as f64 / KIB as f64)
    } else if size < GIB {
        format!("{:.1} MB", size as f64 / MIB as f64)
    } else {
        format!("{:.1} GB", size as f64 / GIB as f64)
    }
}

/// `H:MM:SS` when at least an hour long, `M:SS` otherwise.
pub fn format_duration(seconds: Option<u64>) -> String {
    let Some(total) = seconds else {
        return "Unknown duration".to_string();
    };

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

pub fn format_views(views: Option<u64>) -> String {
    let Some(views) = views else {
        return "Unknown views".to_string();
    };

    if views >= 1_000_000_000 {
        format!("{:.1}B views", views as f64 / 1_000_000_000.0)
    } else if views >= 1_000_000 {
        format!("{:.1}M views", views as f64 / 1_000_000.0)
    } else if views >= 1_000 {
        format!("{:.1}K views", views as f64 / 1_000.0)
    } else {
        format!("{views} views")
    }
}

/// `YYYYMMDD` becomes `YYYY-MM-DD`; anything else is passed through untouched.
pub fn format_upload_date(raw: Option<&str>) -> String {
    match raw {
        None => "Unknown date".to_string(),
        Some(date) if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) => {
            format!("{}-{}-{}", &date[0..4], &date[4..6], &date[6..8])
        }
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_multiplier_treats_binary_and_decimal_alike() {
        assert_eq!(unit_multiplier("KiB"), Some(1024));
        assert_eq!(unit_multiplier("KB"), Some(1024));
        assert_eq!(unit_multiplier("mib"), Some(1024 * 1024));
        assert_eq!(unit_multiplier("GB"), Some(1024 * 1024 * 1024));
        assert_eq!(unit_multiplier("B"), Some(1));
        assert_eq!(unit_multiplier("XB"), None);
    }

    #[test]
    fn test_scaled_bytes() {
        assert_eq!(scaled_bytes("5.5", "KiB"), Some(5632.0));
        assert_eq!(scaled_bytes("1,024", "B"), Some(1024.0));
        assert_eq!(scaled_bytes("abc", "MiB"), None);
        assert_eq!(scaled_bytes("1.0", "parsecs"), None);
    }

    #[test]
    fn test_parse_byte_size() {
        assert_eq!("1024".parse::<ByteSize>().unwrap().as_u64(), 1024);
        assert_eq!("64KB".parse::<ByteSize>().unwrap().as_u64(), 64 * 1024);
        assert_eq!("5MiB".parse::<ByteSize>().unwrap().as_u64(), 5 * 1024 * 1024);
        assert!("MB".parse::<ByteSize>().is_err());
        assert!("5XB".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_deserialize_string_and_number() {
        #[derive(Deserialize)]
        struct Limits {
            size: ByteSize,
        }
        let parsed: Limits = serde_json::from_str(r#"{"size": "10MB"}"#).unwrap();
        assert_eq!(parsed.size.as_u64(), 10 * 1024 * 1024);

        let parsed: Limits = serde_json::from_str(r#"{"size": 2048}"#).unwrap();
        assert_eq!(parsed.size.as_u64(), 2048);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(Some(512)), "512 B");
        assert_eq!(format_file_size(Some(1536)), "1.5 KB");
        assert_eq!(format_file_size(Some(10 * 1024 * 1024)), "10.0 MB");
        assert_eq!(format_file_size(Some(3 * 1024 * 1024 * 1024)), "3.0 GB");
        assert_eq!(format_file_size(None), "Unknown size");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Some(59)), "0:59");
        assert_eq!(format_duration(Some(212)), "3:32");
        assert_eq!(format_duration(Some(3723)), "1:02:03");
        assert_eq!(format_duration(None), "Unknown duration");
    }

    #[test]
    fn test_format_views() {
        assert_eq!(format_views(Some(999)), "999 views");
        assert_eq!(format_views(Some(1_500)), "1.5K views");
        assert_eq!(format_views(Some(2_340_000)), "2.3M views");
        assert_eq!(format_views(Some(7_000_000_000)), "7.0B views");
        assert_eq!(format_views(None), "Unknown views");
    }

    #[test]
    fn test_format_upload_date() {
        assert_eq!(format_upload_date(Some("20240501")), "2024-05-01");
        assert_eq!(format_upload_date(Some("2024")), "2024");
        assert_eq!(format_upload_date(None), "Unknown date");
    }
}
