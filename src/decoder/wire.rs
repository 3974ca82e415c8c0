//! Serde shapes of the JSON news API.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct WireEnvelope {
    #[serde(alias = "articles", alias = "data")]
    pub items: Vec<WireArticle>,
    #[serde(default, alias = "nextCursor", alias = "cursor")]
    pub next_cursor: Option<WireScalar>,
    #[serde(default)]
    pub offset: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct WireArticle {
    #[serde(alias = "newsId")]
    pub id: Option<WireScalar>,
    pub title: Option<String>,
    pub summary: Option<String>,
    #[serde(alias = "thumbnailUrl", alias = "thumbnail")]
    pub image_url: Option<String>,
    #[serde(alias = "publishedAt")]
    pub publish_time: Option<WireScalar>,
    #[serde(alias = "section")]
    pub category: Option<String>,
    pub position: Option<u64>,
    pub read_count: Option<WireScalar>,
}

/// Fields the backend sends as either a string or a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum WireScalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl WireScalar {
    pub fn into_text(self) -> String {
        match self {
            WireScalar::Text(s) => s,
            WireScalar::Integer(n) => n.to_string(),
            WireScalar::Float(n) => n.to_string(),
        }
    }

    /// Read counts arrive as integers or numeric strings.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            WireScalar::Text(s) => s.trim().parse().ok(),
            WireScalar::Integer(n) => u64::try_from(*n).ok(),
            WireScalar::Float(n) if *n >= 0.0 => Some(*n as u64),
            WireScalar::Float(_) => None,
        }
    }

    /// RFC 3339, `YYYY-MM-DD HH:MM:SS` in UTC, or epoch milliseconds.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            WireScalar::Text(s) => parse_timestamp(s.trim()),
            WireScalar::Integer(ms) => Utc.timestamp_millis_opt(*ms).single(),
            WireScalar::Float(_) => None,
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
        .or_else(|| {
            s.parse::<i64>()
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        })
}
