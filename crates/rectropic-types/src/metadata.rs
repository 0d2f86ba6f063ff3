//! Typed per-content-type metadata.
//!
//! Each content type accepts a fixed set of keys. Anything else is rejected
//! at parse time, so stored metadata always matches its content's type.

use serde::{Deserialize, Serialize};

use crate::models::ContentType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VideoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UrlMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Serialized untagged: the owning content's `type` field says which
/// variant applies, so deserialization always goes through [`ContentMetadata::from_value`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContentMetadata {
    Image(ImageMetadata),
    Video(VideoMetadata),
    Url(UrlMetadata),
}

impl ContentMetadata {
    pub fn from_value(kind: ContentType, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            ContentType::Image => Self::Image(serde_json::from_value(value)?),
            ContentType::Video => Self::Video(serde_json::from_value(value)?),
            ContentType::Url => Self::Url(serde_json::from_value(value)?),
        })
    }

    pub fn from_json(kind: ContentType, json: &str) -> serde_json::Result<Self> {
        Self::from_value(kind, serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
