//! Settings normalizer
//!
//! The `{deviceSettings: [...]}` export carries a device inventory and no
//! geographic data. It exists so a settings file in a batch classifies cleanly
//! instead of falling through to Unknown; the inventory size is reported via
//! metadata.

use super::SchemaNormalizer;
use crate::detector::TimelineFormat;
use crate::types::{ParseMetadata, ParsedFile};
use serde::Deserialize;
use serde_json::Value;

/// Normalizer for the device-settings schema
pub struct SettingsNormalizer;

impl SchemaNormalizer for SettingsNormalizer {
    fn format(&self) -> TimelineFormat {
        TimelineFormat::Settings
    }

    fn normalize(&self, document: &Value, source_name: &str) -> ParsedFile {
        let payload: SettingsFile = match serde_json::from_value(document.clone()) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("{source_name}: settings payload rejected: {e}");
                return ParsedFile::empty(self.format().as_str());
            }
        };

        ParsedFile {
            points: Vec::new(),
            paths: Vec::new(),
            metadata: ParseMetadata {
                format: self.format().as_str().to_string(),
                point_count: 0,
                path_count: 0,
                device_count: Some(payload.device_settings.len()),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    device_settings: Vec<DeviceSetting>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
struct DeviceSetting {
    device_tag: Option<i64>,
    device_pretty_name: Option<String>,
    platform_type: Option<String>,
}
