/// Utility functions for formatting and value conversion
use time::macros::format_description;
use time::OffsetDateTime;

/// Fallback model label for tag-type codes missing from `TAG_MODELS`.
pub const UNKNOWN_MODEL: &str = "Unknown";

/// Tag-type code reported by the tag manager -> friendly model name.
const TAG_MODELS: &[(i64, &str)] = &[
    (12, "MotionSensor"),
    (13, "MotionHTU"),
    (21, "MotionV2"),
    (26, "LightSensor"),
    (32, "WaterSensor"),
    (33, "SoilSensor"),
    (42, "OutdoorProbe"),
    (52, "ReedHTU"),
    (53, "Reed"),
    (62, "Thermostat"),
    (72, "PIR"),
    (82, "WeMo"),
    (92, "Camera"),
];

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(format).unwrap_or_else(|_| dt.to_string())
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Resolve a tag-type code to its model name, `Unknown` when unmapped or absent.
pub fn model_name(tag_type: Option<i64>) -> &'static str {
    tag_type
        .and_then(|code| {
            TAG_MODELS
                .iter()
                .find(|(known, _)| *known == code)
                .map(|(_, name)| *name)
        })
        .unwrap_or(UNKNOWN_MODEL)
}

/// Split a comma-separated setting into trimmed, non-empty entries.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
