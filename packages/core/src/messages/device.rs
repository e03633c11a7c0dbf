//! Request bodies of the reader device HTTP API.

use serde::{Deserialize, Serialize};

/// State of a single digital-output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpoState {
    High,
    Low,
}

/// One line assignment in a `PUT device/gpos` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpoConfiguration {
    pub gpo: u8,
    pub state: GpoState,
}

/// Body of `PUT device/gpos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpoConfigRequest {
    pub gpo_configurations: Vec<GpoConfiguration>,
}

impl GpoConfigRequest {
    /// Assigns one state to every listed line.
    #[must_use]
    pub fn uniform(lines: &[u8], state: GpoState) -> Self {
        Self {
            gpo_configurations: lines
                .iter()
                .map(|&gpo| GpoConfiguration { gpo, state })
                .collect(),
        }
    }
}

/// Device-side bus configuration (`GET`/`PUT mqtt`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMqttConfig {
    pub enabled: bool,
    pub broker_url: String,
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub topic_root: String,
    pub retain_messages: bool,
    pub quality_of_service: u8,
    pub tags: TagReportConfig,
    pub connection: DeviceConnectionConfig,
}

impl DeviceMqttConfig {
    /// The tag-report configuration pushed to readers so they publish
    /// JSON reads on the `impinj` topic root: QoS 1, antenna port and
    /// RSSI fields included, and a 0.2 s tag-age filter so reads arrive
    /// promptly.
    #[must_use]
    pub fn tag_report(broker_url: &str, username: &str, password: &str) -> Self {
        Self {
            enabled: true,
            broker_url: broker_url.to_string(),
            client_id: "impinj".to_string(),
            username: username.to_string(),
            password: password.to_string(),
            topic_root: "impinj".to_string(),
            retain_messages: false,
            quality_of_service: 1,
            tags: TagReportConfig::default(),
            connection: DeviceConnectionConfig::default(),
        }
    }
}

/// Tag-report section of the device bus configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagReportConfig {
    pub enabled: bool,
    pub format: String,
    pub include_all_rssi: bool,
    pub include_antenna_port: bool,
    pub include_peak_rssi: bool,
    pub include_phase: bool,
    pub include_seen_count: bool,
    pub include_doppler_frequency: bool,
    pub include_channel: bool,
    pub report_filter: ReportFilter,
}

impl Default for TagReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: "json".to_string(),
            include_all_rssi: true,
            include_antenna_port: true,
            include_peak_rssi: true,
            include_phase: true,
            include_seen_count: true,
            include_doppler_frequency: true,
            include_channel: true,
            report_filter: ReportFilter::default(),
        }
    }
}

/// Report filter controlling how often a lingering tag is re-reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    pub tag_age_interval_seconds: f64,
    pub min_seen_count: u32,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self {
            tag_age_interval_seconds: 0.2,
            min_seen_count: 1,
        }
    }
}

/// Device-side bus connection tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConnectionConfig {
    pub keep_alive_seconds: u32,
    pub reconnect_delay_seconds: u32,
    pub timeout_seconds: u32,
}

impl Default for DeviceConnectionConfig {
    fn default() -> Self {
        Self {
            keep_alive_seconds: 30,
            reconnect_delay_seconds: 5,
            timeout_seconds: 60,
        }
    }
}
