use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Number, Value};
use teloxide::utils::markdown;
use tracing::{debug, error, warn};

/// Raw readings below this are considered wet.
pub const WET_THRESHOLD: f64 = 400.0;
/// Full-scale value of the moisture sensor ADC.
pub const SENSOR_FULL_SCALE: f64 = 1024.0;

pub const FETCH_FAILED: &str = "Failed to fetch irrigation status.";
pub const UNEXPECTED_FORMAT: &str = "Unexpected irrigation status format.";

/// Source of the raw `sensor name -> reading` JSON document.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self) -> Result<Value>;
}

/// HTTP client for the irrigation controller's status endpoint
pub struct IrrigationClient {
    client: reqwest::Client,
    status_url: String,
}

impl IrrigationClient {
    pub fn new(status_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            status_url,
        }
    }
}

#[async_trait]
impl StatusSource for IrrigationClient {
    async fn fetch_status(&self) -> Result<Value> {
        debug!("Fetching irrigation status from {}", self.status_url);

        let response = self
            .client
            .get(&self.status_url)
            .send()
            .await
            .context("Failed to reach irrigation API")?
            .error_for_status()
            .context("Irrigation API returned an error status")?;

        response
            .json()
            .await
            .context("Failed to parse irrigation API response")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Moisture {
    Wet,
    Dry,
}

impl Moisture {
    pub fn classify(moisture: f64) -> Self {
        if moisture < WET_THRESHOLD {
            Moisture::Wet
        } else {
            Moisture::Dry
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Moisture::Wet => "wet",
            Moisture::Dry => "dry",
        }
    }
}

/// Derived view of a single sensor reading
#[derive(Debug, Clone, PartialEq)]
pub struct SensorStatus {
    pub moisture: Number,
    pub percentage: i64,
    pub condition: Moisture,
}

impl SensorStatus {
    pub fn from_moisture(moisture: Number) -> Option<Self> {
        let value = moisture.as_f64()?;
        Some(Self {
            percentage: moisture_percentage(value),
            condition: Moisture::classify(value),
            moisture,
        })
    }

    fn to_json(&self) -> Value {
        json!({
            "moisture": self.moisture,
            "moisture_percentage": format!("{}%", self.percentage),
            "status": self.condition.as_str(),
        })
    }
}

/// Share of full scale, truncated toward zero.
pub fn moisture_percentage(moisture: f64) -> i64 {
    (moisture / SENSOR_FULL_SCALE * 100.0) as i64
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusReport {
    Snapshot(BTreeMap<String, SensorStatus>),
    Unavailable(String),
}

impl StatusReport {
    pub fn from_json(raw: &Value) -> Self {
        let Some(sensors) = raw.as_object() else {
            warn!("Irrigation API returned a non-object document");
            return StatusReport::Unavailable(UNEXPECTED_FORMAT.to_string());
        };

        let mut snapshot = BTreeMap::new();
        for (name, reading) in sensors {
            let moisture = reading.get("moisture").and_then(|m| match m {
                Value::Number(n) => Some(n.clone()),
                _ => None,
            });
            match moisture.and_then(SensorStatus::from_moisture) {
                Some(status) => {
                    snapshot.insert(name.clone(), status);
                }
                None => warn!("Sensor '{}' has no numeric moisture reading, skipping", name),
            }
        }

        StatusReport::Snapshot(snapshot)
    }

    pub fn to_json(&self) -> Value {
        match self {
            StatusReport::Snapshot(sensors) => {
                let map: Map<String, Value> = sensors
                    .iter()
                    .map(|(name, status)| (name.clone(), status.to_json()))
                    .collect();
                Value::Object(map)
            }
            StatusReport::Unavailable(message) => json!({ "error": message }),
        }
    }

    /// MarkdownV2 message with the report in a fenced `json` block.
    pub fn render(&self) -> String {
        let body = format!("{:#}", self.to_json());
        format!(
            "Irrigation Status\n{}",
            markdown::code_block_with_lang(&body, "json")
        )
    }
}

/// Fetch and derive the report; a failed fetch becomes `Unavailable`.
pub async fn fetch_report(source: &dyn StatusSource) -> StatusReport {
    match source.fetch_status().await {
        Ok(raw) => StatusReport::from_json(&raw),
        Err(e) => {
            error!("Error fetching irrigation status: {:#}", e);
            StatusReport::Unavailable(FETCH_FAILED.to_string())
        }
    }
}

/// Fixed summary sent by the status broadcast command.
pub fn broadcast_summary() -> String {
    let summary = json!({
        "status": "Active",
        "last_run": "2023-10-01 12:00:00",
        "next_run": "2023-10-01 18:00:00",
    });
    format!(
        "📢 *Current Irrigation Status \\(Broadcast\\):*\n{}",
        markdown::code_block_with_lang(&format!("{:#}", summary), "json")
    )
}
