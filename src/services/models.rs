//! Wire types exchanged with the management service.
//!
//! Timestamps are ISO 8601. The service sometimes omits the UTC offset, so
//! incoming dates accept both `2024-05-01T10:00:00Z` and `2024-05-01T10:00:00.123`
//! (read as UTC).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One `name=value` pair of a log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogProperty {
    pub name: String,
    pub value: String,
}

/// A log record of interest, forwarded as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(with = "iso_datetime")]
    pub event_date: DateTime<Utc>,
    pub source: String,
    pub properties: Vec<LogProperty>,
}

/// Snapshot of the host, serialized as a JSON document inside a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VitalsEvent {
    pub vitals: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerCommandStatus {
    Canceled,
    Completed,
    Pending,
    Rejected,
    Requested,
}

/// A command queued by a user for execution on this host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerCommand {
    pub id: Uuid,
    #[serde(with = "iso_datetime")]
    pub create_date: DateTime<Utc>,
    pub channel_id: String,
    pub server_id: Uuid,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub user_id: Uuid,
    pub channel_name: String,
    pub server_name: String,
    pub user_name: String,
    pub query: String,
    pub command: String,
    pub status: ServerCommandStatus,
    #[serde(default)]
    pub notification_url: Option<String>,
}

/// Outcome of one executed [`ServerCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerCommandResult {
    #[serde(with = "iso_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "iso_datetime")]
    pub end_date: DateTime<Utc>,
    /// Run time in seconds.
    pub total_time: f64,
    pub exit_code: i32,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

mod iso_datetime {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| D::Error::custom(format!("invalid timestamp `{raw}`: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PENDING: &str = r#"{
        "id": "6f1c1f5e-9a43-4a4e-8d0a-1d3f3c2b9e11",
        "create_date": "2024-05-01T10:00:00.250",
        "channel_id": "C042",
        "server_id": "0b9a0c0e-2f7d-4d55-9a52-7a1f5d0f6c33",
        "user_id": "2c7e1a55-5b1e-4c1f-8f6a-3d2b1a0f9e44",
        "channel_name": "ops",
        "server_name": "web-01",
        "user_name": "dana",
        "query": "disk usage?",
        "command": "df -h",
        "status": "pending",
        "notification_url": null
    }"#;

    #[test]
    fn server_command_accepts_naive_timestamps() {
        let cmd: ServerCommand = serde_json::from_str(PENDING).unwrap();
        assert_eq!(cmd.status, ServerCommandStatus::Pending);
        assert_eq!(cmd.command, "df -h");
        assert_eq!(cmd.thread_id, None);
        assert_eq!(cmd.create_date.to_rfc3339(), "2024-05-01T10:00:00.250+00:00");
    }

    #[test]
    fn result_serializes_dates_as_iso8601() {
        let start = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let result = ServerCommandResult {
            start_date: start,
            end_date: start + chrono::Duration::milliseconds(1500),
            total_time: 1.5,
            exit_code: 0,
            stdout: Some("ok\n".into()),
            stderr: None,
        };
        let json: serde_json::Value = serde_json::to_value(&result).unwrap();
        assert_eq!(json["start_date"], "2024-05-01T10:00:00.000000Z");
        assert_eq!(json["end_date"], "2024-05-01T10:00:01.500000Z");
        assert_eq!(json["stderr"], serde_json::Value::Null);
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let raw = PENDING.replace("2024-05-01T10:00:00.250", "yesterday");
        assert!(serde_json::from_str::<ServerCommand>(&raw).is_err());
    }
}
