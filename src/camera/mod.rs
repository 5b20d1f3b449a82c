// Camera inventory: persisted records and the typed writes allowed on them

pub mod devices;
pub mod store;

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::CamwatchError;
use crate::probe::DeviceObservation;

pub use store::InventoryStore;

/// Persisted camera status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CameraStatus {
    Active,
    Disconnected,
    /// Administrative marking only. The reconcile loop never assigns or clears it.
    Error,
}

impl CameraStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraStatus::Active => "ACTIVE",
            CameraStatus::Disconnected => "DISCONNECTED",
            CameraStatus::Error => "ERROR",
        }
    }

    /// Value persisted in the redundant is_connected column
    pub fn is_connected(&self) -> bool {
        matches!(self, CameraStatus::Active)
    }
}

impl fmt::Display for CameraStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CameraStatus {
    type Err = CamwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(CameraStatus::Active),
            "DISCONNECTED" => Ok(CameraStatus::Disconnected),
            "ERROR" => Ok(CameraStatus::Error),
            _ => Err(CamwatchError::InvalidStatus(s.to_string())),
        }
    }
}

impl ToSql for CameraStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CameraStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: CamwatchError| FromSqlError::Other(Box::new(e)))
    }
}

/// A row of the cameras table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRecord {
    pub id: i64,
    pub name: Option<String>,
    pub unique_id: String,
    /// Identity key used for upsert matching
    pub device_id: String,
    pub display_name: Option<String>,
    pub rtsp_url: Option<String>,
    pub backend: Option<String>,
    pub prefer_gst: bool,
    pub is_connected: bool,
    pub created_at: String,
    pub device_path: Option<String>,
    pub status: CameraStatus,
    pub os_index: Option<i64>,
}

/// Partial update applied by identity. `None` leaves the column alone.
///
/// Only the columns the reconcile path owns are representable here, so a
/// reconcile write can never touch display_name, rtsp_url, backend or
/// prefer_gst. `is_connected` is not a field: it is always written from
/// `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraPatch {
    pub name: Option<String>,
    pub os_index: Option<i64>,
    pub device_path: Option<String>,
    pub unique_id: Option<String>,
    pub status: Option<CameraStatus>,
}

impl CameraPatch {
    /// Full refresh from an observation: the device is present right now.
    pub fn observed(obs: &DeviceObservation) -> Self {
        Self {
            name: Some(obs.name.clone()),
            os_index: obs.os_index,
            device_path: Some(obs.identity_key.clone()),
            unique_id: Some(obs.identity_key.clone()),
            status: Some(CameraStatus::Active),
        }
    }

    /// Transition-only write for a device that vanished.
    pub fn disconnected() -> Self {
        Self {
            status: Some(CameraStatus::Disconnected),
            ..Default::default()
        }
    }

    /// Whether this patch carries enough to insert a brand-new row.
    pub fn is_complete(&self) -> bool {
        self.name.is_some() && self.unique_id.is_some() && self.status.is_some()
    }

    /// True when applying this patch to `record` would change nothing.
    pub fn is_noop_for(&self, record: &CameraRecord) -> bool {
        self.name.as_ref().map_or(true, |v| record.name.as_ref() == Some(v))
            && self.os_index.map_or(true, |v| record.os_index == Some(v))
            && self.device_path.as_ref().map_or(true, |v| record.device_path.as_ref() == Some(v))
            && self.unique_id.as_ref().map_or(true, |v| &record.unique_id == v)
            && self.status.map_or(true, |s| {
                record.status == s && record.is_connected == s.is_connected()
            })
    }
}

/// Administrative camera creation (manual records)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCamera {
    pub device_id: String,
    /// Defaults to device_id when omitted
    pub unique_id: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub rtsp_url: Option<String>,
    pub backend: Option<String>,
    pub prefer_gst: bool,
}

/// Administrative update. Unlike `CameraPatch` this may set `ERROR`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraUpdate {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub rtsp_url: Option<String>,
    pub backend: Option<String>,
    pub prefer_gst: Option<bool>,
    pub status: Option<CameraStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_and_case() {
        assert_eq!("active".parse::<CameraStatus>().unwrap(), CameraStatus::Active);
        assert_eq!(" ERROR ".parse::<CameraStatus>().unwrap(), CameraStatus::Error);
        assert!("broken".parse::<CameraStatus>().is_err());
        assert_eq!(CameraStatus::Disconnected.to_string(), "DISCONNECTED");
        assert_eq!(
            serde_json::to_string(&CameraStatus::Active).unwrap(),
            "\"ACTIVE\""
        );
    }

    #[test]
    fn test_only_active_is_connected() {
        assert!(CameraStatus::Active.is_connected());
        assert!(!CameraStatus::Disconnected.is_connected());
        assert!(!CameraStatus::Error.is_connected());
    }

    #[test]
    fn test_patch_completeness() {
        let obs = DeviceObservation {
            identity_key: "/dev/video0".to_string(),
            name: "WebCam".to_string(),
            os_index: Some(0),
        };
        assert!(CameraPatch::observed(&obs).is_complete());
        assert!(!CameraPatch::disconnected().is_complete());
    }
}
