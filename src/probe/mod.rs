// Device presence probing
//
// Best-effort by contract: enumerate() never fails. A device that cannot be
// queried is left out of the result, and an unsupported platform yields an
// empty map.

pub mod command;
pub mod identity;
pub mod index;
pub mod linux;

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::constants::{DEFAULT_INDEX_PROBE_LIMIT, DEFAULT_PROBE_TIMEOUT_SECS};

/// A device seen in the current cycle. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceObservation {
    pub identity_key: String,
    pub name: String,
    pub os_index: Option<i64>,
}

/// Observations keyed by identity; inserting a duplicate key keeps the last one.
pub type Observations = BTreeMap<String, DeviceObservation>;

pub trait DeviceEnumerator {
    fn enumerate(&self) -> Observations;
}

/// Probes the host this process runs on.
#[derive(Debug, Clone)]
pub struct SystemEnumerator {
    pub probe_timeout: Duration,
    pub index_probe_limit: u32,
    pub v4l2_ctl: PathBuf,
}

impl Default for SystemEnumerator {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
            index_probe_limit: DEFAULT_INDEX_PROBE_LIMIT,
            v4l2_ctl: crate::tools::v4l2_ctl_path(),
        }
    }
}

impl SystemEnumerator {
    pub fn from_config(config: &Config) -> Self {
        Self {
            probe_timeout: config.probe_timeout(),
            index_probe_limit: config.index_probe_limit,
            v4l2_ctl: config.v4l2_ctl(),
        }
    }

    #[cfg(target_os = "linux")]
    fn enumerate_platform(&self) -> Observations {
        linux::enumerate(
            std::path::Path::new(crate::constants::VIDEO_DEVICE_DIR),
            &self.v4l2_ctl,
            self.probe_timeout,
        )
    }

    #[cfg(any(target_os = "windows", target_os = "macos"))]
    fn enumerate_platform(&self) -> Observations {
        let listing = index::CameraListing::query(self.probe_timeout).unwrap_or_else(|e| {
            log::debug!("Camera listing failed: {}", e);
            index::CameraListing::default()
        });
        index::probe_indices(&index::CaptureProber::new(listing), self.index_probe_limit)
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    fn enumerate_platform(&self) -> Observations {
        Observations::new()
    }
}

impl DeviceEnumerator for SystemEnumerator {
    fn enumerate(&self) -> Observations {
        catch_unwind(AssertUnwindSafe(|| self.enumerate_platform())).unwrap_or_else(|_| {
            log::error!("Device enumeration panicked; reporting no devices this cycle");
            Observations::new()
        })
    }
}

/// Fixed observation set, for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticEnumerator(pub Observations);

impl StaticEnumerator {
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = DeviceObservation>,
    {
        Self(
            observations
                .into_iter()
                .map(|o| (o.identity_key.clone(), o))
                .collect(),
        )
    }
}

impl DeviceEnumerator for StaticEnumerator {
    fn enumerate(&self) -> Observations {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(key: &str, name: &str) -> DeviceObservation {
        DeviceObservation {
            identity_key: key.to_string(),
            name: name.to_string(),
            os_index: None,
        }
    }

    #[test]
    fn test_duplicate_keys_last_one_wins() {
        let e = StaticEnumerator::from_observations(vec![
            obs("/dev/video0", "First"),
            obs("/dev/video0", "Second"),
        ]);
        let found = e.enumerate();
        assert_eq!(found.len(), 1);
        assert_eq!(found["/dev/video0"].name, "Second");
    }

    #[test]
    fn test_system_enumerator_never_panics() {
        let e = SystemEnumerator {
            probe_timeout: Duration::from_millis(500),
            index_probe_limit: 2,
            v4l2_ctl: PathBuf::from("/nonexistent/camwatch/v4l2-ctl"),
        };
        // Whatever the host has, a missing tool means every device is skipped
        let found = e.enumerate();
        assert!(found.values().all(|o| !o.identity_key.starts_with("/dev/video")));
    }
}
