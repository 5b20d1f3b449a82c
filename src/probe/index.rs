// Index-probe enumeration for platforms without stable device paths
//
// Indices 0..limit are tried in turn; each one that opens as a video source
// becomes an "Index_<n>" observation and is released straight away. The OS
// camera listing is only a source of display names: it is taken once per
// scan through the bounded command runner with stderr discarded.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use serde_json::Value;

use super::identity::index_identity;
use super::{DeviceObservation, Observations};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Absent,
    Present { name: Option<String> },
}

/// Attempts to open one capture index.
pub trait IndexProber {
    fn probe(&self, index: u32) -> Result<ProbeOutcome>;
}

/// Probe indices `0..limit`. Errors and panics on one index skip only that index.
pub fn probe_indices(prober: &dyn IndexProber, limit: u32) -> Observations {
    let mut observations = Observations::new();

    for index in 0..limit {
        match catch_unwind(AssertUnwindSafe(|| prober.probe(index))) {
            Ok(Ok(ProbeOutcome::Present { name })) => {
                let identity_key = index_identity(index);
                observations.insert(identity_key.clone(), DeviceObservation {
                    identity_key,
                    name: name.unwrap_or_else(|| format!("Camera Index {}", index)),
                    os_index: Some(index as i64),
                });
            }
            Ok(Ok(ProbeOutcome::Absent)) => {}
            Ok(Err(e)) => log::debug!("Skipping camera index {}: {}", index, e),
            Err(_) => log::warn!("Probe of camera index {} panicked (skipped)", index),
        }
    }

    observations
}

/// Camera names as the OS lists them. Positions are advisory only: the
/// listing order need not match the capture backend's index order.
#[derive(Debug, Clone, Default)]
pub struct CameraListing {
    names: Vec<String>,
}

impl CameraListing {
    pub fn from_names(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Listed name at `index`, if any
    pub fn name(&self, index: u32) -> Option<&str> {
        self.names
            .get(index as usize)
            .map(String::as_str)
            .filter(|n| !n.is_empty())
    }

    /// Query the platform camera list.
    pub fn query(timeout: Duration) -> Result<Self> {
        #[cfg(target_os = "macos")]
        {
            query_macos(timeout)
        }
        #[cfg(target_os = "windows")]
        {
            query_windows(timeout)
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            let _ = timeout;
            Ok(Self::default())
        }
    }
}

/// Prefer the capture backend's own device name, then the OS listing.
pub fn pick_name(backend_name: &str, listing: &CameraListing, index: u32) -> Option<String> {
    let backend_name = backend_name.trim();
    if !backend_name.is_empty() {
        return Some(backend_name.to_string());
    }
    listing.name(index).map(str::to_string)
}

/// Opens each index through the native capture backend and releases it.
#[cfg(any(target_os = "windows", target_os = "macos"))]
pub struct CaptureProber {
    listing: CameraListing,
}

#[cfg(any(target_os = "windows", target_os = "macos"))]
impl CaptureProber {
    pub fn new(listing: CameraListing) -> Self {
        request_camera_access();
        Self { listing }
    }
}

/// Capture opens fail until the user grants camera access.
#[cfg(target_os = "macos")]
fn request_camera_access() {
    if !nokhwa::nokhwa_check() {
        nokhwa::nokhwa_initialize(|granted| {
            log::info!("Camera access {}", if granted { "granted" } else { "denied" });
        });
    }
}

#[cfg(target_os = "windows")]
fn request_camera_access() {}

#[cfg(any(target_os = "windows", target_os = "macos"))]
impl IndexProber for CaptureProber {
    fn probe(&self, index: u32) -> Result<ProbeOutcome> {
        use nokhwa::pixel_format::RgbFormat;
        use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
        use nokhwa::Camera;

        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let mut camera = match Camera::new(CameraIndex::Index(index), format) {
            Ok(camera) => camera,
            Err(e) => {
                log::trace!("Camera index {} did not open: {}", index, e);
                return Ok(ProbeOutcome::Absent);
            }
        };

        if let Err(e) = camera.open_stream() {
            log::trace!("Camera index {} has no stream: {}", index, e);
            return Ok(ProbeOutcome::Absent);
        }

        let name = pick_name(&camera.info().human_name(), &self.listing, index);

        if let Err(e) = camera.stop_stream() {
            log::debug!("Failed to release camera index {}: {}", index, e);
        }

        Ok(ProbeOutcome::Present { name })
    }
}

#[cfg(target_os = "macos")]
fn query_macos(timeout: Duration) -> Result<CameraListing> {
    let mut cmd = std::process::Command::new("system_profiler");
    cmd.args(["SPCameraDataType", "-json"]);
    let stdout = super::command::run_checked(cmd, timeout)?;
    Ok(CameraListing::from_names(parse_system_profiler_json(&stdout)?))
}

#[cfg(target_os = "windows")]
fn query_windows(timeout: Duration) -> Result<CameraListing> {
    let mut cmd = std::process::Command::new("powershell");
    cmd.args([
        "-NoProfile", "-NonInteractive", "-Command",
        "Get-CimInstance Win32_PnPEntity | Where-Object { $_.PNPClass -eq 'Camera' } | Select-Object -ExpandProperty Name",
    ]);
    let stdout = super::command::run_checked(cmd, timeout)?;
    Ok(CameraListing::from_names(parse_name_lines(&stdout)))
}

/// Names from `system_profiler SPCameraDataType -json`.
pub fn parse_system_profiler_json(json: &str) -> Result<Vec<String>> {
    let root: Value = serde_json::from_str(json)?;
    let names = root
        .get("SPCameraDataType")
        .and_then(Value::as_array)
        .map(|cams| {
            cams.iter()
                .map(|cam| {
                    cam.get("_name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(names)
}

/// One device name per non-blank line (PowerShell -ExpandProperty output).
pub fn parse_name_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CamwatchError;

    struct ScriptedProber;

    impl IndexProber for ScriptedProber {
        fn probe(&self, index: u32) -> Result<ProbeOutcome> {
            match index {
                0 => Ok(ProbeOutcome::Present { name: None }),
                1 => Err(CamwatchError::Probe("device busy".to_string())),
                2 => panic!("native capture library crashed"),
                3 => Ok(ProbeOutcome::Present { name: Some("USB Cam".to_string()) }),
                _ => Ok(ProbeOutcome::Absent),
            }
        }
    }

    #[test]
    fn test_probe_indices_isolates_failures() {
        let obs = probe_indices(&ScriptedProber, 10);
        assert_eq!(obs.len(), 2);
        assert_eq!(obs["Index_0"].name, "Camera Index 0");
        assert_eq!(obs["Index_0"].os_index, Some(0));
        assert_eq!(obs["Index_3"].name, "USB Cam");
    }

    #[test]
    fn test_probe_indices_respects_limit() {
        let obs = probe_indices(&ScriptedProber, 1);
        assert_eq!(obs.keys().collect::<Vec<_>>(), vec!["Index_0"]);
        assert!(probe_indices(&ScriptedProber, 0).is_empty());
    }

    #[test]
    fn test_listing_names_by_position() {
        let listing = CameraListing::from_names(vec!["FaceTime HD Camera".to_string(), String::new()]);
        assert_eq!(listing.name(0), Some("FaceTime HD Camera"));
        assert_eq!(listing.name(1), None);
        assert_eq!(listing.name(7), None);
    }

    #[test]
    fn test_backend_name_wins_over_listing() {
        let listing = CameraListing::from_names(vec!["Listed Cam".to_string()]);
        assert_eq!(pick_name("  Logitech BRIO ", &listing, 0).as_deref(), Some("Logitech BRIO"));
        assert_eq!(pick_name("", &listing, 0).as_deref(), Some("Listed Cam"));
        assert_eq!(pick_name("", &listing, 3), None);
    }

    #[test]
    fn test_parse_system_profiler_json() {
        let json = r#"{ "SPCameraDataType": [
            { "_name": "FaceTime HD Camera", "spcamera_model-id": "UVC Camera VendorID_1452" },
            { "_name": "Logitech BRIO" }
        ] }"#;
        assert_eq!(
            parse_system_profiler_json(json).unwrap(),
            vec!["FaceTime HD Camera", "Logitech BRIO"]
        );
        assert!(parse_system_profiler_json("{}").unwrap().is_empty());
        assert!(parse_system_profiler_json("not json").is_err());
    }

    #[test]
    fn test_parse_name_lines() {
        let out = "Integrated Webcam\r\n\r\n  USB2.0 HD UVC WebCam  \r\n";
        assert_eq!(parse_name_lines(out), vec!["Integrated Webcam", "USB2.0 HD UVC WebCam"]);
    }
}
