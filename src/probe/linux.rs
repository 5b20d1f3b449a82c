// Linux enumeration: /dev/video* handles described by v4l2-ctl

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use super::command::run_checked;
use super::identity::{os_index_from_path, path_identity};
use super::{DeviceObservation, Observations};
use crate::error::{CamwatchError, Result};

/// List video capture handles in `dir`, ordered by their numeric suffix.
pub fn list_video_devices(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut devices: Vec<(i64, PathBuf)> = std::fs::read_dir(dir)?
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            os_index_from_path(&path).map(|idx| (idx, path))
        })
        .collect();

    devices.sort_by_key(|(idx, _)| *idx);
    Ok(devices.into_iter().map(|(_, p)| p).collect())
}

fn card_type_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Card type\s*:\s*(.*)").ok()).as_ref()
}

/// Pull the "Card type" line out of `v4l2-ctl --info` output.
pub fn parse_card_type(info: &str) -> Option<String> {
    card_type_re()?
        .captures(info)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Ask v4l2-ctl for a device's human-readable name.
pub fn query_device_name(v4l2_ctl: &Path, device: &Path, timeout: Duration) -> Result<String> {
    let mut cmd = Command::new(v4l2_ctl);
    cmd.arg("-d").arg(device).arg("--info");

    let info = run_checked(cmd, timeout)?;
    Ok(parse_card_type(&info)
        .unwrap_or_else(|| format!("Unknown Camera ({})", device.display())))
}

/// Build observations for `paths`, naming each through `query`.
/// A device whose query fails (or panics) is skipped; the rest still report.
pub fn enumerate_video_paths<F>(paths: &[PathBuf], query: F) -> Observations
where
    F: Fn(&Path) -> Result<String>,
{
    let mut observations = Observations::new();

    for path in paths {
        let result = catch_unwind(AssertUnwindSafe(|| -> Result<DeviceObservation> {
            let name = query(path)?;
            let os_index = os_index_from_path(path).ok_or_else(|| {
                CamwatchError::Probe(format!("{} has no numeric index", path.display()))
            })?;
            Ok(DeviceObservation {
                identity_key: path_identity(path),
                name,
                os_index: Some(os_index),
            })
        }));

        match result {
            Ok(Ok(obs)) => {
                observations.insert(obs.identity_key.clone(), obs);
            }
            Ok(Err(e)) => log::debug!("Skipping {}: {}", path.display(), e),
            Err(_) => log::warn!("Probe of {} panicked (skipped)", path.display()),
        }
    }

    observations
}

/// Enumerate video devices under `dev_dir` using the given v4l2-ctl binary.
pub fn enumerate(dev_dir: &Path, v4l2_ctl: &Path, timeout: Duration) -> Observations {
    let paths = match list_video_devices(dev_dir) {
        Ok(p) => p,
        Err(e) => {
            log::debug!("Cannot list {}: {}", dev_dir.display(), e);
            return Observations::new();
        }
    };

    enumerate_video_paths(&paths, |device| query_device_name(v4l2_ctl, device, timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_INFO: &str = "Driver Info:\n\
        \tDriver name      : uvcvideo\n\
        \tCard type        : HD Pro Webcam C920\n\
        \tBus info         : usb-0000:00:14.0-1\n";

    #[test]
    fn test_parse_card_type() {
        assert_eq!(parse_card_type(SAMPLE_INFO).as_deref(), Some("HD Pro Webcam C920"));
        assert_eq!(parse_card_type("Driver name : uvcvideo\n"), None);
        assert_eq!(parse_card_type("Card type :   \n"), None);
    }

    #[test]
    fn test_list_video_devices_filters_and_sorts() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["video10", "video2", "video0", "sda", "video-loop", "media0"] {
            std::fs::write(tmp.path().join(name), "").unwrap();
        }

        let devices = list_video_devices(tmp.path()).unwrap();
        let names: Vec<_> = devices
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["video0", "video2", "video10"]);
    }

    #[test]
    fn test_missing_dir_enumerates_nothing() {
        let obs = enumerate(
            Path::new("/nonexistent/camwatch/dev"),
            Path::new("v4l2-ctl"),
            Duration::from_secs(1),
        );
        assert!(obs.is_empty());
    }

    #[test]
    fn test_failing_device_is_skipped() {
        let paths: Vec<PathBuf> = ["/dev/video0", "/dev/video1", "/dev/video2"]
            .iter()
            .map(PathBuf::from)
            .collect();

        let obs = enumerate_video_paths(&paths, |p| {
            if p.ends_with("video1") {
                Err(CamwatchError::Probe("timed out".to_string()))
            } else {
                Ok(format!("Cam {}", p.display()))
            }
        });

        assert_eq!(obs.len(), 2);
        assert!(obs.contains_key("/dev/video0"));
        assert!(obs.contains_key("/dev/video2"));
        assert_eq!(obs["/dev/video2"].os_index, Some(2));
        assert_eq!(obs["/dev/video0"].name, "Cam /dev/video0");
    }

    #[test]
    fn test_panicking_device_is_skipped() {
        let paths = vec![PathBuf::from("/dev/video0"), PathBuf::from("/dev/video1")];
        let obs = enumerate_video_paths(&paths, |p| {
            if p.ends_with("video0") {
                panic!("driver blew up");
            }
            Ok("Cam".to_string())
        });
        assert_eq!(obs.keys().collect::<Vec<_>>(), vec!["/dev/video1"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_query_without_card_type_falls_back() {
        // echo exits 0 and prints its arguments, which carry no Card type line
        let name = query_device_name(Path::new("echo"), Path::new("/dev/video4"), Duration::from_secs(5)).unwrap();
        assert_eq!(name, "Unknown Camera (/dev/video4)");
    }

    #[cfg(unix)]
    #[test]
    fn test_query_failure_is_error() {
        let err = query_device_name(Path::new("false"), Path::new("/dev/video0"), Duration::from_secs(5));
        assert!(err.is_err());
    }
}
