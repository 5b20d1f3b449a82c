// External tool resolver for the device probes
//
// Resolution order:
// 1) Environment variable override (CAMWATCH_V4L2CTL_PATH)
// 2) Binary next to the executable, or in its bin/ subdirectory
// 3) PATH fallback

use std::env;
use std::path::PathBuf;

use crate::constants::ENV_V4L2CTL_PATH;

/// Get the directory containing the current executable
fn exe_dir() -> Option<PathBuf> {
    env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
}

/// Resolve a tool path, preferring an existing override.
fn resolve_tool(env_key: &str, default_name: &str) -> PathBuf {
    if let Ok(v) = env::var(env_key) {
        let p = PathBuf::from(&v);
        if p.exists() {
            return p;
        }
    }

    let mut filename = default_name.to_string();
    if cfg!(windows) && !filename.to_lowercase().ends_with(".exe") {
        filename.push_str(".exe");
    }

    if let Some(dir) = exe_dir() {
        let candidate = dir.join(&filename);
        if candidate.exists() {
            return candidate;
        }

        let bin_candidate = dir.join("bin").join(&filename);
        if bin_candidate.exists() {
            return bin_candidate;
        }
    }

    PathBuf::from(default_name)
}

/// Get path to the v4l2-ctl binary (Linux device info queries)
pub fn v4l2_ctl_path() -> PathBuf {
    resolve_tool(ENV_V4L2CTL_PATH, "v4l2-ctl")
}

/// Check whether a resolved tool can actually be launched
pub fn is_tool_available(path: &std::path::Path) -> bool {
    if path.is_file() {
        return true;
    }

    std::process::Command::new(path)
        .arg("--help")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tool_fallback() {
        let path = resolve_tool("CAMWATCH_TEST_NONEXISTENT", "testcmd");
        assert_eq!(path, PathBuf::from("testcmd"));
    }

    #[test]
    fn test_env_override() {
        let tmp = tempfile::tempdir().unwrap();
        let temp_file = tmp.path().join("camwatch_test_tool");
        std::fs::write(&temp_file, "test").unwrap();

        std::env::set_var("CAMWATCH_TEST_TOOL", temp_file.to_str().unwrap());
        let path = resolve_tool("CAMWATCH_TEST_TOOL", "default");
        assert_eq!(path, temp_file);

        std::env::remove_var("CAMWATCH_TEST_TOOL");
    }

    #[test]
    fn test_env_override_missing_file_is_ignored() {
        std::env::set_var("CAMWATCH_TEST_MISSING_TOOL", "/nonexistent/camwatch/tool");
        let path = resolve_tool("CAMWATCH_TEST_MISSING_TOOL", "fallback");
        assert_eq!(path, PathBuf::from("fallback"));
        std::env::remove_var("CAMWATCH_TEST_MISSING_TOOL");
    }

    #[test]
    fn test_existing_file_is_available() {
        let tmp = tempfile::tempdir().unwrap();
        let tool = tmp.path().join("tool");
        std::fs::write(&tool, "").unwrap();
        assert!(is_tool_available(&tool));
        assert!(!is_tool_available(std::path::Path::new("/nonexistent/camwatch/tool")));
    }
}
