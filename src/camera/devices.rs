// Camera inventory queries (cameras table)

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{CameraPatch, CameraRecord, CameraStatus, CameraUpdate, NewCamera};
use crate::error::{CamwatchError, Result};

const CAMERA_COLUMNS: &str = "id, name, unique_id, device_id, display_name, rtsp_url, backend, \
     prefer_gst, is_connected, created_at, device_path, status, os_index";

fn row_to_camera(row: &Row) -> rusqlite::Result<CameraRecord> {
    Ok(CameraRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        unique_id: row.get(2)?,
        device_id: row.get(3)?,
        display_name: row.get(4)?,
        rtsp_url: row.get(5)?,
        backend: row.get(6)?,
        prefer_gst: row.get(7)?,
        is_connected: row.get(8)?,
        created_at: row.get(9)?,
        device_path: row.get(10)?,
        status: row.get(11)?,
        os_index: row.get(12)?,
    })
}

/// Get all cameras, oldest first
pub fn get_all_cameras(conn: &Connection) -> Result<Vec<CameraRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM cameras ORDER BY id",
        CAMERA_COLUMNS
    ))?;

    let cameras = stmt
        .query_map([], row_to_camera)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(cameras)
}

/// Get cameras in one status
pub fn get_cameras_by_status(conn: &Connection, status: CameraStatus) -> Result<Vec<CameraRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM cameras WHERE status = ?1 ORDER BY id",
        CAMERA_COLUMNS
    ))?;

    let cameras = stmt
        .query_map([status], row_to_camera)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(cameras)
}

pub fn get_camera(conn: &Connection, id: i64) -> Result<Option<CameraRecord>> {
    let camera = conn
        .query_row(
            &format!("SELECT {} FROM cameras WHERE id = ?1", CAMERA_COLUMNS),
            [id],
            row_to_camera,
        )
        .optional()?;
    Ok(camera)
}

/// Find a camera by its identity key
pub fn get_camera_by_device_id(conn: &Connection, device_id: &str) -> Result<Option<CameraRecord>> {
    let camera = conn
        .query_row(
            &format!("SELECT {} FROM cameras WHERE device_id = ?1", CAMERA_COLUMNS),
            [device_id],
            row_to_camera,
        )
        .optional()?;
    Ok(camera)
}

fn require_camera(conn: &Connection, id: i64) -> Result<CameraRecord> {
    get_camera(conn, id)?.ok_or(CamwatchError::CameraNotFound(id))
}

/// Create-or-update by identity key.
///
/// An existing row is mutated in place with only the patch's fields and read
/// back. An absent key is inserted, which requires a complete patch; a
/// transition-only patch for a missing row fails instead of resurrecting it.
pub fn upsert_camera(conn: &Connection, device_id: &str, patch: &CameraPatch) -> Result<CameraRecord> {
    if let Some(existing) = get_camera_by_device_id(conn, device_id)? {
        conn.execute(
            "UPDATE cameras SET
                name = COALESCE(?1, name),
                os_index = COALESCE(?2, os_index),
                device_path = COALESCE(?3, device_path),
                unique_id = COALESCE(?4, unique_id),
                status = COALESCE(?5, status),
                is_connected = COALESCE(?6, is_connected)
             WHERE id = ?7",
            params![
                patch.name,
                patch.os_index,
                patch.device_path,
                patch.unique_id,
                patch.status,
                patch.status.map(|s| s.is_connected()),
                existing.id,
            ],
        )?;
        return require_camera(conn, existing.id);
    }

    if !patch.is_complete() {
        return Err(CamwatchError::IncompleteUpsert(device_id.to_string()));
    }

    let status = patch.status.unwrap_or(CameraStatus::Active);
    conn.execute(
        "INSERT INTO cameras (name, unique_id, device_id, device_path, status, is_connected, os_index)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            patch.name,
            patch.unique_id,
            device_id,
            patch.device_path,
            status,
            status.is_connected(),
            patch.os_index,
        ],
    )?;

    require_camera(conn, conn.last_insert_rowid())
}

/// Insert a manually registered camera. It stays DISCONNECTED until observed.
pub fn insert_camera(conn: &Connection, camera: &NewCamera) -> Result<CameraRecord> {
    let device_id = camera.device_id.trim();
    if device_id.len() < 3 || device_id.len() > 100 {
        return Err(CamwatchError::InvalidInput(format!(
            "device id must be 3-100 characters, got '{}'",
            device_id
        )));
    }
    let unique_id = camera.unique_id.as_deref().unwrap_or(device_id);

    conn.execute(
        "INSERT INTO cameras (name, unique_id, device_id, display_name, rtsp_url, backend, prefer_gst, status, is_connected)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            camera.name,
            unique_id,
            device_id,
            camera.display_name,
            camera.rtsp_url,
            camera.backend,
            camera.prefer_gst,
            CameraStatus::Disconnected,
            false,
        ],
    )?;

    require_camera(conn, conn.last_insert_rowid())
}

/// Administrative update by surrogate id
pub fn update_camera(conn: &Connection, id: i64, update: &CameraUpdate) -> Result<CameraRecord> {
    require_camera(conn, id)?;

    conn.execute(
        "UPDATE cameras SET
            name = COALESCE(?1, name),
            display_name = COALESCE(?2, display_name),
            rtsp_url = COALESCE(?3, rtsp_url),
            backend = COALESCE(?4, backend),
            prefer_gst = COALESCE(?5, prefer_gst),
            status = COALESCE(?6, status),
            is_connected = COALESCE(?7, is_connected)
         WHERE id = ?8",
        params![
            update.name,
            update.display_name,
            update.rtsp_url,
            update.backend,
            update.prefer_gst,
            update.status,
            update.status.map(|s| s.is_connected()),
            id,
        ],
    )?;

    require_camera(conn, id)
}

/// Mark a camera ACTIVE by hand. The next cycle may overwrite it.
pub fn connect_camera(conn: &Connection, id: i64) -> Result<CameraRecord> {
    set_status(conn, id, CameraStatus::Active)
}

/// Mark a camera DISCONNECTED by hand. The next cycle may overwrite it.
pub fn disconnect_camera(conn: &Connection, id: i64) -> Result<CameraRecord> {
    set_status(conn, id, CameraStatus::Disconnected)
}

pub fn set_status(conn: &Connection, id: i64, status: CameraStatus) -> Result<CameraRecord> {
    let changed = conn.execute(
        "UPDATE cameras SET status = ?1, is_connected = ?2 WHERE id = ?3",
        params![status, status.is_connected(), id],
    )?;
    if changed == 0 {
        return Err(CamwatchError::CameraNotFound(id));
    }
    require_camera(conn, id)
}

/// Delete one camera, returning the removed row
pub fn delete_camera(conn: &Connection, id: i64) -> Result<CameraRecord> {
    let camera = require_camera(conn, id)?;
    conn.execute("DELETE FROM cameras WHERE id = ?1", [id])?;
    Ok(camera)
}

/// Delete every camera. Returns the number of rows removed.
pub fn delete_all_cameras(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("DELETE FROM cameras", [])?)
}

pub fn count_cameras(conn: &Connection) -> Result<(i64, i64)> {
    let counts = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_connected), 0) FROM cameras",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::DeviceObservation;

    fn setup_test_db() -> Connection {
        crate::db::open_in_memory().unwrap()
    }

    fn observation(key: &str, name: &str, index: i64) -> DeviceObservation {
        DeviceObservation {
            identity_key: key.to_string(),
            name: name.to_string(),
            os_index: Some(index),
        }
    }

    #[test]
    fn test_upsert_inserts_then_updates_in_place() {
        let conn = setup_test_db();
        let obs = observation("/dev/video0", "WebCam", 0);

        let created = upsert_camera(&conn, "/dev/video0", &CameraPatch::observed(&obs)).unwrap();
        assert_eq!(created.status, CameraStatus::Active);
        assert!(created.is_connected);
        assert_eq!(created.unique_id, "/dev/video0");
        assert_eq!(created.device_path.as_deref(), Some("/dev/video0"));

        let renamed = observation("/dev/video0", "WebCam HD", 2);
        let updated = upsert_camera(&conn, "/dev/video0", &CameraPatch::observed(&renamed)).unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name.as_deref(), Some("WebCam HD"));
        assert_eq!(updated.os_index, Some(2));
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(get_all_cameras(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_disconnect_patch_touches_only_status() {
        let conn = setup_test_db();
        let obs = observation("/dev/video0", "WebCam", 0);
        let created = upsert_camera(&conn, "/dev/video0", &CameraPatch::observed(&obs)).unwrap();
        update_camera(&conn, created.id, &CameraUpdate {
            display_name: Some("Packing desk".to_string()),
            rtsp_url: Some("rtsp://cam/1".to_string()),
            ..Default::default()
        }).unwrap();

        let gone = upsert_camera(&conn, "/dev/video0", &CameraPatch::disconnected()).unwrap();
        assert_eq!(gone.status, CameraStatus::Disconnected);
        assert!(!gone.is_connected);
        assert_eq!(gone.name.as_deref(), Some("WebCam"));
        assert_eq!(gone.os_index, Some(0));
        assert_eq!(gone.display_name.as_deref(), Some("Packing desk"));
        assert_eq!(gone.rtsp_url.as_deref(), Some("rtsp://cam/1"));
    }

    #[test]
    fn test_partial_upsert_of_missing_key_fails() {
        let conn = setup_test_db();
        let err = upsert_camera(&conn, "/dev/video9", &CameraPatch::disconnected()).unwrap_err();
        assert!(matches!(err, CamwatchError::IncompleteUpsert(_)));
        assert!(get_all_cameras(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_insert_camera_defaults() {
        let conn = setup_test_db();
        let cam = insert_camera(&conn, &NewCamera {
            device_id: "rtsp-front-door".to_string(),
            name: Some("Front door".to_string()),
            ..Default::default()
        }).unwrap();
        assert_eq!(cam.unique_id, "rtsp-front-door");
        assert_eq!(cam.status, CameraStatus::Disconnected);
        assert!(!cam.is_connected);

        let dup = insert_camera(&conn, &NewCamera {
            device_id: "rtsp-front-door".to_string(),
            ..Default::default()
        });
        assert!(matches!(dup, Err(CamwatchError::Database(_))));

        let short = insert_camera(&conn, &NewCamera {
            device_id: "ab".to_string(),
            ..Default::default()
        });
        assert!(matches!(short, Err(CamwatchError::InvalidInput(_))));
    }

    #[test]
    fn test_admin_status_changes() {
        let conn = setup_test_db();
        let cam = insert_camera(&conn, &NewCamera {
            device_id: "manual-1".to_string(),
            ..Default::default()
        }).unwrap();

        let on = connect_camera(&conn, cam.id).unwrap();
        assert_eq!(on.status, CameraStatus::Active);
        assert!(on.is_connected);

        let off = disconnect_camera(&conn, cam.id).unwrap();
        assert_eq!(off.status, CameraStatus::Disconnected);

        let broken = update_camera(&conn, cam.id, &CameraUpdate {
            status: Some(CameraStatus::Error),
            ..Default::default()
        }).unwrap();
        assert_eq!(broken.status, CameraStatus::Error);
        assert!(!broken.is_connected);
        assert_eq!(get_cameras_by_status(&conn, CameraStatus::Error).unwrap().len(), 1);

        assert!(matches!(connect_camera(&conn, 999), Err(CamwatchError::CameraNotFound(999))));
    }

    #[test]
    fn test_delete_and_counts() {
        let conn = setup_test_db();
        for key in ["/dev/video0", "/dev/video1", "/dev/video2"] {
            let obs = observation(key, "Cam", 0);
            upsert_camera(&conn, key, &CameraPatch::observed(&obs)).unwrap();
        }
        upsert_camera(&conn, "/dev/video2", &CameraPatch::disconnected()).unwrap();
        assert_eq!(count_cameras(&conn).unwrap(), (3, 2));

        let removed = delete_camera(&conn, 1).unwrap();
        assert_eq!(removed.device_id, "/dev/video0");
        assert!(get_camera(&conn, 1).unwrap().is_none());
        assert!(matches!(delete_camera(&conn, 1), Err(CamwatchError::CameraNotFound(1))));

        assert_eq!(delete_all_cameras(&conn).unwrap(), 2);
        assert_eq!(count_cameras(&conn).unwrap(), (0, 0));
    }

    #[test]
    fn test_ids_are_never_reused() {
        let conn = setup_test_db();
        let obs = observation("/dev/video0", "Cam", 0);
        let first = upsert_camera(&conn, "/dev/video0", &CameraPatch::observed(&obs)).unwrap();
        delete_camera(&conn, first.id).unwrap();
        let second = upsert_camera(&conn, "/dev/video0", &CameraPatch::observed(&obs)).unwrap();
        assert!(second.id > first.id);
    }
}
