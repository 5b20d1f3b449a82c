// Inventory store seam consumed by the reconcile engine

use rusqlite::Connection;

use super::{devices, CameraPatch, CameraRecord};
use crate::error::Result;

/// Persisted camera inventory keyed by identity.
pub trait InventoryStore {
    fn list_all(&self) -> Result<Vec<CameraRecord>>;

    /// Create if absent, else mutate only the patch's fields and return the refreshed row.
    fn upsert_by_identity(&self, identity_key: &str, patch: &CameraPatch) -> Result<CameraRecord>;

    fn get_by_id(&self, id: i64) -> Result<Option<CameraRecord>>;
}

impl InventoryStore for Connection {
    fn list_all(&self) -> Result<Vec<CameraRecord>> {
        devices::get_all_cameras(self)
    }

    fn upsert_by_identity(&self, identity_key: &str, patch: &CameraPatch) -> Result<CameraRecord> {
        devices::upsert_camera(self, identity_key, patch)
    }

    fn get_by_id(&self, id: i64) -> Result<Option<CameraRecord>> {
        devices::get_camera(self, id)
    }
}
