// ── Camera registry ──
//
// Owns the persisted camera list. Reads go straight to storage so a
// second handle on the same store never serves stale data; writes are
// serialized through one async lock so read-modify-write cycles cannot
// interleave. Every successful mutation is persisted before subscribers
// hear about it.

use std::collections::HashSet;
use std::net::IpAddr;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::broadcast::{BroadcastStream, Broadcaster, SubscriberError, Subscription};
use crate::error::CoreError;
use crate::model::{CameraId, CameraPatch, CameraRecord, NewCamera};
use crate::store::Storage;

/// A change to the camera list, delivered after it has been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    Added(CameraRecord),
    Updated(CameraRecord),
    Removed(CameraId),
    /// The whole list was replaced (backup import).
    Replaced { count: usize },
}

/// CRUD over camera records with uniqueness and port-collision checks.
pub struct CameraRegistry {
    storage: Storage,
    write_lock: Mutex<()>,
    changes: Broadcaster<RegistryChange>,
}

impl CameraRegistry {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
            changes: Broadcaster::new("registry"),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// All cameras in insertion order, including disabled ones.
    pub async fn list(&self) -> Result<Vec<CameraRecord>, CoreError> {
        Ok(self.storage.load_cameras().await?)
    }

    pub async fn get(&self, id: &CameraId) -> Result<CameraRecord, CoreError> {
        self.list()
            .await?
            .into_iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| CoreError::camera_not_found(id.as_str()))
    }

    /// Cameras that should be carried by the tunnel.
    pub async fn enabled(&self) -> Result<Vec<CameraRecord>, CoreError> {
        let mut cameras = self.list().await?;
        cameras.retain(|c| c.enabled);
        Ok(cameras)
    }

    // ── Writes ───────────────────────────────────────────────────────

    pub async fn add(&self, input: NewCamera) -> Result<CameraRecord, CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut cameras = self.list().await?;

        let record = input.into_record(Utc::now());
        validate_record(&record)?;
        if cameras.iter().any(|c| c.id == record.id) {
            return Err(CoreError::validation(format!(
                "camera id '{}' already exists",
                record.id
            )));
        }
        check_port_collision(&cameras, &record)?;

        cameras.push(record.clone());
        self.storage.save_cameras(&cameras).await?;
        info!(camera = %record.id, name = %record.name, remote_port = record.remote_port, "camera added");

        self.changes.publish(&RegistryChange::Added(record.clone()));
        Ok(record)
    }

    pub async fn update(
        &self,
        id: &CameraId,
        patch: &CameraPatch,
    ) -> Result<CameraRecord, CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut cameras = self.list().await?;

        let Some(index) = cameras.iter().position(|c| &c.id == id) else {
            return Err(CoreError::camera_not_found(id.as_str()));
        };
        let merged = patch.apply_to(&cameras[index]);
        validate_record(&merged)?;
        check_port_collision(&cameras, &merged)?;

        cameras[index] = merged.clone();
        self.storage.save_cameras(&cameras).await?;
        info!(camera = %merged.id, enabled = merged.enabled, "camera updated");

        self.changes.publish(&RegistryChange::Updated(merged.clone()));
        Ok(merged)
    }

    /// Delete a camera. Returns `false` when it was already absent.
    pub async fn remove(&self, id: &CameraId) -> Result<bool, CoreError> {
        let _guard = self.write_lock.lock().await;
        let mut cameras = self.list().await?;

        let before = cameras.len();
        cameras.retain(|c| &c.id != id);
        if cameras.len() == before {
            debug!(camera = %id, "remove: camera not present");
            return Ok(false);
        }

        self.storage.save_cameras(&cameras).await?;
        info!(camera = %id, "camera removed");

        self.changes.publish(&RegistryChange::Removed(id.clone()));
        Ok(true)
    }

    /// Replace the whole list, e.g. from a backup. Validated as a unit:
    /// either every record is accepted or nothing is written.
    pub async fn replace_all(&self, records: Vec<CameraRecord>) -> Result<usize, CoreError> {
        let _guard = self.write_lock.lock().await;

        let mut seen = HashSet::new();
        for (i, record) in records.iter().enumerate() {
            validate_record(record)?;
            if !seen.insert(&record.id) {
                return Err(CoreError::validation(format!(
                    "camera id '{}' appears more than once",
                    record.id
                )));
            }
            check_port_collision(&records[..i], record)?;
        }

        self.storage.save_cameras(&records).await?;
        let count = records.len();
        info!(count, "camera list replaced");

        self.changes.publish(&RegistryChange::Replaced { count });
        Ok(count)
    }

    // ── Change notifications ─────────────────────────────────────────

    #[must_use = "keep the Subscription to be able to unsubscribe"]
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&RegistryChange) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.changes.subscribe(handler)
    }

    pub fn subscribe_stream(&self) -> BroadcastStream<RegistryChange> {
        self.changes.subscribe_stream()
    }
}

// ── Validation ───────────────────────────────────────────────────────

fn validate_record(record: &CameraRecord) -> Result<(), CoreError> {
    if record.id.as_str().trim().is_empty() {
        return Err(CoreError::validation("camera id must not be empty"));
    }
    if record.name.is_empty() {
        return Err(CoreError::validation("camera name must not be empty"));
    }
    validate_host("localIP", &record.local_ip)?;
    if record.local_port == 0 {
        return Err(CoreError::validation("localPort must be between 1 and 65535"));
    }
    if record.remote_port == 0 {
        return Err(CoreError::validation("remotePort must be between 1 and 65535"));
    }
    Ok(())
}

/// Accept a plain IPv4/IPv6 literal or a syntactically valid DNS name.
///
/// The value is written verbatim into the frpc configuration and stream
/// URLs, so shorthand IPv4 (`192.168.1`, `0x7f.1`) and bracketed IPv6 are
/// refused rather than normalized.
pub(crate) fn validate_host(field: &str, host: &str) -> Result<(), CoreError> {
    if host.is_empty() {
        return Err(CoreError::validation(format!("{field} must not be empty")));
    }
    if host.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    match url::Host::parse(host) {
        Ok(url::Host::Domain(_)) if !host.contains(['/', ' ', ':', '[', ']']) => Ok(()),
        _ => Err(CoreError::validation(format!(
            "{field} '{host}' is not a valid hostname or IP address"
        ))),
    }
}

/// Two enabled cameras may not share a remote port.
fn check_port_collision(existing: &[CameraRecord], candidate: &CameraRecord) -> Result<(), CoreError> {
    if !candidate.enabled {
        return Ok(());
    }
    if let Some(other) = existing
        .iter()
        .find(|c| c.enabled && c.id != candidate.id && c.remote_port == candidate.remote_port)
    {
        return Err(CoreError::validation(format!(
            "remotePort {} is already used by camera '{}' ({})",
            candidate.remote_port, other.name, other.id
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::{Arc, Mutex as StdMutex};

    fn registry() -> CameraRegistry {
        CameraRegistry::new(Storage::in_memory())
    }

    #[tokio::test]
    async fn add_persists_and_lists_in_insertion_order() {
        let reg = registry();
        let a = reg
            .add(NewCamera::new("Front Door", "192.168.1.10", 6001))
            .await
            .unwrap();
        let b = reg
            .add(NewCamera::new("Yard", "cam-yard.lan", 6002).with_local_port(8554))
            .await
            .unwrap();

        let listed = reg.list().await.unwrap();
        assert_eq!(listed, vec![a.clone(), b]);
        assert_eq!(reg.get(&a.id).await.unwrap().name, "Front Door");
    }

    #[tokio::test]
    async fn rejects_port_collision_between_enabled_cameras() {
        let reg = registry();
        reg.add(NewCamera::new("One", "10.0.0.1", 6001)).await.unwrap();
        let err = reg
            .add(NewCamera::new("Two", "10.0.0.2", 6001))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // A disabled camera may park on a used port.
        reg.add(NewCamera::new("Two", "10.0.0.2", 6001).with_enabled(false))
            .await
            .unwrap();
        assert_eq!(reg.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn enabling_into_a_taken_port_is_rejected() {
        let reg = registry();
        reg.add(NewCamera::new("One", "10.0.0.1", 6001)).await.unwrap();
        let parked = reg
            .add(NewCamera::new("Two", "10.0.0.2", 6001).with_enabled(false))
            .await
            .unwrap();
        let err = reg
            .update(&parked.id, &CameraPatch::enabled(true))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!reg.get(&parked.id).await.unwrap().enabled);
    }

    #[tokio::test]
    async fn rejects_duplicate_explicit_id() {
        let reg = registry();
        reg.add(NewCamera::new("A", "10.0.0.1", 6001).with_id("cam_a"))
            .await
            .unwrap();
        let err = reg
            .add(NewCamera::new("B", "10.0.0.2", 6002).with_id("cam_a"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn rejects_bad_fields() {
        let reg = registry();
        for input in [
            NewCamera::new("  ", "10.0.0.1", 6001),
            NewCamera::new("A", "", 6001),
            NewCamera::new("A", "not a host", 6001),
            NewCamera::new("A", "10.0.0.1", 0),
            NewCamera::new("A", "10.0.0.1", 6001).with_local_port(0),
        ] {
            let err = reg.add(input).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(reg.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_unknown_camera_is_not_found() {
        let reg = registry();
        let err = reg
            .update(&CameraId::from("cam_missing"), &CameraPatch::enabled(false))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let reg = registry();
        let cam = reg.add(NewCamera::new("A", "10.0.0.1", 6001)).await.unwrap();
        assert!(reg.remove(&cam.id).await.unwrap());
        assert!(!reg.remove(&cam.id).await.unwrap());
        assert!(reg.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_all_is_all_or_nothing() {
        let reg = registry();
        let keep = reg.add(NewCamera::new("Keep", "10.0.0.1", 6001)).await.unwrap();

        let now = Utc::now();
        let bad = vec![
            NewCamera::new("X", "10.0.0.2", 6100).into_record(now),
            NewCamera::new("Y", "10.0.0.3", 6100).into_record(now),
        ];
        assert!(reg.replace_all(bad).await.is_err());
        assert_eq!(reg.list().await.unwrap(), vec![keep]);

        let good = vec![NewCamera::new("X", "10.0.0.2", 6100).into_record(now)];
        assert_eq!(reg.replace_all(good).await.unwrap(), 1);
        assert_eq!(reg.list().await.unwrap()[0].name, "X");
    }

    #[tokio::test]
    async fn changes_are_published_after_persisting() {
        let reg = Arc::new(registry());
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sub = {
            let seen = Arc::clone(&seen);
            reg.subscribe(move |change| {
                seen.lock().unwrap().push(change.clone());
                Ok(())
            })
        };

        let cam = reg.add(NewCamera::new("A", "10.0.0.1", 6001)).await.unwrap();
        reg.remove(&cam.id).await.unwrap();
        reg.remove(&cam.id).await.unwrap();
        sub.unsubscribe();
        reg.add(NewCamera::new("B", "10.0.0.2", 6002)).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![RegistryChange::Added(cam.clone()), RegistryChange::Removed(cam.id.clone())]
        );
    }

    #[test]
    fn host_validation() {
        assert!(validate_host("h", "192.168.1.10").is_ok());
        assert!(validate_host("h", "fe80::1").is_ok());
        assert!(validate_host("h", "camera.local").is_ok());
        assert!(validate_host("h", "http://camera").is_err());
        assert!(validate_host("h", "has space").is_err());
    }

    #[test]
    fn host_validation_refuses_ambiguous_forms() {
        for host in ["192.168.1", "1", "0x7f.1", "[::1]", "[fe80::1]", "999.1.1.1"] {
            assert!(validate_host("h", host).is_err(), "{host} should be rejected");
        }
        assert!(validate_host("h", "::1").is_ok());
        assert!(validate_host("h", "cam-01.lan").is_ok());
    }

    async fn assert_concurrent_adds_all_land(reg: Arc<CameraRegistry>) {
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..16u16 {
            let reg = Arc::clone(&reg);
            tasks.spawn(async move {
                reg.add(NewCamera::new(format!("Cam {i}"), "10.0.0.1", 6000 + i))
                    .await
                    .unwrap()
            });
        }
        let mut added = Vec::new();
        while let Some(res) = tasks.join_next().await {
            added.push(res.unwrap().id);
        }

        let listed = reg.list().await.unwrap();
        assert_eq!(listed.len(), 16);
        for id in &added {
            assert!(listed.iter().any(|c| &c.id == id), "{id} was lost");
        }
        let ports: HashSet<u16> = listed.iter().map(|c| c.remote_port).collect();
        assert_eq!(ports.len(), 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_are_not_lost() {
        assert_concurrent_adds_all_land(Arc::new(registry())).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_are_not_lost_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(crate::store::FileStore::new(dir.path()));
        assert_concurrent_adds_all_land(Arc::new(CameraRegistry::new(Storage::new(store)))).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_add_and_remove_both_apply() {
        let reg = Arc::new(registry());
        let old = reg.add(NewCamera::new("Old", "10.0.0.1", 6001)).await.unwrap();

        let (added, removed) = tokio::join!(
            reg.add(NewCamera::new("New", "10.0.0.2", 6002)),
            reg.remove(&old.id),
        );
        let added = added.unwrap();
        assert!(removed.unwrap());
        assert_eq!(reg.list().await.unwrap(), vec![added]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_adds_on_one_port_admit_exactly_one() {
        let reg = Arc::new(registry());
        let (a, b) = tokio::join!(
            reg.add(NewCamera::new("A", "10.0.0.1", 6001)),
            reg.add(NewCamera::new("B", "10.0.0.2", 6001)),
        );
        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
        assert_eq!(reg.list().await.unwrap().len(), 1);
    }
}
