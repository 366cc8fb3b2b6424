// File-backed collaborators for single-host deployments and the CLI

use async_trait::async_trait;
use fd_lock::RwLock as FileLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::errors::{CartError, StoreError};
use super::traits::{CartService, RequestStore};
use super::types::{CartLineItem, FabricationRequest, RequestId, Stage};

const SNAPSHOT_FORMAT: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    format: u32,
    requests: Vec<FabricationRequest>,
}

/// Request store persisted as a single JSON document
///
/// Every operation takes an exclusive lock on `<state>.lock`, so separate
/// processes sharing the same directory never interleave a read-modify-write.
/// Writes go to a temporary file that is renamed over the state file.
#[derive(Debug)]
pub struct JsonFileRequestStore {
    state_file: PathBuf,
    lock_file: PathBuf,
    in_process: Mutex<()>,
}

impl JsonFileRequestStore {
    pub fn new(state_file: impl Into<PathBuf>) -> Self {
        let state_file = state_file.into();
        let lock_file = state_file.with_extension("lock");
        Self {
            state_file,
            lock_file,
            in_process: Mutex::new(()),
        }
    }

    /// Store rooted in a directory, using `requests.json`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("requests.json"))
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    async fn transaction<R, F>(&self, op: F) -> Result<R, StoreError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Vec<FabricationRequest>) -> Result<(R, bool), StoreError> + Send + 'static,
    {
        let _guard = self.in_process.lock().await;
        let state_file = self.state_file.clone();
        let lock_file = self.lock_file.clone();
        tokio::task::spawn_blocking(move || locked_transaction(&state_file, &lock_file, op))
            .await
            .map_err(|e| StoreError::Backend(format!("store task failed: {e}")))?
    }
}

fn locked_transaction<R>(
    state_file: &Path,
    lock_file: &Path,
    op: impl FnOnce(&mut Vec<FabricationRequest>) -> Result<(R, bool), StoreError>,
) -> Result<R, StoreError> {
    if let Some(parent) = state_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(lock_file)?;
    let mut lock = FileLock::new(file);
    let _held = lock.write()?;

    let mut records = read_snapshot(state_file)?;
    let (result, dirty) = op(&mut records)?;
    if dirty {
        write_snapshot(state_file, &records)?;
    }
    Ok(result)
}

fn read_snapshot(state_file: &Path) -> Result<Vec<FabricationRequest>, StoreError> {
    if !state_file.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(state_file)?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    let snapshot: Snapshot = serde_json::from_str(&contents)?;
    if snapshot.format != SNAPSHOT_FORMAT {
        return Err(StoreError::Corrupt {
            reason: format!(
                "unsupported snapshot format {} (expected {})",
                snapshot.format, SNAPSHOT_FORMAT
            ),
        });
    }
    for request in &snapshot.requests {
        request
            .check_invariants()
            .map_err(|reason| StoreError::Corrupt { reason })?;
    }
    Ok(snapshot.requests)
}

fn write_snapshot(state_file: &Path, records: &[FabricationRequest]) -> Result<(), StoreError> {
    let snapshot = Snapshot {
        format: SNAPSHOT_FORMAT,
        requests: records.to_vec(),
    };
    let serialized = serde_json::to_string_pretty(&snapshot)?;

    let temp_file = format!("{}.tmp", state_file.display());
    fs::write(&temp_file, serialized)?;
    fs::rename(&temp_file, state_file)?;
    debug!(file = ?state_file, records = records.len(), "Request snapshot written");
    Ok(())
}

#[async_trait]
impl RequestStore for JsonFileRequestStore {
    async fn insert(&self, request: FabricationRequest) -> Result<(), StoreError> {
        self.transaction(move |records| {
            if records.iter().any(|r| r.id == request.id) {
                return Err(StoreError::Duplicate(request.id));
            }
            records.push(request);
            Ok(((), true))
        })
        .await
    }

    async fn get(&self, id: RequestId) -> Result<Option<FabricationRequest>, StoreError> {
        self.transaction(move |records| {
            Ok((records.iter().find(|r| r.id == id).cloned(), false))
        })
        .await
    }

    async fn list_by_stage(&self, stage: Stage) -> Result<Vec<FabricationRequest>, StoreError> {
        self.transaction(move |records| {
            let matching = records.iter().filter(|r| r.status == stage).cloned().collect();
            Ok((matching, false))
        })
        .await
    }

    async fn compare_and_swap(
        &self,
        expected_version: u64,
        updated: FabricationRequest,
    ) -> Result<(), StoreError> {
        self.transaction(move |records| {
            let slot = records
                .iter_mut()
                .find(|r| r.id == updated.id)
                .ok_or(StoreError::NotFound(updated.id))?;
            if slot.version != expected_version {
                return Err(StoreError::VersionConflict {
                    id: updated.id,
                    expected: expected_version,
                    found: slot.version,
                });
            }
            *slot = updated;
            Ok(((), true))
        })
        .await
    }
}

/// Cart that appends each line item as one JSON line
#[derive(Debug)]
pub struct FileCart {
    path: PathBuf,
}

impl FileCart {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("cart.jsonl"))
    }

    /// Read back everything handed to the cart so far
    pub async fn items(&self) -> Result<Vec<CartLineItem>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = tokio::fs::read_to_string(&self.path).await?;
        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl CartService for FileCart {
    async fn add_line_item(&self, item: CartLineItem) -> Result<(), CartError> {
        let mut line = serde_json::to_string(&item)
            .map_err(|e| CartError::Rejected(format!("unserializable line item: {e}")))?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CartError::Unavailable(e.to_string()))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| CartError::Unavailable(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| CartError::Unavailable(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| CartError::Unavailable(e.to_string()))?;

        info!(
            request.id = %item.request_id,
            total_cents = item.total_cents,
            cart = ?self.path,
            "Line item appended to cart"
        );
        Ok(())
    }
}
