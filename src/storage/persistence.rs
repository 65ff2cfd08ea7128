//! Snapshot persistence for the location table.
//!
//! The sink is a single JSON document holding two namespaces: the service
//! configuration and the location table. Saves replace the file atomically,
//! so a crash mid-write leaves the previously committed document intact.

use crate::config::{CONFIG_KEYS, CacheConfig, RETIRED_FILE_NAME_KEY};
use crate::core::{CacheError, Location, Result, Snapshot, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ============================================================================
// Sink Trait
// ============================================================================

/// Durable home of the location table.
///
/// Implementations do not retry; the maintenance scheduler decides what to do
/// with a failed save.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// `Ok(None)` means nothing has been persisted yet (first run).
    async fn load(&self) -> Result<Option<Snapshot>>;

    async fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

// ============================================================================
// Sink Document
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub saved_at: DateTime<Utc>,
    pub entry_count: usize,
}

/// Everything stored in the sink file.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkDocument {
    pub version: u32,
    pub config: CacheConfig,
    pub locations: HashMap<UserId, Location>,
    pub metadata: Option<SnapshotMetadata>,
}

impl SinkDocument {
    pub fn new(config: CacheConfig, snapshot: &Snapshot) -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            config,
            locations: snapshot.locations.clone(),
            metadata: Some(SnapshotMetadata {
                saved_at: Utc::now(),
                entry_count: snapshot.len(),
            }),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.locations.clone())
    }
}

// Unknown top-level keys are ignored so newer namespaces can be added later.
#[derive(Deserialize)]
struct RawDocument {
    #[serde(default = "current_version")]
    version: u32,
    #[serde(default)]
    config: Option<Value>,
    locations: Map<String, Value>,
    #[serde(default)]
    metadata: Option<SnapshotMetadata>,
}

#[derive(Serialize)]
struct RawDocumentRef<'a> {
    version: u32,
    config: &'a CacheConfig,
    locations: &'a HashMap<UserId, Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a SnapshotMetadata>,
}

const NAMESPACE_KEYS: &[&str] = &["version", "config", "locations", "metadata"];

fn current_version() -> u32 {
    SNAPSHOT_FORMAT_VERSION
}

fn corrupt(path: &Path, detail: impl std::fmt::Display) -> CacheError {
    CacheError::CorruptSnapshot(format!("'{}': {}", path.display(), detail))
}

/// Read the sink file. `Ok(None)` if it does not exist.
///
/// Flat files (user id keys at the top level, mixed with configuration keys)
/// are migrated on read and written back in the namespaced layout on the next
/// save.
pub async fn read_document(path: &Path) -> Result<Option<SinkDocument>> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CacheError::IoError(format!(
                "Failed to read snapshot '{}': {}",
                path.display(),
                e
            )));
        }
    };

    let root: Map<String, Value> =
        serde_json::from_slice(&data).map_err(|e| corrupt(path, e))?;

    if root.contains_key("locations") {
        return parse_namespaced(path, root).map(Some);
    }
    if let Some(key) = root.keys().find(|key| NAMESPACE_KEYS.contains(&key.as_str())) {
        return Err(corrupt(
            path,
            format!("has a '{}' namespace but no 'locations'", key),
        ));
    }
    parse_flat(path, root).map(Some)
}

fn parse_namespaced(path: &Path, root: Map<String, Value>) -> Result<SinkDocument> {
    let raw: RawDocument =
        serde_json::from_value(Value::Object(root)).map_err(|e| corrupt(path, e))?;

    if raw.version > SNAPSHOT_FORMAT_VERSION {
        return Err(corrupt(
            path,
            format!(
                "has format version {}, newest supported is {}",
                raw.version, SNAPSHOT_FORMAT_VERSION
            ),
        ));
    }

    let config = match raw.config {
        Some(value) => CacheConfig::from_value(value)?,
        None => CacheConfig::default(),
    };

    let mut locations = HashMap::with_capacity(raw.locations.len());
    for (key, value) in raw.locations {
        insert_location(path, &mut locations, &key, value)?;
    }

    Ok(SinkDocument {
        version: raw.version,
        config,
        locations,
        metadata: raw.metadata,
    })
}

fn parse_flat(path: &Path, root: Map<String, Value>) -> Result<SinkDocument> {
    let mut config = Map::new();
    let mut locations = HashMap::new();

    for (key, value) in root {
        if CONFIG_KEYS.contains(&key.as_str()) {
            config.insert(key, value);
        } else if key == RETIRED_FILE_NAME_KEY {
            debug!(value = %value, "ignoring retired '{}' key", RETIRED_FILE_NAME_KEY);
        } else {
            insert_location(path, &mut locations, &key, value)?;
        }
    }

    info!(
        path = %path.display(),
        entries = locations.len(),
        "migrating flat cache file"
    );

    Ok(SinkDocument {
        version: SNAPSHOT_FORMAT_VERSION,
        config: CacheConfig::from_value(Value::Object(config))?,
        locations,
        metadata: None,
    })
}

// Two stored keys that canonicalize to the same user are ambiguous.
fn insert_location(
    path: &Path,
    locations: &mut HashMap<UserId, Location>,
    key: &str,
    value: Value,
) -> Result<()> {
    let user = UserId::new(key);
    if user.is_blank() {
        return Err(corrupt(path, "blank user id"));
    }
    let location: Location = serde_json::from_value(value)
        .map_err(|e| corrupt(path, format!("entry '{}': {}", key, e)))?;
    if locations.insert(user.clone(), location).is_some() {
        return Err(corrupt(
            path,
            format!("user '{}' is stored under more than one key", user),
        ));
    }
    Ok(())
}

/// Serialize and atomically replace the sink file.
pub async fn write_document(path: &Path, document: &SinkDocument) -> Result<()> {
    let raw = RawDocumentRef {
        version: document.version,
        config: &document.config,
        locations: &document.locations,
        metadata: document.metadata.as_ref(),
    };
    let bytes = serde_json::to_vec_pretty(&raw)
        .map_err(|e| CacheError::SerializationError(format!("Failed to serialize snapshot: {}", e)))?;

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || atomic_write(&path, &bytes)).await?
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| {
        CacheError::IoError(format!(
            "Failed to create snapshot directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    let mut temp = NamedTempFile::new_in(&parent)
        .map_err(|e| CacheError::IoError(format!("Failed to create temp file: {}", e)))?;
    temp.write_all(bytes)
        .map_err(|e| CacheError::IoError(format!("Failed to write snapshot: {}", e)))?;
    temp.flush()
        .map_err(|e| CacheError::IoError(format!("Failed to flush snapshot: {}", e)))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| CacheError::IoError(format!("Failed to sync snapshot: {}", e)))?;
    temp.persist(path).map_err(|e| {
        CacheError::IoError(format!(
            "Failed to replace snapshot '{}': {}",
            path.display(),
            e.error
        ))
    })?;
    Ok(())
}

// ============================================================================
// File Sink
// ============================================================================

/// JSON file sink. Writes the configuration it was opened with alongside
/// every snapshot so the two namespaces stay together.
#[derive(Debug, Clone)]
pub struct FileSnapshotSink {
    path: PathBuf,
    config: CacheConfig,
}

impl FileSnapshotSink {
    pub fn new<P: AsRef<Path>>(path: P, config: CacheConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

#[async_trait]
impl SnapshotSink for FileSnapshotSink {
    async fn load(&self) -> Result<Option<Snapshot>> {
        Ok(read_document(&self.path).await?.map(|doc| doc.snapshot()))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let document = SinkDocument::new(self.config.clone(), snapshot);
        write_document(&self.path, &document).await
    }
}
