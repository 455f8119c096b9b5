//! File-backed world persistence.
//!
//! Layout inside the store directory:
//! ```text
//! world.meta.json             - metadata and schema versions
//! snapshots/
//!   000001.snapshot.cbor.zst  - CBOR+zstd compressed snapshots
//! events/
//!   000001.log.cbor.zst       - CBOR+zstd compressed commit log segments
//! integrity/
//!   manifest.json             - hash chain manifest
//! ```

use crate::snapshot::{CommitRecord, EventLog, Snapshot};
use kinetree_kernel::{World, WorldError, WorldModel};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Current schema versions.
const WORLD_SCHEMA_VERSION: u32 = 1;
const EVENT_SCHEMA_VERSION: u32 = 2;

/// Errors from file-backed persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },
    #[error("{0} is not listed in the integrity manifest")]
    Unlisted(String),
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("no snapshots found")]
    NoSnapshots,
    #[error("stored world is inconsistent: {0}")]
    World(#[from] WorldError),
}

/// Metadata stored in world.meta.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub world_schema_version: u32,
    pub event_schema_version: u32,
    pub snapshot_count: u32,
    pub event_segment_count: u32,
}

/// A single entry in the integrity manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub sha256: String,
    pub prev_hash: Option<String>,
}

/// Integrity manifest tracking all segment hashes in a chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityManifest {
    pub entries: Vec<ManifestEntry>,
}

/// One log file: commits recorded after a given snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogSegment {
    /// Index of the snapshot these commits continue from, 0 if none.
    snapshot: u32,
    commits: Vec<CommitRecord>,
}

/// File-backed world store with schema versioning and integrity checking.
pub struct WorldStore {
    root: PathBuf,
    meta: StoreMeta,
    manifest: IntegrityManifest,
}

impl WorldStore {
    /// Open or create a world store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("snapshots"))?;
        std::fs::create_dir_all(root.join("events"))?;
        std::fs::create_dir_all(root.join("integrity"))?;

        let meta_path = root.join("world.meta.json");
        let manifest_path = root.join("integrity").join("manifest.json");

        let (meta, manifest) = if meta_path.exists() {
            let meta: StoreMeta = serde_json::from_reader(std::fs::File::open(&meta_path)?)?;
            check_schema(meta.world_schema_version, WORLD_SCHEMA_VERSION)?;
            check_schema(meta.event_schema_version, EVENT_SCHEMA_VERSION)?;
            let manifest: IntegrityManifest = if manifest_path.exists() {
                serde_json::from_reader(std::fs::File::open(&manifest_path)?)?
            } else {
                IntegrityManifest::default()
            };
            (meta, manifest)
        } else {
            let meta = StoreMeta {
                world_schema_version: WORLD_SCHEMA_VERSION,
                event_schema_version: EVENT_SCHEMA_VERSION,
                snapshot_count: 0,
                event_segment_count: 0,
            };
            let manifest = IntegrityManifest::default();
            serde_json::to_writer_pretty(std::fs::File::create(&meta_path)?, &meta)?;
            serde_json::to_writer_pretty(std::fs::File::create(&manifest_path)?, &manifest)?;
            (meta, manifest)
        };

        tracing::debug!(root = %root.display(), snapshots = meta.snapshot_count, "store opened");
        Ok(Self {
            root,
            meta,
            manifest,
        })
    }

    /// Write a snapshot to disk.
    pub fn save_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let index = self.meta.snapshot_count + 1;
        let filename = format!("{index:06}.snapshot.cbor.zst");
        self.write_segment("snapshots", filename, snapshot)?;
        self.meta.snapshot_count = index;
        self.save_meta()?;
        tracing::info!(version = snapshot.version, index, "snapshot saved");
        Ok(())
    }

    /// Snapshot the last commit of `world` and write it.
    pub fn snapshot_world(&mut self, world: &World) -> Result<(), StoreError> {
        self.save_snapshot(&Snapshot::of_world(world)?)
    }

    /// Append commits to the store as a new log segment, continuing the
    /// latest snapshot.
    pub fn append_commits(&mut self, commits: &[CommitRecord]) -> Result<(), StoreError> {
        if commits.is_empty() {
            return Ok(());
        }
        let index = self.meta.event_segment_count + 1;
        let filename = format!("{index:06}.log.cbor.zst");
        let segment = LogSegment {
            snapshot: self.meta.snapshot_count,
            commits: commits.to_vec(),
        };
        self.write_segment("events", filename, &segment)?;
        self.meta.event_segment_count = index;
        self.save_meta()?;
        tracing::debug!(commits = commits.len(), index, "log segment appended");
        Ok(())
    }

    /// The most recent snapshot, verified against the manifest and its own hash.
    pub fn latest_snapshot(&self) -> Result<Snapshot, StoreError> {
        if self.meta.snapshot_count == 0 {
            return Err(StoreError::NoSnapshots);
        }
        let snapshot = self.load_snapshot(self.meta.snapshot_count)?;
        if !snapshot.verify() {
            return Err(StoreError::IntegrityMismatch {
                expected: format!("{:016x}", snapshot.hash),
                actual: "snapshot content hash mismatch".into(),
            });
        }
        Ok(snapshot)
    }

    /// Every stored commit, in append order.
    pub fn read_log(&self) -> Result<EventLog, StoreError> {
        let mut log = EventLog::new();
        for index in 1..=self.meta.event_segment_count {
            log.extend(self.load_event_segment(index)?.commits);
        }
        Ok(log)
    }

    /// Commits appended while snapshot `snapshot` was the latest one.
    pub fn read_log_after(&self, snapshot: u32) -> Result<EventLog, StoreError> {
        let mut log = EventLog::new();
        for index in 1..=self.meta.event_segment_count {
            let segment = self.load_event_segment(index)?;
            if segment.snapshot == snapshot {
                log.extend(segment.commits);
            }
        }
        Ok(log)
    }

    /// Load the latest snapshot and replay the commits appended after it.
    ///
    /// Returns the version reached and a validated model.
    pub fn load_latest(&self) -> Result<(u64, WorldModel), StoreError> {
        let snapshot = self.latest_snapshot()?;
        let log = self.read_log_after(self.meta.snapshot_count)?;
        let (version, model) = log.replay_from(&snapshot)?;
        model.validate()?;
        tracing::info!(version, bodies = model.body_count(), "world loaded");
        Ok((version, model))
    }

    /// Verify all integrity hashes in the manifest.
    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        let mut prev_hash: Option<String> = None;
        for entry in &self.manifest.entries {
            if entry.prev_hash != prev_hash {
                return Err(StoreError::IntegrityMismatch {
                    expected: prev_hash.unwrap_or_else(|| "None".into()),
                    actual: entry.prev_hash.clone().unwrap_or_else(|| "None".into()),
                });
            }

            let data = std::fs::read(self.segment_path(&entry.filename))?;
            let actual_hash = sha256_hex(&data);
            if actual_hash != entry.sha256 {
                return Err(StoreError::IntegrityMismatch {
                    expected: entry.sha256.clone(),
                    actual: actual_hash,
                });
            }

            prev_hash = Some(entry.sha256.clone());
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    pub fn manifest(&self) -> &IntegrityManifest {
        &self.manifest
    }

    fn segment_path(&self, filename: &str) -> PathBuf {
        let dir = if filename.contains("snapshot") {
            "snapshots"
        } else {
            "events"
        };
        self.root.join(dir).join(filename)
    }

    /// Encode, compress, write and chain one file into the manifest.
    fn write_segment<T: Serialize + ?Sized>(
        &mut self,
        dir: &str,
        filename: String,
        value: &T,
    ) -> Result<(), StoreError> {
        let compressed = zstd_compress(&cbor_serialize(value)?)?;
        let hash = sha256_hex(&compressed);
        let prev_hash = self.manifest.entries.last().map(|e| e.sha256.clone());

        std::fs::write(self.root.join(dir).join(&filename), &compressed)?;

        self.manifest.entries.push(ManifestEntry {
            filename,
            sha256: hash,
            prev_hash,
        });
        self.save_manifest()
    }

    fn load_snapshot(&self, index: u32) -> Result<Snapshot, StoreError> {
        self.read_segment(&format!("{index:06}.snapshot.cbor.zst"))
    }

    fn load_event_segment(&self, index: u32) -> Result<LogSegment, StoreError> {
        self.read_segment(&format!("{index:06}.log.cbor.zst"))
    }

    fn read_segment<T: for<'de> Deserialize<'de>>(&self, filename: &str) -> Result<T, StoreError> {
        let compressed = std::fs::read(self.segment_path(filename))?;
        self.verify_file_hash(filename, &compressed)?;
        cbor_deserialize(&zstd_decompress(&compressed)?)
    }

    fn verify_file_hash(&self, filename: &str, data: &[u8]) -> Result<(), StoreError> {
        let entry = self
            .manifest
            .entries
            .iter()
            .find(|e| e.filename == filename)
            .ok_or_else(|| StoreError::Unlisted(filename.to_string()))?;
        let actual = sha256_hex(data);
        if entry.sha256 != actual {
            return Err(StoreError::IntegrityMismatch {
                expected: entry.sha256.clone(),
                actual,
            });
        }
        Ok(())
    }

    fn save_meta(&self) -> Result<(), StoreError> {
        let path = self.root.join("world.meta.json");
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.meta)?;
        Ok(())
    }

    fn save_manifest(&self) -> Result<(), StoreError> {
        let path = self.root.join("integrity").join("manifest.json");
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.manifest)?;
        Ok(())
    }
}

fn check_schema(file_version: u32, expected_version: u32) -> Result<(), StoreError> {
    if file_version != expected_version {
        return Err(StoreError::SchemaMismatch {
            file_version,
            expected_version,
        });
    }
    Ok(())
}

pub(crate) fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, StoreError> {
    ciborium::from_reader(data).map_err(|e| StoreError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
