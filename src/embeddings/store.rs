use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use fs2::FileExt as _;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{l2_distance, ContentFingerprint, EmbeddingVector, TARGET_DIMENSION};
use crate::error::{Result, SemSearchError};
use crate::issues::IssueId;

const META_FILE: &str = "store.json";
const RECORDS_DIR: &str = "records";
const LOCK_FILE: &str = ".lock";

/// The stored embedding of one issue.
///
/// Every field but the id is nullable: a freshly initialised record has never
/// been indexed, and a record whose vector was cleared by a migration must be
/// regenerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub issue_id: IssueId,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub content_hash: Option<ContentFingerprint>,
    #[serde(default)]
    pub model_used: Option<String>,
    /// Width reported by the model before normalization
    #[serde(default)]
    pub original_dimension: Option<usize>,
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
}

impl EmbeddingRecord {
    pub fn empty(issue_id: IssueId) -> Self {
        Self {
            issue_id,
            embedding: None,
            content_hash: None,
            model_used: None,
            original_dimension: None,
            updated_on: None,
        }
    }

    /// A complete record for freshly generated content.
    pub fn refreshed(
        issue_id: IssueId,
        embedding: EmbeddingVector,
        content_hash: ContentFingerprint,
        model_used: &str,
        original_dimension: usize,
    ) -> Self {
        Self {
            issue_id,
            embedding: Some(embedding.into_inner()),
            content_hash: Some(content_hash),
            model_used: Some(model_used.to_string()),
            original_dimension: Some(original_dimension),
            updated_on: Some(Utc::now()),
        }
    }

    /// True when the record was built from `fingerprint` with `model` and still has a vector.
    pub fn is_current(&self, fingerprint: &ContentFingerprint, model: &str) -> bool {
        self.embedding.is_some()
            && self.content_hash.as_ref() == Some(fingerprint)
            && self.model_used.as_deref() == Some(model)
    }

    fn clear_vector(&mut self) {
        self.embedding = None;
        self.content_hash = None;
        self.original_dimension = None;
    }
}

/// A stored vector ranked against a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub issue_id: IssueId,
    pub distance: f64,
}

pub struct StoreStats {
    pub declared_width: usize,
    pub total_records: usize,
    pub without_vector: usize,
    pub by_model: HashMap<String, usize>,
    /// Bytes used on disk by the declaration and the record files
    pub disk_bytes: u64,
}

/// store.json
#[derive(Debug, Serialize, Deserialize)]
struct StoreMeta {
    dimension: usize,
}

struct StoreState {
    dimension: usize,
    records: BTreeMap<IssueId, EmbeddingRecord>,
}

/// Exclusive lock on the store directory, shared by every process using it.
/// Released on drop.
struct StoreLock {
    file: File,
}

impl StoreLock {
    fn acquire(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(dir.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// One embedding record per issue, persisted as one JSON file per record.
///
/// Layout of the store directory:
///
/// ```text
/// store.json          {"dimension": 2000}
/// records/<id>.json   one EmbeddingRecord
/// .lock               cross-process write lock
/// ```
///
/// A save writes only its own record file, through a temporary file and a
/// rename, so a record write either lands completely or not at all and never
/// touches records of other issues. Writers from several processes serialize
/// on the directory lock. Records are loaded at [`EmbeddingStore::open`];
/// records written later by other processes show up on the next open.
pub struct EmbeddingStore {
    dir: PathBuf,
    state: RwLock<StoreState>,
}

impl EmbeddingStore {
    /// Load the store in `dir`. A missing directory is an empty store at [`TARGET_DIMENSION`].
    pub fn open(dir: PathBuf) -> Result<Self> {
        let state = Self::read_state(&dir)?;
        Ok(Self {
            dir,
            state: RwLock::new(state),
        })
    }

    fn read_dimension(dir: &Path) -> Result<usize> {
        let path = dir.join(META_FILE);
        if !path.exists() {
            return Ok(TARGET_DIMENSION);
        }
        let meta: StoreMeta = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        Ok(meta.dimension)
    }

    fn read_state(dir: &Path) -> Result<StoreState> {
        let dimension = Self::read_dimension(dir)?;
        let mut records = BTreeMap::new();

        let records_dir = dir.join(RECORDS_DIR);
        if records_dir.is_dir() {
            for entry in std::fs::read_dir(&records_dir)? {
                let path = entry?.path();
                // Skips temporary files of in-flight writes
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }

                let mut record: EmbeddingRecord =
                    serde_json::from_str(&std::fs::read_to_string(&path)?)?;
                let width = record.embedding.as_ref().map(Vec::len);
                if let Some(width) = width.filter(|w| *w != dimension) {
                    tracing::warn!(
                        issue_id = record.issue_id,
                        width,
                        declared = dimension,
                        "stored vector does not match declared width, treating as missing"
                    );
                    record.embedding = None;
                }
                records.insert(record.issue_id, record);
            }
        }

        Ok(StoreState { dimension, records })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Vector width the store was declared with.
    pub fn declared_width(&self) -> Result<usize> {
        Ok(self.read()?.dimension)
    }

    pub fn get(&self, issue_id: IssueId) -> Result<Option<EmbeddingRecord>> {
        Ok(self.read()?.records.get(&issue_id).cloned())
    }

    /// The stored record, or an empty one if the issue was never indexed.
    pub fn find_or_initialize(&self, issue_id: IssueId) -> Result<EmbeddingRecord> {
        Ok(self
            .get(issue_id)?
            .unwrap_or_else(|| EmbeddingRecord::empty(issue_id)))
    }

    /// Insert or replace the record for `record.issue_id`.
    ///
    /// Concurrent writers to the same issue resolve last-writer-wins. Nothing
    /// changes, in memory or on disk, when the write fails.
    pub fn save_record(&self, record: EmbeddingRecord) -> Result<()> {
        let mut state = self.write()?;
        let _lock = StoreLock::acquire(&self.dir)?;

        // Another process may have re-declared the store since it was opened
        state.dimension = Self::read_dimension(&self.dir)?;

        if let Some(width) = record.embedding.as_ref().map(Vec::len) {
            if width != state.dimension {
                return Err(SemSearchError::Store(format!(
                    "dimension mismatch: vector for issue #{} has {} dimensions, store declares {}",
                    record.issue_id, width, state.dimension
                )));
            }
        }

        self.write_record(&record)?;
        state.records.insert(record.issue_id, record);
        Ok(())
    }

    /// The `limit` stored vectors closest to `query` by L2 distance, ascending.
    ///
    /// Records without a vector and issues rejected by `include` are skipped
    /// before the limit is applied. Equal distances order by issue id.
    pub fn nearest<F>(&self, query: &EmbeddingVector, limit: usize, include: F) -> Result<Vec<Neighbor>>
    where
        F: Fn(IssueId) -> bool + Sync,
    {
        let state = self.read()?;
        let query = query.as_slice();
        if query.len() != state.dimension {
            return Err(SemSearchError::Store(format!(
                "dimension mismatch: query vector has {} dimensions, store declares {}",
                query.len(),
                state.dimension
            )));
        }

        let dimension = state.dimension;
        let mut neighbors: Vec<Neighbor> = state
            .records
            .par_iter()
            .filter(|(id, _)| include(**id))
            .filter_map(|(id, record)| {
                record
                    .embedding
                    .as_ref()
                    .filter(|embedding| embedding.len() == dimension)
                    .map(|embedding| Neighbor {
                        issue_id: *id,
                        distance: l2_distance(query, embedding),
                    })
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.issue_id.cmp(&b.issue_id))
        });
        neighbors.truncate(limit);
        Ok(neighbors)
    }

    /// Re-declare the store at `width`, clearing every vector and fingerprint
    /// so the next sync regenerates all of them. Returns the records cleared.
    ///
    /// Works from the records on disk, so records saved by other processes are
    /// cleared too. The declaration is written last: on failure the declared
    /// width is unchanged and this handle keeps its previous state. Records
    /// already cleared on disk stay cleared and are regenerated by the next sync.
    pub fn redeclare(&self, width: usize) -> Result<usize> {
        let mut state = self.write()?;
        let _lock = StoreLock::acquire(&self.dir)?;

        let mut next = Self::read_state(&self.dir)?;
        for record in next.records.values_mut() {
            record.clear_vector();
            self.write_record(record)?;
        }
        self.write_meta(width)?;
        next.dimension = width;

        let cleared = next.records.len();
        *state = next;
        Ok(cleared)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.read()?;
        let mut stats = StoreStats {
            declared_width: state.dimension,
            total_records: state.records.len(),
            without_vector: 0,
            by_model: HashMap::new(),
            disk_bytes: self.disk_bytes()?,
        };

        for record in state.records.values() {
            if record.embedding.is_none() {
                stats.without_vector += 1;
            }
            if let Some(model) = &record.model_used {
                *stats.by_model.entry(model.clone()).or_insert(0) += 1;
            }
        }

        Ok(stats)
    }

    /// Stored content hashes by issue id.
    pub fn content_hashes(&self) -> Result<BTreeMap<IssueId, Option<ContentFingerprint>>> {
        Ok(self
            .read()?
            .records
            .iter()
            .map(|(id, record)| (*id, record.content_hash.clone()))
            .collect())
    }

    fn disk_bytes(&self) -> Result<u64> {
        let mut total = match std::fs::metadata(self.dir.join(META_FILE)) {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        let records_dir = self.dir.join(RECORDS_DIR);
        if records_dir.is_dir() {
            for entry in std::fs::read_dir(records_dir)? {
                total += entry?.metadata()?.len();
            }
        }
        Ok(total)
    }

    fn write_record(&self, record: &EmbeddingRecord) -> Result<()> {
        let records_dir = self.dir.join(RECORDS_DIR);
        std::fs::create_dir_all(&records_dir)?;
        let name = format!("{}.json", record.issue_id);
        write_atomically(&records_dir, &name, &serde_json::to_string(record)?)
    }

    fn write_meta(&self, dimension: usize) -> Result<()> {
        let json = serde_json::to_string(&StoreMeta { dimension })?;
        write_atomically(&self.dir, META_FILE, &json)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| SemSearchError::Store("embedding store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| SemSearchError::Store("embedding store lock poisoned".into()))
    }
}

/// Write `dir/name` through a temporary file private to this process.
fn write_atomically(dir: &Path, name: &str, contents: &str) -> Result<()> {
    let target = dir.join(name);
    let tmp = dir.join(format!("{}.{}.tmp", name, std::process::id()));

    std::fs::write(&tmp, contents)?;
    if let Err(e) = std::fs::rename(&tmp, &target) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
