//! Ordered feedback store backed by a single JSON file.
//!
//! Every mutating call builds the next record list, writes it to a sibling
//! temporary file, fsyncs, and renames it over the target before the
//! in-memory view is swapped. A failed write therefore leaves both views as
//! they were.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::embeddings::EmbeddingSpace;
use crate::record::FeedbackRecord;
use crate::{MemoryError, MemoryResult};

/// Predicate applied to record tasks when listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter<'a> {
    /// Every record.
    All,
    /// Records whose task equals the value exactly (case-sensitive).
    Exact(&'a str),
    /// Records whose task contains the value (case-sensitive).
    Substring(&'a str),
}

impl TaskFilter<'_> {
    fn matches(self, task: &str) -> bool {
        match self {
            Self::All => true,
            Self::Exact(expected) => task == expected,
            Self::Substring(needle) => task.contains(needle),
        }
    }
}

/// In-memory record list mirrored to an optional file.
///
/// Every record belongs to the store's [`EmbeddingSpace`]: same embedder tag,
/// same vector length.
#[derive(Debug)]
pub struct FeedbackStore {
    path: Option<PathBuf>,
    space: EmbeddingSpace,
    records: Vec<FeedbackRecord>,
}

impl FeedbackStore {
    /// Opens the store at `path`, loading existing records when the file exists.
    ///
    /// A missing or blank file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Format`] when the file cannot be read, does not
    /// decode, or holds records from another embedding space.
    pub fn open(path: impl Into<PathBuf>, space: EmbeddingSpace) -> MemoryResult<Self> {
        let path = path.into();
        let records = match read_records(&path, &space) {
            Ok(records) => records,
            Err(ReadError::Missing) => Vec::new(),
            Err(ReadError::Memory(err)) => return Err(err),
        };
        info!(path = %path.display(), records = records.len(), "feedback store loaded");

        Ok(Self {
            path: Some(path),
            space,
            records,
        })
    }

    /// Creates an empty store at `path`, overwriting whatever the file held.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Io`] when the empty store cannot be written.
    pub fn create(path: impl Into<PathBuf>, space: EmbeddingSpace) -> MemoryResult<Self> {
        let path = path.into();
        write_records(&path, &[])?;
        info!(path = %path.display(), "feedback store cleared on start");

        Ok(Self {
            path: Some(path),
            space,
            records: Vec::new(),
        })
    }

    /// Creates a store that never touches the filesystem.
    #[must_use]
    pub fn ephemeral(space: EmbeddingSpace) -> Self {
        Self {
            path: None,
            space,
            records: Vec::new(),
        }
    }

    /// Returns the backing file, or `None` for ephemeral stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the embedding space every record must belong to.
    #[must_use]
    pub fn space(&self) -> &EmbeddingSpace {
        &self.space
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` when no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in append order.
    #[must_use]
    pub fn records(&self) -> &[FeedbackRecord] {
        &self.records
    }

    /// Appends a record and persists the store.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidEmbedding`] when the record comes from
    /// another embedder or has the wrong dimensionality, and
    /// [`MemoryError::Io`] when persisting fails. The store is unchanged on
    /// error.
    pub fn append(&mut self, record: FeedbackRecord) -> MemoryResult<&FeedbackRecord> {
        if record.embedder() != self.space.embedder() {
            return Err(MemoryError::InvalidEmbedding(
                "record was embedded by a different embedder than the store",
            ));
        }
        if record.embedding().len() != self.space.dimensions() {
            return Err(MemoryError::InvalidEmbedding(
                "record embedding does not match the store dimensionality",
            ));
        }

        let mut next = self.records.clone();
        next.push(record);
        self.commit(next)?;
        debug!(records = self.records.len(), "feedback appended");

        let last = self.records.len() - 1;
        Ok(&self.records[last])
    }

    /// Removes the record at `index` (0-based) and persists the store.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::IndexOutOfRange`] without mutating anything when
    /// `index` is out of bounds, or [`MemoryError::Io`] when persisting fails.
    pub fn remove(&mut self, index: usize) -> MemoryResult<FeedbackRecord> {
        if index >= self.records.len() {
            return Err(MemoryError::IndexOutOfRange {
                index,
                len: self.records.len(),
            });
        }

        let mut next = self.records.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        debug!(index, records = self.records.len(), "feedback removed");
        Ok(removed)
    }

    /// Removes every record whose task equals `task` exactly.
    ///
    /// Returns the number of records removed; zero is not an error and skips
    /// the write.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Io`] when persisting fails.
    pub fn remove_for_task(&mut self, task: &str) -> MemoryResult<usize> {
        let next: Vec<FeedbackRecord> = self
            .records
            .iter()
            .filter(|record| record.task() != task)
            .cloned()
            .collect();
        let removed = self.records.len() - next.len();
        if removed > 0 {
            self.commit(next)?;
            debug!(removed, records = self.records.len(), "feedback removed for task");
        }
        Ok(removed)
    }

    /// Lists matching records with their current indices.
    #[must_use]
    pub fn list(&self, filter: TaskFilter<'_>) -> Vec<(usize, FeedbackRecord)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, record)| filter.matches(record.task()))
            .map(|(index, record)| (index, record.clone()))
            .collect()
    }

    /// Writes the current records to `path` in the store file format.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Io`] when the file cannot be written.
    pub fn export(&self, path: &Path) -> MemoryResult<()> {
        write_records(path, &self.records)?;
        info!(path = %path.display(), records = self.records.len(), "feedback store exported");
        Ok(())
    }

    /// Replaces every record with the contents of `path`, then persists.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Format`] when the file is absent, malformed, or
    /// holds records from another embedding space, and [`MemoryError::Io`]
    /// when persisting fails.
    pub fn import(&mut self, path: &Path) -> MemoryResult<usize> {
        let records = match read_records(path, &self.space) {
            Ok(records) => records,
            Err(ReadError::Missing) => {
                return Err(MemoryError::format(path, "file does not exist"));
            }
            Err(ReadError::Memory(err)) => return Err(err),
        };

        let count = records.len();
        self.commit(records)?;
        info!(path = %path.display(), records = count, "feedback store imported");
        Ok(count)
    }

    /// Removes every record and persists the empty store.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Io`] when persisting fails.
    pub fn reset(&mut self) -> MemoryResult<()> {
        self.commit(Vec::new())?;
        info!("feedback store reset");
        Ok(())
    }

    fn commit(&mut self, next: Vec<FeedbackRecord>) -> MemoryResult<()> {
        if let Some(path) = &self.path {
            write_records(path, &next)?;
        }
        self.records = next;
        Ok(())
    }
}

enum ReadError {
    Missing,
    Memory(MemoryError),
}

fn read_records(path: &Path, space: &EmbeddingSpace) -> Result<Vec<FeedbackRecord>, ReadError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Err(ReadError::Missing),
        Err(err) => return Err(ReadError::Memory(MemoryError::format(path, err.to_string()))),
    };

    if data.trim().is_empty() {
        return Ok(Vec::new());
    }

    let records: Vec<FeedbackRecord> = serde_json::from_str(&data)
        .map_err(|err| ReadError::Memory(MemoryError::format(path, err.to_string())))?;

    for (index, record) in records.iter().enumerate() {
        if let Some(reason) = space_mismatch(space, record) {
            return Err(ReadError::Memory(MemoryError::format(
                path,
                format!("record {index} {reason}"),
            )));
        }
    }

    Ok(records)
}

fn space_mismatch(space: &EmbeddingSpace, record: &FeedbackRecord) -> Option<String> {
    if record.embedder() != space.embedder() {
        return Some(format!(
            "was embedded by `{}`, this store uses `{}`",
            record.embedder(),
            space.embedder()
        ));
    }
    if record.embedding().len() != space.dimensions() {
        return Some(format!(
            "has {} embedding dimensions, expected {}",
            record.embedding().len(),
            space.dimensions()
        ));
    }
    None
}

fn write_records(path: &Path, records: &[FeedbackRecord]) -> MemoryResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| MemoryError::io(parent, err))?;
    }

    let mut data = serde_json::to_vec_pretty(records)
        .map_err(|err| MemoryError::format(path, err.to_string()))?;
    data.push(b'\n');

    let staging = staging_path(path);
    let written = File::create(&staging).and_then(|mut file| {
        file.write_all(&data)?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|()| fs::rename(&staging, path)) {
        let _ = fs::remove_file(&staging);
        return Err(MemoryError::io(path, err));
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| OsString::from("memory"), OsString::from);
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::embeddings::EmbeddingVector;

    const EMBEDDER: &str = "test/fixed";

    fn space(dimensions: usize) -> EmbeddingSpace {
        EmbeddingSpace::new(EMBEDDER, dimensions)
    }

    fn record(task: &str, feedback: &str) -> FeedbackRecord {
        FeedbackRecord::new(
            task,
            feedback,
            EMBEDDER,
            EmbeddingVector::new(vec![1.0, 0.0]).unwrap(),
        )
    }

    fn tasks(store: &FeedbackStore) -> Vec<&str> {
        store.records().iter().map(FeedbackRecord::task).collect()
    }

    #[test]
    fn append_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("memory.json");

        let mut store = FeedbackStore::open(&path, space(2)).unwrap();
        assert!(store.is_empty());
        store.append(record("a", "fa")).unwrap();
        store.append(record("b", "fb")).unwrap();

        let reloaded = FeedbackStore::open(&path, space(2)).unwrap();
        assert_eq!(reloaded.records(), store.records());
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn append_rejects_wrong_dimensionality() {
        let mut store = FeedbackStore::ephemeral(space(3));
        let err = store.append(record("a", "fa")).expect_err("dimension mismatch");
        assert!(matches!(err, MemoryError::InvalidEmbedding(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn remove_out_of_range_leaves_store_untouched() {
        let mut store = FeedbackStore::ephemeral(space(2));
        for task in ["A", "B", "C"] {
            store.append(record(task, "f")).unwrap();
        }

        let err = store.remove(5).expect_err("out of range");
        assert!(matches!(err, MemoryError::IndexOutOfRange { index: 5, len: 3 }));
        assert_eq!(tasks(&store), ["A", "B", "C"]);

        let removed = store.remove(1).unwrap();
        assert_eq!(removed.task(), "B");
        assert_eq!(tasks(&store), ["A", "C"]);
    }

    #[test]
    fn remove_for_task_counts_exact_matches() {
        let mut store = FeedbackStore::ephemeral(space(2));
        store.append(record("email", "1")).unwrap();
        store.append(record("Email", "2")).unwrap();
        store.append(record("email", "3")).unwrap();

        assert_eq!(store.remove_for_task("email").unwrap(), 2);
        assert_eq!(store.remove_for_task("missing").unwrap(), 0);
        assert_eq!(tasks(&store), ["Email"]);
    }

    #[test]
    fn list_filters_keep_original_indices() {
        let mut store = FeedbackStore::ephemeral(space(2));
        store.append(record("Write a marketing email", "1")).unwrap();
        store.append(record("Describe headphones", "2")).unwrap();
        store.append(record("Write an email about shipping", "3")).unwrap();

        let exact = store.list(TaskFilter::Exact("Describe headphones"));
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].0, 1);

        let substring: Vec<usize> = store
            .list(TaskFilter::Substring("email"))
            .into_iter()
            .map(|(index, _)| index)
            .collect();
        assert_eq!(substring, [0, 2]);

        assert_eq!(store.list(TaskFilter::All).len(), 3);
        assert!(store.list(TaskFilter::Exact("describe headphones")).is_empty());
    }

    #[test]
    fn export_then_import_replaces_contents() {
        let dir = TempDir::new().unwrap();
        let export = dir.path().join("export.json");

        let mut source = FeedbackStore::ephemeral(space(2));
        source.append(record("a", "fa")).unwrap();
        source.append(record("b", "fb")).unwrap();
        source.export(&export).unwrap();

        let primary = dir.path().join("memory.json");
        let mut target = FeedbackStore::open(&primary, space(2)).unwrap();
        target.append(record("old", "gone")).unwrap();

        assert_eq!(target.import(&export).unwrap(), 2);
        assert_eq!(target.records(), source.records());
        assert_eq!(FeedbackStore::open(&primary, space(2)).unwrap().records(), source.records());
    }

    #[test]
    fn import_rejects_missing_malformed_and_mismatched_files() {
        let dir = TempDir::new().unwrap();
        let mut store = FeedbackStore::ephemeral(space(2));
        store.append(record("keep", "me")).unwrap();

        let missing = dir.path().join("missing.json");
        assert!(matches!(store.import(&missing), Err(MemoryError::Format { .. })));

        let malformed = dir.path().join("malformed.json");
        fs::write(&malformed, "{ not json").unwrap();
        assert!(matches!(store.import(&malformed), Err(MemoryError::Format { .. })));

        let wide = dir.path().join("wide.json");
        let mut other = FeedbackStore::ephemeral(space(3));
        other
            .append(FeedbackRecord::new(
                "x",
                "y",
                EMBEDDER,
                EmbeddingVector::new(vec![1.0, 0.0, 0.0]).unwrap(),
            ))
            .unwrap();
        other.export(&wide).unwrap();
        assert!(matches!(store.import(&wide), Err(MemoryError::Format { .. })));

        assert_eq!(tasks(&store), ["keep"]);
    }

    #[test]
    fn records_from_another_embedder_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memory.json");
        let other = EmbeddingSpace::new("other/model-b", 2);

        let mut store = FeedbackStore::open(&path, space(2)).unwrap();
        store.append(record("a", "fa")).unwrap();

        let err = FeedbackStore::open(&path, other.clone()).unwrap_err();
        assert!(matches!(err, MemoryError::Format { ref reason, .. } if reason.contains("test/fixed")));

        let mut foreign = FeedbackStore::ephemeral(other);
        assert!(matches!(foreign.import(&path), Err(MemoryError::Format { .. })));
        assert!(foreign.is_empty());

        let stray = FeedbackRecord::new(
            "b",
            "fb",
            "other/model-b",
            EmbeddingVector::new(vec![1.0, 0.0]).unwrap(),
        );
        assert!(matches!(store.append(stray), Err(MemoryError::InvalidEmbedding(_))));
        assert_eq!(tasks(&store), ["a"]);
    }

    #[test]
    fn failed_write_keeps_records_and_cleans_staging_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memory.json");
        let mut store = FeedbackStore::open(&path, space(2)).unwrap();
        store.append(record("a", "fa")).unwrap();

        // A directory in place of the store file makes the final rename fail.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupant"), "x").unwrap();

        assert!(matches!(store.append(record("b", "fb")), Err(MemoryError::Io { .. })));
        assert!(matches!(store.remove(0), Err(MemoryError::Io { .. })));
        assert!(matches!(store.reset(), Err(MemoryError::Io { .. })));
        assert_eq!(tasks(&store), ["a"]);
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn open_rejects_corrupt_file_and_accepts_blank_one() {
        let dir = TempDir::new().unwrap();
        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "[{\"task\": 1}]").unwrap();
        assert!(matches!(
            FeedbackStore::open(&corrupt, space(2)),
            Err(MemoryError::Format { .. })
        ));

        let blank = dir.path().join("blank.json");
        fs::write(&blank, "  \n").unwrap();
        assert!(FeedbackStore::open(&blank, space(2)).unwrap().is_empty());
    }

    #[test]
    fn reset_clears_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memory.json");
        let mut store = FeedbackStore::open(&path, space(2)).unwrap();
        store.append(record("a", "fa")).unwrap();

        store.reset().unwrap();
        assert!(store.is_empty());
        assert!(FeedbackStore::open(&path, space(2)).unwrap().is_empty());
    }

    #[test]
    fn create_overwrites_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("memory.json");
        fs::write(&path, "garbage").unwrap();

        let store = FeedbackStore::create(&path, space(2)).unwrap();
        assert!(store.is_empty());
        assert!(FeedbackStore::open(&path, space(2)).unwrap().is_empty());
    }

    #[test]
    fn ephemeral_store_never_writes() {
        let mut store = FeedbackStore::ephemeral(space(2));
        store.append(record("a", "fa")).unwrap();
        store.reset().unwrap();
        assert!(store.path().is_none());
    }
}
