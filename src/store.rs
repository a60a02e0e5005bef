//! Artifacts left behind by the last successful reconciliation.
//!
//! The workspace directory holds the canonical dataset (`current.csv`), its sanitized
//! spreadsheet export (`consolidated.xlsx`) and the time of the last update
//! (`updated_at.txt`). A save writes both files to staging files first and replaces
//! nothing unless both succeed. When a canonical file cannot be replaced (typically
//! because a spreadsheet application holds it open) the artifact lands under a unique
//! alternate name instead and that path is reported back. Concurrent writers are not
//! coordinated; the last one to finish wins.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::Local;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dataset::Dataset,
    error::{ReconError, Result},
    io_utils::{ReadOptions, read_dataset, write_csv, write_xlsx},
};

pub const CURRENT_FILE: &str = "current.csv";
pub const EXPORT_FILE: &str = "consolidated.xlsx";
pub const TIMESTAMP_FILE: &str = "updated_at.txt";
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn current_path(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    pub fn export_path(&self) -> PathBuf {
        self.root.join(EXPORT_FILE)
    }

    fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|err| ReconError::io(&self.root, err))
    }

    /// Writes the canonical dataset and its spreadsheet export.
    ///
    /// Both files are first written to staging files inside the workspace and only moved
    /// into place once both writes succeeded, so a failed save leaves the previous
    /// artifacts as they were. Returns the paths actually written.
    pub fn save(&self, dataset: &Dataset) -> Result<(PathBuf, PathBuf)> {
        self.ensure_root()?;
        let current = Staged::write(&self.current_path(), |path| write_csv(dataset, path, None))?;
        let export = Staged::write(&self.export_path(), |path| write_xlsx(dataset, path))?;

        self.remove_fallbacks(CURRENT_FILE);
        let current = current.commit()?;
        self.remove_fallbacks(EXPORT_FILE);
        let export = export.commit()?;
        Ok((current, export))
    }

    /// Loads the most recently written canonical dataset, if any.
    pub fn load_current(&self) -> Result<Option<Dataset>> {
        match self.latest(CURRENT_FILE) {
            Some(path) => {
                debug!("Loading current dataset from {path:?}");
                read_dataset(&path, &ReadOptions::default()).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn last_updated(&self) -> Result<Option<String>> {
        let path = self.root.join(TIMESTAMP_FILE);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text.trim().to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ReconError::io(path, err)),
        }
    }

    /// Records the current local time as the last update and returns it.
    pub fn touch_timestamp(&self) -> Result<String> {
        self.ensure_root()?;
        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let path = self.root.join(TIMESTAMP_FILE);
        fs::write(&path, &stamp).map_err(|err| ReconError::io(path, err))?;
        Ok(stamp)
    }

    /// Removes every artifact, alternates included. Returns how many files were removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for name in [CURRENT_FILE, EXPORT_FILE, TIMESTAMP_FILE] {
            let path = self.root.join(name);
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(ReconError::io(path, err)),
            }
        }
        for name in [CURRENT_FILE, EXPORT_FILE] {
            for path in self.fallbacks(name) {
                fs::remove_file(&path).map_err(|err| ReconError::io(&path, err))?;
                removed += 1;
            }
        }
        info!("Removed {removed} artifact(s) from {:?}", self.root);
        Ok(removed)
    }

    fn fallbacks(&self, canonical: &str) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| is_fallback_name(name, canonical))
            })
            .collect()
    }

    fn remove_fallbacks(&self, canonical: &str) {
        for path in self.fallbacks(canonical) {
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed stale alternate {path:?}"),
                Err(err) => warn!("Could not remove stale alternate {path:?}: {err}"),
            }
        }
    }

    fn latest(&self, canonical: &str) -> Option<PathBuf> {
        let mut candidates = self.fallbacks(canonical);
        let path = self.root.join(canonical);
        if path.is_file() {
            candidates.push(path);
        }
        candidates.into_iter().max_by_key(|path| {
            fs::metadata(path)
                .and_then(|meta| meta.modified())
                .unwrap_or(UNIX_EPOCH)
        })
    }
}

/// An artifact written next to its canonical path, waiting to be moved into place.
/// Dropping it uncommitted deletes the staging file.
struct Staged {
    staging: PathBuf,
    canonical: PathBuf,
    committed: bool,
}

impl Staged {
    fn write<F>(canonical: &Path, write: F) -> Result<Self>
    where
        F: FnOnce(&Path) -> Result<()>,
    {
        let staged = Staged {
            staging: staging_path(canonical),
            canonical: canonical.to_path_buf(),
            committed: false,
        };
        write(&staged.staging)?;
        Ok(staged)
    }

    /// Moves the staged file onto the canonical path, or onto a unique alternate name
    /// when the canonical file cannot be replaced.
    fn commit(mut self) -> Result<PathBuf> {
        let target = match fs::rename(&self.staging, &self.canonical) {
            Ok(()) => self.canonical.clone(),
            Err(err) => {
                let alternate = alternate_path(&self.canonical);
                warn!(
                    "Could not replace {:?} ({err}); writing {alternate:?} instead",
                    self.canonical
                );
                fs::rename(&self.staging, &alternate)
                    .map_err(|err| ReconError::io(&alternate, err))?;
                alternate
            }
        };
        self.committed = true;
        Ok(target)
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        if !self.committed && self.staging.exists() {
            if let Err(err) = fs::remove_file(&self.staging) {
                warn!("Could not remove staging file {:?}: {err}", self.staging);
            }
        }
    }
}

/// Hidden `.<name>.<8 hex>.partial` next to `canonical`.
fn staging_path(canonical: &Path) -> PathBuf {
    let name = canonical
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    let tag = Uuid::new_v4().simple().to_string();
    canonical.with_file_name(format!(".{name}.{}.partial", &tag[..8]))
}

/// `<stem>_<unix-seconds>_<8 hex>.<ext>` next to `canonical`.
pub fn alternate_path(canonical: &Path) -> PathBuf {
    let stem = canonical
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("artifact");
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let tag = Uuid::new_v4().simple().to_string();
    let name = match canonical.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{seconds}_{}.{ext}", &tag[..8]),
        None => format!("{stem}_{seconds}_{}", &tag[..8]),
    };
    canonical.with_file_name(name)
}

fn is_fallback_name(name: &str, canonical: &str) -> bool {
    let (stem, ext) = canonical.rsplit_once('.').unwrap_or((canonical, ""));
    let Some(middle) = name
        .strip_prefix(stem)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|rest| rest.strip_suffix(ext))
        .and_then(|rest| rest.strip_suffix('.'))
    else {
        return false;
    };
    match middle.split_once('_') {
        Some((seconds, tag)) => {
            !seconds.is_empty()
                && seconds.bytes().all(|b| b.is_ascii_digit())
                && tag.len() == 8
                && tag.bytes().all(|b| b.is_ascii_hexdigit())
        }
        None => false,
    }
}

/// Paths and timestamp produced by [`Session::replace`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SavedArtifacts {
    pub current: PathBuf,
    pub export: PathBuf,
    pub updated_at: String,
}

/// Explicit holder of the current reconciled dataset, loaded from the store on first use.
#[derive(Debug)]
pub struct Session {
    store: ArtifactStore,
    current: Option<Dataset>,
}

impl Session {
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            current: None,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn current(&mut self) -> Result<Option<&Dataset>> {
        if self.current.is_none() {
            self.current = self.store.load_current()?;
        }
        Ok(self.current.as_ref())
    }

    /// Persists `dataset` (canonical copy, export, timestamp) and makes it current.
    pub fn replace(&mut self, dataset: Dataset) -> Result<SavedArtifacts> {
        let (current, export) = self.store.save(&dataset)?;
        let updated_at = self.store.touch_timestamp()?;
        info!(
            "Stored {} row(s) in {current:?} and {export:?}",
            dataset.row_count()
        );
        self.current = Some(dataset);
        Ok(SavedArtifacts {
            current,
            export,
            updated_at,
        })
    }

    pub fn clear(&mut self) -> Result<usize> {
        self.current = None;
        self.store.clear()
    }
}
