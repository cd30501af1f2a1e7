use crate::event::Identity;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// One labeled reference image
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub name: String,
    pub file_name: String,
}

/// Enrolled roster loaded from a directory of labeled reference images.
///
/// The identity is the file stem up to the first `_`, so `Hana_2.jpg`
/// enrolls another reference for "Hana".
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    /// Load every `.jpg` / `.png` reference in `dir`.
    ///
    /// A missing or unreadable directory yields an empty roster.
    pub fn load(dir: &Path) -> Self {
        let read_dir = match std::fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Known faces directory not found, roster is empty");
                return Self::default();
            }
        };

        let mut entries: Vec<RosterEntry> = read_dir
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry_for(&entry.file_name().to_string_lossy()))
            .collect();
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        info!(dir = %dir.display(), references = entries.len(), "Loaded known faces");
        Self { entries }
    }

    pub fn from_entries(entries: Vec<RosterEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct enrolled names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.name.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    /// Resolve a recognizer match (reference file name or enrolled name).
    pub fn identity_for(&self, reference: &str) -> Identity {
        self.entries
            .iter()
            .find(|e| e.file_name == reference || e.name == reference)
            .map(|e| Identity::Known(e.name.clone()))
            .unwrap_or(Identity::Unknown)
    }
}

fn entry_for(file_name: &str) -> Option<RosterEntry> {
    let path = PathBuf::from(file_name);
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if ext != "jpg" && ext != "png" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let name = stem.split('_').next().unwrap_or(stem);
    if name.is_empty() {
        return None;
    }
    Some(RosterEntry {
        name: name.to_string(),
        file_name: file_name.to_string(),
    })
}

/// Roster shared between connections; reload swaps the whole roster.
#[derive(Clone)]
pub struct SharedRoster {
    dir: PathBuf,
    inner: Arc<RwLock<Arc<Roster>>>,
}

impl SharedRoster {
    pub fn load(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let roster = Roster::load(&dir);
        Self {
            dir,
            inner: Arc::new(RwLock::new(Arc::new(roster))),
        }
    }

    /// Current roster; stays valid across a concurrent reload
    pub fn current(&self) -> Arc<Roster> {
        Arc::clone(&self.inner.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Full-roster replace from the directory. Returns the new reference count.
    pub fn reload(&self) -> usize {
        let roster = Arc::new(Roster::load(&self.dir));
        let count = roster.len();
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = roster;
        count
    }
}
