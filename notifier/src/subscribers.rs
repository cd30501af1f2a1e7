use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Chat id of an external recipient
pub type SubscriberId = i64;

/// Named subscriber sets, each backed by its own append-only file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriberSet {
    /// Everyone who ever sent `/start`
    AllUsers,
    Started,
    Vibration,
    Nfc,
    Face,
}

impl SubscriberSet {
    pub const ALL: [SubscriberSet; 5] = [
        SubscriberSet::AllUsers,
        SubscriberSet::Started,
        SubscriberSet::Vibration,
        SubscriberSet::Nfc,
        SubscriberSet::Face,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            SubscriberSet::AllUsers => "chat_ids.txt",
            SubscriberSet::Started => "started_users.txt",
            SubscriberSet::Vibration => "vibration_subs.txt",
            SubscriberSet::Nfc => "nfc_subs.txt",
            SubscriberSet::Face => "face_subs.txt",
        }
    }
}

/// Subscriber membership: in-memory sets plus one append-only log per set.
///
/// `add` persists, `remove` only touches memory. The log is never rewritten,
/// so a member removed during a session is back after the next `load`.
pub struct SubscriberRegistry {
    dir: PathBuf,
    sets: Mutex<HashMap<SubscriberSet, HashSet<SubscriberId>>>,
}

impl SubscriberRegistry {
    /// Create the directory if needed and replay every set's log.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create subscriber directory {}", dir.display()))?;

        let registry = Self {
            dir,
            sets: Mutex::new(HashMap::new()),
        };
        for set in SubscriberSet::ALL {
            registry.load(set)?;
        }
        Ok(registry)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, set: SubscriberSet) -> PathBuf {
        self.dir.join(set.file_name())
    }

    /// Replay `set`'s log into memory. Malformed lines are skipped; a
    /// missing file is an empty set. Returns the member count.
    pub fn load(&self, set: SubscriberSet) -> Result<usize> {
        let path = self.path(set);
        let mut members = HashSet::new();

        match fs::File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
                    match line.trim().parse::<SubscriberId>() {
                        Ok(id) => {
                            members.insert(id);
                        }
                        Err(_) if line.trim().is_empty() => {}
                        Err(_) => debug!(file = %path.display(), line = %line, "Skipping malformed subscriber line"),
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to open {}", path.display())),
        }

        let count = members.len();
        self.lock().insert(set, members);
        info!(set = ?set, members = count, "Loaded subscribers");
        Ok(count)
    }

    /// Idempotent add. Returns `true` when `id` was not yet a member.
    ///
    /// Membership is claimed before the log append, so concurrent adds of
    /// one id write a single line. A failed append releases the claim.
    pub async fn add(&self, set: SubscriberSet, id: SubscriberId) -> Result<bool> {
        let claimed = self.lock().entry(set).or_default().insert(id);
        if !claimed {
            return Ok(false);
        }

        if let Err(e) = self.append(set, id).await {
            if let Some(members) = self.lock().get_mut(&set) {
                members.remove(&id);
            }
            return Err(e);
        }

        info!(set = ?set, subscriber = id, "Subscriber added");
        Ok(true)
    }

    async fn append(&self, set: SubscriberSet, id: SubscriberId) -> Result<()> {
        let path = self.path(set);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.write_all(format!("{}\n", id).as_bytes())
            .await
            .with_context(|| format!("Failed to append to {}", path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("Failed to flush {}", path.display()))?;
        Ok(())
    }

    /// Session-only removal; the log keeps the member.
    pub fn remove(&self, set: SubscriberSet, id: SubscriberId) -> bool {
        let removed = self
            .lock()
            .get_mut(&set)
            .map(|members| members.remove(&id))
            .unwrap_or(false);
        if removed {
            info!(set = ?set, subscriber = id, "Subscriber removed for this session");
        }
        removed
    }

    /// Point-in-time copy of `set`, sorted.
    pub fn members(&self, set: SubscriberSet) -> Vec<SubscriberId> {
        let mut members: Vec<SubscriberId> = self
            .lock()
            .get(&set)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    pub fn is_empty(&self, set: SubscriberSet) -> bool {
        self.lock().get(&set).map_or(true, |m| m.is_empty())
    }

    pub fn contains(&self, set: SubscriberSet, id: SubscriberId) -> bool {
        self.lock().get(&set).map_or(false, |m| m.contains(&id))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriberSet, HashSet<SubscriberId>>> {
        self.sets.lock().unwrap_or_else(|e| {
            warn!("Subscriber registry lock poisoned, recovering");
            e.into_inner()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn log_lines(dir: &Path, set: SubscriberSet) -> Vec<String> {
        fs::read_to_string(dir.join(set.file_name()))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let registry = SubscriberRegistry::open(dir.path()).unwrap();

        assert!(registry.add(SubscriberSet::Face, 42).await.unwrap());
        assert!(!registry.add(SubscriberSet::Face, 42).await.unwrap());

        assert_eq!(registry.members(SubscriberSet::Face), vec![42]);
        assert_eq!(log_lines(dir.path(), SubscriberSet::Face), vec!["42"]);
    }

    #[tokio::test]
    async fn test_remove_is_session_only() {
        let dir = TempDir::new().unwrap();
        let registry = SubscriberRegistry::open(dir.path()).unwrap();
        registry.add(SubscriberSet::Vibration, 7).await.unwrap();

        assert!(registry.remove(SubscriberSet::Vibration, 7));
        assert!(!registry.remove(SubscriberSet::Vibration, 7));
        assert!(registry.is_empty(SubscriberSet::Vibration));
        assert_eq!(log_lines(dir.path(), SubscriberSet::Vibration), vec!["7"]);

        // Restart resurrects the removed member
        let reopened = SubscriberRegistry::open(dir.path()).unwrap();
        assert_eq!(reopened.members(SubscriberSet::Vibration), vec![7]);
    }

    #[test]
    fn test_load_skips_malformed_lines() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(SubscriberSet::Nfc.file_name()),
            "12\nnot-a-number\n\n-100200\n12\n3.5\n",
        )
        .unwrap();

        let registry = SubscriberRegistry::open(dir.path()).unwrap();
        assert_eq!(registry.members(SubscriberSet::Nfc), vec![-100200, 12]);
    }

    #[tokio::test]
    async fn test_sets_are_independent() {
        let dir = TempDir::new().unwrap();
        let registry = SubscriberRegistry::open(dir.path()).unwrap();
        registry.add(SubscriberSet::AllUsers, 1).await.unwrap();
        registry.add(SubscriberSet::Started, 1).await.unwrap();

        assert!(registry.contains(SubscriberSet::AllUsers, 1));
        assert!(registry.contains(SubscriberSet::Started, 1));
        assert!(!registry.contains(SubscriberSet::Face, 1));
        assert_eq!(log_lines(dir.path(), SubscriberSet::AllUsers), vec!["1"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_write_one_line() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(SubscriberRegistry::open(dir.path()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.add(SubscriberSet::Face, 77).await.unwrap() })
            })
            .collect();
        let mut added = 0;
        for handle in handles {
            if handle.await.unwrap() {
                added += 1;
            }
        }

        assert_eq!(added, 1);
        assert_eq!(log_lines(dir.path(), SubscriberSet::Face), vec!["77"]);
    }

    #[tokio::test]
    async fn test_failed_append_leaves_membership_unchanged() {
        let dir = TempDir::new().unwrap();
        let subs = dir.path().join("subs");
        let registry = SubscriberRegistry::open(&subs).unwrap();
        fs::remove_dir_all(&subs).unwrap();

        assert!(registry.add(SubscriberSet::Nfc, 5).await.is_err());
        assert!(!registry.contains(SubscriberSet::Nfc, 5));
    }

    #[tokio::test]
    async fn test_members_is_a_copy() {
        let dir = TempDir::new().unwrap();
        let registry = SubscriberRegistry::open(dir.path()).unwrap();
        registry.add(SubscriberSet::Face, 1).await.unwrap();
        registry.add(SubscriberSet::Face, 2).await.unwrap();

        let snapshot = registry.members(SubscriberSet::Face);
        registry.remove(SubscriberSet::Face, 1);
        registry.add(SubscriberSet::Face, 3).await.unwrap();

        assert_eq!(snapshot, vec![1, 2]);
        assert_eq!(registry.members(SubscriberSet::Face), vec![2, 3]);
    }
}
