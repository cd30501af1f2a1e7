//! Face image storage for the hub.
//!
//! Captured crops land in `faces_dir` under a timestamped name. Promoting a
//! crop copies it into the enrolled roster directory as `<name>_<n>.jpg`.

use chrono::Local;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// URL prefix under which stored faces are served
pub const FACES_URL_PREFIX: &str = "/faces/";

/// Result of storing a face crop
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFace {
    pub filename: String,
    /// Timestamp component of the filename
    pub time: String,
}

impl StoredFace {
    pub fn url(&self) -> String {
        format!("{}{}", FACES_URL_PREFIX, self.filename)
    }
}

/// Media errors
#[derive(Debug)]
pub enum MediaError {
    InvalidName(String),
    NotFound(String),
    Io(std::io::Error),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::InvalidName(name) => write!(f, "invalid file name '{}'", name),
            MediaError::NotFound(name) => write!(f, "image '{}' not found", name),
            MediaError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for MediaError {}

impl From<std::io::Error> for MediaError {
    fn from(e: std::io::Error) -> Self {
        MediaError::Io(e)
    }
}

/// Filesystem store for captured faces and the enrolled roster
pub struct FaceStore {
    faces_dir: PathBuf,
    known_dir: PathBuf,
}

impl FaceStore {
    /// Creates both directories if needed.
    pub async fn open(faces_dir: impl Into<PathBuf>, known_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let store = Self {
            faces_dir: faces_dir.into(),
            known_dir: known_dir.into(),
        };
        fs::create_dir_all(&store.faces_dir).await?;
        fs::create_dir_all(&store.known_dir).await?;
        Ok(store)
    }

    pub fn faces_dir(&self) -> &Path {
        &self.faces_dir
    }

    pub fn known_dir(&self) -> &Path {
        &self.known_dir
    }

    /// Persist a face crop as `<name>_<YYYYmmdd_HHMMSS_ffffff>.jpg`.
    pub async fn store(&self, name: &str, image: &[u8]) -> Result<StoredFace, MediaError> {
        let safe_name = sanitize(name);
        let time = Local::now().format("%Y%m%d_%H%M%S_%6f").to_string();

        // Microsecond timestamps rarely collide; never overwrite when they do
        let mut attempt = 0u32;
        loop {
            let filename = if attempt == 0 {
                format!("{}_{}.jpg", safe_name, time)
            } else {
                format!("{}_{}_{}.jpg", safe_name, time, attempt)
            };
            let path = self.faces_dir.join(&filename);

            match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    file.write_all(image).await?;
                    file.flush().await?;
                    return Ok(StoredFace { filename, time });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read a stored face by file name.
    pub async fn read(&self, filename: &str) -> Result<Vec<u8>, MediaError> {
        validate_filename(filename)?;
        match fs::read(self.faces_dir.join(filename)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(MediaError::NotFound(filename.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Copy a stored face into the roster as `<name>_<next-index>.jpg`.
    ///
    /// `image_url` may be a full `/faces/...` reference; only its base name is
    /// used. Returns the roster file name.
    pub async fn promote(&self, name: &str, image_url: &str) -> Result<String, MediaError> {
        validate_filename(name)?;
        let filename = image_url.rsplit('/').next().unwrap_or_default();
        validate_filename(filename)?;

        let src = self.faces_dir.join(filename);
        if !fs::try_exists(&src).await? {
            return Err(MediaError::NotFound(filename.to_string()));
        }

        let prefix = format!("{}_", name);
        let mut existing = 0usize;
        let mut entries = fs::read_dir(&self.known_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                existing += 1;
            }
        }

        let saved_as = format!("{}{}.jpg", prefix, existing + 1);
        fs::copy(&src, self.known_dir.join(&saved_as)).await?;
        info!(name = %name, saved_as = %saved_as, "Promoted face into roster");
        Ok(saved_as)
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "UNKNOWN".to_string()
    } else {
        cleaned
    }
}

fn validate_filename(name: &str) -> Result<(), MediaError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(MediaError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_store() -> (TempDir, FaceStore) {
        let dir = TempDir::new().unwrap();
        let store = FaceStore::open(dir.path().join("faces"), dir.path().join("known"))
            .await
            .unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_store_uses_name_and_timestamp() {
        let (_dir, store) = temp_store().await;
        let stored = store.store("Hana Ali", b"jpeg").await.unwrap();

        assert!(stored.filename.starts_with("Hana_Ali_"));
        assert!(stored.filename.ends_with(".jpg"));
        assert!(stored.filename.contains(&stored.time));
        assert_eq!(stored.url(), format!("/faces/{}", stored.filename));
        assert_eq!(store.read(&stored.filename).await.unwrap(), b"jpeg");
    }

    #[tokio::test]
    async fn test_store_never_overwrites() {
        let (_dir, store) = temp_store().await;
        let mut names = std::collections::HashSet::new();
        for i in 0..20u8 {
            let stored = store.store("UNKNOWN", &[i]).await.unwrap();
            assert!(names.insert(stored.filename));
        }
    }

    #[tokio::test]
    async fn test_read_rejects_traversal() {
        let (_dir, store) = temp_store().await;
        assert!(matches!(
            store.read("../secret").await,
            Err(MediaError::InvalidName(_))
        ));
        assert!(matches!(
            store.read("missing.jpg").await,
            Err(MediaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_promote_numbers_roster_entries() {
        let (_dir, store) = temp_store().await;
        let first = store.store("UNKNOWN", b"a").await.unwrap();
        let second = store.store("UNKNOWN", b"b").await.unwrap();

        let saved = store.promote("Hana", &first.url()).await.unwrap();
        assert_eq!(saved, "Hana_1.jpg");
        let saved = store.promote("Hana", &second.filename).await.unwrap();
        assert_eq!(saved, "Hana_2.jpg");
        let saved = store.promote("Menna", &second.url()).await.unwrap();
        assert_eq!(saved, "Menna_1.jpg");

        let copied = std::fs::read(store.known_dir().join("Hana_2.jpg")).unwrap();
        assert_eq!(copied, b"b");
    }

    #[tokio::test]
    async fn test_promote_missing_source() {
        let (_dir, store) = temp_store().await;
        assert!(matches!(
            store.promote("Hana", "/faces/nope.jpg").await,
            Err(MediaError::NotFound(_))
        ));
    }
}
