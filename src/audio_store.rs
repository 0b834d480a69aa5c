//! On-disk store for synthesized audio and its retention policy.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::io::AsyncWriteExt;

use crate::config::AudioStoreConfig;

pub const ARTIFACT_PREFIX: &str = "output_";

#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
    extension: String,
    keep: usize,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>, keep: usize) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
            keep: keep.max(1),
        }
    }

    pub fn from_config(config: &AudioStoreConfig, extension: &str) -> Self {
        Self::new(&config.dir, extension, config.keep)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn keep(&self) -> usize {
        self.keep
    }

    /// Persist one artifact named after the current second.
    ///
    /// Two saves within the same second get `_1`, `_2`... suffixes instead
    /// of overwriting each other. Names are claimed with `create_new`, so
    /// this holds for saves running in parallel too.
    pub async fn save(&self, audio_data: &[u8]) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let timestamp = chrono::Utc::now().timestamp();
        let mut attempt = 0;
        let (path, mut file) = loop {
            let path = self
                .dir
                .join(artifact_name(timestamp, attempt, &self.extension));
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e),
            }
        };

        file.write_all(audio_data).await?;
        file.flush().await?;
        log::info!("💾 Saved {} bytes of audio to {}", audio_data.len(), path.display());
        Ok(path)
    }

    /// Apply the retention policy to this store's directory.
    ///
    /// The directory walk runs on the blocking pool.
    pub async fn prune(&self) -> usize {
        let dir = self.dir.clone();
        let extension = self.extension.clone();
        let keep = self.keep;

        match tokio::task::spawn_blocking(move || prune_with_extension(&dir, keep, &extension)).await
        {
            Ok(removed) => removed,
            Err(e) => {
                log::warn!("Audio cleanup task failed: {}", e);
                0
            }
        }
    }
}

/// `(timestamp, suffix)` of an artifact name, `None` for foreign names
fn artifact_order(path: &Path) -> Option<(i64, u32)> {
    let stem = path.file_stem()?.to_str()?.strip_prefix(ARTIFACT_PREFIX)?;
    match stem.split_once('_') {
        Some((timestamp, suffix)) => Some((timestamp.parse().ok()?, suffix.parse().ok()?)),
        None => Some((stem.parse().ok()?, 0)),
    }
}

/// Oldest first: creation time, then the name's `(timestamp, suffix)`,
/// then the raw path.
fn sort_oldest_first(artifacts: &mut [(SystemTime, PathBuf)]) {
    artifacts.sort_by_cached_key(|(created, path)| {
        (*created, artifact_order(path).unwrap_or((i64::MAX, u32::MAX)), path.clone())
    });
}

fn artifact_name(timestamp: i64, attempt: u32, extension: &str) -> String {
    if attempt == 0 {
        format!("{}{}.{}", ARTIFACT_PREFIX, timestamp, extension)
    } else {
        format!("{}{}_{}.{}", ARTIFACT_PREFIX, timestamp, attempt, extension)
    }
}

/// Keep the `keep` newest `.mp3` files in `dir` and delete the rest.
///
/// See [`prune_with_extension`].
pub fn prune(dir: &Path, keep: usize) -> usize {
    prune_with_extension(dir, keep, "mp3")
}

/// Keep the `keep` newest files with `extension` in `dir`, oldest deleted
/// first by creation time. Best effort: a missing directory is a no-op and
/// files that cannot be removed are left behind. Returns how many files
/// were actually removed.
pub fn prune_with_extension(dir: &Path, keep: usize, extension: &str) -> usize {
    let keep = keep.max(1);

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(e) => {
            log::warn!("Could not list audio directory {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut artifacts: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            let metadata = entry.metadata().ok()?;
            if !metadata.is_file() || !has_extension(&path, extension) {
                return None;
            }
            let created = metadata
                .created()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            Some((created, path))
        })
        .collect();

    if artifacts.len() <= keep {
        return 0;
    }

    sort_oldest_first(&mut artifacts);
    let excess = artifacts.len() - keep;

    let mut removed = 0;
    for (_, path) in artifacts.into_iter().take(excess) {
        match fs::remove_file(&path) {
            Ok(()) => {
                removed += 1;
                log::debug!("🗑️ Removed old audio file {}", path.display());
            }
            // Another turn got there first
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not remove {}: {}", path.display(), e),
        }
    }

    removed
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_names() {
        assert_eq!(artifact_name(1_700_000_000, 0, "mp3"), "output_1700000000.mp3");
        assert_eq!(artifact_name(1_700_000_000, 2, "wav"), "output_1700000000_2.wav");
    }

    #[test]
    fn test_artifact_order_parses_suffix() {
        assert_eq!(artifact_order(Path::new("a/output_1700000000.mp3")), Some((1_700_000_000, 0)));
        assert_eq!(artifact_order(Path::new("a/output_1700000000_10.mp3")), Some((1_700_000_000, 10)));
        assert_eq!(artifact_order(Path::new("a/recording.mp3")), None);
    }

    #[test]
    fn test_equal_times_order_by_numeric_suffix() {
        let same = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);
        let mut artifacts = vec![
            (same, PathBuf::from("output_1700000000_10.mp3")),
            (same, PathBuf::from("output_1700000000_2.mp3")),
            (same, PathBuf::from("output_1700000000.mp3")),
            (same, PathBuf::from("output_1699999999_3.mp3")),
        ];

        sort_oldest_first(&mut artifacts);

        let names: Vec<_> = artifacts
            .iter()
            .map(|(_, p)| p.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "output_1699999999_3.mp3",
                "output_1700000000.mp3",
                "output_1700000000_2.mp3",
                "output_1700000000_10.mp3",
            ]
        );
    }

    #[test]
    fn test_extension_filter() {
        assert!(has_extension(Path::new("audio_output/output_1.mp3"), "mp3"));
        assert!(!has_extension(Path::new("audio_output/output_1.wav"), "mp3"));
        assert!(!has_extension(Path::new("audio_output/mp3"), "mp3"));
    }

    #[test]
    fn test_keep_is_at_least_one() {
        let store = AudioStore::new("audio_output", "mp3", 0);
        assert_eq!(store.keep(), 1);
    }

    #[tokio::test]
    async fn test_same_second_saves_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path().join("audio"), "mp3", 10);

        let first = store.save(b"one").await.unwrap();
        let second = store.save(b"two").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        assert!(first
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(ARTIFACT_PREFIX) && n.ends_with(".mp3")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_saves_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(AudioStore::new(dir.path(), "mp3", 10));

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move { (i, store.save(&[i; 64]).await.unwrap()) })
            })
            .collect();

        let mut paths = std::collections::HashSet::new();
        for handle in handles {
            let (i, path) = handle.await.unwrap();
            assert_eq!(std::fs::read(&path).unwrap(), vec![i; 64]);
            assert!(paths.insert(path));
        }
        assert_eq!(paths.len(), 8);
    }

    #[tokio::test]
    async fn test_prune_runs_from_async_context() {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path(), "mp3", 1);
        store.save(b"old").await.unwrap();
        store.save(b"new").await.unwrap();

        assert_eq!(store.prune().await, 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
