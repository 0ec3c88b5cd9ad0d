//! Media library over a directory of audio files

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::{AudioAsset, MediaLibraryAdapter, PermissionStatus},
};
use lofty::file::AudioFile;
use lofty::probe::Probe;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Extensions treated as audio, compared case-insensitively.
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "aac", "flac", "wav", "ogg", "opus"];

/// Directory-scanning media library implementation
///
/// Walks `root` recursively and reports every file with an audio extension.
/// Durations are read from the container with `lofty`; files it cannot parse
/// are still listed, with a zero duration. Desktop file access needs no
/// runtime permission, so permission queries always report granted.
pub struct DirectoryMediaLibrary {
    root: PathBuf,
}

impl DirectoryMediaLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Library over the platform music directory (`~/Music` and equivalents).
    pub fn user_music_dir() -> Option<Self> {
        dirs::audio_dir().map(Self::new)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_audio_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                AUDIO_EXTENSIONS
                    .iter()
                    .any(|candidate| candidate.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    async fn collect_audio_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(BridgeError::Io)?;
            while let Some(entry) = entries.next_entry().await.map_err(BridgeError::Io)? {
                let file_type = entry.file_type().await.map_err(BridgeError::Io)?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() && Self::is_audio_file(&path) {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    fn asset_for(&self, path: &Path, duration_ms: u64) -> AudioAsset {
        // Relative path doubles as a stable id across rescans.
        let id = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| id.clone());

        AudioAsset {
            id,
            uri: path.to_string_lossy().into_owned(),
            filename,
            duration_ms,
        }
    }
}

fn probe_duration_ms(path: &Path) -> Option<u64> {
    let tagged_file = Probe::open(path).ok()?.guess_file_type().ok()?.read().ok()?;
    Some(tagged_file.properties().duration().as_millis() as u64)
}

#[async_trait]
impl MediaLibraryAdapter for DirectoryMediaLibrary {
    async fn permission_status(&self) -> Result<PermissionStatus> {
        Ok(PermissionStatus::granted())
    }

    async fn request_permission(&self) -> Result<PermissionStatus> {
        Ok(PermissionStatus::granted())
    }

    async fn list_audio_assets(&self) -> Result<Vec<AudioAsset>> {
        if !fs::try_exists(&self.root).await.map_err(BridgeError::Io)? {
            return Err(BridgeError::NotAvailable(format!(
                "Music directory {:?} does not exist",
                self.root
            )));
        }

        let files = self.collect_audio_files().await?;

        let probe_targets = files.clone();
        let durations = tokio::task::spawn_blocking(move || {
            probe_targets
                .iter()
                .map(|path| probe_duration_ms(path))
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("Duration probe panicked: {}", e)))?;

        let assets: Vec<AudioAsset> = files
            .iter()
            .zip(durations)
            .map(|(path, duration)| {
                if duration.is_none() {
                    debug!(path = ?path, "Could not read duration");
                }
                self.asset_for(path, duration.unwrap_or(0))
            })
            .collect();

        info!(root = ?self.root, count = assets.len(), "Scanned music directory");
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.unwrap();
        }
        fs::write(path, b"not really audio").await.unwrap();
    }

    #[test]
    fn test_audio_extension_matching() {
        assert!(DirectoryMediaLibrary::is_audio_file(Path::new("a/song.MP3")));
        assert!(DirectoryMediaLibrary::is_audio_file(Path::new("b.flac")));
        assert!(!DirectoryMediaLibrary::is_audio_file(Path::new("cover.jpg")));
        assert!(!DirectoryMediaLibrary::is_audio_file(Path::new("README")));
    }

    #[tokio::test]
    async fn test_scan_is_recursive_and_sorted() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("b.mp3")).await;
        touch(&dir.path().join("album").join("a.flac")).await;
        touch(&dir.path().join("album").join("cover.jpg")).await;

        let library = DirectoryMediaLibrary::new(dir.path());
        let assets = library.list_audio_assets().await.unwrap();

        let ids: Vec<_> = assets.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["album/a.flac", "b.mp3"]);
        assert_eq!(assets[0].filename, "a.flac");
        assert!(assets[0].uri.ends_with("a.flac"));
        // Unparseable files are listed without a duration.
        assert_eq!(assets[1].duration_ms, 0);
    }

    #[tokio::test]
    async fn test_missing_root_is_not_available() {
        let dir = TempDir::new().unwrap();
        let library = DirectoryMediaLibrary::new(dir.path().join("nope"));

        let err = library.list_audio_assets().await.unwrap_err();
        assert!(matches!(err, BridgeError::NotAvailable(_)));
    }

    #[tokio::test]
    async fn test_permission_always_granted() {
        let library = DirectoryMediaLibrary::new("/tmp");
        assert!(library.permission_status().await.unwrap().granted);
        assert!(library.request_permission().await.unwrap().granted);
    }
}
