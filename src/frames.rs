//! On-disk frame storage for one timelapse session
//!
//! Frames live in a per-session directory as `frame_{index:06}.{ext}`. The
//! zero padding keeps lexicographic file order equal to capture order, which
//! is what the encoder's glob input relies on.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Result, TimelapseError};

/// File name prefix shared by every stored frame
pub const FRAME_PREFIX: &str = "frame_";

/// Digits in the zero-padded frame index
pub const INDEX_WIDTH: usize = 6;

/// Largest index that still fits in [`INDEX_WIDTH`] digits
pub const MAX_FRAME_INDEX: u64 = 999_999;

/// Reference to one stored frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameRef {
    /// Sequence index within the session
    pub index: u64,
    /// Location of the image file
    pub path: PathBuf,
    /// When the frame was written
    pub captured_at: DateTime<Utc>,
    /// Size of the image file in bytes
    pub size: u64,
}

/// Directory of frames belonging to one session
#[derive(Debug, Clone)]
pub struct FrameStore {
    dir: PathBuf,
    extension: String,
}

impl FrameStore {
    /// Create the session directory (and parents) and return a store for it
    ///
    /// # Errors
    ///
    /// Returns an IO error if the directory cannot be created
    pub async fn create(dir: impl Into<PathBuf>, extension: &str) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(TimelapseError::Io)?;
        tracing::debug!(dir = %dir.display(), "Created frame directory");
        Ok(Self::open(dir, extension))
    }

    /// Use an existing directory without touching the filesystem
    pub fn open(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.to_string(),
        }
    }

    /// Session directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a frame index
    ///
    /// # Examples
    ///
    /// ```
    /// use camera_timelapse::frames::FrameStore;
    ///
    /// let store = FrameStore::open("/tmp/session", "jpg");
    /// assert_eq!(store.frame_name(42), "frame_000042.jpg");
    /// ```
    pub fn frame_name(&self, index: u64) -> String {
        format!(
            "{}{:0width$}.{}",
            FRAME_PREFIX,
            index,
            self.extension,
            width = INDEX_WIDTH
        )
    }

    /// Glob matching every frame of this store, in encoder input syntax
    ///
    /// Glob metacharacters in the directory are backslash-escaped so only
    /// the file name part acts as a pattern.
    pub fn glob_pattern(&self) -> String {
        let mut pattern = escape_glob(&self.dir.to_string_lossy());
        if !pattern.ends_with(std::path::MAIN_SEPARATOR) {
            pattern.push(std::path::MAIN_SEPARATOR);
        }
        pattern.push_str(&format!("{}*.{}", FRAME_PREFIX, self.extension));
        pattern
    }

    /// Write one frame
    ///
    /// A failed write leaves no file behind; the caller treats the index as
    /// consumed and moves on to the next one.
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::Io` if the payload is empty, the index does
    /// not fit the file name width, or the write fails
    ///
    /// # Examples
    ///
    /// ```
    /// use camera_timelapse::frames::FrameStore;
    ///
    /// # tokio_test::block_on(async {
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = FrameStore::create(dir.path().join("session"), "jpg").await.unwrap();
    ///
    /// let frame = store.append(0, b"\xFF\xD8\xFF\xD9").await.unwrap();
    /// assert!(frame.path.ends_with("frame_000000.jpg"));
    /// assert!(store.append(1, b"").await.is_err());
    /// # });
    /// ```
    pub async fn append(&self, index: u64, payload: &[u8]) -> Result<FrameRef> {
        if index > MAX_FRAME_INDEX {
            return Err(TimelapseError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("frame index {} exceeds {}", index, MAX_FRAME_INDEX),
            ))
            .into());
        }
        if payload.is_empty() {
            return Err(TimelapseError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "refusing to store an empty frame",
            ))
            .into());
        }

        let path = self.dir.join(self.frame_name(index));
        if let Err(e) = tokio::fs::write(&path, payload).await {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(TimelapseError::Io(e).into());
        }

        let size = tokio::fs::metadata(&path)
            .await
            .map_err(TimelapseError::Io)?
            .len();
        if size == 0 {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(TimelapseError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("frame file is empty: {}", path.display()),
            ))
            .into());
        }

        Ok(FrameRef {
            index,
            path,
            captured_at: Utc::now(),
            size,
        })
    }

    /// List stored frames in ascending index order
    ///
    /// Reads the directory on every call, so the result is always current.
    /// Files that do not follow the frame naming scheme are ignored.
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::Io` if the directory cannot be read
    pub async fn list_ordered(&self) -> Result<Vec<FrameRef>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(TimelapseError::Io)?;
        let mut frames = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(TimelapseError::Io)? {
            let name = entry.file_name();
            let Some(index) = self.parse_index(&name.to_string_lossy()) else {
                continue;
            };
            let metadata = entry.metadata().await.map_err(TimelapseError::Io)?;
            if !metadata.is_file() {
                continue;
            }
            let captured_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            frames.push(FrameRef {
                index,
                path: entry.path(),
                captured_at,
                size: metadata.len(),
            });
        }

        frames.sort_by_key(|frame| frame.index);
        Ok(frames)
    }

    /// Remove every frame file, then the directory if it is left empty
    ///
    /// # Returns
    ///
    /// Number of frame files removed
    ///
    /// # Errors
    ///
    /// Returns `TimelapseError::Io` if listing or removing a frame fails
    pub async fn cleanup(&self) -> Result<usize> {
        let frames = self.list_ordered().await?;
        for frame in &frames {
            tokio::fs::remove_file(&frame.path)
                .await
                .map_err(TimelapseError::Io)?;
        }
        if tokio::fs::remove_dir(&self.dir).await.is_err() {
            tracing::debug!(dir = %self.dir.display(), "Frame directory not empty, keeping it");
        }
        tracing::info!(dir = %self.dir.display(), removed = frames.len(), "Cleaned up frames");
        Ok(frames.len())
    }

    fn parse_index(&self, name: &str) -> Option<u64> {
        let stem = name
            .strip_prefix(FRAME_PREFIX)?
            .strip_suffix(&self.extension)?
            .strip_suffix('.')?;
        if stem.len() != INDEX_WIDTH || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        stem.parse().ok()
    }
}

fn escape_glob(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
