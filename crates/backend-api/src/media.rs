//! File storage for uploaded chat media.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use huddle_config::MediaConfig;
use rand::{distributions::Alphanumeric, Rng};
use thiserror::Error;
use tracing::{info, warn};

const MAX_NAME_LENGTH: usize = 100;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media storage failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid media name: {0}")]
    InvalidName(String),
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    public_url: String,
    max_upload_bytes: u64,
}

impl MediaStore {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            root: PathBuf::from(&config.directory),
            public_url: config.public_url.trim_end_matches('/').to_owned(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// URL prefix the media directory is served under, without a trailing slash
    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Write an upload and return its stored name,
    /// `{unix millis}-{random}-{sanitized original name}`.
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, MediaError> {
        self.ensure_root().await?;

        let stored_name = format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            random_suffix(),
            sanitize_file_name(original_name)
        );
        tokio::fs::write(self.root.join(&stored_name), bytes).await?;

        info!(stored_name = %stored_name, size = bytes.len(), "stored media file");
        Ok(stored_name)
    }

    /// Delete a stored file. Missing files are not an error.
    pub async fn remove(&self, stored_name: &str) -> Result<(), MediaError> {
        let path = self.path_of(stored_name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    /// Best-effort removal of many files; failures are logged.
    pub async fn remove_all<I>(&self, stored_names: I)
    where
        I: IntoIterator<Item = String>,
    {
        for name in stored_names {
            if let Err(error) = self.remove(&name).await {
                warn!(stored_name = %name, %error, "failed to remove media file");
            }
        }
    }

    /// Resolve a stored name inside the media directory
    pub fn path_of(&self, stored_name: &str) -> Result<PathBuf, MediaError> {
        let valid = !stored_name.is_empty()
            && !stored_name.starts_with('.')
            && !stored_name.contains(['/', '\\']);
        if !valid {
            return Err(MediaError::InvalidName(stored_name.to_owned()));
        }
        Ok(self.root.join(stored_name))
    }
}

/// Keeps ASCII letters, digits, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        return "file".to_owned();
    }

    // keep the extension when truncating
    if cleaned.len() > MAX_NAME_LENGTH {
        if let Some((stem, ext)) = cleaned.rsplit_once('.') {
            if ext.len() < 16 {
                let keep = MAX_NAME_LENGTH.saturating_sub(ext.len() + 1).min(stem.len());
                return format!("{}.{}", &stem[..keep], ext);
            }
        }
        return cleaned[..MAX_NAME_LENGTH].to_owned();
    }
    cleaned.to_owned()
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}
