//! Uploaded chat images on local disk.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::{fs, io::AsyncWriteExt};
use tracing::info;

use crate::{
    error::{io, AppResult},
    state::{MediaEntry, MediaLog},
};

/// Files are written once and then served read-only under `/uploads/`.
#[derive(Clone)]
pub struct ImageStore {
    dir: PathBuf,
    public_base: Option<String>,
    log: MediaLog,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>, public_base: Option<String>) -> Self {
        Self { dir: dir.into(), public_base, log: MediaLog::default() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Shared with the janitor in `utils::clean`.
    pub fn log(&self) -> MediaLog {
        self.log.clone()
    }

    /// Write `data` under a fresh `<millis>-<uuid>.<ext>` name and return it.
    pub async fn store(
        &self,
        data: &[u8],
        mime: &str,
        original_name: Option<&str>,
    ) -> AppResult<String> {
        fs::create_dir_all(&self.dir).await.map_err(io)?;

        let name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4(),
            extension(mime, original_name)
        );
        let full = self.dir.join(&name);

        let mut file = fs::File::create(&full).await.map_err(io)?;
        file.write_all(data).await.map_err(io)?;
        file.flush().await.map_err(io)?;

        self.log
            .write()
            .await
            .push_back(MediaEntry { path: full, size: data.len() as u64 });
        info!(file = %name, bytes = data.len(), "image stored");
        Ok(name)
    }

    /// Public URL of a stored file. `request_base` (scheme + host of the
    /// upload request) is used when no base was configured; without either
    /// the path is returned relative.
    pub fn url_for(&self, name: &str, request_base: Option<&str>) -> String {
        let base = self.public_base.as_deref().or(request_base).unwrap_or("");
        format!("{}/uploads/{name}", base.trim_end_matches('/'))
    }
}

fn extension(mime: &str, original_name: Option<&str>) -> String {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    if let Some(ext) = mime_guess::get_mime_extensions_str(essence).and_then(|a| a.first()) {
        return (*ext).to_owned();
    }
    original_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_owned())
}
