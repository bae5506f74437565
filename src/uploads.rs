use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{UPLOADS_INVALID_DATA_URL, UPLOADS_NOT_AN_IMAGE, UPLOADS_TOO_LARGE},
    AppError, AppResult,
};

static DATA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:image/(\w+);base64,(.+)$").expect("data url pattern to compile")
});

/// Image files stored under a single flat directory, served at `/uploads`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    max_bytes: usize,
}

/// An uploaded file as received from a multipart form.
#[derive(Debug, Clone, Copy)]
pub struct IncomingFile<'a> {
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub bytes: &'a [u8],
}

impl UploadStore {
    pub fn open(root: impl Into<PathBuf>, max_bytes: usize) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, max_bytes })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Write `bytes` under a fresh `<uuid>.<ext>` name and return that name.
    pub async fn save(&self, bytes: &[u8], ext: &str) -> AppResult<String> {
        let ext = sanitize_ext(ext).unwrap_or_else(|| "bin".to_string());
        let name = format!("{}.{}", Uuid::new_v4(), ext);
        let path = self.root.join(&name);
        tokio::fs::write(&path, bytes).await.map_err(|err| {
            AppError::from(err)
                .with_context("operation", "upload_save")
                .with_context("path", path.display().to_string())
        })?;
        debug!(target: "stablebook", event = "upload_saved", file = %name, bytes = bytes.len());
        Ok(name)
    }

    /// Validate and store a multipart image upload.
    pub async fn save_image(&self, file: IncomingFile<'_>) -> AppResult<String> {
        if file.bytes.len() > self.max_bytes {
            return Err(AppError::new(
                UPLOADS_TOO_LARGE,
                format!("Images are limited to {} bytes", self.max_bytes),
            )
            .with_context("size", file.bytes.len().to_string()));
        }
        if !is_image(file.content_type, file.bytes) {
            return Err(
                AppError::new(UPLOADS_NOT_AN_IMAGE, "Only image files are allowed").with_context(
                    "content_type",
                    file.content_type.unwrap_or("unknown").to_string(),
                ),
            );
        }
        let ext = file
            .file_name
            .and_then(|n| Path::new(n).extension())
            .and_then(|e| e.to_str())
            .and_then(sanitize_ext)
            .or_else(|| infer::get(file.bytes).map(|kind| kind.extension().to_string()))
            .or_else(|| {
                file.content_type
                    .and_then(|ct| mime_guess::get_mime_extensions_str(ct))
                    .and_then(|exts| exts.first())
                    .map(|e| e.to_string())
            })
            .unwrap_or_else(|| "img".to_string());
        self.save(file.bytes, &ext).await
    }

    /// Store an inline `data:image/<ext>;base64,...` payload. Returns `Ok(None)`
    /// when `value` is not a data URL at all.
    pub async fn save_data_url(&self, value: &str) -> AppResult<Option<String>> {
        if !value.starts_with("data:") {
            return Ok(None);
        }
        let (ext, bytes) = decode_data_url(value)?;
        self.save(&bytes, &ext).await.map(Some)
    }

    /// Delete a stored file. Missing files and failures are logged only.
    pub async fn remove(&self, name: &str) {
        let Some(path) = self.path_for(name) else {
            warn!(target: "stablebook", event = "upload_remove_rejected", file = %name);
            return;
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => info!(target: "stablebook", event = "upload_removed", file = %name),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(target: "stablebook", event = "upload_remove_missing", file = %name)
            }
            Err(err) => {
                warn!(target: "stablebook", event = "upload_remove_failed", file = %name, error = %err)
            }
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_some_and(|p| p.is_file())
    }

    /// Stored names are bare file names; anything with a path component is refused.
    fn path_for(&self, name: &str) -> Option<PathBuf> {
        let trimmed = name.trim();
        if trimmed.is_empty()
            || trimmed.contains(['/', '\\'])
            || trimmed == "."
            || trimmed == ".."
        {
            return None;
        }
        Some(self.root.join(trimmed))
    }
}

/// Split a `data:image/<ext>;base64,<payload>` URL into extension and bytes.
/// `jpeg` is stored as `jpg`.
pub fn decode_data_url(value: &str) -> AppResult<(String, Vec<u8>)> {
    let caps = DATA_URL.captures(value).ok_or_else(|| {
        AppError::new(UPLOADS_INVALID_DATA_URL, "Inline image is not a base64 image data URL")
    })?;
    let ext = match &caps[1] {
        "jpeg" => "jpg".to_string(),
        other => other.to_ascii_lowercase(),
    };
    let bytes = STANDARD.decode(caps[2].trim()).map_err(|err| {
        AppError::new(UPLOADS_INVALID_DATA_URL, "Inline image payload is not valid base64")
            .with_context("error", err.to_string())
    })?;
    Ok((ext, bytes))
}

fn is_image(content_type: Option<&str>, bytes: &[u8]) -> bool {
    match content_type.map(str::trim).filter(|ct| !ct.is_empty()) {
        Some(ct) if ct.starts_with("image/") => true,
        Some(ct) if ct != "application/octet-stream" => false,
        _ => infer::is_image(bytes),
    }
}

fn sanitize_ext(ext: &str) -> Option<String> {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(ext)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent PNG
    const PNG: &[u8] = &[
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
        0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89,
    ];

    #[test]
    fn data_url_jpeg_becomes_jpg() {
        let (ext, bytes) = decode_data_url("data:image/jpeg;base64,aGVsbG8=").unwrap();
        assert_eq!(ext, "jpg");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn data_url_rejects_garbage() {
        assert!(decode_data_url("data:text/plain;base64,aGVsbG8=").is_err());
        assert!(decode_data_url("data:image/png;base64,***").is_err());
    }

    #[test]
    fn image_detection_prefers_declared_type() {
        assert!(is_image(Some("image/webp"), b"anything"));
        assert!(!is_image(Some("text/plain"), PNG));
        assert!(is_image(None, PNG));
        assert!(is_image(Some("application/octet-stream"), PNG));
        assert!(!is_image(None, b"plain text"));
    }

    #[tokio::test]
    async fn save_image_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::open(dir.path().join("uploads"), 1024).unwrap();
        let name = store
            .save_image(IncomingFile {
                file_name: Some("Star.PNG"),
                content_type: Some("image/png"),
                bytes: PNG,
            })
            .await
            .unwrap();
        assert!(name.ends_with(".png"));
        assert!(store.exists(&name));

        store.remove(&name).await;
        assert!(!store.exists(&name));
        // second removal is a no-op
        store.remove(&name).await;
    }

    #[tokio::test]
    async fn oversized_and_non_image_uploads_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::open(dir.path(), 8).unwrap();
        let err = store
            .save_image(IncomingFile {
                file_name: Some("a.png"),
                content_type: Some("image/png"),
                bytes: PNG,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), UPLOADS_TOO_LARGE);

        let err = store
            .save_image(IncomingFile {
                file_name: Some("a.txt"),
                content_type: Some("text/plain"),
                bytes: b"hi",
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), UPLOADS_NOT_AN_IMAGE);
    }

    #[tokio::test]
    async fn plain_references_are_not_data_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::open(dir.path(), 1024).unwrap();
        assert_eq!(store.save_data_url("abc.jpg").await.unwrap(), None);
        let saved = store
            .save_data_url("data:image/png;base64,aGk=")
            .await
            .unwrap()
            .unwrap();
        assert!(saved.ends_with(".png"));
    }

    #[tokio::test]
    async fn path_traversal_names_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::open(dir.path(), 1024).unwrap();
        assert!(!store.exists("../etc/passwd"));
        store.remove("../outside.png").await;
    }
}
