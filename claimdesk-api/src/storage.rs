/// Receipt file storage
///
/// Receipts are written under `<upload dir>/receipts/` with a fresh random
/// name per upload, and served back under [`RECEIPT_URL_PREFIX`]. Files are
/// never shared between receipts, so deleting one never affects another.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

/// Public URL prefix of stored receipts
pub const RECEIPT_URL_PREFIX: &str = "/uploads/receipts/";

/// Accepted receipt content types
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "application/pdf",
];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Receipt file is required")]
    Empty,

    #[error("Only image files (JPEG, PNG, WebP) and PDF files are allowed")]
    UnsupportedType(String),

    #[error("File size too large (max {max_mb}MB)")]
    TooLarge { max_mb: usize },

    #[error("Failed to store receipt: {0}")]
    Io(#[from] std::io::Error),
}

/// A receipt as received from the client
#[derive(Debug, Clone)]
pub struct ReceiptUpload {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Where a receipt ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredReceipt {
    pub file_url: String,
    pub size: usize,
}

/// Checks type and size before anything touches the disk
pub fn validate_receipt(upload: &ReceiptUpload, max_bytes: usize) -> Result<(), StorageError> {
    if upload.data.is_empty() || upload.filename.trim().is_empty() {
        return Err(StorageError::Empty);
    }

    if !ALLOWED_MIME_TYPES.contains(&upload.content_type.as_str()) {
        return Err(StorageError::UnsupportedType(upload.content_type.clone()));
    }

    if upload.data.len() > max_bytes {
        return Err(StorageError::TooLarge {
            max_mb: max_bytes / (1024 * 1024),
        });
    }

    Ok(())
}

fn extension_for(filename: &str, content_type: &str) -> String {
    let from_name = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    from_name.unwrap_or_else(|| {
        match content_type {
            "image/png" => "png",
            "image/webp" => "webp",
            "application/pdf" => "pdf",
            _ => "jpg",
        }
        .to_string()
    })
}

/// Unique file name: a random UUID plus the original extension
pub fn stored_name(filename: &str, content_type: &str) -> String {
    format!("{}.{}", Uuid::new_v4().simple(), extension_for(filename, content_type))
}

/// Receipt files on local disk
#[derive(Debug, Clone)]
pub struct ReceiptStore {
    root: PathBuf,
}

impl ReceiptStore {
    /// `root` is the public upload directory, served at `/uploads`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn receipts_dir(&self) -> PathBuf {
        self.root.join("receipts")
    }

    /// Writes the receipt, creating the directory on first use
    pub async fn save(&self, upload: &ReceiptUpload) -> Result<StoredReceipt, StorageError> {
        let dir = self.receipts_dir();
        fs::create_dir_all(&dir).await?;

        let name = stored_name(&upload.filename, &upload.content_type);
        fs::write(dir.join(&name), &upload.data).await?;

        tracing::debug!(file = %name, size = upload.data.len(), "Receipt stored");

        Ok(StoredReceipt {
            file_url: format!("{}{}", RECEIPT_URL_PREFIX, name),
            size: upload.data.len(),
        })
    }

    /// Deletes the file behind a receipt URL
    ///
    /// URLs outside [`RECEIPT_URL_PREFIX`] or naming a nested path are ignored.
    /// A file that is already gone is not an error.
    pub async fn remove(&self, file_url: &str) -> Result<(), StorageError> {
        let Some(name) = file_url.strip_prefix(RECEIPT_URL_PREFIX) else {
            return Ok(());
        };
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return Ok(());
        }

        match fs::remove_file(self.receipts_dir().join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: &str, content_type: &str, data: &'static [u8]) -> ReceiptUpload {
        ReceiptUpload {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            data: Bytes::from_static(data),
        }
    }

    #[test]
    fn test_validate_receipt() {
        assert!(validate_receipt(&upload("r.png", "image/png", b"png"), 1024).is_ok());
        assert!(validate_receipt(&upload("r.pdf", "application/pdf", b"%PDF"), 1024).is_ok());

        assert!(matches!(
            validate_receipt(&upload("r.gif", "image/gif", b"gif"), 1024),
            Err(StorageError::UnsupportedType(_))
        ));
        assert!(matches!(
            validate_receipt(&upload("r.png", "image/png", b""), 1024),
            Err(StorageError::Empty)
        ));
        assert!(matches!(
            validate_receipt(&upload("r.png", "image/png", b"0123456789"), 5),
            Err(StorageError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_too_large_message() {
        let err = StorageError::TooLarge { max_mb: 5 };
        assert_eq!(err.to_string(), "File size too large (max 5MB)");
    }

    #[test]
    fn test_stored_name_is_unique_per_upload() {
        let a = stored_name("Receipt.JPG", "image/jpeg");
        let b = stored_name("Receipt.JPG", "image/jpeg");

        assert_ne!(a, b);
        assert!(a.ends_with(".jpg"));
        assert_eq!(a.len(), 32 + 4);
    }

    #[test]
    fn test_stored_name_falls_back_to_content_type() {
        assert!(stored_name("receipt", "application/pdf").ends_with(".pdf"));
        assert!(stored_name("../../etc/passwd.", "image/webp").ends_with(".webp"));
        assert!(stored_name("scan.p/ng", "image/png").ends_with(".png"));
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let root = std::env::temp_dir().join(format!("claimdesk-test-{}", Uuid::new_v4()));
        let store = ReceiptStore::new(&root);

        let stored = store
            .save(&upload("lunch.png", "image/png", b"\x89PNG fake"))
            .await
            .unwrap();
        assert!(stored.file_url.starts_with(RECEIPT_URL_PREFIX));
        assert_eq!(stored.size, 9);

        let name = stored.file_url.trim_start_matches(RECEIPT_URL_PREFIX);
        let path = store.receipts_dir().join(name);
        assert!(path.exists());

        store.remove(&stored.file_url).await.unwrap();
        assert!(!path.exists());

        // Already gone and foreign URLs are both fine
        store.remove(&stored.file_url).await.unwrap();
        store.remove("/etc/passwd").await.unwrap();
        store.remove("/uploads/receipts/../secret").await.unwrap();

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_identical_uploads_get_separate_files() {
        let root = std::env::temp_dir().join(format!("claimdesk-test-{}", Uuid::new_v4()));
        let store = ReceiptStore::new(&root);
        let receipt = upload("taxi.pdf", "application/pdf", b"%PDF-1.4 same");

        let first = store.save(&receipt).await.unwrap();
        let second = store.save(&receipt).await.unwrap();
        assert_ne!(first.file_url, second.file_url);

        store.remove(&first.file_url).await.unwrap();

        let kept = store
            .receipts_dir()
            .join(second.file_url.trim_start_matches(RECEIPT_URL_PREFIX));
        assert!(kept.exists());

        let _ = std::fs::remove_dir_all(&root);
    }
}
