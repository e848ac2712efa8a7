//! Shared key generation for storage backends.
//!
//! Key format: `{folder}/{uuid}.{ext}`.

use uuid::Uuid;

use crate::traits::{StorageError, StorageResult};

/// Normalize a logical folder, rejecting anything that could escape the store root.
pub fn normalize_folder(folder: &str) -> StorageResult<String> {
    if folder.starts_with('/') || folder.contains("..") || folder.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "folder {:?} must be relative and must not contain '..'",
            folder
        )));
    }

    let trimmed = folder.trim_matches('/');
    if trimmed.is_empty() {
        return Err(StorageError::InvalidKey("folder must not be empty".to_string()));
    }

    Ok(trimmed.to_string())
}

/// File extension for an image content type.
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type.to_lowercase().as_str() {
        "image/webp" => "webp",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/avif" => "avif",
        "image/bmp" => "bmp",
        _ => "bin",
    }
}

/// Generate a fresh storage key in `folder` for an object of `content_type`.
pub fn generate_storage_key(folder: &str, content_type: &str) -> StorageResult<(String, String)> {
    let folder = normalize_folder(folder)?;
    let key = format!("{}/{}.{}", folder, Uuid::new_v4(), extension_for(content_type));
    Ok((folder, key))
}

/// Reject keys that could resolve outside the store root.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
