//! Validation and storage of uploaded media files.

use std::path::Path;

use tokio::fs;
use uuid::Uuid;

use crate::errors::AppError;

/// Accepted upload types and the extension files are stored with.
const ALLOWED: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
    ("application/pdf", "pdf"),
];

pub fn extension_for(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    ALLOWED
        .iter()
        .find(|(allowed, _)| allowed.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}

pub fn validate_upload(mime: &str, size: usize, max_bytes: usize) -> Result<&'static str, AppError> {
    let ext = extension_for(mime)
        .ok_or_else(|| AppError::validation(format!("Unsupported file type {mime}")))?;
    if size == 0 {
        return Err(AppError::validation("File is empty"));
    }
    if size > max_bytes {
        return Err(AppError::PayloadTooLarge);
    }
    Ok(ext)
}

/// Keeps the last path component of a client-supplied name, without control characters.
pub fn clean_original_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).take(200).collect();
    if cleaned.trim().is_empty() {
        "upload".to_string()
    } else {
        cleaned.trim().to_string()
    }
}

/// Writes `bytes` under `dir` with a fresh random name; returns that name.
pub async fn store(dir: &Path, bytes: &[u8], ext: &str) -> Result<String, AppError> {
    fs::create_dir_all(dir).await.map_err(AppError::internal)?;
    let file_name = format!("{}.{ext}", Uuid::new_v4().simple());
    fs::write(dir.join(&file_name), bytes)
        .await
        .map_err(AppError::internal)?;
    Ok(file_name)
}

/// Removes a stored file. A file that is already gone is not an error.
pub async fn remove(dir: &Path, file_name: &str) -> Result<(), AppError> {
    if file_name.contains(['/', '\\']) || file_name.starts_with('.') {
        return Err(AppError::validation("Invalid media file name"));
    }
    match fs::remove_file(dir.join(file_name)).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(AppError::internal(err)),
    }
}
