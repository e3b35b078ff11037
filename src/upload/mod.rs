//! Multipart upload pipeline.
//!
//! # Data Flow
//! ```text
//! Content-Type: multipart/form-data; boundary=X
//!     → upload gate (route table must hold an upload-flagged route)
//!     → BodyWriter streams the raw body to one temp file, bounded by the
//!       gated route's max_body_size
//!     → multipart.rs parses the staged file into form fields and
//!       UploadedFile descriptors (payloads extracted to their own files)
//!     → UploadStaging removes every temp file once the response is sent
//! ```
//!
//! # Design Decisions
//! - Oversized bodies are rejected, never truncated; a truncated multipart
//!   payload would parse into garbage
//! - Gate failure destroys the connection before any body byte is read
//! - Cleanup runs on every exit path, including aborts

pub mod multipart;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::UploadError;

/// Descriptor for one uploaded file, with its payload extracted to `path`.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Form field the file arrived under.
    pub field: String,
    /// Client-supplied file name.
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    /// Temp file holding the extracted bytes; removed with the staging.
    pub path: PathBuf,
}

/// Extract the boundary from a multipart content-type header value.
pub fn boundary_from(content_type: &str) -> Option<String> {
    if !content_type.starts_with("multipart/form-data") {
        return None;
    }
    let rest = content_type.split_once("boundary=")?.1;
    let boundary = rest.split(';').next().unwrap_or(rest).trim();
    let boundary = boundary.trim_matches('"');
    if boundary.is_empty() {
        None
    } else {
        Some(boundary.to_string())
    }
}

/// Streams a request body into a temp file under a byte ceiling.
pub struct BodyWriter {
    file: fs::File,
    path: PathBuf,
    written: u64,
    limit: u64,
}

impl BodyWriter {
    pub async fn create(tmp_dir: &Path, limit: u64) -> Result<Self, UploadError> {
        let path = tmp_dir.join(format!("{}.upload", Uuid::new_v4()));
        let file = fs::File::create(&path)
            .await
            .map_err(|source| UploadError::Staging {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            file,
            path,
            written: 0,
            limit,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one body chunk. Fails with `BodyTooLarge` the moment the
    /// ceiling is crossed; the partial file stays behind for cleanup.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        self.written += chunk.len() as u64;
        if self.written > self.limit {
            return Err(UploadError::BodyTooLarge { limit: self.limit });
        }
        self.file
            .write_all(chunk)
            .await
            .map_err(|source| UploadError::Staging {
                path: self.path.clone(),
                source,
            })
    }

    pub async fn finish(mut self) -> Result<PathBuf, UploadError> {
        self.file
            .flush()
            .await
            .map_err(|source| UploadError::Staging {
                path: self.path.clone(),
                source,
            })?;
        Ok(self.path)
    }
}

/// Temp files created for one request; removed when the response is sent.
#[derive(Debug, Default)]
pub struct UploadStaging {
    paths: Vec<PathBuf>,
}

impl UploadStaging {
    pub fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Remove every staged file. Missing files are fine; other failures are
    /// logged and skipped so cleanup never interferes with the response.
    pub async fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Staged file not removed");
                }
            }
        }
    }
}

/// Parse a staged multipart body into form fields and file descriptors.
///
/// File payloads are extracted into their own temp files, tracked by
/// `staging` for removal with the rest of the request's artifacts.
pub async fn parse_staged(
    path: &Path,
    boundary: &str,
    tmp_dir: &Path,
    staging: &mut UploadStaging,
) -> Result<(HashMap<String, String>, Vec<UploadedFile>), UploadError> {
    let body = fs::read(path).await.map_err(|source| UploadError::Staging {
        path: path.to_path_buf(),
        source,
    })?;

    let parts = multipart::parse_multipart(&body, boundary)?;
    let mut fields = HashMap::new();
    let mut files = Vec::new();

    for part in parts {
        match part.file_name {
            Some(file_name) => {
                let extracted = tmp_dir.join(format!("{}.part", Uuid::new_v4()));
                fs::write(&extracted, &part.data)
                    .await
                    .map_err(|source| UploadError::Staging {
                        path: extracted.clone(),
                        source,
                    })?;
                staging.track(extracted.clone());
                files.push(UploadedFile {
                    field: part.name,
                    file_name,
                    content_type: part
                        .content_type
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                    size: part.data.len() as u64,
                    path: extracted,
                });
            }
            None => {
                fields.insert(
                    part.name,
                    String::from_utf8_lossy(&part.data).into_owned(),
                );
            }
        }
    }

    Ok((fields, files))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_extraction() {
        assert_eq!(
            boundary_from("multipart/form-data; boundary=----abc123"),
            Some("----abc123".to_string())
        );
        assert_eq!(
            boundary_from("multipart/form-data; boundary=\"quoted\"; charset=utf-8"),
            Some("quoted".to_string())
        );
        assert_eq!(boundary_from("application/x-www-form-urlencoded"), None);
        assert_eq!(boundary_from("multipart/form-data"), None);
    }

    #[tokio::test]
    async fn test_body_writer_enforces_limit() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = BodyWriter::create(dir.path(), 10).await.unwrap();
        writer.write_chunk(b"12345").await.unwrap();
        writer.write_chunk(b"12345").await.unwrap();
        let err = writer.write_chunk(b"x").await.unwrap_err();
        assert!(matches!(err, UploadError::BodyTooLarge { limit: 10 }));
    }

    #[tokio::test]
    async fn test_staging_cleanup_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.upload");
        fs::write(&file, b"data").await.unwrap();

        let mut staging = UploadStaging::default();
        staging.track(file.clone());
        staging.track(dir.path().join("never-created.part"));
        staging.cleanup().await;

        assert!(!file.exists());
        assert!(staging.is_empty());
    }

    #[tokio::test]
    async fn test_parse_staged_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let boundary = "XbOuNdArYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nhello\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
             Content-Type: text/plain\r\n\r\nfile-bytes\r\n--{b}--\r\n",
            b = boundary
        );
        let staged = dir.path().join("body.upload");
        fs::write(&staged, body.as_bytes()).await.unwrap();

        let mut staging = UploadStaging::default();
        let (fields, files) = parse_staged(&staged, boundary, dir.path(), &mut staging)
            .await
            .unwrap();

        assert_eq!(fields.get("title").map(String::as_str), Some("hello"));
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].field, "doc");
        assert_eq!(files[0].file_name, "a.txt");
        assert_eq!(files[0].content_type, "text/plain");
        assert_eq!(files[0].size, 10);
        assert_eq!(fs::read(&files[0].path).await.unwrap(), b"file-bytes");

        staging.cleanup().await;
        assert!(!files[0].path.exists());
    }
}
