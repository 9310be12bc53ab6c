//! Input resolution: read a user-supplied path or URL into PDF bytes.
//!
//! The analyzer works on an in-memory buffer, so both sources end up as a
//! `Vec<u8>`. The size limit is enforced while reading: an oversized file is
//! rejected from its metadata and an oversized download is abandoned as soon
//! as it crosses the limit, without buffering the rest.

use crate::error::AnalysisError;
use futures::StreamExt;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Human-readable name for an input, used as a batch label.
pub fn display_name(input: &str) -> String {
    if is_url(input) {
        if let Ok(parsed) = reqwest::Url::parse(input) {
            if let Some(mut segments) = parsed.path_segments() {
                if let Some(last) = segments.next_back() {
                    if !last.is_empty() {
                        return last.to_string();
                    }
                }
            }
        }
        return input.to_string();
    }
    PathBuf::from(input)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string())
}

/// Read the PDF bytes behind a path or URL.
pub async fn load_input(
    input: &str,
    max_bytes: u64,
    timeout_secs: u64,
) -> Result<Vec<u8>, AnalysisError> {
    if input.trim().is_empty() {
        return Err(AnalysisError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, max_bytes, timeout_secs).await
    } else {
        read_local(input, max_bytes).await
    }
}

async fn read_local(path_str: &str, max_bytes: u64) -> Result<Vec<u8>, AnalysisError> {
    let path = PathBuf::from(path_str);

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| io_error(e, &path))?;
    if metadata.is_dir() {
        return Err(AnalysisError::InvalidInput {
            input: path_str.to_string(),
        });
    }
    if metadata.len() > max_bytes {
        return Err(AnalysisError::InputTooLarge {
            size: metadata.len(),
            max: max_bytes,
        });
    }

    let bytes = tokio::fs::read(&path).await.map_err(|e| io_error(e, &path))?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

fn io_error(e: std::io::Error, path: &std::path::Path) -> AnalysisError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => AnalysisError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => AnalysisError::FileNotFound {
            path: path.to_path_buf(),
        },
    }
}

async fn download_url(
    url: &str,
    max_bytes: u64,
    timeout_secs: u64,
) -> Result<Vec<u8>, AnalysisError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_error = |e: reqwest::Error| {
        if e.is_timeout() {
            AnalysisError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            AnalysisError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_error)?;

    if !response.status().is_success() {
        return Err(AnalysisError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(AnalysisError::InputTooLarge {
                size: len,
                max: max_bytes,
            });
        }
    }

    let mut bytes = Vec::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(map_send_error)?;
        bytes.extend_from_slice(&chunk);
        if bytes.len() as u64 > max_bytes {
            return Err(AnalysisError::InputTooLarge {
                size: bytes.len() as u64,
                max: max_bytes,
            });
        }
    }

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name("/tmp/reports/q3.pdf"), "q3.pdf");
        assert_eq!(display_name("https://example.com/files/cv.pdf"), "cv.pdf");
        assert_eq!(display_name("https://example.com/"), "https://example.com/");
    }

    #[tokio::test]
    async fn reads_local_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"%PDF-1.7 body").unwrap();
        let bytes = load_input(file.path().to_str().unwrap(), 1024, 5)
            .await
            .unwrap();
        assert_eq!(bytes, b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_input("/definitely/not/here.pdf", 1024, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_from_metadata() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[b'x'; 64]).unwrap();
        let err = load_input(file.path().to_str().unwrap(), 16, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InputTooLarge { size: 64, max: 16 }));
    }

    #[tokio::test]
    async fn directory_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_input(dir.path().to_str().unwrap(), 16, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput { .. }));
    }
}
