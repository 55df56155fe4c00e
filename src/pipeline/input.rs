//! Input resolution: turn a path, URL or byte buffer into a local PDF file.
//!
//! pdfium opens documents from the file system, so every input ends up as a
//! path. Downloads and in-memory buffers are written to temp files owned by
//! [`ResolvedInput`]; they are removed when it is dropped.

use crate::error::PlumaError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF available on the local file system for as long as this value lives.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the PDF was downloaded into a temp directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
    /// Input was a byte buffer, spilled to a temp file.
    Buffered(NamedTempFile),
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
            ResolvedInput::Buffered(file) => file.path(),
        }
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or HTTP(S) URL to a local PDF file.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, PlumaError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Spill an in-memory PDF to a managed temp file.
pub fn resolve_bytes(bytes: &[u8]) -> Result<ResolvedInput, PlumaError> {
    let mut file = NamedTempFile::new()
        .map_err(|e| PlumaError::Internal(format!("tempfile: {e}")))?;
    check_magic(bytes, file.path())?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|e| PlumaError::Internal(format!("tempfile write: {e}")))?;
    debug!("Buffered {} bytes of PDF to {}", bytes.len(), file.path().display());
    Ok(ResolvedInput::Buffered(file))
}

fn check_magic(bytes: &[u8], path: &Path) -> Result<(), PlumaError> {
    if bytes.len() >= 4 && &bytes[..4] != PDF_MAGIC {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(PlumaError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, PlumaError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(PlumaError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() {
                check_magic(&magic, &path)?;
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PlumaError::PermissionDenied { path });
        }
        Err(_) => return Err(PlumaError::FileNotFound { path }),
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, PlumaError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| PlumaError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PlumaError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| PlumaError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(file_name_from_url(url));
    check_magic(&bytes, &path)?;

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| PlumaError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to {}", bytes.len(), path.display());
    Ok(ResolvedInput::Downloaded {
        path,
        _temp_dir: temp_dir,
    })
}

/// Last URL path segment when it looks like a file name, else `downloaded.pdf`.
fn file_name_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}
