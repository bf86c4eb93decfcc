use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::cancel::CancelToken;
use crate::config::RetryPolicy;
use crate::crypto::verify_digest;
use crate::download::{Attempt, build_agent, classify_ureq_error, with_retries};
use crate::error::{Result, WineportError};
use crate::models::AssetRecord;

const CHUNK_SIZE: usize = 64 * 1024;

/// Fetches release assets over HTTP(S), or copies them from a local path
pub struct Downloader {
    agent: ureq::Agent,
    policy: RetryPolicy,
    cancel: CancelToken,
}

impl Downloader {
    pub fn new(policy: RetryPolicy, cancel: CancelToken) -> Self {
        Self {
            agent: build_agent(&policy),
            policy,
            cancel,
        }
    }

    /// Download `asset` to `dest` and verify it.
    ///
    /// The file only appears at `dest` once it is complete; it is then
    /// checked to be non-empty and to match the published size and digest.
    /// On any failure `dest` does not exist afterwards.
    pub fn fetch(&self, asset: &AssetRecord, dest: &Path) -> Result<u64> {
        let failed = |reason: String| WineportError::DownloadFailed {
            asset: asset.name.clone(),
            reason,
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| WineportError::io(parent, e))?;
        }

        let size = if let Some(source) = local_source(&asset.url) {
            copy_local_file(&source, dest).map_err(failed)?
        } else {
            info!("Downloading: {}", asset.url);
            with_retries(&self.policy, &self.cancel, &asset.name, || {
                self.download_http_file(&asset.url, dest)
            })
            .map_err(|attempt| match attempt {
                Attempt::Cancelled => WineportError::Cancelled,
                Attempt::Retry(reason) | Attempt::Fatal(reason) => failed(reason),
            })?
        };

        if let Err(reason) = check_integrity(asset, dest, size) {
            let _ = fs::remove_file(dest);
            return Err(failed(reason));
        }

        info!("Downloaded: {} ({} bytes)", dest.display(), size);
        Ok(size)
    }

    /// One attempt at an HTTP download, streamed through a temporary file
    fn download_http_file(&self, url: &str, path: &Path) -> std::result::Result<u64, Attempt> {
        let response = self.agent.get(url).call().map_err(classify_ureq_error)?;

        if response.status() != 200 {
            return Err(Attempt::Fatal(format!(
                "Download failed with status: {}",
                response.status()
            )));
        }

        let expected_len = response
            .header("Content-Length")
            .and_then(|v| v.parse::<u64>().ok());

        // Create a temporary file in the same directory as the target file
        let temp_path = path.with_extension(format!(
            "{}.tmp",
            path.extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("download")
        ));

        let result = (|| {
            let mut temp_file = fs::File::create(&temp_path).map_err(|e| {
                Attempt::Fatal(format!(
                    "Failed to create temporary file {}: {e}",
                    temp_path.display()
                ))
            })?;

            let written = copy_chunks(&mut response.into_reader(), &mut temp_file, &self.cancel)?;

            temp_file
                .sync_all()
                .map_err(|e| Attempt::Fatal(format!("Failed to sync temporary file: {e}")))?;
            drop(temp_file);

            if let Some(expected) = expected_len
                && written != expected
            {
                return Err(Attempt::Retry(format!(
                    "truncated download: got {written} of {expected} bytes"
                )));
            }

            // Atomically move the temporary file to the final location
            fs::rename(&temp_path, path).map_err(|e| {
                Attempt::Fatal(format!(
                    "Failed to move temporary file to final location {}: {e}",
                    path.display()
                ))
            })?;
            Ok(written)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        result
    }
}

/// Copy in fixed-size chunks, checking for cancellation between chunks
fn copy_chunks(
    reader: &mut impl Read,
    writer: &mut impl Write,
    cancel: &CancelToken,
) -> std::result::Result<u64, Attempt> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(Attempt::Cancelled);
        }
        let n = reader
            .read(&mut buffer)
            .map_err(|e| Attempt::Retry(format!("read error: {e}")))?;
        if n == 0 {
            return Ok(total);
        }
        writer
            .write_all(&buffer[..n])
            .map_err(|e| Attempt::Fatal(format!("write error: {e}")))?;
        total += n as u64;
    }
}

/// Local path behind `url`, if it is not a network URL
fn local_source(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        Some(PathBuf::from(path))
    } else if url.starts_with('/') || url.starts_with('.') {
        Some(PathBuf::from(url))
    } else {
        None
    }
}

/// Copy a local file to the destination path
fn copy_local_file(source: &Path, dest: &Path) -> std::result::Result<u64, String> {
    if !source.exists() {
        return Err(format!("Local file not found: {}", source.display()));
    }

    fs::copy(source, dest).map_err(|e| {
        let _ = fs::remove_file(dest);
        format!("Failed to copy {} to {}: {e}", source.display(), dest.display())
    })
}

fn check_integrity(asset: &AssetRecord, path: &Path, size: u64) -> std::result::Result<(), String> {
    if size == 0 {
        return Err("downloaded file is empty".to_string());
    }
    if let Some(expected) = asset.size
        && expected != size
    {
        return Err(format!("size mismatch: expected {expected} bytes, got {size}"));
    }
    if let Some(digest) = &asset.digest {
        verify_digest(path, digest)?;
    }
    Ok(())
}
