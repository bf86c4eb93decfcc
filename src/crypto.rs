use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Compute SHA-256 hash of a file
pub fn compute_sha256(file_path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(file_path)?;

    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Check a downloaded file against a published digest such as "sha256:<hex>".
///
/// A bare hex string is taken as SHA-256. Digests in other algorithms are
/// skipped with a warning. Returns a human-readable reason on mismatch.
pub fn verify_digest(file_path: &Path, digest: &str) -> Result<(), String> {
    let expected = match digest.split_once(':') {
        Some((algo, hex)) if algo.eq_ignore_ascii_case("sha256") => hex,
        Some((algo, _)) => {
            warn!("Unsupported digest algorithm '{algo}', skipping verification");
            return Ok(());
        }
        None => digest,
    };
    let expected = expected.trim().to_lowercase();

    let computed = compute_sha256(file_path)
        .map_err(|e| format!("failed to hash {}: {e}", file_path.display()))?;

    if computed == expected {
        debug!("SHA-256 verification passed: {expected}");
        Ok(())
    } else {
        Err(format!(
            "SHA-256 mismatch: expected {expected}, computed {computed}"
        ))
    }
}
