use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::Path;
use tar::Archive;
use xz2::read::XzDecoder;

/// Extract TAR.XZ archive, returns the number of extracted entries
pub fn extract_tar_xz(tar_path: &Path, extract_to: &Path) -> Result<usize> {
    let file = fs::File::open(tar_path)
        .with_context(|| format!("Failed to open tar.xz file: {}", tar_path.display()))?;

    extract_tar_from_reader(XzDecoder::new(file), extract_to, "tar.xz")
}

/// Extract TAR.GZ archive, returns the number of extracted entries
pub fn extract_tar_gz(tar_path: &Path, extract_to: &Path) -> Result<usize> {
    let file = fs::File::open(tar_path)
        .with_context(|| format!("Failed to open tar.gz file: {}", tar_path.display()))?;

    extract_tar_from_reader(GzDecoder::new(file), extract_to, "tar.gz")
}

/// Extract TAR.ZST archive (Zstandard compression), returns the number of extracted entries
pub fn extract_tar_zst(tar_path: &Path, extract_to: &Path) -> Result<usize> {
    let file = fs::File::open(tar_path)
        .with_context(|| format!("Failed to open tar.zst file: {}", tar_path.display()))?;

    let decoder = zstd::Decoder::new(file)
        .with_context(|| format!("Failed to create zstd decoder for: {}", tar_path.display()))?;
    extract_tar_from_reader(decoder, extract_to, "tar.zst")
}

/// Extract TAR archive from a generic reader.
///
/// Entries are unpacked with `unpack_in`, which refuses paths escaping
/// `extract_to`. Permissions and symlinks are preserved.
fn extract_tar_from_reader<R: Read>(
    reader: R,
    extract_to: &Path,
    archive_type: &str,
) -> Result<usize> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);

    fs::create_dir_all(extract_to).with_context(|| {
        format!(
            "Failed to create extraction directory: {}",
            extract_to.display()
        )
    })?;

    let mut extracted = 0;

    for entry in archive
        .entries()
        .with_context(|| format!("Failed to read {archive_type} entries"))?
    {
        let mut entry = entry.with_context(|| format!("Failed to access {archive_type} entry"))?;
        let path = entry
            .path()
            .with_context(|| "Failed to get entry path")?
            .into_owned();

        let unpacked = entry
            .unpack_in(extract_to)
            .with_context(|| format!("Failed to extract entry: {}", path.display()))?;
        if !unpacked {
            anyhow::bail!("Entry escapes extraction directory: {}", path.display());
        }

        extracted += 1;
    }

    Ok(extracted)
}
