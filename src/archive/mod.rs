pub mod normalize;
pub mod tar;
pub mod zip;

use anyhow::Result;
use std::path::Path;

/// Archive formats runtime builds are published in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    TarXz,
    TarGz,
    TarZst,
    Zip,
}

impl ArchiveKind {
    /// Detect the format from an asset file name
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(ArchiveKind::TarXz)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if name.ends_with(".tar.zst") {
            Some(ArchiveKind::TarZst)
        } else if name.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else {
            None
        }
    }

    /// Extract `archive` into `extract_to`, returns the number of entries
    pub fn extract(self, archive: &Path, extract_to: &Path) -> Result<usize> {
        match self {
            ArchiveKind::TarXz => tar::extract_tar_xz(archive, extract_to),
            ArchiveKind::TarGz => tar::extract_tar_gz(archive, extract_to),
            ArchiveKind::TarZst => tar::extract_tar_zst(archive, extract_to),
            ArchiveKind::Zip => zip::extract_zip(archive, extract_to),
        }
    }
}
