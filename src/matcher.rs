use crate::models::{AssetRecord, ReleaseRecord};

/// Tokens an asset file name must carry to be installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCriteria {
    /// Architecture marker, e.g. "amd64"
    pub arch: String,
    /// Build flavor marker, e.g. "staging"; unconstrained when `None`
    pub variant: Option<String>,
    /// Required file name suffix, e.g. ".tar.xz"
    pub suffix: String,
}

impl MatchCriteria {
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.contains(&self.arch)
            && self
                .variant
                .as_deref()
                .is_none_or(|variant| file_name.contains(variant))
            && file_name.ends_with(&self.suffix)
    }
}

/// Pick the asset of `release` to install for `criteria`.
///
/// Assets are scanned in catalog order and the first one qualifying wins;
/// catalogs list the canonical build before debug or symbol builds.
/// `None` means the release has no compatible build and should be skipped.
pub fn select_asset<'a>(
    release: &'a ReleaseRecord,
    criteria: &MatchCriteria,
) -> Option<&'a AssetRecord> {
    release
        .assets
        .iter()
        .find(|asset| criteria.matches(&asset.name))
}
