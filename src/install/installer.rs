use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::archive::ArchiveKind;
use crate::archive::normalize::{LayoutError, detect_layout};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::download::http::Downloader;
use crate::error::{Result, WineportError};
use crate::install::executable::ensure_executable;
use crate::matcher::{MatchCriteria, select_asset};
use crate::models::{AssetRecord, InstalledRuntime, ReleaseRecord, RuntimeIdentity};

const STAGING_DIR: &str = ".staging";
/// Where the replaced tree waits inside a staging area during a swap
const PREVIOUS_DIR: &str = "previous";

/// Materializes release assets as version-keyed runtime directories.
///
/// Every install works in `install_root/.staging/<dirname>`, which is removed
/// whether the install succeeds or not. The target directory is only ever
/// replaced by a rename, so it either holds the old tree or the new one.
pub struct Installer {
    install_root: PathBuf,
    runtime_executable: PathBuf,
    downloader: Downloader,
    cancel: CancelToken,
}

/// Result of one release in a batch
#[derive(Debug)]
pub enum Outcome {
    Installed(InstalledRuntime),
    /// No asset of the release matched the criteria
    Skipped,
    Failed(WineportError),
}

#[derive(Debug)]
pub struct BatchItem {
    pub tag: String,
    pub outcome: Outcome,
}

/// Per-release outcomes of [`Installer::install_batch`], in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn installed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Installed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.outcome)).count()
    }
}

impl Installer {
    pub fn new(
        install_root: impl Into<PathBuf>,
        runtime_executable: impl Into<PathBuf>,
        downloader: Downloader,
        cancel: CancelToken,
    ) -> Self {
        Self {
            install_root: install_root.into(),
            runtime_executable: runtime_executable.into(),
            downloader,
            cancel,
        }
    }

    pub fn from_config(config: &Config, cancel: CancelToken) -> Self {
        let downloader = Downloader::new(config.retry_policy(), cancel.clone());
        Self::new(
            &config.install_root,
            &config.runtime_executable,
            downloader,
            cancel,
        )
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn target_dir(&self, identity: &RuntimeIdentity) -> PathBuf {
        self.install_root.join(identity.dir_name())
    }

    fn staging_dir(&self, identity: &RuntimeIdentity) -> PathBuf {
        self.install_root.join(STAGING_DIR).join(identity.dir_name())
    }

    /// Download, verify, extract and normalize `asset` as `identity`.
    ///
    /// Installing an identity that is already present replaces it; installing
    /// the same asset twice yields the same tree.
    pub fn install(
        &self,
        asset: &AssetRecord,
        identity: &RuntimeIdentity,
    ) -> Result<InstalledRuntime> {
        let staging = self.staging_dir(identity);
        let target = self.target_dir(identity);
        recover_previous(&staging, &target)?;

        self.cancel.check()?;

        let kind = ArchiveKind::from_name(&asset.name).ok_or_else(|| {
            WineportError::ExtractionFailed {
                asset: asset.name.clone(),
                reason: "unsupported archive format".to_string(),
            }
        })?;

        info!("Installing {} as {}", asset.name, identity);

        // Leftovers of an interrupted run are never reused
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| WineportError::io(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| WineportError::io(&staging, e))?;

        let result = self
            .stage(asset, kind, &staging)
            .and_then(|payload| self.swap(&payload, &target, &staging));

        if let Err(e) = fs::remove_dir_all(&staging) {
            warn!("Failed to remove staging area {}: {}", staging.display(), e);
        }
        remove_if_empty(&self.install_root.join(STAGING_DIR));

        result?;
        info!("Installed {} to {}", identity, target.display());
        Ok(InstalledRuntime {
            identity: identity.clone(),
            root: target,
        })
    }

    /// Download and unpack into `staging`, returns the normalized payload dir
    fn stage(&self, asset: &AssetRecord, kind: ArchiveKind, staging: &Path) -> Result<PathBuf> {
        let file_name = Path::new(&asset.name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "archive".into());
        let archive_path = staging.join(file_name);

        self.downloader.fetch(asset, &archive_path)?;
        self.cancel.check()?;

        let tree = staging.join("tree");
        let count = kind
            .extract(&archive_path, &tree)
            .map_err(|e| WineportError::ExtractionFailed {
                asset: asset.name.clone(),
                reason: format!("{e:#}"),
            })?;
        debug!("Extracted {} entries from {}", count, asset.name);

        fs::remove_file(&archive_path).map_err(|e| WineportError::io(&archive_path, e))?;

        let layout =
            detect_layout(&tree, &self.runtime_executable).map_err(|e| match e {
                LayoutError::Io(source) => WineportError::io(&tree, source),
                other => WineportError::NormalizationAmbiguous {
                    asset: asset.name.clone(),
                    reason: other.to_string(),
                },
            })?;
        debug!("Detected layout {:?} for {}", layout, asset.name);

        let payload = layout.payload_dir(&tree);
        let executable = payload.join(&self.runtime_executable);
        ensure_executable(&executable).map_err(|e| WineportError::io(&executable, e))?;

        Ok(payload)
    }

    /// Move `payload` to `target`, keeping the previous tree until it is in place
    fn swap(&self, payload: &Path, target: &Path, staging: &Path) -> Result<()> {
        fs::create_dir_all(&self.install_root)
            .map_err(|e| WineportError::io(&self.install_root, e))?;

        let previous = staging.join(PREVIOUS_DIR);
        let had_previous = target.exists();
        if had_previous {
            fs::rename(target, &previous).map_err(|e| WineportError::io(target, e))?;
        }

        if let Err(e) = fs::rename(payload, target) {
            if had_previous && let Err(restore) = fs::rename(&previous, target) {
                warn!(
                    "Failed to restore previous runtime at {}: {}",
                    target.display(),
                    restore
                );
            }
            return Err(WineportError::io(target, e));
        }

        Ok(())
    }

    /// Installed runtimes, sorted by directory name
    pub fn list_installed(&self) -> Result<Vec<InstalledRuntime>> {
        if !self.install_root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.install_root)
            .map_err(|e| WineportError::io(&self.install_root, e))?;

        let mut runtimes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| WineportError::io(&self.install_root, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            if let Some(identity) = RuntimeIdentity::from_dir_name(name) {
                runtimes.push(InstalledRuntime {
                    identity,
                    root: entry.path(),
                });
            }
        }

        runtimes.sort_by(|a, b| a.root.cmp(&b.root));
        Ok(runtimes)
    }

    /// Look up one installed runtime
    pub fn find_installed(&self, identity: &RuntimeIdentity) -> Option<InstalledRuntime> {
        let root = self.target_dir(identity);
        root.is_dir().then(|| InstalledRuntime {
            identity: identity.clone(),
            root,
        })
    }

    pub fn remove(&self, identity: &RuntimeIdentity) -> Result<()> {
        let target = self.target_dir(identity);
        if !target.is_dir() {
            return Err(WineportError::NotInstalled(identity.to_string()));
        }
        fs::remove_dir_all(&target).map_err(|e| WineportError::io(&target, e))?;
        info!("Removed {}", identity);
        Ok(())
    }

    /// Install the matching asset of each release, labelled `variant`.
    ///
    /// Releases are processed in order. A failed or skipped release does not
    /// stop the batch; cancellation marks every remaining release as failed.
    pub fn install_batch(
        &self,
        releases: &[ReleaseRecord],
        criteria: &MatchCriteria,
        variant: &str,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for release in releases {
            let outcome = if self.cancel.is_cancelled() {
                Outcome::Failed(WineportError::Cancelled)
            } else {
                self.install_release(release, criteria, variant)
            };

            match &outcome {
                Outcome::Installed(runtime) => {
                    info!("{}: installed {}", release.tag, runtime.identity)
                }
                Outcome::Skipped => info!("{}: no matching asset, skipped", release.tag),
                Outcome::Failed(e) => warn!("{}: {}", release.tag, e),
            }

            report.items.push(BatchItem {
                tag: release.tag.clone(),
                outcome,
            });
        }

        report
    }

    fn install_release(
        &self,
        release: &ReleaseRecord,
        criteria: &MatchCriteria,
        variant: &str,
    ) -> Outcome {
        let Some(asset) = select_asset(release, criteria) else {
            return Outcome::Skipped;
        };

        let identity = match RuntimeIdentity::from_release(variant, &release.tag) {
            Ok(identity) => identity,
            Err(reason) => return Outcome::Failed(WineportError::validation("tag", reason)),
        };

        match self.install(asset, &identity) {
            Ok(runtime) => Outcome::Installed(runtime),
            Err(e) => Outcome::Failed(e),
        }
    }
}

/// Put back a tree an interrupted swap left in `staging` with no target in
/// its place
fn recover_previous(staging: &Path, target: &Path) -> Result<()> {
    let previous = staging.join(PREVIOUS_DIR);
    if !previous.is_dir() || target.exists() {
        return Ok(());
    }

    warn!(
        "Restoring {} left behind by an interrupted install",
        target.display()
    );
    fs::rename(&previous, target).map_err(|e| WineportError::io(target, e))
}

fn remove_if_empty(dir: &Path) {
    let empty = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if empty {
        let _ = fs::remove_dir(dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::install::executable::is_executable;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_tar_xz(path: &Path, entries: &[(&str, &[u8], u32)]) {
        let file = fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(xz2::write::XzEncoder::new(file, 1));
        for (name, data, mode) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(*mode);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn write_tar_gz(path: &Path, entries: &[(&str, &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
        let options = zip::write::FileOptions::default().unix_permissions(0o755);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    fn local_asset(path: &Path) -> AssetRecord {
        AssetRecord {
            name: path.file_name().unwrap().to_string_lossy().to_string(),
            url: path.to_string_lossy().to_string(),
            size: Some(fs::metadata(path).unwrap().len()),
            digest: None,
        }
    }

    fn installer(root: &Path, cancel: CancelToken) -> Installer {
        let downloader = Downloader::new(RetryPolicy::default(), cancel.clone());
        Installer::new(root, "bin/wine", downloader, cancel)
    }

    fn id(variant: &str, version: &str) -> RuntimeIdentity {
        RuntimeIdentity::new(variant, version).unwrap()
    }

    fn assert_no_staging(root: &Path) {
        assert!(!root.join(STAGING_DIR).exists());
    }

    #[test]
    fn test_install_wrapped_tar_xz() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("wine-9.0-amd64.tar.xz");
        write_tar_xz(
            &archive,
            &[
                ("wine-9.0-amd64/bin/wine", b"#!/bin/sh", 0o755),
                ("wine-9.0-amd64/lib/wine/ntdll.so", b"elf", 0o644),
            ],
        );
        let root = temp.path().join("runtimes");
        let installer = installer(&root, CancelToken::new());

        let runtime = installer
            .install(&local_asset(&archive), &id("vanilla", "9.0"))
            .unwrap();

        assert_eq!(runtime.root, root.join("wine-vanilla-9.0"));
        assert!(is_executable(&runtime.executable(Path::new("bin/wine"))).unwrap());
        assert!(runtime.root.join("lib/wine/ntdll.so").is_file());
        assert_no_staging(&root);
    }

    #[test]
    fn test_install_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("wine-9.0-staging-amd64.tar.xz");
        write_tar_xz(&archive, &[("top/bin/wine", b"#!/bin/sh", 0o755)]);
        let root = temp.path().join("runtimes");
        let installer = installer(&root, CancelToken::new());
        let asset = local_asset(&archive);

        let first = installer.install(&asset, &id("staging", "9.0")).unwrap();
        let second = installer.install(&asset, &id("staging", "9.0")).unwrap();

        assert_eq!(first, second);
        let names: Vec<_> = fs::read_dir(&root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["wine-staging-9.0".to_string()]);
        assert_eq!(fs::read(second.root.join("bin/wine")).unwrap(), b"#!/bin/sh");
    }

    #[test]
    fn test_install_files_nested_tar_gz() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("GE-Proton9-1.tar.gz");
        write_tar_gz(
            &archive,
            &[
                ("GE-Proton9-1/files/bin/wine", b"#!/bin/sh"),
                ("GE-Proton9-1/proton", b"py"),
            ],
        );
        let root = temp.path().join("runtimes");

        let runtime = installer(&root, CancelToken::new())
            .install(&local_asset(&archive), &id("ge", "9-1"))
            .unwrap();

        assert!(runtime.root.join("bin/wine").is_file());
        assert!(!runtime.root.join("proton").exists());
    }

    #[test]
    fn test_install_bare_zip_sets_exec_bit() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("wine.zip");
        write_zip(&archive, &[("bin/wine", b"#!/bin/sh"), ("share/x", b"x")]);
        let root = temp.path().join("runtimes");

        let runtime = installer(&root, CancelToken::new())
            .install(&local_asset(&archive), &id("vanilla", "8.0"))
            .unwrap();

        assert!(is_executable(&runtime.root.join("bin/wine")).unwrap());
        assert!(runtime.root.join("share/x").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_exec_bit_is_repaired() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("w.tar.xz");
        write_tar_xz(&archive, &[("bin/wine", b"#!/bin/sh", 0o644)]);
        let root = temp.path().join("runtimes");

        let runtime = installer(&root, CancelToken::new())
            .install(&local_asset(&archive), &id("vanilla", "1"))
            .unwrap();
        assert!(is_executable(&runtime.root.join("bin/wine")).unwrap());
    }

    #[test]
    fn test_reinstall_replaces_previous_tree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("runtimes");
        let installer = installer(&root, CancelToken::new());

        let old = temp.path().join("old.tar.xz");
        write_tar_xz(&old, &[("bin/wine", b"one", 0o755), ("stale.txt", b"s", 0o644)]);
        installer.install(&local_asset(&old), &id("tkg", "9.1")).unwrap();

        let new = temp.path().join("new.tar.xz");
        write_tar_xz(&new, &[("bin/wine", b"two", 0o755)]);
        let runtime = installer.install(&local_asset(&new), &id("tkg", "9.1")).unwrap();

        assert_eq!(fs::read(runtime.root.join("bin/wine")).unwrap(), b"two");
        assert!(!runtime.root.join("stale.txt").exists());
        assert_no_staging(&root);
    }

    #[test]
    fn test_failed_reinstall_keeps_existing_tree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("runtimes");
        let installer = installer(&root, CancelToken::new());

        let good = temp.path().join("good.tar.xz");
        write_tar_xz(&good, &[("bin/wine", b"good", 0o755)]);
        installer.install(&local_asset(&good), &id("vanilla", "9.0")).unwrap();

        let bad = temp.path().join("bad.tar.xz");
        fs::write(&bad, b"not an archive").unwrap();
        let err = installer
            .install(&local_asset(&bad), &id("vanilla", "9.0"))
            .unwrap_err();

        assert!(matches!(err, WineportError::ExtractionFailed { .. }));
        assert_eq!(
            fs::read(root.join("wine-vanilla-9.0/bin/wine")).unwrap(),
            b"good"
        );
        assert_no_staging(&root);
    }

    #[test]
    fn test_ambiguous_layout_leaves_no_target() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("odd.tar.xz");
        write_tar_xz(
            &archive,
            &[("bin/wine", b"a", 0o755), ("files/bin/wine", b"b", 0o755)],
        );
        let root = temp.path().join("runtimes");

        let err = installer(&root, CancelToken::new())
            .install(&local_asset(&archive), &id("vanilla", "9.0"))
            .unwrap_err();

        assert!(
            matches!(err, WineportError::NormalizationAmbiguous { ref reason, .. } if reason.contains("ambiguous"))
        );
        assert!(!root.join("wine-vanilla-9.0").exists());
        assert_no_staging(&root);
    }

    #[test]
    fn test_unsupported_format() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("wine.rpm");
        fs::write(&file, b"rpm").unwrap();

        let err = installer(&temp.path().join("runtimes"), CancelToken::new())
            .install(&local_asset(&file), &id("vanilla", "9.0"))
            .unwrap_err();
        assert!(matches!(err, WineportError::ExtractionFailed { .. }));
    }

    #[test]
    fn test_interrupted_swap_is_restored_before_staging_is_cleared() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("runtimes");
        let previous = root.join(".staging/wine-vanilla-9.0/previous");
        fs::create_dir_all(previous.join("bin")).unwrap();
        fs::write(previous.join("bin/wine"), b"old").unwrap();

        let bad = temp.path().join("bad.tar.xz");
        fs::write(&bad, b"not an archive").unwrap();
        let installer = installer(&root, CancelToken::new());
        let err = installer
            .install(&local_asset(&bad), &id("vanilla", "9.0"))
            .unwrap_err();

        assert!(matches!(err, WineportError::ExtractionFailed { .. }));
        assert_eq!(fs::read(root.join("wine-vanilla-9.0/bin/wine")).unwrap(), b"old");
        assert!(installer.find_installed(&id("vanilla", "9.0")).is_some());
        assert_no_staging(&root);
    }

    #[test]
    fn test_stale_previous_does_not_clobber_current_tree() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("runtimes");
        let installer = installer(&root, CancelToken::new());

        let good = temp.path().join("good.tar.xz");
        write_tar_xz(&good, &[("bin/wine", b"current", 0o755)]);
        installer.install(&local_asset(&good), &id("vanilla", "9.0")).unwrap();

        let previous = root.join(".staging/wine-vanilla-9.0/previous");
        fs::create_dir_all(previous.join("bin")).unwrap();
        fs::write(previous.join("bin/wine"), b"stale").unwrap();

        let runtime = installer.install(&local_asset(&good), &id("vanilla", "9.0")).unwrap();
        assert_eq!(fs::read(runtime.root.join("bin/wine")).unwrap(), b"current");
        assert_no_staging(&root);
    }

    /// Every file under `root` as (relative path, contents), sorted
    fn tree_contents(root: &Path) -> Vec<(String, Vec<u8>)> {
        fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(root, &path, out);
                } else {
                    let rel = path.strip_prefix(root).unwrap().to_string_lossy().to_string();
                    out.push((rel, fs::read(&path).unwrap()));
                }
            }
        }

        let mut out = Vec::new();
        walk(root, root, &mut out);
        out.sort();
        out
    }

    #[test]
    fn test_wrapping_shapes_normalize_to_same_tree() {
        let temp = TempDir::new().unwrap();
        let payload: [(&str, &[u8]); 3] = [
            ("bin/wine", b"#!/bin/sh"),
            ("bin/wineserver", b"server"),
            ("lib/wine/x86_64-unix/ntdll.so", b"elf"),
        ];
        let nested = |prefix: &str| -> Vec<(String, &[u8])> {
            payload
                .iter()
                .map(|(name, data)| (format!("{prefix}{name}"), *data))
                .collect()
        };

        let bare = temp.path().join("bare.tar.xz");
        let entries = nested("");
        write_tar_xz(
            &bare,
            &entries.iter().map(|(n, d)| (n.as_str(), *d, 0o755)).collect::<Vec<_>>(),
        );

        let wrapped = temp.path().join("wrapped.tar.gz");
        let entries = nested("wine-9.0-amd64/");
        write_tar_gz(
            &wrapped,
            &entries.iter().map(|(n, d)| (n.as_str(), *d)).collect::<Vec<_>>(),
        );

        let files = temp.path().join("files.zip");
        let entries = nested("files/");
        write_zip(
            &files,
            &entries.iter().map(|(n, d)| (n.as_str(), *d)).collect::<Vec<_>>(),
        );

        let wrapped_files = temp.path().join("proton.tar.xz");
        let entries = nested("GE-Proton9-1/files/");
        write_tar_xz(
            &wrapped_files,
            &entries.iter().map(|(n, d)| (n.as_str(), *d, 0o755)).collect::<Vec<_>>(),
        );

        let root = temp.path().join("runtimes");
        let installer = installer(&root, CancelToken::new());
        let trees: Vec<_> = [
            (&bare, "bare"),
            (&wrapped, "wrapped"),
            (&files, "files"),
            (&wrapped_files, "proton"),
        ]
        .into_iter()
        .map(|(archive, variant)| {
            let runtime = installer.install(&local_asset(archive), &id(variant, "9.0")).unwrap();
            tree_contents(&runtime.root)
        })
        .collect();

        let expected: Vec<(String, Vec<u8>)> = payload
            .iter()
            .map(|(name, data)| (name.to_string(), data.to_vec()))
            .collect();
        for tree in &trees {
            assert_eq!(tree, &expected);
        }
    }

    #[test]
    fn test_list_and_remove() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("runtimes");
        let installer = installer(&root, CancelToken::new());
        assert!(installer.list_installed().unwrap().is_empty());

        let archive = temp.path().join("w.tar.xz");
        write_tar_xz(&archive, &[("bin/wine", b"w", 0o755)]);
        let asset = local_asset(&archive);
        installer.install(&asset, &id("staging", "9.0")).unwrap();
        installer.install(&asset, &id("staging", "8.0")).unwrap();
        fs::create_dir_all(root.join(".staging/leftover")).unwrap();
        fs::create_dir_all(root.join("unrelated")).unwrap();

        let listed: Vec<String> = installer
            .list_installed()
            .unwrap()
            .iter()
            .map(|r| r.identity.to_string())
            .collect();
        assert_eq!(listed, vec!["staging:8.0", "staging:9.0"]);

        installer.remove(&id("staging", "8.0")).unwrap();
        assert!(installer.find_installed(&id("staging", "8.0")).is_none());
        assert!(installer.find_installed(&id("staging", "9.0")).is_some());
        assert!(matches!(
            installer.remove(&id("staging", "8.0")),
            Err(WineportError::NotInstalled(_))
        ));
    }

    fn release(tag: &str, assets: &[&Path]) -> ReleaseRecord {
        ReleaseRecord {
            tag: tag.to_string(),
            name: tag.to_string(),
            assets: assets.iter().map(|p| local_asset(p)).collect(),
        }
    }

    fn criteria() -> MatchCriteria {
        MatchCriteria {
            arch: "amd64".to_string(),
            variant: None,
            suffix: ".tar.xz".to_string(),
        }
    }

    #[test]
    fn test_batch_continues_past_skips() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("wine-9.1-amd64.tar.xz");
        let b = temp.path().join("wine-9.0-x86.tar.xz");
        let c = temp.path().join("wine-8.21-amd64.tar.xz");
        for path in [&a, &b, &c] {
            write_tar_xz(path, &[("top/bin/wine", b"w", 0o755)]);
        }
        let root = temp.path().join("runtimes");
        let releases = vec![
            release("9.1", &[a.as_path()]),
            release("9.0", &[b.as_path()]),
            release("8.21", &[c.as_path()]),
        ];

        let report = installer(&root, CancelToken::new()).install_batch(&releases, &criteria(), "vanilla");

        assert_eq!(report.installed(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 0);
        assert!(matches!(report.items[1].outcome, Outcome::Skipped));
        assert!(root.join("wine-vanilla-9.1").is_dir());
        assert!(root.join("wine-vanilla-8.21").is_dir());
    }

    #[test]
    fn test_batch_records_failures_and_continues() {
        let temp = TempDir::new().unwrap();
        let broken = temp.path().join("wine-9.1-amd64.tar.xz");
        fs::write(&broken, b"garbage").unwrap();
        let good_dir = temp.path().join("good");
        fs::create_dir_all(&good_dir).unwrap();
        let good = good_dir.join("wine-9.0-amd64.tar.xz");
        write_tar_xz(&good, &[("bin/wine", b"w", 0o755)]);
        let root = temp.path().join("runtimes");

        let report = installer(&root, CancelToken::new()).install_batch(
            &[release("9.1", &[broken.as_path()]), release("9.0", &[good.as_path()])],
            &criteria(),
            "vanilla",
        );

        assert_eq!(report.failed(), 1);
        assert_eq!(report.installed(), 1);
        assert_eq!(report.items[0].tag, "9.1");
    }

    #[test]
    fn test_cancelled_batch_installs_nothing() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("wine-9.1-amd64.tar.xz");
        write_tar_xz(&a, &[("bin/wine", b"w", 0o755)]);
        let root = temp.path().join("runtimes");
        let cancel = CancelToken::new();
        cancel.cancel();

        let report = installer(&root, cancel).install_batch(
            &[release("9.1", &[a.as_path()]), release("9.0", &[a.as_path()])],
            &criteria(),
            "vanilla",
        );

        assert_eq!(report.failed(), 2);
        assert!(report
            .items
            .iter()
            .all(|i| matches!(i.outcome, Outcome::Failed(WineportError::Cancelled))));
        assert!(!root.exists());
    }
}
