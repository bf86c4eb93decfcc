use std::fs;
use std::io;
use std::path::Path;

/// Check if a file is executable
pub fn is_executable(path: &Path) -> io::Result<bool> {
    let metadata = fs::metadata(path)?;

    if !metadata.is_file() {
        return Ok(false);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode();
        Ok(mode & 0o111 != 0)
    }

    #[cfg(not(unix))]
    {
        Ok(true)
    }
}

/// Add execute permission to a file that lacks it.
///
/// Some archives (zip in particular) drop the mode bits of the runtime
/// executable; the installed tree must always be launchable.
pub fn ensure_executable(path: &Path) -> io::Result<()> {
    if is_executable(path)? {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}
