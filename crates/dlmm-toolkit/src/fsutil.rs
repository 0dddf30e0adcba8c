//! Owner-only files for the config and the audit log.

use eyre::Context as _;
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::Path;

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt as _, PermissionsExt as _};

pub const MODE_DIR_PRIVATE: u32 = 0o700;
pub const MODE_FILE_PRIVATE: u32 = 0o600;

fn reject_symlink(p: &Path) -> eyre::Result<()> {
    match fs::symlink_metadata(p) {
        Ok(md) if md.file_type().is_symlink() => {
            eyre::bail!("refusing to follow symlink: {}", p.display())
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("stat {}", p.display())),
    }
}

/// Create `dir` if needed and clamp group/other bits away on Unix.
pub fn ensure_private_dir(dir: &Path) -> eyre::Result<()> {
    reject_symlink(dir)?;
    fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
    if !dir.is_dir() {
        eyre::bail!("expected directory at {}", dir.display());
    }
    #[cfg(unix)]
    {
        let mode = fs::metadata(dir)
            .with_context(|| format!("stat {}", dir.display()))?
            .permissions()
            .mode();
        if mode & 0o077 != 0 {
            fs::set_permissions(dir, fs::Permissions::from_mode(MODE_DIR_PRIVATE))
                .with_context(|| format!("chmod {}", dir.display()))?;
        }
    }
    Ok(())
}

fn private_options() -> OpenOptions {
    let mut opts = OpenOptions::new();
    #[cfg(unix)]
    opts.mode(MODE_FILE_PRIVATE);
    opts
}

/// Open `path` for appending, creating it owner-only.
pub fn open_private_append(path: &Path) -> eyre::Result<File> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }
    reject_symlink(path)?;
    private_options()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))
}

/// Replace `path` with `contents` through a synced temp file and a rename.
pub fn replace_private_file(path: &Path, contents: &str) -> eyre::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| eyre::eyre!("missing parent for {}", path.display()))?;
    ensure_private_dir(parent)?;
    reject_symlink(path)?;

    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("file");
    let tmp = parent.join(format!(".{name}.tmp.{}", uuid::Uuid::new_v4().simple()));
    let mut f = private_options()
        .create_new(true)
        .write(true)
        .open(&tmp)
        .with_context(|| format!("open temp {}", tmp.display()))?;
    f.write_all(contents.as_bytes())
        .and_then(|()| f.sync_all())
        .with_context(|| format!("write {}", tmp.display()))?;
    drop(f);

    #[cfg(windows)]
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
    }
    fs::rename(&tmp, path).with_context(|| format!("rename into {}", path.display()))
}
