use crate::error::Result;
use std::fs::Permissions;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting the target.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Create a directory if needed and force its mode.
pub fn ensure_dir_with_mode(path: &Path, mode: u32) -> Result<()> {
    std::fs::create_dir_all(path)?;
    set_mode(path, mode)
}

pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    std::fs::set_permissions(path, Permissions::from_mode(mode))?;
    Ok(())
}

/// True if `path` and every directory above it grant execute to "other",
/// so any account can run it. Symlinks are resolved first.
pub fn others_can_execute(path: &Path) -> Result<bool> {
    let path = std::fs::canonicalize(path)?;
    for p in path.ancestors() {
        let mode = std::fs::metadata(p)?.permissions().mode();
        if mode & 0o001 == 0 {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Append `line` to `path` unless some existing line contains `marker`.
/// Creates the file if it does not exist. Returns true if appended.
pub fn append_line_unless_marked(path: &Path, line: &str, marker: &str) -> Result<bool> {
    let existing = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };
    if existing.lines().any(|l| l.contains(marker)) {
        return Ok(false);
    }
    let sep = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(f, "{sep}{line}")?;
    Ok(true)
}
