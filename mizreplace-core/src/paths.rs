use std::env;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute against the current directory and fold away `.` and
/// `..` components without touching the filesystem.
pub fn resolve_absolute(path: &Path) -> io::Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    };
    Ok(normalize(&joined))
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `pop` refuses to climb above the root, matching `/..` == `/`.
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// True when both paths name the same file, either by spelling once resolved
/// or, for files that already exist, after following symlinks.
pub fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    if resolve_absolute(a)? == resolve_absolute(b)? {
        return Ok(true);
    }

    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => Ok(ca == cb),
        _ => Ok(false),
    }
}
