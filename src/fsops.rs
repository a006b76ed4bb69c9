//! Path & filesystem primitives (C1). See spec.md §4.1.
//!
//! Grounded on the teacher's `sync.rs` (`list_local`, `is_ignored`,
//! `compute_file_hash`) and `config.rs` (tilde expansion), generalised into
//! named, independently testable operations.

use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[cfg(windows)]
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// OS-junk files that never participate in sync, regardless of visibility rules.
const IGNORED_BASENAMES: &[&str] = &[".DS_Store", "Thumbs.db", "Desktop.ini", ".directory"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    File,
    Dir,
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub path: PathBuf,
    pub node_type: NodeType,
}

/// OS-appropriate join of path segments.
pub fn join(base: &Path, segments: &[&str]) -> PathBuf {
    let mut out = base.to_path_buf();
    for s in segments {
        out.push(s);
    }
    out
}

/// Fails on degenerate inputs (`.`, `/`, empty).
pub fn dirname(p: &str) -> Option<String> {
    if p.is_empty() || p == "." || p == "/" {
        return None;
    }
    let path = Path::new(p);
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            Some(parent.to_string_lossy().replace('\\', "/"))
        }
        _ => Some(".".to_string()),
    }
}

/// Fails on degenerate inputs (`.`, `/`, empty).
pub fn basename(p: &str) -> Option<String> {
    if p.is_empty() || p == "." || p == "/" {
        return None;
    }
    Path::new(p)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
}

/// Returns the relative suffix of `abs` under `root`, or `None` if `abs` is
/// not contained in `root`.
pub fn strip_ancestor(root: &Path, abs: &Path) -> Option<String> {
    abs.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

/// Replaces characters forbidden in a path segment with a deterministic,
/// injective percent-style escape. `%` itself is escaped so the mapping
/// stays injective over arbitrary legal source strings (P7).
pub fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        let needs_escape = c == '%'
            || c.is_control()
            || (c.is_ascii() && FORBIDDEN_CHARS.contains(&c));
        if needs_escape {
            for b in c.to_string().as_bytes() {
                out.push_str(&format!("%{:02X}", b));
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Name containing path separators, control characters, the empty string,
/// or (on Windows) a reserved device name is invalid.
pub fn is_valid_file_name(name: &str) -> bool {
    is_valid_name(name)
}

pub fn is_valid_dir_name(name: &str) -> bool {
    is_valid_name(name)
}

fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    if name.contains('/') || name.contains('\\') {
        return false;
    }
    if name.chars().any(|c| c.is_control()) {
        return false;
    }
    #[cfg(windows)]
    {
        let stem = name.split('.').next().unwrap_or(name).to_ascii_uppercase();
        if RESERVED_NAMES.contains(&stem.as_str()) {
            return false;
        }
    }
    true
}

/// True if `p` is not an editor swap file / VCS internal / OS junk file.
pub fn is_visible_file(p: &Path) -> bool {
    let normalized = p.to_string_lossy().replace('\\', "/");
    if normalized.contains("/.git/") || normalized.starts_with(".git/") {
        return false;
    }
    let name = match p.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    if IGNORED_BASENAMES.contains(&name) {
        return false;
    }
    if name.starts_with('.') && name != "." && name != ".." {
        // dotfiles are hidden entries, not synced
        return false;
    }
    if name.ends_with('~') || name.ends_with(".swp") || name.ends_with(".swo") {
        return false;
    }
    true
}

/// Lazily walks `root`, yielding every visible node. Symlinks are not followed.
pub fn read_dir_tree(root: &Path) -> impl Iterator<Item = TreeNode> + '_ {
    walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path() != root)
        .filter(|e| is_visible_file(e.path()) || e.file_type().is_dir())
        .filter_map(|e| {
            let node_type = if e.file_type().is_dir() {
                NodeType::Dir
            } else if e.file_type().is_file() {
                NodeType::File
            } else {
                return None;
            };
            Some(TreeNode {
                path: e.path().to_path_buf(),
                node_type,
            })
        })
}

/// Streaming SHA-256 content digest, hex-encoded. Stable across platforms.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Writes atomically (write-temp-then-rename), creating parent dirs first,
/// then sets the file mode according to `read_only`.
pub fn write_file(path: &Path, content: &[u8], read_only: bool) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = sibling_temp_path(path);
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    set_readonly(path, read_only)?;
    Ok(())
}

fn sibling_temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    let tmp_name = format!(".{}.{}.tmp", file_name, std::process::id());
    path.with_file_name(tmp_name)
}

#[cfg(unix)]
fn set_readonly(path: &Path, read_only: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if read_only { 0o444 } else { 0o644 };
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_readonly(path: &Path, read_only: bool) -> io::Result<()> {
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_readonly(read_only);
    std::fs::set_permissions(path, perms)
}

pub fn mkdir(path: &Path, read_only: bool) -> io::Result<()> {
    std::fs::create_dir_all(path)?;
    set_dir_mode(path, read_only)
}

#[cfg(unix)]
fn set_dir_mode(path: &Path, read_only: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if read_only { 0o555 } else { 0o755 };
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_dir_mode(_path: &Path, _read_only: bool) -> io::Result<()> {
    Ok(())
}

pub fn remove_file(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

pub fn remove_dir(path: &Path, recursive: bool) -> io::Result<()> {
    let result = if recursive {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_dir(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

pub fn path_exists(path: &Path) -> bool {
    path.exists()
}

/// A fresh, unused temp directory under the OS temp root.
pub fn temp_dir() -> io::Result<PathBuf> {
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("projectsync-{}-{}", std::process::id(), nonce));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_is_injective_over_forbidden_chars() {
        let a = escape_segment("a/b");
        let b = escape_segment("a%2Fb");
        assert_ne!(a, b);
    }

    #[test]
    fn escape_roundtrip_safe_for_plain_text() {
        assert_eq!(escape_segment("Algorithms 1"), "Algorithms 1");
    }

    #[test]
    fn escape_replaces_path_separators() {
        let escaped = escape_segment("a/b\\c");
        assert!(!escaped.contains('/'));
        assert!(!escaped.contains('\\'));
    }

    #[test]
    fn invalid_names_rejected() {
        assert!(!is_valid_file_name(""));
        assert!(!is_valid_file_name("."));
        assert!(!is_valid_file_name(".."));
        assert!(!is_valid_file_name("a/b"));
        assert!(is_valid_file_name("report.pdf"));
    }

    #[test]
    fn dotfiles_and_junk_are_not_visible() {
        assert!(!is_visible_file(Path::new("/proj/.DS_Store")));
        assert!(!is_visible_file(Path::new("/proj/.git/HEAD")));
        assert!(!is_visible_file(Path::new("/proj/.hidden")));
        assert!(is_visible_file(Path::new("/proj/src/main.rs")));
    }

    #[test]
    fn strip_ancestor_computes_relative_suffix() {
        let root = Path::new("/home/user/project");
        let abs = Path::new("/home/user/project/src/lib.rs");
        assert_eq!(strip_ancestor(root, abs), Some("src/lib.rs".to_string()));
        assert_eq!(strip_ancestor(root, Path::new("/other/file")), None);
    }

    #[test]
    fn hash_bytes_is_stable() {
        assert_eq!(hash_bytes(b"hello"), hash_bytes(b"hello"));
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn write_and_hash_roundtrip() {
        let dir = temp_dir().unwrap();
        let path = dir.join("a.txt");
        write_file(&path, b"content", false).unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"content"));
        remove_dir(&dir, true).unwrap();
    }
}
