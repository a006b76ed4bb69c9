//! Change detection (C4). See spec.md §4.4.
//!
//! Given a baseline and an observed inventory (both filtered to
//! `type = File`, I5), computes added/removed/updated sets by path,
//! discriminated by `version` (remote) or `hash` (local). Grounded on the
//! teacher's ad hoc `HashSet` differencing in `sync.rs::run_sync`,
//! generalised into a named, reusable operation.

use crate::model::{
    FileInfo, LocalChangeKind, LocalFileChange, LocalFileState, RemoteChangeKind,
    RemoteFileChange, RemoteFileInfo,
};
use std::collections::BTreeMap;

/// `diff(B, remote.files)`, discriminated by `version`.
///
/// Emitted in stable order: removed, then added, then updated, each
/// alphabetised by path (spec.md §4.4 "Tie-break & ordering").
pub fn diff_remote(baseline: &[FileInfo], latest: &[RemoteFileInfo]) -> Vec<RemoteFileChange> {
    let prev: BTreeMap<&str, &FileInfo> = baseline
        .iter()
        .filter(|f| f.is_file())
        .map(|f| (f.path.as_str(), f))
        .collect();
    let next: BTreeMap<&str, &RemoteFileInfo> = latest
        .iter()
        .filter(|f| f.is_file())
        .map(|f| (f.path.as_str(), f))
        .collect();

    let mut removed = Vec::new();
    let mut added = Vec::new();
    let mut updated = Vec::new();

    for (path, prev_entry) in &prev {
        match next.get(path) {
            None => removed.push(RemoteFileChange {
                path: path.to_string(),
                change: RemoteChangeKind::Removed,
            }),
            Some(next_entry) if next_entry.version != prev_entry.version => {
                updated.push(RemoteFileChange {
                    path: path.to_string(),
                    change: RemoteChangeKind::Updated {
                        version: next_entry.version,
                    },
                })
            }
            Some(_) => {}
        }
    }
    for (path, next_entry) in &next {
        if !prev.contains_key(path) {
            added.push(RemoteFileChange {
                path: path.to_string(),
                change: RemoteChangeKind::Added {
                    version: next_entry.version,
                },
            });
        }
    }

    removed.sort_by(|a, b| a.path.cmp(&b.path));
    added.sort_by(|a, b| a.path.cmp(&b.path));
    updated.sort_by(|a, b| a.path.cmp(&b.path));

    removed.into_iter().chain(added).chain(updated).collect()
}

/// `diff(B, local-scan)`, discriminated by `hash`.
pub fn diff_local(baseline: &[FileInfo], latest: &[LocalFileState]) -> Vec<LocalFileChange> {
    let prev: BTreeMap<&str, &FileInfo> = baseline
        .iter()
        .filter(|f| f.is_file())
        .map(|f| (f.path.as_str(), f))
        .collect();
    let next: BTreeMap<&str, &LocalFileState> =
        latest.iter().map(|f| (f.path.as_str(), f)).collect();

    let mut removed = Vec::new();
    let mut added = Vec::new();
    let mut updated = Vec::new();

    for (path, prev_entry) in &prev {
        match next.get(path) {
            None => removed.push(LocalFileChange {
                path: path.to_string(),
                change: LocalChangeKind::Removed,
            }),
            Some(next_entry) if prev_entry.hash.as_deref() != Some(next_entry.hash.as_str()) => {
                updated.push(LocalFileChange {
                    path: path.to_string(),
                    change: LocalChangeKind::Updated,
                })
            }
            Some(_) => {}
        }
    }
    for path in next.keys() {
        if !prev.contains_key(path) {
            added.push(LocalFileChange {
                path: path.to_string(),
                change: LocalChangeKind::Added,
            });
        }
    }

    removed.sort_by(|a, b| a.path.cmp(&b.path));
    added.sort_by(|a, b| a.path.cmp(&b.path));
    updated.sort_by(|a, b| a.path.cmp(&b.path));

    removed.into_iter().chain(added).chain(updated).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryType, Permission};

    fn file(path: &str, version: i64, hash: &str) -> FileInfo {
        FileInfo {
            path: path.to_string(),
            entry_type: EntryType::File,
            version,
            hash: Some(hash.to_string()),
            permissions: Permission::Rw,
        }
    }

    fn remote(path: &str, version: i64) -> RemoteFileInfo {
        RemoteFileInfo {
            path: path.to_string(),
            entry_type: EntryType::File,
            version,
            permissions: Permission::Rw,
        }
    }

    fn local(path: &str, hash: &str) -> LocalFileState {
        LocalFileState {
            path: path.to_string(),
            entry_type: EntryType::File,
            hash: hash.to_string(),
        }
    }

    #[test]
    fn remote_diff_detects_added_updated_removed() {
        let baseline = vec![file("a.txt", 1, "h1"), file("b.txt", 1, "h1")];
        let latest = vec![remote("a.txt", 2), remote("c.txt", 1)];
        let changes = diff_remote(&baseline, &latest);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].path, "b.txt");
        assert_eq!(changes[0].change, RemoteChangeKind::Removed);
        assert_eq!(changes[1].path, "c.txt");
        assert!(matches!(changes[1].change, RemoteChangeKind::Added { version: 1 }));
        assert_eq!(changes[2].path, "a.txt");
        assert!(matches!(changes[2].change, RemoteChangeKind::Updated { version: 2 }));
    }

    #[test]
    fn diff_against_self_is_empty() {
        let baseline = vec![file("a.txt", 1, "h1")];
        let latest = vec![remote("a.txt", 1)];
        assert!(diff_remote(&baseline, &latest).is_empty());
    }

    #[test]
    fn local_diff_uses_hash_discriminator() {
        let baseline = vec![file("a.txt", 1, "h1")];
        let latest = vec![local("a.txt", "h2")];
        let changes = diff_local(&baseline, &latest);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change, LocalChangeKind::Updated);
    }

    #[test]
    fn dirs_do_not_participate_in_diff() {
        let mut baseline = vec![file("a.txt", 1, "h1")];
        baseline.push(FileInfo {
            path: "lib".to_string(),
            entry_type: EntryType::Dir,
            version: 1,
            hash: None,
            permissions: Permission::Rw,
        });
        let latest = vec![remote("a.txt", 1)];
        assert!(diff_remote(&baseline, &latest).is_empty());
    }
}
