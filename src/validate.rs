//! Validation (C5): conflict detection and upload-eligibility gating.
//! See spec.md §4.5.

use crate::error::SyncError;
use crate::fsops::{basename, dirname, is_valid_dir_name, is_valid_file_name};
use crate::model::{Conflict, LocalFileChange, Permission, RemoteFileChange, RemoteFileInfo, UploadChange};
use std::collections::{BTreeMap, BTreeSet};

/// Any path present in both change sets is a conflict — independent
/// additions (`added∧added`) and independent edits (`updated∧updated`)
/// both count (spec.md §4.5; open question in spec.md §9 preserved).
pub fn conflicts(local: &[LocalFileChange], remote: &[RemoteFileChange]) -> Vec<Conflict> {
    let remote_by_path: BTreeMap<&str, &RemoteFileChange> =
        remote.iter().map(|c| (c.path.as_str(), c)).collect();
    let mut out: Vec<Conflict> = local
        .iter()
        .filter_map(|l| {
            remote_by_path.get(l.path.as_str()).map(|r| Conflict {
                path: l.path.clone(),
                change_local: l.change,
                change_remote: r.change,
            })
        })
        .collect();
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

fn remote_index(remote: &[RemoteFileInfo]) -> BTreeMap<&str, &RemoteFileInfo> {
    remote.iter().map(|f| (f.path.as_str(), f)).collect()
}

/// Walks `dirname(path)` upward until a path present in `remote` is found.
/// Returns the ancestor entry and the list of path segments (closest-first)
/// that do not yet exist in the remote inventory ("newly introduced").
/// Absence of any match by the time `.` is reached is `FileSystemCorrupted`.
fn closest_existing_ancestor<'a>(
    remote: &'a BTreeMap<&str, &'a RemoteFileInfo>,
    path: &str,
) -> Result<(&'a RemoteFileInfo, Vec<String>), SyncError> {
    let mut newly_introduced = Vec::new();
    let mut cursor = match dirname(path) {
        Some(d) => d,
        None => {
            return Err(SyncError::FileSystemCorrupted {
                path: path.to_string(),
                reason: "path has no parent".to_string(),
            })
        }
    };
    loop {
        if let Some(entry) = remote.get(cursor.as_str()) {
            return Ok((entry, newly_introduced));
        }
        if cursor == "." {
            return Err(SyncError::FileSystemCorrupted {
                path: path.to_string(),
                reason: "no existing ancestor found in remote inventory".to_string(),
            });
        }
        if let Some(name) = basename(&cursor) {
            newly_introduced.push(name);
        }
        cursor = dirname(&cursor).unwrap_or_else(|| ".".to_string());
    }
}

/// Applies the per-change upload-eligibility checks of spec.md §4.5 and
/// returns the subset that is eligible, or the first failure encountered.
/// `changes` must already exclude `NoChange` (see `model::upload_changes`).
pub fn gate_upload_eligibility(
    changes: &[UploadChange],
    remote: &[RemoteFileInfo],
) -> Result<Vec<UploadChange>, SyncError> {
    let remote_by_path = remote_index(remote);
    for change in changes {
        match change {
            UploadChange::Added(path) => gate_added(path, &remote_by_path)?,
            UploadChange::Removed(path) => gate_removed(path, &remote_by_path)?,
            UploadChange::Updated(path) => gate_updated(path, &remote_by_path)?,
        }
    }
    Ok(changes.to_vec())
}

fn gate_added(
    path: &str,
    remote: &BTreeMap<&str, &RemoteFileInfo>,
) -> Result<(), SyncError> {
    let name = basename(path).ok_or_else(|| SyncError::InvalidFilename(path.to_string()))?;
    if !is_valid_file_name(&name) {
        return Err(SyncError::InvalidFilename(name));
    }
    let (ancestor, newly_introduced) = closest_existing_ancestor(remote, path)?;
    if !ancestor.permissions.is_writable() {
        return Err(SyncError::ReadOnlyFilesChanged {
            path: path.to_string(),
            reason: format!("ancestor {} is read-only", ancestor.path),
        });
    }
    for segment in &newly_introduced {
        if !is_valid_dir_name(segment) {
            return Err(SyncError::FileSystemCorrupted {
                path: path.to_string(),
                reason: format!("invalid ancestor directory name: {}", segment),
            });
        }
    }
    Ok(())
}

fn gate_removed(
    path: &str,
    remote: &BTreeMap<&str, &RemoteFileInfo>,
) -> Result<(), SyncError> {
    if let Some(entry) = remote.get(path) {
        if !entry.permissions.is_writable() {
            return Err(SyncError::ReadOnlyFilesChanged {
                path: path.to_string(),
                reason: "file is read-only on remote".to_string(),
            });
        }
    }
    let (ancestor, _) = closest_existing_ancestor(remote, path)?;
    if !ancestor.permissions.is_writable() {
        return Err(SyncError::ReadOnlyFilesChanged {
            path: path.to_string(),
            reason: format!("ancestor {} is read-only", ancestor.path),
        });
    }
    Ok(())
}

fn gate_updated(
    path: &str,
    remote: &BTreeMap<&str, &RemoteFileInfo>,
) -> Result<(), SyncError> {
    match remote.get(path) {
        Some(entry) if entry.permissions.is_writable() => Ok(()),
        Some(_) => Err(SyncError::ReadOnlyFilesChanged {
            path: path.to_string(),
            reason: "file is read-only on remote".to_string(),
        }),
        None => Err(SyncError::FileSystemCorrupted {
            path: path.to_string(),
            reason: "file missing from remote inventory".to_string(),
        }),
    }
}

/// Paths present in both change sets (used for the conflict gate's
/// emptiness check without building full `Conflict` records).
pub fn intersecting_paths(local: &[LocalFileChange], remote: &[RemoteFileChange]) -> BTreeSet<String> {
    let remote_paths: BTreeSet<&str> = remote.iter().map(|c| c.path.as_str()).collect();
    local
        .iter()
        .filter(|c| remote_paths.contains(c.path.as_str()))
        .map(|c| c.path.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntryType, LocalChangeKind, RemoteChangeKind};

    fn rfile(path: &str, perm: Permission) -> RemoteFileInfo {
        RemoteFileInfo {
            path: path.to_string(),
            entry_type: EntryType::File,
            version: 1,
            permissions: perm,
        }
    }

    fn rdir(path: &str, perm: Permission) -> RemoteFileInfo {
        RemoteFileInfo {
            path: path.to_string(),
            entry_type: EntryType::Dir,
            version: 1,
            permissions: perm,
        }
    }

    #[test]
    fn conflicts_symmetric_on_path_set() {
        let local = vec![LocalFileChange {
            path: "a.txt".to_string(),
            change: LocalChangeKind::Updated,
        }];
        let remote = vec![RemoteFileChange {
            path: "a.txt".to_string(),
            change: RemoteChangeKind::Updated { version: 2 },
        }];
        let c = conflicts(&local, &remote);
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].path, "a.txt");
    }

    #[test]
    fn added_rejected_when_ancestor_readonly() {
        let remote = vec![rdir(".", Permission::R)];
        let changes = vec![UploadChange::Added("notes.txt".to_string())];
        let err = gate_upload_eligibility(&changes, &remote).unwrap_err();
        assert!(matches!(err, SyncError::ReadOnlyFilesChanged { .. }));
    }

    #[test]
    fn added_accepted_when_root_writable() {
        let remote = vec![rdir(".", Permission::Rw)];
        let changes = vec![UploadChange::Added("notes.txt".to_string())];
        assert!(gate_upload_eligibility(&changes, &remote).is_ok());
    }

    #[test]
    fn added_rejects_invalid_filename() {
        let remote = vec![rdir(".", Permission::Rw)];
        let changes = vec![UploadChange::Added("".to_string())];
        let err = gate_upload_eligibility(&changes, &remote).unwrap_err();
        assert!(matches!(err, SyncError::InvalidFilename(_)));
    }

    #[test]
    fn updated_rejected_when_file_readonly() {
        let remote = vec![rfile("README.md", Permission::R)];
        let changes = vec![UploadChange::Updated("README.md".to_string())];
        let err = gate_upload_eligibility(&changes, &remote).unwrap_err();
        assert!(matches!(err, SyncError::ReadOnlyFilesChanged { .. }));
    }

    #[test]
    fn missing_ancestor_is_filesystem_corrupted() {
        let remote: Vec<RemoteFileInfo> = vec![];
        let changes = vec![UploadChange::Added("a/b/c.txt".to_string())];
        let err = gate_upload_eligibility(&changes, &remote).unwrap_err();
        assert!(matches!(err, SyncError::FileSystemCorrupted { .. }));
    }
}
