//! Sync orchestrator (C7): the state machine that drives one sync run
//! end-to-end, composing C1–C6. See spec.md §4.7.
//!
//! Grounded in the teacher's `sync.rs::run_sync` (progress/status globals,
//! sequential delete/download/upload ordering, structured logging) but
//! restructured around the named phases spec.md §4.7 lists instead of the
//! teacher's single `HashSet`-differencing pass, and made to depend only
//! on injected collaborators (`ApiClient`, `ProjectStore`, a resolved
//! project root) per spec.md §9 ("no global mutable state... passed in").

use crate::api::ApiClient;
use crate::archive;
use crate::diff;
use crate::error::SyncError;
use crate::fsops;
use crate::model::{
    project_dir_relative, upload_changes, Changes, EntryType, FileInfo, LocalFileState,
    LocalState, Project, RemoteFileInfo, SyncState, UploadChange,
};
use crate::store::ProjectStore;
use crate::validate;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A user-approved override that discards one side's changes (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Force {
    Push,
    Pull,
}

/// Cooperative cancellation: checked between phases and between files in
/// the download/delete loops (spec.md §5). An in-flight HTTP call or
/// single-file write always completes.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), SyncError> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

pub struct SyncContext {
    pub api: ApiClient,
    pub store: Arc<ProjectStore>,
    /// The configured project root directory, or `None` if unset
    /// (`projectDirMissing`, spec.md §4.7 phase 1).
    pub project_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub uploaded: Vec<String>,
    pub downloaded: Vec<String>,
    pub deleted_local: Vec<String>,
    pub project: Option<Project>,
}

#[derive(Clone)]
pub struct SyncProgress {
    pub phase: String,
    pub current: u64,
    pub total: u64,
}

static SYNC_PROGRESS: Mutex<Option<SyncProgress>> = Mutex::new(None);

fn set_progress(phase: &str, current: u64, total: u64) {
    if let Ok(mut guard) = SYNC_PROGRESS.lock() {
        *guard = Some(SyncProgress {
            phase: phase.to_string(),
            current,
            total,
        });
    }
}

pub fn get_progress() -> Option<SyncProgress> {
    SYNC_PROGRESS.lock().ok().and_then(|g| g.clone())
}

fn relative_to_abs(root: &Path, rel: &str) -> PathBuf {
    root.join(rel.replace('/', std::path::MAIN_SEPARATOR_STR))
}

fn now_epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Drives one sync run through Setup → Inventory → Diff → Conflict gate →
/// Plan → Apply → Commit. Any phase's failure aborts the run without
/// mutating the store (I2, P6): the baseline is only written in Commit,
/// the last step.
pub fn run_sync(
    ctx: &SyncContext,
    project: &Project,
    force: Option<Force>,
    cancel: &CancelToken,
) -> Result<SyncOutcome, SyncError> {
    // Phase 1: Setup
    let project_root = ctx.project_root.clone().ok_or(SyncError::ProjectDirMissing)?;
    let project_dir_rel = match project {
        Project::Remote { metadata } => project_dir_relative(metadata),
        Project::Local { state, .. } => state.base_path.clone(),
    };
    let project_dir = relative_to_abs(&project_root, &project_dir_rel);
    log::info!("sync[{}]: setup complete, project_dir={}", project.id(), project_dir.display());
    cancel.check()?;

    // Phase 2: Inventory
    set_progress("inventory", 0, 0);
    let remote_info = ctx.api.get_project_info(project.id().as_str())?;
    let baseline = project.baseline().to_vec();
    let local_scan: Vec<LocalFileState> = match project {
        Project::Local { .. } => scan_local(&project_dir)?,
        Project::Remote { .. } => Vec::new(),
    };
    log::info!(
        "sync[{}]: inventory {} remote entries, {} local files",
        project.id(),
        remote_info.files.len(),
        local_scan.len()
    );
    cancel.check()?;

    // Phase 3: Diff
    let remote_changes = if force == Some(Force::Push) {
        Vec::new()
    } else {
        diff::diff_remote(&baseline, &remote_info.files)
    };
    let local_changes = match project {
        Project::Local { .. } if force != Some(Force::Pull) => diff::diff_local(&baseline, &local_scan),
        _ => Vec::new(),
    };

    // Phase 4: Conflict gate
    if force.is_none() && !remote_changes.is_empty() && !local_changes.is_empty() {
        let intersecting = validate::intersecting_paths(&local_changes, &remote_changes);
        if !intersecting.is_empty() {
            return Err(SyncError::ConflictingChanges {
                paths: intersecting.into_iter().collect(),
            });
        }
    }
    cancel.check()?;

    // Phase 5: Plan
    let planned_upload = upload_changes(&local_changes);
    let eligible_upload = validate::gate_upload_eligibility(&planned_upload, &remote_info.files)?;
    let to_archive: Vec<String> = eligible_upload
        .iter()
        .filter_map(|c| match c {
            UploadChange::Added(p) | UploadChange::Updated(p) => Some(p.clone()),
            UploadChange::Removed(_) => None,
        })
        .collect();
    let to_remove_remote: Vec<String> = eligible_upload
        .iter()
        .filter_map(|c| match c {
            UploadChange::Removed(p) => Some(p.clone()),
            _ => None,
        })
        .collect();

    let remote_by_path: std::collections::BTreeMap<&str, &RemoteFileInfo> =
        remote_info.files.iter().map(|f| (f.path.as_str(), f)).collect();
    let files_to_download: Vec<RemoteFileInfo> = remote_changes
        .iter()
        .filter(|c| matches!(c.change, crate::model::RemoteChangeKind::Added { .. } | crate::model::RemoteChangeKind::Updated { .. }))
        .filter_map(|c| remote_by_path.get(c.path.as_str()).map(|f| (*f).clone()))
        .filter(|f| f.is_file())
        .collect();
    let files_to_delete: Vec<String> = remote_changes
        .iter()
        .filter(|c| matches!(c.change, crate::model::RemoteChangeKind::Removed))
        .map(|c| c.path.clone())
        .collect();

    let mut dirs_to_ensure: Vec<&RemoteFileInfo> = remote_info
        .files
        .iter()
        .filter(|f| f.entry_type == EntryType::Dir)
        .collect();
    dirs_to_ensure.sort_by_key(|f| f.path.matches('/').count());

    log::info!(
        "sync[{}]: plan {} upload, {} remove-remote, {} download, {} delete-local, {} dirs",
        project.id(),
        to_archive.len(),
        to_remove_remote.len(),
        files_to_download.len(),
        files_to_delete.len(),
        dirs_to_ensure.len()
    );

    // Phase 6: Apply
    // 6a. Upload
    if !to_archive.is_empty() || !to_remove_remote.is_empty() {
        set_progress("upload", 0, to_archive.len() as u64);
        let (tar_hash, body) = if !to_archive.is_empty() {
            let tmp_dir = fsops::temp_dir()?;
            let archive_path = tmp_dir.join(format!("project_{}_{}.tar.br", project.id(), std::process::id()));
            let hash = archive::build_tar(&archive_path, &project_dir, &to_archive)?;
            let bytes = std::fs::read(&archive_path)?;
            let _ = fsops::remove_dir(&tmp_dir, true);
            (Some(hash), Some(bytes))
        } else {
            (None, None)
        };
        ctx.api
            .post_project_files(project.id().as_str(), tar_hash, to_remove_remote.clone(), body)?;
    }
    cancel.check()?;

    // 6b. Ensure dirs, shallow-first so parents precede children. Created
    // writable regardless of target permission: a read-only dir (e.g.
    // `lib/`) must still accept the file writes phase 6c performs inside
    // it (spec.md §8 seed scenario 1, `lib/util.c` under read-only `lib/`).
    // The real mode is applied afterwards, once nothing more gets written.
    for dir in &dirs_to_ensure {
        let abs = relative_to_abs(&project_dir, &dir.path);
        fsops::mkdir(&abs, false)?;
    }

    // 6c. Download (sequential; cancel checked between files)
    let total_downloads = files_to_download.len() as u64;
    let mut downloaded_paths = Vec::new();
    for (i, entry) in files_to_download.iter().enumerate() {
        cancel.check()?;
        set_progress("download", i as u64, total_downloads);
        let content = ctx.api.get_project_file(project.id().as_str(), &entry.path)?;
        let abs = relative_to_abs(&project_dir, &entry.path);
        fsops::write_file(&abs, content.as_bytes(), entry.permissions.readonly_mode())?;
        let _ = fsops::hash_file(&abs);
        downloaded_paths.push(entry.path.clone());
    }

    // 6d. Delete-local (ignore "not found")
    for path in &files_to_delete {
        cancel.check()?;
        let abs = relative_to_abs(&project_dir, path);
        fsops::remove_file(&abs)?;
    }

    // 6e. Lock down directory permissions, deepest-first, now that every
    // write under them has happened.
    for dir in dirs_to_ensure.iter().rev() {
        let abs = relative_to_abs(&project_dir, &dir.path);
        fsops::mkdir(&abs, dir.permissions.readonly_mode())?;
    }

    // Phase 7: Commit
    let final_remote = ctx.api.get_project_info(project.id().as_str())?;
    let mut new_baseline = Vec::with_capacity(final_remote.files.len());
    for entry in &final_remote.files {
        let hash = if entry.is_file() {
            let abs = relative_to_abs(&project_dir, &entry.path);
            Some(fsops::hash_file(&abs)?)
        } else {
            None
        };
        new_baseline.push(FileInfo {
            path: entry.path.clone(),
            entry_type: entry.entry_type,
            version: entry.version,
            hash,
            permissions: entry.permissions,
        });
    }

    let new_state = LocalState {
        base_path: project_dir_rel,
        files: new_baseline,
        synced_at: now_epoch_secs(),
        sync_state: SyncState::Synced(Changes::Unknown),
    };
    let new_project = Project::Local {
        metadata: project.metadata().clone(),
        state: new_state,
    };
    ctx.store.upsert(new_project.clone())?;
    set_progress("idle", 0, 0);

    log::info!(
        "sync[{}]: commit complete, {} uploaded, {} downloaded, {} deleted",
        project.id(),
        to_archive.len(),
        downloaded_paths.len(),
        files_to_delete.len()
    );

    Ok(SyncOutcome {
        uploaded: to_archive,
        downloaded: downloaded_paths,
        deleted_local: files_to_delete,
        project: Some(new_project),
    })
}

fn scan_local(project_dir: &Path) -> Result<Vec<LocalFileState>, SyncError> {
    if !fsops::path_exists(project_dir) {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for node in fsops::read_dir_tree(project_dir) {
        if node.node_type != fsops::NodeType::File {
            continue;
        }
        let rel = fsops::strip_ancestor(project_dir, &node.path).ok_or_else(|| SyncError::FileSystemCorrupted {
            path: node.path.to_string_lossy().to_string(),
            reason: "file escaped project root during scan".to_string(),
        })?;
        let hash = fsops::hash_file(&node.path).map_err(|e| SyncError::FileSystemCorrupted {
            path: rel.clone(),
            reason: e.to_string(),
        })?;
        out.push(LocalFileState {
            path: rel,
            entry_type: EntryType::File,
            hash,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_reports_cancellation() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        token.cancel();
        assert!(matches!(token.check(), Err(SyncError::Cancelled)));
    }
}
