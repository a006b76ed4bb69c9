//! Project sync data model: project identity, metadata, inventories and
//! change records. See spec.md §3.

use serde::{Deserialize, Serialize};

/// Opaque, branded project identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote file/dir permission. Authoritative on the remote (I3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    R,
    Rw,
}

impl Permission {
    pub fn is_writable(self) -> bool {
        matches!(self, Permission::Rw)
    }

    /// Local FS mode implied by a remote permission (I3).
    pub fn readonly_mode(self) -> bool {
        matches!(self, Permission::R)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "projectId")]
    pub project_id: ProjectId,
    pub semester: String,
    pub course_name: String,
    pub exercise_name: String,
    pub task_name: String,
    pub permissions: Permission,
    pub task_order: i64,
    pub exercise_order: i64,
}

/// Baseline entry persisted after the last successful sync (I2).
/// Only `type = File` entries carry a hash (I5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Relative, POSIX-separated, never `..` (I1).
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub version: i64,
    pub hash: Option<String>,
    pub permissions: Permission,
}

impl FileInfo {
    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }
}

/// Remote inventory entry (no hash — the server does not expose content digests here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileInfo {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub version: i64,
    pub permissions: Permission,
}

impl RemoteFileInfo {
    pub fn is_file(&self) -> bool {
        self.entry_type == EntryType::File
    }
}

/// Observed local state: no version, no permission (local FS doesn't track it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFileState {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteChangeKind {
    NoChange,
    Added { version: i64 },
    Updated { version: i64 },
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileChange {
    pub path: String,
    pub change: RemoteChangeKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalChangeKind {
    NoChange,
    Added,
    Updated,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFileChange {
    pub path: String,
    pub change: LocalChangeKind,
}

/// A proposed upload-side change: the non-`NoChange` subset of
/// `LocalFileChange` that the upload planner is allowed to see (see
/// spec.md §9's note on the source's unreachable `NoChange` branch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadChange {
    Added(String),
    Updated(String),
    Removed(String),
}

impl UploadChange {
    pub fn path(&self) -> &str {
        match self {
            UploadChange::Added(p) | UploadChange::Updated(p) | UploadChange::Removed(p) => p,
        }
    }
}

/// Filters a local diff down to the changes the upload planner may act on,
/// dropping `NoChange` at the boundary instead of matching it in the
/// planner (spec.md REDESIGN FLAGS).
pub fn upload_changes(local_changes: &[LocalFileChange]) -> Vec<UploadChange> {
    local_changes
        .iter()
        .filter_map(|c| match c.change {
            LocalChangeKind::Added => Some(UploadChange::Added(c.path.clone())),
            LocalChangeKind::Updated => Some(UploadChange::Updated(c.path.clone())),
            LocalChangeKind::Removed => Some(UploadChange::Removed(c.path.clone())),
            LocalChangeKind::NoChange => None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub path: String,
    pub change_local: LocalChangeKind,
    pub change_remote: RemoteChangeKind,
}

/// Pending diffs summarised since the last sync. `Unknown` is the value a
/// fresh sync commits (the baseline it just wrote has no diff of its own yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Changes {
    Unknown,
    Known {
        local: Vec<LocalFileChange>,
        remote: Vec<RemoteFileChange>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncState {
    Synced(Changes),
    Syncing,
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalState {
    pub base_path: String,
    pub files: Vec<FileInfo>,
    /// Unix epoch seconds.
    pub synced_at: f64,
    pub sync_state: SyncState,
}

/// A project known to the store: either remote-only (never synced) or
/// local (has a baseline). See spec.md §3 "Project identity".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Project {
    Remote { metadata: Metadata },
    Local { metadata: Metadata, state: LocalState },
}

impl Project {
    pub fn id(&self) -> &ProjectId {
        match self {
            Project::Remote { metadata } => &metadata.project_id,
            Project::Local { metadata, .. } => &metadata.project_id,
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Project::Remote { metadata } => metadata,
            Project::Local { metadata, .. } => metadata,
        }
    }

    pub fn baseline(&self) -> &[FileInfo] {
        match self {
            Project::Remote { .. } => &[],
            Project::Local { state, .. } => &state.files,
        }
    }
}

/// Relative project directory derived from metadata: `escape(semester)/escape(courseName)/escape(exerciseName)/escape(taskName)`.
pub fn project_dir_relative(metadata: &Metadata) -> String {
    use crate::fsops::escape_segment;
    format!(
        "{}/{}/{}/{}",
        escape_segment(&metadata.semester),
        escape_segment(&metadata.course_name),
        escape_segment(&metadata.exercise_name),
        escape_segment(&metadata.task_name)
    )
}
