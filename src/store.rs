//! Project metadata store (C3). See spec.md §4.3.
//!
//! Durable `ProjectId -> Project` mapping backed by `project_metadata.json`,
//! flushed on every write. `upsert`/`remove` write a sibling temp file then
//! rename it over the original so a crash mid-write never corrupts the
//! baseline (I2, P6) — generalising the teacher's direct
//! `std::fs::write` in `config.rs`/`sync.rs`, which has no such guarantee.

use crate::error::SyncError;
use crate::model::{Project, ProjectId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct ProjectStore {
    path: PathBuf,
    // Single-writer-at-a-time discipline (spec.md §5): a write holds this
    // lock for the whole load-mutate-persist cycle.
    write_lock: Mutex<()>,
}

impl ProjectStore {
    pub fn new(path: PathBuf) -> Self {
        ProjectStore {
            path,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> BTreeMap<ProjectId, Project> {
        if !self.path.exists() {
            return BTreeMap::new();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        }
    }

    fn persist(&self, map: &BTreeMap<ProjectId, Project>) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(map).map_err(|e| SyncError::FileSystemCorrupted {
            path: self.path.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
        {
            use std::io::Write;
            let mut f = std::fs::File::create(&tmp)?;
            f.write_all(json.as_bytes())?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Readers see a consistent snapshot per operation (a fresh file load).
    pub fn find(&self, id: &ProjectId) -> Option<Project> {
        self.load().remove(id)
    }

    pub fn find_all(&self) -> Vec<Project> {
        self.load().into_values().collect()
    }

    pub fn upsert(&self, project: Project) -> Result<(), SyncError> {
        let _guard = self.write_lock.lock().unwrap();
        let mut map = self.load();
        map.insert(project.id().clone(), project);
        self.persist(&map)
    }

    pub fn remove(&self, id: &ProjectId) -> Result<(), SyncError> {
        let _guard = self.write_lock.lock().unwrap();
        let mut map = self.load();
        map.remove(id);
        self.persist(&map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LocalState, Metadata, Permission, SyncState, Changes};

    fn metadata(id: &str) -> Metadata {
        Metadata {
            project_id: ProjectId(id.to_string()),
            semester: "2024S".to_string(),
            course_name: "Algorithms".to_string(),
            exercise_name: "Ex1".to_string(),
            task_name: "Task1".to_string(),
            permissions: Permission::Rw,
            task_order: 1,
            exercise_order: 1,
        }
    }

    fn scratch_path(name: &str) -> PathBuf {
        let dir = crate::fsops::temp_dir().unwrap();
        dir.join(name)
    }

    #[test]
    fn upsert_then_find_round_trips() {
        let store = ProjectStore::new(scratch_path("store1.json"));
        let project = Project::Remote { metadata: metadata("p1") };
        store.upsert(project).unwrap();
        let found = store.find(&ProjectId("p1".to_string()));
        assert!(found.is_some());
    }

    #[test]
    fn remove_deletes_entry() {
        let store = ProjectStore::new(scratch_path("store2.json"));
        store.upsert(Project::Remote { metadata: metadata("p2") }).unwrap();
        store.remove(&ProjectId("p2".to_string())).unwrap();
        assert!(store.find(&ProjectId("p2".to_string())).is_none());
    }

    #[test]
    fn promotion_from_remote_to_local_preserves_id() {
        let store = ProjectStore::new(scratch_path("store3.json"));
        store.upsert(Project::Remote { metadata: metadata("p3") }).unwrap();
        let local = Project::Local {
            metadata: metadata("p3"),
            state: LocalState {
                base_path: "2024S/Algorithms/Ex1/Task1".to_string(),
                files: vec![],
                synced_at: 0.0,
                sync_state: SyncState::Synced(Changes::Unknown),
            },
        };
        store.upsert(local).unwrap();
        match store.find(&ProjectId("p3".to_string())) {
            Some(Project::Local { .. }) => {}
            other => panic!("expected promoted Local project, got {other:?}"),
        }
    }
}
