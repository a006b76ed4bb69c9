//! Project Sync Tauri app: config, credentials, signed API, sync engine, tray.

mod api;
mod archive;
mod config;
mod credentials;
mod diff;
mod engine;
mod error;
mod fsops;
mod model;
mod network;
mod settings;
mod signer;
mod store;
mod validate;

use api::ApiClient;
use engine::{CancelToken, Force, SyncContext};
use model::{Metadata, Project, ProjectId};
use serde::Serialize;
use signer::{JwtSigner, SharedSigner};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use store::ProjectStore;
use tauri::{Emitter, Manager};

struct AppState {
    store: Arc<ProjectStore>,
    sync_tokens: Mutex<HashMap<String, CancelToken>>,
}

#[derive(Serialize)]
pub struct SyncProgressPayload {
    pub phase: String,
    pub current: u64,
    pub total: u64,
}

fn project_store_path() -> PathBuf {
    config::ensure_config_dir().join("project_metadata.json")
}

fn build_signer() -> Result<SharedSigner, String> {
    let pem = credentials::load_private_key_pem()
        .map_err(|e| format!("no client signing key: {e}"))?;
    let signer = JwtSigner::from_pem(&pem).map_err(|e| e.to_string())?;
    Ok(Arc::new(signer))
}

fn build_api_client() -> Result<ApiClient, String> {
    let signer = build_signer()?;
    Ok(ApiClient::new(network::get_base_url(), signer))
}

fn resolved_project_root() -> Option<PathBuf> {
    if config::user_has_set_project_dir() {
        Some(config::get_project_root())
    } else {
        None
    }
}

#[tauri::command]
fn get_base_url() -> String {
    network::get_base_url()
}

#[tauri::command]
fn get_project_root() -> String {
    config::get_project_root().to_string_lossy().to_string()
}

#[tauri::command]
fn set_project_root(dir: String) {
    config::set_project_root(PathBuf::from(dir));
}

#[tauri::command]
fn user_has_set_project_dir() -> bool {
    config::user_has_set_project_dir()
}

#[tauri::command]
fn get_default_project_root() -> String {
    config::get_default_project_root().to_string_lossy().to_string()
}

#[tauri::command]
fn get_autostart() -> bool {
    config::get_autostart()
}

#[tauri::command]
fn set_autostart(enabled: bool) {
    config::set_autostart(enabled);
}

#[tauri::command]
fn has_private_key() -> bool {
    credentials::private_key_path().exists()
}

#[tauri::command]
fn get_client_id() -> Option<String> {
    config::settings_store().client_id()
}

#[tauri::command]
fn register_device(enrollment_token: String, client_name: String) -> Result<String, String> {
    let api = build_api_client()?;
    let request = api::RegisterRequest {
        os: std::env::consts::OS.to_string(),
        name: client_name,
        version: env!("CARGO_PKG_VERSION").to_string(),
        token: enrollment_token,
        permissions: vec!["sync".to_string()],
    };
    let response = api.register(request).map_err(|e| e.to_string())?;
    config::settings_store().set("clientId", response.client_id.clone());
    Ok(response.client_id)
}

#[tauri::command]
fn check_access() -> Result<String, String> {
    let api = build_api_client()?;
    Ok(api.check_access().map_err(|e| e.to_string())?.status)
}

#[tauri::command]
fn list_projects(state: tauri::State<AppState>) -> Vec<Project> {
    state.store.find_all()
}

#[tauri::command]
fn add_project(state: tauri::State<AppState>, metadata: Metadata) -> Result<(), String> {
    state
        .store
        .upsert(Project::Remote { metadata })
        .map_err(|e| e.to_string())
}

#[tauri::command]
fn remove_project(state: tauri::State<AppState>, project_id: String) -> Result<(), String> {
    let pid = ProjectId(project_id);
    if let Some(Project::Local { state: local, .. }) = state.store.find(&pid) {
        if let Some(root) = resolved_project_root() {
            let dir = root.join(local.base_path.replace('/', std::path::MAIN_SEPARATOR_STR));
            let _ = fsops::remove_dir(&dir, true);
        }
    }
    state.store.remove(&pid).map_err(|e| e.to_string())
}

#[tauri::command]
fn open_project_folder(state: tauri::State<AppState>, project_id: String) -> Result<(), String> {
    let pid = ProjectId(project_id);
    let project = state.store.find(&pid).ok_or_else(|| "unknown project".to_string())?;
    let root = config::get_project_root();
    let rel = match &project {
        Project::Remote { metadata } => model::project_dir_relative(metadata),
        Project::Local { state, .. } => state.base_path.clone(),
    };
    let dir = root.join(rel.replace('/', std::path::MAIN_SEPARATOR_STR));
    if !dir.exists() {
        let _ = std::fs::create_dir_all(&dir);
    }
    open::that(dir).map_err(|e| e.to_string())
}

#[tauri::command]
fn get_sync_status(state: tauri::State<AppState>, project_id: String) -> String {
    let tokens = state.sync_tokens.lock().unwrap();
    if tokens.contains_key(&project_id) {
        "syncing".to_string()
    } else {
        "idle".to_string()
    }
}

#[tauri::command]
fn get_sync_progress() -> Option<SyncProgressPayload> {
    engine::get_progress().map(|p| SyncProgressPayload {
        phase: p.phase,
        current: p.current,
        total: p.total,
    })
}

#[tauri::command]
fn cancel_sync(state: tauri::State<AppState>, project_id: String) -> bool {
    let tokens = state.sync_tokens.lock().unwrap();
    match tokens.get(&project_id) {
        Some(token) => {
            token.cancel();
            true
        }
        None => false,
    }
}

fn parse_force(force: Option<String>) -> Result<Option<Force>, String> {
    match force.as_deref() {
        None => Ok(None),
        Some("push") => Ok(Some(Force::Push)),
        Some("pull") => Ok(Some(Force::Pull)),
        Some(other) => Err(format!("unknown force mode: {other}")),
    }
}

fn run_sync_for_project(app: tauri::AppHandle, project_id: String, force: Option<Force>) -> Result<(), String> {
    let state = app.state::<AppState>();
    let pid = ProjectId(project_id.clone());
    let project = state
        .store
        .find(&pid)
        .ok_or_else(|| "unknown project".to_string())?;

    {
        let mut tokens = state.sync_tokens.lock().unwrap();
        if tokens.contains_key(&project_id) {
            return Err("sync already in progress for this project".to_string());
        }
        tokens.insert(project_id.clone(), CancelToken::new());
    }

    let api = match build_api_client() {
        Ok(api) => api,
        Err(e) => {
            state.sync_tokens.lock().unwrap().remove(&project_id);
            return Err(e);
        }
    };
    let store = state.store.clone();
    let project_root = resolved_project_root();
    let cancel = state
        .sync_tokens
        .lock()
        .unwrap()
        .get(&project_id)
        .cloned()
        .expect("token just inserted");

    let app_for_thread = app.clone();
    let pid_for_thread = project_id.clone();
    std::thread::spawn(move || {
        let ctx = SyncContext {
            api,
            store,
            project_root,
        };
        let result = engine::run_sync(&ctx, &project, force, &cancel);
        match &result {
            Ok(outcome) => {
                log::info!(
                    "sync[{}]: {} uploaded, {} downloaded, {} deleted",
                    pid_for_thread,
                    outcome.uploaded.len(),
                    outcome.downloaded.len(),
                    outcome.deleted_local.len()
                );
                let _ = app_for_thread.emit(
                    "sync-completed",
                    serde_json::json!({
                        "projectId": pid_for_thread,
                        "uploaded": outcome.uploaded,
                        "downloaded": outcome.downloaded,
                        "deletedLocal": outcome.deleted_local,
                    }),
                );
            }
            Err(e) => {
                log::warn!("sync[{}] failed: {}", pid_for_thread, e);
                let _ = app_for_thread.emit(
                    "sync-failed",
                    serde_json::json!({ "projectId": pid_for_thread, "error": e.to_string() }),
                );
            }
        }
        let state = app_for_thread.state::<AppState>();
        state.sync_tokens.lock().unwrap().remove(&pid_for_thread);
        let _ = app_for_thread.emit("sync-status", serde_json::json!({ "projectId": pid_for_thread, "status": "idle" }));
    });

    let _ = app.emit("sync-status", serde_json::json!({ "projectId": project_id, "status": "syncing" }));
    Ok(())
}

#[tauri::command]
fn run_sync(app: tauri::AppHandle, project_id: String, force: Option<String>) -> Result<(), String> {
    let force = parse_force(force)?;
    run_sync_for_project(app, project_id, force)
}

#[tauri::command]
fn quit_app() {
    std::process::exit(0);
}

#[tauri::command]
fn show_main_window(app: tauri::AppHandle) {
    if let Some(win) = app.get_webview_window("main") {
        let _ = win.show();
        let _ = win.unminimize();
        let _ = win.set_focus();
    }
}

#[tauri::command]
fn hide_main_window(app: tauri::AppHandle) {
    if let Some(win) = app.get_webview_window("main") {
        let _ = win.hide();
    }
}

fn try_acquire_single_instance_lock() -> bool {
    use fs2::FileExt;
    if std::env::var("PROJECTSYNC_CONFIG_DIR").map(|s| !s.trim().is_empty()).unwrap_or(false) {
        return true;
    }
    let path = config::get_instance_lock_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let f = match std::fs::OpenOptions::new().write(true).create(true).truncate(true).open(&path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    if f.try_lock_exclusive().is_err() {
        return false;
    }
    std::mem::forget(f);
    true
}

const BACKGROUND_SYNC_INTERVAL_SECS: u64 = 60;
const BACKGROUND_SYNC_INITIAL_DELAY_SECS: u64 = 15;

/// Periodically syncs every known `Local` project, skipping any that
/// already has a sync in flight (spec.md §5: at most one sync per
/// project at a time). Grounded in the teacher's `spawn_background_sync_loop`.
fn spawn_background_sync_loop(app: tauri::AppHandle) {
    std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_secs(BACKGROUND_SYNC_INITIAL_DELAY_SECS));
        loop {
            if config::user_has_set_project_dir() && credentials::private_key_path().exists() {
                let state = app.state::<AppState>();
                let projects = state.store.find_all();
                drop(state);
                for project in projects {
                    if let Project::Local { .. } = &project {
                        let project_id = project.id().as_str().to_string();
                        if let Err(e) = run_sync_for_project(app.clone(), project_id.clone(), None) {
                            log::warn!("background sync[{project_id}] skipped: {e}");
                        }
                    }
                }
            }
            std::thread::sleep(std::time::Duration::from_secs(BACKGROUND_SYNC_INTERVAL_SECS));
        }
    });
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    if !try_acquire_single_instance_lock() {
        eprintln!("Another instance is already running.");
        std::process::exit(1);
    }
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_notification::init())
        .manage(AppState {
            store: Arc::new(ProjectStore::new(project_store_path())),
            sync_tokens: Mutex::new(HashMap::new()),
        })
        .setup(|app| {
            spawn_background_sync_loop(app.handle().clone());
            Ok(())
        })
        .on_window_event(|window, event| {
            if let tauri::WindowEvent::CloseRequested { api, .. } = event {
                if window.label() == "main" {
                    let _ = window.hide();
                    api.prevent_close();
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            get_base_url,
            get_project_root,
            set_project_root,
            user_has_set_project_dir,
            get_default_project_root,
            get_autostart,
            set_autostart,
            has_private_key,
            get_client_id,
            register_device,
            check_access,
            list_projects,
            add_project,
            remove_project,
            open_project_folder,
            get_sync_status,
            get_sync_progress,
            cancel_sync,
            run_sync,
            quit_app,
            show_main_window,
            hide_main_window,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
