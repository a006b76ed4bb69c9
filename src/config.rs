//! Client configuration: config dir, project root directory, autostart.
//! Grounded in the teacher's `config.rs` directory-resolution helpers;
//! generalised from a typed `sync_folder`/`base_url_mode` config file into
//! calls over the opaque `SettingsStore` (spec.md §1, §6).

use crate::settings::SettingsStore;
use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = "projectsync";
const INSTANCE_LOCK_FILENAME: &str = "instance.lock";

fn expand_tilde(path: &str) -> PathBuf {
    let s = path.trim();
    if s.starts_with('~') {
        let rest = s.trim_start_matches('~').trim_start_matches('/');
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(s)
}

/// Directory holding `settings.json`, `privateKey.pem` and `project_metadata.json`.
pub fn config_dir() -> PathBuf {
    if let Ok(override_dir) = std::env::var("PROJECTSYNC_CONFIG_DIR") {
        let s = override_dir.trim();
        if !s.is_empty() {
            return expand_tilde(s);
        }
    }
    #[cfg(windows)]
    {
        let appdata = std::env::var("APPDATA").unwrap_or_else(|_| std::env::var("USERPROFILE").unwrap_or_default());
        PathBuf::from(appdata).join("ProjectSync")
    }
    #[cfg(not(windows))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(xdg).join(CONFIG_DIR_NAME)
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config")
                .join(CONFIG_DIR_NAME)
        }
    }
}

pub fn ensure_config_dir() -> PathBuf {
    let d = config_dir();
    let _ = std::fs::create_dir_all(&d);
    d
}

pub fn get_instance_lock_path() -> PathBuf {
    config_dir().join(INSTANCE_LOCK_FILENAME)
}

pub fn settings_store() -> SettingsStore {
    SettingsStore::new(ensure_config_dir())
}

pub fn get_default_project_root() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join("CourseProjects")
}

/// Whether the user has pointed the client at a project root directory
/// (`projectDir` setting). spec.md §4.7 phase 1: "`projectDirMissing` on absent".
pub fn user_has_set_project_dir() -> bool {
    settings_store().project_dir().is_some()
}

pub fn get_project_root() -> PathBuf {
    settings_store().project_dir().unwrap_or_else(get_default_project_root)
}

pub fn set_project_root(dir: PathBuf) {
    settings_store().set_project_dir(&dir);
}

pub fn get_autostart() -> bool {
    settings_store().get("autostart").map(|s| s == "true").unwrap_or(false)
}

pub fn set_autostart(enabled: bool) {
    settings_store().set("autostart", enabled.to_string());
    apply_autostart_platform(enabled);
}

fn executable_command() -> Vec<String> {
    if cfg!(windows) {
        vec![std::env::current_exe().unwrap_or_else(|_| PathBuf::from("ProjectSync.exe")).to_string_lossy().to_string()]
    } else {
        vec!["ProjectSync".to_string()]
    }
}

fn apply_autostart_platform(enabled: bool) {
    let cmd = executable_command();
    #[cfg(windows)]
    apply_autostart_windows(enabled, &cmd);
    #[cfg(target_os = "macos")]
    apply_autostart_macos(enabled, &cmd);
    #[cfg(all(unix, not(target_os = "macos")))]
    apply_autostart_linux(enabled, &cmd);
}

#[cfg(windows)]
fn apply_autostart_windows(enabled: bool, cmd: &[String]) {
    let startup = std::env::var("APPDATA").map(|a| PathBuf::from(a).join("Microsoft/Windows/Start Menu/Programs/Startup")).unwrap_or_default();
    if !startup.exists() {
        return;
    }
    let lnk = startup.join("ProjectSync.lnk");
    if enabled {
        let target = cmd.first().cloned().unwrap_or_default();
        let args = cmd.get(1..).unwrap_or(&[]).join(" ");
        let ps = format!(
            r#"$s = (New-Object -COM WScript.Shell).CreateShortcut("{}"); $s.TargetPath = "{}"; $s.Arguments = "{}"; $s.Save()"#,
            lnk.display(),
            target.replace('"', "`\""),
            args.replace('"', "`\"")
        );
        let _ = std::process::Command::new("powershell")
            .args(["-NoProfile", "-Command", &ps])
            .creation_flags(0x08000000) // CREATE_NO_WINDOW
            .output();
    } else if lnk.exists() {
        let _ = std::fs::remove_file(lnk);
    }
}

#[cfg(target_os = "macos")]
fn apply_autostart_macos(enabled: bool, cmd: &[String]) {
    let launch_agents = dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join("Library/LaunchAgents");
    let _ = std::fs::create_dir_all(&launch_agents);
    let plist = launch_agents.join("edu.projectsync.client.plist");
    if enabled {
        let args_xml: String = cmd.iter().map(|a| format!("    <string>{}</string>", a)).collect::<Vec<_>>().join("\n");
        let content = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
  <key>Label</key>
  <string>edu.projectsync.client</string>
  <key>ProgramArguments</key>
  <array>
{}
  </array>
  <key>RunAtLoad</key>
  <true/>
</dict>
</plist>
"#,
            args_xml
        );
        let _ = std::fs::write(plist, content);
    } else if plist.exists() {
        let _ = std::fs::remove_file(plist);
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn apply_autostart_linux(enabled: bool, cmd: &[String]) {
    let autostart = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autostart");
    let _ = std::fs::create_dir_all(&autostart);
    let desktop = autostart.join("projectsync.desktop");
    if enabled {
        let exec = cmd.join(" ");
        let content = format!(
            "[Desktop Entry]\nType=Application\nName=Project Sync\nExec={}\nX-GNOME-Autostart-enabled=true\n",
            exec
        );
        let _ = std::fs::write(desktop, content);
    } else if desktop.exists() {
        let _ = std::fs::remove_file(desktop);
    }
}
