//! Resolves the project server's API base URL. See spec.md §1 ("the
//! network transport itself... treated as an external collaborator");
//! this is the one piece of host wiring the core needs from outside.

const DEFAULT_BASE_URL: &str = "https://projects.example.edu/api";

pub fn get_base_url() -> String {
    if let Ok(override_url) = std::env::var("PROJECTSYNC_BASE_URL") {
        let s = override_url.trim();
        if !s.is_empty() {
            return s.trim_end_matches('/').to_string();
        }
    }
    crate::config::settings_store()
        .get("apiBaseUrl")
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}
