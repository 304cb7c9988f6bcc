//! Key/value persistence for client-side state.
//!
//! Values are stored as JSON files in the platform-appropriate config
//! directory:
//! - Linux: `~/.config/memeshare/`
//! - macOS: `~/Library/Application Support/memeshare/`
//! - Windows: `%APPDATA%\memeshare\`

use serde::{de::DeserializeOwned, Serialize};

/// Save a value to persistent storage.
///
/// Returns `true` if the operation succeeded.
pub fn save<T: Serialize>(key: &str, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(json) => save_raw(key, &json),
        Err(_) => false,
    }
}

/// Load a value from persistent storage.
///
/// Returns `None` if the key doesn't exist or deserialization fails.
pub fn load<T: DeserializeOwned>(key: &str) -> Option<T> {
    let json = load_raw(key)?;
    serde_json::from_str(&json).ok()
}

/// Remove a value from persistent storage.
pub fn remove(key: &str) {
    if let Some(path) = file_path(key) {
        let _ = std::fs::remove_file(path);
    }
}

/// Check if a key exists in storage.
pub fn exists(key: &str) -> bool {
    load_raw(key).is_some()
}

fn app_dir() -> Option<std::path::PathBuf> {
    let dir = dirs::config_dir()?.join("memeshare");
    if !dir.exists() {
        std::fs::create_dir_all(&dir).ok()?;
    }
    Some(dir)
}

fn file_path(key: &str) -> Option<std::path::PathBuf> {
    // Sanitize key to be a valid filename
    let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
    Some(app_dir()?.join(format!("{safe_key}.json")))
}

fn save_raw(key: &str, value: &str) -> bool {
    let Some(path) = file_path(key) else {
        return false;
    };
    std::fs::write(path, value).is_ok()
}

fn load_raw(key: &str) -> Option<String> {
    let path = file_path(key)?;
    std::fs::read_to_string(path).ok()
}
