//! The on-disk client signing key. See spec.md §6: `clientId`, `projectDir`
//! and `accessToken` live in `settings.json` (see `settings.rs`);
//! `privateKey.pem` is the one credential kept out of that store, since it
//! is the long-lived signing key the rest of the app never reads directly.

use crate::config::config_dir;
use std::path::PathBuf;

const PRIVATE_KEY_FILENAME: &str = "privateKey.pem";

pub fn private_key_path() -> PathBuf {
    config_dir().join(PRIVATE_KEY_FILENAME)
}

pub fn load_private_key_pem() -> std::io::Result<Vec<u8>> {
    std::fs::read(private_key_path())
}
