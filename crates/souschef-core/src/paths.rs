// Default on-disk locations.

use std::path::PathBuf;

/// Per-user data directory for SousChef.
pub fn data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        let home = dirs::home_dir().unwrap_or_default();
        home.join("Library/Application Support/SousChef")
    }
    #[cfg(target_os = "windows")]
    {
        dirs::data_local_dir().unwrap_or_default().join("SousChef")
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        dirs::data_dir().unwrap_or_default().join("souschef")
    }
}

pub fn default_config_path() -> PathBuf {
    data_dir().join("souschef.toml")
}

pub fn default_db_path() -> PathBuf {
    data_dir().join("souschef.db")
}
