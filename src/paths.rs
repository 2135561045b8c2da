/// Centralized platform-specific path computation
///
/// Provides consistent path handling across Windows, macOS, and Linux. Base
/// directories come from the `dirs` crate (XDG on Unix-like systems).
use std::path::PathBuf;

const APP_DIR: &str = "repograph";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get the appropriate data directory for the current platform
    ///
    /// - Windows: %LOCALAPPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_DATA_HOME or ~/.local/share
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the appropriate cache directory for the current platform
    pub fn cache_dir() -> PathBuf {
        dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the appropriate config directory for the current platform
    pub fn config_dir() -> PathBuf {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Returns: {data_dir}/repograph
    pub fn project_data_dir() -> PathBuf {
        Self::data_dir().join(APP_DIR)
    }

    /// Returns: {cache_dir}/repograph
    pub fn project_cache_dir() -> PathBuf {
        Self::cache_dir().join(APP_DIR)
    }

    /// Returns: {config_dir}/repograph
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(APP_DIR)
    }

    /// Get default SQLite graph database path
    ///
    /// Returns: {data_dir}/repograph/graph.db
    pub fn default_graph_db_path() -> PathBuf {
        Self::project_data_dir().join("graph.db")
    }

    /// Get default LanceDB vector index path
    ///
    /// Returns: {data_dir}/repograph/lancedb
    pub fn default_lancedb_path() -> PathBuf {
        Self::project_data_dir().join("lancedb")
    }

    /// Directory under which per-run working copies are cloned
    ///
    /// Returns: {cache_dir}/repograph/workspaces
    pub fn default_workspace_root() -> PathBuf {
        Self::project_cache_dir().join("workspaces")
    }

    /// Get default config file path
    ///
    /// Returns: {config_dir}/repograph/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_dirs_not_empty() {
        assert!(!PlatformPaths::data_dir().as_os_str().is_empty());
        assert!(!PlatformPaths::cache_dir().as_os_str().is_empty());
        assert!(!PlatformPaths::config_dir().as_os_str().is_empty());
    }

    #[test]
    fn test_project_paths_contain_project_name() {
        let data_dir = PlatformPaths::project_data_dir();
        let cache_dir = PlatformPaths::project_cache_dir();
        let config_dir = PlatformPaths::project_config_dir();

        assert!(data_dir.ends_with(APP_DIR));
        assert!(cache_dir.ends_with(APP_DIR));
        assert!(config_dir.ends_with(APP_DIR));
    }

    #[test]
    fn test_specific_file_paths() {
        let graph_path = PlatformPaths::default_graph_db_path();
        let lancedb_path = PlatformPaths::default_lancedb_path();
        let workspace_root = PlatformPaths::default_workspace_root();
        let config_path = PlatformPaths::default_config_path();

        for path in [&graph_path, &lancedb_path, &workspace_root, &config_path] {
            assert!(
                path.to_string_lossy().contains(APP_DIR),
                "Path {:?} should contain '{}'",
                path,
                APP_DIR
            );
        }

        assert!(graph_path.ends_with("graph.db"));
        assert!(lancedb_path.ends_with("lancedb"));
        assert!(workspace_root.ends_with("workspaces"));
        assert!(config_path.ends_with("config.toml"));
    }

    #[test]
    fn test_project_dirs_are_subdirectories() {
        assert!(PlatformPaths::project_data_dir().starts_with(PlatformPaths::data_dir()));
        assert!(PlatformPaths::project_cache_dir().starts_with(PlatformPaths::cache_dir()));
    }
}
