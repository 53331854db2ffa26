//! Server configuration from environment variables.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the HTTP listener binds on.
    pub port: u16,
    /// Optional JSON file with users/collections to seed the store with.
    pub seed_path: Option<PathBuf>,
    /// Directory served as the static fallback (canvas UI assets).
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            seed_path: None,
            static_dir: "static".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(4000);

        let seed_path = std::env::var("SEED_COLLECTIONS")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        if seed_path.is_none() {
            tracing::warn!(
                "SEED_COLLECTIONS not set - store starts empty, rooms cannot reference collections"
            );
        }

        let static_dir = std::env::var("STATIC_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "static".to_string());

        Self {
            port,
            seed_path,
            static_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var("PORT");
        std::env::remove_var("SEED_COLLECTIONS");
        std::env::remove_var("STATIC_DIR");
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        let config = ServerConfig::from_env();
        assert_eq!(config.port, 4000);
        assert!(config.seed_path.is_none());
        assert_eq!(config.static_dir, "static");
    }

    #[test]
    #[serial]
    fn test_reads_env() {
        clear_env();
        std::env::set_var("PORT", "8088");
        std::env::set_var("SEED_COLLECTIONS", "fixtures/seed.json");
        std::env::set_var("STATIC_DIR", "public");

        let config = ServerConfig::from_env();
        assert_eq!(config.port, 8088);
        assert_eq!(config.seed_path, Some(PathBuf::from("fixtures/seed.json")));
        assert_eq!(config.static_dir, "public");
        clear_env();
    }

    #[test]
    #[serial]
    fn test_blank_values_fall_back() {
        clear_env();
        std::env::set_var("PORT", "not-a-port");
        std::env::set_var("SEED_COLLECTIONS", "   ");

        let config = ServerConfig::from_env();
        assert_eq!(config.port, 4000);
        assert!(config.seed_path.is_none());
        clear_env();
    }
}
