use std::env;
use std::path::PathBuf;

// Constants
const DEFAULT_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_DATA_DIR: &str = "database";
const STORE_FILE: &str = "store.json";
const ADMIN_FILE: &str = "admin.json";

/// Runtime settings, read from the environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Listen address of the web server (`SEARCH_ADDR`)
    pub addr: String,
    /// Directory holding the store slot and admin credentials (`SEARCH_DATA_DIR`)
    pub data_dir: PathBuf,
    /// Seeds the admin account when none exists yet (`ADMIN_USERNAME`)
    pub admin_username: Option<String>,
    /// Seeds the admin account when none exists yet (`ADMIN_PASSWORD`)
    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: DEFAULT_ADDR.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            admin_username: None,
            admin_password: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        Config {
            addr: get("SEARCH_ADDR").unwrap_or(defaults.addr),
            data_dir: get("SEARCH_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            admin_username: get("ADMIN_USERNAME"),
            admin_password: get("ADMIN_PASSWORD"),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    pub fn admin_path(&self) -> PathBuf {
        self.data_dir.join(ADMIN_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config, Config::default());
        assert_eq!(config.store_path(), PathBuf::from("database/store.json"));
    }

    #[test]
    fn reads_values_and_ignores_blanks() {
        let vars: HashMap<&str, &str> = [
            ("SEARCH_ADDR", "0.0.0.0:8080"),
            ("SEARCH_DATA_DIR", "/tmp/search"),
            ("ADMIN_USERNAME", "  "),
            ("ADMIN_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.addr, "0.0.0.0:8080");
        assert_eq!(config.admin_path(), PathBuf::from("/tmp/search/admin.json"));
        assert_eq!(config.admin_username, None);
        assert_eq!(config.admin_password.as_deref(), Some("secret"));
    }
}
