use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Database ──────────────────────────────────────────────────

/// Connection settings for the MySQL server the tools query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    pub database: String,
}

impl DatabaseConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SQLPIPE_PROFILE`. When set (e.g. `PROD`), every
    /// key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("SQLPIPE_PROFILE", "");
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            host: profiled_env_or(p, "DB_HOST", "localhost"),
            port: profiled_env_u16(p, "DB_PORT", 3306),
            user: profiled_env_or(p, "DB_USER", "root"),
            password: profiled_env_or(p, "DB_PASSWORD", ""),
            database: profiled_env_or(p, "DB_NAME", ""),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    pub fn has_database(&self) -> bool {
        !self.database.is_empty()
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(config = %self.redacted_summary(), "database config loaded");
    }

    /// Return a redacted view safe for logs and diagnostics (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "host": self.host,
            "port": self.port,
            "user": self.user,
            "database": self.database,
            "password_set": !self.password.is_empty(),
        })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            profile: String::new(),
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own profile prefix so parallel tests never observe
    // each other's variables.

    #[test]
    fn test_profile_falls_back_to_defaults() {
        let cfg = DatabaseConfig::for_profile("sqlpipe_test_unset_profile_xyz");
        assert_eq!(cfg.profile, "SQLPIPE_TEST_UNSET_PROFILE_XYZ");
        assert_eq!(cfg.profile_label(), "SQLPIPE_TEST_UNSET_PROFILE_XYZ");
        // Unprefixed keys may be set by the developer's shell, so only the
        // ones that are absent can be checked against the defaults.
        if env::var("DB_PORT").is_err() {
            assert_eq!(cfg.port, 3306);
        }
        if env::var("DB_HOST").is_err() {
            assert_eq!(cfg.host, "localhost");
        }
    }

    #[test]
    fn test_profiled_keys_take_precedence() {
        env::set_var("CFGTESTA_DB_HOST", "db.internal");
        env::set_var("CFGTESTA_DB_PORT", "3307");
        env::set_var("CFGTESTA_DB_NAME", "shop");
        env::set_var("CFGTESTA_DB_PASSWORD", "hunter2");

        let cfg = DatabaseConfig::for_profile("cfgtesta");
        assert_eq!(cfg.host, "db.internal");
        assert_eq!(cfg.port, 3307);
        assert_eq!(cfg.database, "shop");
        assert!(cfg.has_database());
        assert_eq!(cfg.password, "hunter2");
    }

    #[test]
    fn test_invalid_port_uses_default() {
        env::set_var("CFGTESTB_DB_PORT", "not-a-port");
        let cfg = DatabaseConfig::for_profile("cfgtestb");
        assert_eq!(cfg.port, 3306);
    }

    #[test]
    fn test_redacted_summary_hides_password() {
        let cfg = DatabaseConfig {
            password: "s3cret".to_string(),
            database: "shop".to_string(),
            ..DatabaseConfig::default()
        };
        let summary = cfg.redacted_summary();
        assert_eq!(summary["profile"], "default");
        assert_eq!(summary["password_set"], true);
        assert!(!summary.to_string().contains("s3cret"));

        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("s3cret"));
    }
}
