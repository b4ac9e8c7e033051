use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

pub const APP_NAME: &str = "portal";
pub const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_LOCALE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }

    pub fn is_development(&self) -> bool {
        *self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(anyhow!("Unknown environment: {}", other)),
        }
    }
}

/// Everything that used to be read from ambient environment variables, resolved once
/// at startup and passed to whoever needs it.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub locale: String,
    pub db_path: PathBuf,
    pub storage_dir: PathBuf,
    pub image_domains: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let environment = match vars.get("PORTAL_ENV") {
            Some(value) => value.parse()?,
            None => Environment::Production,
        };

        let locale = get_env_or(vars, "PORTAL_LOCALE", DEFAULT_LOCALE.to_string());

        let db_path = match vars.get("PORTAL_DB") {
            Some(path) => PathBuf::from(path),
            None => default_data_dir().join("portal.db"),
        };

        let storage_dir = match vars.get("PORTAL_STORAGE_DIR") {
            Some(path) => PathBuf::from(path),
            None => db_path
                .parent()
                .map(|dir| dir.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        let image_domains = vars
            .get("PORTAL_IMAGE_DOMAINS")
            .map(|list| {
                list.split(',')
                    .map(|d| d.trim().to_lowercase())
                    .filter(|d| !d.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            environment,
            locale,
            db_path,
            storage_dir,
            image_domains,
        })
    }

    /// Whether a remote image URL points at one of the allowlisted hosts.
    /// Relative paths are local assets and always allowed.
    pub fn is_image_allowed(&self, url: &str) -> bool {
        let rest = match url.split_once("://") {
            Some((_, rest)) => rest,
            None => return url.starts_with('/'),
        };
        let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
        let host = authority
            .rsplit('@')
            .next()
            .unwrap_or("")
            .split(':')
            .next()
            .unwrap_or("")
            .to_lowercase();
        if host.is_empty() {
            return false;
        }
        self.image_domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
    }
}

pub fn get_env_or<T: FromStr>(vars: &HashMap<String, String>, key: &str, default: T) -> T {
    match vars.get(key) {
        Some(value) => value.parse::<T>().unwrap_or(default),
        None => default,
    }
}

fn default_data_dir() -> PathBuf {
    // XDG data directory, or the current directory if there is no home
    match directories::ProjectDirs::from("", "", APP_NAME) {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_to_production() {
        let config = AppConfig::from_vars(&vars(&[])).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.locale, "en");
        assert!(config.db_path.ends_with("portal.db"));
        assert_eq!(Some(config.storage_dir.as_path()), config.db_path.parent());
        assert!(config.image_domains.is_empty());
    }

    #[test]
    fn test_reads_explicit_values() {
        let config = AppConfig::from_vars(&vars(&[
            ("PORTAL_ENV", "development"),
            ("PORTAL_LOCALE", "fa"),
            ("PORTAL_DB", "/tmp/x/portal.db"),
            ("PORTAL_IMAGE_DOMAINS", "cdn.example.com, images.example.org ,"),
        ]))
        .unwrap();
        assert!(config.environment.is_development());
        assert_eq!(config.locale, "fa");
        assert_eq!(config.db_path, PathBuf::from("/tmp/x/portal.db"));
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/x"));
        assert_eq!(config.image_domains, vec!["cdn.example.com", "images.example.org"]);
    }

    #[test]
    fn test_unknown_environment_is_rejected() {
        assert!(AppConfig::from_vars(&vars(&[("PORTAL_ENV", "staging")])).is_err());
    }

    #[test]
    fn test_image_allowlist() {
        let config =
            AppConfig::from_vars(&vars(&[("PORTAL_IMAGE_DOMAINS", "example.com")])).unwrap();
        assert!(config.is_image_allowed("https://example.com/logo.png"));
        assert!(config.is_image_allowed("https://cdn.example.com:8443/a/b.jpg?x=1"));
        assert!(config.is_image_allowed("/uploads/logo.png"));
        assert!(!config.is_image_allowed("https://badexample.com/logo.png"));
        assert!(!config.is_image_allowed("https://evil.com/example.com.png"));
        assert!(!config.is_image_allowed("logo.png"));
    }

    #[test]
    fn test_get_env_or_falls_back_on_parse_error() {
        let v = vars(&[("N", "abc")]);
        assert_eq!(get_env_or(&v, "N", 7u32), 7);
        assert_eq!(get_env_or(&vars(&[("N", "3")]), "N", 7u32), 3);
    }
}
