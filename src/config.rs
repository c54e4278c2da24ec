use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BoardError, Result};
use crate::geo::{Coordinates, GeoCenter, DEFAULT_RADIUS_KM, LAGOS};
use crate::models::Job;

const CONFIG_ENV: &str = "JOBMAP_CONFIG";
const DB_ENV: &str = "JOBMAP_DB";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub locate: LocateConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Recorded as the poster of new jobs and the owner of favorites.
    pub id: String,
    /// Grants moderation and lets the user edit or delete any posting.
    pub admin: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: "local".to_string(),
            admin: false,
        }
    }
}

impl UserConfig {
    pub fn require_admin(&self) -> Result<()> {
        if self.admin {
            return Ok(());
        }
        Err(BoardError::Forbidden(format!(
            "user '{}' is not an admin",
            self.id
        )))
    }

    /// Edits and deletes are open to the poster and to admins.
    pub fn require_owner_or_admin(&self, job: &Job) -> Result<()> {
        if self.admin || job.created_by.as_deref() == Some(self.id.as_str()) {
            return Ok(());
        }
        Err(BoardError::Forbidden(format!(
            "job #{} was posted by another user",
            job.id
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub default_center: Coordinates,
    pub default_radius_km: f64,
    pub search_debounce_ms: u64,
    /// New postings wait for approval when set.
    pub moderation: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_center: LAGOS,
            default_radius_km: DEFAULT_RADIUS_KM,
            search_debounce_ms: 300,
            moderation: true,
        }
    }
}

impl FeedConfig {
    pub fn default_geo(&self) -> GeoCenter {
        GeoCenter {
            center: self.default_center,
            radius_km: self.default_radius_km,
        }
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocateMode {
    Off,
    Fixed,
    #[default]
    Ip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocateConfig {
    pub mode: LocateMode,
    /// Position reported in `fixed` mode.
    pub position: Option<Coordinates>,
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            mode: LocateMode::Ip,
            position: None,
            url: "http://ip-api.com/json".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Config {
    /// Loads from an explicit path, `JOBMAP_CONFIG`, or the user config
    /// directory, in that order. A missing default file means defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        if let Ok(db) = std::env::var(DB_ENV) {
            config.store.path = Some(PathBuf::from(db));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BoardError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| BoardError::Config(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if !(self.feed.default_radius_km.is_finite() && self.feed.default_radius_km > 0.0) {
            return Err(BoardError::Config(format!(
                "feed.default_radius_km must be positive, got {}",
                self.feed.default_radius_km
            )));
        }
        if self.feed.default_center.is_unset() {
            return Err(BoardError::Config(
                "feed.default_center must have a non-zero longitude".to_string(),
            ));
        }
        if self.locate.mode == LocateMode::Fixed && self.locate.position.is_none() {
            return Err(BoardError::Config(
                "locate.mode = \"fixed\" requires locate.position".to_string(),
            ));
        }
        Ok(())
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("", "", "jobmap")
    }

    fn default_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn db_path(&self) -> PathBuf {
        if let Some(path) = &self.store.path {
            return path.clone();
        }
        // Use XDG data directory or fallback
        match Self::project_dirs() {
            Some(dirs) => dirs.data_dir().join("jobmap.db"),
            None => PathBuf::from("jobmap.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::job;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.feed.default_geo(), GeoCenter::default());
        assert_eq!(config.feed.search_debounce(), Duration::from_millis(300));
        assert!(config.feed.moderation);
        assert_eq!(config.locate.mode, LocateMode::Ip);
        assert_eq!(config.user.id, "local");
        assert!(!config.user.admin);
    }

    #[test]
    fn test_moderation_requires_admin() {
        let user = UserConfig::default();
        assert!(matches!(user.require_admin(), Err(BoardError::Forbidden(_))));

        let config = Config::from_toml_str("[user]\nid = \"mod\"\nadmin = true").unwrap();
        assert!(config.user.require_admin().is_ok());
    }

    #[test]
    fn test_owner_or_admin_may_modify_job() {
        let job = job(3, "Driver", "Abuja", "Other", None);
        let owner = UserConfig {
            id: "poster".to_string(),
            admin: false,
        };
        let stranger = UserConfig {
            id: "someone-else".to_string(),
            admin: false,
        };
        let admin = UserConfig {
            id: "mod".to_string(),
            admin: true,
        };
        assert!(owner.require_owner_or_admin(&job).is_ok());
        assert!(matches!(
            stranger.require_owner_or_admin(&job),
            Err(BoardError::Forbidden(_))
        ));
        assert!(admin.require_owner_or_admin(&job).is_ok());
    }

    #[test]
    fn test_unowned_job_is_admin_only() {
        let mut job = job(4, "Cook", "Lagos", "Other", None);
        job.created_by = None;
        assert!(UserConfig::default().require_owner_or_admin(&job).is_err());
        let admin = UserConfig {
            admin: true,
            ..Default::default()
        };
        assert!(admin.require_owner_or_admin(&job).is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [feed]
            default_radius_km = 20.0
            moderation = false

            [locate]
            mode = "fixed"
            position = { lon = 3.42, lat = 6.44 }
            "#,
        )
        .unwrap();
        assert_eq!(config.feed.default_radius_km, 20.0);
        assert_eq!(config.feed.default_center, LAGOS);
        assert!(!config.feed.moderation);
        assert_eq!(config.locate.mode, LocateMode::Fixed);
        assert_eq!(config.locate.position, Some(Coordinates::new(3.42, 6.44)));
        assert_eq!(config.locate.timeout_secs, 5);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml_str("[feed]\ndefault_radius_km = \"far\"").unwrap_err();
        assert!(matches!(err, BoardError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_fixed_without_position() {
        let config = Config::from_toml_str("[locate]\nmode = \"fixed\"").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[user]\nid = \"ada\"\n[store]\npath = \"/tmp/board.db\"").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.user.id, "ada");
        assert_eq!(config.db_path(), PathBuf::from("/tmp/board.db"));
    }

    #[test]
    fn test_missing_explicit_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::from_file(&missing).is_err());
    }
}
