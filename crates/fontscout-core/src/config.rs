use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_PATH: &str = "fontscout.db";
pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub root_path: Option<String>,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    #[serde(default = "default_true")]
    pub skip_hidden: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Directories searched for installed fonts. Empty means the platform
    /// defaults.
    #[serde(default)]
    pub font_dirs: Vec<String>,
    #[serde(default = "default_true")]
    pub resolve_after_scan: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_path: None,
            db_path: default_db_path(),
            concurrency_limit: default_concurrency_limit(),
            skip_hidden: true,
            batch_size: DEFAULT_BATCH_SIZE,
            font_dirs: Vec::new(),
            resolve_after_scan: true,
        }
    }
}

impl AppConfig {
    pub fn font_dir_paths(&self) -> Vec<PathBuf> {
        self.font_dirs.iter().map(PathBuf::from).collect()
    }
}

/// Load `Config.toml` from the working directory (optional), layered under
/// `FONTSCOUT_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    load_configuration_from(Path::new("Config"))
}

pub fn load_configuration_from(base: &Path) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::from(base).required(false))
        .add_source(
            Environment::with_prefix("FONTSCOUT")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("font_dirs"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_concurrency_limit() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_true() -> bool {
    true
}
