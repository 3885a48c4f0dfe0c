use crate::cli::{Cli, Command};
use crate::error::DbdeskError;
use crate::transfer::DEFAULT_CHUNK_SIZE;
use crate::view::{DEFAULT_VIEW_LIMIT, RowLimit};
use directories::ProjectDirs;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub database: Option<PathBuf>,
    pub chunk_size: usize,
    pub view_limit: RowLimit,
    pub verbose: bool,
}

impl AppConfig {
    /// The database path, or a config error naming how to supply one.
    pub fn require_database(&self) -> Result<&PathBuf, DbdeskError> {
        self.database.as_ref().ok_or_else(|| DbdeskError::Config {
            message: "no database specified; use --database or configure a profile".to_string(),
        })
    }
}

// --- TOML config file structs ---

#[derive(Debug, Deserialize, Default)]
struct TomlConfig {
    #[serde(default)]
    defaults: TomlDefaults,
    #[serde(default)]
    profiles: HashMap<String, TomlProfile>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlDefaults {
    chunk_size: Option<usize>,
    view_limit: Option<usize>,
    verbose: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
struct TomlProfile {
    database: Option<PathBuf>,
    chunk_size: Option<usize>,
}

/// Where the config file is expected, and whether the user asked for it.
struct ConfigLocation {
    path: PathBuf,
    explicit: bool,
}

/// `--config` (or `DBDESK_CONFIG` via clap) wins over the platform default.
fn locate_config(cli_config: Option<&PathBuf>) -> Option<ConfigLocation> {
    match cli_config {
        Some(path) => Some(ConfigLocation {
            path: path.clone(),
            explicit: true,
        }),
        None => ProjectDirs::from("", "", "dbdesk").map(|dirs| ConfigLocation {
            path: dirs.config_dir().join("config.toml"),
            explicit: false,
        }),
    }
}

/// Parse the config file. A missing default file yields empty settings; a
/// missing explicit one is an error.
fn read_config_file(location: Option<&ConfigLocation>) -> Result<TomlConfig, DbdeskError> {
    let Some(location) = location else {
        return Ok(TomlConfig::default());
    };
    let path = &location.path;

    if !path.exists() {
        return if location.explicit {
            Err(DbdeskError::Config {
                message: format!("config file not found: {}", path.display()),
            })
        } else {
            Ok(TomlConfig::default())
        };
    }

    let content = std::fs::read_to_string(path).map_err(|e| DbdeskError::Config {
        message: format!("cannot read config file {}: {e}", path.display()),
    })?;
    toml::from_str(&content).map_err(|e| DbdeskError::Config {
        message: format!("invalid config file {}: {e}", path.display()),
    })
}

/// Build AppConfig from parsed CLI args, env and the config file.
///
/// Precedence per value: CLI/env > profile > `[defaults]` > built-in.
pub fn load(cli: &Cli) -> Result<AppConfig, DbdeskError> {
    let location = locate_config(cli.config.as_ref());
    let toml_config = read_config_file(location.as_ref())?;

    let profile = cli
        .profile
        .as_ref()
        .map(|name| {
            toml_config.profiles.get(name).cloned().ok_or_else(|| DbdeskError::Config {
                message: format!("profile '{}' not found in config file", name),
            })
        })
        .transpose()?
        .unwrap_or_default();

    let database = match &cli.command {
        Command::Create(args) => Some(args.path.clone()),
        _ => cli.database.clone().or(profile.database),
    };

    let cli_chunk_size = match &cli.command {
        Command::Import(args) => args.chunk_size,
        Command::Export(args) => args.chunk_size,
        _ => None,
    };
    let chunk_size = cli_chunk_size
        .or(profile.chunk_size)
        .or(toml_config.defaults.chunk_size)
        .unwrap_or(DEFAULT_CHUNK_SIZE);
    if chunk_size == 0 {
        return Err(DbdeskError::Config {
            message: "chunk_size must be at least 1".to_string(),
        });
    }

    let view_limit = match &cli.command {
        Command::Browse(args) if args.all => RowLimit::All,
        Command::Browse(args) => RowLimit::Limited(
            args.limit
                .or(toml_config.defaults.view_limit)
                .unwrap_or(DEFAULT_VIEW_LIMIT),
        ),
        _ => RowLimit::Limited(toml_config.defaults.view_limit.unwrap_or(DEFAULT_VIEW_LIMIT)),
    };

    let verbose = cli.verbose || toml_config.defaults.verbose.unwrap_or(false);

    Ok(AppConfig {
        database,
        chunk_size,
        view_limit,
        verbose,
    })
}
