use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use compositor::{ContextOptions, PowerPreference, PreviewOptions, PreviewVisibility, SamplerFilter};
use directories_next::ProjectDirs;
use serde::Deserialize;

use crate::cli::{parse_filter, parse_power, parse_preview_state, Cli};

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "imagefx";
const APPLICATION: &str = "imagefx";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for '{key}': {message}")]
    Invalid { key: &'static str, message: String },
}

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub filter: Option<String>,
    pub power: Option<String>,
    #[serde(default)]
    pub preview: PreviewSection,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PreviewSection {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub tiles: Option<f32>,
    pub state: Option<String>,
}

impl FileConfig {
    pub fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads the file named on the command line, or the default file if it
    /// exists. An explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(Self::default()),
            },
        };
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::parse(&path, &raw)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }
}

pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Effective settings: command line over config file over defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub filter: SamplerFilter,
    pub power: PowerPreference,
    /// `None` means "match the image".
    pub preview_size: Option<(u32, u32)>,
    pub preview: PreviewOptions,
}

impl Settings {
    pub fn resolve(cli: &Cli, file: &FileConfig) -> Result<Self, ConfigError> {
        let filter = match (cli.filter, file.filter.as_deref()) {
            (Some(filter), _) => filter,
            (None, Some(raw)) => parse_filter(raw).map_err(|message| invalid("filter", message))?,
            (None, None) => SamplerFilter::default(),
        };
        let power = match (cli.power, file.power.as_deref()) {
            (Some(power), _) => power,
            (None, Some(raw)) => parse_power(raw).map_err(|message| invalid("power", message))?,
            (None, None) => PowerPreference::default(),
        };
        let visibility = match (cli.preview_state, file.preview.state.as_deref()) {
            (Some(state), _) => state,
            (None, Some(raw)) => {
                parse_preview_state(raw).map_err(|message| invalid("preview.state", message))?
            }
            (None, None) => PreviewVisibility::default(),
        };

        let preview_size = match (cli.preview_size, file.preview.width, file.preview.height) {
            (Some(size), _, _) => Some(size),
            (None, Some(width), Some(height)) if width > 0 && height > 0 => Some((width, height)),
            (None, None, None) => None,
            (None, width, height) => {
                return Err(invalid(
                    "preview",
                    format!("width and height must both be positive, got {width:?}x{height:?}"),
                ))
            }
        };

        let tiles = cli.tiles.or(file.preview.tiles);
        if let Some(tiles) = tiles {
            if !(tiles.is_finite() && tiles >= 1.0) {
                return Err(invalid("preview.tiles", format!("{tiles} is not a tile count")));
            }
        }
        let defaults = PreviewOptions::default();
        let preview = PreviewOptions {
            tiles: tiles.map_or(defaults.tiles, |count| [count, count]),
            visibility,
            ..defaults
        };

        Ok(Self {
            filter,
            power,
            preview_size,
            preview,
        })
    }

    pub fn context_options(&self) -> ContextOptions {
        ContextOptions {
            power: self.power,
            filter: self.filter,
            ..ContextOptions::default()
        }
    }
}

fn invalid(key: &'static str, message: String) -> ConfigError {
    ConfigError::Invalid { key, message }
}
