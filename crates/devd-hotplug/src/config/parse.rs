use super::Config;
use std::path::Path;
use thiserror::Error;
use tokio::{fs, io};
use tracing::{event, Level};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum ConfigFormat {
  Json,
  Yaml,
  Toml,
  Auto,
}

impl ConfigFormat {
  fn resolve(self, file: &Path) -> Result<Self, ConfigError> {
    if self != ConfigFormat::Auto {
      return Ok(self);
    }

    match file.extension().and_then(|e| e.to_str()) {
      Some("toml") => Ok(ConfigFormat::Toml),
      Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
      Some("json") => Ok(ConfigFormat::Json),
      Some(other) => Err(ConfigError::InvalidExtension(other.into())),
      None => Err(ConfigError::MissingExtension),
    }
  }

  fn parse(self, content: &[u8]) -> Result<Config, FormatError> {
    Ok(match self {
      ConfigFormat::Json => serde_json::from_slice(content)?,
      ConfigFormat::Yaml => serde_yaml::from_slice(content)?,
      ConfigFormat::Toml | ConfigFormat::Auto => toml::from_slice(content)?,
    })
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Invalid config file extension when using auto format: {0}")]
  InvalidExtension(String),

  #[error("Config file does not have a file extension, and format is set to auto")]
  MissingExtension,

  #[error("Driver rule #{index} has an empty prefix")]
  InvalidDriver { index: usize },

  #[error("Failed to parse config file")]
  ParseError(#[from] FormatError),

  #[error(transparent)]
  Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum FormatError {
  #[error(transparent)]
  JsonError(#[from] serde_json::Error),

  #[error(transparent)]
  YamlError(#[from] serde_yaml::Error),

  #[error(transparent)]
  TomlError(#[from] toml::de::Error),
}

fn validate(config: &Config) -> Result<(), ConfigError> {
  match config
    .drivers()
    .rules()
    .iter()
    .position(|rule| rule.prefix().is_empty())
  {
    Some(index) => Err(ConfigError::InvalidDriver { index }),
    None => Ok(()),
  }
}

pub(super) async fn read_config(
  file: impl AsRef<Path>,
  format: ConfigFormat,
) -> Result<Config, ConfigError> {
  let file = file.as_ref();

  let result = async {
    let format = format.resolve(file)?;
    let content = fs::read(file).await?;
    let config = format.parse(&content)?;
    validate(&config)?;
    Ok::<_, ConfigError>(config)
  }
  .await;

  match result {
    Ok(config) => {
      event!(target: "devd-hotplug", Level::INFO, config.file = %file.display(), ?config, "Loaded configuration");
      Ok(config)
    }
    Err(error) => {
      event!(target: "devd-hotplug", Level::ERROR, config.file = %file.display(), ?error, "Failed to read config file");
      Err(error)
    }
  }
}
