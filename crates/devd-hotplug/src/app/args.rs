use crate::config;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(ValueEnum, Debug, PartialEq, Clone, Copy)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(ValueEnum, Debug, PartialEq, Clone, Copy)]
pub enum ConfigFormat {
  Json,
  Yaml,
  Toml,
  Auto,
}

impl From<ConfigFormat> for config::ConfigFormat {
  fn from(f: ConfigFormat) -> Self {
    match f {
      ConfigFormat::Json => config::ConfigFormat::Json,
      ConfigFormat::Yaml => config::ConfigFormat::Yaml,
      ConfigFormat::Toml => config::ConfigFormat::Toml,
      ConfigFormat::Auto => config::ConfigFormat::Auto,
    }
  }
}

/// Registers input devices announced by devd.
#[derive(Parser, Debug)]
#[clap(name = "devd-hotplug", version)]
pub struct Args {
  /// Log output format
  #[clap(
    value_enum,
    long = "log-format",
    short = 'f',
    env = "LOG_FORMAT",
    default_value = "pretty"
  )]
  pub log_format: LogFormat,

  /// Config file format
  #[clap(
    value_enum,
    long = "config-format",
    short = 't',
    env = "CONFIG_FILE_FORMAT",
    default_value = "auto"
  )]
  pub config_format: ConfigFormat,

  /// Configuration file path, built-in defaults are used without one
  #[clap(long = "config", short = 'c', env = "CONFIG_FILE")]
  pub config_file: Option<PathBuf>,

  /// devd socket, overrides the configured one
  #[clap(long = "socket", short = 's', env = "DEVD_SOCKET")]
  pub socket: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn command_is_well_formed() {
    Args::command().debug_assert();
  }

  #[test]
  fn parses_short_flags() {
    let args = Args::try_parse_from(&[
      "devd-hotplug",
      "-f",
      "json",
      "-t",
      "yaml",
      "-c",
      "/usr/local/etc/devd-hotplug.conf",
      "-s",
      "/var/run/devd.seqpacket.pipe",
    ])
    .unwrap();

    assert_eq!(args.log_format, LogFormat::Json);
    assert_eq!(args.config_format, ConfigFormat::Yaml);
    assert_eq!(
      args.config_file,
      Some(PathBuf::from("/usr/local/etc/devd-hotplug.conf"))
    );
    assert_eq!(args.socket, Some(PathBuf::from("/var/run/devd.seqpacket.pipe")));
    assert_eq!(config::ConfigFormat::from(args.config_format), config::ConfigFormat::Yaml);
  }

  #[test]
  fn rejects_unknown_format() {
    assert!(Args::try_parse_from(&["devd-hotplug", "--log-format", "xml"]).is_err());
  }
}
