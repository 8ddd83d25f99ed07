mod parse;
mod watch;

use crate::{devd::DEFAULT_SOCKET, drivers::DriverTable};
use futures::stream::LocalBoxStream;
use serde::{Deserialize, Serialize};
use std::{
  fmt,
  path::{Path, PathBuf},
  sync::Arc,
};

pub use parse::{ConfigError, ConfigFormat};
pub use watch::ConfigWatcherError;

mod inner {
  use super::*;

  #[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
  #[serde(rename_all = "camelCase", default)]
  pub(super) struct Config {
    pub(super) socket: PathBuf,

    pub(super) device_root: PathBuf,

    pub(super) drivers: DriverTable,
  }

  impl Default for Config {
    fn default() -> Self {
      Self {
        socket: DEFAULT_SOCKET.into(),
        device_root: "/dev".into(),
        drivers: DriverTable::builtin(),
      }
    }
  }
}

#[derive(Clone, PartialEq, Default)]
pub struct Config {
  inner: Arc<inner::Config>,
}

impl Config {
  /// Path of devd's client socket
  pub fn socket(&self) -> &Path {
    &self.inner.socket
  }

  /// Directory holding the device nodes
  pub fn device_root(&self) -> &Path {
    &self.inner.device_root
  }

  /// Driver rules, in enumeration order
  pub fn drivers(&self) -> &DriverTable {
    &self.inner.drivers
  }
}

impl From<inner::Config> for Config {
  fn from(inner: inner::Config) -> Self {
    Self {
      inner: Arc::new(inner),
    }
  }
}

impl fmt::Debug for Config {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.inner, f)
  }
}

impl Serialize for Config {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    Serialize::serialize(&*self.inner, serializer)
  }
}

impl<'de> Deserialize<'de> for Config {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    <inner::Config as Deserialize>::deserialize(deserializer).map(Self::from)
  }
}

impl Config {
  pub async fn read(file: impl AsRef<Path>, format: ConfigFormat) -> Result<Config, ConfigError> {
    parse::read_config(file, format).await
  }

  /// Yields a freshly read config every time the file is written.
  pub fn watch(
    file: impl AsRef<Path>,
    format: ConfigFormat,
  ) -> Result<LocalBoxStream<'static, Result<Config, ConfigError>>, ConfigWatcherError> {
    watch::watch(file, format)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::drivers::{DeviceClasses, DriverRule};

  #[test]
  fn defaults_to_builtin_drivers() {
    let config = Config::default();

    assert_eq!(config.socket(), Path::new("/var/run/devd.pipe"));
    assert_eq!(config.device_root(), Path::new("/dev"));
    assert_eq!(config.drivers(), &DriverTable::builtin());
  }

  #[test]
  fn missing_keys_keep_defaults() {
    let config: Config = serde_json::from_str(r#"{"deviceRoot": "/tmp/dev"}"#).unwrap();

    assert_eq!(config.socket(), Path::new(DEFAULT_SOCKET));
    assert_eq!(config.device_root(), Path::new("/tmp/dev"));
    assert_eq!(config.drivers(), &DriverTable::builtin());
  }

  #[test]
  fn drivers_replace_the_builtin_table() {
    let config: Config = serde_yaml::from_str(
      r#"
        socket: /run/devd.seqpacket.pipe
        drivers:
          - prefix: hms
            classes: pointer
            driver: mouse
          - prefix: hkbd
            classes: [keyboard]
            driver: kbd
      "#,
    )
    .unwrap();

    assert_eq!(config.socket(), Path::new("/run/devd.seqpacket.pipe"));
    assert_eq!(
      config.drivers(),
      &DriverTable::new(vec![
        DriverRule::new("hms", DeviceClasses::POINTER, Some("mouse")),
        DriverRule::new("hkbd", DeviceClasses::KEYBOARD, Some("kbd")),
      ])
    );
  }
}
