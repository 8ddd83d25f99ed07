mod json_lines;

use crate::{identity::DeviceIdentity, registry::RegistrationKey};
use async_trait::async_trait;
use serde::{ser::Serializer, Serialize};
use std::{fmt, io};
use thiserror::Error;

pub use json_lines::JsonLinesInput;

/// Backend name devices are removed under.
pub const SOURCE_TAG: &str = "devd";

/// Value of the `_source` option on every device added by this backend.
pub const SOURCE_OPTION: &str = "server/devd";

pub mod option {
  pub const SOURCE: &str = "_source";
  pub const NAME: &str = "name";
  pub const DRIVER: &str = "driver";
  pub const DEVICE: &str = "device";
  pub const CONFIG_INFO: &str = "config_info";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.0, f)
  }
}

/// Ordered key/value options describing how a device should be set up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputOptions(Vec<(&'static str, String)>);

impl InputOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&mut self, key: &'static str, value: impl Into<String>) {
    let value = value.into();
    match self.0.iter_mut().find(|(k, _)| *k == key) {
      Some(entry) => entry.1 = value,
      None => self.0.push((key, value)),
    }
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self
      .0
      .iter()
      .find(|(k, _)| *k == key)
      .map(|(_, v)| v.as_str())
  }

  pub fn contains(&self, key: &str) -> bool {
    self.get(key).is_some()
  }

  #[cfg(test)]
  pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.0.iter().map(|(k, _)| *k)
  }
}

impl Serialize for InputOptions {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.collect_map(self.0.iter().map(|(k, v)| (*k, v)))
  }
}

#[derive(Debug, Error)]
pub enum InputError {
  #[error("Missing required option '{0}'")]
  MissingOption(&'static str),

  #[error("Device {key} was rejected: {reason}")]
  Rejected { key: String, reason: String },

  #[error("Failed to encode device fact")]
  Encode(#[from] serde_json::Error),

  #[error(transparent)]
  Io(#[from] io::Error),
}

/// The subsystem that turns hotplug facts into actual input devices.
#[async_trait]
pub trait InputSubsystem {
  async fn new_device(
    &mut self,
    options: &InputOptions,
    identity: &DeviceIdentity,
  ) -> Result<DeviceId, InputError>;

  /// Removes every device registered under `key` by the `source` backend.
  async fn remove_devices(&mut self, source: &str, key: &RegistrationKey) -> Result<(), InputError>;

  fn is_duplicate(&self, key: &RegistrationKey) -> bool;
}
