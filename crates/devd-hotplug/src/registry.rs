use crate::input::SOURCE_TAG;
use serde::Serialize;
use std::{collections::BTreeSet, fmt};

/// `devd:<device name>`, the identity a device is registered and removed under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RegistrationKey(String);

impl RegistrationKey {
  pub fn new(device_name: &str) -> Self {
    Self(format!("{}:{}", SOURCE_TAG, device_name))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for RegistrationKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Keys of the devices handed to the input subsystem and not removed since.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
  devices: BTreeSet<RegistrationKey>,
}

impl DeviceRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn contains(&self, key: &RegistrationKey) -> bool {
    self.devices.contains(key)
  }

  /// Returns false if the key was already registered.
  pub fn register(&mut self, key: RegistrationKey) -> bool {
    self.devices.insert(key)
  }

  pub fn unregister(&mut self, key: &RegistrationKey) -> bool {
    self.devices.remove(key)
  }

  pub fn len(&self) -> usize {
    self.devices.len()
  }

  pub fn is_empty(&self) -> bool {
    self.devices.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn key_format() {
    let key = RegistrationKey::new("ums0");
    assert_eq!(key.as_str(), "devd:ums0");
    assert_eq!(key, RegistrationKey::new("ums0"));
  }

  #[test]
  fn register_once() {
    let mut registry = DeviceRegistry::new();
    assert!(registry.register(RegistrationKey::new("ums0")));
    assert!(!registry.register(RegistrationKey::new("ums0")));
    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn unregister_allows_register_again() {
    let mut registry = DeviceRegistry::new();
    let key = RegistrationKey::new("ukbd0");

    assert!(registry.register(key.clone()));
    assert!(registry.unregister(&key));
    assert!(!registry.unregister(&key));
    assert!(registry.is_empty());
    assert!(registry.register(key.clone()));
    assert!(registry.contains(&key));
  }
}
