mod sysctl;

use crate::drivers::{DeviceClasses, DriverRule};
use serde::Serialize;
use std::{fmt, path::PathBuf};
use tracing::{event, Level};

pub use sysctl::Sysctl;

/// Placeholder for a vendor or product the system could not name.
pub const UNNAMED: &str = "(unnamed)";

/// Read access to the kernel's named properties.
pub trait SystemProperties {
  /// True when the kernel knows the property, even if its value is empty.
  fn exists(&self, name: &str) -> bool;

  fn get_string(&self, name: &str) -> Option<String>;
}

/// Everything the input subsystem is told about a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
  pub vendor: String,
  pub product: String,
  pub usb_id: Option<String>,
  pub device: PathBuf,
  pub classes: DeviceClasses,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
  pub vendor: String,
  pub product: String,

  /// Whether the kernel had a description for the device at all
  pub described: bool,
}

impl Description {
  pub fn unnamed() -> Self {
    Self {
      vendor: UNNAMED.into(),
      product: UNNAMED.into(),
      described: false,
    }
  }

  /// Splits a `%desc` value such as `Logitech USB Receiver, class 0/0, rev 2.00/12.03, addr 2`.
  ///
  /// The vendor is everything up to the first space, the product runs from
  /// there to the first comma.
  pub fn parse(text: &str) -> Self {
    if text.is_empty() {
      return Self::unnamed();
    }

    let (vendor, product) = match text.split_once(' ') {
      Some((vendor, rest)) => {
        let product = rest.find(',').map_or(rest, |end| &rest[..end]);
        (vendor, product)
      }
      None => (text, UNNAMED),
    };

    Self {
      vendor: vendor.into(),
      product: product.into(),
      described: true,
    }
  }
}

pub struct IdentityResolver {
  properties: Box<dyn SystemProperties>,
}

impl IdentityResolver {
  pub fn new(properties: impl SystemProperties + 'static) -> Self {
    Self {
      properties: Box::new(properties),
    }
  }

  pub fn description_key(driver: &str, unit: impl fmt::Display) -> String {
    format!("dev.{}.{}.%desc", driver, unit)
  }

  pub fn resolve(&self, rule: &DriverRule, device_name: &str) -> Description {
    let key = Self::description_key(rule.prefix(), rule.unit(device_name));
    match self.properties.get_string(&key) {
      Some(text) if !text.is_empty() => Description::parse(&text),
      _ => {
        event!(target: "devd-hotplug", Level::DEBUG, device.name = %device_name, property = %key, "no device description");
        Description::unnamed()
      }
    }
  }

  pub fn unit_exists(&self, rule: &DriverRule, unit: u32) -> bool {
    self
      .properties
      .exists(&Self::description_key(rule.prefix(), unit))
  }
}

impl fmt::Debug for IdentityResolver {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct(stringify!(IdentityResolver))
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::MapProperties;

  fn description(vendor: &str, product: &str) -> Description {
    Description {
      vendor: vendor.into(),
      product: product.into(),
      described: true,
    }
  }

  #[test]
  fn vendor_and_product() {
    assert_eq!(
      Description::parse("Vendor Model, Rev2"),
      description("Vendor", "Model")
    );
    assert_eq!(
      Description::parse("Logitech USB Receiver, class 0/0, rev 2.00/12.03, addr 2"),
      description("Logitech", "USB Receiver")
    );
  }

  #[test]
  fn vendor_only() {
    assert_eq!(Description::parse("SoloName"), description("SoloName", UNNAMED));
    assert_eq!(Description::parse("Solo,Name"), description("Solo,Name", UNNAMED));
  }

  #[test]
  fn empty_is_unnamed() {
    assert_eq!(Description::parse(""), Description::unnamed());
  }

  #[test]
  fn resolve_queries_unit_description() {
    let rule = DriverRule::new("atkbd", DeviceClasses::KEYBOARD, Some("kbd"));
    let resolver = IdentityResolver::new(
      MapProperties::default().with("dev.atkbd.0.%desc", "AT Keyboard, irq 1"),
    );

    assert_eq!(resolver.resolve(&rule, "atkbd0"), description("AT", "Keyboard"));
    assert_eq!(resolver.resolve(&rule, "atkbd1"), Description::unnamed());
    assert!(resolver.unit_exists(&rule, 0));
    assert!(!resolver.unit_exists(&rule, 1));
  }

  #[test]
  fn resolve_treats_empty_description_as_absent() {
    let rule = DriverRule::new("ums", DeviceClasses::POINTER, Some("mouse"));
    let resolver = IdentityResolver::new(MapProperties::default().with("dev.ums.0.%desc", ""));

    assert_eq!(resolver.resolve(&rule, "ums0"), Description::unnamed());
  }
}
