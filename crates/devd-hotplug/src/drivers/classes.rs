use bitflags::bitflags;
use serde::{
  de::{self, SeqAccess, Visitor},
  Deserialize, Serialize,
};
use std::fmt;

bitflags! {
  /// Input classes a device provides.
  pub struct DeviceClasses: u8 {
    const KEYBOARD = 0b0000_0001;
    const POINTER = 0b0000_0010;
    const JOYSTICK = 0b0000_0100;
    const TOUCHPAD = 0b0000_1000;
    const TOUCHSCREEN = 0b0001_0000;
  }
}

const CLASSES: &[(DeviceClasses, &str)] = &[
  (DeviceClasses::KEYBOARD, "keyboard"),
  (DeviceClasses::POINTER, "pointer"),
  (DeviceClasses::JOYSTICK, "joystick"),
  (DeviceClasses::TOUCHPAD, "touchpad"),
  (DeviceClasses::TOUCHSCREEN, "touchscreen"),
];

const NAMES: &[&str] = &["keyboard", "pointer", "joystick", "touchpad", "touchscreen"];

impl DeviceClasses {
  pub fn from_name(name: &str) -> Option<DeviceClasses> {
    CLASSES
      .iter()
      .find(|(_, n)| *n == name)
      .map(|(class, _)| *class)
  }

  pub fn names(self) -> impl Iterator<Item = &'static str> {
    CLASSES
      .iter()
      .filter(move |(class, _)| self.contains(*class))
      .map(|(_, name)| *name)
  }
}

impl fmt::Display for DeviceClasses {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, name) in self.names().enumerate() {
      if i > 0 {
        f.write_str(",")?;
      }
      f.write_str(name)?;
    }

    Ok(())
  }
}

impl Serialize for DeviceClasses {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    self.names().collect::<Vec<_>>().serialize(serializer)
  }
}

struct DeviceClassesVisitor;
impl<'de> Visitor<'de> for DeviceClassesVisitor {
  type Value = DeviceClasses;

  fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "a device class name or a list of device class names")
  }

  fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
  where
    E: de::Error,
  {
    DeviceClasses::from_name(v).ok_or_else(|| E::unknown_variant(v, NAMES))
  }

  fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
  where
    A: SeqAccess<'de>,
  {
    let mut classes = DeviceClasses::empty();
    while let Some(name) = seq.next_element::<String>()? {
      classes |= DeviceClasses::from_name(&name)
        .ok_or_else(|| <A::Error as de::Error>::unknown_variant(&name, NAMES))?;
    }

    Ok(classes)
  }
}

impl<'de> Deserialize<'de> for DeviceClasses {
  fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
  where
    D: serde::Deserializer<'de>,
  {
    deserializer.deserialize_any(DeviceClassesVisitor)
  }
}
