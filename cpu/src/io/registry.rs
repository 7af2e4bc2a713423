//! The dispatch registry maps (channel, device number) pairs and
//! device alert codes to attached devices.  It is built once, from
//! the full list of devices, when the machine is created.
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use tracing::{event, Level};

use base::prelude::*;

use super::Device;

/// Identifies a device within the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(usize);

impl DeviceId {
    #[cfg(test)]
    pub(crate) fn new(n: usize) -> DeviceId {
        DeviceId(n)
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "device #{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateBinding {
        channel: Unsigned3Bit,
        unit: Unsigned6Bit,
        first: String,
        second: String,
    },
    DuplicateAlert {
        code: Unsigned9Bit,
        first: String,
        second: String,
    },
    /// Device alert codes start at 0o100; the lower codes belong to
    /// the channels and relocation registers.
    ReservedAlert { code: Unsigned9Bit, device: String },
    /// Device number 0 means "disconnect" and cannot be bound.
    ReservedUnit { channel: Unsigned3Bit, device: String },
    /// The device's numbers run past the five-bit device number.
    UnitOutOfRange {
        channel: Unsigned3Bit,
        base: Unsigned5Bit,
        count: u8,
        device: String,
    },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            RegistryError::DuplicateBinding {
                channel,
                unit,
                first,
                second,
            } => write!(
                f,
                "device number {unit:02o} on channel {channel} is claimed by both {first} and {second}"
            ),
            RegistryError::DuplicateAlert {
                code,
                first,
                second,
            } => write!(
                f,
                "alert {code:03o} is claimed by both {first} and {second}"
            ),
            RegistryError::ReservedAlert { code, device } => write!(
                f,
                "{device} claims alert {code:03o}, but device alerts start at 100"
            ),
            RegistryError::ReservedUnit { channel, device } => write!(
                f,
                "{device} claims device number 0 on channel {channel}, which cannot be bound"
            ),
            RegistryError::UnitOutOfRange {
                channel,
                base,
                count,
                device,
            } => write!(
                f,
                "{device} claims {count} device numbers from {base:02o} on channel {channel}, but device numbers stop at 37"
            ),
        }
    }
}

impl Error for RegistryError {}

pub struct DispatchRegistry {
    devices: Vec<Box<dyn Device>>,
    bindings: BTreeMap<(Unsigned3Bit, Unsigned6Bit), DeviceId>,
    alerts: BTreeMap<Unsigned9Bit, DeviceId>,
}

impl DispatchRegistry {
    /// Build the registry.
    ///
    /// # Errors
    ///
    /// Fails if two devices claim the same device number on the same
    /// channel, or the same alert code, or if a device claims a
    /// reserved number or one past the end of the device numbers.
    pub fn build(devices: Vec<Box<dyn Device>>) -> Result<DispatchRegistry, RegistryError> {
        let mut bindings: BTreeMap<(Unsigned3Bit, Unsigned6Bit), DeviceId> = BTreeMap::new();
        let mut alerts: BTreeMap<Unsigned9Bit, DeviceId> = BTreeMap::new();
        for (n, device) in devices.iter().enumerate() {
            let id = DeviceId(n);
            let range = device.address_range();
            if !range.fits() {
                return Err(RegistryError::UnitOutOfRange {
                    channel: range.channel,
                    base: range.base,
                    count: range.count,
                    device: device.name(),
                });
            }
            for unit in range.units() {
                if u8::from(unit) & 0o37 == 0 {
                    return Err(RegistryError::ReservedUnit {
                        channel: range.channel,
                        device: device.name(),
                    });
                }
                if let Some(prev) = bindings.insert((range.channel, unit), id) {
                    return Err(RegistryError::DuplicateBinding {
                        channel: range.channel,
                        unit,
                        first: devices[prev.0].name(),
                        second: device.name(),
                    });
                }
            }
            for code in device.alert_codes() {
                if u16::from(code) < 0o100 {
                    return Err(RegistryError::ReservedAlert {
                        code,
                        device: device.name(),
                    });
                }
                if let Some(prev) = alerts.insert(code, id) {
                    return Err(RegistryError::DuplicateAlert {
                        code,
                        first: devices[prev.0].name(),
                        second: device.name(),
                    });
                }
            }
            event!(
                Level::INFO,
                "attached {} to channel {} as {id}",
                device.name(),
                range.channel
            );
        }
        Ok(DispatchRegistry {
            devices,
            bindings,
            alerts,
        })
    }

    #[must_use]
    pub fn empty() -> DispatchRegistry {
        DispatchRegistry {
            devices: Vec::new(),
            bindings: BTreeMap::new(),
            alerts: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn lookup(&self, channel: Unsigned3Bit, unit: Unsigned6Bit) -> Option<DeviceId> {
        self.bindings.get(&(channel, unit)).copied()
    }

    #[must_use]
    pub fn lookup_alert(&self, code: Unsigned9Bit) -> Option<DeviceId> {
        self.alerts.get(&code).copied()
    }

    /// Device identifiers are only created by `build`, so `id` always
    /// refers to one of our devices.
    pub fn device_mut(&mut self, id: DeviceId) -> &mut dyn Device {
        self.devices[id.0].as_mut()
    }

    #[must_use]
    pub fn device(&self, id: DeviceId) -> &dyn Device {
        self.devices[id.0].as_ref()
    }

    pub fn ids(&self) -> impl Iterator<Item = DeviceId> {
        (0..self.devices.len()).map(DeviceId)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("DispatchRegistry")
            .field("devices", &self.devices)
            .field("bindings", &self.bindings)
            .field("alerts", &self.alerts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testdevice::TestDevice;
    use super::super::Directions;
    use super::*;

    #[test]
    fn test_lookup() {
        let teletype = TestDevice::new("teletype", u3!(0), u5!(1), Directions::Both);
        let tape = TestDevice::new("paper tape", u3!(0), u5!(4), Directions::Input)
            .with_alerts(vec![u9!(0o140)]);
        let registry = DispatchRegistry::build(vec![teletype.boxed(), tape.boxed()])
            .expect("devices should not collide");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup(u3!(0), u6!(0o01)), Some(DeviceId(0)));
        assert_eq!(registry.lookup(u3!(0), u6!(0o41)), Some(DeviceId(0)));
        assert_eq!(registry.lookup(u3!(0), u6!(0o04)), Some(DeviceId(1)));
        assert_eq!(registry.lookup(u3!(0), u6!(0o44)), None);
        assert_eq!(registry.lookup(u3!(1), u6!(0o01)), None);
        assert_eq!(registry.lookup_alert(u9!(0o140)), Some(DeviceId(1)));
        assert_eq!(registry.lookup_alert(u9!(0o141)), None);
        assert_eq!(registry.device(DeviceId(1)).name(), "paper tape");
    }

    #[test]
    fn test_duplicate_binding() {
        let first = TestDevice::new("first", u3!(2), u5!(3), Directions::Both);
        let second = TestDevice::new("second", u3!(2), u5!(3), Directions::Output);
        match DispatchRegistry::build(vec![first.boxed(), second.boxed()]) {
            Err(RegistryError::DuplicateBinding {
                channel,
                unit,
                first,
                second,
            }) => {
                assert_eq!(channel, u3!(2));
                assert_eq!(unit, u6!(0o43));
                assert_eq!(first, "first");
                assert_eq!(second, "second");
            }
            other => panic!("expected a duplicate binding, got {other:?}"),
        }
    }

    #[test]
    fn test_unit_out_of_range() {
        let last = TestDevice::new("last", u3!(3), u5!(0o36), Directions::Input).with_count(2);
        assert!(DispatchRegistry::build(vec![last.boxed()]).is_ok());
        let long = TestDevice::new("long", u3!(3), u5!(0o36), Directions::Input).with_count(3);
        match DispatchRegistry::build(vec![long.boxed()]) {
            Err(e @ RegistryError::UnitOutOfRange { .. }) => {
                assert_eq!(
                    e,
                    RegistryError::UnitOutOfRange {
                        channel: u3!(3),
                        base: u5!(0o36),
                        count: 3,
                        device: "long".to_string(),
                    }
                );
                assert!(e.to_string().contains("long"));
            }
            other => panic!("expected an out of range error, got {other:?}"),
        }
    }

    #[test]
    fn test_same_unit_on_different_channels() {
        let first = TestDevice::new("first", u3!(0), u5!(3), Directions::Both);
        let second = TestDevice::new("second", u3!(1), u5!(3), Directions::Both);
        assert!(DispatchRegistry::build(vec![first.boxed(), second.boxed()]).is_ok());
    }

    #[test]
    fn test_duplicate_alert() {
        let first =
            TestDevice::new("first", u3!(0), u5!(1), Directions::Input).with_alerts(vec![u9!(0o200)]);
        let second =
            TestDevice::new("second", u3!(0), u5!(2), Directions::Input).with_alerts(vec![u9!(0o200)]);
        assert!(matches!(
            DispatchRegistry::build(vec![first.boxed(), second.boxed()]),
            Err(RegistryError::DuplicateAlert { .. })
        ));
    }

    #[test]
    fn test_reserved_numbers() {
        let bad_alert =
            TestDevice::new("bad", u3!(0), u5!(1), Directions::Input).with_alerts(vec![u9!(0o42)]);
        assert!(matches!(
            DispatchRegistry::build(vec![bad_alert.boxed()]),
            Err(RegistryError::ReservedAlert { .. })
        ));
        let bad_unit = TestDevice::new("bad", u3!(0), u5!(0), Directions::Input);
        assert!(matches!(
            DispatchRegistry::build(vec![bad_unit.boxed()]),
            Err(RegistryError::ReservedUnit { .. })
        ));
    }
}
