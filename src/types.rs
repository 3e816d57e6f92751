//! Common types for hidraw report I/O

use std::fmt;

/// Largest report the kernel HID core will hand out (`HID_MAX_BUFFER_SIZE`)
pub const HID_MAX_BUFFER_SIZE: usize = 4096;

/// Largest single read from a hidraw node
pub const HIDRAW_MAX_READ: usize = 4096;

/// HID report type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// Device to host on the interrupt stream
    Input,
    /// Host to device on the interrupt stream
    Output,
    /// Addressed configuration exchange via control requests
    Feature,
}

/// Direction of a control request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestType {
    /// GET_REPORT: read a feature report from the device
    GetReport,
    /// SET_REPORT: push a feature report to the device
    SetReport,
}

/// Bus a hidraw node is attached through (`BUS_*` in linux/input.h)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusType {
    Pci,
    Usb,
    Bluetooth,
    Virtual,
    I2c,
    Host,
    Spi,
    Other(u32),
}

impl From<u32> for BusType {
    fn from(raw: u32) -> Self {
        match raw {
            0x01 => BusType::Pci,
            0x03 => BusType::Usb,
            0x05 => BusType::Bluetooth,
            0x06 => BusType::Virtual,
            0x18 => BusType::I2c,
            0x19 => BusType::Host,
            0x1C => BusType::Spi,
            other => BusType::Other(other),
        }
    }
}

/// Identity reported by `HIDIOCGRAWINFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub bus: BusType,
    pub vendor_id: u16,
    pub product_id: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {:04x}:{:04x}",
            self.bus, self.vendor_id, self.product_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_type_decoding() {
        assert_eq!(BusType::from(0x03), BusType::Usb);
        assert_eq!(BusType::from(0x05), BusType::Bluetooth);
        assert_eq!(BusType::from(0x42), BusType::Other(0x42));
    }

    #[test]
    fn test_device_info_display() {
        let info = DeviceInfo {
            bus: BusType::Usb,
            vendor_id: 0x046d,
            product_id: 0xc08b,
        };
        assert_eq!(info.to_string(), "Usb 046d:c08b");
    }
}
