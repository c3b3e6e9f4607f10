//! Line option and port description types
//!
//! These records are forwarded to the transport as-is. Nothing here checks
//! whether a device supports the requested combination.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of data bits per character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(format!("data bits must be 7 or 8, got {}", other)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Parity checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("stop bits must be 1 or 2, got {}", other)),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Flow control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    Hardware,
}

/// Serial line parameters applied when a port is opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineOptions {
    /// Symbol rate in baud
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
    /// Size of the read buffer, in bytes; also the largest chunk one pull returns
    pub buffer_size: u32,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
            buffer_size: 255,
        }
    }
}

impl LineOptions {
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_data_bits(mut self, data_bits: DataBits) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn with_flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: u32) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

/// Identity of a port, as far as the transport knows it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    /// Human readable name (device path or address)
    pub name: String,
    pub usb_vendor_id: Option<u16>,
    pub usb_product_id: Option<u16>,
}

impl PortInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            usb_vendor_id: None,
            usb_product_id: None,
        }
    }

    pub fn with_usb_ids(mut self, vendor_id: u16, product_id: u16) -> Self {
        self.usb_vendor_id = Some(vendor_id);
        self.usb_product_id = Some(product_id);
        self
    }
}

impl fmt::Display for PortInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let (Some(vendor), Some(product)) = (self.usb_vendor_id, self.usb_product_id) {
            write!(f, " (vendor id: {}, product id: {})", vendor, product)?;
        }
        Ok(())
    }
}

/// USB vendor/product filter used when requesting a port
///
/// Unset fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortFilter {
    pub usb_vendor_id: Option<u16>,
    pub usb_product_id: Option<u16>,
}

impl PortFilter {
    pub fn new(usb_vendor_id: u16, usb_product_id: u16) -> Self {
        Self {
            usb_vendor_id: Some(usb_vendor_id),
            usb_product_id: Some(usb_product_id),
        }
    }

    /// Whether `info` satisfies this filter
    pub fn matches(&self, info: &PortInfo) -> bool {
        let vendor_ok = self
            .usb_vendor_id
            .map_or(true, |id| info.usb_vendor_id == Some(id));
        let product_ok = self
            .usb_product_id
            .map_or(true, |id| info.usb_product_id == Some(id));
        vendor_ok && product_ok
    }

    /// Whether `info` satisfies any of `filters`; an empty list accepts every port
    pub fn any_matches(filters: &[PortFilter], info: &PortInfo) -> bool {
        filters.is_empty() || filters.iter().any(|f| f.matches(info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_line_options() {
        let options = LineOptions::default();
        assert_eq!(options.baud_rate, 9600);
        assert_eq!(options.data_bits, DataBits::Eight);
        assert_eq!(options.stop_bits, StopBits::One);
        assert_eq!(options.parity, Parity::None);
        assert_eq!(options.flow_control, FlowControl::None);
        assert_eq!(options.buffer_size, 255);
    }

    #[test]
    fn test_builders_touch_one_field() {
        let options = LineOptions::default()
            .with_baud_rate(115_200)
            .with_parity(Parity::Even);

        assert_eq!(options.baud_rate, 115_200);
        assert_eq!(options.parity, Parity::Even);
        assert_eq!(options.data_bits, DataBits::Eight);
    }

    #[test]
    fn test_parse_line_options_toml() {
        let options: LineOptions = toml::from_str(
            r#"
            baud_rate = 19200
            data_bits = 7
            parity = "odd"
            stop_bits = 2
            flow_control = "hardware"
        "#,
        )
        .unwrap();

        assert_eq!(options.baud_rate, 19200);
        assert_eq!(options.data_bits, DataBits::Seven);
        assert_eq!(options.parity, Parity::Odd);
        assert_eq!(options.stop_bits, StopBits::Two);
        assert_eq!(options.flow_control, FlowControl::Hardware);
        // Unspecified fields keep their defaults
        assert_eq!(options.buffer_size, 255);
    }

    #[test]
    fn test_reject_unrepresentable_data_bits() {
        let result: Result<LineOptions, _> = toml::from_str("data_bits = 9");
        assert!(result.is_err());
    }

    #[test]
    fn test_port_filter_matching() {
        let info = PortInfo::new("/dev/ttyACM0").with_usb_ids(2389, 28704);

        assert!(PortFilter::new(2389, 28704).matches(&info));
        assert!(!PortFilter::new(2389, 1).matches(&info));
        assert!(PortFilter::default().matches(&info));
        assert!(!PortFilter::new(1, 1).matches(&PortInfo::new("tcp")));
    }

    #[test]
    fn test_any_matches_empty_accepts_all() {
        let info = PortInfo::new("anything");
        assert!(PortFilter::any_matches(&[], &info));
        assert!(!PortFilter::any_matches(&[PortFilter::new(1, 2)], &info));
    }

    #[test]
    fn test_port_info_display() {
        let info = PortInfo::new("/dev/ttyUSB0").with_usb_ids(2389, 28704);
        assert_eq!(
            info.to_string(),
            "/dev/ttyUSB0 (vendor id: 2389, product id: 28704)"
        );
        assert_eq!(PortInfo::new("tcp://host:4000").to_string(), "tcp://host:4000");
    }
}
