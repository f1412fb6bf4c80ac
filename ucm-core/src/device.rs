//! Identity of the device and participant.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

const INCH_TO_CM: f64 = 2.54;

/// Short, lossy hardware identifier: the MD5 hex digest of the platform uid,
/// keeping every fourth character.
pub fn create_device_identifier(uid: &str) -> String {
    let hashed = format!("{:x}", Md5::digest(uid.as_bytes()));
    hashed.chars().step_by(4).collect()
}

/// Formats a float the way the exported tables expect: shortest round-trip
/// representation, always with a decimal point for finite whole numbers.
pub fn float_str(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else if x.is_nan() {
        "nan".to_string()
    } else {
        x.to_string()
    }
}

/// Random participant identifier.
pub fn create_user_identifier() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Display properties reported by the platform layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub uid: String,
    pub screen_x: u32,
    pub screen_y: u32,
    pub dpi: f64,
    pub density: f64,
    pub platform: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            uid: "unknown".to_string(),
            screen_x: 1920,
            screen_y: 1080,
            dpi: 96.0,
            density: 1.0,
            platform: std::env::consts::OS.to_string(),
        }
    }
}

impl DeviceInfo {
    pub fn id(&self) -> String {
        create_device_identifier(&self.uid)
    }

    /// Named properties in export column order.
    pub fn properties(&self) -> Vec<(&'static str, String)> {
        let (x, y) = (self.screen_x as f64, self.screen_y as f64);
        let aspect = if y > 0.0 { x / y } else { f64::NAN };
        let size = |px: f64| {
            if self.dpi > 0.0 { px / self.dpi * INCH_TO_CM } else { f64::NAN }
        };
        vec![
            ("id", self.id()),
            ("screen_x", self.screen_x.to_string()),
            ("screen_y", self.screen_y.to_string()),
            ("dpi", float_str(self.dpi)),
            ("density", float_str(self.density)),
            ("aspect_ratio", float_str(aspect)),
            ("size_x", float_str(size(x))),
            ("size_y", float_str(size(y))),
            ("platform", self.platform.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_identifier_is_every_fourth_hex_char() {
        // md5("abc") = 900150983cd24fb0d6963f7d28e17f72
        assert_eq!(create_device_identifier("abc"), "9534d327");
    }

    #[test]
    fn float_str_keeps_decimal_point() {
        assert_eq!(float_str(1.0), "1.0");
        assert_eq!(float_str(0.5), "0.5");
        assert_eq!(float_str(f64::NAN), "nan");
        assert_eq!(float_str(1697651234.25), "1697651234.25");
    }

    #[test]
    fn user_identifier_is_uuid_hex() {
        let id = create_user_identifier();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn properties_derive_physical_size() {
        let info = DeviceInfo {
            uid: "abc".into(),
            screen_x: 960,
            screen_y: 480,
            dpi: 96.0,
            density: 2.0,
            platform: "android".into(),
        };
        let props = info.properties();
        assert_eq!(props[0], ("id", "9534d327".to_string()));
        assert_eq!(props[3], ("dpi", "96.0".to_string()));
        assert_eq!(props[5], ("aspect_ratio", "2.0".to_string()));
        assert_eq!(props[6], ("size_x", "25.4".to_string()));
        assert_eq!(props[8].1, "android");
    }
}
