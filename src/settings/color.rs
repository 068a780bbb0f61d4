//! Color sensor settings

use serde::{Deserialize, Serialize};

use crate::io::{self, BinaryRecord};

/// Mains frequency used for flicker compensation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerlineFrequency {
    Undefined,
    F50,
    #[default]
    F60,
}

impl PowerlineFrequency {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 2;

    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::F50,
            2 => Self::F60,
            _ => Self::Undefined,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Undefined => 0,
            Self::F50 => 1,
            Self::F60 => 2,
        }
    }
}

/// Color sensor controls, in wire order
///
/// Layout (host byte order, 12 bytes):
///
/// | field                    | type | window        |
/// |--------------------------|------|---------------|
/// | auto_exposure_time       | bool |               |
/// | exposure_time_absolute   | u8   | [0, 5]        |
/// | brightness               | u8   |               |
/// | contrast                 | u8   | [0, 10]       |
/// | saturation               | u8   | [0, 63]       |
/// | sharpness                | u8   | [0, 4]        |
/// | auto_white_balance       | bool |               |
/// | white_balance            | u16  | [2500, 12500] |
/// | backlight_compensation   | bool |               |
/// | gain                     | u8   |               |
/// | powerline_frequency      | u8   | [0, 2]        |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorSettings {
    pub auto_exposure_time: bool,
    pub exposure_time_absolute: u8,
    pub brightness: u8,
    pub contrast: u8,
    pub saturation: u8,
    pub sharpness: u8,
    pub auto_white_balance: bool,
    pub white_balance: u16,
    pub backlight_compensation: bool,
    pub gain: u8,
    pub powerline_frequency: PowerlineFrequency,
}

impl ColorSettings {
    pub const EXPOSURE_RANGE: (u8, u8) = (0, 5);
    pub const CONTRAST_RANGE: (u8, u8) = (0, 10);
    pub const SATURATION_RANGE: (u8, u8) = (0, 63);
    pub const SHARPNESS_RANGE: (u8, u8) = (0, 4);
    pub const WHITE_BALANCE_RANGE: (u16, u16) = (2500, 12500);

    /// Encoded size of the record
    pub const DATA_SIZE: usize = 12;
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            auto_exposure_time: true,
            exposure_time_absolute: 3,
            brightness: 128,
            contrast: 5,
            saturation: 32,
            sharpness: 2,
            auto_white_balance: true,
            white_balance: 4500,
            backlight_compensation: false,
            gain: 128,
            powerline_frequency: PowerlineFrequency::F60,
        }
    }
}

impl BinaryRecord for ColorSettings {
    fn total_data_size(&self) -> usize {
        Self::DATA_SIZE
    }

    fn init_from_data(&mut self, data: &[u8], offset: &mut usize) {
        if offset.saturating_add(Self::DATA_SIZE) > data.len() {
            tracing::error!(
                "ColorSettings::init_from_data: not enough data, {} available, {} required",
                data.len().saturating_sub(*offset),
                Self::DATA_SIZE
            );
            return;
        }

        let (exp_min, exp_max) = Self::EXPOSURE_RANGE;
        let (con_min, con_max) = Self::CONTRAST_RANGE;
        let (sat_min, sat_max) = Self::SATURATION_RANGE;
        let (sha_min, sha_max) = Self::SHARPNESS_RANGE;
        let (wb_min, wb_max) = Self::WHITE_BALANCE_RANGE;

        io::read(&mut self.auto_exposure_time, data, offset);
        io::read_clamped(&mut self.exposure_time_absolute, data, offset, exp_min, exp_max);
        io::read(&mut self.brightness, data, offset);
        io::read_clamped(&mut self.contrast, data, offset, con_min, con_max);
        io::read_clamped(&mut self.saturation, data, offset, sat_min, sat_max);
        io::read_clamped(&mut self.sharpness, data, offset, sha_min, sha_max);
        io::read(&mut self.auto_white_balance, data, offset);
        io::read_clamped(&mut self.white_balance, data, offset, wb_min, wb_max);
        io::read(&mut self.backlight_compensation, data, offset);
        io::read(&mut self.gain, data, offset);

        let mut powerline = self.powerline_frequency.as_u8();
        io::read_clamped(
            &mut powerline,
            data,
            offset,
            PowerlineFrequency::MIN,
            PowerlineFrequency::MAX,
        );
        self.powerline_frequency = PowerlineFrequency::from_u8(powerline);
    }

    fn write_to_data(&self, data: &mut [u8], offset: &mut usize) {
        if offset.saturating_add(Self::DATA_SIZE) > data.len() {
            tracing::error!(
                "ColorSettings::write_to_data: not enough space, {} available, {} required",
                data.len().saturating_sub(*offset),
                Self::DATA_SIZE
            );
            return;
        }

        io::write(self.auto_exposure_time, data, offset);
        io::write(self.exposure_time_absolute, data, offset);
        io::write(self.brightness, data, offset);
        io::write(self.contrast, data, offset);
        io::write(self.saturation, data, offset);
        io::write(self.sharpness, data, offset);
        io::write(self.auto_white_balance, data, offset);
        io::write(self.white_balance, data, offset);
        io::write(self.backlight_compensation, data, offset);
        io::write(self.gain, data, offset);
        io::write(self.powerline_frequency.as_u8(), data, offset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_size() {
        let settings = ColorSettings::default();
        assert_eq!(settings.to_bytes().len(), ColorSettings::DATA_SIZE);
    }

    #[test]
    fn test_field_order() {
        let settings = ColorSettings {
            white_balance: 5000,
            powerline_frequency: PowerlineFrequency::F50,
            ..Default::default()
        };
        let bytes = settings.to_bytes();
        assert_eq!(bytes[0], 1);
        assert_eq!(bytes[1], 3);
        assert_eq!(&bytes[7..9], &5000u16.to_ne_bytes());
        assert_eq!(bytes[11], 1);
    }

    #[test]
    fn test_exposure_is_clamped_on_read() {
        let mut bytes = ColorSettings::default().to_bytes();
        bytes[1] = 200u8;
        let mut settings = ColorSettings::default();
        let mut offset = 0;
        settings.init_from_data(&bytes, &mut offset);
        assert_eq!(settings.exposure_time_absolute, 5);
        assert_eq!(offset, ColorSettings::DATA_SIZE);
    }

    #[test]
    fn test_high_bytes_clamp_to_window_max() {
        let mut bytes = ColorSettings::default().to_bytes();
        bytes[1] = 0xFF;
        bytes[11] = 0xC8;
        let mut settings = ColorSettings {
            powerline_frequency: PowerlineFrequency::Undefined,
            ..Default::default()
        };
        let mut offset = 0;
        settings.init_from_data(&bytes, &mut offset);
        assert_eq!(settings.exposure_time_absolute, 5);
        assert_eq!(settings.powerline_frequency, PowerlineFrequency::F60);
    }

    #[test]
    fn test_white_balance_and_powerline_windows() {
        let mut bytes = ColorSettings::default().to_bytes();
        bytes[7..9].copy_from_slice(&100u16.to_ne_bytes());
        bytes[11] = 9;
        let mut settings = ColorSettings {
            powerline_frequency: PowerlineFrequency::F50,
            ..Default::default()
        };
        let mut offset = 0;
        settings.init_from_data(&bytes, &mut offset);
        assert_eq!(settings.white_balance, 2500);
        assert_eq!(settings.powerline_frequency, PowerlineFrequency::F60);
    }

    #[test]
    fn test_short_buffer_leaves_record() {
        let bytes = vec![0u8; ColorSettings::DATA_SIZE - 1];
        let mut settings = ColorSettings::default();
        let mut offset = 0;
        settings.init_from_data(&bytes, &mut offset);
        assert_eq!(settings, ColorSettings::default());
        assert_eq!(offset, 0);
    }
}
