//! Per-modality capture and transmission switches

use serde::{Deserialize, Serialize};

use crate::frame::Modalities;
use crate::io::{self, BinaryRecord};

/// Which modalities are captured and which of those are sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub capture_color: bool,
    pub capture_depth: bool,
    pub capture_infra: bool,
    pub capture_bodies: bool,
    pub capture_cloud: bool,
    pub capture_imu: bool,
    pub capture_audio: bool,
    pub send_color: bool,
    pub send_depth: bool,
    pub send_infra: bool,
    pub send_bodies: bool,
    pub send_cloud: bool,
    pub send_imu: bool,
    pub send_audio: bool,
}

impl DataSettings {
    pub const DATA_SIZE: usize = 14;

    /// Modalities that are both captured and sent
    pub fn sent_modalities(&self) -> Modalities {
        let mut m = Modalities::empty();
        let pairs = [
            (self.capture_color && self.send_color, Modalities::COLOR),
            (self.capture_depth && self.send_depth, Modalities::DEPTH),
            (self.capture_infra && self.send_infra, Modalities::INFRA),
            (self.capture_bodies && self.send_bodies, Modalities::BODIES),
            (self.capture_cloud && self.send_cloud, Modalities::CLOUD),
            (self.capture_imu && self.send_imu, Modalities::IMU),
            (self.capture_audio && self.send_audio, Modalities::AUDIO),
        ];
        for (enabled, flag) in pairs {
            if enabled {
                m.insert(flag);
            }
        }
        m
    }

    fn fields(&self) -> [bool; Self::DATA_SIZE] {
        [
            self.capture_color,
            self.capture_depth,
            self.capture_infra,
            self.capture_bodies,
            self.capture_cloud,
            self.capture_imu,
            self.capture_audio,
            self.send_color,
            self.send_depth,
            self.send_infra,
            self.send_bodies,
            self.send_cloud,
            self.send_imu,
            self.send_audio,
        ]
    }

    fn fields_mut(&mut self) -> [&mut bool; Self::DATA_SIZE] {
        [
            &mut self.capture_color,
            &mut self.capture_depth,
            &mut self.capture_infra,
            &mut self.capture_bodies,
            &mut self.capture_cloud,
            &mut self.capture_imu,
            &mut self.capture_audio,
            &mut self.send_color,
            &mut self.send_depth,
            &mut self.send_infra,
            &mut self.send_bodies,
            &mut self.send_cloud,
            &mut self.send_imu,
            &mut self.send_audio,
        ]
    }
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            capture_color: true,
            capture_depth: true,
            capture_infra: false,
            capture_bodies: false,
            capture_cloud: false,
            capture_imu: true,
            capture_audio: false,
            send_color: true,
            send_depth: true,
            send_infra: false,
            send_bodies: false,
            send_cloud: false,
            send_imu: true,
            send_audio: false,
        }
    }
}

impl BinaryRecord for DataSettings {
    fn total_data_size(&self) -> usize {
        Self::DATA_SIZE
    }

    fn init_from_data(&mut self, data: &[u8], offset: &mut usize) {
        if offset.saturating_add(Self::DATA_SIZE) > data.len() {
            tracing::error!(
                "DataSettings::init_from_data: not enough data, {} available, {} required",
                data.len().saturating_sub(*offset),
                Self::DATA_SIZE
            );
            return;
        }
        for field in self.fields_mut() {
            io::read(field, data, offset);
        }
    }

    fn write_to_data(&self, data: &mut [u8], offset: &mut usize) {
        if offset.saturating_add(Self::DATA_SIZE) > data.len() {
            tracing::error!(
                "DataSettings::write_to_data: not enough space, {} available, {} required",
                data.len().saturating_sub(*offset),
                Self::DATA_SIZE
            );
            return;
        }
        io::write_array(&self.fields(), data, offset);
    }
}
