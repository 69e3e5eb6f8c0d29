// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Last known controller parameters.

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::bluetooth::Reading;

/// Copy of the known parameters. `None` means never reported.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettingsSnapshot {
    pub led_on: Option<bool>,
    pub light_level: Option<u32>,
    pub upper_threshold: Option<u32>,
    pub lower_threshold: Option<u32>,
    pub poll_interval_secs: Option<u32>,
    pub motor_speed: Option<u32>,
    pub updated_at: Option<DateTime<Local>>,
}

/// Shared volatile parameter store. Nothing is persisted.
#[derive(Debug, Default)]
pub struct DeviceSettings {
    inner: RwLock<SettingsSnapshot>,
}

impl DeviceSettings {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record a value reported by the controller.
    pub fn apply(&self, reading: Reading) {
        let mut inner = self.inner.write();
        match reading {
            Reading::LedState(on) => inner.led_on = Some(on),
            Reading::AdcValue(v) => inner.light_level = Some(v),
            Reading::UpperThreshold(v) => inner.upper_threshold = Some(v),
            Reading::LowerThreshold(v) => inner.lower_threshold = Some(v),
            Reading::PollInterval(v) => inner.poll_interval_secs = Some(v),
        }
        inner.updated_at = Some(Local::now());
    }

    pub fn set_upper_threshold(&self, value: u32) {
        self.apply(Reading::UpperThreshold(value));
    }

    pub fn set_lower_threshold(&self, value: u32) {
        self.apply(Reading::LowerThreshold(value));
    }

    pub fn set_poll_interval(&self, secs: u32) {
        self.apply(Reading::PollInterval(secs));
    }

    /// The controller never reports motor speed, so only writes land here.
    pub fn set_motor_speed(&self, percent: u32) {
        let mut inner = self.inner.write();
        inner.motor_speed = Some(percent);
        inner.updated_at = Some(Local::now());
    }

    pub fn snapshot(&self) -> SettingsSnapshot {
        self.inner.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_readings() {
        let settings = DeviceSettings::new();
        assert_eq!(settings.snapshot(), SettingsSnapshot::default());

        settings.apply(Reading::LedState(true));
        settings.apply(Reading::AdcValue(812));
        settings.apply(Reading::UpperThreshold(3000));
        settings.apply(Reading::LowerThreshold(200));
        settings.apply(Reading::PollInterval(10));
        settings.set_motor_speed(120);

        let snapshot = settings.snapshot();
        assert_eq!(snapshot.led_on, Some(true));
        assert_eq!(snapshot.light_level, Some(812));
        assert_eq!(snapshot.upper_threshold, Some(3000));
        assert_eq!(snapshot.lower_threshold, Some(200));
        assert_eq!(snapshot.poll_interval_secs, Some(10));
        assert_eq!(snapshot.motor_speed, Some(120));
        assert!(snapshot.updated_at.is_some());
    }

    #[test]
    fn test_latest_value_wins() {
        let settings = DeviceSettings::new();
        settings.apply(Reading::AdcValue(1));
        settings.apply(Reading::AdcValue(2));
        assert_eq!(settings.snapshot().light_level, Some(2));
    }
}
