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

//! Curtain operations on top of a device session.

use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info};

use crate::bluetooth::{Command, Connector, DeviceSession, Opcode, Reading};
use crate::error::{Error, Result};
use crate::state::DeviceSettings;

/// Accepted light sensor thresholds.
pub const THRESHOLD_RANGE: RangeInclusive<u32> = 0..=5000;

/// Accepted motor speed, in percent.
pub const MOTOR_SPEED_RANGE: RangeInclusive<u32> = 0..=200;

/// Accepted poll interval, in seconds.
pub const POLL_INTERVAL_RANGE: RangeInclusive<u32> = 0..=u16::MAX as u32;

fn check_range(setting: &'static str, value: u32, range: &RangeInclusive<u32>) -> Result<u32> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(Error::OutOfRange {
            setting,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

/// High level control of one curtain.
pub struct CurtainController<C: Connector> {
    session: DeviceSession<C>,
    settings: Arc<DeviceSettings>,
}

impl<C: Connector> CurtainController<C> {
    pub fn new(session: DeviceSession<C>, settings: Arc<DeviceSettings>) -> Self {
        Self { session, settings }
    }

    pub fn session(&self) -> &DeviceSession<C> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession<C> {
        &mut self.session
    }

    pub fn settings(&self) -> &Arc<DeviceSettings> {
        &self.settings
    }

    pub async fn connect(&mut self) -> Result<()> {
        self.session.connect().await
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.session.disconnect().await
    }

    pub async fn open(&mut self) -> Result<()> {
        info!("Opening curtain");
        self.session.send(&Command::new(Opcode::Open)).await
    }

    pub async fn close(&mut self) -> Result<()> {
        info!("Closing curtain");
        self.session.send(&Command::new(Opcode::Close)).await
    }

    pub async fn half(&mut self) -> Result<()> {
        info!("Moving curtain to half position");
        self.session.send(&Command::new(Opcode::Half)).await
    }

    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping curtain");
        self.session.send(&Command::new(Opcode::Stop)).await
    }

    /// Send a query opcode and record the decoded reply, if any.
    async fn query(&mut self, opcode: Opcode) -> Result<Option<Reading>> {
        let Some(line) = self.session.query(&Command::new(opcode)).await? else {
            return Ok(None);
        };

        let reading = self.session.codec().decode(&line);
        match reading {
            Some(reading) => self.settings.apply(reading),
            None => debug!("Reply to {:?} not understood: {}", opcode, line),
        }
        Ok(reading)
    }

    pub async fn query_led(&mut self) -> Result<Option<Reading>> {
        self.query(Opcode::QueryLed).await
    }

    pub async fn query_sensor(&mut self) -> Result<Option<Reading>> {
        self.query(Opcode::QuerySensor).await
    }

    pub async fn query_upper_threshold(&mut self) -> Result<Option<Reading>> {
        self.query(Opcode::QueryUpperThreshold).await
    }

    pub async fn query_lower_threshold(&mut self) -> Result<Option<Reading>> {
        self.query(Opcode::QueryLowerThreshold).await
    }

    pub async fn query_poll_interval(&mut self) -> Result<Option<Reading>> {
        self.query(Opcode::QueryPollInterval).await
    }

    /// Query every parameter in turn. Returns the readings that came back.
    pub async fn refresh(&mut self) -> Result<Vec<Reading>> {
        let mut readings = Vec::new();
        for opcode in [
            Opcode::QueryLed,
            Opcode::QuerySensor,
            Opcode::QueryUpperThreshold,
            Opcode::QueryLowerThreshold,
            Opcode::QueryPollInterval,
        ] {
            if let Some(reading) = self.query(opcode).await? {
                readings.push(reading);
            }
        }
        Ok(readings)
    }

    pub async fn set_upper_threshold(&mut self, value: u32) -> Result<()> {
        let value = check_range("Upper light threshold", value, &THRESHOLD_RANGE)?;
        self.session
            .send(&Command::with_payload(Opcode::SetUpperThreshold, value))
            .await?;
        self.settings.set_upper_threshold(value);
        Ok(())
    }

    pub async fn set_lower_threshold(&mut self, value: u32) -> Result<()> {
        let value = check_range("Lower light threshold", value, &THRESHOLD_RANGE)?;
        self.session
            .send(&Command::with_payload(Opcode::SetLowerThreshold, value))
            .await?;
        self.settings.set_lower_threshold(value);
        Ok(())
    }

    pub async fn set_poll_interval(&mut self, secs: u32) -> Result<()> {
        let secs = check_range("Poll interval", secs, &POLL_INTERVAL_RANGE)?;
        self.session
            .send(&Command::with_payload(Opcode::SetPollInterval, secs))
            .await?;
        self.settings.set_poll_interval(secs);
        Ok(())
    }

    pub async fn set_motor_speed(&mut self, percent: u32) -> Result<()> {
        let percent = check_range("Motor speed", percent, &MOTOR_SPEED_RANGE)?;
        self.session
            .send(&Command::with_payload(Opcode::SetMotorSpeed, percent))
            .await?;
        self.settings.set_motor_speed(percent);
        Ok(())
    }
}
