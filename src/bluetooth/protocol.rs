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

//! Curtain controller line protocol.
//!
//! Outgoing frames are ASCII hex: a one-byte opcode followed by an optional
//! big-endian integer payload of fixed width. Incoming traffic is text lines
//! of the form `key=value`.

use tracing::debug;

use crate::error::{Error, Result};

/// Payload width used by the controller firmware.
pub const DEFAULT_PAYLOAD_WIDTH: usize = 2;

/// Line delimiter used by the controller firmware.
pub const DEFAULT_DELIMITER: u8 = b'\n';

const MAX_PAYLOAD_WIDTH: usize = 8;

/// Command opcodes understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Open,
    Close,
    Half,
    Stop,
    QueryLed,
    QuerySensor,
    QueryUpperThreshold,
    QueryLowerThreshold,
    QueryPollInterval,
    SetUpperThreshold,
    SetLowerThreshold,
    SetPollInterval,
    SetMotorSpeed,
}

impl Opcode {
    /// Wire value of the opcode.
    pub fn code(&self) -> u8 {
        match self {
            Self::Open => 0x01,
            Self::Close => 0x02,
            Self::Half => 0x03,
            Self::Stop => 0x04,
            Self::QueryLed => 0x11,
            Self::QuerySensor => 0x12,
            Self::QueryUpperThreshold => 0x13,
            Self::QueryLowerThreshold => 0x14,
            Self::QueryPollInterval => 0x15,
            Self::SetUpperThreshold => 0x21,
            Self::SetLowerThreshold => 0x22,
            Self::SetPollInterval => 0x25,
            Self::SetMotorSpeed => 0x26,
        }
    }

    /// Look up an opcode by its wire value.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Open),
            0x02 => Some(Self::Close),
            0x03 => Some(Self::Half),
            0x04 => Some(Self::Stop),
            0x11 => Some(Self::QueryLed),
            0x12 => Some(Self::QuerySensor),
            0x13 => Some(Self::QueryUpperThreshold),
            0x14 => Some(Self::QueryLowerThreshold),
            0x15 => Some(Self::QueryPollInterval),
            0x21 => Some(Self::SetUpperThreshold),
            0x22 => Some(Self::SetLowerThreshold),
            0x25 => Some(Self::SetPollInterval),
            0x26 => Some(Self::SetMotorSpeed),
            _ => None,
        }
    }
}

/// A single command sent to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub opcode: Opcode,
    pub payload: Option<u32>,
}

impl Command {
    /// Create a command without payload.
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            payload: None,
        }
    }

    /// Create a command carrying an integer payload.
    pub fn with_payload(opcode: Opcode, value: u32) -> Self {
        Self {
            opcode,
            payload: Some(value),
        }
    }
}

/// Keys reported by the controller, spelled as the firmware sends them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingKey {
    LedState,
    AdcValue,
    UpperThreshold,
    LowerThreshold,
    PollInterval,
}

impl ReadingKey {
    pub const ALL: [ReadingKey; 5] = [
        Self::LedState,
        Self::AdcValue,
        Self::UpperThreshold,
        Self::LowerThreshold,
        Self::PollInterval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LedState => "led_state=",
            Self::AdcValue => "adc_value=",
            Self::UpperThreshold => "light_thresold_upper=",
            Self::LowerThreshold => "light_thresold_lower=",
            Self::PollInterval => "LIGHT_interval_secs=",
        }
    }
}

/// A decoded inbound line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    LedState(bool),
    AdcValue(u32),
    UpperThreshold(u32),
    LowerThreshold(u32),
    PollInterval(u32),
}

impl Reading {
    fn new(key: ReadingKey, value: u32) -> Self {
        match key {
            ReadingKey::LedState => Self::LedState(value != 0),
            ReadingKey::AdcValue => Self::AdcValue(value),
            ReadingKey::UpperThreshold => Self::UpperThreshold(value),
            ReadingKey::LowerThreshold => Self::LowerThreshold(value),
            ReadingKey::PollInterval => Self::PollInterval(value),
        }
    }
}

/// Encoder/decoder for the controller's line protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCodec {
    payload_width: usize,
    delimiter: u8,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self {
            payload_width: DEFAULT_PAYLOAD_WIDTH,
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl LineCodec {
    /// Create a codec with the given payload width in bytes.
    pub fn new(payload_width: usize, delimiter: u8) -> Result<Self> {
        if payload_width == 0 || payload_width > MAX_PAYLOAD_WIDTH {
            return Err(Error::InvalidPayloadWidth(payload_width));
        }
        Ok(Self {
            payload_width,
            delimiter,
        })
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Encode a command as an ASCII hex frame.
    ///
    /// Payloads wider than the configured width keep only their low-order
    /// bytes; narrower ones are zero-padded.
    pub fn encode(&self, command: &Command) -> String {
        let mut frame = hex::encode([command.opcode.code()]);

        if let Some(value) = command.payload {
            let bytes = u64::from(value).to_be_bytes();
            frame.push_str(&hex::encode(&bytes[bytes.len() - self.payload_width..]));
        }

        frame
    }

    /// Decode one inbound line.
    ///
    /// The key appearing earliest in the line wins. Returns `None` for lines
    /// without a known key or without digits after the key.
    pub fn decode(&self, line: &str) -> Option<Reading> {
        let (pos, key) = ReadingKey::ALL
            .iter()
            .filter_map(|key| line.find(key.as_str()).map(|pos| (pos, *key)))
            .min_by_key(|(pos, _)| *pos)?;
        let rest = &line[pos + key.as_str().len()..];

        let digits: String = rest
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit())
            .collect();

        match digits.parse::<u32>() {
            Ok(value) => Some(Reading::new(key, value)),
            Err(e) => {
                debug!("Ignoring malformed line {:?}: {}", line, e);
                None
            }
        }
    }
}
