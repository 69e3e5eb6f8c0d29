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

//! Error types for device lookup, sessions and the line protocol.

use std::io;
use thiserror::Error;

/// Errors returned by the curtain client library.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No bonded Bluetooth device named '{name}'")]
    DeviceNotFound { name: String },

    #[error("Not connected to the curtain controller")]
    NotConnected,

    #[error("A data subscription is already active for this session")]
    SubscriptionActive,

    #[error("Payload width must be between 1 and 8 bytes, got {0}")]
    InvalidPayloadWidth(usize),

    #[error("{setting} must be between {min} and {max}, got {value}")]
    OutOfRange {
        setting: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },

    #[error("Bluetooth error (bluer): {source}")]
    Bluetooth {
        #[from]
        source: bluer::Error,
    },

    #[error("Failed to read/write the serial link: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
