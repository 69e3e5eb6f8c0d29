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

//! Bluetooth communication module.
//!
//! Bonded device lookup, the RFCOMM serial link and the curtain line
//! protocol spoken over it.

pub mod directory;
pub mod protocol;
pub mod session;
pub mod transport;

pub use directory::{find_device, BluezDirectory, BondedDevice, DeviceDirectory, SPP_UUID};
pub use protocol::{Command, LineCodec, Opcode, Reading, ReadingKey};
pub use session::{DeviceSession, SessionEvent, SessionState, DEFAULT_RESPONSE_TIMEOUT};
pub use transport::{Connector, RfcommConnector, DEFAULT_RFCOMM_CHANNEL};
