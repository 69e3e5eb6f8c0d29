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

//! Serial link transports.

use bluer::rfcomm::{SocketAddr, Stream};
use std::future::Future;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use super::directory::BondedDevice;
use crate::error::Result;

/// RFCOMM channel used by SPP serial modules.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Opens a duplex byte stream to a device.
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn connect(&self, device: &BondedDevice) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// Connects over a Bluetooth classic RFCOMM socket.
#[derive(Debug, Clone)]
pub struct RfcommConnector {
    channel: u8,
}

impl RfcommConnector {
    pub fn new(channel: u8) -> Self {
        Self { channel }
    }
}

impl Connector for RfcommConnector {
    type Stream = Stream;

    async fn connect(&self, device: &BondedDevice) -> Result<Stream> {
        info!(
            "Opening RFCOMM link to {} ({}) on channel {}",
            device.name, device.address, self.channel
        );
        let stream = Stream::connect(SocketAddr::new(device.address, self.channel)).await?;
        Ok(stream)
    }
}
