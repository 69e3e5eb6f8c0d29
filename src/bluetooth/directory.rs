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

//! Lookup of bonded Bluetooth devices.

use bluer::Address;
use std::future::Future;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// A Bluetooth peer paired at the OS level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondedDevice {
    pub name: String,
    pub address: Address,
    /// Whether the device advertises the serial port profile.
    pub serial_port: bool,
}

/// Source of bonded devices.
pub trait DeviceDirectory: Send + Sync {
    /// List every bonded device.
    fn bonded_devices(&self) -> impl Future<Output = Result<Vec<BondedDevice>>> + Send;
}

/// Find the bonded device whose name matches exactly.
pub async fn find_device<D: DeviceDirectory>(directory: &D, name: &str) -> Result<BondedDevice> {
    let devices = directory.bonded_devices().await?;
    debug!("{} bonded devices", devices.len());

    devices
        .into_iter()
        .find(|d| d.name == name)
        .ok_or_else(|| Error::DeviceNotFound {
            name: name.to_string(),
        })
}

/// Bonded devices known to the local BlueZ adapter.
pub struct BluezDirectory {
    _session: bluer::Session,
    adapter: bluer::Adapter,
}

impl BluezDirectory {
    /// Open a BlueZ session on the default adapter.
    pub async fn new() -> Result<Self> {
        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        Ok(Self {
            _session: session,
            adapter,
        })
    }
}

impl DeviceDirectory for BluezDirectory {
    async fn bonded_devices(&self) -> Result<Vec<BondedDevice>> {
        let mut devices = Vec::new();

        for addr in self.adapter.device_addresses().await? {
            let device = self.adapter.device(addr)?;
            if !device.is_paired().await? {
                continue;
            }

            let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
            let serial_port = device
                .uuids()
                .await?
                .map(|uuids| uuids.contains(&SPP_UUID))
                .unwrap_or(false);

            devices.push(BondedDevice {
                name,
                address: addr,
                serial_port,
            });
        }

        Ok(devices)
    }
}
