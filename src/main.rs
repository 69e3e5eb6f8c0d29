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

//! Curtain Remote command line client

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use curtain_remote::bluetooth::{
    find_device, BluezDirectory, DeviceDirectory, DeviceSession, Reading, RfcommConnector,
};
use curtain_remote::config::Config;
use curtain_remote::controller::CurtainController;
use curtain_remote::events::EventProcessor;
use curtain_remote::state::DeviceSettings;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Config file to use instead of the default location.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bonded device name, overriding the config file.
    #[arg(long)]
    device: Option<String>,

    /// Log wire traffic.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List bonded Bluetooth devices.
    Devices,
    /// Open the curtain.
    Open,
    /// Close the curtain.
    Close,
    /// Move the curtain to half position.
    Half,
    /// Stop the motor.
    Stop,
    /// Query every parameter and print it.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Change a parameter.
    Set {
        #[command(subcommand)]
        setting: Setting,
    },
    /// Poll the light sensor and print device reports until Ctrl-C.
    Monitor,
}

#[derive(Subcommand, Debug)]
enum Setting {
    /// Upper light threshold (0-5000).
    Upper { value: u32 },
    /// Lower light threshold (0-5000).
    Lower { value: u32 },
    /// Sensor poll interval in seconds.
    Interval { secs: u32 },
    /// Motor speed in percent (0-200).
    Speed { percent: u32 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("curtain_remote={}", default_level).into()),
        )
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(device) = cli.device {
        config.bluetooth.device_name = device;
    }
    info!("Configuration loaded");

    let directory = BluezDirectory::new().await?;

    if let Commands::Devices = cli.command {
        for device in directory.bonded_devices().await? {
            let marker = if device.serial_port { "serial" } else { "" };
            println!("{}  {}  {}", device.address, device.name, marker);
        }
        return Ok(());
    }

    let device = find_device(&directory, &config.bluetooth.device_name).await?;
    let session = DeviceSession::new(
        RfcommConnector::new(config.bluetooth.rfcomm_channel),
        device,
        config.protocol.codec()?,
        config.protocol.response_timeout(),
    );
    let settings = DeviceSettings::new();
    let mut controller = CurtainController::new(session, settings.clone());

    controller.connect().await?;
    let result = run_command(&mut controller, cli.command, &config).await;
    if let Err(e) = controller.disconnect().await {
        warn!("Error while disconnecting: {}", e);
    }
    result
}

async fn run_command(
    controller: &mut CurtainController<RfcommConnector>,
    command: Commands,
    config: &Config,
) -> Result<()> {
    match command {
        Commands::Devices => {}
        Commands::Open => controller.open().await?,
        Commands::Close => controller.close().await?,
        Commands::Half => controller.half().await?,
        Commands::Stop => controller.stop().await?,
        Commands::Status { json } => {
            let readings = controller.refresh().await?;
            if readings.len() < 5 {
                warn!("{} of 5 parameters reported", readings.len());
            }
            let snapshot = controller.settings().snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                let led = snapshot.led_on.map(|on| if on { "on" } else { "off" });
                let interval = snapshot.poll_interval_secs.map(|s| format!("{}s", s));
                println!("Connection:      {}", controller.session().state().as_str());
                println!("LED:             {}", show(led));
                println!("Light level:     {}", show(snapshot.light_level));
                println!("Upper threshold: {}", show(snapshot.upper_threshold));
                println!("Lower threshold: {}", show(snapshot.lower_threshold));
                println!("Poll interval:   {}", show(interval));
            }
        }
        Commands::Set { setting } => match setting {
            Setting::Upper { value } => controller.set_upper_threshold(value).await?,
            Setting::Lower { value } => controller.set_lower_threshold(value).await?,
            Setting::Interval { secs } => controller.set_poll_interval(secs).await?,
            Setting::Speed { percent } => controller.set_motor_speed(percent).await?,
        },
        Commands::Monitor => monitor(controller, config).await?,
    }
    Ok(())
}

fn show<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// Poll the light sensor and print unsolicited reports until interrupted.
async fn monitor(
    controller: &mut CurtainController<RfcommConnector>,
    config: &Config,
) -> Result<()> {
    let Some(event_rx) = controller.session_mut().take_event_receiver() else {
        anyhow::bail!("Session events already taken");
    };
    let (reading_tx, mut reading_rx) = mpsc::channel::<Reading>(32);
    let processor = EventProcessor::new(
        *controller.session().codec(),
        controller.settings().clone(),
    );
    tokio::spawn(processor.run(event_rx, reading_tx));

    let poll = Duration::from_secs(config.monitor.poll_interval_secs.max(1));
    let mut ticker = tokio::time::interval(poll);
    info!(
        "Monitoring {}. Press Ctrl-C to stop.",
        controller.session().device().name
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if !controller.session().is_connected() {
                    error!("Link lost");
                    break;
                }
                match controller.query_sensor().await? {
                    Some(Reading::AdcValue(level)) => println!("light level {}", level),
                    Some(other) => println!("{:?}", other),
                    None => warn!("No reply to sensor poll"),
                }
            }
            Some(reading) = reading_rx.recv() => {
                println!("{:?}", reading);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}
