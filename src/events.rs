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

//! Event processing for unsolicited controller traffic.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::bluetooth::{LineCodec, Reading, SessionEvent};
use crate::state::DeviceSettings;

/// Applies session events to the shared settings.
pub struct EventProcessor {
    codec: LineCodec,
    settings: Arc<DeviceSettings>,
}

impl EventProcessor {
    pub fn new(codec: LineCodec, settings: Arc<DeviceSettings>) -> Self {
        Self { codec, settings }
    }

    /// Process a single event. Returns the reading a line decoded to.
    pub fn process_event(&self, event: SessionEvent) -> Option<Reading> {
        match event {
            SessionEvent::Line(line) => {
                let reading = self.codec.decode(&line);
                match reading {
                    Some(reading) => {
                        debug!("Device reported {:?}", reading);
                        self.settings.apply(reading);
                    }
                    None => debug!("Ignoring line: {}", line),
                }
                reading
            }
            SessionEvent::Connected { device } => {
                info!("Device connected: {}", device);
                None
            }
            SessionEvent::Disconnected => {
                info!("Device disconnected");
                None
            }
            SessionEvent::Error(e) => {
                error!("Connection error: {}", e);
                None
            }
        }
    }

    /// Drain events until the session goes away, forwarding decoded readings.
    pub async fn run(
        self,
        mut event_rx: mpsc::Receiver<SessionEvent>,
        reading_tx: mpsc::Sender<Reading>,
    ) {
        while let Some(event) = event_rx.recv().await {
            if let Some(reading) = self.process_event(event) {
                if reading_tx.send(reading).await.is_err() {
                    break;
                }
            }
        }
        debug!("Event processor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_updates_settings() {
        let settings = DeviceSettings::new();
        let processor = EventProcessor::new(LineCodec::default(), settings.clone());

        let reading = processor.process_event(SessionEvent::Line("adc_value=640".to_string()));
        assert_eq!(reading, Some(Reading::AdcValue(640)));
        assert_eq!(settings.snapshot().light_level, Some(640));
    }

    #[test]
    fn test_unknown_line_is_ignored() {
        let settings = DeviceSettings::new();
        let processor = EventProcessor::new(LineCodec::default(), settings.clone());

        assert_eq!(
            processor.process_event(SessionEvent::Line("boot ok".to_string())),
            None
        );
        assert!(settings.snapshot().updated_at.is_none());
    }

    #[tokio::test]
    async fn test_run_forwards_readings() {
        let settings = DeviceSettings::new();
        let processor = EventProcessor::new(LineCodec::default(), settings.clone());
        let (event_tx, event_rx) = mpsc::channel(8);
        let (reading_tx, mut reading_rx) = mpsc::channel(8);

        let task = tokio::spawn(processor.run(event_rx, reading_tx));
        event_tx
            .send(SessionEvent::Connected {
                device: "SmartCurtain".to_string(),
            })
            .await
            .unwrap();
        event_tx
            .send(SessionEvent::Line("led_state=1".to_string()))
            .await
            .unwrap();
        drop(event_tx);

        assert_eq!(reading_rx.recv().await, Some(Reading::LedState(true)));
        task.await.unwrap();
        assert_eq!(settings.snapshot().led_on, Some(true));
    }
}
