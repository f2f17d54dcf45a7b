use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::state::RecorderState;

/// Event name for state transitions.
pub const RECORDER_STATUS_EVENT: &str = "recorderStatus";
/// Event name for captured audio.
pub const DATA_PERIOD_EVENT: &str = "dataPeriod";
/// Event name for failed periodic reads.
pub const READ_ERROR_EVENT: &str = "readError";

/// One packetized chunk of captured audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPacket {
    /// Little-endian PCM16 mono, exactly `2 * samples` bytes.
    pub pcm: Vec<u8>,
    pub samples: usize,
    pub captured_at: DateTime<Utc>,
}

/// Unsolicited events pushed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    RecorderStatus(RecorderState),
    DataPeriod(AudioPacket),
    ReadError(String),
}

/// Wire form of a `PlatformEvent`: `{name, data}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireEvent {
    pub name: &'static str,
    pub data: Value,
}

impl PlatformEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RecorderStatus(_) => RECORDER_STATUS_EVENT,
            Self::DataPeriod(_) => DATA_PERIOD_EVENT,
            Self::ReadError(_) => READ_ERROR_EVENT,
        }
    }

    pub fn to_wire(&self) -> WireEvent {
        let data = match self {
            Self::RecorderStatus(state) => Value::from(state.name()),
            Self::DataPeriod(packet) => Value::from(packet.pcm.clone()),
            Self::ReadError(message) => Value::from(message.as_str()),
        };
        WireEvent {
            name: self.name(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_form() {
        let wire = PlatformEvent::RecorderStatus(RecorderState::Initialized).to_wire();
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json, serde_json::json!({"name": "recorderStatus", "data": "Initialized"}));
    }

    #[test]
    fn data_wire_form_carries_raw_bytes() {
        let packet = AudioPacket {
            pcm: vec![0x01, 0x00, 0xff, 0x7f],
            samples: 2,
            captured_at: Utc::now(),
        };
        let wire = PlatformEvent::DataPeriod(packet).to_wire();
        assert_eq!(wire.name, "dataPeriod");
        assert_eq!(wire.data, serde_json::json!([1, 0, 255, 127]));
    }
}
