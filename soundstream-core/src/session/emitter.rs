use std::sync::Arc;

use crate::models::event::{AudioPacket, PlatformEvent};
use crate::models::state::RecorderState;
use crate::traits::event_sink::EventSink;

/// Pushes status and data events to the transport. Fire-and-forget.
#[derive(Clone)]
pub struct EventEmitter {
    sink: Arc<dyn EventSink>,
}

impl EventEmitter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn emit_status(&self, state: RecorderState) {
        self.sink.send(&PlatformEvent::RecorderStatus(state));
    }

    pub fn emit_data(&self, packet: AudioPacket) {
        self.sink.send(&PlatformEvent::DataPeriod(packet));
    }

    pub fn emit_read_error(&self, message: String) {
        self.sink.send(&PlatformEvent::ReadError(message));
    }
}
