//! Periodic drain of the capture device into data events.

use std::sync::Arc;

use crate::models::diagnostics::RecorderDiagnostics;
use crate::models::error::CaptureError;
use crate::models::event::AudioPacket;
use crate::processing::frame_buffer::AudioFrameBuffer;
use crate::traits::capture_driver::{CaptureDevice, CaptureDriver, PeriodListener};
use crate::traits::clock::Clock;

use super::manager::SessionShared;

/// Result of one periodic read.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PeriodOutcome {
    Packet(AudioPacket),
    Empty,
    ReadFailed(CaptureError),
}

/// Read one period into `buffer` and packetize exactly the samples read.
pub(crate) fn drain_period<Dev: CaptureDevice + ?Sized>(
    device: &mut Dev,
    buffer: &mut AudioFrameBuffer,
    clock: &dyn Clock,
) -> PeriodOutcome {
    match buffer.fill_from(device) {
        Ok(0) => PeriodOutcome::Empty,
        Ok(n) => PeriodOutcome::Packet(AudioPacket {
            pcm: buffer.packetize(n),
            samples: n,
            captured_at: clock.now(),
        }),
        Err(err) => PeriodOutcome::ReadFailed(err),
    }
}

fn record(diagnostics: &mut RecorderDiagnostics, outcome: &PeriodOutcome) {
    diagnostics.periods += 1;
    match outcome {
        PeriodOutcome::Packet(packet) => {
            diagnostics.samples_total += packet.samples as u64;
            diagnostics.bytes_emitted += packet.pcm.len() as u64;
        }
        PeriodOutcome::Empty => diagnostics.empty_reads += 1,
        PeriodOutcome::ReadFailed(_) => diagnostics.read_errors += 1,
    }
}

impl<D: CaptureDriver + 'static> SessionShared<D> {
    /// Listener bound to one device generation. Holds only a weak reference,
    /// so a dropped session turns it into a no-op.
    pub(super) fn period_listener(self: &Arc<Self>, generation: u64) -> PeriodListener {
        let session = Arc::downgrade(self);
        Arc::new(move || {
            if let Some(shared) = session.upgrade() {
                shared.on_period(generation);
            }
        })
    }

    pub(super) fn on_period(&self, generation: u64) {
        let outcome = {
            let mut guard = self.inner.lock();
            // Torn down or replaced since this listener was attached.
            if guard.generation != generation {
                return;
            }
            let inner = &mut *guard;
            let (Some(device), Some(buffer)) =
                (inner.device.as_mut(), inner.frame_buffer.as_mut())
            else {
                return;
            };

            let outcome = drain_period(device, buffer, self.clock.as_ref());
            record(&mut inner.diagnostics, &outcome);
            outcome
        };

        match outcome {
            PeriodOutcome::Packet(packet) => self.emitter.emit_data(packet),
            PeriodOutcome::Empty => {}
            PeriodOutcome::ReadFailed(err) => {
                log::warn!("Error reading audio data: {}", err);
                self.emitter.emit_read_error(err.to_string());
            }
        }
    }
}
