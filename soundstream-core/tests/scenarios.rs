//! End-to-end command/event scenarios over the method channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use soundstream_core::{
    decode_pcm16le, CaptureDriver, CaptureError, DeviceSpec, MemoryDevice, MemoryDriver,
    MethodCall, MethodChannel, MethodResponse, PermissionPlatform, PermissionRequest,
    PlatformEvent, RecorderSession, RecorderState,
};

/// Memory driver reporting a 4000-frame minimum buffer at any rate.
#[derive(Clone, Default)]
struct WidePeriodDriver {
    inner: MemoryDriver,
}

impl CaptureDriver for WidePeriodDriver {
    type Device = MemoryDevice;

    fn min_buffer_frames(&self, sample_rate: u32) -> Option<usize> {
        self.inner.min_buffer_frames(sample_rate).map(|_| 4000)
    }

    fn open(&self, spec: DeviceSpec) -> Result<MemoryDevice, CaptureError> {
        self.inner.open(spec)
    }
}

#[derive(Default)]
struct Permissions {
    granted: AtomicBool,
    requests: Mutex<Vec<PermissionRequest>>,
}

impl PermissionPlatform for Permissions {
    fn has_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn has_surface(&self) -> bool {
        true
    }

    fn request(&self, request: PermissionRequest) {
        self.requests.lock().push(request);
    }
}

#[derive(Default)]
struct Transport {
    events: Mutex<Vec<Value>>,
    packets: Mutex<Vec<Vec<u8>>>,
}

impl soundstream_core::EventSink for Transport {
    fn send(&self, event: &PlatformEvent) {
        if let PlatformEvent::DataPeriod(packet) = event {
            self.packets.lock().push(packet.pcm.clone());
        }
        self.events
            .lock()
            .push(serde_json::to_value(event.to_wire()).unwrap());
    }
}

impl Transport {
    fn statuses(&self) -> Vec<Value> {
        self.events
            .lock()
            .iter()
            .filter(|e| e["name"] == "recorderStatus")
            .map(|e| e["data"].clone())
            .collect()
    }
}

struct Host {
    channel: MethodChannel<WidePeriodDriver>,
    driver: WidePeriodDriver,
    permissions: Arc<Permissions>,
    transport: Arc<Transport>,
}

impl Host {
    fn new(granted: bool) -> Self {
        let driver = WidePeriodDriver::default();
        let permissions = Arc::new(Permissions::default());
        permissions.granted.store(granted, Ordering::SeqCst);
        let transport = Arc::new(Transport::default());
        let session = RecorderSession::new(driver.clone(), permissions.clone(), transport.clone());
        Self {
            channel: MethodChannel::new(session),
            driver,
            permissions,
            transport,
        }
    }

    fn call(&self, method: &str, arguments: Value) -> Arc<Mutex<Vec<MethodResponse>>> {
        let replies = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&replies);
        self.channel.handle(
            MethodCall::new(method, arguments),
            Box::new(move |response| sink.lock().push(response)),
        );
        replies
    }

    fn ok(&self, method: &str, arguments: Value) -> Value {
        let replies = self.call(method, arguments);
        let replies = replies.lock();
        match &replies[..] {
            [MethodResponse::Success { value }] => value.clone(),
            other => panic!("{} answered {:?}", method, other),
        }
    }
}

fn init_args() -> Value {
    json!({"sampleRate": 16000, "verboseLogging": false})
}

#[test]
fn scenario_a_initialize_with_permission() {
    let host = Host::new(true);
    let value = host.ok("initializeRecorder", init_args());

    assert_eq!(value, json!({"success": true, "isRecorderInitialized": true}));
    assert_eq!(host.transport.statuses(), vec![json!("Initialized")]);
}

#[test]
fn scenario_b_permission_denied() {
    let host = Host::new(false);
    let replies = host.call("initializeRecorder", init_args());
    assert!(replies.lock().is_empty());

    let request = host.permissions.requests.lock().remove(0);
    std::thread::spawn(move || request.resolve(false))
        .join()
        .unwrap();

    assert_eq!(
        *replies.lock(),
        vec![MethodResponse::Success {
            value: json!({"success": false, "isRecorderInitialized": false})
        }]
    );
    assert!(host.transport.statuses().is_empty());
}

#[test]
fn scenario_c_start_recording() {
    let host = Host::new(true);
    host.ok("initializeRecorder", init_args());

    assert_eq!(host.ok("startRecording", Value::Null), json!(true));
    assert_eq!(
        host.transport.statuses(),
        vec![json!("Initialized"), json!("Playing")]
    );
    assert_eq!(host.channel.session().state(), RecorderState::Playing);
}

#[test]
fn scenario_d_period_of_4000_samples() {
    let host = Host::new(true);
    host.ok("initializeRecorder", init_args());
    host.ok("startRecording", Value::Null);

    let samples: Vec<i16> = (0..4000).map(|i| (i * 7 % 30000) as i16 - 15000).collect();
    assert_eq!(host.driver.inner.feed(&samples), 4000);

    let packets = host.transport.packets.lock();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].len(), 8000);
    assert_eq!(decode_pcm16le(&packets[0]), samples);
}

#[test]
fn scenario_e_stop_twice() {
    let host = Host::new(true);
    host.ok("initializeRecorder", init_args());
    host.ok("startRecording", Value::Null);

    assert_eq!(host.ok("stopRecording", Value::Null), json!(true));
    assert_eq!(host.ok("stopRecording", Value::Null), json!(true));
    assert_eq!(
        host.transport.statuses(),
        vec![json!("Initialized"), json!("Playing"), json!("Stopped")]
    );
}

#[test]
fn nothing_is_captured_after_teardown() {
    let host = Host::new(true);
    host.ok("initializeRecorder", init_args());
    host.ok("startRecording", Value::Null);

    host.channel.session().teardown();

    assert_eq!(host.driver.inner.feed(&[1; 4000]), 0);
    assert!(host.transport.packets.lock().is_empty());
    assert!(!host.driver.inner.has_active_device());
    assert_eq!(
        host.transport.statuses(),
        vec![json!("Initialized"), json!("Playing"), json!("Stopped")]
    );
    assert_eq!(
        host.channel.session().state(),
        RecorderState::Stopped
    );
}
