use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::config::RecorderConfig;
use crate::models::error::RecorderError;
use crate::session::manager::RecorderSession;
use crate::traits::capture_driver::CaptureDriver;

pub const HAS_PERMISSION: &str = "hasPermission";
pub const INITIALIZE_RECORDER: &str = "initializeRecorder";
pub const START_RECORDING: &str = "startRecording";
pub const STOP_RECORDING: &str = "stopRecording";

/// An incoming command.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// Reply to a `MethodCall`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MethodResponse {
    Success {
        value: Value,
    },
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },
    NotImplemented,
}

impl MethodResponse {
    fn from_error(err: &RecorderError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
            details: None,
        }
    }
}

/// Transport callback receiving the single reply for one call.
pub type Responder = Box<dyn FnOnce(MethodResponse) + Send + 'static>;

/// Shared reply slot: the first `send` wins, later ones are dropped.
#[derive(Clone)]
struct Reply {
    method: Arc<str>,
    slot: Arc<Mutex<Option<Responder>>>,
}

impl Reply {
    fn new(method: &str, responder: Responder) -> Self {
        Self {
            method: Arc::from(method),
            slot: Arc::new(Mutex::new(Some(responder))),
        }
    }

    fn send(&self, response: MethodResponse) -> bool {
        let responder = self.slot.lock().take();
        match responder {
            Some(responder) => {
                responder(response);
                true
            }
            None => {
                log::warn!("Dropping extra reply to {}: {:?}", self.method, response);
                false
            }
        }
    }

    fn success(&self, value: impl Into<Value>) {
        self.send(MethodResponse::Success {
            value: value.into(),
        });
    }

    fn error(&self, err: &RecorderError) {
        self.send(MethodResponse::from_error(err));
    }

    fn unit(&self, result: Result<(), RecorderError>) {
        match result {
            Ok(()) => self.success(true),
            Err(err) => self.error(&err),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Routes method-channel commands to a `RecorderSession`.
///
/// Every call is answered exactly once. A panic while handling a call is
/// answered as an `Unknown` error carrying the message and a backtrace.
pub struct MethodChannel<D: CaptureDriver + 'static> {
    session: RecorderSession<D>,
}

impl<D: CaptureDriver + 'static> MethodChannel<D> {
    pub fn new(session: RecorderSession<D>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &RecorderSession<D> {
        &self.session
    }

    pub fn handle(&self, call: MethodCall, responder: Responder) {
        let reply = Reply::new(&call.method, responder);
        let handled = panic::catch_unwind(AssertUnwindSafe(|| self.dispatch(&call, &reply)));

        if let Err(payload) = handled {
            let message = panic_message(payload.as_ref());
            log::error!("Unexpected panic handling {}: {}", call.method, message);
            let trace = Backtrace::force_capture().to_string();
            reply.send(MethodResponse::Error {
                code: RecorderError::Unknown(String::new()).code().to_string(),
                message: format!("Unexpected error: {}", message),
                details: Some(Value::from(trace)),
            });
        }
    }

    fn dispatch(&self, call: &MethodCall, reply: &Reply) {
        match call.method.as_str() {
            HAS_PERMISSION => reply.success(self.session.has_permission()),
            INITIALIZE_RECORDER => self.initialize(&call.arguments, reply),
            START_RECORDING => reply.unit(self.session.start()),
            STOP_RECORDING => reply.unit(self.session.stop()),
            other => {
                log::debug!("Method not implemented: {}", other);
                reply.send(MethodResponse::NotImplemented);
            }
        }
    }

    fn initialize(&self, arguments: &Value, reply: &Reply) {
        let config = if arguments.is_null() {
            RecorderConfig::default()
        } else {
            match RecorderConfig::deserialize(arguments) {
                Ok(config) => config,
                Err(e) => {
                    reply.error(&RecorderError::Unknown(format!("invalid arguments: {}", e)));
                    return;
                }
            }
        };

        let reply = reply.clone();
        self.session.initialize(
            config,
            Box::new(move |result| match result {
                Ok(outcome) => reply.success(outcome.to_value()),
                Err(err) => reply.error(&err),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::json;

    use crate::drivers::memory::MemoryDriver;
    use crate::models::event::PlatformEvent;
    use crate::session::permission_gate::PermissionRequest;
    use crate::traits::event_sink::EventSink;
    use crate::traits::permission_platform::PermissionPlatform;

    struct StaticPermissions {
        granted: AtomicBool,
        pending: Mutex<Option<PermissionRequest>>,
    }

    impl PermissionPlatform for StaticPermissions {
        fn has_permission(&self) -> bool {
            self.granted.load(Ordering::SeqCst)
        }
        fn has_surface(&self) -> bool {
            true
        }
        fn request(&self, request: PermissionRequest) {
            *self.pending.lock() = Some(request);
        }
    }

    /// Sink that panics on data events, to exercise the fault boundary.
    #[derive(Default)]
    struct PanickyStatusSink {
        armed: AtomicBool,
    }

    impl EventSink for PanickyStatusSink {
        fn send(&self, event: &PlatformEvent) {
            if self.armed.load(Ordering::SeqCst) {
                panic!("transport exploded on {}", event.name());
            }
        }
    }

    struct Fixture {
        channel: MethodChannel<MemoryDriver>,
        permissions: Arc<StaticPermissions>,
        sink: Arc<PanickyStatusSink>,
    }

    fn fixture(granted: bool) -> Fixture {
        let permissions = Arc::new(StaticPermissions {
            granted: AtomicBool::new(granted),
            pending: Mutex::new(None),
        });
        let sink = Arc::new(PanickyStatusSink::default());
        let session = RecorderSession::new(MemoryDriver::new(), permissions.clone(), sink.clone());
        Fixture {
            channel: MethodChannel::new(session),
            permissions,
            sink,
        }
    }

    fn call(channel: &MethodChannel<MemoryDriver>, method: &str, args: Value) -> Vec<MethodResponse> {
        let replies = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&replies);
        channel.handle(
            MethodCall::new(method, args),
            Box::new(move |response| sink.lock().push(response)),
        );
        let out = replies.lock().clone();
        out
    }

    fn success(value: Value) -> Vec<MethodResponse> {
        vec![MethodResponse::Success { value }]
    }

    #[test]
    fn has_permission_reports_platform_state() {
        let f = fixture(false);
        assert_eq!(call(&f.channel, HAS_PERMISSION, Value::Null), success(json!(false)));
        f.permissions.granted.store(true, Ordering::SeqCst);
        assert_eq!(call(&f.channel, HAS_PERMISSION, Value::Null), success(json!(true)));
    }

    #[test]
    fn unknown_method_is_not_implemented() {
        let f = fixture(true);
        assert_eq!(
            call(&f.channel, "startPlayer", Value::Null),
            vec![MethodResponse::NotImplemented]
        );
    }

    #[test]
    fn initialize_replies_with_outcome() {
        let f = fixture(true);
        let replies = call(
            &f.channel,
            INITIALIZE_RECORDER,
            json!({"sampleRate": 16000, "verboseLogging": false}),
        );
        assert_eq!(
            replies,
            success(json!({"success": true, "isRecorderInitialized": true}))
        );
    }

    #[test]
    fn initialize_without_arguments_uses_defaults() {
        let f = fixture(true);
        call(&f.channel, INITIALIZE_RECORDER, Value::Null);
        assert_eq!(
            f.channel.session().config(),
            Some(RecorderConfig::default())
        );
    }

    #[test]
    fn initialize_reply_arrives_after_permission() {
        let f = fixture(false);
        let replies = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&replies);
        f.channel.handle(
            MethodCall::new(INITIALIZE_RECORDER, json!({"sampleRate": 16000})),
            Box::new(move |response| sink.lock().push(response)),
        );
        assert!(replies.lock().is_empty());

        let request = f.permissions.pending.lock().take().unwrap();
        request.resolve(false);
        assert_eq!(
            *replies.lock(),
            success(json!({"success": false, "isRecorderInitialized": false}))
        );
    }

    #[test]
    fn errors_carry_symbolic_codes() {
        let f = fixture(true);
        let replies = call(&f.channel, START_RECORDING, Value::Null);
        assert!(matches!(
            &replies[..],
            [MethodResponse::Error { code, .. }] if code == "RecorderNotInitialized"
        ));

        let replies = call(&f.channel, INITIALIZE_RECORDER, json!({"sampleRate": 1234}));
        assert!(matches!(
            &replies[..],
            [MethodResponse::Error { code, .. }] if code == "InvalidSampleRate"
        ));

        let replies = call(&f.channel, INITIALIZE_RECORDER, json!({"sampleRate": "fast"}));
        assert!(matches!(
            &replies[..],
            [MethodResponse::Error { code, .. }] if code == "Unknown"
        ));
    }

    #[test]
    fn stop_without_device_succeeds() {
        let f = fixture(true);
        assert_eq!(call(&f.channel, STOP_RECORDING, Value::Null), success(json!(true)));
    }

    #[test]
    fn panic_becomes_unknown_error_with_trace() {
        let f = fixture(true);
        call(&f.channel, INITIALIZE_RECORDER, json!({"sampleRate": 16000}));
        f.sink.armed.store(true, Ordering::SeqCst);

        let replies = call(&f.channel, START_RECORDING, Value::Null);
        match &replies[..] {
            [MethodResponse::Error {
                code,
                message,
                details,
            }] => {
                assert_eq!(code, "Unknown");
                assert!(message.contains("transport exploded"));
                assert!(details.is_some());
            }
            other => panic!("unexpected replies: {:?}", other),
        }

        // The session is still usable afterwards.
        f.sink.armed.store(false, Ordering::SeqCst);
        assert_eq!(call(&f.channel, STOP_RECORDING, Value::Null), success(json!(true)));
    }

    #[test]
    fn reply_is_sent_once() {
        let replies = Arc::new(Mutex::new(0));
        let count = Arc::clone(&replies);
        let reply = Reply::new("x", Box::new(move |_| *count.lock() += 1));

        assert!(reply.send(MethodResponse::NotImplemented));
        assert!(!reply.clone().send(MethodResponse::NotImplemented));
        assert_eq!(*replies.lock(), 1);
    }

    #[test]
    fn response_serializes_with_status_tag() {
        let json = serde_json::to_value(MethodResponse::Error {
            code: "FailedToStop".into(),
            message: "failed to stop recording: x".into(),
            details: None,
        })
        .unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "FailedToStop");
    }
}
