pub mod capture_driver;
pub mod clock;
pub mod event_sink;
pub mod permission_platform;
