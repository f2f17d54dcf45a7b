pub mod capture_loop;
pub mod emitter;
pub mod manager;
pub mod permission_gate;
