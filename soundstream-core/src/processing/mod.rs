pub mod frame_buffer;
pub mod pcm;
pub mod ring_buffer;
