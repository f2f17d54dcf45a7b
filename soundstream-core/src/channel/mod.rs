pub mod method_channel;
