pub mod client;
pub mod counter;
pub mod overflow;
pub mod status_sink;
