//! Cross-crate integration flows, all over the in-memory transport.

pub mod bus_flows;
pub mod stream_flows;
