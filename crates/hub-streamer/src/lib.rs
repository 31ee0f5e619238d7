//! # Hub Streamer - Supervised Event Streams
//!
//! A [`Producer`] broadcasts events on a unique stream subject; a
//! [`Consumer`] listens on it and buffers what it receives. The two supervise
//! each other through ordinary request/response on a unique heartbeat subject:
//!
//! ```text
//!  Producer                                        Consumer
//!  ────────                                        ────────
//!  send(e) ───────── S.STREAM.<id>.REQ ──────────► listen ─► ring buffer ─► next()
//!  ack     ◄──────── S.HEARTBEAT.<id>.REQ ──────── request every interval / 3
//!
//!  no probe within interval ⇒ producer closes
//!  probe request fails      ⇒ consumer closes
//! ```
//!
//! The consumer buffer is bounded. When full, the oldest buffered event is
//! evicted to admit the newest.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod consumer;
pub mod error;
pub mod info;
pub mod producer;
pub mod ring;

use std::time::Duration;

pub use config::StreamConfig;
pub use consumer::Consumer;
pub use error::StreamError;
pub use info::StreamInfo;
pub use producer::Producer;
pub use ring::RingBuffer;

/// Default number of events a consumer keeps buffered.
pub const DEFAULT_BUFFER_CAPACITY: usize = 50;

/// Default time a producer waits for a heartbeat probe.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(6);

/// Shortest accepted heartbeat interval. Consumers probe at a third of it.
pub const MIN_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(3);
