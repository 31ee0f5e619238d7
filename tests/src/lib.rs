//! # Hub Test Suite
//!
//! Unified test crate for flows that cross crate boundaries.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── bus_flows.rs      # Several services on one broker
//!     └── stream_flows.rs   # Producer/consumer supervision end to end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p hub-tests
//!
//! # By category
//! cargo test -p hub-tests integration::bus_flows
//! cargo test -p hub-tests integration::stream_flows
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
