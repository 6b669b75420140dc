//! # Hub Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (key codec, filtered scans)
//! └── src/integration/  # Cross-crate flows over the event bus and IPC
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p hub-tests
//!
//! # Benchmarks
//! cargo bench -p hub-tests
//! ```

pub mod integration;
