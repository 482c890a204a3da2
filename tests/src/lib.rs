//! # Glucose-Check Test Suite
//!
//! Unified test crate for flows that span the coordinator, its collaborators
//! and telemetry.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs   # Wired coordinator over in-memory collaborators
//!     ├── flows.rs      # Validation, submit -> check, failures, status
//!     └── races.rs      # Environment switches and concurrent callers
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p gc-tests
//! cargo test -p gc-tests integration::races::
//! ```

pub mod integration;
