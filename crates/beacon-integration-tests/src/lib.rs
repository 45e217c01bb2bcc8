//! Integration test crate for the witness beacon.
//!
//! This crate has no library code; it only contains integration tests
//! that drive witnesses, the scheduler and the ledger end to end.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p beacon-integration-tests
//! ```
