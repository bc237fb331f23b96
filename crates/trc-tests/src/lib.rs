//! Integration test suite for the TRC wallet.
//!
//! End-to-end command scenarios against saved wallet files, storage failure
//! injection, and property tests over key derivation, the address pool and
//! message encryption.

pub mod helpers;
