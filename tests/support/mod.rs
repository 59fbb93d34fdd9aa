//! Shared utilities for integration tests.

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

pub mod ranged_server;
pub mod scripted;
pub mod socket_guard;

/// Deterministic test payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
