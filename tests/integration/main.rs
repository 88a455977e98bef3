//! Integration test binary: every crate-level flow in one binary.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod helpers;

mod gallery_flow;
mod monitor_flow;
mod scheduler_flow;
mod sign_in_flow;
mod store_persistence;
