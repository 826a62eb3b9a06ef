//! Common test infrastructure
//!
//! Everything the end-to-end tests need: an isolated server per test, a thin
//! HTTP client, fixture data, and shared constants. Tests should only import
//! from this module, not from internal submodules.

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use client::{json_body, violated_fields, TestClient};
#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::SEED_MOVIES;
pub use server::TestServer;
