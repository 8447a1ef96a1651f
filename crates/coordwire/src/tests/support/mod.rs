//! Shared fixtures for the connection test suites.

mod fake_server;
mod store;

pub(crate) use fake_server::{FakeServer, Mode, Script};
