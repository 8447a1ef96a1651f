//! Test suites for the connection multiplexer.

mod support;
