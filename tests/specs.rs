//! Behavioral specifications for the hbd binary.
//!
//! These tests are black-box: they run the binary with a config file and
//! stdin, then verify stdout, stderr, and exit codes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/errors.rs"]
mod cli_errors;

// stream/
#[path = "specs/stream/echo.rs"]
mod stream_echo;
#[path = "specs/stream/history.rs"]
mod stream_history;
