//! Helpers for testing the Hive client.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output is
//!    captured by the test runner. All logs emitted with [`hive_log`] will show up for test
//!    failures or when run with `--nocapture`.
//!  - To test delivery, start a [`MockIngest`] and point the client's endpoint at
//!    [`MockIngest::url`]. The server runs on its own runtime, so it can be used from plain
//!    synchronous tests.
//!
//! # Example
//!
//! ```no_run
//! #[test]
//! fn my_test() {
//!     hive_test::setup();
//!
//!     hive_log::debug!("hello, world!");
//! }
//! ```

mod ingest;

pub use self::ingest::*;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from this crate and mutes all other logs.
pub fn setup() {
    hive_log::init_test!();
}
