//! Unit test module
//!
//! Handler tests live here, separate from source files. They drive the real handler chain
//! through the dispatcher against an in-memory SQLite store, with the transport and the probes
//! replaced by recording fakes.

mod dns_test;
mod menu_test;
mod whois_test;
