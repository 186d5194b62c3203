//! # Dispatcher
//!
//! Routes each event through an ordered handler chain ([`Dispatcher`]) and drives the fetch loop
//! ([`run_polling`]). Handlers see the acting user's persisted session; the first Stop (or fault)
//! ends the chain for that event.

mod dispatcher;
mod polling;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use polling::{next_cursor, run_polling, PollingConfig};
