//! Domain types and the state components the engine composes.

pub mod ledger;
pub mod listener;
pub mod ports;
pub mod supersession;
pub mod transaction;
