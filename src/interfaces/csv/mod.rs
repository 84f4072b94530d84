//! CSV adapters used by the replay binary.

pub mod delivery_writer;
pub mod update_reader;
