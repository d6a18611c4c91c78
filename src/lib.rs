//! Library crate for reflex-back: the reaction trial engine, the player profile store
//! and the session tying them together, exposed for the terminal driver and tests.

pub mod config;
pub mod dao;
pub mod error;
pub mod state;
pub mod validation;
