//! Mika - a natural-language assistant for Metabase cards.
//!
//! This library exposes the core modules for use in integration tests.

pub mod assistant;
pub mod cards;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod metabase;
pub mod metadata;
pub mod sqlgen;
pub mod tools;
