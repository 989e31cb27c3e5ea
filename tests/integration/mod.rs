//! Integration tests for Mika.

pub mod assistant_test;
pub mod cards_test;
pub mod metabase_test;
