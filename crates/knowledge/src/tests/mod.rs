//! Crate-level tests and shared test doubles.


mod indexer_scenarios;
