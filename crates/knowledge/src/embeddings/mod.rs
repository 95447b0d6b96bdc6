//! Embedding capability for the indexer and the retrieval tools.
//!
//! Providers map an ordered batch of texts to one vector per text, in
//! order. A failing request fails the whole batch; providers never retry.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
