//! Retrieval-augmented answering over a [`FlatIndex`](crate::index::FlatIndex).

pub mod ask;
pub mod types;

pub use ask::{ask_rag, build_context, map_hits_to_sources, retrieve, RagRequest};
pub use types::{RagResponse, RagSourceRef};
