//! Core data types shared by the chart, retrieval and HTTP layers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fields submitted with an insight request.
///
/// `dob`, `time_of_birth` and `place_of_birth` are carried through but do not
/// influence the chart; positions come from a
/// [`PositionSource`](crate::positions::PositionSource).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BirthDetails {
    pub name: String,
    pub dob: String,
    pub time_of_birth: String,
    pub place_of_birth: String,
    pub gender: String,
    pub query: String,
}

/// Successful insight response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightResponse {
    pub answer: String,
    pub birth_chart: String,
    pub effects: BTreeMap<u8, String>,
}

/// A chunk of knowledge-base text with its embedding, as stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    /// Document path relative to the knowledge-base root.
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
    pub vector: Vec<f32>,
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub id: String,
    pub source: String,
    pub text: String,
    pub score: f32,
}

/// A knowledge-base document after text extraction.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub source: String,
    pub content_type: String,
    pub body: String,
}

/// A piece of a document's text, before embedding.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub source: String,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
}
