//! # Astro Insights
//!
//! Answers free-text astrology questions by combining a rule-based birth
//! chart with passages retrieved from a library of astrology books.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Knowledge    │──▶│ Chunk+Embed  │──▶│ Vector index │
//! │ base (PDF/MD)│   │ (index build)│   │ (JSON file)  │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │ top-k
//!  birth details ──▶ chart + effects ──▶ prompt ◀┘ ──▶ LLM ──▶ answer
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! astro chart                       # print the chart and effects
//! astro index build                 # embed ./knowledge_base into the index
//! GROQ_API_KEY=... astro serve      # start the web form on :5000
//! GROQ_API_KEY=... astro ask --query "How is my career?"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chart`] | Planet/house tables, chart assembly, effect rules |
//! | [`positions`] | Planet → house placement source |
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Shared data types |
//! | [`loader`] | Knowledge-base file discovery |
//! | [`extract`] | PDF and text extraction |
//! | [`chunk`] | Recursive character chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | File-persisted vector index |
//! | [`indexer`] | Offline index build |
//! | [`llm`] | Prompt assembly and the chat-completion client |
//! | [`insight`] | The end-to-end query pipeline |
//! | [`server`] | HTTP form and JSON endpoint |
//! | [`error`] | Query-path error kinds |

pub mod chart;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod indexer;
pub mod insight;
pub mod llm;
pub mod loader;
pub mod models;
pub mod positions;
pub mod server;
