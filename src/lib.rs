//! # Confluence Agent
//!
//! A conversational knowledge agent for Confluence: search a wiki through
//! overlapping query strategies, render pages to plain text, and answer
//! questions with citations through an OpenAI-compatible chat model driving
//! a fixed tool registry.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────────┐
//! │   REPL   │──▶│  Agent loop    │──▶│  Chat model  │
//! │  (cfa)   │   │ tool registry │◀──│ (tool calls) │
//! └──────────┘   └──────┬────────┘   └─────────────┘
//!                       ▼
//!            ┌─────────────────────┐
//!            │ Search aggregator   │
//!            │ (6 CQL strategies)  │
//!            └──────┬──────────────┘
//!                   ▼
//!            ┌─────────────┐   ┌──────────┐
//!            │ Confluence   │──▶│ Renderer │
//!            │ REST client  │   │ (plain)  │
//!            └─────────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment-supplied configuration |
//! | [`models`] | Normalized search results and documents |
//! | [`connector`] | Confluence REST client |
//! | [`search`] | Multi-strategy search aggregation |
//! | [`render`] | Storage-format markup to plain text |
//! | [`llm`] | Chat-completions client with function calling |
//! | [`agent`] | Capability registry and tool-calling loop |
//! | [`chat`] | Interactive REPL |

pub mod agent;
pub mod chat;
pub mod config;
pub mod connector;
pub mod llm;
pub mod models;
pub mod render;
pub mod search;
