//! # nebula_client
//!
//! Streaming client for the nebulaONE conversational backend. A turn is one
//! POST carrying the user's question; the reply comes back as a Server-Sent
//! Events stream of base64 payloads which this crate decodes, accumulates,
//! and folds into per-conversation state.

pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod request;
pub mod sse;
pub mod turn;

pub use client::NebulaClient;
pub use config::Config;
pub use conversation::{ConversationPhase, ConversationState};
pub use error::{ClientError, Result};
pub use sse::StreamEvent;
pub use turn::{TurnResult, TurnUpdate};
