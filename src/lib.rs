//! Inbox classifier: sorts emails into productive/unproductive via an LLM.

pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod routes;
