//! Custos: a chat bot that plays customer-development interview respondents.

pub mod bot;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod interview;
pub mod llm;
pub mod persona;
pub mod sanitize;
pub mod store;
