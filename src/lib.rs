//! Agent Conductor Library
//!
//! This library provides specialist code-generation workers, the conductor
//! that coordinates them, and the HTTP surface for the dashboard.

pub mod agents;
pub mod api;
pub mod config;
pub mod llm;
