//! Medroute - Conversational Coordination Core for Medical Transport
//!
//! This crate implements the phase-driven conversation engine used to
//! coordinate medical-transport calls: a deterministic state machine wrapped
//! around an LLM turn loop, with policy guards that outrank model proposals.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod observability;
pub mod ports;
