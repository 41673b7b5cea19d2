//! Session-oriented ingest and finalization service for streamed rPPG measurements.
//!
//! A client opens a short-lived measurement session, streams base64-JPEG frames over a
//! bidirectional WebSocket (or the REST mirror), and receives a structured heart-rate
//! estimate when the capture window closes. This crate owns the session lifecycle, quota
//! enforcement, and the streaming protocol; the actual signal-processing pipeline is an
//! external collaborator behind the [`processor::SignalProcessor`] trait.

pub mod config;
pub mod error;
pub mod finalize;
pub mod guardrail;
pub mod ingest;
pub mod processor;
pub mod protocol;
pub mod result;
pub mod routes;
pub mod session;
pub mod state;
