//! # Keun Application Library
//!
//! Internals of the Keun binary: the HTTP API, the CLI, and the AutoMapper
//! batch service. The mapping semantics themselves live in `keun-core`; this
//! crate is the only async/network-aware component.

pub mod api;
pub mod automap;
pub mod cli;
