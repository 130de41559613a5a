//! Servman Daemon Library
//!
//! Core of a single-host service orchestrator: a registry of service
//! definitions and instances, an adapter over the OS service supervisor,
//! the package upgrade pipeline, the generic service host, and the HTTP
//! management plane that ties them together.

pub mod config;
pub mod control;
pub mod error;
pub mod executor;
pub mod host;
pub mod http;
pub mod manager;
pub mod model;
pub mod options;
pub mod registry;
pub mod storage;
pub mod upgrade;
pub mod validation;
