//! Application form engine for public selective processes.
//!
//! Candidates answer the screening questions of a process, save drafts and
//! submit an inscription against the process backend. The [`workflows::inscricao`]
//! module owns the typed answer model and the draft lifecycle; [`workflows::cadastro`]
//! carries the profile helpers used around it (document masks, CEP lookup,
//! reminder scheduling).

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
