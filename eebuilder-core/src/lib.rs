//! EE Builder Core
//!
//! Core types shared by the execution environment builder services.
//!
//! This crate contains:
//! - Domain types: builds, container runtimes and environments
//! - DTOs: request/response bodies exchanged with the orchestrator

pub mod domain;
pub mod dto;
