//! # Jury Core
//!
//! The domain layer of TheJury notification service.
//! This crate contains webhook and rate-limit types with zero infrastructure dependencies.

pub mod domain;
pub mod error;
pub mod ports;

pub use error::DomainError;
