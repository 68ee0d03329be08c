//! Core use-case services.
//!
//! # Responsibility
//! - Build concordance spans from the Ephemeris Oracle.
//! - Decide cache freshness and answer conversions in both directions.
//! - Keep callers decoupled from storage details.

pub mod concordance_builder;
pub mod conversion_service;
pub mod extended_concordance;
