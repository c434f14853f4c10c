// Survey Testdata - Synthetic survey generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Survey Testdata
//!
//! Seeded synthetic survey visit tables for testing and benchmarking
//! `survey-metrics`.
//!
//! ## Quick Start
//!
//! ```rust
//! use survey_testdata::{generate_survey, SurveyConfig};
//!
//! let config = SurveyConfig::new()
//!     .with_nights(60)
//!     .with_fields(6)
//!     .with_seed(42);
//!
//! let survey = generate_survey(&config).unwrap();
//! let partitions = survey.partitions_by_field().unwrap();
//! assert_eq!(partitions.len(), 6);
//! ```

pub mod generator;
pub mod survey;

// Re-exports for convenience
pub use generator::{field_grid, generate_survey, SurveyConfig};
pub use survey::{Survey, SurveyError, SurveyField, SurveyMetadata, Visit, COLUMNS};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
