//! # survey-metrics - Metrics for astronomical survey simulations
//!
//! Evaluates quality metrics over partitions of a simulated survey's visit
//! table: one partition per sky position, time window or other slice.
//!
//! ## Key Features
//!
//! - **One contract**: every metric declares its columns up front and maps
//!   a partition to a scalar, a binned vector, or [`MetricValue::Invalid`]
//! - **Reduce functions**: vector metrics name the scalars they collapse to
//! - **Summaries**: survey-level statistics over all partitions
//! - **Typed configuration**: JSON documents with unknown keys rejected
//! - **Parallel evaluation**: metrics are pure and `Send + Sync`
//!
//! ## Quick Start
//!
//! ```rust
//! use survey_metrics::{
//!     DataSlice, MetricBundle, MetricSpec, Partition, SlicePoint, SummaryMetric,
//!     SummaryStatistic,
//! };
//!
//! let spec = MetricSpec::from_json(r#"{"metric": "VisitGaps", "units_factor": 1.0}"#).unwrap();
//! let bundle = MetricBundle::new(spec.build().unwrap())
//!     .with_summary(SummaryMetric::new(SummaryStatistic::Median).unwrap());
//!
//! let data = DataSlice::new()
//!     .with_floats("expMJD", vec![3.0, 0.0, 1.0])
//!     .unwrap();
//! let output = bundle
//!     .evaluate(&[Partition::new(SlicePoint::new(0), data)])
//!     .unwrap();
//!
//! let series = &output.series[0];
//! assert_eq!(series.values[0].as_scalar(), Some(1.5));
//! assert_eq!(series.summary("Median").and_then(|v| v.as_scalar()), Some(1.5));
//! ```
//!
//! ## Modules
//!
//! - [`data`]: partitions ([`DataSlice`]) and their descriptors ([`SlicePoint`])
//! - [`metric`]: the [`Metric`] and [`VectorMetric`] traits
//! - [`metrics`]: concrete metric families
//! - [`reduce`]: reduce functions for vector metrics
//! - [`summary`]: survey-level summary statistics
//! - [`config`]: typed configuration documents
//! - [`bundle`]: the evaluate, reduce and summarize pipeline

// Modules
pub mod astro;
pub mod bundle;
pub mod columns;
pub mod config;
pub mod data;
pub mod error;
pub mod metric;
pub mod metrics;
pub mod reduce;
pub mod stats;
pub mod summary;
pub mod value;

// Re-exports for convenient access
pub use bundle::{BundleOutput, MetricBundle, OutputSeries, Partition, SummaryResult};
pub use columns::{ColumnRequirement, ColumnSet};
pub use config::{BundleSpec, MetricSpec, SummarySpec};
pub use data::{Column, DataSlice, Field, Row, SlicePoint};
pub use error::{ConfigError, DataError, MetricError, Result};
pub use metric::{Metric, MetricInfo, VectorMetric};
pub use reduce::{ReduceFunction, ReduceKind, ReduceRegistry};
pub use summary::{SummaryMetric, SummaryStatistic};
pub use value::{Binned, Bins, MetricValue, SummaryValue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
