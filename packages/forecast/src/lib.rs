#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Per-municipality polynomial population forecasts.
//!
//! Every municipality identifier gets three least-squares polynomial models
//! (total, male, female) fitted over its yearly history since 1990. The
//! models are built once per process through [`cache::ForecastCache`] and
//! evaluated with [`cache::predict`] for any year, including years past the
//! last census.

pub mod cache;
pub mod polynomial;

use std::sync::Arc;

use population_map_database::DbError;
use thiserror::Error;

/// Errors that can occur while building or evaluating forecasts.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A fit was requested without any samples.
    #[error("Insufficient samples: {available} available, at least 1 required")]
    InsufficientSamples {
        /// Number of samples supplied.
        available: usize,
    },

    /// A historical record cannot be attributed to a municipality.
    #[error("Malformed record for year {year}: {message}")]
    MalformedRecord {
        /// Census year of the offending record.
        year: i32,
        /// Description of what went wrong.
        message: String,
    },

    /// No forecast exists for the municipality.
    #[error("Unknown municipality: {municipality_id}")]
    UnknownMunicipality {
        /// The identifier that was looked up.
        municipality_id: String,
    },

    /// The model evaluated to NaN or infinity.
    #[error("Non-finite prediction for {municipality_id} in {year}")]
    NonFinitePrediction {
        /// Municipality identifier.
        municipality_id: String,
        /// Requested year.
        year: i32,
    },

    /// The least-squares system could not be solved.
    #[error("Least-squares solve failed: {message}")]
    Solve {
        /// Description of what went wrong.
        message: String,
    },

    /// Reading the history failed.
    #[error("Store error: {0}")]
    Store(#[from] DbError),

    /// The background fit task panicked or was cancelled.
    #[error("Fit task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A shared cache build failed. Every caller waiting on that build
    /// receives the same cause.
    #[error("Forecast build failed: {0}")]
    Build(Arc<Self>),
}

impl ForecastError {
    /// The underlying error, looking through shared build failures.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Build(inner) => inner.root(),
            other => other,
        }
    }
}
