//! Least-squares polynomial fitting over `(year, population)` samples.
//!
//! Years are mapped onto `[-1, 1]` before fitting. Raw calendar years raised
//! to the ninth power overflow the useful precision of `f64`, while the
//! centred values keep the Vandermonde matrix well conditioned. The affine
//! map is stored with the coefficients, so evaluation takes plain years.

use nalgebra::{DMatrix, DVector, SVD};

use crate::ForecastError;

/// Degree of every forecast polynomial.
pub const FORECAST_DEGREE: usize = 9;

/// A fitted polynomial `p(t) = terms[0] + terms[1] * t + ... ` where
/// `t = (year - center) / scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    terms: Vec<f64>,
    center: f64,
    scale: f64,
}

impl FittedModel {
    /// Fits a [`FORECAST_DEGREE`] polynomial to `samples`.
    ///
    /// With fewer than `FORECAST_DEGREE + 1` distinct years the degree drops
    /// to `distinct_years - 1`, the highest degree the samples determine.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::InsufficientSamples`] if `samples` is empty.
    /// * [`ForecastError::Solve`] if the least-squares solve fails.
    pub fn fit(samples: &[(i32, i64)]) -> Result<Self, ForecastError> {
        Self::fit_with_degree(samples, FORECAST_DEGREE)
    }

    /// Fits a polynomial of at most `max_degree` to `samples`.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::InsufficientSamples`] if `samples` is empty.
    /// * [`ForecastError::Solve`] if the least-squares solve fails.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit_with_degree(samples: &[(i32, i64)], max_degree: usize) -> Result<Self, ForecastError> {
        if samples.is_empty() {
            return Err(ForecastError::InsufficientSamples { available: 0 });
        }

        let mut years: Vec<i32> = samples.iter().map(|&(x, _)| x).collect();
        years.sort_unstable();
        years.dedup();
        let degree = max_degree.min(years.len() - 1);

        let min_x = f64::from(years[0]);
        let max_x = f64::from(years[years.len() - 1]);
        let center = (min_x + max_x) / 2.0;
        let scale = if max_x > min_x {
            (max_x - min_x) / 2.0
        } else {
            1.0
        };

        let k = degree + 1;
        let matrix = DMatrix::from_fn(samples.len(), k, |row, col| {
            let t = (f64::from(samples[row].0) - center) / scale;
            t.powi(i32::try_from(col).unwrap_or(i32::MAX))
        });
        let b = DVector::from_iterator(samples.len(), samples.iter().map(|&(_, y)| y as f64));

        let decomp = SVD::new(matrix, true, true);

        // ~= machine_epsilon * max(size) * max_singular
        let max_size = samples.len().max(k) as f64;
        let epsilon = f64::EPSILON * max_size * decomp.singular_values.max();

        let solution = decomp
            .solve(&b, epsilon)
            .map_err(|message| ForecastError::Solve {
                message: message.to_string(),
            })?;
        let terms: Vec<f64> = solution.iter().copied().collect();

        if terms.iter().any(|c| !c.is_finite()) {
            return Err(ForecastError::Solve {
                message: "non-finite coefficient".to_string(),
            });
        }

        Ok(Self {
            terms,
            center,
            scale,
        })
    }

    /// Evaluates the polynomial at `year`.
    ///
    /// No range check: extrapolating beyond the fitted years is the point.
    #[must_use]
    pub fn evaluate(&self, year: i32) -> f64 {
        let t = (f64::from(year) - self.center) / self.scale;
        self.terms.iter().rev().fold(0.0, |acc, c| acc.mul_add(t, *c))
    }

    /// Coefficients in ascending power order of the normalized year.
    #[must_use]
    pub fn terms(&self) -> &[f64] {
        &self.terms
    }

    /// Degree actually fitted.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.terms.len().saturating_sub(1)
    }
}
