//! Peak models.
//!
//! Peak amplitudes are areas. The full width at half maximum and the peak
//! height are exposed as expression parameters, so they follow `sigma` and
//! `amplitude` during a fit.

use std::f64::consts::PI;

use ndarray::Array1;

use super::guess_samples;
use crate::error::Result;
use crate::model::{independent_values, Bindings, Model, Value};
use crate::parameters::{Bounds, Parameter, ParameterSet};
use crate::registry::ModelRegistry;

/// Smallest width used when evaluating a peak
const TINY: f64 = 1e-15;

/// `2 * sqrt(2 * ln 2)`
const FWHM_FACTOR: f64 = 2.3548200;

/// `1 / sqrt(2 * pi)`
const HEIGHT_FACTOR: f64 = 0.3989423;

/// A Gaussian peak
///
/// f(x) = amplitude / (sigma * sqrt(2π)) * exp(-(x - center)² / (2 sigma²))
///
/// Parameters: `amplitude`, `center`, `sigma` (at least 0), and the derived
/// `fwhm = 2.3548200*sigma` and `height = 0.3989423*amplitude/max(1e-15, sigma)`.
#[derive(Debug, Clone)]
pub struct GaussianModel {
    prefix: String,
    independent_vars: Vec<String>,
}

impl GaussianModel {
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            independent_vars: vec!["x".to_string()],
        }
    }

    fn param(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

impl Default for GaussianModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for GaussianModel {
    fn name(&self) -> &str {
        "GaussianModel"
    }

    fn independent_vars(&self) -> &[String] {
        &self.independent_vars
    }

    fn make_params(&self) -> ParameterSet {
        let sigma = self.param("sigma");
        let amplitude = self.param("amplitude");

        let mut params = ParameterSet::new();
        params.add_param(&amplitude, 1.0);
        params.add_param(&self.param("center"), 0.0);

        params.add(Parameter::bounded(&sigma, 1.0, Bounds::min_only(0.0)));

        params.add_param_with_expr(&self.param("fwhm"), &format!("{:.7}*{}", FWHM_FACTOR, sigma));
        params.add_param_with_expr(
            &self.param("height"),
            &format!("{:.7}*{}/max({:e}, {})", HEIGHT_FACTOR, amplitude, TINY, sigma),
        );
        params
    }

    /// Peak position, half-maximum width, and the area those imply
    fn guess(&self, data: &Array1<f64>, independent: Option<(&str, &Value)>) -> Result<ParameterSet> {
        let x = guess_samples(&self.independent_vars[0], data, independent)?;

        let mut order: Vec<usize> = (0..x.len()).collect();
        order.sort_by(|&a, &b| x[a].total_cmp(&x[b]));
        let xs: Vec<f64> = order.iter().map(|&i| x[i]).collect();
        let ys: Vec<f64> = order.iter().map(|&i| data[i]).collect();

        let (peak_idx, &max_y) = ys
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .unwrap_or((0, &0.0));
        let min_y = ys.iter().copied().fold(f64::INFINITY, f64::min);

        let height = max_y - min_y;
        let half = min_y + height / 2.0;

        // Walk outwards to the half-maximum crossings
        let mut left = peak_idx;
        while left > 0 && ys[left] > half {
            left -= 1;
        }
        let mut right = peak_idx;
        while right + 1 < ys.len() && ys[right] > half {
            right += 1;
        }

        let span = xs[xs.len() - 1] - xs[0];
        let fwhm = if right > left {
            xs[right] - xs[left]
        } else {
            span / 5.0
        };
        let sigma = if fwhm > 0.0 { fwhm / FWHM_FACTOR } else { 1.0 };

        let mut params = self.make_params();
        params.set_value(&self.param("amplitude"), height * sigma * (2.0 * PI).sqrt())?;
        params.set_value(&self.param("center"), xs[peak_idx])?;
        params.set_value(&self.param("sigma"), sigma)?;
        Ok(params)
    }

    fn eval(&self, params: &ParameterSet, bindings: &Bindings) -> Result<Array1<f64>> {
        let amplitude = params.value_of(&self.param("amplitude"))?;
        let center = params.value_of(&self.param("center"))?;
        let sigma = params.value_of(&self.param("sigma"))?.max(TINY);
        let x = independent_values(bindings, &self.independent_vars[0])?;

        let norm = amplitude / (sigma * (2.0 * PI).sqrt());
        Ok(x.mapv(|x| norm * (-(x - center).powi(2) / (2.0 * sigma * sigma)).exp()))
    }
}

pub(crate) fn register(registry: &ModelRegistry) {
    registry.register("GaussianModel", || Box::new(GaussianModel::new()));
}
