//! Fitting a [`Model`] to data with the Levenberg-Marquardt solver.
//!
//! The solver sees only the varying free parameters, mapped into the
//! unbounded internal space of their [`Bounds`]. Expression parameters are
//! re-resolved before every evaluation, so constraints hold at every trial
//! point.

use ndarray::Array1;
use tracing::{debug, info};

use super::algorithm::{covariance, LevenbergMarquardt};
use super::config::LmConfig;
use crate::error::{FitError, Result};
use crate::model::{FitArgs, FitResult, Model};
use crate::parameters::{Bounds, ParameterError, ParameterSet};
use crate::resolver::Resolver;

/// Fit `model` to `data` with the default solver configuration
pub fn fit_model<M: Model + ?Sized>(model: &M, data: &Array1<f64>, args: FitArgs) -> Result<FitResult> {
    fit_model_with_config(model, data, args, &LmConfig::default())
}

/// Fit `model` to `data`.
///
/// Every varying free parameter must have a value. Standard errors are
/// estimated from `(JᵀJ)⁻¹ · chisqr / (ndata - nvarys)` when there are more
/// data points than varying parameters.
pub fn fit_model_with_config<M: Model + ?Sized>(
    model: &M,
    data: &Array1<f64>,
    args: FitArgs,
    config: &LmConfig,
) -> Result<FitResult> {
    let FitArgs {
        mut params,
        bindings,
    } = args;

    if data.is_empty() {
        return Err(FitError::InvalidInput("No data to fit".to_string()));
    }

    let known = params.clone();
    let mut resolver = Resolver::new();
    resolver.resolve_all(&mut params, &known)?;
    let init_params = params.clone();

    let varying: Vec<(String, Bounds)> = params
        .iter()
        .filter(|(_, p)| p.vary() && !p.is_derived())
        .map(|(name, p)| (name.clone(), *p.bounds()))
        .collect();

    let mut x0 = Array1::zeros(varying.len());
    for (i, (name, bounds)) in varying.iter().enumerate() {
        let value = params.value_of(name)?;
        x0[i] = bounds.to_internal(bounds.clamp(value))?;
    }

    let init_fit = broadcast(model.eval(&params, &bindings)?, data)?;

    debug!(
        model = model.name(),
        nvarys = varying.len(),
        ndata = data.len(),
        "starting fit"
    );

    let mut work = params.clone();
    let residual_fn = |x: &Array1<f64>| -> Result<Array1<f64>> {
        apply_internal(&mut work, &varying, x)?;
        resolver.resolve_all(&mut work, &known)?;
        let values = broadcast(model.eval(&work, &bindings)?, data)?;
        Ok(values - data)
    };

    let report = LevenbergMarquardt::with_config(config.clone()).minimize(residual_fn, x0)?;

    apply_internal(&mut params, &varying, &report.x)?;
    resolver.resolve_all(&mut params, &known)?;

    let ndata = data.len();
    let nvarys = varying.len();

    let best_fit = broadcast(model.eval(&params, &bindings)?, data)?;
    let residuals = &best_fit - data;
    let chisqr = residuals.iter().map(|r| r * r).sum::<f64>();
    let redchi = if ndata > nvarys {
        chisqr / (ndata - nvarys) as f64
    } else {
        f64::NAN
    };

    let cov = if nvarys > 0 && ndata > nvarys {
        covariance(&report.jacobian)
    } else {
        None
    };
    for (i, (name, bounds)) in varying.iter().enumerate() {
        let stderr = cov.as_ref().and_then(|cov| {
            let variance = cov[[i, i]] * redchi;
            (variance.is_finite() && variance >= 0.0)
                .then(|| variance.sqrt() * bounds.external_gradient(report.x[i]).abs())
        });
        if let Some(param) = params.get_mut(name) {
            param.set_stderr(stderr);
        }
    }

    info!(
        model = model.name(),
        nfev = report.nfev,
        chisqr,
        success = report.success,
        "fit finished"
    );

    Ok(FitResult {
        params,
        init_params,
        best_fit,
        init_fit,
        residuals,
        chisqr,
        redchi,
        nfev: report.nfev,
        nvarys,
        ndata,
        success: report.success,
        message: report.message,
    })
}

fn apply_internal(params: &mut ParameterSet, varying: &[(String, Bounds)], x: &Array1<f64>) -> Result<()> {
    for ((name, bounds), internal) in varying.iter().zip(x.iter()) {
        params
            .get_mut(name)
            .ok_or_else(|| ParameterError::ParameterNotFound { name: name.clone() })?
            .set_value_clamped(bounds.to_external(*internal));
    }
    Ok(())
}

/// Match the model output to the data; a single value is repeated
fn broadcast(values: Array1<f64>, data: &Array1<f64>) -> Result<Array1<f64>> {
    match values.len() {
        n if n == data.len() => Ok(values),
        1 => Ok(Array1::from_elem(data.len(), values[0])),
        n => Err(FitError::DimensionMismatch(format!(
            "Model produced {} values for {} data points",
            n,
            data.len()
        ))),
    }
}
