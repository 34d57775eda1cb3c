//! An interactive fit session driven from the terminal.
//!
//! A text table stands in for the parameter widgets and a coarse text plot
//! for the figure. Run with `RUST_LOG=debug` to see the resolver at work.

use std::cell::RefCell;
use std::rc::Rc;

use fitter_rs::model::{Bindings, Value};
use fitter_rs::parameters::ParameterSet;
use fitter_rs::registry::ModelRegistry;
use fitter_rs::session::{Fitter, ParamView, PlotFrame, Renderer};
use fitter_rs::Result;
use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Parameter table with edits shared with the "user"
#[derive(Default)]
struct TextView {
    rows: Rc<RefCell<Vec<(String, Option<f64>)>>>,
}

impl TextView {
    fn print(&self, title: &str) {
        println!("-- {} --", title);
        for (name, value) in self.rows.borrow().iter() {
            match value {
                Some(v) => println!("  {:<12} {:>12.5}", name, v),
                None => println!("  {:<12} {:>12}", name, "-"),
            }
        }
    }

    fn show(&self, params: &ParameterSet) {
        *self.rows.borrow_mut() = params
            .iter()
            .map(|(name, p)| (name.clone(), p.value()))
            .collect();
    }
}

impl ParamView for TextView {
    fn rebuild(&mut self, params: &ParameterSet) {
        self.show(params);
        self.print("parameters");
    }

    fn pull(&self) -> Vec<(String, Option<f64>)> {
        self.rows.borrow().clone()
    }

    fn push(&mut self, params: &ParameterSet) {
        self.show(params);
        self.print("updated");
    }

    fn set_guess_enabled(&mut self, enabled: bool) {
        println!("[guess button {}]", if enabled { "enabled" } else { "disabled" });
    }
}

/// Prints one row per bin: data as `*`, the fit as `o`
struct TextPlot {
    width: usize,
    bins: usize,
}

impl Renderer for TextPlot {
    fn render(&mut self, frame: &PlotFrame) -> Result<()> {
        let curve = frame.best_fit.as_ref().unwrap_or(&frame.data);
        let max = frame
            .data
            .iter()
            .chain(curve.iter())
            .fold(f64::MIN_POSITIVE, |m, v| m.max(v.abs()));
        let step = (frame.data.len() / self.bins).max(1);

        println!("-- {} against {} --", frame.model, frame.x_label);
        for i in (0..frame.data.len()).step_by(step) {
            let mut row = vec![' '; self.width + 1];
            let col = |v: f64| ((v.max(0.0) / max) * self.width as f64).round() as usize;
            row[col(curve[i]).min(self.width)] = 'o';
            row[col(frame.data[i]).min(self.width)] = '*';
            println!("{:>8.3} |{}", frame.x[i], row.into_iter().collect::<String>());
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Available models: {}", ModelRegistry::global().names().join(", "));

    // A noisy peak on a flat background of zero
    let x = Array1::linspace(-4.0, 6.0, 81);
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let noise = Normal::new(0.0, 0.08).map_err(|e| fitter_rs::FitError::Other(e.to_string()))?;
    let data = x.mapv(|x: f64| {
        5.0 / (0.8 * (2.0 * std::f64::consts::PI).sqrt()) * (-(x - 1.2).powi(2) / (2.0 * 0.64)).exp()
            + noise.sample(&mut rng)
    });

    let mut bindings = Bindings::new();
    bindings.insert("x".to_string(), Value::from(x));

    let view = TextView::default();
    let rows = Rc::clone(&view.rows);

    let mut fitter = Fitter::new(data, bindings);
    fitter.attach_view(view);
    fitter.set_renderer(TextPlot { width: 50, bins: 20 });

    fitter.bind_named("GaussianModel")?;

    // The user nudges the center before fitting
    if let Some(row) = rows.borrow_mut().iter_mut().find(|(name, _)| name == "center") {
        row.1 = Some(0.0);
    }

    let result = fitter.fit(Bindings::new())?;
    println!("{}", result);

    // A second model on the same data, fitted from its guess
    fitter.bind_named("ExponentialModel")?;
    match fitter.fit(Bindings::new()) {
        Ok(result) => println!("exponential chi-square: {:.4}", result.chisqr),
        Err(err) => println!("exponential fit failed: {}", err),
    }

    Ok(())
}
