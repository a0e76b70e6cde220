//! Conduction velocity from spike arrival times.

use serde::{Deserialize, Serialize};

use crate::events::SpikeEvent;

/// Ordinary least-squares fit `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient
    pub r_value: f64,
    /// Standard error of the slope
    pub std_err: f64,
}

/// Returns `None` with fewer than two points or when every `x` is identical.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let r_value = if syy == 0.0 { 0.0 } else { (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0) };
    let std_err = if n > 2 {
        ((1.0 - r_value * r_value) * syy / sxx / (n - 2) as f64).sqrt()
    } else {
        0.0
    };
    Some(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
        r_value,
        std_err,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConductionEstimate {
    /// m/s
    pub velocity: f64,
    /// distance (cm) against time (ms)
    pub fit: LinearFit,
}

/// Fits compartment distance against spike time; `distances` is indexed by compartment (cm).
///
/// Events pointing past `distances` are ignored.
pub fn conduction_velocity(spikes: &[SpikeEvent], distances: &[f64]) -> Option<ConductionEstimate> {
    let (times, positions): (Vec<f64>, Vec<f64>) = spikes
        .iter()
        .filter_map(|event| distances.get(event.compartment).map(|&d| (event.time, d)))
        .unzip();
    let fit = linear_regression(&times, &positions)?;
    Some(ConductionEstimate {
        // cm/ms -> m/s
        velocity: fit.slope * 10.0,
        fit,
    })
}
