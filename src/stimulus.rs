//! Stimulation protocols: consecutive epochs, each holding a fixed set of point currents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AxonError, Result};

/// A stretch of simulated time with constant applied currents.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Epoch {
    /// ms
    pub duration: f64,
    /// compartment -> current (uA); every other compartment receives zero
    pub currents: BTreeMap<usize, f64>,
}

impl Epoch {
    /// No applied current for `duration` ms.
    pub fn quiet(duration: f64) -> Self {
        Epoch {
            duration,
            currents: BTreeMap::new(),
        }
    }

    pub fn inject(duration: f64, compartment: usize, current: f64) -> Self {
        Epoch::quiet(duration).with_current(compartment, current)
    }

    pub fn with_current(mut self, compartment: usize, current: f64) -> Self {
        self.currents.insert(compartment, current);
        self
    }

    /// Number of `dt` steps covering the epoch, rounded to the nearest step.
    pub fn steps(&self, dt: f64) -> Result<u64> {
        if !(self.duration.is_finite() && self.duration >= 0.0) {
            return Err(AxonError::InvalidParameters(format!(
                "epoch duration must be finite and non-negative, got {}",
                self.duration
            )));
        }
        Ok((self.duration / dt).round() as u64)
    }

    /// Dense per-compartment current vector (uA).
    pub fn applied_currents(&self, compartments: usize) -> Result<Vec<f64>> {
        let mut dense = vec![0.0; compartments];
        for (&compartment, &current) in &self.currents {
            if compartment >= compartments {
                return Err(AxonError::InvalidParameters(format!(
                    "stimulus targets compartment {compartment} but the fiber has {compartments}"
                )));
            }
            if !current.is_finite() {
                return Err(AxonError::InvalidParameters(format!(
                    "stimulus current at compartment {compartment} is not finite"
                )));
            }
            dense[compartment] = current;
        }
        Ok(dense)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Protocol {
    pub epochs: Vec<Epoch>,
}

impl Protocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, epoch: Epoch) -> Self {
        self.epochs.push(epoch);
        self
    }

    /// 50 ms of rest, 1 uA into compartment 0 for 3 ms, then 50 ms of rest.
    pub fn end_pulse() -> Self {
        Protocol::new()
            .then(Epoch::quiet(50.0))
            .then(Epoch::inject(3.0, 0, 1.0))
            .then(Epoch::quiet(50.0))
    }

    /// ms
    pub fn duration(&self) -> f64 {
        self.epochs.iter().map(|epoch| epoch.duration).sum()
    }
}
