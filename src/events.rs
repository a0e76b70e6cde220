//! Threshold-with-hysteresis spike detection.
//!
//! Each compartment is either quiescent or refractory. A quiescent compartment whose
//! threshold predicate holds emits one spike and turns refractory; it re-arms only once
//! the refractory predicate is false again.

use serde::{Deserialize, Serialize};

use crate::channels::MembraneState;
use crate::error::{AxonError, Result};

/// State variable a predicate looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateVariable {
    Voltage,
    M,
    N,
    H,
}

impl StateVariable {
    pub fn read(&self, state: &MembraneState) -> f64 {
        match self {
            StateVariable::Voltage => state.v,
            StateVariable::M => state.m,
            StateVariable::N => state.n,
            StateVariable::H => state.h,
        }
    }
}

/// How a compartment leaves its refractory window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Refractoriness {
    /// Refractory while the watched variable stays above this level.
    WhileAbove(f64),
    /// Refractory for a fixed dead time after the spike (ms).
    Duration(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeCondition {
    pub variable: StateVariable,
    pub threshold: f64,
    pub refractory: Refractoriness,
}

impl Default for SpikeCondition {
    /// `m > 0.5` fires, `m > 0.4` keeps the compartment refractory.
    fn default() -> Self {
        SpikeCondition {
            variable: StateVariable::M,
            threshold: 0.5,
            refractory: Refractoriness::WhileAbove(0.4),
        }
    }
}

impl SpikeCondition {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(AxonError::InvalidParameters(format!(
                "spike threshold must be finite, got {}",
                self.threshold
            )));
        }
        match self.refractory {
            Refractoriness::WhileAbove(level) if !(level < self.threshold) => {
                Err(AxonError::InvalidParameters(format!(
                    "refractory threshold {level} must lie below the spike threshold {}",
                    self.threshold
                )))
            }
            Refractoriness::Duration(ms) if !(ms.is_finite() && ms > 0.0) => Err(
                AxonError::InvalidParameters(format!("refractory duration must be positive, got {ms}")),
            ),
            _ => Ok(()),
        }
    }

    fn fires(&self, state: &MembraneState) -> bool {
        self.variable.read(state) > self.threshold
    }
}

/// Per-compartment refractory bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefractoryState {
    Quiescent,
    Refractory,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpikeEvent {
    pub compartment: usize,
    /// Time (ms) at the end of the step in which the threshold was crossed.
    pub time: f64,
}

#[derive(Debug, Clone)]
pub struct SpikeDetector {
    condition: SpikeCondition,
    phases: Vec<RefractoryState>,
    last_spike: Vec<Option<f64>>,
}

impl SpikeDetector {
    pub fn new(condition: SpikeCondition, compartments: usize) -> Result<Self> {
        condition.validate()?;
        Ok(SpikeDetector {
            condition,
            phases: vec![RefractoryState::Quiescent; compartments],
            last_spike: vec![None; compartments],
        })
    }

    pub fn condition(&self) -> &SpikeCondition {
        &self.condition
    }

    pub fn phase(&self, compartment: usize) -> Option<RefractoryState> {
        self.phases.get(compartment).copied()
    }

    pub fn last_spike(&self, compartment: usize) -> Option<f64> {
        self.last_spike.get(compartment).copied().flatten()
    }

    fn still_refractory(&self, compartment: usize, state: &MembraneState, time: f64) -> bool {
        match self.condition.refractory {
            Refractoriness::WhileAbove(level) => self.condition.variable.read(state) > level,
            Refractoriness::Duration(ms) => self.last_spike[compartment]
                .is_some_and(|spiked_at| time - spiked_at < ms),
        }
    }

    /// Runs one detection pass at `time`, appending events in compartment order.
    pub fn detect(&mut self, time: f64, membrane: &[MembraneState], events: &mut Vec<SpikeEvent>) {
        for (compartment, state) in membrane.iter().enumerate() {
            if self.phases[compartment] == RefractoryState::Refractory
                && !self.still_refractory(compartment, state, time)
            {
                self.phases[compartment] = RefractoryState::Quiescent;
            }
            if self.phases[compartment] == RefractoryState::Quiescent && self.condition.fires(state) {
                events.push(SpikeEvent { compartment, time });
                self.phases[compartment] = RefractoryState::Refractory;
                self.last_spike[compartment] = Some(time);
            }
        }
    }
}
