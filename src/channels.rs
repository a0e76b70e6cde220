//!
//! The channels define the dynamics that take place across the membrane of each compartment.
//! Only the classic squid-axon set is modelled: sodium, potassium and leak.
//! Rates follow Hodgkin & Huxley (1952) with the voltage measured from rest (rest = 0 mV).
//!
use serde::{Deserialize, Serialize};

use crate::error::{AxonError, Result};

/// Process-wide membrane constants. Set once when a simulation is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelParameters {
    /// Leak reversal potential (mV)
    pub e_leak: f64,
    /// Sodium reversal potential (mV)
    pub e_na: f64,
    /// Potassium reversal potential (mV)
    pub e_k: f64,
    /// Leak conductance density (mS/cm^2)
    pub g_leak: f64,
    /// Maximal potassium conductance density (mS/cm^2)
    pub g_k: f64,
    /// Default maximal sodium conductance density (mS/cm^2), overridable per compartment
    pub g_na: f64,
    /// Membrane capacitance (uF/cm^2)
    pub capacitance: f64,
    /// Intracellular resistivity (ohm cm)
    pub resistivity: f64,
}

impl Default for ChannelParameters {
    fn default() -> Self {
        Self {
            e_leak: 10.613,
            e_na: 115.0,
            e_k: -12.0,
            g_leak: 0.3,
            g_k: 36.0,
            g_na: 120.0,
            capacitance: 1.0,
            resistivity: 35.4,
        }
    }
}

impl ChannelParameters {
    pub fn validate(&self) -> Result<()> {
        let potentials = [self.e_leak, self.e_na, self.e_k];
        if potentials.iter().any(|e| !e.is_finite()) {
            return Err(AxonError::InvalidParameters(
                "reversal potentials must be finite".to_owned(),
            ));
        }
        let conductances = [("g_leak", self.g_leak), ("g_k", self.g_k), ("g_na", self.g_na)];
        for (name, g) in conductances {
            if !g.is_finite() || g < 0.0 {
                return Err(AxonError::InvalidParameters(format!(
                    "{name} must be a finite non-negative conductance density, got {g}"
                )));
            }
        }
        Ok(())
    }
}

/// Opening (alpha) and closing (beta) rate of one gate, in 1/ms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateRates {
    pub alpha: f64,
    pub beta: f64,
}

/// Rates for all three gates at one voltage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelRates {
    pub m: GateRates,
    pub n: GateRates,
    pub h: GateRates,
}

impl ChannelRates {
    pub fn at(v: f64) -> Self {
        ChannelRates {
            m: GateRates { alpha: alpha_m(v), beta: beta_m(v) },
            n: GateRates { alpha: alpha_n(v), beta: beta_n(v) },
            h: GateRates { alpha: alpha_h(v), beta: beta_h(v) },
        }
    }
}

/// `x / (exp(x / y) - 1)`, continuous through `x = 0` where it tends to `y`.
fn exprel_ratio(x: f64, y: f64) -> f64 {
    let u = x / y;
    if u.abs() < 1e-6 {
        // Second order series of u / (e^u - 1)
        y * (1.0 - u / 2.0 + u * u / 12.0)
    } else {
        x / u.exp_m1()
    }
}

pub fn alpha_m(v: f64) -> f64 {
    0.1 * exprel_ratio(25.0 - v, 10.0)
}

pub fn beta_m(v: f64) -> f64 {
    4.0 * (-v / 18.0).exp()
}

pub fn alpha_h(v: f64) -> f64 {
    0.07 * (-v / 20.0).exp()
}

pub fn beta_h(v: f64) -> f64 {
    1.0 / (((30.0 - v) / 10.0).exp() + 1.0)
}

pub fn alpha_n(v: f64) -> f64 {
    0.01 * exprel_ratio(10.0 - v, 10.0)
}

pub fn beta_n(v: f64) -> f64 {
    0.125 * (-v / 80.0).exp()
}

/// Mutable per-compartment membrane state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MembraneState {
    /// Voltage relative to rest (mV)
    pub v: f64,
    pub m: f64,
    pub n: f64,
    pub h: f64,
    /// Maximal sodium conductance density for this compartment (mS/cm^2)
    pub g_na: f64,
    /// Applied point current (uA)
    pub i_app: f64,
}

impl MembraneState {
    pub fn gating(&self) -> [f64; 3] {
        [self.m, self.n, self.h]
    }

    /// Transmembrane current density (uA/cm^2), positive depolarizing.
    pub fn membrane_current(&self, params: &ChannelParameters) -> f64 {
        IonChannel::ALL
            .iter()
            .map(|channel| channel.current(params, self))
            .sum()
    }

    /// The ionic current is linear in `v` once the gates are fixed:
    /// `I_m = drive - conductance * v`.
    pub fn ionic_linearization(&self, params: &ChannelParameters) -> IonicLinearization {
        IonChannel::ALL.iter().fold(
            IonicLinearization::default(),
            |mut acc, channel| {
                let g = channel.conductance(params, self);
                acc.conductance += g;
                acc.drive += g * channel.reversal(params);
                acc
            },
        )
    }
}

/// Total open conductance density (mS/cm^2) and `sum(g_x * E_x)` (uA/cm^2).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IonicLinearization {
    pub conductance: f64,
    pub drive: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IonChannel {
    Leak,
    Sodium,
    Potassium,
}

impl IonChannel {
    pub const ALL: [IonChannel; 3] = [IonChannel::Leak, IonChannel::Sodium, IonChannel::Potassium];

    pub fn reversal(&self, params: &ChannelParameters) -> f64 {
        match self {
            IonChannel::Leak => params.e_leak,
            IonChannel::Sodium => params.e_na,
            IonChannel::Potassium => params.e_k,
        }
    }

    /// Open conductance density given the gate states.
    pub fn conductance(&self, params: &ChannelParameters, state: &MembraneState) -> f64 {
        match self {
            IonChannel::Leak => params.g_leak,
            IonChannel::Sodium => state.g_na * state.m.powi(3) * state.h,
            IonChannel::Potassium => params.g_k * state.n.powi(4),
        }
    }

    pub fn current(&self, params: &ChannelParameters, state: &MembraneState) -> f64 {
        self.conductance(params, state) * (self.reversal(params) - state.v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn removable_singularities_use_limits() {
        assert_relative_eq!(alpha_m(25.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(alpha_n(10.0), 0.1, epsilon = 1e-12);
        // Continuity across the singular point
        assert_relative_eq!(alpha_m(25.0 + 1e-4), alpha_m(25.0), epsilon = 1e-5);
        assert_relative_eq!(alpha_m(25.0 - 1e-4), alpha_m(25.0), epsilon = 1e-5);
        assert_relative_eq!(alpha_n(10.0 + 1e-7), 0.1, epsilon = 1e-8);
        assert!(alpha_m(25.0).is_finite() && alpha_n(10.0).is_finite());
    }

    #[test]
    fn rates_at_rest_match_classic_values() {
        let rates = ChannelRates::at(0.0);
        assert_relative_eq!(rates.m.alpha, 0.2236, epsilon = 1e-4);
        assert_relative_eq!(rates.m.beta, 4.0, epsilon = 1e-12);
        assert_relative_eq!(rates.h.alpha, 0.07, epsilon = 1e-12);
        assert_relative_eq!(rates.h.beta, 0.0474, epsilon = 1e-4);
        assert_relative_eq!(rates.n.alpha, 0.0582, epsilon = 1e-4);
        assert_relative_eq!(rates.n.beta, 0.125, epsilon = 1e-12);
    }

    #[test]
    fn rates_are_positive_over_physiological_range() {
        for step in -200..=300 {
            let v = step as f64 * 0.5;
            let rates = ChannelRates::at(v);
            for gate in [rates.m, rates.n, rates.h] {
                assert!(gate.alpha > 0.0 && gate.beta > 0.0, "v={v}: {gate:?}");
            }
        }
    }

    #[test]
    fn current_matches_linearization() {
        let params = ChannelParameters::default();
        let state = MembraneState { v: 7.5, m: 0.3, n: 0.4, h: 0.6, g_na: 120.0, i_app: 0.0 };
        let lin = state.ionic_linearization(&params);
        let expected = 0.3 * (10.613 - 7.5)
            + 120.0 * 0.3_f64.powi(3) * 0.6 * (115.0 - 7.5)
            + 36.0 * 0.4_f64.powi(4) * (-12.0 - 7.5);
        assert_relative_eq!(state.membrane_current(&params), expected, epsilon = 1e-10);
        assert_relative_eq!(lin.drive - lin.conductance * state.v, expected, epsilon = 1e-10);
    }

    #[test]
    fn negative_conductance_rejected() {
        let params = ChannelParameters { g_k: -1.0, ..Default::default() };
        assert!(matches!(params.validate(), Err(AxonError::InvalidParameters(_))));
        assert!(ChannelParameters::default().validate().is_ok());
    }
}
