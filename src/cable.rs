//! Voltage update along the compartment chain.
//!
//! Gates are advanced first, then the voltages are found from the backward-Euler
//! cable equation. With the gates frozen the ionic current is linear in `v`, so each
//! step is a single tridiagonal solve:
//!
//! ```text
//! (C/dt + g_ion + c_l + c_r) v'_i - c_l v'_{i-1} - c_r v'_{i+1}
//!     = (C/dt) v_i + sum(g_x E_x) + I_app / A
//! ```
//!
//! where `c_l`, `c_r` are the axial conductances to the neighbours per unit membrane
//! area (zero at the sealed ends).

use log::{debug, warn};
use rayon::prelude::*;

use crate::channels::{ChannelParameters, ChannelRates, MembraneState};
use crate::compartments::Morphology;
use crate::error::{AxonError, Result};
use crate::gating::advance_gates;

/// Chains at least this long have their gates advanced on the rayon pool.
pub const PARALLEL_THRESHOLD: usize = 4096;

/// How far outside `[0, 1]` a gate may drift through rounding before the run is aborted.
pub const GATE_TOLERANCE: f64 = 1e-9;

/// Row `i` whose pivot vanished during forward elimination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingularPivot(pub usize);

/// Tridiagonal system `lower[i] x[i-1] + diag[i] x[i] + upper[i] x[i+1] = rhs[i]`.
///
/// `lower[0]` and `upper[n-1]` are ignored.
#[derive(Debug, Clone)]
pub struct Tridiagonal {
    lower: Vec<f64>,
    diag: Vec<f64>,
    upper: Vec<f64>,
    rhs: Vec<f64>,
    sweep: Vec<f64>,
}

impl Tridiagonal {
    pub fn new(n: usize) -> Self {
        Tridiagonal {
            lower: vec![0.0; n],
            diag: vec![0.0; n],
            upper: vec![0.0; n],
            rhs: vec![0.0; n],
            sweep: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.diag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diag.is_empty()
    }

    pub fn set_row(&mut self, i: usize, lower: f64, diag: f64, upper: f64, rhs: f64) {
        self.lower[i] = lower;
        self.diag[i] = diag;
        self.upper[i] = upper;
        self.rhs[i] = rhs;
    }

    /// Thomas algorithm: forward elimination then back-substitution, O(n).
    /// The right-hand side is consumed.
    pub fn solve_into(&mut self, x: &mut [f64]) -> std::result::Result<(), SingularPivot> {
        let n = self.len();
        debug_assert_eq!(x.len(), n);
        if n == 0 {
            return Ok(());
        }

        let mut pivot = self.diag[0];
        if pivot == 0.0 || !pivot.is_finite() {
            return Err(SingularPivot(0));
        }
        self.sweep[0] = self.upper[0] / pivot;
        self.rhs[0] /= pivot;
        for i in 1..n {
            pivot = self.diag[i] - self.lower[i] * self.sweep[i - 1];
            if pivot == 0.0 || !pivot.is_finite() {
                return Err(SingularPivot(i));
            }
            self.sweep[i] = self.upper[i] / pivot;
            self.rhs[i] = (self.rhs[i] - self.lower[i] * self.rhs[i - 1]) / pivot;
        }

        x[n - 1] = self.rhs[n - 1];
        for i in (0..n - 1).rev() {
            x[i] = self.rhs[i] - self.sweep[i] * x[i + 1];
        }
        Ok(())
    }
}

/// Owns the membrane state of every compartment and advances it in time.
#[derive(Debug, Clone)]
pub struct CableSolver {
    params: ChannelParameters,
    dt: f64,
    voltage_bound: f64,
    areas: Vec<f64>,
    capacitance: Vec<f64>,
    coupling_left: Vec<f64>,
    coupling_right: Vec<f64>,
    membrane: Vec<MembraneState>,
    system: Tridiagonal,
    solution: Vec<f64>,
}

/// Axial conductance of a link (mS) spread over the membrane area (mS/cm^2).
fn coupling(resistance: Option<f64>, area: f64) -> f64 {
    resistance.map_or(0.0, |r| 1e3 / r / area)
}

impl CableSolver {
    pub fn new(
        morphology: &Morphology,
        params: ChannelParameters,
        dt: f64,
        voltage_bound: f64,
        initial: MembraneState,
    ) -> Result<Self> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(AxonError::InvalidParameters(format!(
                "time step must be positive, got {dt}"
            )));
        }
        if !(voltage_bound.is_finite() && voltage_bound > 0.0) {
            return Err(AxonError::InvalidParameters(format!(
                "voltage bound must be positive, got {voltage_bound}"
            )));
        }
        params.validate()?;

        let n = morphology.len();
        let areas: Vec<f64> = morphology.compartments.iter().map(|c| c.area()).collect();
        let capacitance: Vec<f64> = morphology.compartments.iter().map(|c| c.capacitance()).collect();
        let coupling_left: Vec<f64> = morphology
            .compartments
            .iter()
            .map(|c| coupling(c.resistance_left(), c.area()))
            .collect();
        let coupling_right: Vec<f64> = morphology
            .compartments
            .iter()
            .map(|c| coupling(c.resistance_right(), c.area()))
            .collect();

        let solver = CableSolver {
            params,
            dt,
            voltage_bound,
            areas,
            capacitance,
            coupling_left,
            coupling_right,
            membrane: vec![initial; n],
            system: Tridiagonal::new(n),
            solution: vec![0.0; n],
        };
        solver.report_stability(&initial);
        Ok(solver)
    }

    fn report_stability(&self, initial: &MembraneState) {
        let fastest = ChannelRates::at(initial.v).fastest_time_constant();
        let diffusive = self
            .coupling_left
            .iter()
            .zip(&self.coupling_right)
            .zip(&self.capacitance)
            .map(|((l, r), c)| c / (l + r))
            .filter(|tau| tau.is_finite())
            .fold(f64::INFINITY, f64::min);
        debug!(
            "dt = {} ms, fastest gating tau = {:.4} ms, diffusive tau = {:.4e} ms",
            self.dt, fastest, diffusive
        );
        if self.dt > fastest / 2.0 {
            warn!(
                "Time step {} ms is coarse against the fastest gating time constant {:.4} ms",
                self.dt, fastest
            );
        }
    }

    pub fn len(&self) -> usize {
        self.membrane.len()
    }

    pub fn is_empty(&self) -> bool {
        self.membrane.is_empty()
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn params(&self) -> &ChannelParameters {
        &self.params
    }

    pub fn membrane(&self) -> &[MembraneState] {
        &self.membrane
    }

    pub fn membrane_mut(&mut self) -> &mut [MembraneState] {
        &mut self.membrane
    }

    pub fn voltages(&self) -> impl Iterator<Item = f64> + '_ {
        self.membrane.iter().map(|s| s.v)
    }

    /// Replaces the applied current everywhere; `currents` is indexed by compartment (uA).
    pub fn set_applied_currents(&mut self, currents: &[f64]) {
        for (state, &i_app) in self.membrane.iter_mut().zip(currents) {
            state.i_app = i_app;
        }
    }

    /// Steps (1) and (2): rates from the present voltages, then exponential-Euler gates.
    pub fn advance_gating(&mut self) {
        let dt = self.dt;
        if self.membrane.len() >= PARALLEL_THRESHOLD {
            self.membrane
                .par_iter_mut()
                .for_each(|state| advance_gates(state, dt));
        } else {
            self.membrane
                .iter_mut()
                .for_each(|state| advance_gates(state, dt));
        }
    }

    /// Step (3): implicit voltage update using the freshly advanced gates.
    /// `time` is the time reached at the end of the step, used for error reports.
    pub fn solve_voltages(&mut self, time: f64) -> Result<()> {
        let n = self.membrane.len();
        for i in 0..n {
            let state = &self.membrane[i];
            let ionic = state.ionic_linearization(&self.params);
            let c_dt = self.capacitance[i] / self.dt;
            let left = self.coupling_left[i];
            let right = self.coupling_right[i];
            self.system.set_row(
                i,
                -left,
                c_dt + ionic.conductance + left + right,
                -right,
                c_dt * state.v + ionic.drive + state.i_app / self.areas[i],
            );
        }

        self.system
            .solve_into(&mut self.solution)
            .map_err(|SingularPivot(row)| AxonError::NumericalDivergence {
                time,
                compartment: row,
                detail: "singular pivot in cable solve".to_owned(),
            })?;

        for (state, &v) in self.membrane.iter_mut().zip(&self.solution) {
            state.v = v;
        }
        self.check_state(time)
    }

    /// Fails if any voltage or gate has left its plausible range.
    pub fn check_state(&self, time: f64) -> Result<()> {
        let gate_range = -GATE_TOLERANCE..=1.0 + GATE_TOLERANCE;
        for (compartment, state) in self.membrane.iter().enumerate() {
            if !state.v.is_finite() || state.v.abs() > self.voltage_bound {
                return Err(AxonError::NumericalDivergence {
                    time,
                    compartment,
                    detail: format!(
                        "voltage {} mV outside +/-{} mV",
                        state.v, self.voltage_bound
                    ),
                });
            }
            for (name, x) in ["m", "n", "h"].iter().zip(state.gating()) {
                if !gate_range.contains(&x) {
                    return Err(AxonError::NumericalDivergence {
                        time,
                        compartment,
                        detail: format!("gating variable {name} = {x} outside [0, 1]"),
                    });
                }
            }
        }
        Ok(())
    }
}
