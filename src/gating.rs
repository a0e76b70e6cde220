//! Exponential-Euler integration of the gating variables.
//!
//! With `v` held fixed over a step, `dx/dt = alpha (1 - x) - beta x` is linear in `x`
//! and is solved exactly. The update is a convex combination of the old value and
//! the steady state, so a gate in `[0, 1]` stays there for any `dt > 0`.

use crate::channels::{ChannelRates, GateRates, MembraneState};

impl GateRates {
    pub fn steady_state(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// ms
    pub fn time_constant(&self) -> f64 {
        1.0 / (self.alpha + self.beta)
    }

    /// Advances one gate by `dt` milliseconds.
    pub fn advance(&self, x: f64, dt: f64) -> f64 {
        let total = self.alpha + self.beta;
        if total <= 0.0 {
            return x;
        }
        let x_inf = self.alpha / total;
        let decay = (-dt * total).exp();
        x * decay + x_inf * (1.0 - decay)
    }
}

impl ChannelRates {
    /// Fastest gating time constant (ms); `dt` should sit well below it.
    pub fn fastest_time_constant(&self) -> f64 {
        [self.m, self.n, self.h]
            .iter()
            .map(GateRates::time_constant)
            .fold(f64::INFINITY, f64::min)
    }
}

/// Recomputes the rates from the current voltage and advances m, n and h.
pub fn advance_gates(state: &mut MembraneState, dt: f64) {
    let rates = ChannelRates::at(state.v);
    state.m = rates.m.advance(state.m, dt);
    state.n = rates.n.advance(state.n, dt);
    state.h = rates.h.advance(state.h, dt);
}

/// Sets every gate to its steady state at the state's voltage.
pub fn settle_gates(state: &mut MembraneState) {
    let rates = ChannelRates::at(state.v);
    state.m = rates.m.steady_state();
    state.n = rates.n.steady_state();
    state.h = rates.h.steady_state();
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn state(v: f64, m: f64, n: f64, h: f64) -> MembraneState {
        MembraneState { v, m, n, h, g_na: 120.0, i_app: 0.0 }
    }

    #[test]
    fn matches_closed_form_solution() {
        let rates = GateRates { alpha: 0.5, beta: 1.5 };
        let x0 = 0.9;
        let dt = 0.3;
        let expected = 0.25 + (x0 - 0.25) * (-dt * 2.0_f64).exp();
        assert_relative_eq!(rates.advance(x0, dt), expected, epsilon = 1e-14);
    }

    #[test]
    fn two_half_steps_equal_one_full_step() {
        let rates = ChannelRates::at(12.0).m;
        let whole = rates.advance(0.1, 0.02);
        let halves = rates.advance(rates.advance(0.1, 0.01), 0.01);
        assert_relative_eq!(whole, halves, epsilon = 1e-14);
    }

    #[test]
    fn huge_steps_land_on_steady_state() {
        let rates = ChannelRates::at(40.0).n;
        assert_relative_eq!(rates.advance(0.0, 1e6), rates.steady_state(), epsilon = 1e-14);
    }

    proptest! {
        // Property: the exponential update never leaves [0, 1], however large the step
        #[test]
        fn gates_stay_bounded_for_any_step(
            v in -150.0f64..150.0,
            log_dt in -6.0f64..4.0,
            x0 in 0.0f64..=1.0,
        ) {
            let dt = 10f64.powf(log_dt);
            let mut s = state(v, x0, x0, x0);
            for _ in 0..5 {
                advance_gates(&mut s, dt);
                for x in s.gating() {
                    prop_assert!((0.0..=1.0).contains(&x), "v={} dt={} x0={}: {}", v, dt, x0, x);
                }
            }
        }

        // Property: every step moves each gate towards its steady state without overshoot
        #[test]
        fn gates_approach_steady_state_monotonically(
            v in -150.0f64..150.0,
            dt in 1e-4f64..1.0,
            x0 in 0.0f64..=1.0,
        ) {
            let rates = ChannelRates::at(v);
            for gate in [rates.m, rates.n, rates.h] {
                let x_inf = gate.steady_state();
                let x1 = gate.advance(x0, dt);
                prop_assert!((x1 - x_inf).abs() <= (x0 - x_inf).abs() + 1e-15);
                prop_assert!((x1 - x_inf) * (x0 - x_inf) >= -1e-15);
            }
        }
    }

    #[test]
    fn settled_gates_are_fixed_points() {
        let mut s = state(0.0, 0.0, 0.5, 1.0);
        settle_gates(&mut s);
        assert_relative_eq!(s.m, 0.0529, epsilon = 1e-4);
        assert_relative_eq!(s.n, 0.3177, epsilon = 1e-4);
        assert_relative_eq!(s.h, 0.5961, epsilon = 1e-4);
        let before = s;
        advance_gates(&mut s, 0.01);
        assert_relative_eq!(s.m, before.m, epsilon = 1e-15);
        assert_relative_eq!(s.n, before.n, epsilon = 1e-15);
        assert_relative_eq!(s.h, before.h, epsilon = 1e-15);
    }

    #[test]
    fn sodium_activation_is_fastest_gate() {
        let rates = ChannelRates::at(0.0);
        assert_relative_eq!(rates.fastest_time_constant(), rates.m.time_constant());
        assert!(rates.fastest_time_constant() < 0.25);
    }
}
