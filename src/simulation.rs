//! Run driver: owns all state and executes the per-step sequence
//! rates -> gates -> cable solve -> spike detection -> monitors.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::cable::CableSolver;
use crate::channels::{ChannelParameters, MembraneState};
use crate::compartments::{CylinderSpec, Morphology};
use crate::error::{AxonError, Result};
use crate::events::{SpikeCondition, SpikeDetector, SpikeEvent};
use crate::gating::settle_gates;
use crate::monitors::{RecordingConfig, SpikeMonitor, VoltageMonitor, VoltageSample};
use crate::stimulus::{Epoch, Protocol};

/// Membrane state every compartment starts from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum InitialState {
    Explicit { v: f64, m: f64, n: f64, h: f64 },
    /// Gates at their steady state for voltage `v`
    SteadyState { v: f64 },
}

impl Default for InitialState {
    fn default() -> Self {
        InitialState::Explicit { v: 0.0, m: 0.0, n: 0.5, h: 1.0 }
    }
}

impl InitialState {
    fn membrane(&self, g_na: f64) -> Result<MembraneState> {
        let mut state = MembraneState { v: 0.0, m: 0.0, n: 0.0, h: 0.0, g_na, i_app: 0.0 };
        match *self {
            InitialState::Explicit { v, m, n, h } => {
                if [m, n, h].iter().any(|x| !(0.0..=1.0).contains(x)) {
                    return Err(AxonError::InvalidParameters(format!(
                        "initial gates must lie in [0, 1], got m={m} n={n} h={h}"
                    )));
                }
                state.v = v;
                state.m = m;
                state.n = n;
                state.h = h;
            }
            InitialState::SteadyState { v } => {
                state.v = v;
                settle_gates(&mut state);
            }
        }
        if !state.v.is_finite() {
            return Err(AxonError::InvalidParameters(
                "initial voltage must be finite".to_owned(),
            ));
        }
        Ok(state)
    }
}

/// Everything needed to build a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub morphology: CylinderSpec,
    pub channels: ChannelParameters,
    pub spike_condition: SpikeCondition,
    /// ms
    pub dt: f64,
    /// |v| beyond this (mV) aborts the run
    pub voltage_bound: f64,
    pub initial: InitialState,
    pub recording: RecordingConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            morphology: CylinderSpec::default(),
            channels: ChannelParameters::default(),
            spike_condition: SpikeCondition::default(),
            dt: 0.01,
            voltage_bound: 250.0,
            initial: InitialState::default(),
            recording: RecordingConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Results handed to post-processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub dt: f64,
    /// Midpoint distance of every compartment (cm)
    pub distances: Vec<f64>,
    /// Compartments present in each voltage sample, in column order
    pub recorded: Vec<usize>,
    pub samples: Vec<VoltageSample>,
    pub spikes: Vec<SpikeEvent>,
}

#[derive(Debug, Clone)]
struct Halt {
    time: f64,
    compartment: usize,
    detail: String,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
    morphology: Morphology,
    cable: CableSolver,
    detector: SpikeDetector,
    voltage_monitor: VoltageMonitor,
    spike_monitor: SpikeMonitor,
    step: u64,
    fresh: Vec<SpikeEvent>,
    halted: Option<Halt>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let morphology = Morphology::cylinder(&config.morphology, &config.channels)?;
        let initial = config.initial.membrane(config.channels.g_na)?;
        let cable = CableSolver::new(
            &morphology,
            config.channels,
            config.dt,
            config.voltage_bound,
            initial,
        )?;
        cable.check_state(0.0)?;
        let detector = SpikeDetector::new(config.spike_condition, morphology.len())?;
        let mut voltage_monitor = VoltageMonitor::new(&config.recording, morphology.len())?;
        voltage_monitor.record(0, 0.0, cable.membrane());

        info!(
            "Simulation ready: {} compartments, dt = {} ms",
            morphology.len(),
            config.dt
        );
        Ok(Simulation {
            config,
            morphology,
            cable,
            detector,
            voltage_monitor,
            spike_monitor: SpikeMonitor::new(),
            step: 0,
            fresh: Vec::new(),
            halted: None,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn morphology(&self) -> &Morphology {
        &self.morphology
    }

    pub fn membrane(&self) -> &[MembraneState] {
        self.cable.membrane()
    }

    pub fn detector(&self) -> &SpikeDetector {
        &self.detector
    }

    pub fn spikes(&self) -> &SpikeMonitor {
        &self.spike_monitor
    }

    pub fn voltages(&self) -> &VoltageMonitor {
        &self.voltage_monitor
    }

    pub fn steps_taken(&self) -> u64 {
        self.step
    }

    /// Simulated time reached (ms).
    pub fn time(&self) -> f64 {
        self.step as f64 * self.config.dt
    }

    pub fn dt(&self) -> f64 {
        self.config.dt
    }

    /// Overrides the sodium conductance density (mS/cm^2) of one compartment.
    pub fn set_sodium_conductance(&mut self, compartment: usize, g_na: f64) -> Result<()> {
        if !(g_na.is_finite() && g_na >= 0.0) {
            return Err(AxonError::InvalidParameters(format!(
                "sodium conductance must be finite and non-negative, got {g_na}"
            )));
        }
        let n = self.cable.len();
        let state = self.cable.membrane_mut().get_mut(compartment).ok_or_else(|| {
            AxonError::InvalidParameters(format!("no compartment {compartment} in a fiber of {n}"))
        })?;
        state.g_na = g_na;
        Ok(())
    }

    /// Replaces the applied currents with the assignment of `epoch`.
    pub fn apply(&mut self, epoch: &Epoch) -> Result<()> {
        let currents = epoch.applied_currents(self.cable.len())?;
        self.cable.set_applied_currents(&currents);
        Ok(())
    }

    /// Advances one time step.
    pub fn step(&mut self) -> Result<()> {
        if let Some(halt) = &self.halted {
            return Err(AxonError::NumericalDivergence {
                time: halt.time,
                compartment: halt.compartment,
                detail: format!("run already aborted: {}", halt.detail),
            });
        }
        let time = (self.step + 1) as f64 * self.config.dt;

        self.cable.advance_gating();
        if let Err(err) = self.cable.solve_voltages(time) {
            if let AxonError::NumericalDivergence { time, compartment, detail } = &err {
                warn!("Aborting run: {err}");
                self.halted = Some(Halt {
                    time: *time,
                    compartment: *compartment,
                    detail: detail.clone(),
                });
            }
            return Err(err);
        }
        self.step += 1;

        self.fresh.clear();
        self.detector.detect(time, self.cable.membrane(), &mut self.fresh);
        self.spike_monitor.extend(self.fresh.drain(..));
        self.voltage_monitor.record(self.step, time, self.cable.membrane());
        Ok(())
    }

    /// Runs for `duration` ms with the currently applied currents.
    pub fn run(&mut self, duration: f64) -> Result<()> {
        let steps = Epoch::quiet(duration).steps(self.config.dt)?;
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    pub fn run_epoch(&mut self, epoch: &Epoch) -> Result<()> {
        let steps = epoch.steps(self.config.dt)?;
        self.apply(epoch)?;
        debug!(
            "Epoch at t = {:.3} ms: {} steps, currents {:?}",
            self.time(),
            steps,
            epoch.currents
        );
        let spikes_before = self.spike_monitor.count();
        for _ in 0..steps {
            self.step()?;
        }
        info!(
            "Epoch finished at t = {:.3} ms with {} new spikes",
            self.time(),
            self.spike_monitor.count() - spikes_before
        );
        Ok(())
    }

    pub fn run_protocol(&mut self, protocol: &Protocol) -> Result<()> {
        for epoch in &protocol.epochs {
            self.run_epoch(epoch)?;
        }
        let counts = self.spike_monitor.counts_per_compartment();
        info!(
            "Protocol done: {} spikes over {} of {} compartments",
            self.spike_monitor.count(),
            counts.len(),
            self.cable.len()
        );
        Ok(())
    }

    pub fn into_output(self) -> SimulationOutput {
        SimulationOutput {
            dt: self.config.dt,
            distances: self.morphology.distances(),
            recorded: self.voltage_monitor.indices().to_vec(),
            samples: self.voltage_monitor.into_samples(),
            spikes: self.spike_monitor.into_events(),
        }
    }
}
