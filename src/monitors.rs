//! Passive recorders for voltage traces and spike events.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::channels::MembraneState;
use crate::error::{AxonError, Result};
use crate::events::SpikeEvent;

/// Which compartments a voltage monitor keeps.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Recording {
    #[default]
    All,
    Compartments(Vec<usize>),
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    pub compartments: Recording,
    /// Keep one sample every `every` steps (1 = every step)
    pub every: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        RecordingConfig {
            compartments: Recording::All,
            every: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoltageSample {
    /// ms
    pub time: f64,
    /// mV, one entry per recorded compartment in `VoltageMonitor::indices` order
    pub voltages: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct VoltageMonitor {
    indices: Vec<usize>,
    every: usize,
    samples: Vec<VoltageSample>,
}

impl VoltageMonitor {
    pub fn new(config: &RecordingConfig, compartments: usize) -> Result<Self> {
        if config.every == 0 {
            return Err(AxonError::InvalidParameters(
                "recording cadence must be at least one step".to_owned(),
            ));
        }
        let indices = match &config.compartments {
            Recording::All => (0..compartments).collect(),
            Recording::Nothing => Vec::new(),
            Recording::Compartments(chosen) => {
                if let Some(bad) = chosen.iter().find(|&&i| i >= compartments) {
                    return Err(AxonError::InvalidParameters(format!(
                        "cannot record compartment {bad} of {compartments}"
                    )));
                }
                chosen.clone()
            }
        };
        Ok(VoltageMonitor {
            indices,
            every: config.every,
            samples: Vec::new(),
        })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn samples(&self) -> &[VoltageSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<VoltageSample> {
        self.samples
    }

    /// Records the state reached after `step` steps if that step is sampled.
    pub fn record(&mut self, step: u64, time: f64, membrane: &[MembraneState]) {
        if self.indices.is_empty() || step % self.every as u64 != 0 {
            return;
        }
        self.samples.push(VoltageSample {
            time,
            voltages: self.indices.iter().map(|&i| membrane[i].v).collect(),
        });
    }

    /// Voltage trace of one recorded compartment, as `(time, v)` pairs.
    pub fn trace(&self, compartment: usize) -> Option<Vec<(f64, f64)>> {
        let column = self.indices.iter().position(|&i| i == compartment)?;
        Some(
            self.samples
                .iter()
                .map(|sample| (sample.time, sample.voltages[column]))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpikeMonitor {
    events: Vec<SpikeEvent>,
}

impl SpikeMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = SpikeEvent>) {
        self.events.extend(events);
    }

    pub fn events(&self) -> &[SpikeEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<SpikeEvent> {
        self.events
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }

    pub fn spikes_of(&self, compartment: usize) -> impl Iterator<Item = &SpikeEvent> + '_ {
        self.events
            .iter()
            .filter(move |event| event.compartment == compartment)
    }

    pub fn counts_per_compartment(&self) -> HashMap<usize, usize> {
        self.events.iter().map(|event| event.compartment).counts()
    }

    /// Events within `[start, end)` ms.
    pub fn between(&self, start: f64, end: f64) -> impl Iterator<Item = &SpikeEvent> + '_ {
        self.events
            .iter()
            .filter(move |event| event.time >= start && event.time < end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn membrane(voltages: &[f64]) -> Vec<MembraneState> {
        voltages
            .iter()
            .map(|&v| MembraneState { v, m: 0.0, n: 0.0, h: 1.0, g_na: 120.0, i_app: 0.0 })
            .collect()
    }

    #[test]
    fn decimated_subset_recording() {
        let config = RecordingConfig {
            compartments: Recording::Compartments(vec![2, 0]),
            every: 3,
        };
        let mut monitor = VoltageMonitor::new(&config, 4).unwrap();
        for step in 0..10u64 {
            let v = step as f64;
            monitor.record(step, v * 0.1, &membrane(&[v, -1.0, 10.0 * v, -1.0]));
        }
        // steps 0, 3, 6, 9
        assert_eq!(monitor.samples().len(), 4);
        assert_eq!(monitor.samples()[1].voltages, vec![30.0, 3.0]);
        let trace = monitor.trace(0).unwrap();
        assert_eq!(trace.iter().map(|(_, v)| *v).collect::<Vec<_>>(), vec![0.0, 3.0, 6.0, 9.0]);
        assert!(monitor.trace(1).is_none());
    }

    #[test]
    fn invalid_recording_rejected() {
        let out_of_range = RecordingConfig {
            compartments: Recording::Compartments(vec![7]),
            every: 1,
        };
        assert!(VoltageMonitor::new(&out_of_range, 4).is_err());
        let never = RecordingConfig { every: 0, ..Default::default() };
        assert!(VoltageMonitor::new(&never, 4).is_err());
    }

    #[test]
    fn nothing_records_nothing() {
        let config = RecordingConfig { compartments: Recording::Nothing, every: 1 };
        let mut monitor = VoltageMonitor::new(&config, 3).unwrap();
        monitor.record(0, 0.0, &membrane(&[1.0, 2.0, 3.0]));
        assert!(monitor.samples().is_empty());
    }

    #[test]
    fn spike_queries() {
        let mut monitor = SpikeMonitor::new();
        monitor.extend([
            SpikeEvent { compartment: 0, time: 1.0 },
            SpikeEvent { compartment: 1, time: 1.2 },
            SpikeEvent { compartment: 0, time: 9.0 },
        ]);
        assert_eq!(monitor.count(), 3);
        assert_eq!(monitor.spikes_of(0).count(), 2);
        assert_eq!(monitor.counts_per_compartment()[&1], 1);
        assert_eq!(monitor.between(1.0, 5.0).count(), 2);
    }
}
