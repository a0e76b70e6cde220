//! Python bindings, enabled with the `python` feature.

use std::collections::BTreeMap;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::analysis::conduction_velocity;
use crate::compartments::CylinderSpec;
use crate::error::AxonError;
use crate::simulation::{Simulation, SimulationConfig};
use crate::stimulus::Epoch;

impl From<AxonError> for PyErr {
    fn from(err: AxonError) -> PyErr {
        match err {
            AxonError::NumericalDivergence { .. } | AxonError::Io(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

/// A fiber simulation driven epoch by epoch from Python.
#[pyclass(name = "Axon")]
pub struct PyAxon {
    inner: Simulation,
}

#[pymethods]
impl PyAxon {
    #[new]
    #[pyo3(signature = (length=10.0, diameter_um=476.0, compartments=1000, dt=0.01))]
    fn new(length: f64, diameter_um: f64, compartments: usize, dt: f64) -> PyResult<Self> {
        let config = SimulationConfig {
            morphology: CylinderSpec { length, diameter_um, compartments },
            dt,
            ..Default::default()
        };
        Ok(PyAxon { inner: Simulation::new(config)? })
    }

    #[staticmethod]
    fn from_json(text: &str) -> PyResult<Self> {
        let config = SimulationConfig::from_json(text)?;
        Ok(PyAxon { inner: Simulation::new(config)? })
    }

    /// Runs `duration` ms with `currents` (compartment -> uA) applied; zero elsewhere.
    #[pyo3(signature = (duration, currents=BTreeMap::new()))]
    fn run(&mut self, duration: f64, currents: BTreeMap<usize, f64>) -> PyResult<()> {
        self.inner.run_epoch(&Epoch { duration, currents })?;
        Ok(())
    }

    fn set_sodium_conductance(&mut self, compartment: usize, g_na: f64) -> PyResult<()> {
        self.inner.set_sodium_conductance(compartment, g_na)?;
        Ok(())
    }

    #[getter]
    fn time(&self) -> f64 {
        self.inner.time()
    }

    #[getter]
    fn distances(&self) -> Vec<f64> {
        self.inner.morphology().distances()
    }

    /// `(compartment, time)` pairs in emission order.
    fn spikes(&self) -> Vec<(usize, f64)> {
        self.inner
            .spikes()
            .events()
            .iter()
            .map(|event| (event.compartment, event.time))
            .collect()
    }

    fn voltage_trace(&self, compartment: usize) -> Option<Vec<(f64, f64)>> {
        self.inner.voltages().trace(compartment)
    }

    /// Least-squares conduction velocity (m/s), None without enough spikes.
    fn velocity(&self) -> Option<f64> {
        let distances = self.inner.morphology().distances();
        conduction_velocity(self.inner.spikes().events(), &distances).map(|e| e.velocity)
    }
}

#[pymodule]
pub mod axon_rs {
    #[pymodule_export]
    use super::PyAxon;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axon_runs_from_python() {
        Python::initialize();
        Python::attach(|py| {
            let mut axon = PyAxon::new(1.0, 476.0, 50, 0.01).unwrap();
            axon.run(3.0, BTreeMap::from([(0, 1.0)])).unwrap();
            axon.run(5.0, BTreeMap::new()).unwrap();
            assert!((axon.time() - 8.0).abs() < 1e-9);
            assert_eq!(axon.distances().len(), 50);
            assert!(!axon.spikes().is_empty());

            let bound = Py::new(py, axon).unwrap();
            assert!(bound.borrow(py).velocity().is_some());
        });
    }

    #[test]
    fn invalid_geometry_raises_value_error() {
        Python::initialize();
        Python::attach(|py| {
            let err = PyAxon::new(1.0, 476.0, 0, 0.01).err().unwrap();
            assert!(err.is_instance_of::<PyValueError>(py));
        });
    }
}
