use std::f64::consts::PI;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::channels::ChannelParameters;
use crate::error::{AxonError, Result};

/// Geometry of the unbranched fiber to discretize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CylinderSpec {
    /// Total fiber length (cm)
    pub length: f64,
    /// Fiber diameter (um)
    pub diameter_um: f64,
    /// Number of equal compartments
    pub compartments: usize,
}

impl Default for CylinderSpec {
    fn default() -> Self {
        // Squid giant axon: 10 cm long, 2 * 238 um across
        Self {
            length: 10.0,
            diameter_um: 476.0,
            compartments: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Compartment {
    idx: usize,
    /// Midpoint position along the axis (cm)
    distance: f64,
    /// cm
    length: f64,
    /// cm
    diameter: f64,
    /// uF/cm^2
    capacitance: f64,
    /// Resistance between this midpoint and the neighbour's midpoint (ohm), None at a sealed end
    resistance_left: Option<f64>,
    resistance_right: Option<f64>,
}

impl Compartment {
    pub fn index(&self) -> usize {
        self.idx
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn capacitance(&self) -> f64 {
        self.capacitance
    }

    pub fn resistance_left(&self) -> Option<f64> {
        self.resistance_left
    }

    pub fn resistance_right(&self) -> Option<f64> {
        self.resistance_right
    }

    /// Lateral membrane area (cm^2)
    pub fn area(&self) -> f64 {
        PI * self.diameter * self.length
    }

    pub fn cross_section(&self) -> f64 {
        PI * square(self.diameter) / 4.0
    }
}

fn square(x: f64) -> f64 {
    x * x
}

/// Resistance of a cylinder of `length` and `cross_section` along its axis (ohm).
fn axial_resistance(resistivity: f64, length: f64, cross_section: f64) -> f64 {
    resistivity * length / cross_section
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AxonError::InvalidMorphology(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

/// Ordered chain of compartments, index 0 at the origin of the fiber.
#[derive(Debug, Clone, PartialEq)]
pub struct Morphology {
    pub compartments: Vec<Compartment>,
    total_length: f64,
}

impl Morphology {
    /// Cuts a cylinder into `spec.compartments` equal pieces.
    ///
    /// Neighbouring midpoints are joined by half of each compartment's axial
    /// resistance, which for equal pieces is exactly
    /// `R = resistivity * compartment_length / cross_section`.
    pub fn cylinder(spec: &CylinderSpec, params: &ChannelParameters) -> Result<Morphology> {
        if spec.compartments < 1 {
            return Err(AxonError::InvalidMorphology(
                "a fiber needs at least one compartment".to_owned(),
            ));
        }
        require_positive("length", spec.length)?;
        require_positive("diameter", spec.diameter_um)?;
        require_positive("resistivity", params.resistivity)?;
        require_positive("capacitance", params.capacitance)?;

        let n = spec.compartments;
        let diameter = spec.diameter_um * 1e-4;
        let length = spec.length / n as f64;
        let half = axial_resistance(params.resistivity, length / 2.0, PI * square(diameter) / 4.0);

        let compartments: Vec<Compartment> = (0..n)
            .map(|idx| Compartment {
                idx,
                distance: (idx as f64 + 0.5) * length,
                length,
                diameter,
                capacitance: params.capacitance,
                resistance_left: (idx > 0).then_some(half + half),
                resistance_right: (idx + 1 < n).then_some(half + half),
            })
            .collect();

        let morphology = Morphology {
            compartments,
            total_length: spec.length,
        };
        info!(
            "Built cylinder: {} compartments of {:.4e} cm, diameter {:.4e} cm",
            n, length, diameter
        );
        debug!(
            "Axial resistance {:.4} ohm, space constant {:.4} cm",
            half + half,
            morphology.space_constant(params)
        );
        Ok(morphology)
    }

    pub fn len(&self) -> usize {
        self.compartments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compartments.is_empty()
    }

    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    pub fn distances(&self) -> Vec<f64> {
        self.compartments.iter().map(Compartment::distance).collect()
    }

    /// Passive space constant `sqrt(d * R_m / (4 * R_i))` (cm) of the first compartment,
    /// using the leak as membrane resistance.
    pub fn space_constant(&self, params: &ChannelParameters) -> f64 {
        let Some(first) = self.compartments.first() else {
            return 0.0;
        };
        // mS/cm^2 -> ohm cm^2
        let membrane_resistance = 1e3 / params.g_leak;
        (first.diameter * membrane_resistance / (4.0 * params.resistivity)).sqrt()
    }
}
