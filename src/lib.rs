//! Action potential propagation along an unbranched axon.
//!
//! The fiber is cut into equal compartments coupled through their axial resistance,
//! each carrying Hodgkin-Huxley sodium, potassium and leak channels.
//!
//! Units throughout: mV (measured from rest), ms, cm (diameters given in um),
//! uF/cm^2, mS/cm^2, ohm cm, uA for point currents.

pub mod analysis;
pub mod cable;
pub mod channels;
pub mod compartments;
pub mod error;
pub mod events;
pub mod gating;
pub mod monitors;
pub mod records;
pub mod simulation;
pub mod stimulus;

#[cfg(feature = "python")]
mod python;

pub use analysis::{ConductionEstimate, LinearFit, conduction_velocity};
pub use channels::{ChannelParameters, MembraneState};
pub use compartments::{Compartment, CylinderSpec, Morphology};
pub use error::{AxonError, Result};
pub use events::{Refractoriness, SpikeCondition, SpikeEvent, StateVariable};
pub use monitors::{Recording, RecordingConfig, VoltageSample};
pub use simulation::{InitialState, Simulation, SimulationConfig, SimulationOutput};
pub use stimulus::{Epoch, Protocol};
