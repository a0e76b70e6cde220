use thiserror::Error;

pub type Result<T> = std::result::Result<T, AxonError>;

/// Everything that can go wrong while building or running a fiber simulation.
#[derive(Debug, Error)]
pub enum AxonError {
    /// Geometry cannot be discretized (non-positive length, diameter or compartment count).
    #[error("invalid morphology: {0}")]
    InvalidMorphology(String),

    /// Construction or epoch parameters are inconsistent.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// State left its physically valid range; the run is aborted and must be re-run
    /// with a smaller time step or corrected parameters.
    #[error("numerical divergence at t={time:.4} ms in compartment {compartment}: {detail}")]
    NumericalDivergence {
        time: f64,
        compartment: usize,
        detail: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted table could not be parsed.
    #[error("parse error on line {line}: {detail}")]
    Parse { line: usize, detail: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divergence_message_names_compartment_and_time() {
        let err = AxonError::NumericalDivergence {
            time: 12.5,
            compartment: 42,
            detail: "v=1e9".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("compartment 42"));
        assert!(msg.contains("12.5000"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing table");
        let err = AxonError::from(io_err);
        assert!(matches!(err, AxonError::Io(_)));
        assert!(err.to_string().contains("missing table"));
    }
}
