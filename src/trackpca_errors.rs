use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackPcaError {
    #[error("Accumulator is empty: {0} requires at least one sample with non-zero weight")]
    EmptyAccumulator(&'static str),

    #[error("Quantile cache is empty: no sample was retained")]
    EmptyCache,

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid quantile level: {0} (must lie in [0, 1])")]
    InvalidQuantile(f64),

    #[error("No sample accepted during {0}")]
    NoAcceptedSamples(&'static str),

    #[error("Invalid fit parameter: {0}")]
    InvalidFitParameter(String),

    #[error("Linear solver failure: {0}")]
    LinearSolver(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV reading error: {0}")]
    CsvError(#[from] csv::Error),
}

impl PartialEq for TrackPcaError {
    fn eq(&self, other: &Self) -> bool {
        use TrackPcaError::*;
        match (self, other) {
            (EmptyAccumulator(a), EmptyAccumulator(b)) => a == b,
            (EmptyCache, EmptyCache) => true,
            (
                DimensionMismatch {
                    what: wa,
                    expected: ea,
                    found: fa,
                },
                DimensionMismatch {
                    what: wb,
                    expected: eb,
                    found: fb,
                },
            ) => wa == wb && ea == eb && fa == fb,
            (InvalidQuantile(a), InvalidQuantile(b)) => a == b,
            (NoAcceptedSamples(a), NoAcceptedSamples(b)) => a == b,
            (InvalidFitParameter(a), InvalidFitParameter(b)) => a == b,
            (LinearSolver(a), LinearSolver(b)) => a == b,

            // I/O and CSV errors carry no comparable payload: same variant is enough
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            _ => false,
        }
    }
}
