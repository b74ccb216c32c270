use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrajalignError {
    #[error("There are no trajectories in the list; check that the trajectories were loaded correctly")]
    EmptyTrajectoryList,

    #[error("Missing required annotation: {0}")]
    MissingAnnotation(String),

    #[error("Invalid value for annotation '{key}': {value}")]
    InvalidAnnotation { key: String, value: String },

    #[error("The two trajectories have different delta_t: {left} and {right}")]
    DeltaTMismatch { left: f64, right: f64 },

    #[error("The number of trajectories for ch1 ({ch1}) and for ch2 ({ch2}) differ")]
    ChannelCountMismatch { ch1: usize, ch2: usize },

    #[error("The rigid alignment requires fluorescence intensity values on both trajectories")]
    MissingIntensity,

    #[error("Length mismatch: {left} vs {right} samples")]
    LengthMismatch { left: usize, right: usize },

    #[error("Overlap selection returned {found} samples where {expected} were expected")]
    OverlapSelectionMismatch { expected: usize, found: usize },

    #[error("No lag candidate produced overlapping frames between trajectory {target} and reference {reference}")]
    NoOverlap { reference: usize, target: usize },

    #[error("The rigid alignment is undefined at every lag: no overlapping frame has both intensities")]
    UndefinedRotation,

    #[error("The two trajectories do not overlap in time")]
    NoTemporalOverlap,

    #[error("Invalid alignment parameter: {0}")]
    InvalidAlignParameter(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Missing column in trajectory file: {0}")]
    MissingColumn(String),

    #[error("Cannot parse value '{value}' in column '{column}'")]
    ParseColumn { column: String, value: String },
}

impl PartialEq for TrajalignError {
    fn eq(&self, other: &Self) -> bool {
        use TrajalignError::*;
        match (self, other) {
            (EmptyTrajectoryList, EmptyTrajectoryList) => true,
            (MissingAnnotation(a), MissingAnnotation(b)) => a == b,
            (
                InvalidAnnotation { key: k1, value: v1 },
                InvalidAnnotation { key: k2, value: v2 },
            ) => k1 == k2 && v1 == v2,
            (DeltaTMismatch { left: l1, right: r1 }, DeltaTMismatch { left: l2, right: r2 }) => {
                l1 == l2 && r1 == r2
            }
            (ChannelCountMismatch { ch1: a1, ch2: b1 }, ChannelCountMismatch { ch1: a2, ch2: b2 }) => {
                a1 == a2 && b1 == b2
            }
            (MissingIntensity, MissingIntensity) => true,
            (LengthMismatch { left: l1, right: r1 }, LengthMismatch { left: l2, right: r2 }) => {
                l1 == l2 && r1 == r2
            }
            (
                OverlapSelectionMismatch {
                    expected: e1,
                    found: f1,
                },
                OverlapSelectionMismatch {
                    expected: e2,
                    found: f2,
                },
            ) => e1 == e2 && f1 == f2,
            (
                NoOverlap {
                    reference: r1,
                    target: t1,
                },
                NoOverlap {
                    reference: r2,
                    target: t2,
                },
            ) => r1 == r2 && t1 == t2,
            (UndefinedRotation, UndefinedRotation) => true,
            (NoTemporalOverlap, NoTemporalOverlap) => true,
            (InvalidAlignParameter(a), InvalidAlignParameter(b)) => a == b,

            // Wrapped foreign errors are not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            (MissingColumn(a), MissingColumn(b)) => a == b,

            (
                ParseColumn {
                    column: c1,
                    value: v1,
                },
                ParseColumn {
                    column: c2,
                    value: v2,
                },
            ) => c1 == c2 && v1 == v2,

            _ => false,
        }
    }
}
