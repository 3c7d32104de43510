use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KinFitError {
    #[error("Invalid fit parameter: {0}")]
    InvalidFitParameter(String),

    #[error("Unsupported parametrization: {0}")]
    UnsupportedParametrization(String),

    #[error("Unsupported constraint: {0}")]
    UnsupportedConstraint(String),

    #[error("Constraint {constraint} is not available for the {channel} channel")]
    ConstraintNotAvailable { constraint: String, channel: String },

    #[error("Unknown decay channel: {0}")]
    UnknownChannel(String),

    #[error("Particle handle {0} does not belong to this fitter")]
    UnknownParticle(usize),

    #[error("Particle {0} has not been initialized")]
    ParticleNotInitialized(String),

    #[error("Constraint {0} has no participating particle")]
    EmptyConstraint(String),

    #[error("Constraint {constraint} has an invalid target value {target}")]
    InvalidConstraintTarget { constraint: String, target: f64 },

    #[error("Covariance of particle {particle} has dimension {found}x{found_cols}, expected {expected}x{expected}")]
    CovarianceDimension {
        particle: String,
        expected: usize,
        found: usize,
        found_cols: usize,
    },

    #[error("Invalid covariance for particle {particle}: {reason}")]
    InvalidCovariance { particle: String, reason: String },

    #[error("Parametrization {parametrization} is degenerate for particle {particle}: {reason}")]
    DegenerateParametrization {
        particle: String,
        parametrization: String,
        reason: String,
    },

    #[error("Update of particle {particle} has {found} entries, expected {expected}")]
    UpdateDimension {
        particle: String,
        expected: usize,
        found: usize,
    },

    #[error("Non-finite four-momentum for particle {0}")]
    NonFiniteMomentum(String),

    #[error("Wrong number of measurements: expected {expected}, found {found}")]
    WrongCandidateSize { expected: usize, found: usize },
}
