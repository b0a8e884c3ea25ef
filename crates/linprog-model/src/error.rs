use thiserror::Error;

/// Errors raised while building a model.
///
/// Every failing builder call leaves the model exactly as it was.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Duplicate variable name: {0}")]
    DuplicateName(String),
    #[error("Invalid bounds for {name}: lower {lower} exceeds upper {upper}")]
    InvalidBounds { name: String, lower: f64, upper: f64 },
    #[error("Unknown variable #{0}: not declared in this model")]
    UnknownVariable(usize),
    #[error("Invalid constraint: {0}")]
    InvalidConstraint(String),
    #[error("Invalid objective: {0}")]
    InvalidObjective(String),
}
