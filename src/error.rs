use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Shape mismatch between operands.
    Dimension(String),
    /// Row, column, layer or weight index out of range.
    Index(String),
    /// NaN/infinite value written into a matrix, or an unusable numeric argument.
    InvalidValue(String),
    /// Argument outside the domain an operation accepts.
    InvalidArgument(String),
    /// Cholesky solve requested on a matrix that is not symmetric positive definite.
    NotPositiveDefinite,
    /// A derivative was requested from an activation that has none.
    NonDifferentiableActivation(String),
    /// Training was requested on a dataset with no samples.
    EmptyDataset,
    /// A strategy or operation needs a capability the model/trainer lacks.
    UnsupportedMethod(String),
    InvalidConfig(String),
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Dimension(msg) => write!(f, "dimension mismatch: {msg}"),
            Error::Index(msg) => write!(f, "index out of range: {msg}"),
            Error::InvalidValue(msg) => write!(f, "invalid value: {msg}"),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::NotPositiveDefinite => {
                write!(f, "matrix is not symmetric positive definite")
            }
            Error::NonDifferentiableActivation(name) => {
                write!(f, "activation {name} has no derivative")
            }
            Error::EmptyDataset => write!(f, "training data must not be empty"),
            Error::UnsupportedMethod(msg) => write!(f, "unsupported method: {msg}"),
            Error::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
