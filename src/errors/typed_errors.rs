use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TypedError {
    // InvalidArgument means that input argument is invalid.
    #[error("Invalid arguments specified")]
    InvalidArgument,
}
