use std::fmt;

// Deployment topology, decided while materializing endpoints.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetupType {
    Unknown,
    Fs,
    Erasure,
    DistErasure,
}

impl fmt::Display for SetupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupType::Unknown => write!(f, "Unknown"),
            SetupType::Fs => write!(f, "FS"),
            SetupType::Erasure => write!(f, "Erasure"),
            SetupType::DistErasure => write!(f, "DistErasure"),
        }
    }
}
