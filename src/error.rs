use std::fmt;

#[derive(Debug)]
pub enum PermsetError {
    /// Malformed or inconsistent input file
    Parse(String),
    /// Unsupported option or out-of-domain argument
    InvalidArgument(String),
    /// Broken data or protocol invariant (bad membership value, duplicate marker)
    Invariant(String),
    /// A required join key was absent
    MissingKey(String),
    Json(serde_json::Error),
    Serialization(Box<bincode::error::EncodeError>),
    Deserialization(Box<bincode::error::DecodeError>),
    Io(std::io::Error),
    Other(String),
}

impl fmt::Display for PermsetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermsetError::Parse(e) => write!(f, "Parse error: {}", e),
            PermsetError::InvalidArgument(e) => write!(f, "Invalid argument: {}", e),
            PermsetError::Invariant(e) => write!(f, "Invariant violated: {}", e),
            PermsetError::MissingKey(e) => write!(f, "Missing key: {}", e),
            PermsetError::Json(e) => write!(f, "JSON error: {}", e),
            PermsetError::Serialization(e) => write!(f, "Serialization error: {}", e),
            PermsetError::Deserialization(e) => write!(f, "Deserialization error: {}", e),
            PermsetError::Io(e) => write!(f, "IO error: {}", e),
            PermsetError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for PermsetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PermsetError::Json(e) => Some(e),
            PermsetError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PermsetError {
    fn from(err: serde_json::Error) -> Self {
        PermsetError::Json(err)
    }
}

impl From<bincode::error::EncodeError> for PermsetError {
    fn from(err: bincode::error::EncodeError) -> Self {
        PermsetError::Serialization(Box::new(err))
    }
}

impl From<bincode::error::DecodeError> for PermsetError {
    fn from(err: bincode::error::DecodeError) -> Self {
        PermsetError::Deserialization(Box::new(err))
    }
}

impl From<std::io::Error> for PermsetError {
    fn from(err: std::io::Error) -> Self {
        PermsetError::Io(err)
    }
}

impl From<String> for PermsetError {
    fn from(err: String) -> Self {
        PermsetError::Other(err)
    }
}

impl From<&str> for PermsetError {
    fn from(err: &str) -> Self {
        PermsetError::Other(err.to_string())
    }
}

impl PermsetError {
    /// Parse error with a 1-based line number prefix
    pub fn parse_at(lineno: usize, msg: impl fmt::Display) -> Self {
        PermsetError::Parse(format!("line {}: {}", lineno, msg))
    }
}
