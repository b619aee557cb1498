use std::fmt;

#[derive(Debug)]
pub enum MaxsetError {
    Io(std::io::Error),
    Malformed(String),
    Argument(String),
}

impl fmt::Display for MaxsetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxsetError::Io(e) => write!(f, "IO error: {}", e),
            MaxsetError::Malformed(e) => write!(f, "Malformed record: {}", e),
            MaxsetError::Argument(e) => write!(f, "Argument error: {}", e),
        }
    }
}

impl std::error::Error for MaxsetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MaxsetError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MaxsetError {
    fn from(err: std::io::Error) -> Self {
        MaxsetError::Io(err)
    }
}

impl From<String> for MaxsetError {
    fn from(err: String) -> Self {
        MaxsetError::Malformed(err)
    }
}

impl From<&str> for MaxsetError {
    fn from(err: &str) -> Self {
        MaxsetError::Malformed(err.to_string())
    }
}
