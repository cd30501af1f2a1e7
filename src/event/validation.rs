use std::fmt;

/// NFC UIDs are 4, 7 or 10 bytes long.
const CREDENTIAL_HEX_LENGTHS: [usize; 3] = [8, 14, 20];

/// Credential validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialError {
    Empty,
    InvalidLength(usize),
    NotHex(String),
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Empty => write!(f, "credential id is empty"),
            CredentialError::InvalidLength(len) => {
                write!(f, "credential id has {} hex digits, expected 8, 14 or 20", len)
            }
            CredentialError::NotHex(s) => write!(f, "credential id '{}' is not hexadecimal", s),
        }
    }
}

impl std::error::Error for CredentialError {}

/// Validates a device-presented credential id and returns it uppercased.
///
/// Surrounding whitespace is ignored. Lookup against the enrolled table is
/// case-insensitive through this normalization.
pub fn normalize_credential_id(raw: &str) -> Result<String, CredentialError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CredentialError::Empty);
    }
    if !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CredentialError::NotHex(trimmed.to_string()));
    }
    if !CREDENTIAL_HEX_LENGTHS.contains(&trimmed.len()) {
        return Err(CredentialError::InvalidLength(trimmed.len()));
    }
    Ok(trimmed.to_ascii_uppercase())
}
