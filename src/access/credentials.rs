use crate::event::normalize_credential_id;
use std::collections::HashMap;
use tracing::warn;

/// Result of looking a credential up in the enrolled table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Authorized(String),
    Denied,
}

/// Fixed credential table, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct CredentialTable {
    enrolled: HashMap<String, String>,
}

impl CredentialTable {
    /// Build from a uid → name map. Malformed uids are skipped.
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let mut enrolled = HashMap::with_capacity(map.len());
        for (uid, name) in map {
            match normalize_credential_id(uid) {
                Ok(uid) => {
                    enrolled.insert(uid, name.clone());
                }
                Err(e) => warn!(uid = %uid, error = %e, "Skipping enrolled credential"),
            }
        }
        Self { enrolled }
    }

    pub fn len(&self) -> usize {
        self.enrolled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enrolled.is_empty()
    }

    /// Unlisted and malformed credentials are both denied.
    pub fn authorize(&self, credential: &str) -> Decision {
        let Ok(uid) = normalize_credential_id(credential) else {
            return Decision::Denied;
        };
        match self.enrolled.get(&uid) {
            Some(name) => Decision::Authorized(name.clone()),
            None => Decision::Denied,
        }
    }
}
