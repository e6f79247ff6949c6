use super::account::Role;

/// The authenticated caller on whose behalf an engine operation runs.
///
/// Passed explicitly into every engine call; nothing in the crate keeps a
/// "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub account_id: String,
    pub role: Role,
    pub contact: String,
}

impl Session {
    pub fn new(account_id: impl Into<String>, role: Role, contact: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            role,
            contact: contact.into(),
        }
    }
}
