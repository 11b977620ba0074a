use crate::store::StoreError;

/// Every failure a request can surface to the caller.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("{0}")]
    Validation(String),

    #[error("Duplicate member found: {member} in {organization} - {school}")]
    PolicyViolation {
        member: String,
        organization: String,
        school: String,
    },

    #[error("{0}")]
    Resolution(String),

    #[error("Request too large ({size} bytes). Maximum size is {limit} bytes.")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("select a workspace first")]
    NoWorkspace,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PortalError {
    pub fn validation(message: impl Into<String>) -> Self {
        PortalError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        PortalError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PortalError::Validation(_) => "validation_error",
            PortalError::PolicyViolation { .. } => "duplicate_member",
            PortalError::Resolution(_) => "resolution_failed",
            PortalError::PayloadTooLarge { .. } => "payload_too_large",
            PortalError::NotFound { .. } => "not_found",
            PortalError::NoWorkspace => "no_workspace",
            PortalError::Store(_) => "store_error",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            PortalError::Validation(_)
            | PortalError::PolicyViolation { .. }
            | PortalError::NoWorkspace => 400,
            PortalError::NotFound { .. } => 404,
            PortalError::PayloadTooLarge { .. } => 413,
            PortalError::Resolution(_) | PortalError::Store(_) => 500,
        }
    }
}

pub type Result<T, E = PortalError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(PortalError::validation("x").status(), 400);
        let dup = PortalError::PolicyViolation {
            member: "John Doe".into(),
            organization: "Sigma".into(),
            school: "Alabama".into(),
        };
        assert_eq!(dup.status(), 400);
        assert_eq!(
            dup.to_string(),
            "Duplicate member found: John Doe in Sigma - Alabama"
        );
        assert_eq!(PortalError::Resolution("x".into()).status(), 500);
        assert_eq!(
            PortalError::PayloadTooLarge { size: 2, limit: 1 }.status(),
            413
        );
        assert_eq!(PortalError::not_found("member", "m1").status(), 404);
        assert_eq!(
            PortalError::Store(StoreError::Conflict("x".into())).code(),
            "store_error"
        );
    }
}
