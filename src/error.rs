pub type TrochiaResult<T> = Result<T, TrochiaError>;

#[derive(thiserror::Error, Debug)]
pub enum TrochiaError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed beat: {0}")]
    MalformedBeat(String),

    #[error("role '{role}' not found in expression '{expr}'")]
    RoleNotFound { expr: String, role: String },

    #[error("scene error: {0}")]
    Scene(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TrochiaError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn malformed_beat(msg: impl Into<String>) -> Self {
        Self::MalformedBeat(msg.into())
    }

    pub fn role_not_found(expr: impl Into<String>, role: impl Into<String>) -> Self {
        Self::RoleNotFound {
            expr: expr.into(),
            role: role.into(),
        }
    }

    pub fn scene(msg: impl Into<String>) -> Self {
        Self::Scene(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            TrochiaError::configuration("x")
                .to_string()
                .contains("configuration error:")
        );
        assert!(
            TrochiaError::malformed_beat("x")
                .to_string()
                .contains("malformed beat:")
        );
        assert!(
            TrochiaError::scene("x").to_string().contains("scene error:")
        );
        let err = TrochiaError::role_not_found("relation", "alpha");
        assert!(err.to_string().contains("'alpha'"));
        assert!(err.to_string().contains("'relation'"));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = TrochiaError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
