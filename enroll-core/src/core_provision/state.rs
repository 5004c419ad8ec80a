//! Key generation progress of a provisioning attempt

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeygenFailure {
    /// Generation itself failed; no keys exist
    Generation(String),
    /// Keys exist but the identity service did not accept them
    Push(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeygenState {
    #[default]
    NotStarted,
    /// Keys generated locally, not yet pushed
    Generated,
    /// Keys delegated on the identity service
    Pushed,
    Failed(KeygenFailure),
}

impl KeygenState {
    /// True once keys exist, whether or not the push went through
    pub fn keys_generated(&self) -> bool {
        matches!(
            self,
            KeygenState::Generated | KeygenState::Pushed | KeygenState::Failed(KeygenFailure::Push(_))
        )
    }

    pub fn is_pushed(&self) -> bool {
        matches!(self, KeygenState::Pushed)
    }

    /// Generated but not (successfully) pushed
    pub fn needs_push(&self) -> bool {
        self.keys_generated() && !self.is_pushed()
    }
}

impl fmt::Display for KeygenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeygenState::NotStarted => write!(f, "not started"),
            KeygenState::Generated => write!(f, "generated"),
            KeygenState::Pushed => write!(f, "pushed"),
            KeygenState::Failed(KeygenFailure::Generation(e)) => {
                write!(f, "generation failed: {}", e)
            }
            KeygenState::Failed(KeygenFailure::Push(e)) => write!(f, "push failed: {}", e),
        }
    }
}
