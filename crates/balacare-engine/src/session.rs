use balacare_types::models::Profile;
use uuid::Uuid;

use crate::EngineError;

/// Who is signed in. The one piece of process-wide state: written only by the
/// auth collaborator on login/logout/profile-save, read-only everywhere else,
/// passed explicitly into any operation that needs an identity.
#[derive(Debug, Clone)]
pub enum Auth {
    SignedOut,
    SignedIn(Session),
}

#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub profile: Profile,
}

impl Auth {
    pub fn signed_in(profile: Profile) -> Self {
        Self::SignedIn(Session {
            user_id: profile.id,
            profile,
        })
    }

    /// Gate for write actions. Signed-out callers get `Unauthorized` before
    /// any store call is made.
    pub fn require(&self) -> Result<&Session, EngineError> {
        match self {
            Self::SignedIn(session) => Ok(session),
            Self::SignedOut => Err(EngineError::Unauthorized),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::SignedIn(session) => Some(session),
            Self::SignedOut => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.session().map(|s| s.user_id)
    }

    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn(_))
    }
}
