use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pending invitation from one player to another.
///
/// Identity is the immutable (id, issuer, receiver) triple, which doubles as
/// the challenge-registry key; whether the receiver accepted travels in the
/// response payload and is never part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeTicket {
    pub id: String,
    pub issuer: String,
    pub receiver: String,
}

impl ChallengeTicket {
    pub fn new(issuer: String, receiver: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            issuer,
            receiver,
        }
    }

    /// Whether the given username is one of the two parties.
    pub fn involves(&self, username: &str) -> bool {
        self.issuer == username || self.receiver == username
    }

    /// The party that is not `username`, if `username` is involved at all.
    pub fn other_party(&self, username: &str) -> Option<&str> {
        if self.issuer == username {
            Some(&self.receiver)
        } else if self.receiver == username {
            Some(&self.issuer)
        } else {
            None
        }
    }
}
