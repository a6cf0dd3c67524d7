use crate::handshake::digest::DIGEST_LENGTH;
use crate::{Error, Result};
use std::fmt;

/// Which side of the exchange we are
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRole {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    NotStarted,

    /// Our C1/S1 is on the wire
    ChallengeSent,

    /// The peer's C1/S1 digest checked out
    Verified,

    /// Final packet exchanged, chunk traffic may start
    Complete,

    /// Error occurred
    Failed,
}

impl fmt::Display for HandshakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HandshakePhase::NotStarted => "notStarted",
            HandshakePhase::ChallengeSent => "challengeSent",
            HandshakePhase::Verified => "verified",
            HandshakePhase::Complete => "complete",
            HandshakePhase::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeEvent {
    SentChallenge,
    VerifiedPeer,
    Finished,
    Error,
}

/// Progress of one handshake. Discarded once the handshake is over.
#[derive(Debug, Clone)]
pub struct HandshakeState {
    role: HandshakeRole,
    phase: HandshakePhase,

    /// Digest embedded in the challenge we sent
    pub local_digest: Option<[u8; DIGEST_LENGTH]>,

    /// Digest extracted from the peer's challenge
    pub peer_digest: Option<[u8; DIGEST_LENGTH]>,
}

impl HandshakeState {
    /// Initial state
    pub fn new(role: HandshakeRole) -> Self {
        HandshakeState {
            role,
            phase: HandshakePhase::NotStarted,
            local_digest: None,
            peer_digest: None,
        }
    }

    pub fn role(&self) -> HandshakeRole {
        self.role
    }

    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    /// Check if handshake is complete
    pub fn is_done(&self) -> bool {
        self.phase == HandshakePhase::Complete
    }

    /// Check if handshake failed
    pub fn is_failed(&self) -> bool {
        self.phase == HandshakePhase::Failed
    }

    /// Transition to next phase.
    ///
    /// The client sends its challenge before verifying the server's;
    /// the server verifies first and then answers.
    pub fn transition(&mut self, event: HandshakeEvent) -> Result<()> {
        use HandshakePhase::*;
        use HandshakeRole::*;

        let next = match (self.role, self.phase, event) {
            (_, _, HandshakeEvent::Error) => Failed,
            (Client, NotStarted, HandshakeEvent::SentChallenge) => ChallengeSent,
            (Client, ChallengeSent, HandshakeEvent::VerifiedPeer) => Verified,
            (Client, Verified, HandshakeEvent::Finished) => Complete,
            (Server, NotStarted, HandshakeEvent::VerifiedPeer) => Verified,
            (Server, Verified, HandshakeEvent::SentChallenge) => ChallengeSent,
            (Server, ChallengeSent, HandshakeEvent::Finished) => Complete,
            (role, phase, event) => {
                return Err(Error::invalid_state(format!(
                    "{:?} handshake cannot take {:?} in phase {}",
                    role, event, phase
                )))
            }
        };
        self.phase = next;
        Ok(())
    }
}
