use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

use crate::models::UserId;

/// Where an identity-scoped store is in its load cycle for the current epoch.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Uninitialized,
    Loading,
    Ready,
}

/// Snapshot of the identity an async operation was started under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EpochToken {
    generation: u64,
    uid: Option<UserId>,
}

impl EpochToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn uid(&self) -> Option<&UserId> {
        self.uid.as_ref()
    }
}

#[derive(Debug, Default)]
struct EpochState {
    generation: u64,
    uid: Option<UserId>,
}

/// Current identity plus a generation counter bumped on every change.
///
/// Completions check their token with [`IdentityEpoch::is_current`] before
/// touching identity-scoped state.
#[derive(Debug, Default)]
pub struct IdentityEpoch {
    state: Mutex<EpochState>,
}

impl IdentityEpoch {
    fn state(&self) -> MutexGuard<'_, EpochState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> EpochToken {
        let state = self.state();
        EpochToken {
            generation: state.generation,
            uid: state.uid.clone(),
        }
    }

    pub fn uid(&self) -> Option<UserId> {
        self.state().uid.clone()
    }

    /// Moves to `uid`, returning the new token, or `None` if it is unchanged.
    pub fn advance(&self, uid: Option<UserId>) -> Option<EpochToken> {
        let mut state = self.state();
        if state.uid == uid {
            return None;
        }
        state.generation += 1;
        state.uid = uid;
        Some(EpochToken {
            generation: state.generation,
            uid: state.uid.clone(),
        })
    }

    pub fn is_current(&self, token: &EpochToken) -> bool {
        self.state().generation == token.generation
    }
}

/// Publishing half, held by whatever owns authentication.
#[derive(Debug)]
pub struct IdentityPublisher {
    sender: watch::Sender<Option<UserId>>,
}

impl IdentityPublisher {
    pub fn publish(&self, uid: Option<UserId>) {
        self.sender.send_replace(uid);
    }

    pub fn sign_in(&self, uid: impl Into<UserId>) {
        self.publish(Some(uid.into()));
    }

    pub fn sign_out(&self) {
        self.publish(None);
    }
}

/// Stream of "current user or nobody" consumed by the events context.
#[derive(Debug, Clone)]
pub struct IdentitySignal {
    receiver: watch::Receiver<Option<UserId>>,
}

impl IdentitySignal {
    pub fn channel(initial: Option<UserId>) -> (IdentityPublisher, IdentitySignal) {
        let (sender, receiver) = watch::channel(initial);
        (IdentityPublisher { sender }, IdentitySignal { receiver })
    }

    /// The latest published identity; marks it as seen.
    pub fn current(&mut self) -> Option<UserId> {
        self.receiver.borrow_and_update().clone()
    }

    /// Waits for the next publication. Errors once the publisher is gone.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.receiver.changed().await
    }
}
