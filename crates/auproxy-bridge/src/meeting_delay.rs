//! Deferred emissions around meetings.
//!
//! Meeting transitions are followed by a position-snapping animation on the
//! game side. Pose resets and exile announcements are therefore delayed by a
//! grace period. Each scheduled action runs as a timer task; when it fires,
//! a [`Deferred`] is delivered back to the run loop, which re-validates it
//! against the live session before acting.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Default grace delay after a meeting message.
pub const DEFAULT_MEETING_GRACE: Duration = Duration::from_millis(2_500);

/// Identifies one joined session; bumped on every (re)join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionEpoch(pub u64);

impl SessionEpoch {
    /// The epoch after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// What to do once the grace period elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// Place every player at the origin.
    ResetPoses,
    /// Move the player with this in-game id to the spectator group.
    Exile {
        /// In-game player id.
        player_id: u8,
    },
}

/// A fired action, tagged with the session that scheduled it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deferred {
    /// Session the action was scheduled in.
    pub epoch: SessionEpoch,
    /// The action.
    pub action: DeferredAction,
}

/// Schedules [`DeferredAction`]s after a fixed grace delay.
pub struct MeetingDelay {
    grace: Duration,
    tx: mpsc::UnboundedSender<Deferred>,
    timers: JoinSet<()>,
}

impl MeetingDelay {
    /// Create a scheduler and the receiver fired actions arrive on.
    pub fn new(grace: Duration) -> (Self, mpsc::UnboundedReceiver<Deferred>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                grace,
                tx,
                timers: JoinSet::new(),
            },
            rx,
        )
    }

    /// Configured grace delay.
    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Schedule exactly one delivery of `action` after the grace delay.
    pub fn schedule(&mut self, epoch: SessionEpoch, action: DeferredAction) {
        while self.timers.try_join_next().is_some() {}
        let tx = self.tx.clone();
        let grace = self.grace;
        tracing::debug!(?action, ?grace, "scheduling deferred action");
        self.timers.spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = tx.send(Deferred { epoch, action });
        });
    }

    /// Number of timers that have not fired yet.
    pub fn pending(&mut self) -> usize {
        while self.timers.try_join_next().is_some() {}
        self.timers.len()
    }

    /// Drop every pending timer. Called when a session is torn down.
    pub fn cancel_all(&mut self) {
        if !self.timers.is_empty() {
            tracing::debug!(count = self.timers.len(), "dropping pending deferred actions");
        }
        self.timers.abort_all();
        self.timers.detach_all();
    }
}
