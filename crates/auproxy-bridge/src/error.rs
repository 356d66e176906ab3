//! Error types for the protocol boundary and the adapter.

/// Why the server refused a join.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinRejection {
    /// No free slot in the room.
    #[error("the game is full")]
    GameFull,
    /// The round is already running.
    #[error("the game has already started")]
    GameStarted,
    /// No room with that code exists.
    #[error("the game could not be found")]
    GameNotFound,
    /// Any other disconnect reason.
    #[error("{0}")]
    Other(String),
}

/// Failures reported by a [`crate::ProtocolClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Connect or identify failed, or the transport dropped mid-call.
    #[error("transport error: {0}")]
    Transport(String),
    /// The server refused the join.
    #[error("join rejected: {0}")]
    JoinRejected(#[from] JoinRejection),
}

/// Errors produced by the adapter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdapterError {
    /// Every join attempt in the budget failed.
    #[error("couldn't join the game after {attempts} attempts: {last}")]
    JoinBudgetExhausted {
        /// Attempts made.
        attempts: u32,
        /// The error of the final attempt.
        last: ProtocolError,
    },
    /// A synchronization stage exceeded its configured timeout.
    #[error("timed out waiting for {0}")]
    SyncTimeout(&'static str),
    /// The session closed before a synchronization stage completed.
    #[error("session closed while waiting for {0}")]
    SessionClosed(&'static str),
    /// The client reported a join but exposes no room.
    #[error("joined session has no room")]
    MissingRoom,
    /// Consecutive rejoined sessions closed before delivering anything.
    #[error("gave up after {rejoins} re-joined sessions closed without traffic")]
    UnstableSession {
        /// Rejoins that ended that way.
        rejoins: u32,
    },
}
