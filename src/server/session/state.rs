/// Lifecycle state of a session.
///
/// ```text
/// AwaitingStartup --SSLRequest--> AwaitingStartup
/// AwaitingStartup --Startup-----> Ready --Query/...--> Ready
/// any ----------- Terminate / fatal error ----------> Terminated
/// ```
///
/// NOTE: No synchronization needed - this state is owned by a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Waiting for the untagged startup message (possibly after an SSL decline).
    #[default]
    AwaitingStartup,
    /// Handshake complete; regular tagged messages are read.
    Ready,
    /// The read loop has ended.
    Terminated,
}

impl SessionState {
    /// Whether the next frame on the wire is the untagged startup message.
    pub fn expects_startup(self) -> bool {
        self == SessionState::AwaitingStartup
    }
}
