//! Non-interactive provider session state machine (§4.9, last paragraph):
//! opens a login stream, pushes a one-service directory refresh, then
//! proceeds straight into per-tick update bursts.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NiSessionState {
    LoginPending,
    LoginOk,
    DirectoryPushed,
    Streaming,
    Failed,
    Shutdown,
}

pub struct NiSession {
    state: NiSessionState,
    failure_reason: Option<String>,
}

impl NiSession {
    pub fn new() -> Self {
        Self { state: NiSessionState::LoginPending, failure_reason: None }
    }

    pub fn state(&self) -> NiSessionState {
        self.state
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn on_login_open(&mut self) {
        if self.state == NiSessionState::LoginPending {
            self.state = NiSessionState::LoginOk;
        }
    }

    pub fn push_directory_refresh(&mut self) {
        if self.state == NiSessionState::LoginOk {
            self.state = NiSessionState::DirectoryPushed;
        }
    }

    pub fn begin_streaming(&mut self) {
        if self.state == NiSessionState::DirectoryPushed {
            self.state = NiSessionState::Streaming;
        }
    }

    pub fn on_transport_failure(&mut self) {
        if !matches!(self.state, NiSessionState::Failed | NiSessionState::Shutdown) {
            self.failure_reason = Some("transport write failure".to_string());
            self.state = NiSessionState::Failed;
        }
    }

    pub fn shutdown(&mut self) {
        self.state = NiSessionState::Shutdown;
    }
}

impl Default for NiSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_login_then_directory_then_streaming() {
        let mut s = NiSession::new();
        s.on_login_open();
        s.push_directory_refresh();
        s.begin_streaming();
        assert_eq!(s.state(), NiSessionState::Streaming);
    }

    #[test]
    fn streaming_cannot_be_entered_without_directory_push() {
        let mut s = NiSession::new();
        s.on_login_open();
        s.begin_streaming();
        assert_eq!(s.state(), NiSessionState::LoginOk);
    }
}
