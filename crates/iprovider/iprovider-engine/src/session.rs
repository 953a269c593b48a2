//! Interactive-provider session state machine (§4.9 provider variant):
//! inverted relative to the consumer's — it accepts rather than initiates.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSessionState {
    AwaitingConnection,
    AwaitingLogin,
    LoggedIn,
    AwaitingDirectoryRequest,
    ServiceAdvertised,
    Failed,
    Shutdown,
}

pub struct ProviderSession {
    state: ProviderSessionState,
    supports_post: bool,
    failure_reason: Option<String>,
}

impl ProviderSession {
    pub fn new(supports_post: bool) -> Self {
        Self {
            state: ProviderSessionState::AwaitingConnection,
            supports_post,
            failure_reason: None,
        }
    }

    pub fn state(&self) -> ProviderSessionState {
        self.state
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    fn fail(&mut self, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
        self.state = ProviderSessionState::Failed;
    }

    pub fn on_connection_accepted(&mut self) {
        if self.state == ProviderSessionState::AwaitingConnection {
            self.state = ProviderSessionState::AwaitingLogin;
        }
    }

    /// Responds to the login request with the provider's application name
    /// and configured supports-post role flag.
    pub fn on_login_request(&mut self) -> bool {
        if self.state != ProviderSessionState::AwaitingLogin {
            return false;
        }
        self.state = ProviderSessionState::LoggedIn;
        true
    }

    pub fn on_directory_request(&mut self) -> bool {
        if self.state != ProviderSessionState::LoggedIn {
            return false;
        }
        self.state = ProviderSessionState::AwaitingDirectoryRequest;
        self.state = ProviderSessionState::ServiceAdvertised;
        true
    }

    pub fn supports_post(&self) -> bool {
        self.supports_post
    }

    pub fn on_transport_failure(&mut self) {
        if !matches!(self.state, ProviderSessionState::Failed | ProviderSessionState::Shutdown) {
            self.fail("transport write failure");
        }
    }

    pub fn shutdown(&mut self) {
        self.state = ProviderSessionState::Shutdown;
    }
}
