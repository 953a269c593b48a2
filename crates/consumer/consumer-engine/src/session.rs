//! Consumer session state machine (§4.9).

use perfcore_config::PerfError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    ChannelUp,
    LoginSent,
    LoginOk,
    DirectoryRequested,
    DirectoryReceived,
    DictionariesNeeded,
    DictionariesReceived,
    ServiceUp,
    SteadyState,
    Failed,
    Shutdown,
}

/// Dictionary-completeness bits tracked while `DictionariesNeeded`; both
/// must be set before `ServiceUp`.
#[derive(Debug, Clone, Copy, Default)]
struct DictionaryBits {
    have_field: bool,
    have_enum: bool,
}

impl DictionaryBits {
    fn complete(&self) -> bool {
        self.have_field && self.have_enum
    }
}

pub struct Session {
    state: SessionState,
    posting_enabled: bool,
    local_dictionary_loaded: bool,
    dictionary: DictionaryBits,
    failure_reason: Option<String>,
}

impl Session {
    pub fn new(posting_enabled: bool, local_dictionary_loaded: bool) -> Self {
        Self {
            state: SessionState::Connecting,
            posting_enabled,
            local_dictionary_loaded,
            dictionary: DictionaryBits::default(),
            failure_reason: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    fn fail(&mut self, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
        self.state = SessionState::Failed;
    }

    pub fn on_transport_handshake_complete(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::ChannelUp;
        }
    }

    /// Sends the login request; modeled as an immediate state transition
    /// since the send itself goes through the caller's `Channel`, not this
    /// type.
    pub fn send_login(&mut self) {
        if self.state == SessionState::ChannelUp {
            self.state = SessionState::LoginSent;
        }
    }

    pub fn on_login_refresh(&mut self, supports_post: bool) {
        if self.state != SessionState::LoginSent {
            return;
        }
        if self.posting_enabled && !supports_post {
            self.fail("login response lacking supports-post while posting is enabled");
            return;
        }
        self.state = SessionState::LoginOk;
    }

    pub fn on_login_rejected(&mut self, reason: impl Into<String>) {
        if self.state == SessionState::LoginSent {
            self.fail(reason);
        }
    }

    pub fn send_directory_request(&mut self) {
        if self.state == SessionState::LoginOk {
            self.state = SessionState::DirectoryRequested;
        }
    }

    /// `service_found` folds the service-name scan, `service_state = up`,
    /// and `accepting_requests` checks — the caller (worker) does the scan
    /// over the directory payload and passes the single boolean result.
    pub fn on_directory_received(&mut self, service_found: bool) {
        if self.state != SessionState::DirectoryRequested {
            return;
        }
        if !service_found {
            self.fail("configured service not found or not accepting requests");
            return;
        }
        self.state = if self.local_dictionary_loaded {
            SessionState::DictionariesReceived
        } else {
            SessionState::DirectoryReceived
        };
    }

    pub fn begin_dictionary_requests(&mut self) {
        if self.state == SessionState::DirectoryReceived {
            self.state = SessionState::DictionariesNeeded;
        }
    }

    pub fn on_field_dictionary_complete(&mut self) {
        if self.state == SessionState::DictionariesNeeded {
            self.dictionary.have_field = true;
            self.maybe_complete_dictionaries();
        }
    }

    pub fn on_enum_dictionary_complete(&mut self) {
        if self.state == SessionState::DictionariesNeeded {
            self.dictionary.have_enum = true;
            self.maybe_complete_dictionaries();
        }
    }

    fn maybe_complete_dictionaries(&mut self) {
        if self.dictionary.complete() {
            self.state = SessionState::DictionariesReceived;
        }
    }

    /// Enters `ServiceUp`, requiring the dictionary path (if taken) to have
    /// completed.
    pub fn enter_service_up(&mut self) {
        if self.state == SessionState::DictionariesReceived {
            self.state = SessionState::ServiceUp;
        }
    }

    /// Entered once `image_retrieval_end` is recorded (§3 invariants),
    /// driven by the worker once every requested item has a refresh.
    pub fn enter_steady_state(&mut self) {
        if self.state == SessionState::ServiceUp {
            self.state = SessionState::SteadyState;
        }
    }

    pub fn on_transport_failure(&mut self) {
        if !matches!(self.state, SessionState::Failed | SessionState::Shutdown) {
            self.fail("transport write failure");
        }
    }

    pub fn on_decode_failure(&mut self, detail: impl Into<String>) {
        if !matches!(self.state, SessionState::Failed | SessionState::Shutdown) {
            self.fail(detail);
        }
    }

    pub fn shutdown(&mut self) {
        self.state = SessionState::Shutdown;
    }

    pub fn as_result(&self) -> Result<(), PerfError> {
        match &self.failure_reason {
            Some(reason) => Err(PerfError::protocol(reason.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_without_dictionary_request() {
        let mut s = Session::new(false, true);
        s.on_transport_handshake_complete();
        s.send_login();
        s.on_login_refresh(false);
        s.send_directory_request();
        s.on_directory_received(true);
        assert_eq!(s.state(), SessionState::DictionariesReceived);
        s.enter_service_up();
        assert_eq!(s.state(), SessionState::ServiceUp);
        s.enter_steady_state();
        assert_eq!(s.state(), SessionState::SteadyState);
    }

    #[test]
    fn dictionary_fallback_requires_both_bits() {
        let mut s = Session::new(false, false);
        s.on_transport_handshake_complete();
        s.send_login();
        s.on_login_refresh(false);
        s.send_directory_request();
        s.on_directory_received(true);
        assert_eq!(s.state(), SessionState::DirectoryReceived);
        s.begin_dictionary_requests();
        s.on_field_dictionary_complete();
        assert_eq!(s.state(), SessionState::DictionariesNeeded);
        s.on_enum_dictionary_complete();
        assert_eq!(s.state(), SessionState::DictionariesReceived);
    }

    #[test]
    fn login_missing_supports_post_fails_when_posting_enabled() {
        let mut s = Session::new(true, true);
        s.on_transport_handshake_complete();
        s.send_login();
        s.on_login_refresh(false);
        assert_eq!(s.state(), SessionState::Failed);
    }

    #[test]
    fn login_rejection_fails_the_session() {
        let mut s = Session::new(false, true);
        s.on_transport_handshake_complete();
        s.send_login();
        s.on_login_rejected("permission denied");
        assert_eq!(s.state(), SessionState::Failed);
        assert_eq!(s.failure_reason(), Some("permission denied"));
        assert!(s.as_result().is_err());
    }

    #[test]
    fn service_not_found_fails_the_session() {
        let mut s = Session::new(false, true);
        s.on_transport_handshake_complete();
        s.send_login();
        s.on_login_refresh(false);
        s.send_directory_request();
        s.on_directory_received(false);
        assert_eq!(s.state(), SessionState::Failed);
    }
}
