#![allow(dead_code)]

use std::time::Instant;

use chat_protocol::{FragmentEvent, TransportError, TransportEvent, TurnId, TurnRequest};
use genie_session::{Notice, SessionController, SessionHost};

#[derive(Default)]
pub struct HostSpy {
    pub sent: Vec<(TurnId, TurnRequest)>,
    pub abandoned: Vec<TurnId>,
    pub notices: Vec<Notice>,
    pub render_requests: usize,
    pub refuse_sends: bool,
}

impl HostSpy {
    pub fn refusing() -> Self {
        Self {
            refuse_sends: true,
            ..Self::default()
        }
    }

    pub fn notice_titles(&self) -> Vec<&str> {
        self.notices.iter().map(|notice| notice.title.as_str()).collect()
    }
}

impl SessionHost for HostSpy {
    fn send_turn(&mut self, turn: TurnId, request: &TurnRequest) -> Result<(), TransportError> {
        if self.refuse_sends {
            return Err(TransportError::Closed);
        }
        self.sent.push((turn, request.clone()));
        Ok(())
    }

    fn abandon_turn(&mut self, turn: TurnId) {
        self.abandoned.push(turn);
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn request_render(&mut self) {
        self.render_requests += 1;
    }
}

pub fn connected(host: &mut HostSpy) -> SessionController {
    let mut session = SessionController::default();
    session.apply_event(TransportEvent::Opened, host, Instant::now());
    session
}

pub fn feed(session: &mut SessionController, host: &mut HostSpy, fragment: FragmentEvent) {
    session.apply_event(TransportEvent::Fragment(fragment), host, Instant::now());
}
