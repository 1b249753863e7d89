use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use chat_protocol::{Transport, TransportError, TransportEvent, TurnId, TurnRequest};
use chat_transport_mock::ScriptedTransport;
use chat_transport_ws::{WsTransport, WsTransportConfig};

use crate::config::{SessionConfig, TransportKind};
use crate::error::{ConfigError, Notice, SessionError};
use crate::session::{ConnectionState, SessionController, SessionHost};

/// Longest single wait inside [`SessionRuntime::pump`].
const MAX_WAIT: Duration = Duration::from_millis(250);

/// Delay between scripted reply steps in offline demo mode.
const MOCK_STEP_DELAY: Duration = Duration::from_millis(120);

struct RuntimeHost {
    transport: Box<dyn Transport>,
    notices: Vec<Notice>,
    render_requested: bool,
}

impl SessionHost for RuntimeHost {
    fn send_turn(&mut self, turn: TurnId, request: &TurnRequest) -> Result<(), TransportError> {
        self.transport.send_turn(turn, request)
    }

    fn abandon_turn(&mut self, turn: TurnId) {
        self.transport.abandon_turn(turn);
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    fn request_render(&mut self) {
        self.render_requested = true;
    }
}

/// Owns a session, its transport and the serialized event stream feeding it.
pub struct SessionRuntime {
    controller: SessionController,
    host: RuntimeHost,
    events: Receiver<TransportEvent>,
    disconnected: bool,
}

impl SessionRuntime {
    pub fn new(
        controller: SessionController,
        transport: Box<dyn Transport>,
        events: Receiver<TransportEvent>,
    ) -> Self {
        Self {
            controller,
            host: RuntimeHost {
                transport,
                notices: Vec::new(),
                render_requested: false,
            },
            events,
            disconnected: false,
        }
    }

    /// Builds the configured transport and starts connecting.
    pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
        let (sink, events) = channel();
        let transport: Box<dyn Transport> = match config.transport {
            TransportKind::Mock => Box::new(
                ScriptedTransport::new(sink)
                    .with_step_delay(MOCK_STEP_DELAY)
                    .map_err(ConfigError::TransportStart)?,
            ),
            TransportKind::Ws => {
                let ws_config = WsTransportConfig::new(&config.server_url)
                    .map_err(ConfigError::ServerUrl)?
                    .with_connect_timeout(config.connect_timeout);
                let transport =
                    WsTransport::connect(ws_config, sink).map_err(ConfigError::TransportStart)?;
                Box::new(transport)
            }
        };

        Ok(Self::new(
            SessionController::new(config.assembler),
            transport,
            events,
        ))
    }

    pub fn submit(&mut self, text: &str) -> Result<TurnId, SessionError> {
        self.controller.submit(text, &mut self.host, Instant::now())
    }

    pub fn clear(&mut self) {
        self.controller.clear(&mut self.host);
    }

    /// Applies transport events in arrival order until `deadline`.
    ///
    /// Returns early once the event queue is empty and no turn is pending.
    /// Returns the number of events applied.
    pub fn pump(&mut self, deadline: Instant) -> usize {
        let mut applied = 0;

        loop {
            let now = Instant::now();
            if self.controller.check_timeout(&mut self.host, now) {
                continue;
            }

            match self.events.try_recv() {
                Ok(event) => {
                    self.apply(event);
                    applied += 1;
                    continue;
                }
                Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                    self.handle_disconnect();
                    return applied;
                }
                Err(std::sync::mpsc::TryRecvError::Empty) => {}
            }

            if now >= deadline || !self.waiting_for_events() {
                return applied;
            }

            let wake = self
                .controller
                .deadline()
                .map_or(deadline, |timeout| timeout.min(deadline));
            let wait = wake.saturating_duration_since(now).min(MAX_WAIT);

            match self.events.recv_timeout(wait) {
                Ok(event) => {
                    self.apply(event);
                    applied += 1;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.handle_disconnect();
                    return applied;
                }
            }
        }
    }

    /// Waits for the pending turn to finish, or until `deadline`.
    pub fn wait_for_turn(&mut self, deadline: Instant) -> usize {
        let mut applied = 0;
        while self.controller.is_pending() && Instant::now() < deadline {
            applied += self.pump(deadline.min(Instant::now() + MAX_WAIT));
            if self.disconnected {
                break;
            }
        }
        applied
    }

    /// Waits until the connection leaves `Connecting`, or until `deadline`.
    pub fn wait_for_connection(&mut self, deadline: Instant) -> &ConnectionState {
        while *self.controller.connection() == ConnectionState::Connecting
            && Instant::now() < deadline
            && !self.disconnected
        {
            let wait = MAX_WAIT.min(deadline.saturating_duration_since(Instant::now()));
            match self.events.recv_timeout(wait) {
                Ok(event) => self.apply(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.handle_disconnect(),
            }
        }
        self.controller.connection()
    }

    #[must_use]
    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.host.notices)
    }

    /// Whether a render was requested since the last call.
    pub fn take_render_request(&mut self) -> bool {
        std::mem::replace(&mut self.host.render_requested, false)
    }

    fn waiting_for_events(&self) -> bool {
        self.controller.is_pending()
            || *self.controller.connection() == ConnectionState::Connecting
    }

    fn apply(&mut self, event: TransportEvent) {
        self.controller
            .apply_event(event, &mut self.host, Instant::now());
    }

    fn handle_disconnect(&mut self) {
        if self.disconnected {
            return;
        }
        self.disconnected = true;
        if !matches!(self.controller.connection(), ConnectionState::Closed { .. }) {
            self.apply(TransportEvent::Closed {
                reason: Some("transport stopped".to_string()),
            });
        }
    }
}
