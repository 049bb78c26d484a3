//! Session lifecycle and the event loop.
//!
//! [`Client`] owns everything: the transport, the session state machine, the
//! handshake and lobby retry state, and a dispatch table built once at
//! construction. It runs on a single task; handlers run to completion and the
//! only suspension point is the bounded wait for the next transport event.
//!
//! Each loop iteration:
//!
//! 1. wait up to `event_wait` (less if the hello is due sooner) for an event
//! 2. process that event, if any
//! 3. fire the hello if its settle delay has passed
//! 4. tick the lobby retry countdown, resending if it expired
//!
//! A disconnect at any point drops handshake and retry state and reconnects
//! straight away, with no backoff and no attempt limit. A refused login stops
//! the loop for good.

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{AfterLobbyCreated, AgentConfig, ClientSettings, Credentials, LobbyConfig};
use crate::error::{ClientError, ConfigError, HandlerError, MessageError};
use crate::protocol::{
    msg, ClientHello, ClientWelcome, GamesPlayed, GcMessage, LobbyResult, Packet,
    PracticeLobbyResponse, Route, APP_ID,
};
use crate::state::{
    build_create_request, Dispatcher, Handshake, LobbyRetry, SessionEvent, SessionMachine,
    SessionSnapshot, SessionState,
};
use crate::transport::{LoginOutcome, Transport, TransportEvent};

/// Everything a handler may touch.
#[derive(Debug)]
pub struct Session<T> {
    transport: T,
    credentials: Credentials,
    lobby_config: LobbyConfig,
    settings: ClientSettings,
    machine: SessionMachine,
    handshake: Handshake,
    lobby: LobbyRetry,
    reconnects: u32,
    lobby_created: bool,

    /// Time of the loop iteration currently being processed
    now: Instant,
}

impl<T: Transport> Session<T> {
    fn new(transport: T, config: AgentConfig) -> Self {
        let AgentConfig {
            credentials,
            lobby,
            client,
        } = config;
        Self {
            transport,
            credentials,
            lobby_config: lobby,
            handshake: Handshake::new(client.settle_delay),
            lobby: LobbyRetry::new(client.retry_interval, client.max_tick_step),
            settings: client,
            machine: SessionMachine::new(),
            reconnects: 0,
            lobby_created: false,
            now: Instant::now(),
        }
    }

    pub fn state(&self) -> &SessionState {
        self.machine.state()
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    pub fn lobby(&self) -> &LobbyRetry {
        &self.lobby
    }

    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    /// Apply a transition, logging instead of failing when it doesn't fit.
    fn transition(&mut self, event: SessionEvent) -> bool {
        match self.machine.apply_mut(event) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "ignoring out-of-order session event");
                false
            }
        }
    }

    fn send<M: GcMessage>(&mut self, route: Route, message: &M) -> Result<(), MessageError> {
        let packet = message.encode()?;
        debug!(type_id = packet.type_id, ?route, "sending");
        self.transport.send(route, packet);
        Ok(())
    }

    fn send_to_coordinator<M: GcMessage>(&mut self, message: &M) -> Result<(), MessageError> {
        self.send(Route::Coordinator { app_id: APP_ID }, message)
    }

    /// Ask the transport to connect.
    pub fn connect(&mut self) {
        if self.transition(SessionEvent::Connect) {
            info!("connecting to platform");
            self.transport.connect();
        }
    }

    pub fn on_transport_connected(&mut self) {
        if !self.transition(SessionEvent::TransportConnected) {
            return;
        }
        info!(user = %self.credentials.username, "connected, logging on");
        self.transport.log_on(&self.credentials);
    }

    /// Handle the log-on result. A failure halts the session for good.
    pub fn on_login_result(&mut self, outcome: LoginOutcome) -> Result<(), ClientError> {
        match outcome {
            LoginOutcome::Success => {
                if !self.transition(SessionEvent::LoginSucceeded) {
                    return Ok(());
                }
                info!(app_id = APP_ID, "logged on, announcing app");
                if let Err(err) = self.send(Route::Platform, &GamesPlayed::single(APP_ID)) {
                    error!(%err, "failed to announce app");
                }
                self.handshake.on_logged_in(self.now);
                debug!(delay = ?self.settings.settle_delay, "hello scheduled");
                Ok(())
            }
            LoginOutcome::Failure { reason } => {
                error!(%reason, "unable to log on");
                let event = SessionEvent::LoginFailed {
                    reason: reason.clone(),
                };
                if self.machine.apply_mut(event).is_err() {
                    self.machine = SessionMachine::at(SessionState::Halted {
                        reason: reason.clone(),
                    });
                }
                self.handshake.reset();
                self.lobby.reset();
                self.transport.disconnect();
                Err(ClientError::LoginDenied { reason })
            }
        }
    }

    pub fn on_logged_off(&mut self, reason: &str) {
        warn!(%reason, "logged off by platform");
    }

    /// Drop all handshake and retry state, then reconnect immediately.
    pub fn on_transport_disconnected(&mut self) {
        if self.machine.is_halted() {
            debug!("disconnected after halt");
            return;
        }
        warn!(state = %self.machine.state(), "disconnected from platform");
        self.handshake.reset();
        self.lobby.reset();
        self.transition(SessionEvent::TransportDisconnected);

        self.reconnects += 1;
        info!(attempt = self.reconnects, "reconnecting");
        self.connect();
    }

    /// Coordinator welcome: start the lobby request unless one is already pending.
    pub fn on_coordinator_welcome(&mut self, welcome: &ClientWelcome) -> Result<(), MessageError> {
        if !self.transition(SessionEvent::WelcomeReceived) {
            return Ok(());
        }
        self.handshake.on_welcome(welcome);
        info!(version = welcome.version, "coordinator session ready");

        if self.lobby.is_pending() {
            debug!("create request already pending, ignoring repeated welcome");
            return Ok(());
        }
        self.send_create_request(false)
    }

    /// Send the create-request and restart the retry countdown.
    pub fn send_create_request(&mut self, is_resend: bool) -> Result<(), MessageError> {
        let request = build_create_request(&self.lobby_config, Utc::now());
        self.send_to_coordinator(&request)?;
        self.lobby.mark_sent(self.now, is_resend);

        if is_resend {
            warn!(
                attempt = self.lobby.attempts,
                map = %self.lobby_config.custom_map_name,
                "no acknowledgment, resent create lobby request"
            );
        } else {
            info!(
                map = %self.lobby_config.custom_map_name,
                region = self.lobby_config.server_region,
                "sent create lobby request"
            );
        }
        Ok(())
    }

    pub fn on_create_acknowledged(&mut self) {
        if !self.lobby.acknowledge() {
            debug!("lobby acknowledgment with no request pending, ignoring");
            return;
        }
        self.lobby_created = true;
        info!(
            attempts = self.lobby.attempts,
            "coordinator acknowledged lobby creation"
        );
    }

    /// Fire whatever timers are due.
    pub fn poll_timers(&mut self, now: Instant) {
        self.now = now;

        if self.handshake.poll(now) {
            match self.send_to_coordinator(&ClientHello::default()) {
                Ok(()) => {
                    self.handshake.record_hello();
                    self.transition(SessionEvent::HelloSent);
                    info!("said hello to coordinator");
                }
                Err(err) => error!(%err, "failed to send hello"),
            }
        }

        if self.lobby.tick(now) {
            if let Err(err) = self.send_create_request(true) {
                error!(%err, "failed to resend create lobby request");
            }
        }
    }

    /// How long the next event wait may last.
    fn next_wait(&self, now: Instant) -> std::time::Duration {
        match self.handshake.time_until_hello(now) {
            Some(until) => until.min(self.settings.event_wait),
            None => self.settings.event_wait,
        }
    }

    fn is_finished(&self) -> bool {
        self.lobby_created && self.settings.after_lobby_created == AfterLobbyCreated::Shutdown
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.machine.state().clone(),
            hellos_sent: self.handshake.hellos_sent,
            welcomes: self.handshake.welcomes,
            coordinator_version: self.handshake.coordinator_version,
            create_requests: self.lobby.attempts,
            resends: self.lobby.resends,
            lobby_pending: self.lobby.is_pending(),
            lobby_confirmed_at: self.lobby.confirmed_at,
            reconnects: self.reconnects,
        }
    }
}

fn on_welcome<T: Transport>(session: &mut Session<T>, packet: &Packet) -> Result<(), HandlerError> {
    let welcome = ClientWelcome::decode(packet)?;
    session.on_coordinator_welcome(&welcome)?;
    Ok(())
}

/// The coordinator echoes the create message type back once the lobby exists.
fn on_lobby_created<T: Transport>(
    session: &mut Session<T>,
    _packet: &Packet,
) -> Result<(), HandlerError> {
    session.on_create_acknowledged();
    Ok(())
}

fn on_lobby_response<T: Transport>(
    session: &mut Session<T>,
    packet: &Packet,
) -> Result<(), HandlerError> {
    let response = PracticeLobbyResponse::decode(packet)?;
    match response.result {
        LobbyResult::Success => {
            session.on_create_acknowledged();
            Ok(())
        }
        // Keep retrying; the countdown is untouched
        other => Err(HandlerError::Rejected(format!("{:?}", other))),
    }
}

/// Lobby agent client.
#[derive(Debug)]
pub struct Client<T> {
    session: Session<T>,
    dispatcher: Dispatcher<Session<T>>,
}

impl<T: Transport + 'static> Client<T> {
    /// Build a client. Fails if the configuration doesn't validate.
    pub fn new(transport: T, config: AgentConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut dispatcher = Dispatcher::new();
        dispatcher.register(msg::GC_CLIENT_WELCOME, on_welcome::<T>);
        dispatcher.register(msg::GC_PRACTICE_LOBBY_CREATE, on_lobby_created::<T>);
        dispatcher.register(msg::GC_PRACTICE_LOBBY_RESPONSE, on_lobby_response::<T>);

        Ok(Self {
            session: Session::new(transport, config),
            dispatcher,
        })
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn state(&self) -> &SessionState {
        self.session.state()
    }

    pub fn transport(&self) -> &T {
        &self.session.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.session.transport
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn connect(&mut self) {
        self.session.connect();
    }

    /// Process one transport event observed at `now`.
    ///
    /// Handler failures are logged and swallowed. Only a refused login is
    /// returned as an error.
    pub fn handle_event(&mut self, event: TransportEvent, now: Instant) -> Result<(), ClientError> {
        self.session.now = now;
        match event {
            TransportEvent::Connected => self.session.on_transport_connected(),
            TransportEvent::Disconnected => self.session.on_transport_disconnected(),
            TransportEvent::LoggedOn(outcome) => self.session.on_login_result(outcome)?,
            TransportEvent::LoggedOff { reason } => self.session.on_logged_off(&reason),
            TransportEvent::Message(packet) => {
                if let Err(err) = self.dispatcher.dispatch(&mut self.session, &packet) {
                    warn!(type_id = packet.type_id, %err, "message handler failed");
                }
            }
        }
        Ok(())
    }

    pub fn poll_timers(&mut self, now: Instant) {
        self.session.poll_timers(now);
    }

    /// Connect and pump events.
    ///
    /// With [`AfterLobbyCreated::KeepAlive`] this only returns on error. With
    /// [`AfterLobbyCreated::Shutdown`] it disconnects and returns the final
    /// snapshot once the lobby is confirmed.
    pub async fn run(&mut self) -> Result<SessionSnapshot, ClientError> {
        self.connect();

        loop {
            let wait = self.session.next_wait(Instant::now());
            match tokio::time::timeout(wait, self.session.transport.next_event()).await {
                Ok(Some(event)) => self.handle_event(event, Instant::now())?,
                Ok(None) => {
                    error!("transport event stream ended");
                    return Err(ClientError::TransportClosed);
                }
                Err(_elapsed) => {}
            }

            self.poll_timers(Instant::now());

            if self.session.is_finished() {
                info!("lobby created, shutting down session");
                self.session.transport.disconnect();
                return Ok(self.snapshot());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LobbyVisibility, PracticeLobbyCreate};
    use crate::simulated::SimulatedCoordinator;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const SEC: Duration = Duration::from_secs(1);

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Connect,
        Disconnect,
        LogOn,
        Send(Route, u32),
    }

    /// Records commands and never produces events on its own.
    #[derive(Debug, Default)]
    struct RecordingTransport {
        calls: Vec<Call>,
        sent: Vec<Packet>,
    }

    impl RecordingTransport {
        fn count(&self, call: &Call) -> usize {
            self.calls.iter().filter(|c| *c == call).count()
        }

        fn sent_count(&self, type_id: u32) -> usize {
            self.sent.iter().filter(|p| p.type_id == type_id).count()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn connect(&mut self) {
            self.calls.push(Call::Connect);
        }

        fn disconnect(&mut self) {
            self.calls.push(Call::Disconnect);
        }

        fn log_on(&mut self, _credentials: &Credentials) {
            self.calls.push(Call::LogOn);
        }

        fn send(&mut self, route: Route, packet: Packet) {
            self.calls.push(Call::Send(route, packet.type_id));
            self.sent.push(packet);
        }

        async fn next_event(&mut self) -> Option<TransportEvent> {
            None
        }
    }

    fn config() -> AgentConfig {
        AgentConfig::new(
            Credentials::new("lobbybot", "hunter2"),
            LobbyConfig::new(1613886175, "ranked_1x8")
                .with_players(1, 8)
                .with_server_region(12),
        )
    }

    fn welcome() -> TransportEvent {
        TransportEvent::Message(ClientWelcome { version: 1 }.encode().unwrap())
    }

    fn create_ack() -> TransportEvent {
        TransportEvent::Message(Packet::new(msg::GC_PRACTICE_LOBBY_CREATE, Vec::new()))
    }

    /// Drives a client with explicit time, one iteration per step.
    struct Harness {
        client: Client<RecordingTransport>,
        now: Instant,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                client: Client::new(RecordingTransport::default(), config()).unwrap(),
                now: Instant::now(),
            }
        }

        /// Deliver an event and run the timers for the same iteration.
        fn event(&mut self, event: TransportEvent) -> Result<(), ClientError> {
            self.client.handle_event(event, self.now)?;
            self.client.poll_timers(self.now);
            Ok(())
        }

        /// Let `secs` one-second iterations pass without events.
        fn idle(&mut self, secs: u64) {
            for _ in 0..secs {
                self.now += SEC;
                self.client.poll_timers(self.now);
            }
        }

        /// Connect, log on and wait out the settle delay.
        fn log_in(&mut self) {
            self.event(TransportEvent::Connected).unwrap();
            self.event(TransportEvent::LoggedOn(LoginOutcome::Success))
                .unwrap();
            self.idle(5);
        }

        fn transport(&self) -> &RecordingTransport {
            self.client.transport()
        }

        fn creates(&self) -> usize {
            self.transport().sent_count(msg::GC_PRACTICE_LOBBY_CREATE)
        }

        fn hellos(&self) -> usize {
            self.transport().sent_count(msg::GC_CLIENT_HELLO)
        }
    }

    fn started() -> Harness {
        let mut harness = Harness::new();
        harness.client.connect();
        harness
    }

    #[test]
    fn test_connect_then_log_on() {
        let mut h = started();
        assert_eq!(*h.client.state(), SessionState::Connecting);

        h.event(TransportEvent::Connected).unwrap();
        assert_eq!(*h.client.state(), SessionState::AwaitingLogin);
        assert_eq!(h.transport().calls, vec![Call::Connect, Call::LogOn]);
    }

    #[test]
    fn test_login_announces_app_then_hello_after_settle() {
        let mut h = started();
        h.event(TransportEvent::Connected).unwrap();
        h.event(TransportEvent::LoggedOn(LoginOutcome::Success))
            .unwrap();

        assert_eq!(*h.client.state(), SessionState::LoggedIn);
        assert_eq!(h.transport().count(&Call::Send(Route::Platform, msg::CLIENT_GAMES_PLAYED)), 1);
        assert_eq!(h.hellos(), 0);

        h.idle(4);
        assert_eq!(h.hellos(), 0);

        h.idle(1);
        assert_eq!(h.hellos(), 1);
        assert_eq!(*h.client.state(), SessionState::AwaitingGcWelcome);

        h.idle(30);
        assert_eq!(h.hellos(), 1);
    }

    #[test]
    fn test_welcome_sends_one_create_request() {
        let mut h = started();
        h.log_in();
        h.event(welcome()).unwrap();

        assert!(h.client.state().is_ready());
        assert_eq!(h.creates(), 1);
        assert!(h.client.session().lobby().is_pending());

        let request = PracticeLobbyCreate::decode(&h.transport().sent[2]).unwrap();
        assert_eq!(request.lobby_details.visibility, LobbyVisibility::Public);
        assert_eq!(request.lobby_details.custom_map_name, "ranked_1x8");
    }

    #[test]
    fn test_duplicate_welcome_while_pending() {
        let mut h = started();
        h.log_in();
        h.event(welcome()).unwrap();
        h.event(welcome()).unwrap();
        h.event(welcome()).unwrap();

        assert_eq!(h.creates(), 1);
        assert_eq!(h.client.session().handshake().welcomes, 3);
    }

    #[test]
    fn test_resend_once_per_interval() {
        let mut h = started();
        h.log_in();
        h.event(welcome()).unwrap();

        h.idle(4);
        assert_eq!(h.creates(), 1);
        h.idle(1);
        assert_eq!(h.creates(), 2);
        h.idle(4);
        assert_eq!(h.creates(), 2);
        h.idle(1);
        assert_eq!(h.creates(), 3);

        // No burst: 20 more seconds, 4 more resends
        h.idle(20);
        assert_eq!(h.creates(), 7);
        assert_eq!(h.client.snapshot().resends, 6);
    }

    #[test]
    fn test_ack_stops_resends() {
        let mut h = started();
        h.log_in();
        h.event(welcome()).unwrap();
        h.idle(3);
        h.event(create_ack()).unwrap();

        h.idle(120);
        assert_eq!(h.creates(), 1);
        let snapshot = h.client.snapshot();
        assert!(!snapshot.lobby_pending);
        assert!(snapshot.lobby_confirmed_at.is_some());
    }

    #[test]
    fn test_ack_and_resend_in_same_iteration() {
        let mut h = started();
        h.log_in();
        h.event(welcome()).unwrap();
        h.idle(4);

        // The ack is processed before the timer that would have fired now
        h.now += SEC;
        h.event(create_ack()).unwrap();
        assert_eq!(h.creates(), 1);
    }

    #[test]
    fn test_lobby_response_success_acknowledges() {
        let mut h = started();
        h.log_in();
        h.event(welcome()).unwrap();

        let response = PracticeLobbyResponse {
            result: LobbyResult::Success,
        };
        h.event(TransportEvent::Message(response.encode().unwrap()))
            .unwrap();
        assert!(!h.client.session().lobby().is_pending());
    }

    #[test]
    fn test_lobby_response_failure_keeps_retrying() {
        let mut h = started();
        h.log_in();
        h.event(welcome()).unwrap();

        let response = PracticeLobbyResponse {
            result: LobbyResult::InvalidLobby,
        };
        h.event(TransportEvent::Message(response.encode().unwrap()))
            .unwrap();
        assert!(h.client.session().lobby().is_pending());

        h.idle(5);
        assert_eq!(h.creates(), 2);
    }

    #[test]
    fn test_bad_payload_does_not_stop_client() {
        let mut h = started();
        h.log_in();
        h.event(TransportEvent::Message(Packet::new(
            msg::GC_CLIENT_WELCOME,
            b"garbage".to_vec(),
        )))
        .unwrap();

        assert_eq!(h.creates(), 0);
        h.event(welcome()).unwrap();
        assert_eq!(h.creates(), 1);
    }

    #[test]
    fn test_unknown_message_ignored() {
        let mut h = started();
        h.log_in();
        let before = h.transport().calls.len();
        h.event(TransportEvent::Message(Packet::new(9999, vec![1, 2, 3])))
            .unwrap();
        assert_eq!(h.transport().calls.len(), before);
    }

    /// Walk a fresh client forward `stage` steps of the handshake.
    fn advance(h: &mut Harness, stage: usize) {
        if stage >= 1 {
            h.event(TransportEvent::Connected).unwrap();
        }
        if stage >= 2 {
            h.event(TransportEvent::LoggedOn(LoginOutcome::Success))
                .unwrap();
        }
        if stage >= 3 {
            h.idle(5);
        }
        if stage >= 4 {
            h.event(welcome()).unwrap();
        }
    }

    #[test]
    fn test_disconnect_reconnects_once_from_any_state() {
        for stage in 0..=4 {
            let mut h = started();
            advance(&mut h, stage);
            let connects = h.transport().count(&Call::Connect);

            h.client
                .handle_event(TransportEvent::Disconnected, h.now)
                .unwrap();

            assert_eq!(h.transport().count(&Call::Connect), connects + 1, "stage {}", stage);
            assert_eq!(*h.client.state(), SessionState::Connecting);
            assert!(!h.client.session().lobby().is_pending());
            assert_eq!(h.client.session().handshake().hello_due(), None);
        }
    }

    #[test]
    fn test_disconnect_during_settle_cancels_hello() {
        let mut h = started();
        h.event(TransportEvent::Connected).unwrap();
        h.event(TransportEvent::LoggedOn(LoginOutcome::Success))
            .unwrap();
        h.idle(2);
        h.event(TransportEvent::Disconnected).unwrap();

        h.idle(10);
        assert_eq!(h.hellos(), 0);
    }

    #[test]
    fn test_disconnect_cancels_resends() {
        let mut h = started();
        h.log_in();
        h.event(welcome()).unwrap();
        h.event(TransportEvent::Disconnected).unwrap();

        h.idle(30);
        assert_eq!(h.creates(), 1);
    }

    #[test]
    fn test_login_failure_halts() {
        let mut h = started();
        h.event(TransportEvent::Connected).unwrap();

        let err = h
            .event(TransportEvent::LoggedOn(LoginOutcome::failure(
                "AccountLogonDenied",
            )))
            .unwrap_err();
        assert!(matches!(err, ClientError::LoginDenied { ref reason } if reason == "AccountLogonDenied"));
        assert!(h.client.state().is_halted());
        assert_eq!(h.transport().count(&Call::Disconnect), 1);

        // No reconnect once halted
        h.client
            .handle_event(TransportEvent::Disconnected, h.now)
            .unwrap();
        assert_eq!(h.transport().count(&Call::Connect), 1);
    }

    #[test]
    fn test_reconnect_scenario() {
        let mut h = started();

        h.log_in();
        h.event(welcome()).unwrap();
        h.event(TransportEvent::Disconnected).unwrap();
        h.log_in();
        h.event(welcome()).unwrap();
        h.event(create_ack()).unwrap();

        assert_eq!(h.hellos(), 2);
        assert_eq!(h.creates(), 2);

        let snapshot = h.client.snapshot();
        assert_eq!(snapshot.resends, 0);
        assert!(!snapshot.lobby_pending);
        assert_eq!(snapshot.reconnects, 1);
        assert_eq!(snapshot.state, SessionState::Ready);
    }

    #[test]
    fn test_welcome_after_confirmation_requests_again() {
        let mut h = started();
        h.log_in();
        h.event(welcome()).unwrap();
        h.event(create_ack()).unwrap();

        // Coordinator restarted and welcomed us again
        h.event(welcome()).unwrap();
        assert_eq!(h.creates(), 2);
    }

    #[test]
    fn test_create_echo_without_request_is_ignored() {
        let mut config = config();
        config.client = config
            .client
            .with_after_lobby_created(AfterLobbyCreated::Shutdown);
        let mut h = Harness {
            client: Client::new(RecordingTransport::default(), config).unwrap(),
            now: Instant::now(),
        };
        h.client.connect();
        h.log_in();

        h.event(create_ack()).unwrap();
        assert!(!h.client.session().is_finished());
        assert_eq!(h.client.snapshot().lobby_confirmed_at, None);

        // The real request still goes out and its ack still counts
        h.event(welcome()).unwrap();
        assert_eq!(h.creates(), 1);
        h.event(create_ack()).unwrap();
        assert!(h.client.session().is_finished());
    }

    #[test]
    fn test_rejects_event_wait_at_noise_threshold() {
        let mut config = config();
        config.client.event_wait = config.client.max_tick_step;

        let result = Client::new(RecordingTransport::default(), config);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "max_tick_step_secs",
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_resends_with_longest_valid_wait() {
        let mut config = config();
        config.client.event_wait = Duration::from_millis(2_900);
        let transport = SimulatedCoordinator::new().with_dropped_creates(u32::MAX);
        let mut client = Client::new(transport, config).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(120), client.run()).await;
        assert!(result.is_err());

        let snapshot = client.snapshot();
        assert!(snapshot.lobby_pending);
        assert!(snapshot.resends >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_lobby_created() {
        let mut config = config();
        config.client = config
            .client
            .with_after_lobby_created(AfterLobbyCreated::Shutdown);
        let transport = SimulatedCoordinator::new().with_dropped_creates(2);

        let mut client = Client::new(transport, config).unwrap();
        let snapshot = client.run().await.unwrap();

        assert_eq!(snapshot.create_requests, 3);
        assert_eq!(snapshot.resends, 2);
        assert_eq!(snapshot.hellos_sent, 1);
        assert!(!snapshot.lobby_pending);
        assert!(!client.transport().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_coordinator_version() {
        let mut config = config();
        config.client = config
            .client
            .with_after_lobby_created(AfterLobbyCreated::Shutdown);
        let transport = SimulatedCoordinator::new().with_welcome_version(5123);

        let mut client = Client::new(transport, config).unwrap();
        let snapshot = client.run().await.unwrap();

        assert_eq!(snapshot.coordinator_version, Some(5123));
        assert_eq!(
            client
                .transport()
                .sent()
                .iter()
                .filter(|(route, _)| *route == Route::Platform)
                .count(),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_survives_connection_drop() {
        let mut config = config();
        config.client = config
            .client
            .with_after_lobby_created(AfterLobbyCreated::Shutdown);
        let transport = SimulatedCoordinator::new().with_connection_drops(1);

        let mut client = Client::new(transport, config).unwrap();
        let snapshot = client.run().await.unwrap();

        assert_eq!(snapshot.reconnects, 1);
        assert_eq!(snapshot.hellos_sent, 2);
        assert_eq!(snapshot.create_requests, 1);
        assert_eq!(client.transport().connects(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_login_denied() {
        let transport = SimulatedCoordinator::new().with_login_denied("InvalidPassword");
        let mut client = Client::new(transport, config()).unwrap();

        let err = client.run().await.unwrap_err();
        assert!(matches!(err, ClientError::LoginDenied { .. }));
        assert_eq!(client.transport().logons(), 1);
        assert_eq!(client.transport().sent_count(msg::GC_CLIENT_HELLO), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_keep_alive_after_creation() {
        let transport = SimulatedCoordinator::new();
        let mut client = Client::new(transport, config()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(120), client.run()).await;
        assert!(result.is_err(), "keep-alive client should still be running");

        let snapshot = client.snapshot();
        assert_eq!(snapshot.create_requests, 1);
        assert!(snapshot.lobby_confirmed_at.is_some());
        assert_eq!(snapshot.state, SessionState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_transport_closed() {
        let mut client = Client::new(RecordingTransport::default(), config()).unwrap();
        let err = client.run().await.unwrap_err();
        assert!(matches!(err, ClientError::TransportClosed));
    }
}
