//! GameClient - the main interface to the pyramid device.
//!
//! # Architecture
//!
//! GameClient uses the pure state machine and board model from pyramid-core
//! and interprets the actions they produce to perform actual I/O via the
//! [`Link`] trait.
//!
//! ```text
//! Application → GameClient → Protocol → Link → serial port
//!                   ↓
//!              pyramid-core (session state machine, board model)
//! ```
//!
//! Exchanges run one at a time. A timeout or write failure during any
//! exchange closes the link, invalidates the board and starts a single
//! background retry loop; the failing call returns
//! [`ClientError::LinkLost`] immediately. A corrupt reply is returned as
//! [`ClientError::Protocol`] and leaves the session connected.
//!
//! # Example
//!
//! ```ignore
//! use pyramid_client::{ClientConfig, GameClient, SerialLink};
//!
//! let client = GameClient::new(ClientConfig::default(), SerialLink::new());
//! client.connect("/dev/ttyACM0").await?;
//! let board = client.new_game().await?;
//! client.click(3).await?;
//! ```

use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use pyramid_core::{
    Action, BoardView, Click, Event, GameError, GameState, MatchOutcome, SessionEvent,
    SessionState,
};
use pyramid_types::{PacketError, BOARD_SIZE};

use crate::config::ClientConfig;
use crate::protocol::{ExchangeError, Protocol, ShuffleReply};
use crate::transport::{Link, LinkError};

const EVENT_CAPACITY: usize = 64;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No link open.
    #[error("not connected")]
    NotConnected,

    /// The link was lost and is being retried.
    #[error("link lost, reconnecting to {endpoint}")]
    Reconnecting {
        /// Endpoint being retried
        endpoint: String,
    },

    /// A user-initiated open failed.
    #[error("open failed: {0}")]
    OpenFailed(#[source] LinkError),

    /// The exchange timed out or could not be written; reconnecting.
    #[error("link lost: {reason}")]
    LinkLost {
        /// What failed
        reason: String,
    },

    /// The reply was corrupt or malformed. The link is still up.
    #[error("protocol error: {0}")]
    Protocol(#[from] PacketError),

    /// The device stopped part way through a reply.
    #[error("short reply: expected {expected} bytes, received {received}")]
    ShortReply {
        /// Bytes requested
        expected: usize,
        /// Bytes received
        received: usize,
    },

    /// The move is not valid for the local board.
    #[error("move refused: {0}")]
    Move(#[from] GameError),

    /// Endpoint enumeration or another link operation failed.
    #[error("link error: {0}")]
    Link(#[source] LinkError),

    /// The user stopped reconnecting.
    #[error("reconnect cancelled")]
    Cancelled,
}

/// Events published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Link opened by the user.
    Connected {
        /// Endpoint in use
        endpoint: String,
    },
    /// Link lost: disconnected, retrying.
    ConnectionLost {
        /// Endpoint being retried
        endpoint: String,
        /// What failed
        reason: String,
    },
    /// One reopen attempt failed; retrying continues.
    ReconnectAttemptFailed {
        /// Attempt number, from 1
        attempt: u32,
        /// Why it failed
        error: String,
    },
    /// Link reopened; a fresh START follows.
    Reconnected {
        /// Endpoint in use
        endpoint: String,
    },
    /// Retrying stopped by the user.
    ReconnectCancelled {
        /// Endpoint that was being retried
        endpoint: String,
    },
    /// Session closed by the user.
    Disconnected,
    /// The board or selection changed.
    BoardChanged(BoardView),
    /// The board was dropped (game abandoned).
    BoardCleared,
}

impl From<SessionEvent> for ClientEvent {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::Connected { endpoint } => ClientEvent::Connected { endpoint },
            SessionEvent::ConnectionLost { endpoint, reason } => {
                ClientEvent::ConnectionLost { endpoint, reason }
            }
            SessionEvent::ReconnectFailed { attempt, error } => {
                ClientEvent::ReconnectAttemptFailed { attempt, error }
            }
            SessionEvent::Reconnected { endpoint } => ClientEvent::Reconnected { endpoint },
            SessionEvent::ReconnectCancelled { endpoint } => {
                ClientEvent::ReconnectCancelled { endpoint }
            }
            SessionEvent::Disconnected => ClientEvent::Disconnected,
        }
    }
}

/// What a click did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The device accepted the selection.
    Selected(usize),
    /// The device refused the selection (tile blocked).
    SelectRefused(usize),
    /// Clicked the selected tile again; nothing was sent.
    Deselected(usize),
    /// The pair was removed.
    Matched {
        /// Previously selected index
        first: usize,
        /// Clicked index
        second: usize,
    },
    /// The device refused the pair; both are highlighted.
    Rejected {
        /// Previously selected index
        first: usize,
        /// Clicked index
        second: usize,
    },
}

/// What a shuffle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShuffleOutcome {
    /// New arrangement applied.
    Shuffled(BoardView),
    /// No shuffles left; board unchanged.
    LimitReached,
}

/// The main game client.
///
/// Cheap to clone; clones share the same session.
pub struct GameClient<L: Link + 'static> {
    inner: Arc<Inner<L>>,
}

impl<L: Link + 'static> Clone for GameClient<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<L> {
    config: ClientConfig,
    protocol: Protocol,
    link: L,
    session: watch::Sender<SessionState>,
    game: Mutex<GameState>,
    exchange: Mutex<()>,
    events: broadcast::Sender<ClientEvent>,
    retry_task: StdMutex<Option<JoinHandle<()>>>,
}

impl<L: Link + 'static> GameClient<L> {
    /// Create a new client. Nothing is opened until [`connect`](Self::connect).
    pub fn new(config: ClientConfig, link: L) -> Self {
        let protocol = Protocol::new(config.read_timeout(), config.addressing);
        let (session, _) = watch::channel(SessionState::new());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                protocol,
                link,
                session,
                game: Mutex::new(GameState::new()),
                exchange: Mutex::new(()),
                events,
                retry_task: StdMutex::new(None),
            }),
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get a reference to the link (useful for testing with MockLink).
    pub fn link(&self) -> &L {
        &self.inner.link
    }

    /// Current session state.
    pub fn session_state(&self) -> SessionState {
        self.inner.session.borrow().clone()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.inner.session.borrow().is_connected()
    }

    /// Subscribe to session and board events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.events.subscribe()
    }

    /// Endpoint names present right now.
    pub async fn list_endpoints(&self) -> Result<Vec<String>, ClientError> {
        self.inner
            .link
            .list_endpoints()
            .await
            .map_err(ClientError::Link)
    }

    /// Open `endpoint` and pulse the reset line.
    ///
    /// Replaces any open link and stops a running retry loop. The board is
    /// marked stale since the device has just restarted. If the open fails,
    /// a connected session ends up `Disconnected`; a running retry loop
    /// carries on.
    pub async fn connect(&self, endpoint: &str) -> Result<(), ClientError> {
        self.inner.connect(endpoint).await
    }

    /// Close the session and stop any retry loop.
    pub async fn disconnect(&self) {
        self.inner.disconnect().await
    }

    /// Stop reconnecting. Returns `false` if no retry loop was running.
    ///
    /// An attempt already in progress finishes first; if it reopened the
    /// link, the session stays connected and this returns `false`.
    pub async fn cancel_reconnect(&self) -> bool {
        self.inner.cancel_reconnect().await
    }

    /// Wait until the session is connected.
    ///
    /// Returns immediately when already connected, fails with
    /// [`ClientError::NotConnected`] when nothing was ever opened, and fails
    /// with [`ClientError::Cancelled`] if a retry loop is stopped while
    /// waiting.
    pub async fn wait_for_connection(&self) -> Result<(), ClientError> {
        let mut session = self.inner.session.subscribe();
        if matches!(*session.borrow_and_update(), SessionState::Disconnected) {
            return Err(ClientError::NotConnected);
        }
        let connected = session
            .wait_for(|state| !state.is_reconnecting())
            .await
            .map_err(|_| ClientError::Cancelled)?
            .is_connected();
        if connected {
            Ok(())
        } else {
            Err(ClientError::Cancelled)
        }
    }

    /// START: deal a new board.
    pub async fn new_game(&self) -> Result<BoardView, ClientError> {
        self.inner.new_game().await
    }

    /// GET_STATE: reload the device's current board.
    pub async fn get_state(&self) -> Result<BoardView, ClientError> {
        self.inner.get_state().await
    }

    /// RESET: restart the game on the device. A new board must be loaded
    /// before further moves.
    pub async fn reset(&self) -> Result<(), ClientError> {
        self.inner.reset().await
    }

    /// SHUFFLE the remaining tiles.
    pub async fn shuffle(&self) -> Result<ShuffleOutcome, ClientError> {
        self.inner.shuffle().await
    }

    /// Click on a cell: select it, match it with the selection, or deselect.
    pub async fn click(&self, index: usize) -> Result<ClickOutcome, ClientError> {
        self.inner.click(index).await
    }

    /// GIVE_UP: abandon the game and drop the local board.
    pub async fn give_up(&self) -> Result<(), ClientError> {
        self.inner.give_up().await
    }

    /// Current board snapshot.
    pub async fn snapshot(&self) -> Option<BoardView> {
        self.inner.game.lock().await.view()
    }

    /// A free pair that would match, if any.
    pub async fn hint(&self) -> Option<(usize, usize)> {
        let game = self.inner.game.lock().await;
        if game.needs_fresh_board() {
            return None;
        }
        game.board().and_then(|board| board.hint())
    }

    /// Forget the last rejected pair.
    pub async fn clear_highlight(&self) {
        let view = {
            let mut game = self.inner.game.lock().await;
            game.clear_highlight();
            game.view()
        };
        self.inner.publish_view(view);
    }
}

impl<L: Link + 'static> Inner<L> {
    // ===========================================
    // Session
    // ===========================================

    /// Feed one event to the state machine and return its actions.
    fn transition(&self, event: Event) -> Vec<Action> {
        let mut actions = Vec::new();
        self.session.send_modify(|state| {
            let (next, out) = std::mem::take(state).on_event(event);
            *state = next;
            actions = out;
        });
        actions
    }

    /// Execute actions in order. Returns `true` when a fresh START is due.
    async fn run_actions(self: &Arc<Self>, actions: Vec<Action>) -> bool {
        let mut issue_start = false;
        for action in actions {
            match action {
                Action::CloseLink => self.close_link().await,
                Action::InvalidateBoard => self.invalidate_board().await,
                Action::ScheduleRetry => self.ensure_retry_loop(),
                Action::CancelReconnect => self.stop_retry_loop(),
                // Probing runs inside the retry loop
                Action::ProbeEndpoint { .. } => {}
                Action::IssueStart => issue_start = true,
                Action::EmitEvent(event) => self.emit(event.into()),
            }
        }
        issue_start
    }

    fn emit(&self, event: ClientEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish_view(&self, view: Option<BoardView>) {
        if let Some(view) = view {
            self.emit(ClientEvent::BoardChanged(view));
        }
    }

    /// Mark the board stale and publish the cleared selection.
    async fn invalidate_board(&self) {
        let view = {
            let mut game = self.game.lock().await;
            game.invalidate();
            game.view()
        };
        self.publish_view(view);
    }

    async fn close_link(&self) {
        if let Err(e) = self.link.close().await {
            warn!("Failed to close link: {}", e);
        }
    }

    fn ensure_connected(&self) -> Result<(), ClientError> {
        match &*self.session.borrow() {
            SessionState::Connected { .. } => Ok(()),
            SessionState::Reconnecting { endpoint, .. } => Err(ClientError::Reconnecting {
                endpoint: endpoint.clone(),
            }),
            SessionState::Disconnected => Err(ClientError::NotConnected),
        }
    }

    async fn open_and_reset(&self, endpoint: &str) -> Result<(), LinkError> {
        self.link.open(endpoint, self.config.baud_rate).await?;
        if let Err(e) = self
            .link
            .reset_pulse(self.config.reset_hold(), self.config.boot_delay())
            .await
        {
            self.close_link().await;
            return Err(e);
        }
        Ok(())
    }

    async fn connect(self: &Arc<Self>, endpoint: &str) -> Result<(), ClientError> {
        let _guard = self.exchange.lock().await;
        self.close_link().await;
        if let Err(e) = self.open_and_reset(endpoint).await {
            warn!("Failed to open {}: {}", endpoint, e);
            let actions = self.transition(Event::OpenFailed {
                endpoint: endpoint.to_string(),
                error: e.to_string(),
            });
            self.run_actions(actions).await;
            return Err(ClientError::OpenFailed(e));
        }

        info!("Connected to {}", endpoint);
        self.invalidate_board().await;
        let actions = self.transition(Event::Opened {
            endpoint: endpoint.to_string(),
        });
        self.run_actions(actions).await;
        Ok(())
    }

    async fn disconnect(self: &Arc<Self>) {
        let _guard = self.exchange.lock().await;
        let actions = self.transition(Event::CloseRequested);
        self.run_actions(actions).await;
        // Idempotent, and covers a session that was never connected
        self.close_link().await;
        info!("Disconnected");
    }

    async fn cancel_reconnect(self: &Arc<Self>) -> bool {
        let _guard = self.exchange.lock().await;
        let actions = self.transition(Event::CancelRequested);
        let cancelled = !actions.is_empty();
        self.run_actions(actions).await;
        if cancelled {
            info!("Reconnect cancelled");
        }
        cancelled
    }

    /// Route a failed exchange: link loss enters `Reconnecting`, anything
    /// else is reported as-is with the session untouched.
    async fn fail(self: &Arc<Self>, err: ExchangeError) -> ClientError {
        match err {
            err if err.is_disconnect() => {
                let reason = err.to_string();
                warn!("Link lost: {}", reason);
                let actions = self.transition(Event::LinkLost {
                    reason: reason.clone(),
                });
                self.run_actions(actions).await;
                ClientError::LinkLost { reason }
            }
            ExchangeError::Packet(e) => {
                warn!("Protocol error: {}", e);
                ClientError::Protocol(e)
            }
            ExchangeError::Link(LinkError::ShortRead { expected, received }) => {
                warn!("Short reply: {} of {} bytes", received, expected);
                ClientError::ShortReply { expected, received }
            }
            ExchangeError::Link(e) => ClientError::Link(e),
        }
    }

    async fn outcome<T>(self: &Arc<Self>, result: Result<T, ExchangeError>) -> Result<T, ClientError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.fail(e).await),
        }
    }

    /// Take the exchange lock, then check the session can run one.
    async fn begin(&self) -> Result<MutexGuard<'_, ()>, ClientError> {
        let guard = self.exchange.lock().await;
        self.ensure_connected()?;
        Ok(guard)
    }

    // ===========================================
    // Retry loop
    // ===========================================

    fn retry_slot(&self) -> StdMutexGuard<'_, Option<JoinHandle<()>>> {
        self.retry_task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the retry loop unless one is already running.
    fn ensure_retry_loop(self: &Arc<Self>) {
        let mut slot = self.retry_slot();
        if slot.is_some() {
            return;
        }
        let inner = Arc::clone(self);
        *slot = Some(tokio::spawn(async move { inner.retry_loop().await }));
    }

    /// Abort the retry loop. Callers hold the exchange lock, so the loop is
    /// never inside a reopen or an exchange when it stops.
    fn stop_retry_loop(&self) {
        if let Some(handle) = self.retry_slot().take() {
            handle.abort();
        }
    }

    /// Clear the slot if the session no longer needs retrying.
    ///
    /// Checked under the slot lock so a loss that arrives while the loop is
    /// finishing either keeps this loop alive or spawns a fresh one.
    fn settle_retry(&self) -> bool {
        let mut slot = self.retry_slot();
        if self.session.borrow().is_reconnecting() {
            return false;
        }
        slot.take();
        true
    }

    async fn retry_loop(self: Arc<Self>) {
        let period = self.config.reconnect_interval().max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if self.retry_once().await {
                self.resume().await;
            }
            if self.settle_retry() {
                debug!("Retry loop finished");
                return;
            }
        }
    }

    /// One reconnect attempt. Returns `true` when the link is back and a
    /// fresh START is due.
    async fn retry_once(self: &Arc<Self>) -> bool {
        let _guard = self.exchange.lock().await;
        let mut issue_start = false;

        for action in self.transition(Event::ReconnectTimer) {
            let Action::ProbeEndpoint { endpoint } = action else {
                continue;
            };
            let event = match self.reopen(&endpoint).await {
                Ok(()) => {
                    info!("Reconnected to {}", endpoint);
                    Event::ReopenSucceeded
                }
                Err(e) => {
                    debug!("Reconnect to {} failed: {}", endpoint, e);
                    Event::ReopenFailed {
                        error: e.to_string(),
                    }
                }
            };
            let actions = self.transition(event);
            issue_start |= self.run_actions(actions).await;
        }
        issue_start
    }

    async fn reopen(&self, endpoint: &str) -> Result<(), LinkError> {
        let present = self.link.list_endpoints().await?;
        if !present.iter().any(|name| name == endpoint) {
            return Err(LinkError::OpenFailed {
                endpoint: endpoint.to_string(),
                reason: "endpoint not present".into(),
            });
        }
        self.open_and_reset(endpoint).await
    }

    /// Resynchronise after a reopen. A failure here re-enters the normal
    /// loss path.
    async fn resume(self: &Arc<Self>) {
        if let Err(e) = self.new_game().await {
            warn!("Fresh START after reconnect failed: {}", e);
        }
    }

    // ===========================================
    // Exchanges
    // ===========================================

    async fn publish_board(&self, board: &[u8; BOARD_SIZE]) -> BoardView {
        let view = self.game.lock().await.apply_board(board);
        self.emit(ClientEvent::BoardChanged(view.clone()));
        view
    }

    async fn new_game(self: &Arc<Self>) -> Result<BoardView, ClientError> {
        let _guard = self.begin().await?;
        let board = self.outcome(self.protocol.start(&self.link).await).await?;
        info!("New board dealt");
        Ok(self.publish_board(&board).await)
    }

    async fn get_state(self: &Arc<Self>) -> Result<BoardView, ClientError> {
        let _guard = self.begin().await?;
        let board = self
            .outcome(self.protocol.get_state(&self.link).await)
            .await?;
        Ok(self.publish_board(&board).await)
    }

    async fn reset(self: &Arc<Self>) -> Result<(), ClientError> {
        let _guard = self.begin().await?;
        self.outcome(self.protocol.reset(&self.link).await).await?;
        info!("Device game reset");
        let view = {
            let mut game = self.game.lock().await;
            game.invalidate();
            game.view()
        };
        self.publish_view(view);
        Ok(())
    }

    async fn give_up(self: &Arc<Self>) -> Result<(), ClientError> {
        let _guard = self.begin().await?;
        self.outcome(self.protocol.give_up(&self.link).await).await?;
        info!("Game abandoned");
        self.game.lock().await.clear_board();
        self.emit(ClientEvent::BoardCleared);
        Ok(())
    }

    async fn shuffle(self: &Arc<Self>) -> Result<ShuffleOutcome, ClientError> {
        let _guard = self.begin().await?;
        match self.outcome(self.protocol.shuffle(&self.link).await).await? {
            ShuffleReply::Board(board) => Ok(ShuffleOutcome::Shuffled(
                self.publish_board(&board).await,
            )),
            ShuffleReply::LimitReached => {
                info!("Shuffle limit reached");
                Ok(ShuffleOutcome::LimitReached)
            }
        }
    }

    async fn click(self: &Arc<Self>, index: usize) -> Result<ClickOutcome, ClientError> {
        let _guard = self.begin().await?;
        let plan = self.game.lock().await.plan_click(index)?;

        match plan {
            Click::Deselect(index) => {
                let view = {
                    let mut game = self.game.lock().await;
                    game.deselect_same(index);
                    game.view()
                };
                self.publish_view(view);
                Ok(ClickOutcome::Deselected(index))
            }
            Click::Select(index) => {
                let accepted = self
                    .outcome(self.protocol.select(&self.link, index).await)
                    .await?;
                if !accepted {
                    debug!("SELECT {} refused", index);
                    return Ok(ClickOutcome::SelectRefused(index));
                }
                let view = {
                    let mut game = self.game.lock().await;
                    game.confirm_select(index)?;
                    game.view()
                };
                self.publish_view(view);
                Ok(ClickOutcome::Selected(index))
            }
            Click::Match { second, .. } => {
                let matched = self
                    .outcome(self.protocol.match_tile(&self.link, second).await)
                    .await?;
                let (outcome, view) = {
                    let mut game = self.game.lock().await;
                    let outcome = game.resolve_match(second, matched)?;
                    (outcome, game.view())
                };
                self.publish_view(view);
                Ok(match outcome {
                    MatchOutcome::Removed { first, second } => {
                        ClickOutcome::Matched { first, second }
                    }
                    MatchOutcome::Rejected { first, second } => {
                        ClickOutcome::Rejected { first, second }
                    }
                })
            }
        }
    }
}
