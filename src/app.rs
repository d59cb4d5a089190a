// Application state and orchestration logic.
//
// The central event loop that coordinates the poll timer, user commands
// from the TUI, and extension background events. Owns the current screen
// (lobby or room view) and all domain state; the TUI only ever sees the
// `UiUpdate` snapshots pushed from here.
//
// All async action failures are funnelled through one error path per view:
// a dismissible banner `UiUpdate::Error`. Reconciliation failures use the
// same funnel and never stop the poll loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError, MemberAction, RoomService};
use crate::extensions::issuetracker::{self, IssueSuggester};
use crate::extensions::ExtensionRegistry;
use crate::model::{CardSet, Role, Room, User};
use crate::protocol::{
    ExtensionEvent, ExtensionPanel, LobbySnapshot, RoomSnapshotUi, UiUpdate, UserCommand,
};
use crate::room::actions::{self, DispatchOutcome, RoomAction, RoomEdit};
use crate::room::engine::{EngineError, ReconcileOutcome, RoomEngine, RoomView};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Poll period for the live room view.
pub const ROOM_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Poll period for the lobby's room list.
pub const LOBBY_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// How long the shutdown path waits for the best-effort leave call.
const SHUTDOWN_LEAVE_TIMEOUT: Duration = Duration::from_secs(2);

/// Banner shown when a poll discovers the user was removed from the room.
pub const KICKED_NOTICE: &str = "You have been removed from this room.";

// ---------------------------------------------------------------------------
// AppContext
// ---------------------------------------------------------------------------

/// Ambient read-only values fetched once at startup and passed by reference
/// to whoever needs them. Never a global.
pub struct AppContext {
    pub user: User,
    pub card_sets: Vec<CardSet>,
    /// Extension keys this deployment has enabled.
    pub enabled_extension_keys: Vec<String>,
}

impl AppContext {
    /// Fetch identity, the card set catalog, and the enabled extension keys.
    pub async fn load(api: &ApiClient) -> Result<Self, ApiError> {
        Ok(AppContext {
            user: api.get_identity().await?,
            card_sets: api.get_card_sets().await?,
            enabled_extension_keys: api.get_extension_keys().await?,
        })
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Which screen the user is on. The room variant owns the reconciliation
/// engine for the entered room; dropping it ends the session.
enum Screen {
    Lobby {
        rooms: Vec<Room>,
    },
    Room {
        engine: RoomEngine,
        suggester: IssueSuggester,
    },
}

/// The complete application state, owned by the orchestrator task.
pub struct AppState {
    api: Arc<ApiClient>,
    service: Arc<dyn RoomService>,
    ctx: AppContext,
    registry: ExtensionRegistry,
    room_poll: Duration,
    lobby_poll: Duration,
    ext_tx: mpsc::Sender<ExtensionEvent>,
    screen: Screen,
}

impl AppState {
    pub fn new(
        api: Arc<ApiClient>,
        ctx: AppContext,
        registry: ExtensionRegistry,
        room_poll: Duration,
        lobby_poll: Duration,
        ext_tx: mpsc::Sender<ExtensionEvent>,
    ) -> Self {
        let service: Arc<dyn RoomService> = api.clone();
        AppState {
            api,
            service,
            ctx,
            registry,
            room_poll,
            lobby_poll,
            ext_tx,
            screen: Screen::Lobby { rooms: Vec::new() },
        }
    }

    /// The poll period appropriate for the current screen.
    fn poll_period(&self) -> Duration {
        match self.screen {
            Screen::Lobby { .. } => self.lobby_poll,
            Screen::Room { .. } => self.room_poll,
        }
    }

    async fn report_error(&self, message: String, ui_tx: &mpsc::Sender<UiUpdate>) {
        warn!("surfacing error to user: {message}");
        let _ = ui_tx.send(UiUpdate::Error(message)).await;
    }

    /// Refresh the lobby's room list and push it to the TUI.
    async fn refresh_lobby(&mut self, ui_tx: &mpsc::Sender<UiUpdate>) {
        match self.service.list_rooms().await {
            Ok(rooms) => {
                if let Screen::Lobby { rooms: cached } = &mut self.screen {
                    *cached = rooms.clone();
                }
                let snapshot = LobbySnapshot {
                    rooms,
                    card_set_names: self.ctx.card_sets.iter().map(|c| c.name.clone()).collect(),
                };
                let _ = ui_tx.send(UiUpdate::Lobby(Box::new(snapshot))).await;
            }
            Err(e) => self.report_error(e.to_string(), ui_tx).await,
        }
    }

    /// One poll tick for whichever screen is active.
    async fn poll_once(&mut self, ui_tx: &mpsc::Sender<UiUpdate>) {
        if matches!(self.screen, Screen::Lobby { .. }) {
            self.refresh_lobby(ui_tx).await;
        } else {
            self.reconcile_room(ui_tx).await;
        }
    }

    /// Run a reconciliation pass for the entered room and route its outcome.
    async fn reconcile_room(&mut self, ui_tx: &mpsc::Sender<UiUpdate>) {
        let result = match &mut self.screen {
            Screen::Room { engine, .. } => engine.reconcile().await,
            Screen::Lobby { .. } => return,
        };
        match result {
            Ok(ReconcileOutcome::Applied) => self.push_room(ui_tx).await,
            Ok(ReconcileOutcome::Removed) => {
                self.exit_room(Some(KICKED_NOTICE.to_string()), ui_tx).await;
            }
            // Transient failure: surface it, keep the view, keep polling.
            Err(EngineError::Api(e)) => self.report_error(e.to_string(), ui_tx).await,
            // Consistency failures are fatal to the view.
            Err(EngineError::Consistency(e)) => {
                self.report_error(e.to_string(), ui_tx).await;
                self.exit_room(None, ui_tx).await;
            }
        }
    }

    /// Push the current room view to the TUI.
    async fn push_room(&self, ui_tx: &mpsc::Sender<UiUpdate>) {
        let Screen::Room { engine, .. } = &self.screen else {
            return;
        };
        let Some(view) = engine.view() else { return };
        if let Some(snapshot) = room_snapshot_ui(view, &self.ctx, &self.registry) {
            let _ = ui_tx.send(UiUpdate::Room(Box::new(snapshot))).await;
        }
    }

    /// Drop the room screen and land back in the lobby.
    async fn exit_room(&mut self, notice: Option<String>, ui_tx: &mpsc::Sender<UiUpdate>) {
        self.screen = Screen::Lobby { rooms: Vec::new() };
        let _ = ui_tx.send(UiUpdate::LeftRoom { notice }).await;
        self.refresh_lobby(ui_tx).await;
    }

    // -- command handling ---------------------------------------------------

    async fn handle_command(&mut self, cmd: UserCommand, ui_tx: &mpsc::Sender<UiUpdate>) {
        match cmd {
            // Handled by the run loop.
            UserCommand::Quit => {}

            UserCommand::EnterRoom(name) => self.enter_room(name, ui_tx).await,
            UserCommand::CreateRoom {
                name,
                card_set_name,
            } => self.create_room(name, card_set_name, ui_tx).await,
            UserCommand::DeleteRoom(name) => match self.service.delete_room(&name).await {
                Ok(()) => self.refresh_lobby(ui_tx).await,
                Err(e) => self.report_error(e.to_string(), ui_tx).await,
            },

            UserCommand::LeaveRoom => {
                if let Screen::Room { engine, .. } = &self.screen {
                    engine.spawn_leave();
                    self.exit_room(None, ui_tx).await;
                }
            }

            UserCommand::CastVote(card_name) => self.cast_vote(card_name, ui_tx).await,
            UserCommand::ClearVotes => self.room_action(RoomAction::ClearVotes, ui_tx).await,
            UserCommand::SetMemberRole { username, role } => {
                let action = match role {
                    Role::Voter => MemberAction::SetVoter,
                    Role::Observer => MemberAction::SetObserver,
                };
                self.room_action(RoomAction::EditMember { username, action }, ui_tx)
                    .await;
            }
            UserCommand::KickMember(username) => {
                self.room_action(
                    RoomAction::EditMember {
                        username,
                        action: MemberAction::Kick,
                    },
                    ui_tx,
                )
                .await;
            }

            UserCommand::SetTopic(topic) => {
                self.edit_room_with(
                    move |edit| {
                        edit.topic = if topic.is_empty() { None } else { Some(topic) };
                    },
                    ui_tx,
                )
                .await;
            }
            UserCommand::SetCardSet(name) => {
                if !self.ctx.card_sets.iter().any(|c| c.name == name) {
                    self.report_error(format!("Unknown card set '{name}'"), ui_tx)
                        .await;
                    return;
                }
                self.edit_room_with(move |edit| edit.card_set_name = name, ui_tx)
                    .await;
            }
            UserCommand::ToggleExtension(key) => {
                self.edit_room_with(
                    move |edit| {
                        if !edit.extensions.remove(&key) {
                            edit.extensions.insert(key);
                        }
                    },
                    ui_tx,
                )
                .await;
            }

            UserCommand::IssueQueryChanged(query) => {
                let api = Arc::clone(&self.api);
                let ext_tx = self.ext_tx.clone();
                let enabled = self
                    .ctx
                    .enabled_extension_keys
                    .iter()
                    .any(|k| k == issuetracker::KEY);
                if let Screen::Room { engine, suggester } = &mut self.screen {
                    let active = engine
                        .view()
                        .is_some_and(|v| v.room.extensions.contains(issuetracker::KEY));
                    if enabled && active {
                        suggester.on_input(&query, api, ext_tx);
                    }
                }
            }
        }
    }

    /// Join a room and switch to the room screen.
    async fn enter_room(&mut self, name: String, ui_tx: &mpsc::Sender<UiUpdate>) {
        if matches!(self.screen, Screen::Room { .. }) {
            return;
        }
        let mut engine = RoomEngine::new(
            Arc::clone(&self.service),
            self.ctx.user.username.clone(),
            name,
            self.ctx.card_sets.clone(),
        );
        match engine.enter().await {
            Ok(_) => {
                self.screen = Screen::Room {
                    engine,
                    suggester: IssueSuggester::new(),
                };
                self.push_room(ui_tx).await;
            }
            Err(e) => self.report_error(e.to_string(), ui_tx).await,
        }
    }

    /// Validate and create a room, then enter it.
    ///
    /// The TUI already validates as the user types; this re-check is the
    /// backstop that guarantees no request fires for an invalid or
    /// duplicate name.
    async fn create_room(
        &mut self,
        name: String,
        card_set_name: String,
        ui_tx: &mpsc::Sender<UiUpdate>,
    ) {
        let Screen::Lobby { rooms } = &self.screen else {
            return;
        };
        if let Err(e) = actions::validate_room_name(&name, rooms) {
            self.report_error(e.to_string(), ui_tx).await;
            return;
        }
        if !self.ctx.card_sets.iter().any(|c| c.name == card_set_name) {
            self.report_error(format!("Unknown card set '{card_set_name}'"), ui_tx)
                .await;
            return;
        }
        match self.service.create_room(&name, &card_set_name).await {
            Ok(()) => self.enter_room(name, ui_tx).await,
            Err(e) => self.report_error(e.to_string(), ui_tx).await,
        }
    }

    /// Cast a vote with immediate optimistic feedback.
    async fn cast_vote(&mut self, card_name: String, ui_tx: &mpsc::Sender<UiUpdate>) {
        let card = {
            let Screen::Room { engine, .. } = &self.screen else {
                return;
            };
            engine.deck().and_then(|deck| deck.card(&card_name)).cloned()
        };
        let Some(card) = card else {
            self.report_error(
                format!("Card '{card_name}' is not part of this room's deck"),
                ui_tx,
            )
            .await;
            return;
        };

        let ctx = &self.ctx;
        let registry = &self.registry;
        let result = {
            let Screen::Room { engine, .. } = &mut self.screen else {
                return;
            };
            actions::dispatch(engine, RoomAction::CastVote(card), |view| {
                // Optimistic push, before the server call resolves.
                if let Some(snapshot) = room_snapshot_ui(view, ctx, registry) {
                    let _ = ui_tx.try_send(UiUpdate::Room(Box::new(snapshot)));
                }
            })
            .await
        };
        match result {
            Err(e) => {
                // The optimistic value was rolled back; render the unwind.
                self.report_error(e.to_string(), ui_tx).await;
                self.push_room(ui_tx).await;
            }
            Ok(outcome) => self.apply_dispatch_outcome(outcome, ui_tx).await,
        }
    }

    /// Dispatch a plain room action (no optimistic step).
    async fn room_action(&mut self, action: RoomAction, ui_tx: &mpsc::Sender<UiUpdate>) {
        let result = {
            let Screen::Room { engine, .. } = &mut self.screen else {
                return;
            };
            actions::dispatch(engine, action, |_| {}).await
        };
        match result {
            Ok(outcome) => self.apply_dispatch_outcome(outcome, ui_tx).await,
            Err(e) => self.report_error(e.to_string(), ui_tx).await,
        }
    }

    async fn apply_dispatch_outcome(
        &mut self,
        outcome: DispatchOutcome,
        ui_tx: &mpsc::Sender<UiUpdate>,
    ) {
        match outcome {
            DispatchOutcome::Reconciled(ReconcileOutcome::Applied) => self.push_room(ui_tx).await,
            DispatchOutcome::Reconciled(ReconcileOutcome::Removed) => {
                self.exit_room(Some(KICKED_NOTICE.to_string()), ui_tx).await;
            }
            DispatchOutcome::Noop => {}
        }
    }

    /// Build an edit of the current room, apply `change`, and dispatch the
    /// diffed patch.
    async fn edit_room_with<F>(&mut self, change: F, ui_tx: &mpsc::Sender<UiUpdate>)
    where
        F: FnOnce(&mut RoomEdit),
    {
        let edited = {
            let Screen::Room { engine, .. } = &self.screen else {
                return;
            };
            let Some(view) = engine.view() else { return };
            let mut edit = RoomEdit::from_room(&view.room);
            change(&mut edit);
            edit
        };
        self.room_action(RoomAction::EditRoom(edited), ui_tx).await;
    }

    async fn handle_extension_event(
        &mut self,
        event: ExtensionEvent,
        ui_tx: &mpsc::Sender<UiUpdate>,
    ) {
        match event {
            ExtensionEvent::IssueSuggestions { query, suggestions } => {
                if let Screen::Room { suggester, .. } = &mut self.screen {
                    suggester.record(query.clone(), suggestions.clone());
                }
                let _ = ui_tx
                    .send(UiUpdate::IssueSuggestions { query, suggestions })
                    .await;
            }
        }
    }
}

/// Build the TUI's room snapshot: the reconciled view, the resolved deck,
/// and the active extension panels (room slot while voting is open, submit
/// slot once revealed).
fn room_snapshot_ui(
    view: &RoomView,
    ctx: &AppContext,
    registry: &ExtensionRegistry,
) -> Option<RoomSnapshotUi> {
    let deck = view.room.card_set(&ctx.card_sets)?.clone();
    let enabled = registry.enabled(&ctx.enabled_extension_keys);
    let active = ExtensionRegistry::active_for_room(&enabled, &view.room);
    let summary = view.summary.as_ref().and_then(|s| s.votes.as_ref());
    let panels = active
        .iter()
        .map(|ext| ExtensionPanel {
            label: ext.label().to_string(),
            body: if view.room.voting_closed {
                ext.submit_panel(&view.room, summary)
            } else {
                ext.room_panel(&view.room)
            },
        })
        .collect();
    Some(RoomSnapshotUi {
        view: view.clone(),
        deck,
        panels,
        username: ctx.user.username.clone(),
    })
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the orchestrator event loop.
///
/// Listens on three sources with `tokio::select!`:
/// 1. User commands from the TUI
/// 2. Extension background events
/// 3. The poll timer (room view: fast, lobby: slower)
///
/// The interval is recreated whenever the screen changes so each view polls
/// at its own cadence; ticks that would have fired while a pass or mutation
/// was still in flight are dropped rather than bursting afterwards.
pub async fn run(
    mut state: AppState,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    mut ext_rx: mpsc::Receiver<ExtensionEvent>,
    ui_tx: mpsc::Sender<UiUpdate>,
) -> anyhow::Result<()> {
    info!("orchestrator loop started");

    let mut poll_period = state.poll_period();
    let mut poll = make_interval(poll_period);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) | None => {
                        info!("quit received, shutting down");
                        break;
                    }
                    Some(cmd) => state.handle_command(cmd, &ui_tx).await,
                }
            }

            event = ext_rx.recv() => {
                if let Some(event) = event {
                    state.handle_extension_event(event, &ui_tx).await;
                }
            }

            _ = poll.tick() => {
                state.poll_once(&ui_tx).await;
            }
        }

        let period = state.poll_period();
        if period != poll_period {
            poll_period = period;
            poll = make_interval(period);
        }
    }

    // Leave-on-exit is best effort: wait briefly, then let go.
    if let Screen::Room { engine, .. } = &state.screen {
        let leave = engine.service().leave_room(engine.room_name());
        match tokio::time::timeout(SHUTDOWN_LEAVE_TIMEOUT, leave).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("leave on shutdown failed: {e}"),
            Err(_) => warn!("leave on shutdown timed out"),
        }
    }

    info!("orchestrator loop exiting");
    Ok(())
}

fn make_interval(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Card, RoomMember, SummaryResult, VoteSummary};
    use std::collections::BTreeSet;

    fn card_sets() -> Vec<CardSet> {
        vec![CardSet {
            name: "Fibonacci".into(),
            cards: vec![
                Card {
                    name: "5".into(),
                    value: Some(5.0),
                    description: None,
                },
                Card {
                    name: "?".into(),
                    value: None,
                    description: None,
                },
            ],
            relevant_fraction_digits: 1,
        }]
    }

    fn ctx() -> AppContext {
        AppContext {
            user: User {
                username: "alice".into(),
            },
            card_sets: card_sets(),
            enabled_extension_keys: vec![issuetracker::KEY.to_string()],
        }
    }

    fn view(voting_closed: bool, extensions: &[&str]) -> RoomView {
        RoomView {
            room: Room {
                name: "R1".into(),
                topic: Some("ABC-123".into()),
                card_set_name: "Fibonacci".into(),
                members: vec![RoomMember {
                    username: "alice".into(),
                    role: Role::Voter,
                    vote: None,
                }],
                voting_closed,
                extensions: extensions
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<BTreeSet<_>>(),
            },
            active_vote: None,
            summary: voting_closed.then(|| SummaryResult {
                votes: Some(VoteSummary {
                    average: Some(5.0),
                    offset: 0,
                    nearest_card: None,
                    highest: None,
                    lowest: None,
                }),
            }),
        }
    }

    #[test]
    fn snapshot_resolves_deck_and_username() {
        let snapshot =
            room_snapshot_ui(&view(false, &[]), &ctx(), &ExtensionRegistry::builtin()).unwrap();
        assert_eq!(snapshot.deck.name, "Fibonacci");
        assert_eq!(snapshot.username, "alice");
        assert!(snapshot.panels.is_empty());
    }

    #[test]
    fn snapshot_includes_active_extension_panels() {
        let snapshot = room_snapshot_ui(
            &view(false, &[issuetracker::KEY]),
            &ctx(),
            &ExtensionRegistry::builtin(),
        )
        .unwrap();
        assert_eq!(snapshot.panels.len(), 1);
        assert_eq!(snapshot.panels[0].label, "Issue Tracker");
    }

    #[test]
    fn snapshot_for_unknown_deck_is_none() {
        let mut broken = view(false, &[]);
        broken.room.card_set_name = "Deleted".into();
        assert!(room_snapshot_ui(&broken, &ctx(), &ExtensionRegistry::builtin()).is_none());
    }

    #[test]
    fn closed_room_uses_submit_panels() {
        let snapshot = room_snapshot_ui(
            &view(true, &[issuetracker::KEY]),
            &ctx(),
            &ExtensionRegistry::builtin(),
        )
        .unwrap();
        // The submit slot offers the export rather than the link hint.
        assert!(format!("{:?}", snapshot.panels[0].body).contains("export"));
    }

    #[tokio::test]
    async fn poll_period_follows_screen() {
        let (ext_tx, _ext_rx) = mpsc::channel(8);
        let state = AppState::new(
            Arc::new(ApiClient::new("http://localhost:0", None)),
            ctx(),
            ExtensionRegistry::builtin(),
            ROOM_POLL_INTERVAL,
            LOBBY_POLL_INTERVAL,
            ext_tx,
        );
        assert_eq!(state.poll_period(), LOBBY_POLL_INTERVAL);
    }
}
