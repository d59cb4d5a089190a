// Room view reconciliation engine.
//
// The engine owns the client-side view of one room: the latest room
// snapshot, the local member's active vote, and the cached vote summary.
// It is driven by an initial join-and-load plus reconciliation passes
// (periodic ticks and forced passes after mutations). Each pass fetches a
// fresh snapshot, detects the voting-closed edge, and replaces the cached
// view in a single write so readers never observe a half-applied state.
//
// Passes never overlap: the engine is owned by the orchestrator task and
// every pass is awaited to completion before the next one starts. The poll
// interval uses skip-missed-tick behavior, so ticks that would have fired
// while a pass (or a mutation) was in flight are dropped instead of
// bursting afterwards -- the next tick simply catches up.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, RoomService};
use crate::model::{Card, CardSet, Room, SummaryResult};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// The client and server disagree about reality. Fatal to the room view.
#[derive(Debug, Error)]
pub enum ConsistencyError {
    #[error("user '{username}' has no membership row in room '{room}'")]
    MembershipMissing { username: String, room: String },

    #[error("room '{room}' references unknown card set '{card_set}'")]
    UnknownCardSet { room: String, card_set: String },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// The reconciled view of one room. Replaced wholesale by each pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomView {
    pub room: Room,
    /// The local member's currently cast vote.
    pub active_vote: Option<Card>,
    /// Summary cached from the most recent voting-closed transition.
    /// `None` while voting is open.
    pub summary: Option<SummaryResult>,
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A fresh snapshot was applied to the view.
    Applied,
    /// The local user is no longer a member of the room (kicked). The view
    /// was left untouched; callers should navigate away.
    Removed,
}

/// What a pass must do about the cached summary, decided by comparing the
/// previous and fresh `voting_closed` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SummaryAction {
    /// Closed edge: fetch the summary once.
    Fetch,
    /// Reopened edge: discard the cached summary with this write.
    Clear,
    /// No transition: keep whatever is cached.
    Keep,
}

fn summary_action(was_closed: bool, now_closed: bool) -> SummaryAction {
    match (was_closed, now_closed) {
        (false, true) => SummaryAction::Fetch,
        (true, false) => SummaryAction::Clear,
        _ => SummaryAction::Keep,
    }
}

/// The local member's vote from a snapshot. Outer `None` means the user has
/// no membership row at all.
fn member_vote(room: &Room, username: &str) -> Option<Option<Card>> {
    room.member(username).map(|m| m.vote.clone())
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// State machine for one room view: `Uninitialized` (no view yet) until
/// [`RoomEngine::enter`] succeeds, then `Active` until dropped.
pub struct RoomEngine {
    service: Arc<dyn RoomService>,
    username: String,
    room_name: String,
    card_sets: Vec<CardSet>,
    view: Option<RoomView>,
}

impl RoomEngine {
    pub fn new(
        service: Arc<dyn RoomService>,
        username: impl Into<String>,
        room_name: impl Into<String>,
        card_sets: Vec<CardSet>,
    ) -> Self {
        RoomEngine {
            service,
            username: username.into(),
            room_name: room_name.into(),
            card_sets,
            view: None,
        }
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn service(&self) -> &Arc<dyn RoomService> {
        &self.service
    }

    /// The current view, if the engine is active.
    pub fn view(&self) -> Option<&RoomView> {
        self.view.as_ref()
    }

    /// The card set of the current room, resolved against the catalog.
    pub fn deck(&self) -> Option<&CardSet> {
        self.view.as_ref()?.room.card_set(&self.card_sets)
    }

    /// Join the room and load the initial view.
    ///
    /// Runs join -> fetch -> (summary if already closed) as one setup
    /// sequence, so entering an already-revealed room never flashes the
    /// voting UI. A missing membership row right after joining is a fatal
    /// consistency error, as is an unknown card set. If any step after the
    /// join fails, a best-effort leave is spawned so the server doesn't
    /// keep a ghost member.
    pub async fn enter(&mut self) -> Result<&RoomView, EngineError> {
        self.service.join_room(&self.room_name).await?;
        match self.load_initial().await {
            Ok(()) => {
                info!("entered room '{}'", self.room_name);
                Ok(self.view.as_ref().expect("view set by load_initial"))
            }
            Err(e) => {
                self.spawn_leave();
                Err(e)
            }
        }
    }

    async fn load_initial(&mut self) -> Result<(), EngineError> {
        let room = self.service.get_room(&self.room_name).await?;
        self.check_card_set(&room)?;
        let active_vote =
            member_vote(&room, &self.username).ok_or_else(|| ConsistencyError::MembershipMissing {
                username: self.username.clone(),
                room: self.room_name.clone(),
            })?;
        let summary = if room.voting_closed {
            Some(self.service.get_summary(&self.room_name).await?)
        } else {
            None
        };
        self.view = Some(RoomView {
            room,
            active_vote,
            summary,
        });
        Ok(())
    }

    /// One reconciliation pass: fetch, detect edges, replace the view.
    ///
    /// A missing membership row here is not fatal -- it means the user was
    /// removed from the room, which callers handle by navigating away. API
    /// failures leave the view untouched and the caller keeps polling.
    pub async fn reconcile(&mut self) -> Result<ReconcileOutcome, EngineError> {
        let room = self.service.get_room(&self.room_name).await?;
        self.check_card_set(&room)?;

        let Some(active_vote) = member_vote(&room, &self.username) else {
            info!("no longer a member of room '{}'", self.room_name);
            return Ok(ReconcileOutcome::Removed);
        };

        let was_closed = self.view.as_ref().is_some_and(|v| v.room.voting_closed);
        let summary = match summary_action(was_closed, room.voting_closed) {
            SummaryAction::Fetch => {
                debug!("voting closed in room '{}', fetching summary", self.room_name);
                Some(self.service.get_summary(&self.room_name).await?)
            }
            SummaryAction::Clear => None,
            SummaryAction::Keep => self.view.as_ref().and_then(|v| v.summary.clone()),
        };

        // Single write: room, vote, and summary become visible together.
        self.view = Some(RoomView {
            room,
            active_vote,
            summary,
        });
        Ok(ReconcileOutcome::Applied)
    }

    /// Optimistically set the active vote before the server confirms.
    /// Returns the previous vote so a failed mutation can roll back.
    pub fn preview_vote(&mut self, card: Card) -> Option<Card> {
        match self.view.as_mut() {
            Some(view) => view.active_vote.replace(card),
            None => None,
        }
    }

    /// Restore the vote captured before an optimistic update.
    pub fn rollback_vote(&mut self, previous: Option<Card>) {
        if let Some(view) = self.view.as_mut() {
            view.active_vote = previous;
        }
    }

    /// Best-effort leave, fire-and-forget: navigation never blocks on it
    /// and failures are only logged.
    pub fn spawn_leave(&self) {
        let service = Arc::clone(&self.service);
        let room = self.room_name.clone();
        tokio::spawn(async move {
            if let Err(e) = service.leave_room(&room).await {
                warn!("failed to leave room '{room}': {e}");
            }
        });
    }

    fn check_card_set(&self, room: &Room) -> Result<(), ConsistencyError> {
        if room.card_set(&self.card_sets).is_none() {
            return Err(ConsistencyError::UnknownCardSet {
                room: room.name.clone(),
                card_set: room.card_set_name.clone(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
