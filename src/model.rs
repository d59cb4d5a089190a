// Room snapshot model: immutable value types for rooms, members, cards,
// and vote summaries as received from the server.
//
// Snapshots are plain data. Each poll response deserializes into a fresh
// `Room` that wholly replaces the previous one; nothing in here is mutated
// in place. Required fields that are absent in the payload fail
// deserialization and surface as a malformed-response error at the API
// layer -- the only silent defaults are fields the API explicitly allows
// to be `null`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The local participant, obtained once at startup from `/api/identity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// A single estimation card within a card set.
///
/// `value` is `None` for non-numeric cards (e.g. "?", coffee break) which
/// are excluded from averaging on the server side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub name: String,
    pub value: Option<f64>,
    pub description: Option<String>,
}

/// An ordered deck of estimation cards. The card order is the display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSet {
    pub name: String,
    pub cards: Vec<Card>,
    /// Number of fraction digits that are meaningful when displaying the
    /// vote average for this deck (e.g. 1 for a Fibonacci deck).
    pub relevant_fraction_digits: u8,
}

impl CardSet {
    /// Look up a card by name.
    pub fn card(&self, name: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.name == name)
    }
}

// ---------------------------------------------------------------------------
// Members and rooms
// ---------------------------------------------------------------------------

/// Role of a room member. Only voters cast votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Voter,
    Observer,
}

/// One member of a room as reported by the server.
///
/// `vote` is populated only for the member's own cast vote while voting is
/// open, or for every member that voted once results are revealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMember {
    pub username: String,
    pub role: Role,
    pub vote: Option<Card>,
}

/// A room snapshot. Owned by the server; the client never constructs one
/// wholesale and only submits partial edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub name: String,
    pub topic: Option<String>,
    pub card_set_name: String,
    pub members: Vec<RoomMember>,
    pub voting_closed: bool,
    /// Extension keys this room has opted into.
    #[serde(default)]
    pub extensions: BTreeSet<String>,
}

impl Room {
    /// Find a member row by username.
    pub fn member(&self, username: &str) -> Option<&RoomMember> {
        self.members.iter().find(|m| m.username == username)
    }

    /// Resolve this room's card set against the loaded catalog.
    pub fn card_set<'a>(&self, catalog: &'a [CardSet]) -> Option<&'a CardSet> {
        catalog.iter().find(|cs| cs.name == self.card_set_name)
    }
}

/// Partial room edit as submitted to the server. Fields left as `None` are
/// omitted from the PATCH payload and remain unchanged server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_set_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<BTreeSet<String>>,
}

impl RoomPatch {
    /// Whether the patch carries no changes at all.
    pub fn is_empty(&self) -> bool {
        self.topic.is_none() && self.card_set_name.is_none() && self.extensions.is_none()
    }
}

// ---------------------------------------------------------------------------
// Vote summary
// ---------------------------------------------------------------------------

/// A vote shared by the members holding an extreme (highest or lowest) vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteExtreme {
    pub card: Card,
    pub members: Vec<RoomMember>,
}

/// Server-computed aggregate over a closed round's votes.
///
/// `average`, `nearest_card`, `highest` and `lowest` are all `None` when no
/// numeric votes exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummary {
    pub average: Option<f64>,
    /// Disagreement spread. Only the magnitude matters to the client; it is
    /// bucketed into display tiers via [`VoteSummary::agreement`].
    pub offset: u32,
    pub nearest_card: Option<Card>,
    pub highest: Option<VoteExtreme>,
    pub lowest: Option<VoteExtreme>,
}

/// Result of a summary fetch. `votes: None` means voting closed with zero
/// votes cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub votes: Option<VoteSummary>,
}

/// Display tier for the disagreement spread of a closed round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Agreement {
    /// Everyone landed on the same or adjacent cards.
    High,
    /// Spread of two card steps.
    Moderate,
    /// Wider spread; the round is worth discussing.
    Low,
}

/// Offsets at or below this are high agreement.
const AGREEMENT_HIGH_MAX: u32 = 1;
/// Offsets at or below this (and above the high bound) are moderate.
const AGREEMENT_MODERATE_MAX: u32 = 2;

impl VoteSummary {
    /// Bucket the raw offset into a display tier.
    pub fn agreement(&self) -> Agreement {
        match self.offset {
            o if o <= AGREEMENT_HIGH_MAX => Agreement::High,
            o if o <= AGREEMENT_MODERATE_MAX => Agreement::Moderate,
            _ => Agreement::Low,
        }
    }
}

/// Format a vote average with the deck's relevant fraction digits, trimming
/// trailing zeros ("5.0" -> "5", "3.50" -> "3.5").
pub fn format_average(average: f64, fraction_digits: u8) -> String {
    let formatted = format!("{average:.prec$}", prec = fraction_digits as usize);
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
