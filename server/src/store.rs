//! Session state store shared by the lobby, the scheduler and every player task
//!
//! All durable game data lives in one `GameSession` behind a single async
//! mutex. `GameSession` holds the rules for each mutation as plain methods;
//! `SessionStore` is the cloneable handle that takes the lock, runs one of
//! those methods, and publishes a revision bump so waiters wake up instead
//! of polling. The lock is never held across channel I/O.

use crate::endgame::{self, GameOutcome};
use crate::lobby::{AdmitError, TargetError};
use log::{debug, info};
use shared::{
    score_hand, Category, Dice, HandScore, ScoreCard, CATEGORY_COUNT, MAX_PLAYERS, MIN_PLAYERS,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

/// Slot index, 0..MAX_PLAYERS.
pub type PlayerId = usize;

/// Longest display name kept, in characters.
pub const NAME_LIMIT: usize = 49;

/// Everything the server knows about one admitted player.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub name: String,
    pub connected: bool,
    pub participant: bool,
    pub done: bool,
    pub deadline: Option<Instant>,
    pub card: ScoreCard,
    /// Yahtzees rolled this session, scored or not.
    pub yahtzee_rolls: u32,
}

impl PlayerState {
    fn new(name: String) -> Self {
        Self {
            name,
            connected: true,
            participant: false,
            done: false,
            deadline: None,
            card: ScoreCard::new(),
            yahtzee_rolls: 0,
        }
    }
}

/// Identifies one granted turn. Only the holder of the live ticket may
/// write that turn's category result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnTicket {
    pub session: u64,
    pub player: PlayerId,
    pub seq: u64,
}

#[derive(Debug, Clone, Copy)]
struct ActiveTurn {
    ticket: TurnTicket,
    resolved: bool,
}

/// What the Yahtzee check decided for this turn's category selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Any,
    /// Repeat Yahtzee whose upper box is taken: only lower boxes may be used.
    LowerOnly { required: Category },
    /// Repeat Yahtzee whose upper box was open and has been filled already.
    AutoFilled { category: Category, points: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YahtzeeEvent {
    None,
    First,
    Repeat { bonus_total: Option<u32> },
}

/// Potentials for the final dice plus the decisions taken from them.
#[derive(Debug, Clone)]
pub struct ScoringPlan {
    pub hand: HandScore,
    pub event: YahtzeeEvent,
    pub selection: Selection,
    /// Open boxes the player may choose from, with their potentials.
    pub options: Vec<(Category, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOutcome {
    Scored(u32),
    AlreadyFilled,
    /// The scheduler already closed this turn.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnClosure {
    /// The player wrote this turn's result.
    Completed,
    /// Nothing was written in time, so this box was zeroed.
    Forfeited(Category),
    /// Nothing was written but no box was open.
    NothingOpen,
    /// The ticket was not the live turn.
    Stale,
}

#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub connected: bool,
    pub participant: bool,
    pub done: bool,
    pub card: ScoreCard,
    pub total: u32,
    pub yahtzee_rolls: u32,
    pub time_left: Option<Duration>,
    pub round: usize,
}

/// Lobby-facing facts one waiting player needs to decide what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LobbyView {
    pub host: Option<PlayerId>,
    pub target: Option<usize>,
    pub connected: usize,
    pub started: bool,
    pub participant: bool,
}

#[derive(Debug, Clone)]
pub struct Standing {
    pub id: PlayerId,
    pub name: String,
    pub total: u32,
    pub wins: u32,
    pub connected: bool,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_number: u64,
    pub finished: bool,
    pub winner: Option<PlayerId>,
    pub standings: Vec<Standing>,
}

/// The single record of all session and player data.
#[derive(Debug)]
pub struct GameSession {
    pub(crate) slots: [Option<PlayerState>; MAX_PLAYERS],
    pub(crate) target_players: Option<usize>,
    pub(crate) host: Option<PlayerId>,
    pub(crate) participants: Vec<PlayerId>,
    pub(crate) started: bool,
    pub(crate) finished: bool,
    pub(crate) current_turn: Option<PlayerId>,
    pub(crate) winner: Option<PlayerId>,
    pub(crate) total_wins: [u32; MAX_PLAYERS],
    pub(crate) session_number: u64,
    active_turn: Option<ActiveTurn>,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    pub fn new() -> Self {
        Self {
            slots: Default::default(),
            target_players: None,
            host: None,
            participants: Vec::new(),
            started: false,
            finished: false,
            current_turn: None,
            winner: None,
            total_wins: [0; MAX_PLAYERS],
            session_number: 1,
            active_turn: None,
        }
    }

    fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.slots.get(id).and_then(|s| s.as_ref())
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerState> {
        self.slots.get_mut(id).and_then(|s| s.as_mut())
    }

    pub fn connected_count(&self) -> usize {
        self.slots.iter().flatten().filter(|p| p.connected).count()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn session_number(&self) -> u64 {
        self.session_number
    }

    pub fn current_turn(&self) -> Option<PlayerId> {
        self.current_turn
    }

    pub fn participants(&self) -> &[PlayerId] {
        &self.participants
    }

    /// Claims the lowest free slot. The first admitted player becomes host.
    pub fn admit(&mut self, name: &str) -> Result<PlayerId, AdmitError> {
        if self.started {
            return Err(AdmitError::AlreadyStarted);
        }
        if let Some(target) = self.target_players {
            if self.connected_count() >= target {
                return Err(AdmitError::LobbyFull(target));
            }
        }
        let id = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(AdmitError::ServerFull)?;

        let trimmed: String = name.trim().chars().take(NAME_LIMIT).collect();
        let name = if trimmed.is_empty() {
            format!("Player {}", id + 1)
        } else {
            trimmed
        };

        self.slots[id] = Some(PlayerState::new(name));
        if self.host.is_none() {
            self.host = Some(id);
        }
        Ok(id)
    }

    /// Host-only, once, within MIN_PLAYERS..=MAX_PLAYERS. Returns how many
    /// players are connected right now.
    pub fn set_target_players(&mut self, player: PlayerId, target: usize) -> Result<usize, TargetError> {
        if self.host != Some(player) {
            return Err(TargetError::NotHost);
        }
        if self.target_players.is_some() || self.started {
            return Err(TargetError::AlreadySet);
        }
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&target) {
            return Err(TargetError::OutOfRange(target));
        }
        self.target_players = Some(target);
        Ok(self.connected_count())
    }

    /// The target count, once enough players are connected to start.
    pub fn ready_target(&self) -> Option<usize> {
        let target = self.target_players?;
        (!self.started && self.connected_count() >= target).then_some(target)
    }

    /// Freezes the lowest `target` connected slots as participants and
    /// starts the session. Any extra connected players are left out.
    pub fn freeze_participants(&mut self, target: usize) -> Option<Vec<PlayerId>> {
        if self.started {
            return None;
        }
        let chosen: Vec<PlayerId> = (0..MAX_PLAYERS)
            .filter(|&id| self.player(id).map_or(false, |p| p.connected))
            .take(target)
            .collect();
        if chosen.len() < target {
            return None;
        }
        for &id in &chosen {
            if let Some(p) = self.player_mut(id) {
                p.participant = true;
            }
        }
        self.participants = chosen.clone();
        self.target_players = Some(target);
        self.started = true;
        Some(chosen)
    }

    /// Frees a player's slot when their handler exits.
    ///
    /// Before the game, the slot is simply freed (passing the host role on if
    /// needed). During the game, a participant is disconnected and keeps
    /// their slot so final results stay visible. Once a finished session has
    /// no connected players left, the store resets for the next session.
    pub fn release(&mut self, player: PlayerId) -> bool {
        if self.player(player).is_none() {
            return false;
        }

        if !self.started {
            self.slots[player] = None;
            if self.host == Some(player) {
                self.host = (0..MAX_PLAYERS).find(|&id| self.player(id).is_some());
            }
            return false;
        }

        let participant = self.player(player).map_or(false, |p| p.participant);
        if participant {
            self.mark_disconnected(player);
        } else {
            self.slots[player] = None;
        }

        if self.finished && self.slots.iter().flatten().all(|p| !p.connected) {
            self.reset_for_next_session();
            return true;
        }
        false
    }

    fn reset_for_next_session(&mut self) {
        let total_wins = self.total_wins;
        let next = self.session_number + 1;
        *self = GameSession::new();
        self.total_wins = total_wins;
        self.session_number = next;
        info!("Session store reset, lobby open for session {}", next);
    }

    /// Zeroes every open box of a participant and takes them out of the
    /// rotation. Returns the boxes that were forfeited.
    pub fn mark_disconnected(&mut self, player: PlayerId) -> Vec<Category> {
        let in_game = self.started && !self.finished;
        let Some(p) = self.player_mut(player) else {
            return Vec::new();
        };
        p.connected = false;
        if !in_game || !p.participant {
            return Vec::new();
        }
        let forfeited = p.card.forfeit_all();
        p.card.award_upper_bonus_if_earned();
        info!(
            "Player {} disconnected, forfeiting {} open categories",
            player + 1,
            forfeited.len()
        );
        self.mark_done(player);
        forfeited
    }

    /// Takes a participant out of the rotation and re-checks the endgame.
    pub fn mark_done(&mut self, player: PlayerId) -> Option<GameOutcome> {
        if let Some(p) = self.player_mut(player) {
            if p.participant {
                p.done = true;
            }
        }
        endgame::evaluate(self)
    }

    /// Loads this hand's potentials into the player's card.
    pub fn compute_potentials(&mut self, player: PlayerId, dice: &Dice) -> Option<HandScore> {
        let p = self.player_mut(player)?;
        let hand = score_hand(dice, p.card.yahtzee_scored());
        p.card.load_potentials(&hand);
        Some(hand)
    }

    /// Moves a box's potential into it. False if it is already filled or the
    /// player does not exist.
    pub fn apply_score(&mut self, player: PlayerId, category: Category) -> bool {
        let applied = self
            .player_mut(player)
            .and_then(|p| p.card.apply(category))
            .is_some();
        if applied {
            self.after_mutation(player);
        }
        applied
    }

    fn after_mutation(&mut self, player: PlayerId) -> Option<GameOutcome> {
        if let Some(p) = self.player_mut(player) {
            if p.card.award_upper_bonus_if_earned() {
                debug!("Player {} earned the upper section bonus", player + 1);
            }
        }
        endgame::evaluate(self)
    }

    fn is_eligible(&self, id: PlayerId) -> bool {
        self.player(id)
            .map_or(false, |p| p.participant && p.connected && !p.done)
    }

    /// First slot at or after `from` (wrapping) that may take a turn.
    pub fn next_eligible(&self, session: u64, from: usize) -> Option<PlayerId> {
        if session != self.session_number || !self.started || self.finished {
            return None;
        }
        (0..MAX_PLAYERS)
            .map(|offset| (from + offset) % MAX_PLAYERS)
            .find(|&id| self.is_eligible(id))
    }

    pub fn begin_turn(&mut self, ticket: TurnTicket, deadline: Instant) -> bool {
        if ticket.session != self.session_number || self.finished || !self.is_eligible(ticket.player) {
            return false;
        }
        if let Some(p) = self.player_mut(ticket.player) {
            p.deadline = Some(deadline);
        }
        self.current_turn = Some(ticket.player);
        self.active_turn = Some(ActiveTurn {
            ticket,
            resolved: false,
        });
        true
    }

    fn ticket_is_live(&self, ticket: TurnTicket) -> bool {
        matches!(self.active_turn, Some(turn) if turn.ticket == ticket && !turn.resolved)
    }

    fn resolve_active_turn(&mut self) {
        if let Some(turn) = self.active_turn.as_mut() {
            turn.resolved = true;
        }
    }

    /// Scores the final dice and applies the repeat-Yahtzee rules.
    ///
    /// Returns `None` once the ticket is no longer live.
    pub fn resolve_yahtzee(&mut self, ticket: TurnTicket, dice: &Dice) -> Option<ScoringPlan> {
        if !self.ticket_is_live(ticket) {
            return None;
        }
        let hand = self.compute_potentials(ticket.player, dice)?;
        let p = self.player_mut(ticket.player)?;

        let mut event = YahtzeeEvent::None;
        let mut selection = Selection::Any;

        if hand.is_yahtzee() {
            if p.yahtzee_rolls >= 1 {
                p.yahtzee_rolls += 1;
                let bonus_total = p
                    .card
                    .yahtzee_scored()
                    .then(|| p.card.add_yahtzee_bonus());

                if p.card.is_filled(Category::Yahtzee) {
                    if let Some(required) = hand.required_upper() {
                        if !p.card.is_filled(required) {
                            if let Some(points) = p.card.apply(required) {
                                selection = Selection::AutoFilled {
                                    category: required,
                                    points,
                                };
                            }
                        } else if !p.card.is_lower_complete() {
                            selection = Selection::LowerOnly { required };
                        }
                    }
                }
                event = YahtzeeEvent::Repeat { bonus_total };
            } else {
                p.yahtzee_rolls = 1;
                event = YahtzeeEvent::First;
            }
        }

        let options = match selection {
            Selection::AutoFilled { .. } => Vec::new(),
            Selection::LowerOnly { .. } => p
                .card
                .open_categories()
                .filter(|c| c.is_lower())
                .map(|c| (c, p.card.get(c).potential))
                .collect(),
            Selection::Any => p
                .card
                .open_categories()
                .map(|c| (c, p.card.get(c).potential))
                .collect(),
        };

        if let Selection::AutoFilled { .. } = selection {
            self.resolve_active_turn();
        }
        self.after_mutation(ticket.player);

        Some(ScoringPlan {
            hand,
            event,
            selection,
            options,
        })
    }

    /// Writes the player's chosen box for a live turn.
    pub fn score_turn(&mut self, ticket: TurnTicket, category: Category) -> ScoreOutcome {
        if !self.ticket_is_live(ticket) {
            return ScoreOutcome::Expired;
        }
        let Some(points) = self
            .player_mut(ticket.player)
            .and_then(|p| p.card.apply(category))
        else {
            return ScoreOutcome::AlreadyFilled;
        };
        self.resolve_active_turn();
        self.after_mutation(ticket.player);
        ScoreOutcome::Scored(points)
    }

    /// Ends a turn. If nothing was written for it, the lowest open box is
    /// zeroed so the turn still consumes exactly one box.
    pub fn close_turn(&mut self, ticket: TurnTicket) -> TurnClosure {
        let Some(turn) = self.active_turn.filter(|t| t.ticket == ticket) else {
            return TurnClosure::Stale;
        };
        self.active_turn = None;
        self.current_turn = None;

        let Some(p) = self.player_mut(ticket.player) else {
            return TurnClosure::NothingOpen;
        };
        p.deadline = None;
        p.card.clear_potentials();
        if turn.resolved {
            return TurnClosure::Completed;
        }

        match p.card.first_open() {
            Some(category) => {
                p.card.forfeit(category);
                self.after_mutation(ticket.player);
                TurnClosure::Forfeited(category)
            }
            None => TurnClosure::NothingOpen,
        }
    }

    pub fn snapshot(&self, player: PlayerId) -> Option<PlayerSnapshot> {
        let p = self.player(player)?;
        let now = Instant::now();
        Some(PlayerSnapshot {
            id: player,
            name: p.name.clone(),
            connected: p.connected,
            participant: p.participant,
            done: p.done,
            card: p.card.clone(),
            total: p.card.total(),
            yahtzee_rolls: p.yahtzee_rolls,
            time_left: p.deadline.map(|d| d.saturating_duration_since(now)),
            round: CATEGORY_COUNT - p.card.open_categories().count() + 1,
        })
    }

    pub fn lobby_view(&self, player: PlayerId) -> LobbyView {
        LobbyView {
            host: self.host,
            target: self.target_players,
            connected: self.connected_count(),
            started: self.started,
            participant: self.player(player).map_or(false, |p| p.participant),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let standings = self
            .participants
            .iter()
            .filter_map(|&id| {
                self.player(id).map(|p| Standing {
                    id,
                    name: p.name.clone(),
                    total: p.card.total(),
                    wins: self.total_wins[id],
                    connected: p.connected,
                })
            })
            .collect();
        SessionSummary {
            session_number: self.session_number,
            finished: self.finished,
            winner: self.winner,
            standings,
        }
    }
}

/// Cloneable handle to the one shared `GameSession`.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<GameSession>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(GameSession::new())),
            revision: Arc::new(revision),
        }
    }

    /// Receiver that changes whenever lobby or session state changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r = r.wrapping_add(1));
    }

    pub async fn admit(&self, name: &str) -> Result<PlayerId, AdmitError> {
        let result = self.inner.lock().await.admit(name);
        if result.is_ok() {
            self.bump();
        }
        result
    }

    pub async fn set_target_players(&self, player: PlayerId, target: usize) -> Result<usize, TargetError> {
        let result = self.inner.lock().await.set_target_players(player, target);
        if result.is_ok() {
            self.bump();
        }
        result
    }

    pub async fn freeze_participants(&self, target: usize) -> Option<Vec<PlayerId>> {
        let frozen = self.inner.lock().await.freeze_participants(target);
        if frozen.is_some() {
            self.bump();
        }
        frozen
    }

    /// Freezes participants if the host's target has been reached.
    pub async fn start_if_ready(&self) -> Option<(u64, Vec<PlayerId>)> {
        let started = {
            let mut session = self.inner.lock().await;
            let target = session.ready_target()?;
            session
                .freeze_participants(target)
                .map(|ids| (session.session_number, ids))
        };
        if started.is_some() {
            self.bump();
        }
        started
    }

    pub async fn release(&self, player: PlayerId) {
        self.inner.lock().await.release(player);
        self.bump();
    }

    pub async fn mark_disconnected(&self, player: PlayerId) -> Vec<Category> {
        let forfeited = self.inner.lock().await.mark_disconnected(player);
        self.bump();
        forfeited
    }

    pub async fn mark_done(&self, player: PlayerId) -> Option<GameOutcome> {
        let outcome = self.inner.lock().await.mark_done(player);
        self.bump();
        outcome
    }

    pub async fn compute_potentials(&self, player: PlayerId, dice: &Dice) -> Option<HandScore> {
        self.inner.lock().await.compute_potentials(player, dice)
    }

    pub async fn apply_score(&self, player: PlayerId, category: Category) -> bool {
        let applied = self.inner.lock().await.apply_score(player, category);
        self.bump();
        applied
    }

    pub async fn next_eligible(&self, session: u64, from: usize) -> Option<PlayerId> {
        self.inner.lock().await.next_eligible(session, from)
    }

    pub async fn begin_turn(&self, ticket: TurnTicket, deadline: Instant) -> bool {
        self.inner.lock().await.begin_turn(ticket, deadline)
    }

    pub async fn resolve_yahtzee(&self, ticket: TurnTicket, dice: &Dice) -> Option<ScoringPlan> {
        let plan = self.inner.lock().await.resolve_yahtzee(ticket, dice);
        self.bump();
        plan
    }

    pub async fn score_turn(&self, ticket: TurnTicket, category: Category) -> ScoreOutcome {
        let outcome = self.inner.lock().await.score_turn(ticket, category);
        self.bump();
        outcome
    }

    pub async fn close_turn(&self, ticket: TurnTicket) -> TurnClosure {
        let closure = self.inner.lock().await.close_turn(ticket);
        self.bump();
        closure
    }

    pub async fn snapshot(&self, player: PlayerId) -> Option<PlayerSnapshot> {
        self.inner.lock().await.snapshot(player)
    }

    pub async fn lobby_view(&self, player: PlayerId) -> LobbyView {
        self.inner.lock().await.lobby_view(player)
    }

    pub async fn summary(&self) -> SessionSummary {
        self.inner.lock().await.summary()
    }

    pub async fn session_number(&self) -> u64 {
        self.inner.lock().await.session_number
    }

    pub async fn is_finished(&self) -> bool {
        self.inner.lock().await.finished
    }

    /// True once the given session has finished or been replaced.
    pub async fn is_session_over(&self, session: u64) -> bool {
        let s = self.inner.lock().await;
        s.finished || s.session_number != session
    }
}
