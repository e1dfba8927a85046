//! Per-player turn protocol
//!
//! Each participant's task runs a [`TurnProtocol`]. Between turns it waits
//! for a start signal from the scheduler and answers any stray input with a
//! "please wait" notice. Once granted a turn it walks the player through:
//!
//! 1. **Rolling**: all five dice.
//! 2. **Rerolling**: up to two rounds of "which dice?".
//! 3. **Yahtzee check**: congratulations, the +100 bonus and the forced
//!    upper box or lower-only restriction for repeat Yahtzees.
//! 4. **Category selection**: re-prompts until an open box is chosen.
//! 5. **Scorecard reveal**, then the done signal back to the scheduler.
//!
//! Every read shares the one deadline carried by the grant. A timed-out read
//! ends the turn without writing anything; the scheduler then zeroes a box.
//! A closed channel forfeits all remaining boxes.

use crate::channel::{Incoming, PlayerChannel};
use crate::scheduler::{TurnDone, TurnGrant, TurnPort, TurnResult};
use crate::store::{PlayerId, ScoreOutcome, ScoringPlan, Selection, SessionStore, TurnTicket, YahtzeeEvent};
use crate::text;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Category, Dice, DICE_COUNT, MAX_REROLLS};
use std::collections::{BTreeSet, VecDeque};
use tokio::time::Instant;

/// Source of die faces for the protocol.
pub trait DiceRoller: Send {
    /// One fair die, 1..=6.
    fn roll_die(&mut self) -> u8;

    fn roll_all(&mut self) -> Dice {
        let mut values = [1u8; DICE_COUNT];
        for value in values.iter_mut() {
            *value = checked_face(self.roll_die());
        }
        Dice::new(values).unwrap_or_default()
    }
}

/// Clamps a face into 1..=6, logging rollers that stray outside it.
fn checked_face(face: u8) -> u8 {
    if !(1..=6).contains(&face) {
        warn!("Dice roller produced face {}, clamping to 1..=6", face);
    }
    face.clamp(1, 6)
}

pub struct RandomRoller<R = StdRng> {
    rng: R,
}

impl RandomRoller<StdRng> {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl<R: Rng + Send> DiceRoller for RandomRoller<R> {
    fn roll_die(&mut self) -> u8 {
        self.rng.gen_range(1..=6)
    }
}

/// Replays a fixed sequence of faces, starting over when it runs out.
#[derive(Debug, Clone)]
pub struct ScriptedRoller {
    faces: VecDeque<u8>,
}

impl ScriptedRoller {
    pub fn new(faces: impl IntoIterator<Item = u8>) -> Self {
        Self {
            faces: faces.into_iter().filter(|f| (1..=6).contains(f)).collect(),
        }
    }
}

impl DiceRoller for ScriptedRoller {
    fn roll_die(&mut self) -> u8 {
        match self.faces.pop_front() {
            Some(face) => {
                self.faces.push_back(face);
                face
            }
            None => 1,
        }
    }
}

/// Yes/no answer from the first non-blank character.
pub fn parse_yes_no(line: &str) -> Option<bool> {
    match line.trim_start().chars().next() {
        Some('y' | 'Y') => Some(true),
        Some('n' | 'N') => Some(false),
        _ => None,
    }
}

/// Zero-based dice positions from 1-based tokens, de-duplicated and sorted.
/// Tokens outside 1..=5 or not numbers are skipped.
pub fn parse_reroll_positions(line: &str) -> Vec<usize> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(|token| token.parse::<usize>().ok())
        .filter(|n| (1..=DICE_COUNT).contains(n))
        .map(|n| n - 1)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The offered category the player typed, if it is one.
pub fn parse_category_choice(line: &str, lower_only: bool, options: &[(Category, u32)]) -> Option<Category> {
    let category = line
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(Category::from_number)?;
    if lower_only && !category.is_lower() {
        return None;
    }
    options
        .iter()
        .any(|&(offered, _)| offered == category)
        .then_some(category)
}

/// How a protocol run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolExit {
    /// The scheduler finished and released this player.
    Released,
    /// The player's connection closed.
    Disconnected,
}

enum Waited {
    Grant(TurnGrant),
    Released,
    Closed,
}

pub struct TurnProtocol<'a> {
    player: PlayerId,
    store: SessionStore,
    channel: &'a mut PlayerChannel,
    port: TurnPort,
    roller: Box<dyn DiceRoller>,
}

impl<'a> TurnProtocol<'a> {
    pub fn new(
        player: PlayerId,
        store: SessionStore,
        channel: &'a mut PlayerChannel,
        port: TurnPort,
        roller: Box<dyn DiceRoller>,
    ) -> Self {
        Self {
            player,
            store,
            channel,
            port,
            roller,
        }
    }

    /// Plays granted turns until the scheduler lets go or the player leaves.
    pub async fn run(mut self) -> ProtocolExit {
        loop {
            let grant = match self.wait_for_grant().await {
                Waited::Grant(grant) => grant,
                Waited::Released => return ProtocolExit::Released,
                Waited::Closed => {
                    self.store.mark_disconnected(self.player).await;
                    return ProtocolExit::Disconnected;
                }
            };

            let result = self.play_turn(&grant).await;
            if result == TurnResult::Disconnected {
                self.store.mark_disconnected(self.player).await;
            }

            let done = TurnDone {
                ticket: grant.ticket,
                result,
            };
            if self.port.done_tx.send(done).await.is_err() {
                debug!("Player {} done signal dropped, scheduler is gone", self.player + 1);
            }

            if result == TurnResult::Disconnected {
                return ProtocolExit::Disconnected;
            }
        }
    }

    async fn wait_for_grant(&mut self) -> Waited {
        loop {
            let incoming = tokio::select! {
                biased;
                grant = self.port.grant_rx.recv() => {
                    return match grant {
                        Some(grant) => Waited::Grant(grant),
                        None => Waited::Released,
                    };
                }
                incoming = self.channel.receive_line(None) => incoming,
            };

            match incoming {
                Incoming::Line(_) => self.channel.send(text::NOT_YOUR_TURN),
                Incoming::Closed => return Waited::Closed,
                Incoming::Timeout => {}
            }
        }
    }

    /// Reads one line before the turn deadline. `Err` carries how the turn ends.
    async fn read(&mut self, deadline: Instant) -> Result<String, TurnResult> {
        match self.channel.receive_line(Some(deadline)).await {
            Incoming::Line(line) => Ok(line),
            Incoming::Timeout => {
                self.channel.send(text::TIME_UP);
                Err(TurnResult::TimedOut)
            }
            Incoming::Closed => Err(TurnResult::Disconnected),
        }
    }

    async fn play_turn(&mut self, grant: &TurnGrant) -> TurnResult {
        match self.try_play_turn(grant).await {
            Ok(()) => TurnResult::Completed,
            Err(result) => result,
        }
    }

    async fn try_play_turn(&mut self, grant: &TurnGrant) -> Result<(), TurnResult> {
        let ticket = grant.ticket;
        let deadline = grant.deadline;

        let (round, name) = match self.store.snapshot(self.player).await {
            Some(snap) => (snap.round, snap.name),
            None => (1, format!("Player {}", self.player + 1)),
        };
        self.channel.send(text::turn_banner(round, &name));
        self.channel.send(text::time_limit(
            deadline.saturating_duration_since(Instant::now()),
        ));

        let dice = self.roll_and_reroll(deadline).await?;

        let Some(plan) = self.store.resolve_yahtzee(ticket, &dice).await else {
            self.channel.send(text::TIME_UP);
            return Err(TurnResult::TimedOut);
        };
        self.announce_yahtzee(&plan);

        match plan.selection {
            Selection::AutoFilled { category, points } => {
                info!(
                    "Player {} repeat Yahtzee auto-filled {} with {}",
                    self.player + 1,
                    category.name(),
                    points
                );
                self.channel.send(text::auto_filled(category, points));
            }
            Selection::LowerOnly { required } => {
                self.channel.send(text::lower_only(required));
                self.choose_category(ticket, deadline, &plan, true).await?;
            }
            Selection::Any => {
                self.choose_category(ticket, deadline, &plan, false).await?;
            }
        }

        if let Some(snap) = self.store.snapshot(self.player).await {
            self.channel.send(text::scorecard(&snap.card));
        }
        self.channel.send(text::TURN_COMPLETE);
        Ok(())
    }

    async fn roll_and_reroll(&mut self, deadline: Instant) -> Result<Dice, TurnResult> {
        let mut dice = self.roller.roll_all();
        self.channel.send(text::dice_line("Your dice", &dice));

        let mut rerolls_left = MAX_REROLLS;
        while rerolls_left > 0 {
            self.channel.send(text::reroll_prompt(rerolls_left));
            let answer = self.read(deadline).await?;
            match parse_yes_no(&answer) {
                Some(false) => break,
                Some(true) => {
                    self.channel.send(text::REROLL_WHICH);
                    let line = self.read(deadline).await?;
                    let positions = parse_reroll_positions(&line);
                    if positions.is_empty() {
                        continue;
                    }
                    for position in positions {
                        let face = checked_face(self.roller.roll_die());
                        if !dice.set(position, face) {
                            warn!("Reroll position {} out of range", position + 1);
                        }
                    }
                    rerolls_left -= 1;
                    self.channel.send(text::dice_line("New dice", &dice));
                }
                None => {}
            }
        }
        Ok(dice)
    }

    fn announce_yahtzee(&mut self, plan: &ScoringPlan) {
        match plan.event {
            YahtzeeEvent::None => {}
            YahtzeeEvent::First => {
                info!("Player {} rolled a Yahtzee", self.player + 1);
                self.channel.send(text::first_yahtzee());
            }
            YahtzeeEvent::Repeat { bonus_total } => {
                info!("Player {} rolled another Yahtzee", self.player + 1);
                self.channel.send(text::another_yahtzee());
                if bonus_total.is_some() {
                    self.channel.send(text::yahtzee_bonus_awarded());
                }
            }
        }
    }

    async fn choose_category(
        &mut self,
        ticket: TurnTicket,
        deadline: Instant,
        plan: &ScoringPlan,
        lower_only: bool,
    ) -> Result<(), TurnResult> {
        if plan.options.is_empty() {
            return Ok(());
        }
        self.channel.send(text::scoring_options(&plan.options));

        loop {
            self.channel.send(text::category_prompt(lower_only));
            let line = self.read(deadline).await?;
            let Some(category) = parse_category_choice(&line, lower_only, &plan.options) else {
                self.channel.send(text::INVALID_CHOICE);
                continue;
            };

            match self.store.score_turn(ticket, category).await {
                ScoreOutcome::Scored(points) => {
                    debug!(
                        "Player {} scored {} in {}",
                        self.player + 1,
                        points,
                        category.name()
                    );
                    self.channel.send(text::scored(points, category));
                    return Ok(());
                }
                ScoreOutcome::AlreadyFilled => self.channel.send(text::INVALID_CHOICE),
                ScoreOutcome::Expired => {
                    self.channel.send(text::TIME_UP);
                    return Err(TurnResult::TimedOut);
                }
            }
        }
    }
}
