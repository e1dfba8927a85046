//! Round-robin turn scheduler with a fixed time quantum per turn

use crate::store::{PlayerId, SessionStore, TurnClosure, TurnTicket};
use log::{debug, info, warn};
use shared::MAX_PLAYERS;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout_at, Instant};

/// Start signal for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnGrant {
    pub ticket: TurnTicket,
    pub deadline: Instant,
}

/// How a player's side of a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnResult {
    Completed,
    TimedOut,
    Disconnected,
}

/// Done signal for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnDone {
    pub ticket: TurnTicket,
    pub result: TurnResult,
}

/// Scheduler-side ends of a player's start/done signal pair.
#[derive(Debug)]
pub struct TurnLink {
    pub grant_tx: mpsc::Sender<TurnGrant>,
    pub done_rx: mpsc::Receiver<TurnDone>,
}

/// Player-side ends of a player's start/done signal pair.
#[derive(Debug)]
pub struct TurnPort {
    pub grant_rx: mpsc::Receiver<TurnGrant>,
    pub done_tx: mpsc::Sender<TurnDone>,
}

/// Creates the two one-slot signals connecting the scheduler and one player.
pub fn turn_signals() -> (TurnLink, TurnPort) {
    let (grant_tx, grant_rx) = mpsc::channel(1);
    let (done_tx, done_rx) = mpsc::channel(1);
    (TurnLink { grant_tx, done_rx }, TurnPort { grant_rx, done_tx })
}

/// Hands out turns to participants one at a time, in slot order.
pub struct Scheduler {
    store: SessionStore,
    links: [Option<TurnLink>; MAX_PLAYERS],
    session: u64,
    quantum: Duration,
    idle_backoff: Duration,
    cursor: usize,
    next_seq: u64,
}

impl Scheduler {
    pub fn new(
        store: SessionStore,
        session: u64,
        links: Vec<(PlayerId, TurnLink)>,
        quantum: Duration,
        idle_backoff: Duration,
    ) -> Self {
        let mut slots: [Option<TurnLink>; MAX_PLAYERS] = Default::default();
        for (id, link) in links {
            if let Some(slot) = slots.get_mut(id) {
                *slot = Some(link);
            }
        }
        Self {
            store,
            links: slots,
            session,
            quantum,
            idle_backoff,
            cursor: 0,
            next_seq: 0,
        }
    }

    /// Runs until the session is finished, then drops every start signal so
    /// players still waiting for a turn are released.
    ///
    /// Returns the order in which turns were granted.
    pub async fn run(mut self) -> Vec<PlayerId> {
        info!(
            "Scheduler started for session {} (quantum={}s)",
            self.session,
            self.quantum.as_secs()
        );
        let mut changes = self.store.subscribe();
        let mut granted = Vec::new();

        while !self.store.is_session_over(self.session).await {
            let Some(player) = self.store.next_eligible(self.session, self.cursor).await else {
                tokio::select! {
                    _ = changes.changed() => {}
                    _ = sleep(self.idle_backoff) => {}
                }
                continue;
            };

            granted.push(player);
            self.grant_turn(player).await;
            self.cursor = (player + 1) % MAX_PLAYERS;
        }

        info!("Scheduler ending after {} turns", granted.len());
        granted
    }

    async fn grant_turn(&mut self, player: PlayerId) -> TurnClosure {
        self.next_seq += 1;
        let ticket = TurnTicket {
            session: self.session,
            player,
            seq: self.next_seq,
        };
        let deadline = Instant::now() + self.quantum;

        if !self.store.begin_turn(ticket, deadline).await {
            return TurnClosure::Stale;
        }
        info!("Player {} gets turn {}", player + 1, ticket.seq);

        let result = match self.links[player].as_mut() {
            Some(link) => Self::await_turn(link, ticket, deadline).await,
            None => None,
        };

        match result {
            Some(TurnResult::Completed) => debug!("Player {} finished early", player + 1),
            Some(TurnResult::TimedOut) => info!("Player {} quantum expired", player + 1),
            Some(TurnResult::Disconnected) => info!("Player {} left during their turn", player + 1),
            None => {
                warn!("Player {} is unreachable, removing from rotation", player + 1);
                self.links[player] = None;
                self.store.mark_disconnected(player).await;
            }
        }

        let closure = self.store.close_turn(ticket).await;
        if let TurnClosure::Forfeited(category) = closure {
            info!(
                "Player {} forfeits {} with 0 points",
                player + 1,
                category.name()
            );
        }
        closure
    }

    /// Sends the start signal and waits for the matching done signal or the
    /// deadline. `None` means the player's task is gone.
    async fn await_turn(link: &mut TurnLink, ticket: TurnTicket, deadline: Instant) -> Option<TurnResult> {
        let grant = TurnGrant { ticket, deadline };
        match timeout_at(deadline, link.grant_tx.send(grant)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return None,
            Err(_) => return Some(TurnResult::TimedOut),
        }

        loop {
            match timeout_at(deadline, link.done_rx.recv()).await {
                Ok(Some(done)) if done.ticket == ticket => return Some(done.result),
                Ok(Some(stale)) => debug!("Discarding stale done signal {:?}", stale.ticket),
                Ok(None) => return None,
                Err(_) => return Some(TurnResult::TimedOut),
            }
        }
    }
}
