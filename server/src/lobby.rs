//! Admission, host setup and game start
//!
//! The lobby owns the scheduler-side ends of every admitted player's turn
//! signals. Once the host's target count is connected it freezes the
//! participant set, hands the matching ends to a freshly spawned
//! [`Scheduler`](crate::scheduler::Scheduler) and drops the rest.

use crate::config::ServerConfig;
use crate::scheduler::{turn_signals, Scheduler, TurnLink, TurnPort};
use crate::store::{PlayerId, SessionStore};
use log::{info, warn};
use shared::{MAX_PLAYERS, MIN_PLAYERS};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Why a connection could not claim a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitError {
    AlreadyStarted,
    ServerFull,
    LobbyFull(usize),
}

impl fmt::Display for AdmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmitError::AlreadyStarted => write!(f, "Game already started. Try again later."),
            AdmitError::ServerFull => write!(f, "Full (max players reached). Try again later."),
            AdmitError::LobbyFull(target) => {
                write!(f, "Lobby is full ({} players). Try again later.", target)
            }
        }
    }
}

impl std::error::Error for AdmitError {}

/// Why the host's player count was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetError {
    NotHost,
    AlreadySet,
    OutOfRange(usize),
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetError::NotHost => write!(f, "Only the host can choose the number of players."),
            TargetError::AlreadySet => write!(f, "The number of players has already been chosen."),
            TargetError::OutOfRange(_) => write!(
                f,
                "Invalid number. Please enter a value between {} and {}.",
                MIN_PLAYERS, MAX_PLAYERS
            ),
        }
    }
}

impl std::error::Error for TargetError {}

/// A claimed slot plus the player-side ends of its turn signals.
#[derive(Debug)]
pub struct Admission {
    pub player_id: PlayerId,
    pub port: TurnPort,
}

pub struct Lobby {
    store: SessionStore,
    config: ServerConfig,
    /// Lock order: `links` before the store.
    links: Mutex<HashMap<PlayerId, TurnLink>>,
    scheduler: Mutex<Option<JoinHandle<Vec<PlayerId>>>>,
}

impl Lobby {
    pub fn new(store: SessionStore, config: ServerConfig) -> Self {
        Self {
            store,
            config,
            links: Mutex::new(HashMap::new()),
            scheduler: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Claims a slot for `name` and starts the game if that fills the lobby.
    pub async fn admit(&self, name: &str) -> Result<Admission, AdmitError> {
        let admission = {
            let mut links = self.links.lock().await;
            match self.store.admit(name).await {
                Ok(player_id) => {
                    let (link, port) = turn_signals();
                    links.insert(player_id, link);
                    Admission { player_id, port }
                }
                Err(e) => {
                    warn!("Rejected connection: {}", e);
                    return Err(e);
                }
            }
        };

        let view = self.store.lobby_view(admission.player_id).await;
        info!(
            "Player {} assigned ({} connected{})",
            admission.player_id + 1,
            view.connected,
            view.target.map(|t| format!(", target {}", t)).unwrap_or_default()
        );

        self.freeze_and_start().await;
        Ok(admission)
    }

    /// Records the host's choice and starts the game if enough players are
    /// already connected. Returns the connected count at the time of choice.
    pub async fn set_target_players(&self, player: PlayerId, target: usize) -> Result<usize, TargetError> {
        let connected = self.store.set_target_players(player, target).await?;
        info!("Host chose {} players ({} connected)", target, connected);
        self.freeze_and_start().await;
        Ok(connected)
    }

    /// Freezes the participant set and spawns the scheduler once the
    /// target count is connected. True when this call started the game.
    pub async fn freeze_and_start(&self) -> bool {
        let mut links = self.links.lock().await;
        let Some((session, participants)) = self.store.start_if_ready().await else {
            return false;
        };

        let mut granted = Vec::with_capacity(participants.len());
        for &id in &participants {
            if let Some(link) = links.remove(&id) {
                granted.push((id, link));
            }
        }
        links.clear();
        drop(links);

        info!(
            "*** GAME STARTING with {} players (session {}) ***",
            participants.len(),
            session
        );

        let scheduler = Scheduler::new(
            self.store.clone(),
            session,
            granted,
            self.config.quantum,
            self.config.idle_backoff,
        );
        let handle = tokio::spawn(scheduler.run());
        *self.scheduler.lock().await = Some(handle);
        true
    }

    /// Handle of the most recently started scheduler, if not yet taken.
    pub async fn take_scheduler(&self) -> Option<JoinHandle<Vec<PlayerId>>> {
        self.scheduler.lock().await.take()
    }

    /// Gives up a player's slot when their connection handler exits.
    pub async fn leave(&self, player: PlayerId) {
        self.links.lock().await.remove(&player);
        self.store.release(player).await;
        info!("Player {} left", player + 1);
    }
}
