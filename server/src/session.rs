//! One connected player's path through the server
//!
//! Name prompt, admission, host setup, lobby wait, the turn protocol, the
//! final report and finally the slot release. The lobby wait is driven by
//! store revisions and player input; nothing here polls.

use crate::channel::{Incoming, PlayerChannel};
use crate::lobby::{Admission, Lobby, TargetError};
use crate::store::PlayerId;
use crate::text;
use crate::turn::{DiceRoller, ProtocolExit, TurnProtocol};
use log::{debug, info};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LobbyExit {
    Participant,
    LeftOut,
    Closed,
}

enum LobbyEvent {
    Changed(bool),
    Input(Incoming),
}

/// Serves one connection from the name prompt to disconnect.
///
/// Returns the slot the player held, or `None` if they were never admitted.
pub async fn serve_player(
    lobby: Arc<Lobby>,
    mut channel: PlayerChannel,
    roller: Box<dyn DiceRoller>,
) -> Option<PlayerId> {
    channel.send(text::NAME_PROMPT);
    let name = match channel.receive_line(None).await {
        Incoming::Line(line) => line,
        Incoming::Timeout | Incoming::Closed => {
            debug!("Connection closed before a name was given");
            return None;
        }
    };

    let Admission { player_id, port } = match lobby.admit(&name).await {
        Ok(admission) => admission,
        Err(e) => {
            channel.send(text::rejected(&e));
            return None;
        }
    };

    let store = lobby.store().clone();
    let display_name = store
        .snapshot(player_id)
        .await
        .map_or(name, |snap| snap.name);
    channel.send(text::welcome(&display_name, player_id));

    match wait_in_lobby(&lobby, player_id, &mut channel).await {
        LobbyExit::Participant => {
            channel.send(text::GAME_STARTING);
            let exit = TurnProtocol::new(player_id, store.clone(), &mut channel, port, roller)
                .run()
                .await;
            if exit == ProtocolExit::Released {
                if let Some(me) = store.snapshot(player_id).await {
                    let summary = store.summary().await;
                    channel.send(text::final_report(&me, &summary));
                }
            }
        }
        LobbyExit::LeftOut => {
            info!("Player {} was not needed for this game", player_id + 1);
            channel.send(text::LEFT_OUT);
        }
        LobbyExit::Closed => {}
    }

    channel.send(text::DISCONNECTING);
    lobby.leave(player_id).await;
    Some(player_id)
}

async fn wait_in_lobby(lobby: &Lobby, player: PlayerId, channel: &mut PlayerChannel) -> LobbyExit {
    let store = lobby.store();
    let mut changes = store.subscribe();
    let mut prompted_host = false;
    let mut waited_for_host = false;
    let mut announced_target = false;

    loop {
        changes.borrow_and_update();
        let view = store.lobby_view(player).await;
        if view.started {
            return if view.participant {
                LobbyExit::Participant
            } else {
                LobbyExit::LeftOut
            };
        }

        let is_host = view.host == Some(player);
        match view.target {
            None if is_host => {
                if !prompted_host {
                    if waited_for_host {
                        channel.send(text::NOW_HOST);
                        waited_for_host = false;
                    }
                    channel.send(text::host_prompt());
                    prompted_host = true;
                }
            }
            None => {
                if !waited_for_host {
                    channel.send(text::WAITING_FOR_HOST);
                    waited_for_host = true;
                }
            }
            Some(target) => {
                if !announced_target {
                    if !is_host {
                        channel.send(text::host_selected(target, view.connected));
                    }
                    channel.send(text::WAITING_FOR_START);
                    announced_target = true;
                }
            }
        }

        let event = tokio::select! {
            changed = changes.changed() => LobbyEvent::Changed(changed.is_ok()),
            incoming = channel.receive_line(None) => LobbyEvent::Input(incoming),
        };

        match event {
            LobbyEvent::Changed(true) | LobbyEvent::Input(Incoming::Timeout) => {}
            LobbyEvent::Changed(false) | LobbyEvent::Input(Incoming::Closed) => return LobbyExit::Closed,
            LobbyEvent::Input(Incoming::Line(line)) => {
                if is_host && view.target.is_none() {
                    let chosen = line.trim().parse::<usize>().unwrap_or(0);
                    match lobby.set_target_players(player, chosen).await {
                        Ok(connected) => channel.send(text::lobby_set(chosen, connected)),
                        Err(TargetError::OutOfRange(_)) => {
                            channel.send(format!("{}\n", TargetError::OutOfRange(chosen)));
                            prompted_host = false;
                        }
                        Err(e) => debug!("Player {} target refused: {}", player + 1, e),
                    }
                } else if view.target.is_none() {
                    channel.send(text::WAITING_FOR_HOST);
                } else {
                    channel.send(text::WAITING_FOR_START);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RemoteEnd;
    use crate::config::ServerConfig;
    use crate::store::SessionStore;
    use crate::turn::ScriptedRoller;
    use tokio::task::JoinHandle;

    fn connect(lobby: &Arc<Lobby>) -> (RemoteEnd, JoinHandle<Option<PlayerId>>) {
        let (channel, remote) = PlayerChannel::pair(16);
        let lobby = Arc::clone(lobby);
        let task = tokio::spawn(async move {
            serve_player(lobby, channel, Box::new(ScriptedRoller::new([6, 6, 6, 6, 6]))).await
        });
        (remote, task)
    }

    fn lobby() -> Arc<Lobby> {
        Arc::new(Lobby::new(SessionStore::new(), ServerConfig::default()))
    }

    #[tokio::test]
    async fn test_host_setup_and_waiting_messages() {
        let lobby = lobby();
        let (mut host, _host_task) = connect(&lobby);
        host.read_until(text::NAME_PROMPT).await.unwrap();
        host.send_line("ann").await;

        let seen = host.read_until("[HOST SETUP]").await.unwrap();
        assert!(seen.contains("Welcome ann! You are Player 1"));

        host.send_line("7").await;
        let seen = host.read_until("[HOST SETUP]").await.unwrap();
        assert!(seen.contains("Invalid number. Please enter a value between 3 and 5."));

        let (mut guest, _guest_task) = connect(&lobby);
        guest.read_until(text::NAME_PROMPT).await.unwrap();
        guest.send_line("bo").await;
        guest.read_until(text::WAITING_FOR_HOST).await.unwrap();

        host.send_line("3").await;
        let seen = host.read_until(text::WAITING_FOR_START).await.unwrap();
        assert!(seen.contains("Lobby set to 3 players. Currently connected: 2/3"));

        let seen = guest.read_until(text::WAITING_FOR_START).await.unwrap();
        assert!(seen.contains("Host selected 3 players. Currently connected: 2/3"));
    }

    #[tokio::test]
    async fn test_rejection_after_start() {
        let lobby = lobby();
        for name in ["a", "b", "c"] {
            lobby.admit(name).await.unwrap();
        }
        lobby.set_target_players(0, 3).await.unwrap();

        let (mut late, task) = connect(&lobby);
        late.read_until(text::NAME_PROMPT).await.unwrap();
        late.send_line("dee").await;
        let seen = late.read_until("Server:").await.unwrap();
        assert!(seen.contains("Game already started"));
        assert_eq!(task.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lobby_disconnect_frees_slot() {
        let lobby = lobby();
        let (mut first, task) = connect(&lobby);
        first.read_until(text::NAME_PROMPT).await.unwrap();
        first.send_line("ann").await;
        first.read_until("[HOST SETUP]").await.unwrap();
        drop(first);

        assert_eq!(task.await.unwrap(), Some(0));
        assert_eq!(lobby.store().lobby_view(0).await.connected, 0);
        assert_eq!(lobby.store().lobby_view(0).await.host, None);
    }

    #[tokio::test]
    async fn test_new_host_is_prompted() {
        let lobby = lobby();
        let (mut first, first_task) = connect(&lobby);
        first.read_until(text::NAME_PROMPT).await.unwrap();
        first.send_line("ann").await;
        first.read_until("[HOST SETUP]").await.unwrap();

        let (mut second, _second_task) = connect(&lobby);
        second.read_until(text::NAME_PROMPT).await.unwrap();
        second.send_line("bo").await;
        second.read_until(text::WAITING_FOR_HOST).await.unwrap();

        drop(first);
        first_task.await.unwrap();

        let seen = second.read_until("[HOST SETUP]").await.unwrap();
        assert!(seen.contains("you are now the host"));
    }
}
