//! Integration tests for the Yahtzee server
//!
//! These tests drive whole sessions through the lobby, scheduler and turn
//! protocol with scripted dice and prompt-answering bots, plus a real TCP
//! round trip through the terminal client.

use server::channel::{PlayerChannel, RemoteEnd};
use server::config::ServerConfig;
use server::lobby::Lobby;
use server::session::serve_player;
use server::store::{PlayerId, SessionStore};
use server::text;
use server::turn::ScriptedRoller;
use shared::{score_hand, Category, Dice};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How a bot behaves once the game is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    /// Keeps the first roll and takes the first open box.
    FirstOpen,
    /// Never answers during a turn.
    Silent,
    /// Hangs up at its first reroll prompt.
    QuitOnFirstTurn,
}

struct Bot {
    name: &'static str,
    faces: Vec<u8>,
    behaviour: Behaviour,
}

fn lobby(quantum: Duration) -> Arc<Lobby> {
    let config = ServerConfig::default().with_quantum(quantum);
    Arc::new(Lobby::new(SessionStore::new(), config))
}

/// Number of the first option listed in a scoring-options block.
fn first_option(chunk: &str) -> Option<String> {
    chunk
        .lines()
        .skip_while(|line| !line.contains("=== SCORING OPTIONS ==="))
        .nth(1)
        .and_then(|line| line.trim().split('.').next())
        .map(str::to_string)
}

async fn play(mut remote: RemoteEnd, behaviour: Behaviour) -> String {
    let mut transcript = String::new();
    let mut choice = String::new();

    while let Some(chunk) = remote.output.recv().await {
        transcript.push_str(&chunk);

        if chunk.contains("[HOST SETUP]") {
            remote.send_line("3").await;
        } else if chunk.contains("Reroll? (Y/N): ") {
            match behaviour {
                Behaviour::FirstOpen => {
                    remote.send_line("n").await;
                }
                Behaviour::Silent => {}
                Behaviour::QuitOnFirstTurn => return transcript,
            }
        } else if let Some(option) = first_option(&chunk) {
            choice = option;
        } else if chunk.contains("Choose category") || chunk.contains("Choose LOWER category") {
            remote.send_line(&choice).await;
        }
    }
    transcript
}

/// Connects the bots in order, so bot `i` holds slot `i` and bot 0 hosts,
/// then lets each play out the game.
async fn join_all(lobby: &Arc<Lobby>, bots: Vec<Bot>) -> Vec<JoinHandle<String>> {
    let mut handles = Vec::new();
    for bot in bots {
        let (channel, mut remote) = PlayerChannel::pair(16);
        let player_lobby = Arc::clone(lobby);
        let roller = Box::new(ScriptedRoller::new(bot.faces));
        tokio::spawn(async move { serve_player(player_lobby, channel, roller).await });

        remote.read_until(text::NAME_PROMPT).await.unwrap();
        remote.send_line(bot.name).await;
        let welcome = remote.read_until("Welcome").await.unwrap();
        assert!(welcome.contains(bot.name));

        handles.push(tokio::spawn(play(remote, bot.behaviour)));
    }
    handles
}

/// Waits until the lobby has started a game and returns its scheduler.
async fn started_scheduler(lobby: &Lobby) -> JoinHandle<Vec<PlayerId>> {
    let mut changes = lobby.store().subscribe();
    loop {
        if let Some(handle) = lobby.take_scheduler().await {
            return handle;
        }
        tokio::select! {
            _ = changes.changed() => {}
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
    }
}

async fn transcripts(handles: Vec<JoinHandle<String>>) -> Vec<String> {
    let mut out = Vec::new();
    for handle in handles {
        out.push(handle.await.unwrap());
    }
    out
}

/// FULL SESSION TESTS
mod session_tests {
    use super::*;

    /// Three players, 13 rounds each, with a repeat-Yahtzee lower-only turn
    #[tokio::test]
    async fn three_player_game_to_the_end() {
        let lobby = lobby(Duration::from_secs(90));
        let handles = join_all(
            &lobby,
            vec![
                Bot {
                    name: "ann",
                    faces: vec![2, 3, 4, 5, 6],
                    behaviour: Behaviour::FirstOpen,
                },
                Bot {
                    name: "bo",
                    faces: vec![1, 1, 1, 1, 1],
                    behaviour: Behaviour::FirstOpen,
                },
                Bot {
                    name: "cy",
                    faces: vec![3, 3, 3, 2, 2],
                    behaviour: Behaviour::FirstOpen,
                },
            ],
        )
        .await;

        let scheduler = started_scheduler(&lobby).await;
        let order = tokio_test::assert_ok!(scheduler.await);
        assert_eq!(order.len(), 39);
        assert!(order.iter().enumerate().all(|(i, &p)| p == i % 3));

        let logs = transcripts(handles).await;
        for log in &logs {
            assert!(log.contains(text::GAME_STARTING));
            assert!(log.contains("[ROUND 13 - YOUR TURN"));
            assert!(log.contains("=== GAME OVER ==="));
            assert!(log.contains("*** WINNER: Player 2 (bo) with 170 points! Total wins: 1 ***"));
            assert!(log.ends_with(text::DISCONNECTING));
        }

        assert!(logs[0].contains("Your final score: 110"));
        assert!(logs[2].contains("Your final score: 64"));

        let bo = &logs[1];
        assert!(bo.contains("Congratulations! You scored a Yahtzee!"));
        assert!(bo.contains("Congratulations! You scored another Yahtzee!"));
        assert!(bo.contains("Yahtzee bonus awarded! (+100)"));
        assert!(bo.contains("Since UPPER SECTION #1 is NOT available"));
        assert!(bo.contains("Choose LOWER category (7-13): "));
        assert!(bo.contains("Yahtzee bonus total: 100"));

        // Everyone left, so the store is back to an open lobby.
        let store = lobby.store();
        assert_eq!(store.session_number().await, 2);
        assert!(!store.lobby_view(0).await.started);
        let next = lobby.admit("dee").await.unwrap();
        assert_eq!(next.player_id, 0);
        assert_eq!(store.lobby_view(0).await.host, Some(0));
    }

    /// A player who hangs up forfeits every box and the others play on
    #[tokio::test]
    async fn disconnect_mid_game_forfeits_remaining_boxes() {
        let lobby = lobby(Duration::from_secs(90));
        let handles = join_all(
            &lobby,
            vec![
                Bot {
                    name: "ann",
                    faces: vec![6, 6, 6, 5, 5],
                    behaviour: Behaviour::FirstOpen,
                },
                Bot {
                    name: "bo",
                    faces: vec![4, 4, 4, 4, 2],
                    behaviour: Behaviour::FirstOpen,
                },
                Bot {
                    name: "cy",
                    faces: vec![6, 6, 6, 6, 6],
                    behaviour: Behaviour::QuitOnFirstTurn,
                },
            ],
        )
        .await;

        let order = started_scheduler(&lobby).await.await.unwrap();
        assert_eq!(order.iter().filter(|&&p| p == 2).count(), 1);
        assert_eq!(order.len(), 27);

        let logs = transcripts(handles).await;
        assert!(!logs[2].contains("=== GAME OVER ==="));
        assert!(logs[0].contains("Player 3 (cy): 0 points [disconnected]"));
        assert!(logs[1].contains("=== GAME OVER ==="));
    }

    /// A silent player loses exactly one box per quantum
    #[tokio::test(start_paused = true)]
    async fn silent_player_forfeits_one_box_per_turn() {
        let lobby = lobby(Duration::from_secs(5));
        let handles = join_all(
            &lobby,
            vec![
                Bot {
                    name: "ann",
                    faces: vec![2, 3, 4, 5, 6],
                    behaviour: Behaviour::FirstOpen,
                },
                Bot {
                    name: "zed",
                    faces: vec![6, 6, 6, 6, 6],
                    behaviour: Behaviour::Silent,
                },
                Bot {
                    name: "cy",
                    faces: vec![2, 3, 4, 5, 6],
                    behaviour: Behaviour::FirstOpen,
                },
            ],
        )
        .await;

        let order = started_scheduler(&lobby).await.await.unwrap();
        assert_eq!(order.len(), 39);

        let logs = transcripts(handles).await;
        assert_eq!(logs[1].matches(text::TIME_UP).count(), 13);
        assert!(logs[1].contains("Your final score: 0"));
        assert!(logs[0].contains("*** WINNER: Player 1 (ann) with 110 points!"));
        assert_eq!(logs[0].matches(text::TIME_UP).count(), 0);
    }
}

/// LOBBY TESTS
mod lobby_tests {
    use super::*;

    #[tokio::test]
    async fn extra_player_is_left_out() {
        let lobby = lobby(Duration::from_secs(90));
        let mut remotes = Vec::new();
        for name in ["a", "b", "c", "d"] {
            let (channel, mut remote) = PlayerChannel::pair(16);
            let player_lobby = Arc::clone(&lobby);
            tokio::spawn(async move {
                serve_player(player_lobby, channel, Box::new(ScriptedRoller::new([1]))).await
            });
            remote.read_until(text::NAME_PROMPT).await.unwrap();
            remote.send_line(name).await;
            remote.read_until("Welcome").await.unwrap();
            remotes.push(remote);
        }

        remotes[0].read_until("[HOST SETUP]").await.unwrap();
        remotes[0].send_line("3").await;

        let seen = remotes[3].read_until(text::DISCONNECTING).await.unwrap();
        assert!(seen.contains(text::LEFT_OUT));
        assert!(!seen.contains(text::GAME_STARTING));

        let seen = remotes[2].read_until(text::GAME_STARTING).await.unwrap();
        assert!(seen.contains(text::WAITING_FOR_HOST));
        assert!(lobby.store().lobby_view(2).await.participant);
    }
}

/// SCORING SCENARIOS
mod scoring_tests {
    use super::*;
    use server::endgame::elect_winner;

    #[test]
    fn straight_hand_potentials() {
        let hand = score_hand(&Dice::new([2, 3, 4, 5, 6]).unwrap(), false);
        assert_eq!(hand.potential(Category::SmallStraight), 30);
        assert_eq!(hand.potential(Category::LargeStraight), 40);
        assert_eq!(hand.potential(Category::Chance), 20);
        assert_eq!(hand.potential(Category::ThreeOfAKind), 0);
        assert_eq!(hand.required_upper(), None);
    }

    #[test]
    fn tie_goes_to_lowest_slot() {
        assert_eq!(elect_winner(&[(0, 150), (1, 210), (2, 210)]), Some(1));
    }
}

/// CLIENT-SERVER TESTS
mod client_server_tests {
    use super::*;
    use client::network::Client;
    use server::network::Server;

    #[tokio::test]
    async fn terminal_client_talks_to_server() {
        let config = ServerConfig {
            port: 0,
            ..ServerConfig::default()
        };
        let server = tokio_test::assert_ok!(Server::new(config).await);
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move { server.run().await });

        let client = Client::connect(&addr.to_string()).await.unwrap();
        let mut output = Vec::new();
        client.pump(&b"ann\n5\n"[..], &mut output).await.unwrap();

        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.starts_with(text::NAME_PROMPT));
        assert!(transcript.contains("Welcome ann! You are Player 1"));
        assert!(transcript.contains("Lobby set to 5 players. Currently connected: 1/5"));
        assert!(transcript.ends_with(text::DISCONNECTING));
    }
}
