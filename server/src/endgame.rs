//! Completion detection and winner election.
//!
//! Runs under the store lock after every scorecard mutation. A participant
//! whose 13 boxes are all filled becomes done; once every participant is
//! done the session is finished exactly once and a winner is elected.

use crate::store::{GameSession, PlayerId};
use log::info;

/// Result of the session that just finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOutcome {
    pub winner: PlayerId,
    /// Final totals of every participant in slot order.
    pub totals: Vec<(PlayerId, u32)>,
}

/// Marks completed participants done and finishes the session when all are.
///
/// Returns the outcome only on the call that finishes the session.
pub fn evaluate(session: &mut GameSession) -> Option<GameOutcome> {
    if !session.started || session.finished {
        return None;
    }

    for &id in &session.participants {
        if let Some(player) = session.slots[id].as_mut() {
            if player.card.is_complete() {
                player.done = true;
            }
        }
    }

    let all_done = session
        .participants
        .iter()
        .all(|&id| session.slots[id].as_ref().map_or(true, |p| p.done));
    if !all_done {
        return None;
    }

    let totals = final_totals(session);
    let winner = elect_winner(&totals)?;

    session.winner = Some(winner);
    session.total_wins[winner] += 1;
    session.finished = true;
    session.current_turn = None;

    info!(
        "Session {} finished: winner is player {} with {} points ({:?})",
        session.session_number,
        winner + 1,
        totals
            .iter()
            .find(|(id, _)| *id == winner)
            .map_or(0, |(_, t)| *t),
        totals
    );

    Some(GameOutcome { winner, totals })
}

/// Category points plus both bonuses for every participant, in slot order.
pub fn final_totals(session: &GameSession) -> Vec<(PlayerId, u32)> {
    session
        .participants
        .iter()
        .filter_map(|&id| session.slots[id].as_ref().map(|p| (id, p.card.total())))
        .collect()
}

/// Picks the strictly highest total; on equal totals the first entry
/// scanned keeps the lead, so ties go to the lowest slot.
pub fn elect_winner(totals: &[(PlayerId, u32)]) -> Option<PlayerId> {
    let mut best: Option<(PlayerId, u32)> = None;
    for &(id, total) in totals {
        match best {
            Some((_, lead)) if total <= lead => {}
            _ => best = Some((id, total)),
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Category;

    fn started(n: usize) -> GameSession {
        let mut session = GameSession::new();
        for i in 0..n {
            session.admit(&format!("p{}", i)).unwrap();
        }
        session.set_target_players(0, n).unwrap();
        session.freeze_participants(n).unwrap();
        session
    }

    #[test]
    fn test_elect_winner_strict_maximum() {
        assert_eq!(elect_winner(&[(0, 150), (1, 210), (2, 180)]), Some(1));
        assert_eq!(elect_winner(&[]), None);
    }

    #[test]
    fn test_elect_winner_tie_goes_to_first_scanned() {
        assert_eq!(elect_winner(&[(0, 150), (1, 210), (2, 210)]), Some(1));
        assert_eq!(elect_winner(&[(0, 0), (1, 0), (2, 0)]), Some(0));
    }

    #[test]
    fn test_evaluate_waits_for_every_participant() {
        let mut session = started(3);
        session.slots[0].as_mut().unwrap().card.forfeit_all();
        session.slots[1].as_mut().unwrap().card.forfeit_all();

        assert!(evaluate(&mut session).is_none());
        assert!(session.slots[0].as_ref().unwrap().done);
        assert!(session.slots[1].as_ref().unwrap().done);
        assert!(!session.slots[2].as_ref().unwrap().done);
        assert!(!session.finished);
    }

    #[test]
    fn test_evaluate_finishes_exactly_once() {
        let mut session = started(3);
        for id in 0..3 {
            session.slots[id].as_mut().unwrap().card.forfeit_all();
        }

        let outcome = evaluate(&mut session).unwrap();
        assert_eq!(outcome.winner, 0);
        assert_eq!(outcome.totals, vec![(0, 0), (1, 0), (2, 0)]);
        assert!(session.finished);
        assert_eq!(session.total_wins[0], 1);

        assert!(evaluate(&mut session).is_none());
        assert_eq!(session.total_wins[0], 1);
    }

    #[test]
    fn test_evaluate_ignores_lobby() {
        let mut session = GameSession::new();
        session.admit("solo").unwrap();
        assert!(evaluate(&mut session).is_none());
        assert!(!session.finished);
    }

    #[test]
    fn test_totals_include_bonuses() {
        let mut session = started(3);
        let card = &mut session.slots[2].as_mut().unwrap().card;
        card.add_yahtzee_bonus();
        card.forfeit(Category::Aces);
        assert_eq!(final_totals(&session), vec![(0, 0), (1, 0), (2, 100)]);
    }
}
