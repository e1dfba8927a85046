//! Rendering of everything the server writes to a player

use crate::store::{PlayerSnapshot, SessionSummary};
use shared::{Category, Dice, ScoreCard, MAX_PLAYERS, MAX_REROLLS, MIN_PLAYERS, UPPER_BONUS_POINTS};
use std::fmt::Write;
use std::time::Duration;

pub const NAME_PROMPT: &str = "Enter your name: ";
pub const WAITING_FOR_HOST: &str = "Waiting for host to choose number of players...\n";
pub const WAITING_FOR_START: &str = "Waiting for game to start...\n";
pub const GAME_STARTING: &str = "\n*** GAME STARTING! ***\n\n";
pub const LEFT_OUT: &str =
    "The game started without you (the lobby was already full). Please try again later.\n";
pub const NOT_YOUR_TURN: &str = "Please wait, it is not your turn yet.\n";
pub const REROLL_WHICH: &str = "Which dice? (e.g., 1 3 5): ";
pub const INVALID_CHOICE: &str = "Invalid choice! Try again.\n";
pub const TURN_COMPLETE: &str = "Turn complete. Waiting for other players...\n";
pub const TIME_UP: &str = "\nTime's up! Your turn has ended.\n";
pub const DISCONNECTING: &str = "Disconnecting...\n";
pub const NOW_HOST: &str = "\nThe host left, you are now the host.\n";

pub fn welcome(name: &str, player: usize) -> String {
    format!("Welcome {}! You are Player {}\n", name, player + 1)
}

pub fn host_prompt() -> String {
    format!(
        "\n[HOST SETUP] Enter number of players for this game ({}-{}): ",
        MIN_PLAYERS, MAX_PLAYERS
    )
}

pub fn lobby_set(target: usize, connected: usize) -> String {
    format!(
        "Lobby set to {} players. Currently connected: {}/{}\nWaiting for remaining players to join...\n",
        target, connected, target
    )
}

pub fn host_selected(target: usize, connected: usize) -> String {
    format!(
        "Host selected {} players. Currently connected: {}/{}\n",
        target, connected, target
    )
}

pub fn rejected(reason: &dyn std::fmt::Display) -> String {
    format!("Server: {}\n", reason)
}

pub fn turn_banner(round: usize, name: &str) -> String {
    format!(
        "\n========================================\n[ROUND {} - YOUR TURN, {}]\n========================================\n",
        round, name
    )
}

pub fn time_limit(left: Duration) -> String {
    format!("You have {} seconds to finish this turn.\n", left.as_secs())
}

pub fn dice_line(label: &str, dice: &Dice) -> String {
    format!("{}: {}\n", label, dice)
}

pub fn reroll_prompt(rerolls_left: u32) -> String {
    debug_assert!(rerolls_left <= MAX_REROLLS);
    format!("\nRerolls left: {}. Reroll? (Y/N): ", rerolls_left)
}

pub fn first_yahtzee() -> &'static str {
    "\n\nCongratulations! You scored a Yahtzee!\n"
}

pub fn another_yahtzee() -> &'static str {
    "\n\nCongratulations! You scored another Yahtzee!\n"
}

pub fn yahtzee_bonus_awarded() -> &'static str {
    "Yahtzee bonus awarded! (+100)\n"
}

pub fn auto_filled(category: Category, points: u32) -> String {
    format!(
        "Since you scored another Yahtzee and UPPER SECTION #{} is available,\nit has been automatically filled with {} points.\n",
        category.number(),
        points
    )
}

pub fn lower_only(required: Category) -> String {
    format!(
        "Since UPPER SECTION #{} is NOT available, you may use this Yahtzee\nto score any LOWER SECTION category.\n",
        required.number()
    )
}

pub fn scoring_options(options: &[(Category, u32)]) -> String {
    let mut out = String::from("\n=== SCORING OPTIONS ===\n");
    for &(category, points) in options {
        let _ = writeln!(out, "{:2}. {:<20} | {} points", category.number(), category.name(), points);
    }
    out
}

pub fn category_prompt(lower_only: bool) -> &'static str {
    if lower_only {
        "\nChoose LOWER category (7-13): "
    } else {
        "\nChoose category (1-13): "
    }
}

pub fn scored(points: u32, category: Category) -> String {
    format!("Scored {} points in {}!\n", points, category.name())
}

fn section(out: &mut String, card: &ScoreCard, categories: impl Iterator<Item = Category>) {
    for category in categories {
        let score = card.get(category);
        let _ = writeln!(
            out,
            "{:2}. {:<14} | {} {}",
            category.number(),
            category.name(),
            score.awarded,
            if score.filled { "(Scored)" } else { "(Unscored)" }
        );
    }
}

/// Full scorecard plus bonus progress.
pub fn scorecard(card: &ScoreCard) -> String {
    let mut out = String::from("\nCurrent Score:\nUpper Section\n");
    section(&mut out, card, Category::upper());
    out.push_str("\nLower Section\n");
    section(&mut out, card, Category::lower());

    if card.upper_bonus().filled {
        let _ = writeln!(out, "\nUpper bonus achieved! (+{})", UPPER_BONUS_POINTS);
    } else {
        let _ = writeln!(
            out,
            "\nYou need {} more points in the UPPER SECTION to receive the {}-point bonus.",
            card.points_to_upper_bonus(),
            UPPER_BONUS_POINTS
        );
    }
    if card.yahtzee_bonus().filled {
        let _ = writeln!(out, "Yahtzee bonus total: {}", card.yahtzee_bonus().awarded);
    }
    out
}

/// End-of-session report for one player.
pub fn final_report(me: &PlayerSnapshot, summary: &SessionSummary) -> String {
    let mut out = String::from("\n=== GAME OVER ===\n");
    out.push_str(&scorecard(&me.card));
    let _ = writeln!(out, "Your final score: {}", me.total);

    out.push_str("\nFinal standings:\n");
    for standing in &summary.standings {
        let _ = writeln!(
            out,
            "  Player {} ({}): {} points{}",
            standing.id + 1,
            standing.name,
            standing.total,
            if standing.connected { "" } else { " [disconnected]" }
        );
    }

    let winner = summary
        .winner
        .and_then(|w| summary.standings.iter().find(|s| s.id == w));
    if let Some(winner) = winner {
        let _ = writeln!(
            out,
            "\n*** WINNER: Player {} ({}) with {} points! Total wins: {} ***",
            winner.id + 1,
            winner.name,
            winner.total,
            winner.wins
        );
    }
    out
}
