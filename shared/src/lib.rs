use serde::{Deserialize, Serialize};
use std::fmt;

pub mod scorecard;
pub mod scoring;

pub use scorecard::{ScoreBox, ScoreCard};
pub use scoring::{score_hand, HandScore};

pub const MAX_PLAYERS: usize = 5;
pub const MIN_PLAYERS: usize = 3;
pub const DICE_COUNT: usize = 5;
pub const CATEGORY_COUNT: usize = 13;
pub const UPPER_COUNT: usize = 6;
pub const MAX_REROLLS: u32 = 2;

pub const UPPER_BONUS_THRESHOLD: u32 = 63;
pub const UPPER_BONUS_POINTS: u32 = 35;
pub const FULL_HOUSE_POINTS: u32 = 25;
pub const SMALL_STRAIGHT_POINTS: u32 = 30;
pub const LARGE_STRAIGHT_POINTS: u32 = 40;
pub const YAHTZEE_POINTS: u32 = 50;
pub const YAHTZEE_BONUS_POINTS: u32 = 100;

/// One of the 13 scoreable boxes, in scorecard order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Aces,
    Twos,
    Threes,
    Fours,
    Fives,
    Sixes,
    ThreeOfAKind,
    FourOfAKind,
    FullHouse,
    SmallStraight,
    LargeStraight,
    Yahtzee,
    Chance,
}

impl Category {
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::Aces,
        Category::Twos,
        Category::Threes,
        Category::Fours,
        Category::Fives,
        Category::Sixes,
        Category::ThreeOfAKind,
        Category::FourOfAKind,
        Category::FullHouse,
        Category::SmallStraight,
        Category::LargeStraight,
        Category::Yahtzee,
        Category::Chance,
    ];

    /// Zero-based position on the scorecard.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// One-based number as shown to players (1..=13).
    pub fn number(self) -> usize {
        self.index() + 1
    }

    pub fn from_number(number: usize) -> Option<Self> {
        number.checked_sub(1).and_then(Self::from_index)
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Aces => "Aces",
            Category::Twos => "Twos",
            Category::Threes => "Threes",
            Category::Fours => "Fours",
            Category::Fives => "Fives",
            Category::Sixes => "Sixes",
            Category::ThreeOfAKind => "Three of a Kind",
            Category::FourOfAKind => "Four of a Kind",
            Category::FullHouse => "Full House",
            Category::SmallStraight => "Small Straight",
            Category::LargeStraight => "Large Straight",
            Category::Yahtzee => "Yahtzee",
            Category::Chance => "Chance",
        }
    }

    pub fn is_upper(self) -> bool {
        self.index() < UPPER_COUNT
    }

    pub fn is_lower(self) -> bool {
        !self.is_upper()
    }

    /// Upper-section category that counts the given face.
    pub fn upper_for_face(face: u8) -> Option<Self> {
        match face {
            1..=6 => Self::from_index(face as usize - 1),
            _ => None,
        }
    }

    /// Face value counted by an upper-section category.
    pub fn face(self) -> Option<u8> {
        if self.is_upper() {
            Some(self.index() as u8 + 1)
        } else {
            None
        }
    }

    pub fn upper() -> impl Iterator<Item = Category> {
        Self::ALL.into_iter().filter(|c| c.is_upper())
    }

    pub fn lower() -> impl Iterator<Item = Category> {
        Self::ALL.into_iter().filter(|c| c.is_lower())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A hand of five dice, each in 1..=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dice([u8; DICE_COUNT]);

impl Dice {
    pub fn new(values: [u8; DICE_COUNT]) -> Option<Self> {
        if values.iter().all(|v| (1..=6).contains(v)) {
            Some(Self(values))
        } else {
            None
        }
    }

    pub fn values(&self) -> [u8; DICE_COUNT] {
        self.0
    }

    pub fn sorted(&self) -> [u8; DICE_COUNT] {
        let mut values = self.0;
        values.sort_unstable();
        values
    }

    pub fn sum(&self) -> u32 {
        self.0.iter().map(|&v| v as u32).sum()
    }

    /// Occurrences of each face, indexed by face value (index 0 unused).
    pub fn face_counts(&self) -> [u8; 7] {
        let mut counts = [0u8; 7];
        for &v in &self.0 {
            counts[v as usize] += 1;
        }
        counts
    }

    /// Replaces the die at a zero-based position. Returns false when either
    /// the position or the value is out of range.
    pub fn set(&mut self, position: usize, value: u8) -> bool {
        if !(1..=6).contains(&value) {
            return false;
        }
        match self.0.get_mut(position) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn is_yahtzee(&self) -> bool {
        self.0.iter().all(|&v| v == self.0[0])
    }
}

impl Default for Dice {
    fn default() -> Self {
        Self([1; DICE_COUNT])
    }
}

impl fmt::Display for Dice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|v| format!("[{}]", v)).collect();
        f.write_str(&rendered.join(" "))
    }
}
