//! Pure scoring rules for a five-dice hand.
//!
//! Nothing here touches a scorecard's `filled` or `awarded` values; the
//! result is a set of potentials the caller may load into a card.

use crate::{
    Category, Dice, CATEGORY_COUNT, FULL_HOUSE_POINTS, LARGE_STRAIGHT_POINTS,
    SMALL_STRAIGHT_POINTS, YAHTZEE_POINTS,
};
use serde::{Deserialize, Serialize};

/// Points every category would award for one hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandScore {
    potentials: [u32; CATEGORY_COUNT],
    required_upper: Option<Category>,
}

impl HandScore {
    pub fn potential(&self, category: Category) -> u32 {
        self.potentials[category.index()]
    }

    pub fn potentials(&self) -> &[u32; CATEGORY_COUNT] {
        &self.potentials
    }

    /// Upper category matching the face of a Yahtzee, used by the forced-fill rule.
    pub fn required_upper(&self) -> Option<Category> {
        self.required_upper
    }

    pub fn is_yahtzee(&self) -> bool {
        self.potential(Category::Yahtzee) == YAHTZEE_POINTS
    }
}

pub fn has_n_of_a_kind(dice: &Dice, n: u8) -> bool {
    dice.face_counts().iter().any(|&count| count >= n)
}

pub fn is_full_house(dice: &Dice) -> bool {
    let counts = dice.face_counts();
    counts.contains(&3) && counts.contains(&2)
}

pub fn has_small_straight(dice: &Dice) -> bool {
    let counts = dice.face_counts();
    [1usize, 2, 3]
        .iter()
        .any(|&start| (start..start + 4).all(|face| counts[face] > 0))
}

pub fn has_large_straight(dice: &Dice) -> bool {
    let counts = dice.face_counts();
    [1usize, 2]
        .iter()
        .any(|&start| (start..start + 5).all(|face| counts[face] > 0))
}

/// Scores a hand against all 13 categories.
///
/// `yahtzee_scored` is true when the player has already put 50 points in
/// the Yahtzee box; together with a Yahtzee hand it enables the joker rule,
/// which forces the full house and straight potentials to their fixed values.
pub fn score_hand(dice: &Dice, yahtzee_scored: bool) -> HandScore {
    let sorted = dice.sorted();
    let sum = dice.sum();
    let mut potentials = [0u32; CATEGORY_COUNT];

    for &face in &sorted {
        potentials[face as usize - 1] += face as u32;
    }

    if has_n_of_a_kind(dice, 3) {
        potentials[Category::ThreeOfAKind.index()] = sum;
    }
    if has_n_of_a_kind(dice, 4) {
        potentials[Category::FourOfAKind.index()] = sum;
    }
    if is_full_house(dice) {
        potentials[Category::FullHouse.index()] = FULL_HOUSE_POINTS;
    }
    if has_small_straight(dice) {
        potentials[Category::SmallStraight.index()] = SMALL_STRAIGHT_POINTS;
    }
    if has_large_straight(dice) {
        potentials[Category::LargeStraight.index()] = LARGE_STRAIGHT_POINTS;
    }

    let mut required_upper = None;
    if has_n_of_a_kind(dice, 5) {
        potentials[Category::Yahtzee.index()] = YAHTZEE_POINTS;
        required_upper = Category::upper_for_face(sorted[0]);
    }

    potentials[Category::Chance.index()] = sum;

    if yahtzee_scored && required_upper.is_some() {
        potentials[Category::FullHouse.index()] = FULL_HOUSE_POINTS;
        potentials[Category::SmallStraight.index()] = SMALL_STRAIGHT_POINTS;
        potentials[Category::LargeStraight.index()] = LARGE_STRAIGHT_POINTS;
    }

    HandScore {
        potentials,
        required_upper,
    }
}
