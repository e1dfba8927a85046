use crate::scoring::HandScore;
use crate::{
    Category, CATEGORY_COUNT, UPPER_BONUS_POINTS, UPPER_BONUS_THRESHOLD, YAHTZEE_BONUS_POINTS,
    YAHTZEE_POINTS,
};
use serde::{Deserialize, Serialize};

/// A single box on the scorecard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBox {
    pub awarded: u32,
    pub filled: bool,
    pub potential: u32,
}

/// Thirteen category boxes plus the upper and Yahtzee bonus boxes.
///
/// A filled category box is never written again. The bonus boxes only ever
/// go from unfilled to filled; the Yahtzee bonus keeps accumulating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCard {
    boxes: [ScoreBox; CATEGORY_COUNT],
    upper_bonus: ScoreBox,
    yahtzee_bonus: ScoreBox,
}

impl ScoreCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, category: Category) -> &ScoreBox {
        &self.boxes[category.index()]
    }

    pub fn is_filled(&self, category: Category) -> bool {
        self.get(category).filled
    }

    pub fn upper_bonus(&self) -> &ScoreBox {
        &self.upper_bonus
    }

    pub fn yahtzee_bonus(&self) -> &ScoreBox {
        &self.yahtzee_bonus
    }

    pub fn load_potentials(&mut self, hand: &HandScore) {
        for category in Category::ALL {
            self.boxes[category.index()].potential = hand.potential(category);
        }
    }

    pub fn clear_potentials(&mut self) {
        for b in self.boxes.iter_mut() {
            b.potential = 0;
        }
    }

    /// Moves the current potential into an open box.
    ///
    /// Returns the points awarded, or `None` if the box was already filled.
    pub fn apply(&mut self, category: Category) -> Option<u32> {
        let b = &mut self.boxes[category.index()];
        if b.filled {
            return None;
        }
        b.awarded = b.potential;
        b.filled = true;
        Some(b.awarded)
    }

    /// Fills an open box with zero points.
    pub fn forfeit(&mut self, category: Category) -> bool {
        let b = &mut self.boxes[category.index()];
        if b.filled {
            return false;
        }
        b.awarded = 0;
        b.filled = true;
        true
    }

    /// Forfeits every open box, returning the categories that were zeroed.
    pub fn forfeit_all(&mut self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|&c| self.forfeit(c))
            .collect()
    }

    pub fn first_open(&self) -> Option<Category> {
        self.open_categories().next()
    }

    pub fn open_categories(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL.into_iter().filter(|&c| !self.is_filled(c))
    }

    pub fn upper_total(&self) -> u32 {
        Category::upper().map(|c| self.get(c).awarded).sum()
    }

    pub fn is_upper_complete(&self) -> bool {
        Category::upper().all(|c| self.is_filled(c))
    }

    pub fn is_lower_complete(&self) -> bool {
        Category::lower().all(|c| self.is_filled(c))
    }

    pub fn is_complete(&self) -> bool {
        self.boxes.iter().all(|b| b.filled)
    }

    /// True once the Yahtzee box holds 50 points.
    pub fn yahtzee_scored(&self) -> bool {
        let b = self.get(Category::Yahtzee);
        b.filled && b.awarded == YAHTZEE_POINTS
    }

    /// Awards the 35-point upper bonus if it is earned and not yet given.
    pub fn award_upper_bonus_if_earned(&mut self) -> bool {
        if self.upper_bonus.filled || self.upper_total() < UPPER_BONUS_THRESHOLD {
            return false;
        }
        self.upper_bonus.awarded = UPPER_BONUS_POINTS;
        self.upper_bonus.filled = true;
        true
    }

    pub fn add_yahtzee_bonus(&mut self) -> u32 {
        self.yahtzee_bonus.awarded += YAHTZEE_BONUS_POINTS;
        self.yahtzee_bonus.filled = true;
        self.yahtzee_bonus.awarded
    }

    pub fn category_total(&self) -> u32 {
        self.boxes.iter().map(|b| b.awarded).sum()
    }

    /// Category points plus both bonuses.
    pub fn total(&self) -> u32 {
        self.category_total() + self.upper_bonus.awarded + self.yahtzee_bonus.awarded
    }

    pub fn points_to_upper_bonus(&self) -> u32 {
        UPPER_BONUS_THRESHOLD.saturating_sub(self.upper_total())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{score_hand, Dice};

    fn card_with(dice: [u8; 5]) -> ScoreCard {
        let mut card = ScoreCard::new();
        card.load_potentials(&score_hand(&Dice::new(dice).unwrap(), card.yahtzee_scored()));
        card
    }

    #[test]
    fn test_apply_moves_potential() {
        let mut card = card_with([2, 3, 4, 5, 6]);
        assert_eq!(card.apply(Category::LargeStraight), Some(40));
        assert!(card.is_filled(Category::LargeStraight));
        assert_eq!(card.get(Category::LargeStraight).awarded, 40);
    }

    #[test]
    fn test_filled_box_is_immutable() {
        let mut card = card_with([2, 3, 4, 5, 6]);
        card.apply(Category::Chance);

        card.load_potentials(&score_hand(&Dice::new([6, 6, 6, 6, 5]).unwrap(), false));
        assert_eq!(card.apply(Category::Chance), None);
        assert!(!card.forfeit(Category::Chance));
        assert_eq!(card.get(Category::Chance).awarded, 20);
    }

    #[test]
    fn test_forfeit_and_first_open() {
        let mut card = ScoreCard::new();
        assert_eq!(card.first_open(), Some(Category::Aces));
        assert!(card.forfeit(Category::Aces));
        assert_eq!(card.first_open(), Some(Category::Twos));

        let zeroed = card.forfeit_all();
        assert_eq!(zeroed.len(), 12);
        assert!(card.is_complete());
        assert_eq!(card.first_open(), None);
        assert_eq!(card.total(), 0);
    }

    #[test]
    fn test_upper_bonus_awarded_once_at_threshold() {
        let mut card = ScoreCard::new();
        for (category, face) in [
            (Category::Fours, 4u8),
            (Category::Fives, 5),
            (Category::Sixes, 6),
        ] {
            card.load_potentials(&score_hand(
                &Dice::new([face, face, face, face, 1]).unwrap(),
                false,
            ));
            card.apply(category);
        }
        // 16 + 20 + 24 = 60
        assert!(!card.award_upper_bonus_if_earned());
        assert_eq!(card.points_to_upper_bonus(), 3);

        card.load_potentials(&score_hand(&Dice::new([3, 2, 2, 2, 2]).unwrap(), false));
        card.apply(Category::Threes);
        assert!(card.award_upper_bonus_if_earned());
        assert!(!card.award_upper_bonus_if_earned());
        assert_eq!(card.upper_bonus().awarded, 35);
        assert_eq!(card.points_to_upper_bonus(), 0);
        assert_eq!(card.total(), 63 + 35);
    }

    #[test]
    fn test_yahtzee_bonus_stacks() {
        let mut card = ScoreCard::new();
        assert!(!card.yahtzee_bonus().filled);
        assert_eq!(card.add_yahtzee_bonus(), 100);
        assert_eq!(card.add_yahtzee_bonus(), 200);
        assert!(card.yahtzee_bonus().filled);
        assert_eq!(card.total(), 200);
    }

    #[test]
    fn test_yahtzee_scored_requires_fifty() {
        let mut card = card_with([3, 3, 3, 3, 3]);
        assert!(!card.yahtzee_scored());
        card.apply(Category::Yahtzee);
        assert!(card.yahtzee_scored());

        let mut scratched = card_with([1, 2, 3, 3, 3]);
        scratched.apply(Category::Yahtzee);
        assert!(scratched.is_filled(Category::Yahtzee));
        assert!(!scratched.yahtzee_scored());
    }

    #[test]
    fn test_section_completion() {
        let mut card = ScoreCard::new();
        for c in Category::upper() {
            card.forfeit(c);
        }
        assert!(card.is_upper_complete());
        assert!(!card.is_lower_complete());
        for c in Category::lower() {
            card.forfeit(c);
        }
        assert!(card.is_lower_complete());
        assert!(card.is_complete());
    }

    #[test]
    fn test_clear_potentials() {
        let mut card = card_with([6, 6, 6, 6, 6]);
        assert_eq!(card.get(Category::Sixes).potential, 30);
        card.clear_potentials();
        assert!(Category::ALL.iter().all(|&c| card.get(c).potential == 0));
    }
}
