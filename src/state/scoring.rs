//! Resolution policy: one point for an exact match, nothing otherwise.

use crate::state::session::Selection;

/// Whether `selection` answers a question whose correct option is `correct_index`.
///
/// [`Selection::TimedOut`] and [`Selection::Unanswered`] are never correct, even
/// when the correct index is 0.
pub fn is_correct(correct_index: usize, selection: Selection) -> bool {
    matches!(selection, Selection::Chosen(index) if index == correct_index)
}

/// Score delta for resolving `selection`: 1 when correct, 0 otherwise.
pub fn score_delta(correct_index: usize, selection: Selection) -> u32 {
    u32::from(is_correct(correct_index, selection))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_scores_one() {
        assert_eq!(score_delta(2, Selection::Chosen(2)), 1);
    }

    #[test]
    fn wrong_choice_scores_zero() {
        assert_eq!(score_delta(2, Selection::Chosen(1)), 0);
    }

    #[test]
    fn timeout_never_matches_index_zero() {
        assert_eq!(score_delta(0, Selection::TimedOut), 0);
        assert!(!is_correct(0, Selection::TimedOut));
    }

    #[test]
    fn timeout_and_wrong_answer_score_the_same() {
        for correct in 0..4 {
            let wrong = (correct + 1) % 4;
            assert_eq!(
                score_delta(correct, Selection::TimedOut),
                score_delta(correct, Selection::Chosen(wrong))
            );
        }
    }

    #[test]
    fn unanswered_is_not_correct() {
        assert!(!is_correct(0, Selection::Unanswered));
    }
}
