//! Points and badge rules.
//!
//! All thresholds are evaluated here against a single [`ActivityCounts`]
//! snapshot so every caller sees the same numbers.

use std::collections::HashSet;

use uuid::Uuid;

use studycircle_types::api::BadgeProgress;
use studycircle_types::models::{ActivityCounts, Badge};

/// Points granted per counted action.
pub const POINTS_QUESTION_ASKED: i64 = 5;
pub const POINTS_ANSWER_GIVEN: i64 = 10;
pub const POINTS_ANSWER_ACCEPTED: i64 = 25;
pub const POINTS_RESOURCE_SHARED: i64 = 15;

/// Actions that change one of the counted behaviors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    QuestionAsked,
    AnswerGiven,
    AnswerAccepted,
    ResourceShared,
}

impl Activity {
    pub fn points(&self) -> i64 {
        match self {
            Activity::QuestionAsked => POINTS_QUESTION_ASKED,
            Activity::AnswerGiven => POINTS_ANSWER_GIVEN,
            Activity::AnswerAccepted => POINTS_ANSWER_ACCEPTED,
            Activity::ResourceShared => POINTS_RESOURCE_SHARED,
        }
    }
}

/// Catalog order used for awarding: ascending threshold, ties by name.
pub fn award_order(catalog: &[Badge]) -> Vec<&Badge> {
    let mut ordered: Vec<&Badge> = catalog.iter().collect();
    ordered.sort_by(|a, b| {
        a.requirement_value
            .cmp(&b.requirement_value)
            .then_with(|| a.name.cmp(&b.name))
    });
    ordered
}

/// Badges not yet in `earned` whose threshold is met by `counts`, in award order.
pub fn badges_to_award<'a>(
    catalog: &'a [Badge],
    earned: &HashSet<Uuid>,
    counts: &ActivityCounts,
) -> Vec<&'a Badge> {
    award_order(catalog)
        .into_iter()
        .filter(|badge| !earned.contains(&badge.id))
        .filter(|badge| counts.metric(badge.requirement_type) >= badge.requirement_value)
        .collect()
}

/// Fraction of `threshold` reached, clamped to [0, 1].
pub fn progress(current: i64, threshold: i64) -> f64 {
    if threshold <= 0 {
        return 1.0;
    }
    (current.max(0) as f64 / threshold as f64).min(1.0)
}

pub fn badge_progress(
    catalog: &[Badge],
    earned: &HashSet<Uuid>,
    counts: &ActivityCounts,
) -> Vec<BadgeProgress> {
    award_order(catalog)
        .into_iter()
        .map(|badge| {
            let current = counts.metric(badge.requirement_type);
            let earned = earned.contains(&badge.id);
            BadgeProgress {
                badge: badge.clone(),
                current,
                progress: if earned { 1.0 } else { progress(current, badge.requirement_value) },
                earned,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use studycircle_types::models::BadgeRequirement;

    fn badge(n: u128, name: &str, requirement_type: BadgeRequirement, value: i64) -> Badge {
        Badge {
            id: Uuid::from_u128(n),
            name: name.to_string(),
            description: String::new(),
            icon: String::new(),
            requirement_type,
            requirement_value: value,
        }
    }

    fn catalog() -> Vec<Badge> {
        vec![
            badge(1, "Study Master", BadgeRequirement::Points, 500),
            badge(2, "First Question", BadgeRequirement::QuestionsAsked, 1),
            badge(3, "Rising Star", BadgeRequirement::Points, 100),
            badge(4, "Problem Solver", BadgeRequirement::AnswersAccepted, 1),
            badge(5, "Curious Mind", BadgeRequirement::QuestionsAsked, 10),
        ]
    }

    #[test]
    fn test_first_question_awarded_at_one() {
        let catalog = catalog();
        let earned = HashSet::new();

        let none = badges_to_award(&catalog, &earned, &ActivityCounts::default());
        assert!(none.is_empty());

        let counts = ActivityCounts { questions_asked: 1, ..Default::default() };
        let awarded = badges_to_award(&catalog, &earned, &counts);
        assert_eq!(awarded.len(), 1);
        assert_eq!(awarded[0].name, "First Question");
    }

    #[test]
    fn test_point_badges_are_independent() {
        let catalog = catalog();
        let counts = ActivityCounts { points: 500, ..Default::default() };
        let names: Vec<&str> = badges_to_award(&catalog, &HashSet::new(), &counts)
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(names, vec!["Rising Star", "Study Master"]);
    }

    #[test]
    fn test_earned_badges_are_skipped() {
        let catalog = catalog();
        let earned: HashSet<Uuid> = [Uuid::from_u128(3)].into_iter().collect();
        let counts = ActivityCounts { points: 150, ..Default::default() };
        assert!(badges_to_award(&catalog, &earned, &counts).is_empty());
    }

    #[test]
    fn test_award_order_breaks_ties_by_name() {
        let catalog = catalog();
        let counts = ActivityCounts {
            questions_asked: 1,
            answers_accepted: 1,
            ..Default::default()
        };
        let names: Vec<&str> = badges_to_award(&catalog, &HashSet::new(), &counts)
            .iter()
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(names, vec!["First Question", "Problem Solver"]);
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(progress(0, 10), 0.0);
        assert_eq!(progress(5, 10), 0.5);
        assert_eq!(progress(25, 10), 1.0);
        assert_eq!(progress(-3, 10), 0.0);
    }

    #[test]
    fn test_badge_progress_marks_earned() {
        let catalog = catalog();
        let earned: HashSet<Uuid> = [Uuid::from_u128(2)].into_iter().collect();
        let counts = ActivityCounts { questions_asked: 4, points: 50, ..Default::default() };
        let rows = badge_progress(&catalog, &earned, &counts);

        let first = rows.iter().find(|p| p.badge.name == "First Question").unwrap();
        assert!(first.earned);
        assert_eq!(first.progress, 1.0);

        let curious = rows.iter().find(|p| p.badge.name == "Curious Mind").unwrap();
        assert!(!curious.earned);
        assert_eq!(curious.current, 4);
        assert!((curious.progress - 0.4).abs() < f64::EPSILON);

        let rising = rows.iter().find(|p| p.badge.name == "Rising Star").unwrap();
        assert_eq!(rising.progress, 0.5);
    }
}
