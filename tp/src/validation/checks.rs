//! Deterministic itinerary checkers
//!
//! Each checker reads the plan and returns zero or more issues. None of them
//! fail; missing data is itself reported as an issue.

use std::collections::BTreeMap;

use chrono::{NaiveTime, Timelike};
use tracing::debug;

use super::geo::{haversine_km, travel_minutes};
use super::issue::{IssueCategory, ValidationIssue};
use crate::state::{ActivityPlan, ActivityType, PlanState};

/// Minimum activities for a full day
pub const MIN_ACTIVITIES_PER_DAY: usize = 3;
/// Below this share of the budget the plan is flagged as under-using it
pub const LOW_UTILIZATION: f64 = 0.5;
/// Earliest reasonable start, minutes after midnight
pub const EARLIEST_START_MIN: u32 = 6 * 60;
/// Latest reasonable start, minutes after midnight
pub const LATEST_START_MIN: u32 = 23 * 60;
pub const MIN_DURATION_MIN: u32 = 30;
pub const MAX_DURATION_MIN: u32 = 480;
/// Legs shorter than this are never flagged
pub const MAX_UNCHECKED_LEG_KM: f64 = 20.0;
/// Largest share a single activity type may take
pub const MAX_TYPE_SHARE: f64 = 0.6;

/// Parse `HH:MM` (or `HH:MM:SS`) into minutes after midnight
pub fn parse_start_minutes(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
        .map(|t| t.hour() * 60 + t.minute())
}

fn format_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Itinerary present, day count matches, days are full enough
pub fn check_structure(state: &PlanState) -> Vec<ValidationIssue> {
    debug!(days = state.itinerary.len(), expected = state.duration_days, "check_structure: called");
    if state.itinerary.is_empty() {
        debug!("check_structure: empty itinerary branch");
        return vec![ValidationIssue::critical(
            IssueCategory::Structure,
            "Itinerary is empty",
            "Generate a complete itinerary with all days",
        )];
    }

    let mut issues = Vec::new();
    if state.itinerary.len() != state.duration_days as usize {
        issues.push(ValidationIssue::critical(
            IssueCategory::Structure,
            format!("Expected {} days, got {} days", state.duration_days, state.itinerary.len()),
            format!("Adjust itinerary to exactly {} days", state.duration_days),
        ));
    }

    for day in &state.itinerary {
        match day.activities.len() {
            0 => issues.push(
                ValidationIssue::critical(
                    IssueCategory::Structure,
                    format!("Day {} has no activities", day.day_number),
                    "Add at least 3-4 activities for this day",
                )
                .on_day(day.day_number),
            ),
            n if n < MIN_ACTIVITIES_PER_DAY => issues.push(
                ValidationIssue::warning(
                    IssueCategory::Structure,
                    format!("Day {} has only {} activities (recommended: 4+)", day.day_number, n),
                    "Add more activities to make the day fuller",
                )
                .on_day(day.day_number),
            ),
            _ => {}
        }
    }
    issues
}

/// Total within budget, and the budget not grossly under-used
pub fn check_budget(state: &PlanState) -> Vec<ValidationIssue> {
    debug!("check_budget: called");
    let Some(check) = &state.budget_check else {
        debug!("check_budget: no budget check branch");
        return vec![ValidationIssue::warning(
            IssueCategory::Budget,
            "Budget not validated",
            "Run budget validation before finalizing",
        )];
    };

    let mut issues = Vec::new();
    if !check.within_budget {
        issues.push(
            ValidationIssue::critical(
                IssueCategory::Budget,
                format!("Budget exceeded by ${:.2}", check.total_cost - check.budget),
                "Replace expensive activities with budget-friendly alternatives",
            )
            .with_details(check.recommendations.clone()),
        );
    }

    if let Some(utilization) = check.utilization() {
        let rounded = (utilization * 100.0).round() / 100.0;
        if rounded < LOW_UTILIZATION {
            debug!(utilization, "check_budget: low utilization branch");
            issues.push(ValidationIssue::suggestion(
                IssueCategory::Budget,
                format!("Budget utilization is low ({:.0}%)", rounded * 100.0),
                "Consider adding more premium experiences or extending activities",
            ));
        }
    }
    issues
}

/// Activities of a day in order without overlap, at sensible hours and lengths
pub fn check_timing(state: &PlanState) -> Vec<ValidationIssue> {
    debug!("check_timing: called");
    let mut issues = Vec::new();

    for day in &state.itinerary {
        let n = day.day_number;
        let mut previous_end = 0u32;

        for activity in &day.activities {
            let Some(start) = activity.start_time.as_deref().and_then(parse_start_minutes) else {
                let message = match &activity.start_time {
                    Some(raw) => format!("Day {}, Activity '{}': Invalid start time '{}'", n, activity.name, raw),
                    None => format!("Day {}, Activity '{}': Missing start time", n, activity.name),
                };
                issues.push(
                    ValidationIssue::warning(IssueCategory::Timing, message, "Add a specific start time").on_day(n),
                );
                continue;
            };

            if start < previous_end {
                issues.push(
                    ValidationIssue::critical(
                        IssueCategory::Timing,
                        format!("Day {}: Activity '{}' overlaps with previous activity", n, activity.name),
                        "Adjust start time to avoid overlap",
                    )
                    .on_day(n),
                );
            }

            if !(EARLIEST_START_MIN..=LATEST_START_MIN).contains(&start) {
                issues.push(
                    ValidationIssue::warning(
                        IssueCategory::Timing,
                        format!(
                            "Day {}: Activity '{}' has unusual time {}",
                            n,
                            activity.name,
                            format_minutes(start)
                        ),
                        "Consider scheduling between 6:00 and 23:00",
                    )
                    .on_day(n),
                );
            }

            if let Some(duration) = activity.duration_minutes {
                if duration < MIN_DURATION_MIN {
                    issues.push(
                        ValidationIssue::suggestion(
                            IssueCategory::Timing,
                            format!(
                                "Day {}: Activity '{}' duration is very short ({} min)",
                                n, activity.name, duration
                            ),
                            "Consider extending the duration",
                        )
                        .on_day(n),
                    );
                } else if duration > MAX_DURATION_MIN {
                    issues.push(
                        ValidationIssue::warning(
                            IssueCategory::Timing,
                            format!(
                                "Day {}: Activity '{}' duration is very long ({} min)",
                                n, activity.name, duration
                            ),
                            "Consider breaking into multiple activities",
                        )
                        .on_day(n),
                    );
                }
                previous_end = start + duration;
            }
        }
    }
    issues
}

/// Minutes between the end of `current` and the start of `next`, 0 when unknown
fn gap_minutes(current: &ActivityPlan, next: &ActivityPlan) -> i64 {
    let current_start = current.start_time.as_deref().and_then(parse_start_minutes);
    let next_start = next.start_time.as_deref().and_then(parse_start_minutes);
    match (current_start, current.duration_minutes, next_start) {
        (Some(start), Some(duration), Some(next_start)) => next_start as i64 - (start as i64 + duration as i64),
        _ => 0,
    }
}

/// Enough time to travel between consecutive geocoded activities
pub fn check_geography(state: &PlanState) -> Vec<ValidationIssue> {
    debug!(geo_entries = state.geo_data.len(), "check_geography: called");
    if state.geo_data.is_empty() {
        debug!("check_geography: no geo data branch");
        return vec![ValidationIssue::warning(
            IssueCategory::Geography,
            "Locations not geocoded",
            "Geocode locations for better validation",
        )];
    }

    let mut issues = Vec::new();
    for day in &state.itinerary {
        for pair in day.activities.windows(2) {
            let (current, next) = (&pair[0], &pair[1]);
            let (Some(from), Some(to)) = (state.point_for(current.geo_key()), state.point_for(next.geo_key())) else {
                continue;
            };

            let distance = haversine_km(from, to);
            let gap = gap_minutes(current, next);
            let required = travel_minutes(distance);
            if distance > MAX_UNCHECKED_LEG_KM && gap < required {
                debug!(distance, gap, required, "check_geography: infeasible leg branch");
                issues.push(
                    ValidationIssue::critical(
                        IssueCategory::Geography,
                        format!(
                            "Day {}: Not enough time to travel {:.1} km from '{}' to '{}' (need {} min, have {} min)",
                            day.day_number, distance, current.name, next.name, required, gap
                        ),
                        "Add more time between activities or choose closer locations",
                    )
                    .on_day(day.day_number),
                );
            }
        }
    }
    issues
}

/// No activity type dominates, and stays and meals are planned
pub fn check_diversity(state: &PlanState) -> Vec<ValidationIssue> {
    debug!("check_diversity: called");
    let mut counts: BTreeMap<ActivityType, usize> = BTreeMap::new();
    for activity in state.itinerary.iter().flat_map(|d| d.activities.iter()) {
        *counts.entry(activity.activity_type).or_default() += 1;
    }
    let total: usize = counts.values().sum();

    let mut issues = Vec::new();
    if total > 0 {
        for (kind, count) in &counts {
            let share = *count as f64 / total as f64;
            if share > MAX_TYPE_SHARE {
                issues.push(ValidationIssue::warning(
                    IssueCategory::Diversity,
                    format!("Activity type '{}' is overrepresented ({:.0}%)", kind, share * 100.0),
                    "Add more variety to the itinerary",
                ));
            }
        }
    }

    if !counts.contains_key(&ActivityType::Accommodation) {
        issues.push(ValidationIssue::suggestion(
            IssueCategory::Diversity,
            "No accommodation activities found",
            "Add accommodation information for each day",
        ));
    }
    if !counts.contains_key(&ActivityType::Dining) {
        issues.push(ValidationIssue::suggestion(
            IssueCategory::Diversity,
            "No dining activities found",
            "Add meal plans to the itinerary",
        ));
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{BudgetCheck, Coordinates, DayPlan};
    use crate::validation::IssueSeverity;

    fn activity(name: &str, kind: ActivityType) -> ActivityPlan {
        ActivityPlan::new(name, kind)
    }

    fn full_day(n: u32) -> DayPlan {
        DayPlan::new(n, "Day", vec![
            activity("Hotel", ActivityType::Accommodation).at("08:00", 30),
            activity("Museum", ActivityType::Activity).at("09:00", 120),
            activity("Lunch", ActivityType::Dining).at("12:00", 60),
        ])
    }

    fn state_with(days: Vec<DayPlan>, duration: u32) -> PlanState {
        PlanState {
            duration_days: duration,
            itinerary: days,
            ..Default::default()
        }
    }

    #[test]
    fn test_structure_day_count_mismatch() {
        let state = state_with((1..=4).map(full_day).collect(), 5);
        let issues = check_structure(&state);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Critical);
        assert_eq!(issues[0].message, "Expected 5 days, got 4 days");
    }

    #[test]
    fn test_structure_empty_short_circuits() {
        let issues = check_structure(&state_with(vec![], 3));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "Itinerary is empty");
    }

    #[test]
    fn test_structure_sparse_days() {
        let state = state_with(
            vec![
                DayPlan::new(1, "Empty", vec![]),
                DayPlan::new(2, "Thin", vec![activity("Walk", ActivityType::Activity)]),
                full_day(3),
            ],
            3,
        );
        let issues = check_structure(&state);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, IssueSeverity::Critical);
        assert_eq!(issues[0].day_number, Some(1));
        assert_eq!(issues[1].severity, IssueSeverity::Warning);
        assert_eq!(issues[1].message, "Day 2 has only 1 activities (recommended: 4+)");
    }

    #[test]
    fn test_budget_over_and_missing() {
        let mut state = PlanState::default();
        let missing = check_budget(&state);
        assert_eq!(missing[0].message, "Budget not validated");
        assert_eq!(missing[0].severity, IssueSeverity::Warning);

        state.budget_check = Some(BudgetCheck::new(1200.0, 1000.0, vec!["cut".to_string()]));
        let over = check_budget(&state);
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].message, "Budget exceeded by $200.00");
        assert_eq!(over[0].details, vec!["cut"]);
    }

    #[test]
    fn test_budget_low_utilization() {
        let state = PlanState {
            budget_check: Some(BudgetCheck::new(300.0, 1000.0, vec![])),
            ..Default::default()
        };
        let issues = check_budget(&state);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Suggestion);
        assert_eq!(issues[0].message, "Budget utilization is low (30%)");

        let zero_budget = PlanState {
            budget_check: Some(BudgetCheck::new(0.0, 0.0, vec![])),
            ..Default::default()
        };
        assert!(check_budget(&zero_budget).is_empty());
    }

    #[test]
    fn test_timing_rules() {
        let day = DayPlan::new(1, "Busy", vec![
            activity("Sunrise", ActivityType::Activity).at("05:00", 20),
            activity("Tour", ActivityType::Activity).at("09:00", 600),
            activity("Lunch", ActivityType::Dining).at("12:00", 60),
            activity("Nap", ActivityType::Other),
            activity("Show", ActivityType::Activity).at("late", 60),
        ]);
        let issues = check_timing(&state_with(vec![day], 1));

        let by = |sev: IssueSeverity| issues.iter().filter(|i| i.severity == sev).count();
        // overlap of Lunch with the 10 hour tour
        assert_eq!(by(IssueSeverity::Critical), 1);
        // early start, long tour, missing and invalid start times
        assert_eq!(by(IssueSeverity::Warning), 4);
        // short sunrise
        assert_eq!(by(IssueSeverity::Suggestion), 1);
        assert!(issues.iter().any(|i| i.message == "Day 1: Activity 'Sunrise' has unusual time 05:00"));
    }

    #[test]
    fn test_timing_without_duration_keeps_previous_end() {
        let day = DayPlan::new(1, "Loose", vec![
            activity("A", ActivityType::Activity).at("09:00", 120),
            ActivityPlan {
                start_time: Some("10:00".to_string()),
                ..activity("B", ActivityType::Activity)
            },
            activity("C", ActivityType::Activity).at("10:30", 60),
        ]);
        let issues = check_timing(&state_with(vec![day], 1));
        // B and C both start before A ends at 11:00
        assert_eq!(issues.iter().filter(|i| i.is_critical()).count(), 2);
    }

    fn geo_state(next_start: &str) -> PlanState {
        let mut state = state_with(
            vec![DayPlan::new(1, "Far", vec![
                activity("A", ActivityType::Activity).at("09:00", 60).in_location("Origin"),
                activity("B", ActivityType::Activity).at(next_start, 60).in_location("East"),
            ])],
            1,
        );
        state.geo_data.insert("Origin".to_string(), Coordinates::found("Origin", 0.0, 0.0));
        state.geo_data.insert("East".to_string(), Coordinates::found("East", 0.0, 0.18));
        state
    }

    #[test]
    fn test_geography_short_gap_is_critical() {
        let issues = check_geography(&geo_state("10:10"));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].is_critical());
        assert!(issues[0].message.contains("need 60 min, have 10 min"));
    }

    #[test]
    fn test_geography_long_gap_is_fine() {
        assert!(check_geography(&geo_state("11:30")).is_empty());
    }

    #[test]
    fn test_geography_requires_geocodes() {
        let mut state = geo_state("10:10");
        state.geo_data.clear();
        let issues = check_geography(&state);
        assert_eq!(issues[0].message, "Locations not geocoded");

        let mut failed = geo_state("10:10");
        failed.geo_data.insert("East".to_string(), Coordinates::failed("East", "no match"));
        assert!(check_geography(&failed).is_empty());
    }

    #[test]
    fn test_diversity_dominant_dining() {
        let mut activities: Vec<ActivityPlan> = (0..7).map(|i| activity(&format!("Meal {}", i), ActivityType::Dining)).collect();
        activities.extend((0..3).map(|i| activity(&format!("Sight {}", i), ActivityType::Activity)));
        let issues = check_diversity(&state_with(vec![DayPlan::new(1, "Food", activities)], 1));

        let warnings: Vec<_> = issues.iter().filter(|i| i.severity == IssueSeverity::Warning).collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "Activity type 'dining' is overrepresented (70%)");

        let suggestions: Vec<_> = issues.iter().filter(|i| i.severity == IssueSeverity::Suggestion).collect();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].message, "No accommodation activities found");
    }

    #[test]
    fn test_parse_start_minutes() {
        assert_eq!(parse_start_minutes("09:30"), Some(570));
        assert_eq!(parse_start_minutes(" 23:00:00 "), Some(1380));
        assert_eq!(parse_start_minutes("25:00"), None);
        assert_eq!(parse_start_minutes("noon"), None);
    }
}
