//! Nearest-neighbour route ordering within a day

use std::collections::BTreeMap;

use tracing::debug;

use crate::state::{ActivityPlan, ActivityType, Coordinates, DayPlan};
use crate::validation::{TRAVEL_SPEED_KMH, haversine_km, parse_start_minutes};

/// Days with fewer geocoded activities are left alone
pub const MIN_GEOCODED_STOPS: usize = 3;
/// Slack added between consecutive activities
pub const BUFFER_MINUTES: u32 = 15;
const DEFAULT_START_MIN: u32 = 9 * 60;
const DEFAULT_DURATION_MIN: u32 = 60;

/// Result of optimizing one itinerary
#[derive(Debug, Clone, PartialEq)]
pub struct RouteReport {
    pub itinerary: Vec<DayPlan>,
    /// Day numbers that were reordered
    pub optimized_days: Vec<u32>,
}

fn format_minutes(minutes: u32) -> String {
    let minutes = minutes % (24 * 60);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn travel_minutes_ceil(distance_km: f64) -> u32 {
    (distance_km / TRAVEL_SPEED_KMH * 60.0).ceil() as u32
}

/// Visit order over `points` starting at `start`, greedy nearest next stop
fn nearest_neighbour(points: &[(f64, f64)], start: usize) -> Vec<usize> {
    let mut order = vec![start];
    let mut visited = vec![false; points.len()];
    visited[start] = true;

    while order.len() < points.len() {
        let current = points[order[order.len() - 1]];
        let next = (0..points.len())
            .filter(|i| !visited[*i])
            .min_by(|a, b| haversine_km(current, points[*a]).total_cmp(&haversine_km(current, points[*b])));
        match next {
            Some(i) => {
                visited[i] = true;
                order.push(i);
            }
            None => break,
        }
    }
    order
}

/// Reorder one day's activities; `None` when the day is left as is
pub fn optimize_day(day: &DayPlan, geo: &BTreeMap<String, Coordinates>) -> Option<DayPlan> {
    debug!(day = day.day_number, activities = day.activities.len(), "optimize_day: called");
    let located: Vec<(usize, (f64, f64))> = day
        .activities
        .iter()
        .enumerate()
        .filter_map(|(i, a)| geo.get(a.geo_key()).and_then(Coordinates::point).map(|p| (i, p)))
        .collect();
    if located.len() < MIN_GEOCODED_STOPS {
        debug!(located = located.len(), "optimize_day: too few geocoded stops branch");
        return None;
    }

    let depot = located
        .iter()
        .position(|(i, _)| day.activities[*i].activity_type == ActivityType::Accommodation)
        .unwrap_or(0);
    let points: Vec<(f64, f64)> = located.iter().map(|(_, p)| *p).collect();
    let order = nearest_neighbour(&points, depot);

    let mut activities: Vec<ActivityPlan> = order.iter().map(|o| day.activities[located[*o].0].clone()).collect();
    let mut legs: Vec<f64> = order.windows(2).map(|w| haversine_km(points[w[0]], points[w[1]])).collect();
    for (i, activity) in day.activities.iter().enumerate() {
        if !located.iter().any(|(li, _)| *li == i) {
            activities.push(activity.clone());
            legs.push(0.0);
        }
    }

    let mut current = activities[0]
        .start_time
        .as_deref()
        .and_then(parse_start_minutes)
        .unwrap_or(DEFAULT_START_MIN);
    activities[0].start_time = Some(format_minutes(current));
    for i in 1..activities.len() {
        let previous = activities[i - 1].duration_minutes.unwrap_or(DEFAULT_DURATION_MIN);
        current += previous + travel_minutes_ceil(legs[i - 1]) + BUFFER_MINUTES;
        activities[i].start_time = Some(format_minutes(current));
    }

    Some(DayPlan {
        activities,
        ..day.clone()
    })
}

/// Optimize every day that has enough geocoded activities
pub fn optimize_routes(itinerary: &[DayPlan], geo: &BTreeMap<String, Coordinates>) -> RouteReport {
    debug!(days = itinerary.len(), "optimize_routes: called");
    let mut optimized_days = Vec::new();
    let itinerary = itinerary
        .iter()
        .map(|day| match optimize_day(day, geo) {
            Some(optimized) => {
                optimized_days.push(day.day_number);
                optimized
            }
            None => day.clone(),
        })
        .collect();
    RouteReport {
        itinerary,
        optimized_days,
    }
}
