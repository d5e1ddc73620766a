//! Itinerary value types
//!
//! Day plans and activities arrive as JSON from reasoning calls, so their
//! deserializers are lenient: numbers may come as strings, dates may be
//! malformed, and unknown activity types collapse to `Other`.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use super::price::parse_price;

/// Activity category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    Accommodation,
    Dining,
    Activity,
    Transportation,
    #[default]
    Other,
}

impl ActivityType {
    /// All categories in declaration order
    pub const ALL: [ActivityType; 5] = [
        ActivityType::Accommodation,
        ActivityType::Dining,
        ActivityType::Activity,
        ActivityType::Transportation,
        ActivityType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accommodation => "accommodation",
            Self::Dining => "dining",
            Self::Activity => "activity",
            Self::Transportation => "transportation",
            Self::Other => "other",
        }
    }

    /// Map a free-text category onto an activity type
    pub fn parse(raw: &str) -> Self {
        debug!(%raw, "ActivityType::parse: called");
        match raw.trim().to_lowercase().as_str() {
            "accommodation" | "hotel" | "lodging" | "check-in" => Self::Accommodation,
            "dining" | "food" | "restaurant" | "meal" | "breakfast" | "lunch" | "dinner" | "cafe" => Self::Dining,
            "activity" | "attraction" | "sightseeing" | "tour" | "museum" | "shopping" | "entertainment" => {
                Self::Activity
            }
            "transportation" | "transport" | "transfer" | "travel" | "flight" | "train" => Self::Transportation,
            other => {
                debug!(%other, "ActivityType::parse: unknown type, using Other");
                Self::Other
            }
        }
    }
}

impl From<String> for ActivityType {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ActivityType> for String {
    fn from(kind: ActivityType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One scheduled activity within a day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActivityPlan {
    pub name: String,

    #[serde(rename = "type")]
    pub activity_type: ActivityType,

    #[serde(deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Local start time as `HH:MM`
    #[serde(deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    #[serde(deserialize_with = "lenient::opt_u32", skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,

    #[serde(deserialize_with = "lenient::opt_cost", skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,

    #[serde(deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ActivityPlan {
    pub fn new(name: impl Into<String>, activity_type: ActivityType) -> Self {
        Self {
            name: name.into(),
            activity_type,
            ..Default::default()
        }
    }

    pub fn at(mut self, start_time: impl Into<String>, duration_minutes: u32) -> Self {
        self.start_time = Some(start_time.into());
        self.duration_minutes = Some(duration_minutes);
        self
    }

    pub fn in_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn costing(mut self, cost: f64) -> Self {
        self.estimated_cost = Some(cost);
        self
    }

    /// Key used to look up this activity's coordinates
    pub fn geo_key(&self) -> &str {
        self.location
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(&self.name)
    }
}

/// A single day of the itinerary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DayPlan {
    #[serde(alias = "day", deserialize_with = "lenient::u32_or_zero")]
    pub day_number: u32,

    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub theme: String,

    #[serde(deserialize_with = "lenient::opt_date", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,

    pub activities: Vec<ActivityPlan>,
}

impl DayPlan {
    pub fn new(day_number: u32, theme: impl Into<String>, activities: Vec<ActivityPlan>) -> Self {
        Self {
            day_number,
            theme: theme.into(),
            date: None,
            activities,
        }
    }

    /// Sum of the priced activities of the day
    pub fn total_cost(&self) -> f64 {
        self.activities.iter().filter_map(|a| a.estimated_cost).sum()
    }
}

/// Geocoding result for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub source_location: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl Coordinates {
    pub fn found(source_location: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            source_location: source_location.into(),
            success: true,
            error_message: None,
        }
    }

    pub fn failed(source_location: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            source_location: source_location.into(),
            success: false,
            error_message: Some(error.into()),
        }
    }

    /// Latitude/longitude pair, only when the lookup succeeded
    pub fn point(&self) -> Option<(f64, f64)> {
        self.success.then_some((self.latitude, self.longitude))
    }
}

/// Budget comparison for a set of priced items
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetCheck {
    pub total_cost: f64,
    pub budget: f64,
    pub within_budget: bool,
    pub remaining: f64,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl BudgetCheck {
    pub fn new(total_cost: f64, budget: f64, recommendations: Vec<String>) -> Self {
        Self {
            total_cost,
            budget,
            within_budget: total_cost <= budget,
            remaining: budget - total_cost,
            recommendations,
        }
    }

    /// Fraction of the budget spent, `None` for a zero budget
    pub fn utilization(&self) -> Option<f64> {
        (self.budget > 0.0).then(|| self.total_cost / self.budget)
    }
}

/// Attraction record from knowledge retrieval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attraction {
    pub name: String,
    pub category: String,
    pub price: String,
    pub description: String,
    pub relevance_score: f64,
    pub source: String,
}

/// Point of interest from a nearby search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Poi {
    pub name: String,
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: Option<f64>,
    pub address: Option<String>,
}

/// Lenient field deserializers for model-produced JSON
mod lenient {
    use super::*;

    fn number_from(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    pub fn string_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(opt_string(d)?.unwrap_or_default())
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(Option::<Value>::deserialize(d)?
            .as_ref()
            .and_then(number_from)
            .filter(|n| n.is_finite() && *n >= 0.0 && *n <= u32::MAX as f64)
            .map(|n| n.round() as u32))
    }

    pub fn u32_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        Ok(opt_u32(d)?.unwrap_or_default())
    }

    pub fn opt_cost<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite() && *v >= 0.0),
            Some(Value::String(s)) => Some(parse_price(&s)),
            _ => None,
        })
    }

    pub fn opt_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_type_parse() {
        assert_eq!(ActivityType::parse("Hotel"), ActivityType::Accommodation);
        assert_eq!(ActivityType::parse("restaurant"), ActivityType::Dining);
        assert_eq!(ActivityType::parse(" attraction "), ActivityType::Activity);
        assert_eq!(ActivityType::parse("transport"), ActivityType::Transportation);
        assert_eq!(ActivityType::parse("spa"), ActivityType::Other);
    }

    #[test]
    fn test_day_plan_lenient_deserialize() {
        let json = r#"{
            "dayNumber": "2",
            "theme": "Old Town",
            "date": "not a date",
            "activities": [
                {"name": "Castle", "type": "attraction", "startTime": "09:00",
                 "durationMinutes": 120.0, "estimatedCost": "$25", "location": "Castle Hill"},
                {"name": "Lunch", "type": "dining", "estimatedCost": 18.5}
            ]
        }"#;

        let day: DayPlan = serde_json::from_str(json).unwrap();
        assert_eq!(day.day_number, 2);
        assert_eq!(day.date, None);
        assert_eq!(day.activities.len(), 2);
        assert_eq!(day.activities[0].activity_type, ActivityType::Activity);
        assert_eq!(day.activities[0].duration_minutes, Some(120));
        assert_eq!(day.activities[0].estimated_cost, Some(25.0));
        assert_eq!(day.activities[1].start_time, None);
        assert_eq!(day.total_cost(), 43.5);
    }

    #[test]
    fn test_activity_type_serializes_lowercase() {
        let activity = ActivityPlan::new("Dinner", ActivityType::Dining);
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["type"], "dining");
    }

    #[test]
    fn test_geo_key_falls_back_to_name() {
        let with_location = ActivityPlan::new("Louvre", ActivityType::Activity).in_location("Rue de Rivoli");
        assert_eq!(with_location.geo_key(), "Rue de Rivoli");

        let blank = ActivityPlan::new("Louvre", ActivityType::Activity).in_location("  ");
        assert_eq!(blank.geo_key(), "Louvre");
    }

    #[test]
    fn test_coordinates_point_only_on_success() {
        assert_eq!(Coordinates::found("Paris", 48.85, 2.35).point(), Some((48.85, 2.35)));
        assert_eq!(Coordinates::failed("Nowhere", "no match").point(), None);
    }

    #[test]
    fn test_budget_check_arithmetic() {
        let check = BudgetCheck::new(130.0, 100.0, vec![]);
        assert!(!check.within_budget);
        assert_eq!(check.remaining, -30.0);
        assert_eq!(check.utilization(), Some(1.3));

        let zero = BudgetCheck::new(10.0, 0.0, vec![]);
        assert_eq!(zero.utilization(), None);
    }
}
