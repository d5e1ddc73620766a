//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Reasoning-loop step prompt
pub const REACT: &str = include_str!("../../prompts/react.pmt");

/// Day-by-day itinerary generation
pub const ITINERARY: &str = include_str!("../../prompts/itinerary.pmt");

/// Holistic itinerary review
pub const CRITIQUE: &str = include_str!("../../prompts/critique.pmt");

/// Destination candidate generation
pub const CANDIDATES: &str = include_str!("../../prompts/candidates.pmt");

/// Candidate ranking
pub const RANK: &str = include_str!("../../prompts/rank.pmt");

/// Per-destination recommendation reasons
pub const REASONS: &str = include_str!("../../prompts/reasons.pmt");

/// Names of every embedded template
pub const NAMES: [&str; 6] = ["react", "itinerary", "critique", "candidates", "rank", "reasons"];

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "react" => Some(REACT),
        "itinerary" => Some(ITINERARY),
        "critique" => Some(CRITIQUE),
        "candidates" => Some(CANDIDATES),
        "rank" => Some(RANK),
        "reasons" => Some(REASONS),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_resolves() {
        for name in NAMES {
            assert!(get_embedded(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn test_protocol_markers_present() {
        assert!(REACT.contains("Action: [tool_name]"));
        assert!(CRITIQUE.contains("PASS"));
        assert!(RANK.contains("[1, 3, 2, ...]"));
        assert!(ITINERARY.contains("\"days\""));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
