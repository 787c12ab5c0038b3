//! Decomposition of a vehicle description into parking and gate identifiers.

use regex::Regex;
use std::sync::LazyLock;

static GATE_DESCRIPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Parking: (\S+), Gate: (\S+)").unwrap());

/// The parking gate a vehicle event was recorded at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub parking: String,
    pub gate: String,
}

/// Extracts the aggregation subject from an event description.
pub trait SubjectParser: Send + Sync {
    /// Returns `None` when the description doesn't identify a gate.
    fn parse(&self, description: &str) -> Option<Subject>;
}

/// Matches descriptions of the form `Parking: <id>, Gate: <id>` anywhere in the text.
#[derive(Debug, Default, Clone, Copy)]
pub struct GateDescriptionParser;

impl SubjectParser for GateDescriptionParser {
    fn parse(&self, description: &str) -> Option<Subject> {
        let captures = GATE_DESCRIPTION.captures(description)?;
        Some(Subject {
            parking: captures[1].to_string(),
            gate: captures[2].to_string(),
        })
    }
}
