// 🗺️ State Registry - state/territory codes and names
//
// Sources disagree on how states are written: the NPS API uses "WY,MT,ID",
// acreage reports use codes, Wikipedia tables use full names
// ("Alaska"). Everything normalizes to the two-letter postal code.

use std::collections::{BTreeSet, HashMap};

const STATES: [(&str, &str); 57] = [
    ("AL", "Alabama"),
    ("AK", "Alaska"),
    ("AZ", "Arizona"),
    ("AR", "Arkansas"),
    ("CA", "California"),
    ("CO", "Colorado"),
    ("CT", "Connecticut"),
    ("DE", "Delaware"),
    ("DC", "District of Columbia"),
    ("FL", "Florida"),
    ("GA", "Georgia"),
    ("HI", "Hawaii"),
    ("ID", "Idaho"),
    ("IL", "Illinois"),
    ("IN", "Indiana"),
    ("IA", "Iowa"),
    ("KS", "Kansas"),
    ("KY", "Kentucky"),
    ("LA", "Louisiana"),
    ("ME", "Maine"),
    ("MD", "Maryland"),
    ("MA", "Massachusetts"),
    ("MI", "Michigan"),
    ("MN", "Minnesota"),
    ("MS", "Mississippi"),
    ("MO", "Missouri"),
    ("MT", "Montana"),
    ("NE", "Nebraska"),
    ("NV", "Nevada"),
    ("NH", "New Hampshire"),
    ("NJ", "New Jersey"),
    ("NM", "New Mexico"),
    ("NY", "New York"),
    ("NC", "North Carolina"),
    ("ND", "North Dakota"),
    ("OH", "Ohio"),
    ("OK", "Oklahoma"),
    ("OR", "Oregon"),
    ("PA", "Pennsylvania"),
    ("RI", "Rhode Island"),
    ("SC", "South Carolina"),
    ("SD", "South Dakota"),
    ("TN", "Tennessee"),
    ("TX", "Texas"),
    ("UT", "Utah"),
    ("VT", "Vermont"),
    ("VA", "Virginia"),
    ("WA", "Washington"),
    ("WV", "West Virginia"),
    ("WI", "Wisconsin"),
    ("WY", "Wyoming"),
    ("AS", "American Samoa"),
    ("GU", "Guam"),
    ("MP", "Northern Mariana Islands"),
    ("PW", "Palau"),
    ("PR", "Puerto Rico"),
    ("VI", "U.S. Virgin Islands"),
];

/// Lookup table for state codes and names
pub struct StateRegistry {
    by_code: HashMap<&'static str, &'static str>,
    by_name: HashMap<String, &'static str>,
}

impl StateRegistry {
    pub fn new() -> Self {
        let mut by_code = HashMap::new();
        let mut by_name = HashMap::new();

        for (code, name) in STATES {
            by_code.insert(code, name);
            by_name.insert(name.to_lowercase(), code);
        }
        // Common alternate spellings
        by_name.insert("virgin islands".to_string(), "VI");
        by_name.insert("us virgin islands".to_string(), "VI");
        by_name.insert("washington dc".to_string(), "DC");
        by_name.insert("washington, d.c.".to_string(), "DC");

        StateRegistry { by_code, by_name }
    }

    /// Resolve a code or full name to the postal code
    pub fn code_for(&self, value: &str) -> Option<&'static str> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }

        let upper = trimmed.to_uppercase();
        if let Some((code, _)) = self.by_code.get_key_value(upper.as_str()) {
            return Some(*code);
        }

        self.by_name.get(&trimmed.to_lowercase()).copied()
    }

    pub fn name_for(&self, code: &str) -> Option<&'static str> {
        self.by_code.get(code.trim().to_uppercase().as_str()).copied()
    }

    pub fn count(&self) -> usize {
        self.by_code.len()
    }

    /// Parse a state cell into a set of codes.
    ///
    /// Accepts "WY,MT,ID", "CA; NV", "Alaska", "DC/MD/VA" and "CA NV".
    /// An empty cell is an empty set. Returns the offending token when any
    /// part is not a known state.
    pub fn parse_states(&self, cell: &str) -> Result<BTreeSet<String>, String> {
        let mut states = BTreeSet::new();

        // Full-cell match first so "Washington, D.C." is not split
        if let Some(code) = self.code_for(cell) {
            states.insert(code.to_string());
            return Ok(states);
        }

        for token in cell.split([',', ';', '/']) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }

            if let Some(code) = self.code_for(token) {
                states.insert(code.to_string());
                continue;
            }

            // Space-separated codes ("CA NV")
            let mut parts = Vec::new();
            for part in token.split_whitespace() {
                match self.by_code.get_key_value(part.to_uppercase().as_str()) {
                    Some((code, _)) => parts.push(code.to_string()),
                    None => return Err(token.to_string()),
                }
            }
            states.extend(parts);
        }

        Ok(states)
    }
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
