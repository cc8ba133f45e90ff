// 🏷️ Designation - the administrative category of an NPS unit
//
// The set is fixed. nps.gov groups units under plural headings
// ("National Parks"), the API reports singular values ("National Park"),
// and a handful of API values are compounds ("National Park & Preserve").
// All of them parse to the same variant.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Designation {
    InternationalHistoricSite,
    NationalBattlefield,
    NationalBattlefieldPark,
    NationalBattlefieldSite,
    NationalMilitaryPark,
    NationalHistoricalPark,
    NationalHistoricSite,
    NationalLakeshore,
    NationalMemorial,
    NationalMonument,
    NationalPark,
    NationalParkway,
    NationalPreserve,
    NationalReserve,
    NationalRecreationArea,
    NationalRiver,
    NationalWildAndScenicRiver,
    NationalScenicTrail,
    NationalSeashore,
    /// Everything nps.gov lists under "Other Designations"
    OtherDesignation,
}

impl Designation {
    pub const ALL: [Designation; 20] = [
        Designation::InternationalHistoricSite,
        Designation::NationalBattlefield,
        Designation::NationalBattlefieldPark,
        Designation::NationalBattlefieldSite,
        Designation::NationalMilitaryPark,
        Designation::NationalHistoricalPark,
        Designation::NationalHistoricSite,
        Designation::NationalLakeshore,
        Designation::NationalMemorial,
        Designation::NationalMonument,
        Designation::NationalPark,
        Designation::NationalParkway,
        Designation::NationalPreserve,
        Designation::NationalReserve,
        Designation::NationalRecreationArea,
        Designation::NationalRiver,
        Designation::NationalWildAndScenicRiver,
        Designation::NationalScenicTrail,
        Designation::NationalSeashore,
        Designation::OtherDesignation,
    ];

    /// Singular display name, also the value written to the master file
    pub fn as_str(&self) -> &'static str {
        match self {
            Designation::InternationalHistoricSite => "International Historic Site",
            Designation::NationalBattlefield => "National Battlefield",
            Designation::NationalBattlefieldPark => "National Battlefield Park",
            Designation::NationalBattlefieldSite => "National Battlefield Site",
            Designation::NationalMilitaryPark => "National Military Park",
            Designation::NationalHistoricalPark => "National Historical Park",
            Designation::NationalHistoricSite => "National Historic Site",
            Designation::NationalLakeshore => "National Lakeshore",
            Designation::NationalMemorial => "National Memorial",
            Designation::NationalMonument => "National Monument",
            Designation::NationalPark => "National Park",
            Designation::NationalParkway => "National Parkway",
            Designation::NationalPreserve => "National Preserve",
            Designation::NationalReserve => "National Reserve",
            Designation::NationalRecreationArea => "National Recreation Area",
            Designation::NationalRiver => "National River",
            Designation::NationalWildAndScenicRiver => "National Wild and Scenic River",
            Designation::NationalScenicTrail => "National Scenic Trail",
            Designation::NationalSeashore => "National Seashore",
            Designation::OtherDesignation => "Other Designation",
        }
    }

    /// Plural heading as used on nps.gov
    pub fn plural(&self) -> String {
        match self {
            Designation::NationalWildAndScenicRiver => {
                "National Wild and Scenic Rivers and Riverways".to_string()
            }
            other => format!("{}s", other.as_str()),
        }
    }

    /// Parse a designation string. Returns None for anything outside the
    /// fixed set; callers decide whether that is an error.
    pub fn parse(s: &str) -> Option<Designation> {
        let key = designation_key(s);
        if key.is_empty() {
            return None;
        }

        for d in Designation::ALL {
            if key == designation_key(d.as_str()) || key == designation_key(&d.plural()) {
                return Some(d);
            }
        }

        // Compound values reported by the NPS API
        match key.as_str() {
            "national park and preserve" | "national parks and preserves" => {
                Some(Designation::NationalPark)
            }
            "national monument and preserve" | "national monuments and preserves" => {
                Some(Designation::NationalMonument)
            }
            "national wild and scenic river and riverway"
            | "national wild and scenic rivers" => Some(Designation::NationalWildAndScenicRiver),
            _ => None,
        }
    }

    /// Parse with fallback: unknown or empty values become OtherDesignation
    pub fn classify(s: &str) -> Designation {
        Designation::parse(s).unwrap_or(Designation::OtherDesignation)
    }
}

impl fmt::Display for Designation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn designation_key(s: &str) -> String {
    s.to_lowercase()
        .replace('&', " and ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
