// 📊 Markdown tables for a selection, one layout per view

use crate::data_quality::QualityCheck;
use crate::db::ParkRecord;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum View {
    /// Coordinates, sorted by name
    Location,
    /// Area, largest first
    Size,
    /// Latest-year visits, most visited first
    Visitors,
    /// Establishment date, oldest first
    Established,
}

impl View {
    /// Data-quality checks relevant to this view
    pub fn checks(&self) -> &'static [QualityCheck] {
        match self {
            View::Location => &[QualityCheck::Location, QualityCheck::State],
            View::Size => &[QualityCheck::Size],
            View::Visitors => &[QualityCheck::Visitors],
            View::Established => &[],
        }
    }
}

/// None sorts after every value
fn cmp_missing_last<T, F>(a: Option<T>, b: Option<T>, cmp: F) -> Ordering
where
    F: Fn(&T, &T) -> Ordering,
{
    match (a, b) {
        (Some(a), Some(b)) => cmp(&a, &b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Records in view order. The sort is stable, ties keep selection order.
pub fn sort_for_view<'a>(records: &[&'a ParkRecord], view: View) -> Vec<&'a ParkRecord> {
    let mut sorted = records.to_vec();
    match view {
        View::Location => sorted.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase())),
        View::Size => sorted.sort_by(|a, b| {
            cmp_missing_last(a.area_sq_mi, b.area_sq_mi, |x, y| {
                y.partial_cmp(x).unwrap_or(Ordering::Equal)
            })
        }),
        View::Visitors => {
            let year = latest_year(records);
            sorted.sort_by(|a, b| {
                cmp_missing_last(
                    year.and_then(|y| a.visits_in(y)),
                    year.and_then(|y| b.visits_in(y)),
                    |x, y| y.cmp(x),
                )
            })
        }
        View::Established => sorted.sort_by(|a, b| {
            cmp_missing_last(a.established_date, b.established_date, |x, y| x.cmp(y))
        }),
    }
    sorted
}

fn latest_year(records: &[&ParkRecord]) -> Option<i32> {
    records
        .iter()
        .filter_map(|r| r.visits_by_year.keys().next_back().copied())
        .max()
}

/// 4115000 -> "4,115,000"
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn escape(cell: &str) -> String {
    cell.replace('|', "\\|")
}

fn or_dash(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}

/// Render a selection as a markdown table
pub fn render_markdown(records: &[&ParkRecord], view: View, limit: Option<usize>) -> String {
    let year = latest_year(records);
    let header: Vec<String> = match view {
        View::Location => vec!["Park", "Designation", "States", "Latitude", "Longitude"]
            .into_iter()
            .map(String::from)
            .collect(),
        View::Size => vec!["Park".into(), "States".into(), "Area (sq mi)".into()],
        View::Visitors => vec![
            "Park".into(),
            "States".into(),
            match year {
                Some(y) => format!("Visitors {}", y),
                None => "Visitors".into(),
            },
        ],
        View::Established => vec!["Park".into(), "States".into(), "Established".into()],
    };

    let mut out = String::new();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    out.push_str(&format!(
        "|{}|\n",
        header.iter().map(|_| "---").collect::<Vec<_>>().join("|")
    ));

    let sorted = sort_for_view(records, view);
    let shown = limit.unwrap_or(sorted.len()).min(sorted.len());
    for record in &sorted[..shown] {
        let name = escape(&record.name);
        let states = record.states_label();
        let cells: Vec<String> = match view {
            View::Location => vec![
                name,
                record.designation.to_string(),
                states,
                or_dash(record.latitude.map(|v| format!("{:.4}", v))),
                or_dash(record.longitude.map(|v| format!("{:.4}", v))),
            ],
            View::Size => vec![
                name,
                states,
                or_dash(record.area_sq_mi.map(|v| format!("{:.1}", v))),
            ],
            View::Visitors => vec![
                name,
                states,
                or_dash(year.and_then(|y| record.visits_in(y)).map(group_thousands)),
            ],
            View::Established => vec![
                name,
                states,
                or_dash(record.established_date.map(|d| d.format("%Y-%m-%d").to_string())),
            ],
        };
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    if shown < sorted.len() {
        out.push_str(&format!("\n_{} more not shown_\n", sorted.len() - shown));
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Designation;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn record(name: &str, area: Option<f64>, visits_2018: Option<u64>, year: Option<i32>) -> ParkRecord {
        let mut visits_by_year = BTreeMap::new();
        if let Some(v) = visits_2018 {
            visits_by_year.insert(2018, v);
        }
        visits_by_year.insert(2016, 1);
        ParkRecord {
            canonical_id: name.to_lowercase(),
            name: name.to_string(),
            designation: Designation::NationalPark,
            states: ["UT".to_string()].into_iter().collect(),
            latitude: Some(37.29839254),
            longitude: Some(-113.0265138),
            area_sq_mi: area,
            established_date: year.and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1)),
            visits_by_year,
        }
    }

    fn names(records: &[&ParkRecord]) -> Vec<String> {
        records.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(4_115_000), "4,115,000");
    }

    #[test]
    fn test_sort_orders() {
        let zion = record("Zion", Some(229.0), Some(4_320_033), Some(1919));
        let arches = record("Arches", None, Some(1_663_557), Some(1971));
        let denali = record("Denali", Some(7408.0), None, None);
        let all = [&zion, &arches, &denali];

        assert_eq!(names(&sort_for_view(&all, View::Location)), vec!["Arches", "Denali", "Zion"]);
        assert_eq!(names(&sort_for_view(&all, View::Size)), vec!["Denali", "Zion", "Arches"]);
        assert_eq!(names(&sort_for_view(&all, View::Visitors)), vec!["Zion", "Arches", "Denali"]);
        assert_eq!(names(&sort_for_view(&all, View::Established)), vec!["Zion", "Arches", "Denali"]);
    }

    #[test]
    fn test_render_visitors_table() {
        let zion = record("Zion", Some(229.0), Some(4_320_033), Some(1919));
        let arches = record("Arches", None, None, None);
        let table = render_markdown(&[&arches, &zion], View::Visitors, None);

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "| Park | States | Visitors 2018 |");
        assert_eq!(lines[1], "|---|---|---|");
        assert_eq!(lines[2], "| Zion | UT | 4,320,033 |");
        assert_eq!(lines[3], "| Arches | UT | - |");
    }

    #[test]
    fn test_render_with_limit() {
        let zion = record("Zion", Some(229.0), None, None);
        let arches = record("Arches", Some(119.8), None, None);
        let table = render_markdown(&[&zion, &arches], View::Size, Some(1));
        assert!(table.contains("| Zion | UT | 229.0 |"));
        assert!(!table.contains("Arches |"));
        assert!(table.contains("_1 more not shown_"));
    }

    #[test]
    fn test_view_checks() {
        assert_eq!(View::Size.checks(), &[QualityCheck::Size]);
        assert!(View::Established.checks().is_empty());
    }
}
