use crate::error::{ReconciliationError, Result};
use crate::schema::{Branch, BranchCategory};
use crate::utils::match_key;
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_FALLBACK_LABEL: &str = "other";

/// Decides whether a branch follows the local (quarterly) or foreign (semiannual)
/// inspection cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryPolicy {
    #[schemars(description = "States whose branches are local (e.g. 'Nuevo León'). Compared ignoring case and accents.")]
    #[serde(default)]
    pub local_states: Vec<String>,

    #[schemars(description = "Keywords that make a branch local when found in its city or operating group (e.g. 'saltillo').")]
    #[serde(default)]
    pub local_keywords: Vec<String>,

    #[schemars(description = "Branch numbers that always follow the foreign cadence, whatever their state or group.")]
    #[serde(default)]
    pub foreign_branch_numbers: Vec<u32>,
}

impl Default for CategoryPolicy {
    fn default() -> Self {
        Self {
            local_states: vec!["Nuevo León".to_string()],
            local_keywords: vec!["saltillo".to_string()],
            foreign_branch_numbers: vec![28, 30, 57],
        }
    }
}

impl CategoryPolicy {
    pub fn categorize(&self, branch: &Branch) -> BranchCategory {
        if self.foreign_branch_numbers.contains(&branch.number) {
            return BranchCategory::Foreign;
        }

        let state = match_key(&branch.state);
        if self.local_states.iter().any(|s| match_key(s) == state) {
            return BranchCategory::Local;
        }

        let city = match_key(&branch.city);
        let group = match_key(&branch.operating_group);
        let keyword_hit = self
            .local_keywords
            .iter()
            .map(|k| match_key(k))
            .filter(|k| !k.is_empty())
            .any(|k| city.contains(&k) || group.contains(&k));

        if keyword_hit {
            BranchCategory::Local
        } else {
            BranchCategory::Foreign
        }
    }
}

/// A labelled, inclusive date range for one cadence. Open bounds extend indefinitely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodWindow {
    #[schemars(description = "Label assigned to dates inside the window (e.g. 'T4-2025').")]
    pub label: String,

    pub category: BranchCategory,

    #[schemars(description = "First day of the window (YYYY-MM-DD). Omit for an open start.")]
    #[serde(default)]
    pub start: Option<NaiveDate>,

    #[schemars(description = "Last day of the window, inclusive (YYYY-MM-DD). Omit for an open end.")]
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl PeriodWindow {
    pub fn new(
        label: &str,
        category: BranchCategory,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Self {
        Self {
            label: label.to_string(),
            category,
            start,
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }
}

/// The cutover table mapping supervision dates to business periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodCalendar {
    pub windows: Vec<PeriodWindow>,

    #[schemars(description = "Label for dates no window covers. Defaults to 'other'.")]
    #[serde(default = "default_fallback_label")]
    pub fallback_label: String,
}

fn default_fallback_label() -> String {
    DEFAULT_FALLBACK_LABEL.to_string()
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

impl Default for PeriodCalendar {
    fn default() -> Self {
        use BranchCategory::{Foreign, Local};

        Self {
            windows: vec![
                PeriodWindow::new("T4-2024", Local, ymd(2024, 10, 10), ymd(2024, 12, 31)),
                PeriodWindow::new("T1-2025", Local, ymd(2025, 1, 1), ymd(2025, 3, 31)),
                PeriodWindow::new("T2-2025", Local, ymd(2025, 4, 1), ymd(2025, 6, 30)),
                PeriodWindow::new("T3-2025", Local, ymd(2025, 7, 1), ymd(2025, 9, 30)),
                PeriodWindow::new("T4-2025", Local, ymd(2025, 10, 10), None),
                PeriodWindow::new("S2-Foraneas", Foreign, ymd(2024, 7, 1), ymd(2024, 10, 7)),
                PeriodWindow::new("S1-2025", Foreign, ymd(2025, 1, 1), ymd(2025, 6, 30)),
                PeriodWindow::new("S2-2025", Foreign, ymd(2025, 7, 1), ymd(2025, 12, 31)),
            ],
            fallback_label: default_fallback_label(),
        }
    }
}

impl PeriodCalendar {
    /// Checks labels and bounds, and that no two windows of the same cadence overlap,
    /// so every (date, category) pair gets exactly one label.
    pub fn validate(&self) -> Result<()> {
        if self.fallback_label.trim().is_empty() {
            return Err(ReconciliationError::InvalidCalendar(
                "Fallback label must not be empty".to_string(),
            ));
        }

        for window in &self.windows {
            if window.label.trim().is_empty() {
                return Err(ReconciliationError::InvalidCalendar(
                    "Period window with an empty label".to_string(),
                ));
            }
            if let (Some(start), Some(end)) = (window.start, window.end) {
                if end < start {
                    return Err(ReconciliationError::InvalidCalendar(format!(
                        "Window '{}' ends on {} before it starts on {}",
                        window.label, end, start
                    )));
                }
            }
        }

        for category in [BranchCategory::Local, BranchCategory::Foreign] {
            let mut windows: Vec<&PeriodWindow> = self
                .windows
                .iter()
                .filter(|w| w.category == category)
                .collect();
            // None sorts first, matching an open start
            windows.sort_by_key(|w| w.start);

            for pair in windows.windows(2) {
                let (earlier, later) = (pair[0], pair[1]);
                let overlaps = match (earlier.end, later.start) {
                    (Some(end), Some(start)) => start <= end,
                    _ => true,
                };
                if overlaps {
                    return Err(ReconciliationError::InvalidCalendar(format!(
                        "Windows '{}' and '{}' overlap for {:?} branches",
                        earlier.label, later.label, category
                    )));
                }
            }
        }

        Ok(())
    }

    /// The period label for a date under a cadence. Falls back to `fallback_label`; never
    /// fails.
    pub fn classify(&self, date: NaiveDate, category: BranchCategory) -> &str {
        self.windows
            .iter()
            .find(|w| w.category == category && w.contains(date))
            .map(|w| w.label.as_str())
            .unwrap_or(&self.fallback_label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.windows.iter().map(|w| w.label.as_str())
    }
}
