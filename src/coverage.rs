use crate::error::Result;
use crate::proximity::{
    suggest_nearby_groups, ProximitySuggestion, DEFAULT_PROXIMITY_THRESHOLD_DEGREES,
};
use crate::registry::BranchRegistry;
use crate::schema::{EnrichedRecord, Provenance, RecordIssue};
use chrono::NaiveDate;
use csv::WriterBuilder;
use log::warn;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchCoverage {
    pub number: u32,
    pub display_name: String,
    pub operating_group: String,
    pub covered: bool,
    /// Distinct visits with at least one principal-area row
    pub submissions: usize,
    pub principal_rows: usize,
    pub average_percentage: Option<f64>,
    pub last_evaluation: Option<NaiveDate>,
    pub provenances: BTreeSet<Provenance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmappedLabel {
    pub location_label: String,
    pub record_count: usize,
    pub submission_count: usize,
    pub first_evaluation: Option<NaiveDate>,
    pub last_evaluation: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCoverage {
    pub operating_group: String,
    pub branch_count: usize,
    pub covered_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AmbiguousLabel {
    pub location_label: String,
    pub chosen_branch_number: u32,
    pub other_candidates: Vec<u32>,
    pub record_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvenanceTotals {
    pub automatic: usize,
    pub manual: usize,
    pub unmapped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExclusionCounts {
    /// Rows with at least one issue. A row with several issues counts once.
    pub excluded_records: usize,
    pub malformed_date: usize,
    pub malformed_percentage: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub total_records: usize,
    pub total_branches: usize,
    pub covered_branch_count: usize,
    pub branches: Vec<BranchCoverage>,
    pub uncovered_branches: Vec<BranchCoverage>,
    pub unmapped_labels: Vec<UnmappedLabel>,
    pub group_rollups: Vec<GroupCoverage>,
    pub provenance_totals: ProvenanceTotals,
    pub period_submissions: BTreeMap<String, usize>,
    pub ambiguous_labels: Vec<AmbiguousLabel>,
    pub proximity_suggestions: Vec<ProximitySuggestion>,
    pub exclusions: ExclusionCounts,
}

#[derive(Default)]
struct BranchAccumulator {
    submissions: BTreeSet<String>,
    principal_rows: usize,
    percentage_sum: f64,
    percentage_count: usize,
    last_evaluation: Option<NaiveDate>,
    provenances: BTreeSet<Provenance>,
}

#[derive(Default)]
struct UnmappedAccumulator {
    record_count: usize,
    submissions: BTreeSet<String>,
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
}

/// Read-side aggregation over enriched records. Never mutates its inputs.
#[derive(Debug, Clone)]
pub struct CoverageReporter {
    proximity_threshold: f64,
}

impl Default for CoverageReporter {
    fn default() -> Self {
        Self::new(DEFAULT_PROXIMITY_THRESHOLD_DEGREES)
    }
}

impl CoverageReporter {
    pub fn new(proximity_threshold: f64) -> Self {
        Self {
            proximity_threshold,
        }
    }

    pub fn proximity_threshold(&self) -> f64 {
        self.proximity_threshold
    }

    pub fn report(
        &self,
        records: &[EnrichedRecord<'_>],
        registry: &BranchRegistry,
    ) -> CoverageReport {
        let mut per_branch: BTreeMap<u32, BranchAccumulator> = BTreeMap::new();
        let mut unmapped: BTreeMap<&str, UnmappedAccumulator> = BTreeMap::new();
        let mut ambiguous: BTreeMap<&str, AmbiguousLabel> = BTreeMap::new();
        let mut period_visits: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut provenance_totals = ProvenanceTotals::default();
        let mut exclusions = ExclusionCounts::default();

        for record in records {
            if record.is_excluded() {
                exclusions.excluded_records += 1;
            }
            for issue in &record.issues {
                match issue {
                    RecordIssue::MalformedDate { .. } => exclusions.malformed_date += 1,
                    RecordIssue::MalformedPercentage { .. } => {
                        exclusions.malformed_percentage += 1
                    }
                }
            }

            match record.match_result.provenance() {
                Provenance::Automatic => provenance_totals.automatic += 1,
                Provenance::Manual => provenance_totals.manual += 1,
                Provenance::Unmapped => provenance_totals.unmapped += 1,
            }

            let label = record.record.location_label.as_str();

            if let Some(chosen) = record.match_result.branch_number() {
                if !record.ambiguous_with.is_empty() {
                    ambiguous
                        .entry(label)
                        .or_insert_with(|| AmbiguousLabel {
                            location_label: label.to_string(),
                            chosen_branch_number: chosen,
                            other_candidates: record.ambiguous_with.clone(),
                            record_count: 0,
                        })
                        .record_count += 1;
                }
            } else {
                let acc = unmapped.entry(label).or_default();
                acc.record_count += 1;
                acc.submissions.insert(record.record.submission_id.clone());
                if let Some(date) = record.evaluation_date {
                    acc.first = Some(acc.first.map_or(date, |d| d.min(date)));
                    acc.last = Some(acc.last.map_or(date, |d| d.max(date)));
                }
            }

            if let Some(period) = record
                .period_label
                .as_deref()
                .filter(|_| !record.is_excluded())
            {
                period_visits
                    .entry(period)
                    .or_default()
                    .insert(record.record.submission_id.as_str());
            }

            if !record.counts_toward_coverage() {
                continue;
            }
            let Some(number) = record.match_result.branch_number() else {
                continue;
            };

            let acc = per_branch.entry(number).or_default();
            acc.submissions.insert(record.record.submission_id.clone());
            acc.principal_rows += 1;
            acc.provenances.insert(record.match_result.provenance());
            if let Some(p) = record.record.percentage {
                acc.percentage_sum += p;
                acc.percentage_count += 1;
            }
            if let Some(date) = record.evaluation_date {
                acc.last_evaluation = Some(acc.last_evaluation.map_or(date, |d| d.max(date)));
            }
        }

        let branches: Vec<BranchCoverage> = registry
            .iter()
            .map(|branch| {
                let acc = per_branch.remove(&branch.number).unwrap_or_default();
                BranchCoverage {
                    number: branch.number,
                    display_name: branch.display_name.clone(),
                    operating_group: branch.operating_group.clone(),
                    covered: acc.principal_rows > 0,
                    submissions: acc.submissions.len(),
                    principal_rows: acc.principal_rows,
                    average_percentage: (acc.percentage_count > 0)
                        .then(|| acc.percentage_sum / acc.percentage_count as f64),
                    last_evaluation: acc.last_evaluation,
                    provenances: acc.provenances,
                }
            })
            .collect();

        if !per_branch.is_empty() {
            warn!(
                "{} matched branch numbers are missing from the registry: {:?}",
                per_branch.len(),
                per_branch.keys().collect::<Vec<_>>()
            );
        }

        let mut groups: BTreeMap<&str, GroupCoverage> = BTreeMap::new();
        for branch in &branches {
            let group = groups
                .entry(branch.operating_group.as_str())
                .or_insert_with(|| GroupCoverage {
                    operating_group: branch.operating_group.clone(),
                    branch_count: 0,
                    covered_count: 0,
                });
            group.branch_count += 1;
            if branch.covered {
                group.covered_count += 1;
            }
        }

        let group_rollups: Vec<GroupCoverage> = groups.into_values().collect();

        let uncovered_branches: Vec<BranchCoverage> =
            branches.iter().filter(|b| !b.covered).cloned().collect();

        let unmapped_labels = unmapped
            .into_iter()
            .map(|(label, acc)| UnmappedLabel {
                location_label: label.to_string(),
                record_count: acc.record_count,
                submission_count: acc.submissions.len(),
                first_evaluation: acc.first,
                last_evaluation: acc.last,
            })
            .collect();

        CoverageReport {
            total_records: records.len(),
            total_branches: branches.len(),
            covered_branch_count: branches.len() - uncovered_branches.len(),
            uncovered_branches,
            branches,
            unmapped_labels,
            group_rollups,
            provenance_totals,
            period_submissions: period_visits
                .into_iter()
                .map(|(period, visits)| (period.to_string(), visits.len()))
                .collect(),
            ambiguous_labels: ambiguous.into_values().collect(),
            proximity_suggestions: suggest_nearby_groups(records, self.proximity_threshold),
            exclusions,
        }
    }
}

/// Coverage with the default proximity threshold.
pub fn report(records: &[EnrichedRecord<'_>], registry: &BranchRegistry) -> CoverageReport {
    CoverageReporter::default().report(records, registry)
}

impl CoverageReport {
    /// True when at least one record matched a registry branch. A report without
    /// matches is still a valid result, not a failure.
    pub fn has_matched_data(&self) -> bool {
        self.provenance_totals.automatic + self.provenance_totals.manual > 0
    }

    pub fn coverage_ratio(&self) -> f64 {
        if self.total_branches == 0 {
            return 0.0;
        }
        self.covered_branch_count as f64 / self.total_branches as f64
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One row per registry branch.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer.write_record([
            "Number",
            "Branch",
            "Operating Group",
            "Covered",
            "Submissions",
            "Principal Rows",
            "Average %",
            "Last Evaluation",
        ])?;

        for branch in &self.branches {
            writer.write_record([
                branch.number.to_string(),
                branch.display_name.clone(),
                branch.operating_group.clone(),
                branch.covered.to_string(),
                branch.submissions.to_string(),
                branch.principal_rows.to_string(),
                branch
                    .average_percentage
                    .map(|p| format!("{:.2}", p))
                    .unwrap_or_default(),
                branch
                    .last_evaluation
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ])?;
        }

        let bytes = writer.into_inner().map_err(|err| err.into_error())?;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Supervision Coverage\n\n");
        output.push_str(&format!(
            "**Covered branches:** {} of {} ({:.1}%)\n\n",
            self.covered_branch_count,
            self.total_branches,
            self.coverage_ratio() * 100.0
        ));
        output.push_str(&format!(
            "**Records:** {} ({} automatic, {} manual, {} unmapped)\n\n",
            self.total_records,
            self.provenance_totals.automatic,
            self.provenance_totals.manual,
            self.provenance_totals.unmapped
        ));
        if self.exclusions.excluded_records > 0 {
            output.push_str(&format!(
                "**Excluded records:** {} ({} malformed dates, {} malformed percentages)\n\n",
                self.exclusions.excluded_records,
                self.exclusions.malformed_date,
                self.exclusions.malformed_percentage
            ));
        }

        output.push_str("## Operating Groups\n\n");
        output.push_str("| Group | Branches | Covered |\n|---|---|---|\n");
        for group in &self.group_rollups {
            output.push_str(&format!(
                "| {} | {} | {} |\n",
                group.operating_group, group.branch_count, group.covered_count
            ));
        }
        output.push('\n');

        if !self.period_submissions.is_empty() {
            output.push_str("## Periods\n\n");
            for (period, visits) in &self.period_submissions {
                output.push_str(&format!("- {}: {} supervisions\n", period, visits));
            }
            output.push('\n');
        }

        output.push_str("## Uncovered Branches\n\n");
        for branch in &self.uncovered_branches {
            output.push_str(&format!(
                "- #{} {} ({})\n",
                branch.number, branch.display_name, branch.operating_group
            ));
        }
        output.push('\n');

        output.push_str("## Unmapped Labels\n\n");
        for label in &self.unmapped_labels {
            let range = match (label.first_evaluation, label.last_evaluation) {
                (Some(first), Some(last)) => format!(", {} → {}", first, last),
                _ => String::new(),
            };
            output.push_str(&format!(
                "- \"{}\": {} records, {} supervisions{}\n",
                label.location_label, label.record_count, label.submission_count, range
            ));
        }
        output.push('\n');

        if !self.ambiguous_labels.is_empty() {
            output.push_str("## Ambiguous Labels\n\n");
            for label in &self.ambiguous_labels {
                output.push_str(&format!(
                    "- \"{}\" → #{} (also matches {:?})\n",
                    label.location_label, label.chosen_branch_number, label.other_candidates
                ));
            }
            output.push('\n');
        }

        if !self.proximity_suggestions.is_empty() {
            output.push_str("## Needs Review (nearby branches)\n\n");
            for s in &self.proximity_suggestions {
                output.push_str(&format!(
                    "- \"{}\" is {:.3}° from #{} {} ({})\n",
                    s.location_label,
                    s.distance_degrees,
                    s.nearest_branch_number,
                    s.nearest_branch_name,
                    s.operating_group
                ));
            }
            output.push('\n');
        }

        output
    }
}
