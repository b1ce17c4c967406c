//! # Supervision Reconciler
//!
//! Reconciles operational supervision (inspection) records with a canonical branch
//! registry before anything is aggregated.
//!
//! ## Core Concepts
//!
//! - **Branch Registry**: the canonical branches, keyed by their registry number
//! - **Location Matcher**: resolves free-text location labels to branches, tagging each
//!   match as `automatic`, `manual` (override table) or `unmapped`
//! - **Period Classifier**: assigns supervision dates to business periods, quarterly for
//!   local branches and semiannual for foreign ones
//! - **Area Taxonomy**: separates the catalogued principal inspection areas from
//!   aggregate and meta rows
//! - **Coverage Report**: which branches have evidence, which labels stay unmapped
//!
//! ## Example
//!
//! ```rust,ignore
//! use supervision_reconciler::*;
//!
//! let registry = BranchRegistry::from_csv_path("sucursales.csv")?;
//! let records = read_supervision_csv_path("supervisiones.csv")?;
//! let config = ReconciliationConfig::curated();
//!
//! let output = reconcile(&registry, &config, &records)?;
//! println!("{}", output.report.to_markdown());
//! ```

pub mod config;
pub mod coverage;
pub mod error;
pub mod ingestion;
pub mod matcher;
pub mod overrides;
pub mod period;
pub mod proximity;
pub mod registry;
pub mod schema;
pub mod taxonomy;
pub mod utils;

pub use config::ReconciliationConfig;
pub use coverage::{
    AmbiguousLabel, BranchCoverage, CoverageReport, CoverageReporter, ExclusionCounts,
    GroupCoverage, ProvenanceTotals, UnmappedLabel,
};
pub use error::{ReconciliationError, Result};
pub use ingestion::*;
pub use matcher::{LocationMatcher, MatchOutcome, MatcherContext};
pub use overrides::*;
pub use period::{CategoryPolicy, PeriodCalendar, PeriodWindow, DEFAULT_FALLBACK_LABEL};
pub use proximity::{suggest_nearby_groups, ProximitySuggestion};
pub use registry::BranchRegistry;
pub use schema::*;
pub use taxonomy::{normalize_area_label, AreaTaxonomy, DEFAULT_PRINCIPAL_AREAS};
pub use utils::*;

use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;

/// Enriched rows in input order plus the coverage report built from them.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationOutput<'a> {
    pub records: Vec<EnrichedRecord<'a>>,
    pub report: CoverageReport,
}

/// A validated, reusable run configuration bound to one registry.
pub struct ReconciliationPipeline<'a> {
    registry: &'a BranchRegistry,
    context: MatcherContext<'a>,
    calendar: PeriodCalendar,
    policy: CategoryPolicy,
    taxonomy: AreaTaxonomy,
    reporter: CoverageReporter,
}

impl<'a> ReconciliationPipeline<'a> {
    pub fn new(registry: &'a BranchRegistry, config: &ReconciliationConfig) -> Result<Self> {
        config.validate()?;
        let context = MatcherContext::new(registry, &config.overrides)?;

        debug!(
            "Pipeline ready: {} branches, {} overrides, {} period windows, {} principal areas",
            registry.len(),
            config.overrides.len(),
            config.calendar.windows.len(),
            config.principal_areas.len()
        );

        Ok(Self {
            registry,
            context,
            calendar: config.calendar.clone(),
            policy: config.category_policy.clone(),
            taxonomy: AreaTaxonomy::new(&config.principal_areas),
            reporter: CoverageReporter::new(config.proximity_threshold_degrees),
        })
    }

    pub fn context(&self) -> &MatcherContext<'a> {
        &self.context
    }

    /// Cadence of a matched branch. Unmapped rows follow the foreign cadence.
    pub fn category_for(&self, result: &MatchResult<'_>) -> BranchCategory {
        result
            .branch()
            .map_or(BranchCategory::Foreign, |b| self.policy.categorize(b))
    }

    /// Attaches match, cadence, period and area category to every row. Never fails; data
    /// problems are recorded as issues on the row.
    pub fn enrich(&self, records: &[RawSupervisionRecord]) -> Vec<EnrichedRecord<'a>> {
        let mut matcher = LocationMatcher::new(&self.context);

        let mut enriched: Vec<EnrichedRecord<'a>> = records
            .iter()
            .map(|record| {
                let outcome = matcher.resolve(&record.location_label);
                let (evaluation_date, issues) = inspect_record(record);
                let branch_category = self.category_for(&outcome.result);
                let period_label = evaluation_date
                    .filter(|_| issues.is_empty())
                    .map(|d| self.calendar.classify(d, branch_category).to_string());

                EnrichedRecord {
                    area_category: self.taxonomy.classify(record.area_label.as_deref()),
                    record: record.clone(),
                    evaluation_date,
                    match_result: outcome.result,
                    match_rule: outcome.rule,
                    ambiguous_with: outcome.ambiguous_with,
                    branch_category,
                    period_label,
                    issues,
                }
            })
            .collect();

        debug!(
            "Resolved {} rows through {} distinct location labels",
            matcher.lookups(),
            matcher.distinct_labels()
        );

        let confidences: HashMap<String, f64> =
            suggest_nearby_groups(&enriched, self.reporter.proximity_threshold())
                .into_iter()
                .map(|s| (s.location_label, s.confidence))
                .collect();

        if !confidences.is_empty() {
            for record in enriched.iter_mut().filter(|r| !r.match_result.is_mapped()) {
                if let Some(confidence) = confidences.get(&record.record.location_label) {
                    record.match_result =
                        record.match_result.with_proximity_confidence(*confidence);
                }
            }
        }

        enriched
    }

    pub fn report(&self, records: &[EnrichedRecord<'_>]) -> CoverageReport {
        self.reporter.report(records, self.registry)
    }

    pub fn process(&self, records: &[RawSupervisionRecord]) -> ReconciliationOutput<'a> {
        info!(
            "Reconciling {} supervision rows against {} branches",
            records.len(),
            self.registry.len()
        );

        let enriched = self.enrich(records);
        let report = self.report(&enriched);

        info!(
            "Coverage: {}/{} branches, {} unmapped labels, {} excluded rows",
            report.covered_branch_count,
            report.total_branches,
            report.unmapped_labels.len(),
            report.exclusions.excluded_records
        );

        ReconciliationOutput {
            records: enriched,
            report,
        }
    }
}

pub fn reconcile<'a>(
    registry: &'a BranchRegistry,
    config: &ReconciliationConfig,
    records: &[RawSupervisionRecord],
) -> Result<ReconciliationOutput<'a>> {
    let pipeline = ReconciliationPipeline::new(registry, config)?;
    Ok(pipeline.process(records))
}
