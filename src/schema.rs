use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A canonical branch from the registry. `number` is the only reliable join key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Branch {
    #[serde(alias = "numero_sucursal")]
    #[schemars(description = "Registry number of the branch. Positive, unique and never reused.")]
    pub number: u32,

    #[serde(alias = "nombre_sucursal")]
    #[schemars(description = "Display name of the branch as it appears in the registry (e.g. 'Santa Catarina').")]
    pub display_name: String,

    #[serde(alias = "grupo_operativo")]
    #[schemars(description = "Operating group that runs the branch (e.g. 'TEPEYAC', 'GRUPO SALTILLO').")]
    pub operating_group: String,

    #[serde(alias = "ciudad")]
    pub city: String,

    #[serde(alias = "estado")]
    pub state: String,

    #[serde(alias = "lat", alias = "latitud")]
    #[schemars(description = "Latitude in decimal degrees.")]
    pub latitude: f64,

    #[serde(alias = "lng", alias = "longitud")]
    #[schemars(description = "Longitude in decimal degrees.")]
    pub longitude: f64,
}

impl Branch {
    pub fn coordinates(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// One area row of a supervision visit, as delivered by the supervision source.
///
/// Rows sharing a `submission_id` belong to one visit to one branch on one date. A row
/// with no `area_label` carries the overall score of the visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSupervisionRecord {
    pub submission_id: String,

    #[serde(alias = "location_name")]
    pub location_label: String,

    /// Kept as delivered; parsed during enrichment so malformed dates stay visible.
    #[serde(alias = "fecha_supervision")]
    pub evaluation_date: String,

    #[serde(default, alias = "area_evaluacion")]
    pub area_label: Option<String>,

    #[serde(default, alias = "puntos_maximos")]
    pub points_max: Option<f64>,

    #[serde(default, alias = "puntos_obtenidos")]
    pub points_obtained: Option<f64>,

    #[serde(default, alias = "porcentaje")]
    pub percentage: Option<f64>,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,
}

impl RawSupervisionRecord {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some((lat, lng)),
            _ => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Resolved by leading branch number or by branch name
    Automatic,
    /// Resolved through the manual override table
    Manual,
    /// No rule resolved the label
    Unmapped,
}

/// Which rule produced a match. Diagnostic detail on top of [`Provenance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Override,
    BranchNumber,
    ExactName,
    NameSubstring,
}

/// Outcome of matching one location label against the registry.
///
/// `provenance` is `Unmapped` exactly when there is no branch; the constructors are the
/// only way to build one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchResult<'a> {
    branch: Option<&'a Branch>,
    provenance: Provenance,
    confidence: Option<f64>,
}

impl<'a> MatchResult<'a> {
    pub fn automatic(branch: &'a Branch) -> Self {
        Self {
            branch: Some(branch),
            provenance: Provenance::Automatic,
            confidence: None,
        }
    }

    pub fn manual(branch: &'a Branch) -> Self {
        Self {
            branch: Some(branch),
            provenance: Provenance::Manual,
            confidence: None,
        }
    }

    pub fn unmapped() -> Self {
        Self {
            branch: None,
            provenance: Provenance::Unmapped,
            confidence: None,
        }
    }

    /// Attaches an advisory proximity confidence. Only unmapped results carry one; the
    /// branch and provenance are left untouched.
    pub fn with_proximity_confidence(mut self, confidence: f64) -> Self {
        if self.provenance == Provenance::Unmapped {
            self.confidence = Some(confidence.clamp(0.0, 1.0));
        }
        self
    }

    pub fn branch(&self) -> Option<&'a Branch> {
        self.branch
    }

    pub fn branch_number(&self) -> Option<u32> {
        self.branch.map(|b| b.number)
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn is_mapped(&self) -> bool {
        self.branch.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BranchCategory {
    #[schemars(description = "Local branch, inspected quarterly")]
    Local,
    #[schemars(description = "Foreign branch, inspected semiannually")]
    Foreign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaCategory {
    Principal,
    Secondary,
}

/// Why a record was left out of period classification or aggregate statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum RecordIssue {
    MalformedDate { raw: String },
    MalformedPercentage { value: f64 },
}

/// A supervision row with its match, cadence category, period and area category attached.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedRecord<'a> {
    pub record: RawSupervisionRecord,
    pub evaluation_date: Option<NaiveDate>,
    pub match_result: MatchResult<'a>,
    pub match_rule: Option<MatchRule>,
    /// Other branch numbers the label matched by name, when the match was ambiguous.
    pub ambiguous_with: Vec<u32>,
    pub branch_category: BranchCategory,
    /// `None` when the row has any issue: it is left out of period classification.
    pub period_label: Option<String>,
    pub area_category: AreaCategory,
    pub issues: Vec<RecordIssue>,
}

impl EnrichedRecord<'_> {
    pub fn is_excluded(&self) -> bool {
        !self.issues.is_empty()
    }

    /// A row that counts as inspection evidence for its branch.
    pub fn counts_toward_coverage(&self) -> bool {
        self.match_result.is_mapped()
            && self.area_category == AreaCategory::Principal
            && !self.is_excluded()
    }
}
