use crate::error::{ReconciliationError, Result};
use crate::registry::BranchRegistry;
use crate::utils::match_key;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How an override pattern is compared against a location label. Both sides are
/// compared on their match keys (case, whitespace and accents ignored).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// The whole label equals the pattern (e.g. 'Sucursal GC - Garcia').
    #[default]
    Exact,

    /// The label contains the pattern anywhere.
    Contains,
}

/// A hand-curated label → branch mapping for branches renamed in the supervision source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ManualOverride {
    #[schemars(description = "The old location label, or a fragment of it.")]
    pub pattern: String,

    #[schemars(description = "Whether the label must equal the pattern or only contain it. Defaults to exact.")]
    #[serde(default, rename = "match")]
    pub kind: PatternKind,

    #[schemars(description = "Registry number of the branch the label belongs to.")]
    pub target_branch_number: u32,

    #[schemars(description = "Why the override exists (e.g. 'renamed in supervision system').")]
    #[serde(default)]
    pub note: Option<String>,
}

impl ManualOverride {
    pub fn exact(pattern: &str, target_branch_number: u32) -> Self {
        Self {
            pattern: pattern.to_string(),
            kind: PatternKind::Exact,
            target_branch_number,
            note: None,
        }
    }

    pub fn contains(pattern: &str, target_branch_number: u32) -> Self {
        Self {
            pattern: pattern.to_string(),
            kind: PatternKind::Contains,
            target_branch_number,
            note: None,
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

/// The three branches renamed in the supervision source ahead of the registry.
pub fn renamed_branch_overrides() -> Vec<ManualOverride> {
    vec![
        ManualOverride::exact("Sucursal GC - Garcia", 6).with_note("renamed to '6 - Garcia'"),
        ManualOverride::exact("Sucursal LH - La Huasteca", 7)
            .with_note("renamed to '7 - La Huasteca'"),
        ManualOverride::exact("Sucursal SC - Santa Catarina", 4)
            .with_note("renamed to '4 - Santa Catarina'"),
    ]
}

#[derive(Debug, Clone)]
struct CompiledOverride {
    key: String,
    target: u32,
}

/// A validated override table: every target exists and no pattern maps to two branches.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    exact: Vec<CompiledOverride>,
    contains: Vec<CompiledOverride>,
}

impl OverrideTable {
    pub fn new(overrides: &[ManualOverride], registry: &BranchRegistry) -> Result<Self> {
        let mut seen: BTreeMap<String, u32> = BTreeMap::new();
        let mut table = OverrideTable::default();

        for entry in overrides {
            let pattern = entry.pattern.as_str();
            let key = match_key(pattern);

            if key.is_empty() {
                return Err(ReconciliationError::InvalidOverride(format!(
                    "Override targeting branch {} has an empty pattern",
                    entry.target_branch_number
                )));
            }

            if !registry.contains(entry.target_branch_number) {
                return Err(ReconciliationError::UnknownOverrideTarget {
                    pattern: pattern.to_string(),
                    target: entry.target_branch_number,
                });
            }

            if let Some(&previous) = seen.get(&key) {
                if previous != entry.target_branch_number {
                    return Err(ReconciliationError::ConflictingOverride {
                        pattern: pattern.to_string(),
                        first: previous,
                        second: entry.target_branch_number,
                    });
                }
                continue;
            }
            seen.insert(key.clone(), entry.target_branch_number);

            let compiled = CompiledOverride {
                key,
                target: entry.target_branch_number,
            };
            match entry.kind {
                PatternKind::Exact => table.exact.push(compiled),
                PatternKind::Contains => table.contains.push(compiled),
            }
        }

        debug!(
            "Override table ready: {} exact, {} contains",
            table.exact.len(),
            table.contains.len()
        );
        Ok(table)
    }

    /// Target branch number for a label. Exact patterns win over contains patterns;
    /// contains patterns are tried in table order.
    pub fn lookup(&self, label: &str) -> Option<u32> {
        let key = match_key(label);
        if key.is_empty() {
            return None;
        }

        self.exact
            .iter()
            .find(|o| o.key == key)
            .or_else(|| self.contains.iter().find(|o| key.contains(&o.key)))
            .map(|o| o.target)
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.contains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
