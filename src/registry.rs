use crate::error::{ReconciliationError, Result};
use crate::schema::Branch;
use crate::utils::{collapse_whitespace, match_key};
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::Path;

/// State spellings seen in the registry and supervision exports, keyed by match key.
const STATE_ALIASES: &[(&str, &str)] = &[
    ("michoacan de ocampo", "Michoacán"),
    ("coahuila de zaragoza", "Coahuila"),
    ("estado de mexico", "México"),
    ("nuevo leon", "Nuevo León"),
];

/// Maps known long-form or unaccented state names to their canonical spelling.
pub fn normalize_state(state: &str) -> String {
    let key = match_key(state);
    STATE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| collapse_whitespace(state))
}

/// The canonical branch list. Immutable once built; iteration is by ascending number.
#[derive(Debug, Clone, Default)]
pub struct BranchRegistry {
    branches: BTreeMap<u32, Branch>,
}

impl BranchRegistry {
    pub fn new(branches: Vec<Branch>) -> Result<Self> {
        let mut map = BTreeMap::new();

        for mut branch in branches {
            validate_branch(&branch)?;
            branch.display_name = collapse_whitespace(&branch.display_name);
            branch.state = normalize_state(&branch.state);

            let number = branch.number;
            if map.insert(number, branch).is_some() {
                return Err(ReconciliationError::DuplicateBranchNumber(number));
            }
        }

        info!("Loaded branch registry with {} branches", map.len());
        Ok(Self { branches: map })
    }

    /// Reads a registry CSV with a header row. English and source (Spanish) column
    /// names are both accepted.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut branches = Vec::new();
        for row in csv_reader.deserialize() {
            let branch: Branch = row?;
            branches.push(branch);
        }
        debug!("Parsed {} registry rows from CSV", branches.len());
        Self::new(branches)
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    pub fn get(&self, number: u32) -> Option<&Branch> {
        self.branches.get(&number)
    }

    pub fn contains(&self, number: u32) -> bool {
        self.branches.contains_key(&number)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Branch> {
        self.branches.values()
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn operating_groups(&self) -> BTreeSet<&str> {
        self.branches
            .values()
            .map(|b| b.operating_group.as_str())
            .collect()
    }
}

fn validate_branch(branch: &Branch) -> Result<()> {
    if branch.number == 0 {
        return Err(ReconciliationError::InvalidRegistry(format!(
            "Branch '{}' has number 0; branch numbers must be positive",
            branch.display_name
        )));
    }

    if branch.display_name.trim().is_empty() {
        return Err(ReconciliationError::InvalidRegistry(format!(
            "Branch {} has an empty display name",
            branch.number
        )));
    }

    if !branch.latitude.is_finite() || !(-90.0..=90.0).contains(&branch.latitude) {
        return Err(ReconciliationError::InvalidRegistry(format!(
            "Branch {} has latitude {} outside [-90, 90]",
            branch.number, branch.latitude
        )));
    }

    if !branch.longitude.is_finite() || !(-180.0..=180.0).contains(&branch.longitude) {
        return Err(ReconciliationError::InvalidRegistry(format!(
            "Branch {} has longitude {} outside [-180, 180]",
            branch.number, branch.longitude
        )));
    }

    Ok(())
}
