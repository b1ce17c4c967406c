//! Advisory geographic review of unmapped labels.
//!
//! Suggestions are for human review only. Nothing here assigns a branch.

use crate::schema::{Branch, EnrichedRecord};
use crate::utils::degree_distance;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

pub const DEFAULT_PROXIMITY_THRESHOLD_DEGREES: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProximitySuggestion {
    pub location_label: String,
    pub nearest_branch_number: u32,
    pub nearest_branch_name: String,
    pub operating_group: String,
    pub distance_degrees: f64,
    /// 1.0 at zero distance, falling linearly to 0.0 at the threshold.
    pub confidence: f64,
}

struct Anchor<'a> {
    coordinates: (f64, f64),
    branch: &'a Branch,
}

/// For each distinct unmapped label with coordinates, the nearest matched record within
/// `threshold` degrees. Sorted by label.
pub fn suggest_nearby_groups(
    records: &[EnrichedRecord<'_>],
    threshold: f64,
) -> Vec<ProximitySuggestion> {
    let anchors = collect_anchors(records);
    if anchors.is_empty() {
        return Vec::new();
    }

    let mut best: BTreeMap<&str, (f64, &Branch)> = BTreeMap::new();

    for record in records.iter().filter(|r| !r.match_result.is_mapped()) {
        let Some(position) = record.record.coordinates() else {
            continue;
        };

        for anchor in &anchors {
            let distance = degree_distance(position, anchor.coordinates);
            if distance > threshold {
                continue;
            }

            let label = record.record.location_label.as_str();
            let closer = match best.get(label) {
                Some((d, b)) => {
                    distance < *d || (distance == *d && anchor.branch.number < b.number)
                }
                None => true,
            };
            if closer {
                best.insert(label, (distance, anchor.branch));
            }
        }
    }

    best.into_iter()
        .map(|(label, (distance, branch))| ProximitySuggestion {
            location_label: label.to_string(),
            nearest_branch_number: branch.number,
            nearest_branch_name: branch.display_name.clone(),
            operating_group: branch.operating_group.clone(),
            distance_degrees: distance,
            confidence: proximity_confidence(distance, threshold),
        })
        .collect()
}

pub fn proximity_confidence(distance: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 0.0;
    }
    (1.0 - distance / threshold).clamp(0.0, 1.0)
}

/// Coordinates of every matched record: its own position when recorded, otherwise its
/// branch's registry position.
fn collect_anchors<'a>(records: &[EnrichedRecord<'a>]) -> Vec<Anchor<'a>> {
    let mut seen: HashSet<(u32, u64, u64)> = HashSet::new();
    let mut anchors = Vec::new();

    for record in records {
        let Some(branch) = record.match_result.branch() else {
            continue;
        };
        let coordinates = record
            .record
            .coordinates()
            .unwrap_or_else(|| branch.coordinates());

        if seen.insert((branch.number, coordinates.0.to_bits(), coordinates.1.to_bits())) {
            anchors.push(Anchor {
                coordinates,
                branch,
            });
        }
    }

    anchors
}
