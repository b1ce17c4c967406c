//! Location label → branch resolution.
//!
//! Rules, in priority order:
//!
//! 1. Manual override table (`manual`)
//! 2. Leading branch number, e.g. `"4 - Santa Catarina"` (`automatic`)
//! 3. Branch name with the `"<n> - "` / `"Sucursal <code> - "` prefix stripped: exact name
//!    first, then substring containment either way (`automatic`)
//! 4. Otherwise `unmapped`
//!
//! Name rules scan the registry by ascending branch number and take the first candidate;
//! any further candidates are reported so ambiguous labels can be reviewed.

use crate::error::Result;
use crate::overrides::{ManualOverride, OverrideTable};
use crate::registry::BranchRegistry;
use crate::schema::{Branch, MatchResult, MatchRule};
use crate::utils::{extract_leading_number, match_key, strip_label_prefix};
use log::{debug, warn};
use std::collections::HashMap;

/// A resolved label together with the rule that resolved it and any other branches it
/// could also have meant.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome<'a> {
    pub result: MatchResult<'a>,
    pub rule: Option<MatchRule>,
    pub ambiguous_with: Vec<u32>,
}

impl<'a> MatchOutcome<'a> {
    fn resolved(result: MatchResult<'a>, rule: MatchRule) -> Self {
        Self {
            result,
            rule: Some(rule),
            ambiguous_with: Vec::new(),
        }
    }

    fn unmapped() -> Self {
        Self {
            result: MatchResult::unmapped(),
            rule: None,
            ambiguous_with: Vec::new(),
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        !self.ambiguous_with.is_empty()
    }
}

/// Registry plus validated overrides. Built once per run and shared by reference.
#[derive(Debug)]
pub struct MatcherContext<'a> {
    registry: &'a BranchRegistry,
    overrides: OverrideTable,
    name_index: Vec<(String, &'a Branch)>,
}

impl<'a> MatcherContext<'a> {
    /// Fails when an override targets a branch missing from the registry or two
    /// overrides disagree on the same pattern.
    pub fn new(registry: &'a BranchRegistry, overrides: &[ManualOverride]) -> Result<Self> {
        let overrides = OverrideTable::new(overrides, registry)?;
        let name_index = registry
            .iter()
            .map(|b| (match_key(&b.display_name), b))
            .filter(|(key, _)| !key.is_empty())
            .collect();

        Ok(Self {
            registry,
            overrides,
            name_index,
        })
    }

    pub fn registry(&self) -> &'a BranchRegistry {
        self.registry
    }

    pub fn match_label(&self, label: &str) -> MatchResult<'a> {
        self.resolve(label).result
    }

    pub fn resolve(&self, label: &str) -> MatchOutcome<'a> {
        if let Some(branch) = self
            .overrides
            .lookup(label)
            .and_then(|number| self.registry.get(number))
        {
            return MatchOutcome::resolved(MatchResult::manual(branch), MatchRule::Override);
        }

        if let Some(branch) = extract_leading_number(label).and_then(|n| self.registry.get(n)) {
            return MatchOutcome::resolved(MatchResult::automatic(branch), MatchRule::BranchNumber);
        }

        let name_key = match_key(strip_label_prefix(label));
        if name_key.is_empty() {
            return MatchOutcome::unmapped();
        }

        let exact: Vec<&'a Branch> = self
            .name_index
            .iter()
            .filter(|(key, _)| *key == name_key)
            .map(|(_, b)| *b)
            .collect();
        if let Some(outcome) = first_candidate(&exact, MatchRule::ExactName) {
            return outcome;
        }

        let partial: Vec<&'a Branch> = self
            .name_index
            .iter()
            .filter(|(key, _)| key.contains(&name_key) || name_key.contains(key.as_str()))
            .map(|(_, b)| *b)
            .collect();
        if let Some(outcome) = first_candidate(&partial, MatchRule::NameSubstring) {
            return outcome;
        }

        MatchOutcome::unmapped()
    }
}

fn first_candidate<'a>(candidates: &[&'a Branch], rule: MatchRule) -> Option<MatchOutcome<'a>> {
    let (first, rest) = candidates.split_first()?;
    let mut outcome = MatchOutcome::resolved(MatchResult::automatic(first), rule);
    outcome.ambiguous_with = rest.iter().map(|b| b.number).collect();
    Some(outcome)
}

/// Memoizing front end over a [`MatcherContext`] for one batch run.
pub struct LocationMatcher<'c, 'a> {
    context: &'c MatcherContext<'a>,
    cache: HashMap<String, MatchOutcome<'a>>,
    lookups: usize,
}

impl<'c, 'a> LocationMatcher<'c, 'a> {
    pub fn new(context: &'c MatcherContext<'a>) -> Self {
        Self {
            context,
            cache: HashMap::new(),
            lookups: 0,
        }
    }

    pub fn resolve(&mut self, label: &str) -> MatchOutcome<'a> {
        self.lookups += 1;
        if let Some(hit) = self.cache.get(label) {
            return hit.clone();
        }

        let outcome = self.context.resolve(label);
        if outcome.is_ambiguous() {
            warn!(
                "Ambiguous location label '{}': chose branch {:?}, also matches {:?}",
                label,
                outcome.result.branch_number(),
                outcome.ambiguous_with
            );
        } else if !outcome.result.is_mapped() {
            debug!("Location label '{}' is unmapped", label);
        }

        self.cache.insert(label.to_string(), outcome.clone());
        outcome
    }

    pub fn distinct_labels(&self) -> usize {
        self.cache.len()
    }

    pub fn lookups(&self) -> usize {
        self.lookups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::renamed_branch_overrides;
    use crate::schema::Provenance;

    fn branch(number: u32, name: &str) -> Branch {
        Branch {
            number,
            display_name: name.to_string(),
            operating_group: "TEPEYAC".to_string(),
            city: "Monterrey".to_string(),
            state: "Nuevo León".to_string(),
            latitude: 25.7,
            longitude: -100.3,
        }
    }

    fn registry() -> BranchRegistry {
        BranchRegistry::new(vec![
            branch(1, "Pino Suarez"),
            branch(3, "Garcia Centro"),
            branch(4, "Santa Catarina"),
            branch(6, "Garcia"),
            branch(7, "La Huasteca"),
            branch(12, "Concordia"),
        ])
        .unwrap()
    }

    #[test]
    fn test_leading_number_wins_regardless_of_text() {
        let registry = registry();
        let ctx = MatcherContext::new(&registry, &[]).unwrap();

        let result = ctx.match_label("4 - Santa Catarina");
        assert_eq!(result.branch_number(), Some(4));
        assert_eq!(result.provenance(), Provenance::Automatic);

        let result = ctx.match_label("12 - Some Old Name");
        assert_eq!(result.branch_number(), Some(12));
    }

    #[test]
    fn test_override_beats_number_rule() {
        let registry = registry();
        let overrides = vec![ManualOverride::exact("4 - Santa Catarina", 6)];
        let ctx = MatcherContext::new(&registry, &overrides).unwrap();

        let outcome = ctx.resolve("4 - Santa Catarina");
        assert_eq!(outcome.result.branch_number(), Some(6));
        assert_eq!(outcome.result.provenance(), Provenance::Manual);
        assert_eq!(outcome.rule, Some(MatchRule::Override));
    }

    #[test]
    fn test_renamed_branch_resolves_manually() {
        let registry = registry();
        let ctx = MatcherContext::new(&registry, &renamed_branch_overrides()).unwrap();

        let result = ctx.match_label("Sucursal GC - Garcia");
        assert_eq!(result.branch_number(), Some(6));
        assert_eq!(result.provenance(), Provenance::Manual);
    }

    #[test]
    fn test_name_fallback_strips_prefix() {
        let registry = registry();
        let ctx = MatcherContext::new(&registry, &[]).unwrap();

        let outcome = ctx.resolve("Sucursal PS - Pino Suárez");
        assert_eq!(outcome.result.branch_number(), Some(1));
        assert_eq!(outcome.rule, Some(MatchRule::ExactName));

        let outcome = ctx.resolve("99 - Concordia Norte");
        assert_eq!(outcome.result.branch_number(), Some(12));
        assert_eq!(outcome.rule, Some(MatchRule::NameSubstring));
    }

    #[test]
    fn test_exact_name_preferred_over_earlier_substring() {
        let registry = registry();
        let ctx = MatcherContext::new(&registry, &[]).unwrap();

        let outcome = ctx.resolve("Garcia");
        assert_eq!(outcome.result.branch_number(), Some(6));
        assert!(!outcome.is_ambiguous());
    }

    #[test]
    fn test_ambiguous_substring_takes_lowest_number() {
        let registry = registry();
        let ctx = MatcherContext::new(&registry, &[]).unwrap();

        // contains both "garcia centro" (3) and "garcia" (6)
        let outcome = ctx.resolve("Plaza Garcia Centro");
        assert_eq!(outcome.result.branch_number(), Some(3));
        assert_eq!(outcome.ambiguous_with, vec![6]);
    }

    #[test]
    fn test_unknown_label_is_unmapped() {
        let registry = registry();
        let ctx = MatcherContext::new(&registry, &[]).unwrap();

        let result = ctx.match_label("99 - Unknown Place");
        assert!(result.branch().is_none());
        assert_eq!(result.provenance(), Provenance::Unmapped);

        assert!(!ctx.match_label("").is_mapped());
        assert!(!ctx.match_label("   ").is_mapped());
        assert!(!ctx.match_label("Sucursal XX - ").is_mapped());
    }

    #[test]
    fn test_every_display_name_resolves_to_itself() {
        let registry = registry();
        let ctx = MatcherContext::new(&registry, &renamed_branch_overrides()).unwrap();

        for b in registry.iter() {
            let result = ctx.match_label(&b.display_name);
            assert_eq!(result.branch_number(), Some(b.number), "label {}", b.display_name);
            assert_ne!(result.provenance(), Provenance::Unmapped);
        }
    }

    #[test]
    fn test_matching_is_deterministic() {
        let registry = registry();
        let ctx = MatcherContext::new(&registry, &renamed_branch_overrides()).unwrap();

        for label in [
            "Plaza Garcia Centro",
            "4 - Santa Catarina",
            "nowhere",
            "Sucursal LH - La Huasteca",
        ] {
            assert_eq!(ctx.resolve(label), ctx.resolve(label));
        }
    }

    #[test]
    fn test_location_matcher_caches_by_label() {
        let registry = registry();
        let ctx = MatcherContext::new(&registry, &[]).unwrap();
        let mut matcher = LocationMatcher::new(&ctx);

        let first = matcher.resolve("4 - Santa Catarina");
        let second = matcher.resolve("4 - Santa Catarina");
        matcher.resolve("7 - La Huasteca");

        assert_eq!(first, second);
        assert_eq!(matcher.distinct_labels(), 2);
        assert_eq!(matcher.lookups(), 3);
    }

    #[test]
    fn test_unknown_override_target_fails_context_construction() {
        let registry = registry();
        let overrides = vec![ManualOverride::exact("Sucursal ZZ - Lost", 404)];
        assert!(MatcherContext::new(&registry, &overrides).is_err());
    }
}
