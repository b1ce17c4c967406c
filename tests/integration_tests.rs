use chrono::NaiveDate;
use supervision_reconciler::*;

const REGISTRY_CSV: &str = "\
numero_sucursal,nombre_sucursal,grupo_operativo,ciudad,estado,latitud,longitud
1,Pino Suarez,OGAS,Monterrey,Nuevo Leon,25.6722,-100.3089
4,Santa Catarina,TEPEYAC,Santa Catarina,Nuevo León,25.6733,-100.4581
6,Garcia,TEPEYAC,García,Nuevo León,25.8094,-100.5897
7,La Huasteca,TEPEYAC,Santa Catarina,Nuevo León,25.6601,-100.4766
12,Plaza Garcia,EFM,García,Nuevo León,25.8151,-100.5712
52,Saltillo Centro,GRUPO SALTILLO,Saltillo,Coahuila de Zaragoza,25.4232,-100.9925
57,Monclova,GRUPO SALTILLO,Monclova,Coahuila,26.9103,-101.4222
76,Aeropuerto,RAP,Reynosa,Tamaulipas,26.0089,-98.2284
";

const SUPERVISIONS_CSV: &str = "\
submission_id,location_name,fecha_supervision,area_evaluacion,puntos_maximos,puntos_obtenidos,porcentaje,latitude,longitude
s-100,4 - Santa Catarina,2025-10-15,  asadores  ,10,9,90,,
s-100,4 - Santa Catarina,2025-10-15,PUNTOS MAXIMOS,,,,,
s-100,4 - Santa Catarina,2025-10-15,,,,90,,
s-101,Sucursal GC - Garcia,2025-10-16 08:15:00,COMEDOR,10,8,80,,
s-102,99 - Unknown Place,2025-10-17,ASADORES,10,7,70,,
s-103,Sucursal LH - La Huasteca,2025-10-18,BAÑO CLIENTES,10,10,100,,
s-104,52 - Saltillo Centro,2025-08-02,EXTERIOR SUCURSAL,10,9,95,,
s-105,57 - Monclova,2025-08-02,EXTERIOR SUCURSAL,10,9,92,,
s-106,76 - Aeropuerto,15/10/2025,ASADORES,10,9,90,,
s-107,Tienda Provisional,2025-10-20,ASADORES,10,9,85,25.68,-100.45
s-108,Plaza Garcia Norte,2025-10-21,COMEDOR,10,9,91,,
";

fn registry() -> BranchRegistry {
    BranchRegistry::from_csv_reader(REGISTRY_CSV.as_bytes()).unwrap()
}

fn records() -> Vec<RawSupervisionRecord> {
    read_supervision_csv(SUPERVISIONS_CSV.as_bytes()).unwrap()
}

fn label_row(label: &str) -> RawSupervisionRecord {
    RawSupervisionRecord {
        submission_id: format!("sub-{}", label),
        location_label: label.to_string(),
        evaluation_date: "2025-10-15".to_string(),
        area_label: Some("ASADORES".to_string()),
        points_max: None,
        points_obtained: None,
        percentage: Some(90.0),
        latitude: None,
        longitude: None,
    }
}

#[test]
fn test_numeric_prefix_resolves_automatically() {
    let registry = registry();
    let context = MatcherContext::new(&registry, &[]).unwrap();

    let result = context.match_label("4 - Santa Catarina");
    assert_eq!(result.branch_number(), Some(4));
    assert_eq!(result.provenance(), Provenance::Automatic);
}

#[test]
fn test_renamed_branch_resolves_through_override() {
    let registry = registry();
    let context = MatcherContext::new(&registry, &renamed_branch_overrides()).unwrap();

    let result = context.match_label("Sucursal GC - Garcia");
    assert_eq!(result.branch_number(), Some(6));
    assert_eq!(result.provenance(), Provenance::Manual);
}

#[test]
fn test_unknown_number_is_unmapped() {
    let registry = registry();
    let context = MatcherContext::new(&registry, &renamed_branch_overrides()).unwrap();

    let result = context.match_label("99 - Unknown Place");
    assert_eq!(result.provenance(), Provenance::Unmapped);
    assert!(result.branch().is_none());
}

#[test]
fn test_local_branch_in_fourth_quarter() {
    let registry = registry();
    let pipeline =
        ReconciliationPipeline::new(&registry, &ReconciliationConfig::default()).unwrap();
    let enriched = pipeline.enrich(&[label_row("4 - Santa Catarina")]);

    assert_eq!(enriched[0].branch_category, BranchCategory::Local);
    assert_eq!(enriched[0].period_label.as_deref(), Some("T4-2025"));
}

#[test]
fn test_messy_area_label_is_principal() {
    let taxonomy = AreaTaxonomy::default();
    assert_eq!(taxonomy.classify("  asadores  "), AreaCategory::Principal);
    assert_eq!(taxonomy.classify(""), AreaCategory::Secondary);
    assert_eq!(taxonomy.classify(None::<&str>), AreaCategory::Secondary);
}

#[test]
fn test_every_display_name_resolves_to_itself() {
    let registry = registry();
    let context = MatcherContext::new(&registry, &[]).unwrap();

    for branch in registry.iter() {
        let result = context.match_label(&branch.display_name);
        assert_eq!(
            result.branch_number(),
            Some(branch.number),
            "'{}' did not resolve to its own branch",
            branch.display_name
        );
    }
}

#[test]
fn test_decomposed_labels_resolve_like_composed_ones() {
    let registry = registry();
    let context = MatcherContext::new(&registry, &renamed_branch_overrides()).unwrap();

    let composed = context.match_label("Sucursal GC - García");
    let decomposed = context.match_label("Sucursal GC - Garci\u{301}a");
    assert_eq!(decomposed.branch_number(), Some(6));
    assert_eq!(decomposed, composed);

    let taxonomy = AreaTaxonomy::default();
    assert_eq!(
        taxonomy.classify("ALMACEN QUI\u{301}MICOS"),
        AreaCategory::Principal
    );
}

#[test]
fn test_number_beats_conflicting_name() {
    let registry = registry();
    let context = MatcherContext::new(&registry, &[]).unwrap();

    let outcome = context.resolve("4 - Garcia");
    assert_eq!(outcome.result.branch_number(), Some(4));
    assert_eq!(outcome.rule, Some(MatchRule::BranchNumber));
}

#[test]
fn test_override_beats_automatic_rules() {
    let registry = registry();
    let overrides = vec![ManualOverride::exact("4 - Santa Catarina", 6)];
    let context = MatcherContext::new(&registry, &overrides).unwrap();

    let result = context.match_label("4 - Santa Catarina");
    assert_eq!(result.branch_number(), Some(6));
    assert_eq!(result.provenance(), Provenance::Manual);
}

#[test]
fn test_override_to_missing_branch_fails_loudly() {
    let registry = registry();
    let overrides = vec![ManualOverride::exact("Sucursal XX - Cerrada", 404)];

    let result = MatcherContext::new(&registry, &overrides);
    assert!(matches!(
        result,
        Err(ReconciliationError::UnknownOverrideTarget { target: 404, .. })
    ));
}

#[test]
fn test_ambiguous_name_takes_lowest_number() {
    let registry = registry();
    let context = MatcherContext::new(&registry, &[]).unwrap();

    let outcome = context.resolve("Plaza Garcia Norte");
    assert_eq!(outcome.result.branch_number(), Some(6));
    assert_eq!(outcome.ambiguous_with, vec![12]);
}

#[test]
fn test_matching_is_deterministic() {
    let registry = registry();
    let config = ReconciliationConfig::curated();
    let records = records();

    let first = reconcile(&registry, &config, &records).unwrap();
    let second = reconcile(&registry, &config, &records).unwrap();

    let numbers = |output: &ReconciliationOutput| -> Vec<(Option<u32>, Provenance)> {
        output
            .records
            .iter()
            .map(|r| (r.match_result.branch_number(), r.match_result.provenance()))
            .collect()
    };
    assert_eq!(numbers(&first), numbers(&second));
    assert_eq!(first.report, second.report);
}

#[test]
fn test_classifier_is_total() {
    let calendar = PeriodCalendar::default();
    let dates = [
        NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 10, 8).unwrap(),
        NaiveDate::from_ymd_opt(2030, 6, 15).unwrap(),
    ];
    for date in dates {
        for category in [BranchCategory::Local, BranchCategory::Foreign] {
            assert!(!calendar.classify(date, category).is_empty());
        }
    }
    assert_eq!(
        calendar.classify(dates[0], BranchCategory::Local),
        DEFAULT_FALLBACK_LABEL
    );
}

#[test]
fn test_empty_input_produces_empty_report() {
    let registry = registry();
    let output = reconcile(&registry, &ReconciliationConfig::curated(), &[]).unwrap();

    assert!(output.records.is_empty());
    assert_eq!(output.report.covered_branch_count, 0);
    assert_eq!(output.report.uncovered_branches.len(), registry.len());
    assert!(output.report.unmapped_labels.is_empty());
    assert!(!output.report.has_matched_data());
}

#[test]
fn test_full_run_over_csv_exports() -> anyhow::Result<()> {
    let registry = registry();
    let records = records();
    let output = reconcile(&registry, &ReconciliationConfig::curated(), &records)?;
    let report = &output.report;

    assert_eq!(report.total_records, records.len());

    // 76 only has a row with a malformed date
    let covered: Vec<u32> = report
        .branches
        .iter()
        .filter(|b| b.covered)
        .map(|b| b.number)
        .collect();
    assert_eq!(covered, vec![4, 6, 7, 52, 57]);

    let uncovered: Vec<u32> = report.uncovered_branches.iter().map(|b| b.number).collect();
    assert_eq!(uncovered, vec![1, 12, 76]);

    let santa_catarina = report.branches.iter().find(|b| b.number == 4).unwrap();
    assert_eq!(santa_catarina.principal_rows, 1);
    assert_eq!(santa_catarina.submissions, 1);

    let labels: Vec<&str> = report
        .unmapped_labels
        .iter()
        .map(|u| u.location_label.as_str())
        .collect();
    assert_eq!(labels, vec!["99 - Unknown Place", "Tienda Provisional"]);

    assert_eq!(report.exclusions.malformed_date, 1);
    assert_eq!(report.exclusions.excluded_records, 1);
    assert_eq!(report.provenance_totals.manual, 2);
    assert_eq!(report.ambiguous_labels.len(), 1);
    assert_eq!(report.ambiguous_labels[0].chosen_branch_number, 6);

    // Saltillo follows the local cadence; Monclova is forced foreign
    let saltillo = output
        .records
        .iter()
        .find(|r| r.record.submission_id == "s-104")
        .unwrap();
    assert_eq!(saltillo.period_label.as_deref(), Some("T3-2025"));
    let monclova = output
        .records
        .iter()
        .find(|r| r.record.submission_id == "s-105")
        .unwrap();
    assert_eq!(monclova.period_label.as_deref(), Some("S2-2025"));

    // The provisional store sits a few hundred metres from Santa Catarina
    assert_eq!(report.proximity_suggestions.len(), 1);
    assert_eq!(report.proximity_suggestions[0].nearest_branch_number, 4);
    assert_eq!(report.proximity_suggestions[0].operating_group, "TEPEYAC");

    let provisional = output
        .records
        .iter()
        .find(|r| r.record.submission_id == "s-107")
        .unwrap();
    assert_eq!(provisional.match_result.provenance(), Provenance::Unmapped);
    assert!(provisional.match_result.confidence().is_some());

    let markdown = report.to_markdown();
    assert!(markdown.contains("**Covered branches:** 5 of 8"));
    assert!(markdown.contains("Tienda Provisional"));

    let json = report.to_json()?;
    assert!(json.contains("\"unmapped_labels\""));

    Ok(())
}

#[test]
fn test_registry_normalizes_states() {
    let registry = registry();
    assert_eq!(registry.get(1).unwrap().state, "Nuevo León");
    assert_eq!(registry.get(52).unwrap().state, "Coahuila");

    let groups: Vec<&str> = registry.operating_groups().into_iter().collect();
    assert_eq!(groups, vec!["EFM", "GRUPO SALTILLO", "OGAS", "RAP", "TEPEYAC"]);
}

#[test]
fn test_duplicate_registry_numbers_rejected() {
    let csv = "\
numero_sucursal,nombre_sucursal,grupo_operativo,ciudad,estado,latitud,longitud
4,Santa Catarina,TEPEYAC,Santa Catarina,Nuevo León,25.67,-100.45
4,Santa Catarina Dos,TEPEYAC,Santa Catarina,Nuevo León,25.67,-100.45
";
    let result = BranchRegistry::from_csv_reader(csv.as_bytes());
    assert!(matches!(
        result,
        Err(ReconciliationError::DuplicateBranchNumber(4))
    ));
}

#[test]
fn test_config_round_trips_through_json() -> anyhow::Result<()> {
    let config = ReconciliationConfig::curated();
    let json = serde_json::to_string(&config)?;
    let parsed = ReconciliationConfig::from_json_str(&json)?;
    assert_eq!(parsed, config);

    let schema = ReconciliationConfig::schema_as_json()?;
    assert!(schema.contains("calendar"));
    Ok(())
}
