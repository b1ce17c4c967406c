use std::env;
use std::error::Error;
use supervision_reconciler::{
    read_supervision_csv, read_supervision_csv_path, reconcile, BranchRegistry,
    ReconciliationConfig,
};

const DEMO_REGISTRY: &str = "\
numero_sucursal,nombre_sucursal,grupo_operativo,ciudad,estado,latitud,longitud
1,Pino Suarez,OGAS,Monterrey,Nuevo León,25.6722,-100.3089
4,Santa Catarina,TEPEYAC,Santa Catarina,Nuevo León,25.6733,-100.4581
6,Garcia,TEPEYAC,García,Nuevo León,25.8094,-100.5897
7,La Huasteca,TEPEYAC,Santa Catarina,Nuevo León,25.6601,-100.4766
52,Saltillo Centro,GRUPO SALTILLO,Saltillo,Coahuila,25.4232,-100.9925
76,Aeropuerto,RAP,Reynosa,Tamaulipas,26.0089,-98.2284
";

const DEMO_SUPERVISIONS: &str = "\
submission_id,location_name,fecha_supervision,area_evaluacion,porcentaje,latitude,longitude
s-1,4 - Santa Catarina,2025-10-15,ASADORES,90,,
s-1,4 - Santa Catarina,2025-10-15,,90,,
s-2,Sucursal GC - Garcia,2025-10-16,COMEDOR,82,,
s-3,Sucursal LH - La Huasteca,2025-10-18,BARRA DE SALSAS,96,,
s-4,52 - Saltillo Centro,2025-08-02,EXTERIOR SUCURSAL,88,,
s-5,99 - Unknown Place,2025-10-17,ASADORES,70,,
s-6,Tienda Provisional,2025-10-20,ASADORES,85,25.68,-100.45
";

/// Usage: `cargo run --example coverage_report [registry.csv supervisions.csv [config.json]]`
///
/// Without arguments a small built-in data set is used.
fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().skip(1).collect();

    let (registry, records) = match args.as_slice() {
        [registry_path, records_path, ..] => (
            BranchRegistry::from_csv_path(registry_path)?,
            read_supervision_csv_path(records_path)?,
        ),
        _ => (
            BranchRegistry::from_csv_reader(DEMO_REGISTRY.as_bytes())?,
            read_supervision_csv(DEMO_SUPERVISIONS.as_bytes())?,
        ),
    };

    let config = match args.get(2) {
        Some(path) => ReconciliationConfig::from_json_reader(std::fs::File::open(path)?)?,
        None => ReconciliationConfig::curated(),
    };

    let output = reconcile(&registry, &config, &records)?;

    println!("{}", output.report.to_markdown());

    for record in output.records.iter().filter(|r| r.is_excluded()) {
        println!(
            "excluded: {} '{}' {:?}",
            record.record.submission_id, record.record.location_label, record.issues
        );
    }

    Ok(())
}
