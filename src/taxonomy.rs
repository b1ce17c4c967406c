use crate::schema::AreaCategory;
use crate::utils::collapse_whitespace;
use std::collections::BTreeSet;
use unicode_normalization::UnicodeNormalization;

/// The catalogued inspection areas, as labelled in the supervision source.
pub const DEFAULT_PRINCIPAL_AREAS: &[&str] = &[
    "ALMACEN GENERAL",
    "ALMACEN QUÍMICOS",
    "ASADORES",
    "AVISO DE FUNCIONAMIENTO, BITACORAS, CARPETA DE FUMIGACION CONTROL",
    "AREA COCINA FRIA/CALIENTE",
    "BARRA DE SERVICIO",
    "COMEDOR",
    "CONGELADOR PAPA",
    "CUARTO FRIO 1",
    "EXTERIOR SUCURSAL",
    "FREIDORA DE PAPA",
    "REFRIGERADORES DE SERVICIO",
    "TIEMPOS DE SERVICIO",
    "BARRA DE SALSAS",
    "BAÑO CLIENTES",
    "DISPENSADOR DE REFRESCOS",
    "ESTACION DE LAVADO DE MANOS",
    "MAQUINA DE HIELO",
    "CONSERVADOR PAPA FRITA",
    "ALMACEN JARABES",
    "AREA COCINA FRIA/CALIENTE  CALIFICACIÓN",
    "Area Marinado",
    "Area Marinado Calificación Porcentaje %",
    "COMEDOR AREA COMEDOR",
    "CUARTO FRIO 1 CALIFICACION",
    "ESTACION DE LAVADO DE MANOS CALIFICACION %",
    "DISPENSADOR REFRESCOS",
    "BAÑO DE EMPLEADOS",
    "CAJAS DE TOTOPO EMPACADO",
];

/// Trim, collapse inner whitespace, compose to NFC and uppercase an area label.
pub fn normalize_area_label(label: &str) -> String {
    collapse_whitespace(label)
        .nfc()
        .collect::<String>()
        .to_uppercase()
}

/// Closed allow-list of principal evaluation areas. Anything else is secondary.
#[derive(Debug, Clone)]
pub struct AreaTaxonomy {
    principal: BTreeSet<String>,
}

impl Default for AreaTaxonomy {
    fn default() -> Self {
        Self::new(DEFAULT_PRINCIPAL_AREAS)
    }
}

impl AreaTaxonomy {
    pub fn new<S: AsRef<str>>(principal_areas: &[S]) -> Self {
        let principal = principal_areas
            .iter()
            .map(|a| normalize_area_label(a.as_ref()))
            .filter(|a| !a.is_empty())
            .collect();
        Self { principal }
    }

    /// Accepts `&str` or `Option<&str>`; a missing label is the visit's aggregate row.
    pub fn classify<'s>(&self, label: impl Into<Option<&'s str>>) -> AreaCategory {
        match label.into() {
            Some(l) if self.principal.contains(&normalize_area_label(l)) => AreaCategory::Principal,
            _ => AreaCategory::Secondary,
        }
    }

    pub fn is_principal(&self, label: &str) -> bool {
        self.classify(label) == AreaCategory::Principal
    }

    pub fn len(&self) -> usize {
        self.principal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.principal.is_empty()
    }

    pub fn principal_areas(&self) -> impl Iterator<Item = &str> {
        self.principal.iter().map(String::as_str)
    }
}
