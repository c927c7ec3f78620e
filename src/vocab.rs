//! Namespaces used when modelling readings.

pub const SSN: &str = "http://purl.oclc.org/NET/ssnx/ssn#";
pub const SK: &str = "http://purl.oclc.org/NET/ssnx/product/smart-knife#";
pub const METEO: &str = "https://www.w3.org/2005/Incubator/ssn/ssnx/meteo/aws#";
pub const FS: &str = "https://raw.githubusercontent.com/m-markovic/FS-PROV-Ontology/master/fso#";
pub const FS_EXT: &str =
    "https://raw.githubusercontent.com/m-markovic/FS-PROV-Ontology/master/fso_extended#";

/// Base of every individual minted by the modeller.
pub const BASE: &str = "http://FoodSafety/";

/// Spelled as in the published meteo ontology.
pub const TEMPERATURE_SENSOR: &str = "TmeperatureSensor";

pub fn ssn(local: &str) -> String {
    format!("{SSN}{local}")
}

pub fn sk(local: &str) -> String {
    format!("{SK}{local}")
}

pub fn meteo(local: &str) -> String {
    format!("{METEO}{local}")
}

pub fn fs(local: &str) -> String {
    format!("{FS}{local}")
}

pub fn fs_ext(local: &str) -> String {
    format!("{FS_EXT}{local}")
}
