//! Protein record types shared by the store and the HTTP surface.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A full row of the `protein_data` table.
///
/// `amino_acid_composition` and `secondary_structure` are stored as JSON text
/// and parsed into mappings on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinRecord {
    /// Unique accession (e.g. `P12345`).
    pub entry: String,
    pub length: i64,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
    #[serde(default)]
    pub organism_id: Option<i64>,
    #[serde(default)]
    pub protein_names: Option<String>,
    pub sequence: String,
    #[serde(default)]
    pub pfam: Option<String>,
    #[serde(default)]
    pub smart: Option<String>,
    #[serde(default)]
    pub amino_acid_composition: BTreeMap<String, f64>,
    #[serde(default)]
    pub avg_hydrophobicity: Option<f64>,
    #[serde(default)]
    pub secondary_structure: BTreeMap<String, f64>,
}

/// The columns returned by the paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinSummary {
    pub entry: String,
    pub length: i64,
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
    pub sequence: String,
    pub pfam: Option<String>,
    pub smart: Option<String>,
    pub avg_hydrophobicity: Option<f64>,
}

/// One residue of the amino-acid composition, with its share of the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueShare {
    pub residue: String,
    pub value: f64,
    pub percent: f64,
}

/// Processed view of a record for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinProfile {
    pub entry: String,
    pub protein_names: Option<String>,
    pub organism_id: Option<i64>,
    pub length: i64,
    pub sequence: String,
    pub avg_hydrophobicity: Option<f64>,
    pub pfam_domains: Vec<String>,
    pub smart_domains: Vec<String>,
    /// Sorted by descending share, ties by residue name.
    pub composition: Vec<ResidueShare>,
    pub secondary_structure: BTreeMap<String, f64>,
    pub observed_days: i64,
}

impl ProteinRecord {
    /// Build the processed profile served by `/get_protein_data/{entry}`.
    pub fn profile(&self) -> ProteinProfile {
        ProteinProfile {
            entry: self.entry.clone(),
            protein_names: self.protein_names.clone(),
            organism_id: self.organism_id,
            length: self.length,
            sequence: self.sequence.clone(),
            avg_hydrophobicity: self.avg_hydrophobicity,
            pfam_domains: split_domains(self.pfam.as_deref()),
            smart_domains: split_domains(self.smart.as_deref()),
            composition: composition_shares(&self.amino_acid_composition),
            secondary_structure: self.secondary_structure.clone(),
            observed_days: (self.last_seen - self.first_seen).num_days(),
        }
    }
}

/// Split a `;`-separated domain annotation (`"PF00001;PF00002;"`).
pub fn split_domains(annotation: Option<&str>) -> Vec<String> {
    annotation
        .unwrap_or("")
        .split(';')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect()
}

fn composition_shares(composition: &BTreeMap<String, f64>) -> Vec<ResidueShare> {
    let total: f64 = composition.values().filter(|v| v.is_finite()).sum();
    let mut shares: Vec<ResidueShare> = composition
        .iter()
        .map(|(residue, &value)| {
            let percent = if total > 0.0 {
                (value / total * 10_000.0).round() / 100.0
            } else {
                0.0
            };
            ResidueShare {
                residue: residue.clone(),
                value,
                percent,
            }
        })
        .collect();
    shares.sort_by(|a, b| {
        b.percent
            .partial_cmp(&a.percent)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.residue.cmp(&b.residue))
    });
    shares
}
