use serde::{Deserialize, Serialize};

use crate::significance::ClinicalSignificance;

/// Placeholder allele for the side of an indel with no base.
pub const GAP: char = '-';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantKind {
    #[serde(rename = "SNP")]
    Snp,
    #[serde(rename = "insertion")]
    Insertion,
    #[serde(rename = "deletion")]
    Deletion,
}

/// A variant called from a pairwise alignment.
///
/// `position` is the 1-based reference coordinate. For insertions the
/// reference allele is [`GAP`] and the position is that of the next
/// reference base; for deletions the alternate allele is [`GAP`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub chromosome: String,
    pub position: u64,
    pub reference_allele: String,
    pub alternate_allele: String,
    #[serde(rename = "variantType")]
    pub kind: VariantKind,
}

/// A variant enriched with functional and clinical annotation.
///
/// Every annotation field is optional: an upstream that returned nothing, or
/// failed, simply leaves its fields unset. Serialized in camelCase to match
/// the store's variant columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedVariant {
    #[serde(flatten)]
    pub variant: Variant,
    pub rs_id: Option<String>,
    pub hgvs_notation: Option<String>,
    pub gene_symbol: Option<String>,
    pub consequence: Option<String>,
    pub clinical_significance: Option<ClinicalSignificance>,
    pub population_frequency: Option<f64>,
    pub cadd_score: Option<f64>,
    pub sift_prediction: Option<String>,
    pub polyphen_prediction: Option<String>,
}

impl AnnotatedVariant {
    /// Annotation carrying only the original variant fields. Used when every
    /// enrichment source failed or was skipped.
    pub fn minimal(variant: &Variant) -> Self {
        AnnotatedVariant {
            variant: variant.clone(),
            rs_id: None,
            hgvs_notation: None,
            gene_symbol: None,
            consequence: None,
            clinical_significance: None,
            population_frequency: None,
            cadd_score: None,
            sift_prediction: None,
            polyphen_prediction: None,
        }
    }

    pub fn is_minimal(&self) -> bool {
        self.rs_id.is_none()
            && self.hgvs_notation.is_none()
            && self.gene_symbol.is_none()
            && self.consequence.is_none()
            && self.clinical_significance.is_none()
            && self.population_frequency.is_none()
            && self.cadd_score.is_none()
            && self.sift_prediction.is_none()
            && self.polyphen_prediction.is_none()
    }
}
