//! Clinical-significance classification.

use std::fmt;

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Canonical clinical-significance categories, with a free-text fallback
/// for vocabulary the upstreams invent faster than anyone standardizes it.
///
/// Serializes as the canonical lower-case label ("likely_pathogenic", ...);
/// the fallback serializes as its normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClinicalSignificance {
    Pathogenic,
    LikelyPathogenic,
    Benign,
    LikelyBenign,
    UncertainSignificance,
    ConflictingInterpretations,
    Other(String),
}

/// Ordered substring mappings; more specific phrases must come before the
/// bare terms they contain ("likely pathogenic" before "pathogenic").
const MAPPINGS: &[(&str, ClinicalSignificance)] = &[
    ("likely pathogenic", ClinicalSignificance::LikelyPathogenic),
    ("likely_pathogenic", ClinicalSignificance::LikelyPathogenic),
    ("likely benign", ClinicalSignificance::LikelyBenign),
    ("likely_benign", ClinicalSignificance::LikelyBenign),
    ("uncertain significance", ClinicalSignificance::UncertainSignificance),
    ("uncertain_significance", ClinicalSignificance::UncertainSignificance),
    ("vus", ClinicalSignificance::UncertainSignificance),
    (
        "conflicting interpretations",
        ClinicalSignificance::ConflictingInterpretations,
    ),
    ("conflicting", ClinicalSignificance::ConflictingInterpretations),
    ("pathogenic", ClinicalSignificance::Pathogenic),
    ("benign", ClinicalSignificance::Benign),
];

impl ClinicalSignificance {
    /// Normalize free upstream text to a canonical category, checking the
    /// most specific phrases first. Unrecognized text falls back to the
    /// lower-cased input with spaces replaced by underscores, so novel
    /// vocabulary still lands in the store in a consistent shape.
    pub fn from_text(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();

        for (needle, canonical) in MAPPINGS {
            if lowered.contains(needle) {
                return canonical.clone();
            }
        }

        ClinicalSignificance::Other(lowered.replace(' ', "_"))
    }

    /// The exact canonical label, used when a value round-trips through
    /// the store.
    pub fn from_label(label: &str) -> Self {
        match label {
            "pathogenic" => ClinicalSignificance::Pathogenic,
            "likely_pathogenic" => ClinicalSignificance::LikelyPathogenic,
            "benign" => ClinicalSignificance::Benign,
            "likely_benign" => ClinicalSignificance::LikelyBenign,
            "uncertain_significance" => ClinicalSignificance::UncertainSignificance,
            "conflicting_interpretations" => ClinicalSignificance::ConflictingInterpretations,
            other => ClinicalSignificance::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ClinicalSignificance::Pathogenic => "pathogenic",
            ClinicalSignificance::LikelyPathogenic => "likely_pathogenic",
            ClinicalSignificance::Benign => "benign",
            ClinicalSignificance::LikelyBenign => "likely_benign",
            ClinicalSignificance::UncertainSignificance => "uncertain_significance",
            ClinicalSignificance::ConflictingInterpretations => "conflicting_interpretations",
            ClinicalSignificance::Other(text) => text,
        }
    }
}

impl fmt::Display for ClinicalSignificance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ClinicalSignificance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ClinicalSignificance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ClinicalSignificance::from_label(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Pathogenic", "pathogenic")]
    #[case("Likely pathogenic", "likely_pathogenic")]
    #[case("Benign", "benign")]
    #[case("Likely benign", "likely_benign")]
    #[case("Uncertain significance", "uncertain_significance")]
    #[case("VUS", "uncertain_significance")]
    #[case("Conflicting interpretations of pathogenicity", "conflicting_interpretations")]
    #[case("Pathogenic/Likely pathogenic", "likely_pathogenic")]
    #[case("Some Other Value", "some_other_value")]
    #[case("  benign  ", "benign")]
    fn normalizes_free_text(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(ClinicalSignificance::from_text(raw).as_str(), expected);
    }

    #[test]
    fn unknown_text_becomes_the_fallback_variant() {
        let sig = ClinicalSignificance::from_text("Drug Response");
        assert_eq!(sig, ClinicalSignificance::Other("drug_response".to_string()));
    }

    #[test]
    fn serializes_as_canonical_label() {
        let json = serde_json::to_string(&ClinicalSignificance::LikelyPathogenic).unwrap();
        assert_eq!(json, "\"likely_pathogenic\"");

        let back: ClinicalSignificance = serde_json::from_str("\"likely_pathogenic\"").unwrap();
        assert_eq!(back, ClinicalSignificance::LikelyPathogenic);
    }

    #[test]
    fn round_trips_the_fallback() {
        let back: ClinicalSignificance = serde_json::from_str("\"drug_response\"").unwrap();
        assert_eq!(back, ClinicalSignificance::Other("drug_response".to_string()));
    }
}
