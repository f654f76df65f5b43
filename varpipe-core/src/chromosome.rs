//! Chromosome-label extraction from free-text hit titles.
//!
//! Aligner hit titles are free text ("Homo sapiens chromosome 17, GRCh38
//! reference primary assembly", "...chr17...", or a bare RefSeq accession),
//! so the label is recovered by trying progressively weaker patterns.

use std::sync::LazyLock;

use regex::Regex;

static CHROMOSOME_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)chromosome\s+(\d+|X|Y)").unwrap());
static CHR_ABBREV: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)chr(\d+|X|Y)").unwrap());
static NC_ACCESSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"NC_0000(\d{2})").unwrap());

/// Extract a chromosome label ("chr17", "chrX", ...) from a hit title.
///
/// Tried in priority order: an explicit "chromosome N" phrase, an
/// abbreviated "chrN", then a human RefSeq chromosome accession
/// (NC_000001–NC_000022 map to chr1–chr22, NC_000023 to chrX, NC_000024 to
/// chrY). Returns "unknown" when nothing matches.
pub fn extract_chromosome(title: &str) -> String {
    if let Some(caps) = CHROMOSOME_WORD.captures(title) {
        return format!("chr{}", &caps[1]);
    }

    if let Some(caps) = CHR_ABBREV.captures(title) {
        return format!("chr{}", &caps[1]);
    }

    if let Some(caps) = NC_ACCESSION.captures(title) {
        // The capture is exactly two digits, so the parse cannot fail.
        let num: u32 = caps[1].parse().unwrap_or(0);
        match num {
            1..=22 => return format!("chr{num}"),
            23 => return "chrX".to_string(),
            24 => return "chrY".to_string(),
            _ => {}
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("Homo sapiens chromosome 17, GRCh38.p14 Primary Assembly", "chr17")]
    #[case("Homo sapiens Chromosome X genomic contig", "chrX")]
    #[case("hg38 chr21 assembly scaffold", "chr21")]
    #[case("NC_000001.11 Homo sapiens", "chr1")]
    #[case("NC_000023.11", "chrX")]
    #[case("NC_000024.10", "chrY")]
    #[case("synthetic construct vector pUC19", "unknown")]
    #[case("", "unknown")]
    fn extracts_expected_label(#[case] title: &str, #[case] expected: &str) {
        assert_eq!(extract_chromosome(title), expected);
    }

    #[test]
    fn explicit_phrase_wins_over_accession() {
        let title = "NC_000024.10 Homo sapiens chromosome 7";
        assert_eq!(extract_chromosome(title), "chr7");
    }
}
