//! Variant calling from a pairwise alignment.

use tracing::{info, warn};

use varpipe_core::models::variant::GAP;
use varpipe_core::{AlignmentResult, Variant, VariantKind};

/// Walk the best hit's aligned strings column by column and emit one
/// variant per mismatching column.
///
/// The running reference coordinate starts at the hit's start position and
/// advances on every column whose reference side is a real base; insertion
/// columns (gap on the reference side) therefore share the position of the
/// next reference base. Variants come out in scan order, so positions are
/// non-decreasing.
pub fn call_variants(alignment: &AlignmentResult) -> Vec<Variant> {
    let Some(hit) = alignment.best_hit() else {
        warn!("no alignment hits available for variant calling");
        return Vec::new();
    };

    let query = hit.query_sequence.to_uppercase();
    let subject = hit.subject_sequence.to_uppercase();

    let mut variants = Vec::new();
    let mut position = hit.start;

    for (query_base, ref_base) in query.chars().zip(subject.chars()) {
        if let Some(variant) = call_column(query_base, ref_base, &hit.chromosome, position) {
            variants.push(variant);
        }

        // The coordinate only moves when a reference base was consumed.
        if ref_base != GAP {
            position += 1;
        }
    }

    let snps = variants
        .iter()
        .filter(|v| v.kind == VariantKind::Snp)
        .count();
    let insertions = variants
        .iter()
        .filter(|v| v.kind == VariantKind::Insertion)
        .count();
    let deletions = variants.len() - snps - insertions;
    info!(
        total_variants = variants.len(),
        snps, insertions, deletions, "variant calling completed"
    );

    variants
}

fn call_column(
    query_base: char,
    ref_base: char,
    chromosome: &str,
    position: u64,
) -> Option<Variant> {
    // Deletion: the query lost a base the reference has.
    if query_base == GAP && ref_base != GAP {
        return Some(Variant {
            chromosome: chromosome.to_string(),
            position,
            reference_allele: ref_base.to_string(),
            alternate_allele: GAP.to_string(),
            kind: VariantKind::Deletion,
        });
    }

    // Insertion: the query gained a base the reference lacks.
    if query_base != GAP && ref_base == GAP {
        return Some(Variant {
            chromosome: chromosome.to_string(),
            position,
            reference_allele: GAP.to_string(),
            alternate_allele: query_base.to_string(),
            kind: VariantKind::Insertion,
        });
    }

    // Substitution.
    if query_base != ref_base {
        return Some(Variant {
            chromosome: chromosome.to_string(),
            position,
            reference_allele: ref_base.to_string(),
            alternate_allele: query_base.to_string(),
            kind: VariantKind::Snp,
        });
    }

    None
}
