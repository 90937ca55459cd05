// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::Result;
use bio_types::genome::Locus;

pub mod breakends;

pub use breakends::Breakend;

/// Variant categories, with their conventional string forms.
#[derive(
    Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, EnumIter,
    IntoStaticStr,
)]
pub enum VariantType {
    #[strum(serialize = "INS")]
    Insertion,
    #[strum(serialize = "DEL")]
    Deletion,
    #[strum(serialize = "SNV")]
    Snv,
    #[strum(serialize = "MNV")]
    Mnv,
    #[strum(serialize = "REP")]
    Replacement,
    #[strum(serialize = "BND")]
    Breakend,
    #[strum(serialize = "REF")]
    None,
}

/// A single alternate allele.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Variant {
    Snv(u8),
    Mnv(Vec<u8>),
    /// Bases inserted after the (single base) reference allele.
    Insertion(Vec<u8>),
    /// Number of bases deleted after the (single base) reference allele.
    Deletion(u64),
    /// Arbitrary replacement of the reference allele span.
    Replacement {
        ref_allele: Vec<u8>,
        alt_allele: Vec<u8>,
    },
    Breakend(Breakend),
    /// Site without a suggested alternative allele.
    None,
}

impl Variant {
    pub fn is_breakend(&self) -> bool {
        matches!(self, Variant::Breakend(_))
    }

    pub fn to_type(&self) -> VariantType {
        match self {
            Variant::Snv(_) => VariantType::Snv,
            Variant::Mnv(_) => VariantType::Mnv,
            Variant::Insertion(_) => VariantType::Insertion,
            Variant::Deletion(_) => VariantType::Deletion,
            Variant::Replacement { .. } => VariantType::Replacement,
            Variant::Breakend(_) => VariantType::Breakend,
            Variant::None => VariantType::None,
        }
    }

    pub fn len(&self) -> u64 {
        match self {
            Variant::Snv(_) => 1,
            Variant::Mnv(alt) => alt.len() as u64,
            Variant::Insertion(seq) => seq.len() as u64,
            Variant::Deletion(len) => *len,
            Variant::Replacement { alt_allele, .. } => alt_allele.len() as u64,
            Variant::Breakend(_) => 1,
            Variant::None => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One alternate allele of a caller-supplied record, with its anchoring
/// coordinates. Multi-allelic sites are flattened into one record per allele.
#[derive(new, Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct VariantRecord {
    #[getset(get = "pub")]
    contig: String,
    /// 0-based position of the reference allele.
    #[getset(get_copy = "pub")]
    pos: u64,
    #[getset(get = "pub")]
    ref_allele: Vec<u8>,
    #[getset(get = "pub")]
    variant: Variant,
}

impl VariantRecord {
    pub fn locus(&self) -> Locus {
        Locus::new(self.contig.clone(), self.pos)
    }
}

fn is_valid_insertion_alleles(ref_allele: &[u8], alt_allele: &[u8]) -> bool {
    ref_allele.len() < alt_allele.len()
        && ref_allele == &alt_allele[..ref_allele.len()]
        && ref_allele.len() == 1
}

fn is_valid_deletion_alleles(ref_allele: &[u8], alt_allele: &[u8]) -> bool {
    ref_allele.len() > alt_allele.len()
        && &ref_allele[..alt_allele.len()] == alt_allele
        && alt_allele.len() == 1
}

/// Classify the alternate alleles of one record into [`Variant`]s, one
/// [`VariantRecord`] per allele. Symbolic alleles other than `<*>` are skipped;
/// breakend specs that point into an assembly file are skipped as well.
pub fn classify_alleles(
    contig: &str,
    pos: u64,
    ref_allele: &[u8],
    alt_alleles: &[&[u8]],
) -> Result<Vec<VariantRecord>> {
    let mut records = Vec::new();
    let mut push_variant = |variant| {
        records.push(VariantRecord::new(
            contig.to_owned(),
            pos,
            ref_allele.to_owned(),
            variant,
        ))
    };

    for alt_allele in alt_alleles {
        let alt_allele = *alt_allele;
        if alt_allele == b"<*>" {
            // dummy non-ref allele, signifying potential homozygous reference site
            push_variant(Variant::None);
        } else if alt_allele.starts_with(b"<") {
            // skip any other symbolic alleles
            debug!("skipping symbolic allele at {}:{}", contig, pos);
        } else if alt_allele.contains(&b'[') || alt_allele.contains(&b']') {
            if let Some(bnd) = Breakend::from_spec(
                Locus::new(contig.to_owned(), pos),
                ref_allele,
                alt_allele,
            )? {
                push_variant(Variant::Breakend(bnd));
            }
        } else if alt_allele.len() == 1 && ref_allele.len() == 1 {
            push_variant(Variant::Snv(alt_allele[0]));
        } else if alt_allele.len() == ref_allele.len() {
            push_variant(Variant::Mnv(alt_allele.to_vec()));
        } else if is_valid_deletion_alleles(ref_allele, alt_allele) {
            push_variant(Variant::Deletion(
                (ref_allele.len() - alt_allele.len()) as u64,
            ));
        } else if is_valid_insertion_alleles(ref_allele, alt_allele) {
            push_variant(Variant::Insertion(alt_allele[ref_allele.len()..].to_owned()));
        } else {
            // arbitrary replacement
            push_variant(Variant::Replacement {
                ref_allele: ref_allele.to_owned(),
                alt_allele: alt_allele.to_vec(),
            });
        }
    }

    Ok(records)
}
