// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::str;

use anyhow::Result;
use bio_types::genome::{AbstractLocus, Locus};
use regex::Regex;

use crate::errors::Error;

/// A single breakend allele: sequence around `locus` is joined to sequence around
/// `mate`, with the retained side of each breakpoint given by the orientation flags.
/// A strand switch happens exactly when both flags agree.
#[derive(new, Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Breakend {
    /// Local breakpoint (0-based).
    #[getset(get = "pub")]
    locus: Locus,
    #[getset(get = "pub")]
    ref_allele: Vec<u8>,
    /// Remote breakpoint (0-based).
    #[getset(get = "pub")]
    mate: Locus,
    /// Bases inserted at the junction, between the two retained pieces.
    #[getset(get = "pub")]
    replacement: Vec<u8>,
    /// If false, the piece left of `locus` is retained and the junction continues
    /// after it; if true, the junction ends in the piece right of `locus`.
    #[getset(get_copy = "pub")]
    orientation: bool,
    /// If true, the retained remote piece extends right of `mate`; if false, it
    /// extends left of `mate`.
    #[getset(get_copy = "pub")]
    remote_orientation: bool,
}

impl Breakend {
    /// Parse a breakend from one of the four ALT spec forms `t[p[`, `t]p]`, `]p]t`
    /// and `[p[t`, with `p` given as 1-based `contig:pos`. Specs pointing into an
    /// assembly file (`<contig>`) are skipped by returning `None`.
    pub fn from_spec(locus: Locus, ref_allele: &[u8], spec: &[u8]) -> Result<Option<Self>> {
        lazy_static! {
            static ref SPEC_RE: Regex = Regex::new(
                "^(?P<leading>[ACGTNacgtn]*)\
                 (?P<bracket1>[\\]\\[])\
                 (?P<anglebracket1><)?\
                 (?P<contig>[^\\]\\[:>]+)\
                 (:(?P<pos>[0-9]+))?\
                 (?P<anglebracket2>>)?\
                 (?P<bracket2>[\\]\\[])\
                 (?P<trailing>[ACGTNacgtn]*)$"
            )
            .unwrap();
        }

        let spec = str::from_utf8(spec).unwrap().to_owned();
        let invalid = || -> anyhow::Error { Error::InvalidBNDRecordAlt { spec: spec.clone() }.into() };

        let caps = SPEC_RE.captures(&spec).ok_or_else(invalid)?;

        let bracket = caps.name("bracket1").unwrap().as_str();
        if bracket != caps.name("bracket2").unwrap().as_str() {
            return Err(invalid());
        }

        match (
            caps.name("anglebracket1").is_some(),
            caps.name("anglebracket2").is_some(),
        ) {
            (true, true) => {
                // insertion from assembly file
                info!(
                    "Skipping BND at {}:{} pointing to assembly file",
                    locus.contig(),
                    locus.pos()
                );
                return Ok(None);
            }
            (false, false) => (),
            _ => {
                // angle brackets do not match
                return Err(invalid());
            }
        }

        let contig = caps.name("contig").unwrap().as_str().to_owned();
        let pos: u64 = caps.name("pos").ok_or_else(invalid)?.as_str().parse()?;
        if pos == 0 {
            return Err(invalid());
        }

        let leading = caps.name("leading").map_or("", |m| m.as_str()).as_bytes();
        let trailing = caps.name("trailing").map_or("", |m| m.as_str()).as_bytes();

        // the replacement sequence sits on exactly one side of the brackets and
        // carries the ref allele as its anchor
        let (orientation, replacement) = match (leading.is_empty(), trailing.is_empty()) {
            (false, true) => {
                if leading.len() < ref_allele.len() {
                    return Err(invalid());
                }
                (false, leading[ref_allele.len()..].to_owned())
            }
            (true, false) => {
                if trailing.len() < ref_allele.len() {
                    return Err(invalid());
                }
                (true, trailing[..trailing.len() - ref_allele.len()].to_owned())
            }
            _ => return Err(invalid()),
        };

        let remote_orientation = bracket == "[";

        Ok(Some(Breakend {
            locus,
            ref_allele: ref_allele.to_owned(),
            mate: Locus::new(contig, pos - 1),
            replacement,
            orientation,
            remote_orientation,
        }))
    }

    pub fn is_intrachromosomal(&self) -> bool {
        self.locus.contig() == self.mate.contig()
    }
}
