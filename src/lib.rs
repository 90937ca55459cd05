// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Construction and querying of bidirected genome variation graphs.
//!
//! A [`VariationGraph`](graph::VariationGraph) represents a reference genome
//! together with an arbitrary set of incorporated variant alleles (SNVs, MNVs,
//! indels, replacements and breakends). Reference nodes tile every contig;
//! incorporating an allele splits the tiling at the allele boundaries and
//! splices in an alternate node pair, one node per strand. Haplotypes are
//! extracted by enumerating simple paths and concatenating node sequences;
//! k-mer windows across nodes and edges serve as query signatures.

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate strum_macros;

pub mod errors;
pub mod graph;
pub mod haplotypes;
pub mod reference;
pub mod variants;

pub use crate::graph::{Edge, Node, NodeId, Strand, VariationGraph};
pub use crate::reference::SequenceProvider;
