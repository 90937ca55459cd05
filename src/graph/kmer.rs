// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::Result;
use bio::alphabets::dna;

use crate::reference::SequenceProvider;

use super::{Edge, NodeId, VariationGraph};

impl<P: SequenceProvider> VariationGraph<P> {
    /// All sequences of length `kmer_size` starting at the 5' end of `node`,
    /// branching into every successor chain. Where the graph ends before
    /// `kmer_size` bases are available, the truncated sequence is returned
    /// instead of an error.
    pub fn node_kmers(&self, node: NodeId, kmer_size: usize) -> Result<Vec<Vec<u8>>> {
        let mut kmers = Vec::new();
        let mut work = vec![(node, Vec::with_capacity(kmer_size))];
        while let Some((id, mut kmer)) = work.pop() {
            let seq = self.node_seq(id)?;
            let missing = kmer_size - kmer.len();
            if seq.len() >= missing {
                kmer.extend_from_slice(&seq[..missing]);
                kmers.push(kmer);
                continue;
            }
            kmer.extend_from_slice(&seq);
            let succs = self.successors(id);
            if succs.is_empty() {
                // the graph ends here
                kmers.push(kmer);
                continue;
            }
            for edge in succs.iter().rev() {
                work.push((edge.dst(), kmer.clone()));
            }
        }
        Ok(kmers)
    }

    /// Sequence windows centered on `edge`, built from all leftward extensions of
    /// its source (collected on the complement strand) crossed with all rightward
    /// extensions of its destination. Both sides contribute `kmer_size / 2` bases,
    /// so an odd `kmer_size` yields windows one base shorter.
    pub fn edge_kmers(&self, edge: &Edge, kmer_size: usize) -> Result<Vec<Vec<u8>>> {
        let half = kmer_size / 2;
        let left = self.node_kmers(self.complement(edge.src()), half)?;
        let right = self.node_kmers(edge.dst(), half)?;

        let mut kmers = Vec::with_capacity(left.len() * right.len());
        for upstream in &left {
            let upstream = dna::revcomp(upstream);
            for downstream in &right {
                let mut kmer = upstream.clone();
                kmer.extend_from_slice(downstream);
                kmers.push(kmer);
            }
        }
        Ok(kmers)
    }
}
