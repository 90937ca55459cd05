// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashSet;

use anyhow::Result;
use itertools::Itertools;

use crate::graph::{NodeId, VariationGraph};
use crate::reference::SequenceProvider;

/// Remove alternate alleles that are redundant within `[start, end)` on `contig`:
/// when several paths across the window reconstruct the same haplotype sequence,
/// only the first enumerated path (preferring reference) is kept, and alt node
/// pairs occurring exclusively in the discarded duplicates are deleted. Returns
/// the number of removed pairs.
pub fn dedup_region<P: SequenceProvider>(
    graph: &mut VariationGraph<P>,
    contig: &str,
    start: u64,
    end: u64,
    max_paths: usize,
) -> Result<usize> {
    let (source, sink) = graph.window_nodes(contig, start, end)?;
    let paths: Vec<Vec<NodeId>> = graph.all_paths(source, sink, max_paths).collect();

    let mut seen: HashSet<Vec<u8>> = HashSet::new();
    let mut kept: HashSet<NodeId> = HashSet::new();
    let mut duplicated: HashSet<NodeId> = HashSet::new();

    for path in &paths {
        let seq = graph.path_seq(path)?;
        let alts = path
            .iter()
            .filter(|&&node| graph.node(node).is_alt())
            .map(|&node| graph.forward_twin(node));
        if seen.insert(seq) {
            kept.extend(alts);
        } else {
            duplicated.extend(alts);
        }
    }

    let removable: Vec<NodeId> = duplicated.difference(&kept).copied().sorted().collect();
    for &node in &removable {
        let twin = graph.complement(node);
        graph.remove_node(node)?;
        graph.remove_node(twin)?;
    }

    if !removable.is_empty() {
        info!(
            "removed {} redundant alt node pair(s) in {}:{}-{}",
            removable.len(),
            contig,
            start,
            end
        );
    }
    Ok(removable.len())
}
