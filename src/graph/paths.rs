// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{HashMap, HashSet};

use anyhow::Result;

use crate::errors::Error;
use crate::reference::SequenceProvider;

use super::{NodeId, VariationGraph};

/// Lazy enumeration of simple paths between two nodes, capped at `max_paths`.
/// Successor lists keep non-alt edges first, so the all-reference path is always
/// emitted before any alternate path.
pub struct PathIter<'a, P: SequenceProvider> {
    graph: &'a VariationGraph<P>,
    sink: NodeId,
    max_paths: usize,
    emitted: usize,
    // DFS frames: node plus the index of its next successor to explore
    stack: Vec<(NodeId, usize)>,
    on_path: HashSet<NodeId>,
    done: bool,
}

impl<'a, P: SequenceProvider> Iterator for PathIter<'a, P> {
    type Item = Vec<NodeId>;

    fn next(&mut self) -> Option<Vec<NodeId>> {
        if self.done || self.emitted >= self.max_paths {
            return None;
        }
        loop {
            let (node, idx) = match self.stack.last().copied() {
                Some(frame) => frame,
                None => {
                    self.done = true;
                    return None;
                }
            };

            if node == self.sink {
                if idx == 0 {
                    // arrived; the sink is never extended past
                    self.stack.last_mut().unwrap().1 = 1;
                    self.emitted += 1;
                    return Some(self.stack.iter().map(|&(n, _)| n).collect());
                }
                self.stack.pop();
                self.on_path.remove(&node);
                continue;
            }

            let succs = self.graph.successors(node);
            if idx < succs.len() {
                self.stack.last_mut().unwrap().1 += 1;
                let dst = succs[idx].dst();
                if !self.on_path.contains(&dst) {
                    self.stack.push((dst, 0));
                    self.on_path.insert(dst);
                }
                continue;
            }

            self.stack.pop();
            self.on_path.remove(&node);
        }
    }
}

/// The distinct sequences observed for one variant when it is present (alt) vs.
/// absent (ref) across all enumerated paths of a window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters)]
pub struct AlleleSequences {
    #[getset(get = "pub")]
    ref_seqs: HashSet<Vec<u8>>,
    #[getset(get = "pub")]
    alt_seqs: HashSet<Vec<u8>>,
}

impl<P: SequenceProvider> VariationGraph<P> {
    /// All simple paths from `source` to `sink`, reference path first. If
    /// `source == sink` the single trivial path is returned. An empty sequence for
    /// connected endpoints indicates graph corruption; callers should treat it as
    /// fatal.
    pub fn all_paths(&self, source: NodeId, sink: NodeId, max_paths: usize) -> PathIter<'_, P> {
        PathIter {
            graph: self,
            sink,
            max_paths,
            emitted: 0,
            stack: vec![(source, 0)],
            on_path: std::iter::once(source).collect(),
            done: false,
        }
    }

    /// The all-reference path from `source` to `sink`.
    pub fn ref_path(&self, source: NodeId, sink: NodeId) -> Result<Vec<NodeId>> {
        self.all_paths(source, sink, 1)
            .next()
            .ok_or_else(|| Error::NoPathFound.into())
    }

    /// All paths except the reference path, capped at `max_paths`.
    pub fn alt_paths(
        &self,
        source: NodeId,
        sink: NodeId,
        max_paths: usize,
    ) -> impl Iterator<Item = Vec<NodeId>> + '_ {
        self.all_paths(source, sink, max_paths.saturating_add(1))
            .skip(1)
    }

    /// Concatenated sequence along a path, respecting each node's strand.
    pub fn path_seq(&self, path: &[NodeId]) -> Result<Vec<u8>> {
        let mut seq = Vec::new();
        for &node in path {
            seq.extend(self.node_seq(node)?);
        }
        Ok(seq)
    }

    /// For every variant in the window `[start, end)`, collect the distinct path
    /// sequences observed with the variant present (its alt set) and absent (its
    /// ref set). A path contributes to a variant's ref set only if none of the alt
    /// nodes it traverses overlaps that variant's reference span; paths through a
    /// different overlapping allele contribute to neither set.
    pub fn allele_seqs(
        &self,
        contig: &str,
        start: u64,
        end: u64,
        max_paths: usize,
    ) -> Result<HashMap<NodeId, AlleleSequences>> {
        let (source, sink) = self.window_nodes(contig, start, end)?;
        let mut universe: HashSet<NodeId> =
            self.alt_nodes_in(contig, start, end)?.into_iter().collect();

        let paths: Vec<Vec<NodeId>> = self.all_paths(source, sink, max_paths).collect();
        if paths.is_empty() {
            return Err(Error::NoPathFound.into());
        }

        // paths can leave the window through breakend joins; include those alleles
        let path_alts: Vec<HashSet<NodeId>> = paths
            .iter()
            .map(|path| {
                path.iter()
                    .filter(|&&node| self.node(node).is_alt())
                    .map(|&node| self.forward_twin(node))
                    .collect()
            })
            .collect();
        for alts in &path_alts {
            universe.extend(alts.iter().copied());
        }

        let mut result: HashMap<NodeId, AlleleSequences> = universe
            .iter()
            .map(|&node| (node, AlleleSequences::default()))
            .collect();

        for (path, alts) in paths.iter().zip(&path_alts) {
            let seq = self.path_seq(path)?;
            for &variant in &universe {
                let entry = result.get_mut(&variant).unwrap();
                if alts.contains(&variant) {
                    entry.alt_seqs.insert(seq.clone());
                } else if !alts
                    .iter()
                    .any(|&alt| self.spans_overlap(alt, variant))
                {
                    entry.ref_seqs.insert(seq.clone());
                }
            }
        }

        Ok(result)
    }

    /// Boundary reference nodes of the window `[start, end)` on `contig`.
    pub(crate) fn window_nodes(&self, contig: &str, start: u64, end: u64) -> Result<(NodeId, NodeId)> {
        let source = self.lookup(contig, start)?;
        let sink_pos = if end > start { end - 1 } else { end };
        let sink = self.lookup(contig, sink_pos)?;
        Ok((source, sink))
    }

    /// Map reverse-strand nodes to their forward twin.
    pub(crate) fn forward_twin(&self, node: NodeId) -> NodeId {
        if self.node(node).strand().is_reverse() {
            self.complement(node)
        } else {
            node
        }
    }

    /// Whether the reference spans of two nodes overlap, with zero-length spans
    /// counting only when strictly inside the other span.
    fn spans_overlap(&self, a: NodeId, b: NodeId) -> bool {
        let a = self.node(a);
        let b = self.node(b);
        a.contig() == b.contig() && a.start() < b.end() && b.start() < a.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::reference::InMemoryReference;

    fn graph_with_snv() -> VariationGraph<InMemoryReference> {
        let mut reference = InMemoryReference::new();
        reference.push("ref", b"ATCAAGCACTA");
        let mut graph = VariationGraph::new(reference).unwrap();
        graph.add_var("ref", 5, 6, b"T", None).unwrap();
        graph
    }

    fn seqs(graph: &VariationGraph<InMemoryReference>, paths: Vec<Vec<NodeId>>) -> Vec<String> {
        paths
            .into_iter()
            .map(|path| String::from_utf8(graph.path_seq(&path).unwrap()).unwrap())
            .collect()
    }

    fn seq_set(items: &[&[u8]]) -> HashSet<Vec<u8>> {
        items.iter().map(|item| item.to_vec()).collect()
    }

    #[test]
    fn test_reference_path_comes_first() {
        let graph = graph_with_snv();
        let source = graph.lookup("ref", 0).unwrap();
        let sink = graph.lookup("ref", 10).unwrap();
        let paths: Vec<_> = graph.all_paths(source, sink, 10).collect();
        assert_eq!(paths.len(), 2);
        assert_eq!(
            seqs(&graph, paths),
            vec!["ATCAAGCACTA", "ATCAATCACTA"]
        );
        assert_eq!(
            graph.path_seq(&graph.ref_path(source, sink).unwrap()).unwrap(),
            b"ATCAAGCACTA".to_vec()
        );
        let alt: Vec<_> = graph.alt_paths(source, sink, 10).collect();
        assert_eq!(seqs(&graph, alt), vec!["ATCAATCACTA"]);
    }

    #[test]
    fn test_trivial_path() {
        let graph = graph_with_snv();
        let source = graph.lookup("ref", 0).unwrap();
        let paths: Vec<_> = graph.all_paths(source, source, 10).collect();
        assert_eq!(paths, vec![vec![source]]);
    }

    #[test]
    fn test_max_paths_cap() {
        let graph = graph_with_snv();
        let source = graph.lookup("ref", 0).unwrap();
        let sink = graph.lookup("ref", 10).unwrap();
        assert_eq!(graph.all_paths(source, sink, 1).count(), 1);
        assert_eq!(graph.all_paths(source, sink, 0).count(), 0);
    }

    #[test]
    fn test_reverse_strand_path_seq() {
        let graph = graph_with_snv();
        let source = graph.lookup("ref", 0).unwrap();
        let sink = graph.lookup("ref", 10).unwrap();
        // traversing the complement strand yields the reverse complement sequence
        let paths: Vec<_> = graph
            .all_paths(graph.complement(sink), graph.complement(source), 10)
            .collect();
        let mut observed = seqs(&graph, paths);
        observed.sort();
        assert_eq!(observed, vec!["TAGTGATTGAT", "TAGTGCTTGAT"]);
    }

    #[test]
    fn test_allele_seqs_snv() {
        let graph = graph_with_snv();
        let result = graph.allele_seqs("ref", 0, 11, 10).unwrap();
        assert_eq!(result.len(), 1);
        let seqs = result.values().next().unwrap();
        assert_eq!(seqs.ref_seqs(), &seq_set(&[b"ATCAAGCACTA"]));
        assert_eq!(seqs.alt_seqs(), &seq_set(&[b"ATCAATCACTA"]));
    }

    #[test]
    fn test_allele_seqs_overlapping_variants() {
        let mut reference = InMemoryReference::new();
        reference.push("ref", b"ATCAAGCACTA");
        let mut graph = VariationGraph::new(reference).unwrap();
        graph.add_var("ref", 5, 6, b"T", None).unwrap();
        graph.add_var("ref", 4, 7, b"", None).unwrap();
        graph.validate().unwrap();

        let result = graph.allele_seqs("ref", 0, 11, 10).unwrap();
        assert_eq!(result.len(), 2);
        for (node, seqs) in result {
            // both variants see the plain reference in their ref set and only
            // their own path in the alt set
            assert_eq!(seqs.ref_seqs(), &seq_set(&[b"ATCAAGCACTA"]));
            if graph.node(node).len() == 1 {
                assert_eq!(seqs.alt_seqs(), &seq_set(&[b"ATCAATCACTA"]));
            } else {
                assert_eq!(seqs.alt_seqs(), &seq_set(&[b"ATCAACTA"]));
            }
        }
    }
}
