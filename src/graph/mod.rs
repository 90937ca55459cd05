// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use bio::alphabets::dna;

use crate::errors::Error;
use crate::reference::SequenceProvider;
use crate::variants::VariantRecord;

mod index;
mod kmer;
mod mutate;
pub mod node;
mod paths;

pub use node::{ContigId, Edge, Node, NodeId, Strand};
pub use paths::{AlleleSequences, PathIter};

use index::{IndexEntry, RefIndex};

/// An interned contig with its length.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct ContigInfo {
    #[getset(get = "pub")]
    name: String,
    #[getset(get_copy = "pub")]
    len: u64,
}

/// A bidirected, dual-strand graph over a reference genome plus an arbitrary set
/// of incorporated variant alleles.
///
/// The graph owns all nodes and edges for one working region. Reference nodes
/// tile every contig without gaps or overlaps; each node has a reverse-complement
/// twin on the opposite strand, and every edge `u -> v` is mirrored by
/// `v.complement -> u.complement`. Construction is single-threaded; independent
/// graphs may share one provider.
pub struct VariationGraph<P: SequenceProvider> {
    provider: P,
    contigs: Vec<ContigInfo>,
    contig_ids: HashMap<String, ContigId>,
    nodes: Vec<Option<Node>>,
    succs: Vec<Vec<Edge>>,
    index: RefIndex,
}

impl<P: SequenceProvider> VariationGraph<P> {
    /// Build the initial graph: one full-length forward/reverse reference node
    /// pair per contig of the provider.
    pub fn new(provider: P) -> Result<Self> {
        let mut graph = VariationGraph {
            provider,
            contigs: Vec::new(),
            contig_ids: HashMap::new(),
            nodes: Vec::new(),
            succs: Vec::new(),
            index: RefIndex::default(),
        };

        for (name, len) in graph.provider.contigs() {
            if len == 0 {
                warn!("skipping empty contig {}", name);
                continue;
            }
            let contig = ContigId(graph.contigs.len() as u32);
            graph.contig_ids.insert(name.clone(), contig);
            graph.contigs.push(ContigInfo { name, len });
            let (fwd, _) = graph.new_pair(contig, 0, len, false, None, None);
            graph.index.insert(IndexEntry {
                contig,
                start: 0,
                end: len,
                node: fwd,
            });
        }

        Ok(graph)
    }

    pub fn contigs(&self) -> &[ContigInfo] {
        &self.contigs
    }

    pub fn contig(&self, id: ContigId) -> &ContigInfo {
        &self.contigs[id.0 as usize]
    }

    pub fn contig_id(&self, name: &str) -> Result<ContigId> {
        self.contig_ids.get(name).copied().ok_or_else(|| {
            Error::UnknownContig {
                name: name.to_owned(),
            }
            .into()
        })
    }

    /// The node behind a handle. Panics if the node was removed; handles must not
    /// outlive the mutation that replaced their node.
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.0].as_ref().expect("removed node handle")
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).map_or(false, |n| n.is_some())
    }

    pub fn complement(&self, id: NodeId) -> NodeId {
        self.node(id).complement()
    }

    /// Outgoing edges of a node, non-alt edges first.
    pub fn successors(&self, id: NodeId) -> &[Edge] {
        &self.succs[id.0]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| node.as_ref().map(|_| NodeId(i)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_some()).count()
    }

    /// The unique forward reference node containing `pos`. Positions outside the
    /// contig's tiled range resolve to its first/last node.
    pub fn lookup(&self, contig: &str, pos: u64) -> Result<NodeId> {
        let cid = self.contig_id(contig)?;
        self.index.lookup(cid, pos).ok_or_else(|| {
            Error::InconsistentGraph {
                msg: format!("no reference node covers {}:{}", contig, pos),
            }
            .into()
        })
    }

    /// Sequence of a node: stored bases for alternate nodes, provider-derived
    /// bases for reference nodes, reverse-complemented on the reverse strand.
    pub fn node_seq(&self, id: NodeId) -> Result<Vec<u8>> {
        let node = self.node(id);
        if let Some(seq) = node.sequence() {
            return Ok(seq.clone());
        }
        let contig = self.contig(node.contig());
        let mut seq = self
            .provider
            .fetch_filled(contig.name(), node.start(), node.end())?;
        if node.strand().is_reverse() {
            seq = dna::revcomp(&seq);
        }
        Ok(seq)
    }

    /// All forward-strand alternate nodes.
    pub fn alt_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_ids().filter(move |&id| {
            let node = self.node(id);
            node.is_alt() && !node.strand().is_reverse()
        })
    }

    /// Forward-strand alternate nodes whose span overlaps `[start, end)` on
    /// `contig`. Zero-length nodes overlap when they lie strictly inside the
    /// window.
    pub fn alt_nodes_in(&self, contig: &str, start: u64, end: u64) -> Result<Vec<NodeId>> {
        let cid = self.contig_id(contig)?;
        Ok(self
            .alt_nodes()
            .filter(|&id| {
                let node = self.node(id);
                node.contig() == cid && node.start() < end && start < node.end()
            })
            .collect())
    }

    /// Junctions with at least one alternate successor, as `(node, edges)`.
    pub fn alt_junctions(&self) -> impl Iterator<Item = (NodeId, &[Edge])> + '_ {
        self.node_ids().filter_map(move |id| {
            let edges = self.successors(id);
            if edges.iter().any(|edge| edge.is_alt()) {
                Some((id, edges))
            } else {
                None
            }
        })
    }

    /// Delete an alternate node and every edge touching it. The caller removes the
    /// complement twin separately; reference nodes cannot be removed.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let node = self.nodes.get(id.0).and_then(|n| n.as_ref()).ok_or_else(|| {
            Error::InconsistentGraph {
                msg: format!("removing unknown node {}", id),
            }
        })?;
        if !node.is_alt() {
            return Err(Error::RemoveReferenceNode {
                contig: self.contig(node.contig()).name().clone(),
                start: node.start(),
                end: node.end(),
            }
            .into());
        }
        self.nodes[id.0] = None;
        self.succs[id.0].clear();
        for edges in &mut self.succs {
            edges.retain(|edge| edge.dst != id);
        }
        debug!("removed alt node {}", id);
        Ok(())
    }

    /// Check the structural invariants: complement involution with inverted
    /// strand, mirrored edges, non-alt-first successor ordering, and the
    /// reference tiling of every contig. Any violation indicates an earlier
    /// mutation bug and is returned as a loud error.
    pub fn validate(&self) -> Result<()> {
        let inconsistent = |msg: String| -> anyhow::Error { Error::InconsistentGraph { msg }.into() };

        let mut ref_fwd = 0;
        for id in self.node_ids() {
            let node = self.node(id);
            let comp_id = node.complement();
            let comp = self
                .nodes
                .get(comp_id.0)
                .and_then(|n| n.as_ref())
                .ok_or_else(|| inconsistent(format!("complement of {} was removed", id)))?;
            if comp.complement() != id {
                return Err(inconsistent(format!("complement of {} is not involutive", id)));
            }
            if comp.contig() != node.contig()
                || comp.start() != node.start()
                || comp.end() != node.end()
                || comp.strand() != node.strand().flip()
                || comp.is_alt() != node.is_alt()
            {
                return Err(inconsistent(format!("{} and its complement disagree", id)));
            }

            let mut seen_alt = false;
            for edge in self.successors(id) {
                if edge.src() != id {
                    return Err(inconsistent(format!("edge with foreign source at {}", id)));
                }
                if !self.contains(edge.dst()) {
                    return Err(inconsistent(format!("dangling edge {} -> {}", id, edge.dst())));
                }
                if edge.is_alt() {
                    seen_alt = true;
                } else if seen_alt {
                    return Err(inconsistent(format!("non-alt edge after alt edge at {}", id)));
                }
                let mirror_src = self.complement(edge.dst());
                if !self
                    .successors(mirror_src)
                    .iter()
                    .any(|m| m.dst() == comp_id && m.is_alt() == edge.is_alt())
                {
                    return Err(inconsistent(format!(
                        "edge {} -> {} has no mirror",
                        id,
                        edge.dst()
                    )));
                }
            }

            if !node.is_alt() && !node.strand().is_reverse() {
                ref_fwd += 1;
            }
        }

        for (i, contig) in self.contigs.iter().enumerate() {
            let cid = ContigId(i as u32);
            let mut expected = 0;
            let entries = self.index.contig_entries(cid);
            for entry in entries {
                if entry.start != expected {
                    return Err(inconsistent(format!(
                        "reference tiling of {} broken at {}",
                        contig.name(),
                        entry.start
                    )));
                }
                if !self.contains(entry.node) {
                    return Err(inconsistent(format!(
                        "index references removed node {}",
                        entry.node
                    )));
                }
                let node = self.node(entry.node);
                if node.is_alt()
                    || node.strand().is_reverse()
                    || node.contig() != cid
                    || node.start() != entry.start
                    || node.end() != entry.end
                {
                    return Err(inconsistent(format!(
                        "index entry at {}:{} does not match its node",
                        contig.name(),
                        entry.start
                    )));
                }
                expected = entry.end;
            }
            if expected != contig.len() {
                return Err(inconsistent(format!(
                    "reference tiling of {} ends at {} instead of {}",
                    contig.name(),
                    expected,
                    contig.len()
                )));
            }
        }

        if ref_fwd != self.index.len() {
            return Err(inconsistent(format!(
                "{} forward reference nodes but {} index entries",
                ref_fwd,
                self.index.len()
            )));
        }

        Ok(())
    }

    /// Allocate a forward/reverse node pair. Alternate pairs store the given
    /// sequence on the forward node and its reverse complement on the twin.
    fn new_pair(
        &mut self,
        contig: ContigId,
        start: u64,
        end: u64,
        is_alt: bool,
        sequence: Option<&[u8]>,
        payload: Option<Arc<VariantRecord>>,
    ) -> (NodeId, NodeId) {
        let placeholder = NodeId(usize::MAX);
        let fwd = self.push_node(Node::new(
            contig,
            start,
            end,
            Strand::Forward,
            is_alt,
            sequence.map(|seq| seq.to_vec()),
            placeholder,
            payload.clone(),
        ));
        let rev = self.push_node(Node::new(
            contig,
            start,
            end,
            Strand::Reverse,
            is_alt,
            sequence.map(dna::revcomp),
            fwd,
            payload,
        ));
        self.nodes[fwd.0].as_mut().unwrap().complement = rev;
        (fwd, rev)
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(Some(node));
        self.succs.push(Vec::new());
        NodeId(self.nodes.len() - 1)
    }

    /// Insert an edge, keeping non-alt edges ahead of alt edges so that traversal
    /// prefers the reference path.
    fn add_edge(&mut self, src: NodeId, dst: NodeId, is_alt: bool) {
        let edges = &mut self.succs[src.0];
        let edge = Edge::new(src, dst, is_alt);
        if is_alt {
            edges.push(edge);
        } else {
            let i = edges.iter().take_while(|e| !e.is_alt).count();
            edges.insert(i, edge);
        }
    }

    fn retarget(&mut self, src: NodeId, old_dst: NodeId, new_dst: NodeId) {
        for edge in &mut self.succs[src.0] {
            if edge.dst == old_dst {
                edge.dst = new_dst;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::reference::InMemoryReference;

    fn graph_with_variants() -> VariationGraph<InMemoryReference> {
        let mut reference = InMemoryReference::new();
        reference.push("ref", b"ATCAAGCACTA");
        let mut graph = VariationGraph::new(reference).unwrap();
        graph.add_var("ref", 5, 6, b"T", None).unwrap();
        graph.add_var("ref", 8, 8, b"GG", None).unwrap();
        graph
    }

    #[test]
    fn test_initial_tiling() {
        let mut reference = InMemoryReference::new();
        reference.push("chr1", b"ACGT");
        reference.push("chr2", b"TTTT");
        let graph = VariationGraph::new(reference).unwrap();
        graph.validate().unwrap();
        // one forward/reverse pair per contig
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.contigs().len(), 2);
    }

    #[test]
    fn test_node_seq_respects_strand() {
        let graph = graph_with_variants();
        let node = graph.lookup("ref", 0).unwrap();
        assert_eq!(graph.node_seq(node).unwrap(), b"ATCAA".to_vec());
        assert_eq!(
            graph.node_seq(graph.complement(node)).unwrap(),
            b"TTGAT".to_vec()
        );
    }

    #[test]
    fn test_alt_node_iteration() {
        let graph = graph_with_variants();
        assert_eq!(graph.alt_nodes().count(), 2);
        // windowed iteration only sees overlapping alleles
        assert_eq!(graph.alt_nodes_in("ref", 0, 6).unwrap().len(), 1);
        assert_eq!(graph.alt_nodes_in("ref", 6, 11).unwrap().len(), 1);
        assert_eq!(graph.alt_nodes_in("ref", 0, 11).unwrap().len(), 2);
        assert_eq!(graph.alt_nodes_in("ref", 9, 11).unwrap().len(), 0);
    }

    #[test]
    fn test_alt_junctions() {
        let graph = graph_with_variants();
        let junctions: Vec<_> = graph.alt_junctions().collect();
        // per allele and strand: the node entering the allele plus the allele node
        assert_eq!(junctions.len(), 8);
        for (node, edges) in junctions {
            assert!(graph.contains(node));
            assert!(edges.iter().any(|edge| edge.is_alt()));
        }
    }

    #[test]
    fn test_remove_node_rejects_reference() {
        let mut graph = graph_with_variants();
        let node = graph.lookup("ref", 0).unwrap();
        assert!(graph.remove_node(node).is_err());
        graph.validate().unwrap();
    }
}
