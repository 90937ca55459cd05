// Copyright 2021 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::mem;
use std::sync::Arc;

use anyhow::Result;
use bio_types::genome::AbstractLocus;

use crate::errors::Error;
use crate::reference::SequenceProvider;
use crate::variants::{Breakend, Variant, VariantRecord};

use super::index::IndexEntry;
use super::{ContigId, NodeId, VariationGraph};

impl<P: SequenceProvider> VariationGraph<P> {
    /// Ensure that `pos` is a node boundary on `contig` and return the pair of
    /// reference nodes abutting there. The upstream node is `None` at position 0,
    /// the downstream node is `None` at the contig's full length. Splitting an
    /// already existing boundary is a no-op.
    pub fn split_ref_pos(
        &mut self,
        contig: &str,
        pos: u64,
    ) -> Result<(Option<NodeId>, Option<NodeId>)> {
        let cid = self.contig_id(contig)?;
        self.check_pos(cid, pos)?;
        self.split_at(cid, pos)
    }

    /// Incorporate one substitution/insertion/deletion/replacement allele spanning
    /// `[start, end)` with literal alternate sequence `alt_seq` (empty for a pure
    /// deletion). Afterwards both the reference path and `up -> alt -> down` are
    /// simple paths between the nodes flanking the allele.
    pub fn add_var(
        &mut self,
        contig: &str,
        start: u64,
        end: u64,
        alt_seq: &[u8],
        payload: Option<Arc<VariantRecord>>,
    ) -> Result<()> {
        let cid = self.contig_id(contig)?;
        if start > end {
            return Err(Error::UnsupportedVariant {
                contig: contig.to_owned(),
                pos: start,
                msg: "variant interval end precedes start".to_owned(),
            }
            .into());
        }
        self.check_pos(cid, start)?;
        self.check_pos(cid, end)?;

        let (up, down) = if start == end {
            self.split_at(cid, start)?
        } else {
            let (up, _) = self.split_at(cid, start)?;
            let (_, down) = self.split_at(cid, end)?;
            (up, down)
        };

        let (alt, alt_rev) = self.new_pair(cid, start, end, true, Some(alt_seq), payload);
        if let Some(up) = up {
            self.add_edge(up, alt, true);
        }
        if let Some(down) = down {
            self.add_edge(alt, down, true);
            let down_rev = self.complement(down);
            self.add_edge(down_rev, alt_rev, true);
        }
        if let Some(up) = up {
            let up_rev = self.complement(up);
            self.add_edge(alt_rev, up_rev, true);
        }

        debug!(
            "added allele at {}:{}-{} ({} alternate bases)",
            contig,
            start,
            end,
            alt_seq.len()
        );
        Ok(())
    }

    /// Incorporate a breakend allele. The four orientation cases of
    /// [`Breakend`](crate::variants::Breakend) are wired as follows: without a
    /// strand switch the two cut points are put in ascending `(contig, position)`
    /// order and spliced as `upstream -> alt -> downstream`; with a strand switch
    /// the remote piece is entered through its complement. Breakends joining two
    /// positions on the same contig are rejected.
    pub fn add_bnd(&mut self, bnd: &Breakend, payload: Option<Arc<VariantRecord>>) -> Result<()> {
        let local_cid = self.contig_id(bnd.locus().contig())?;
        let mate_cid = self.contig_id(bnd.mate().contig())?;
        if local_cid == mate_cid {
            return Err(Error::IntrachromosomalBreakend {
                contig: bnd.locus().contig().to_owned(),
                pos: bnd.locus().pos(),
                mate_pos: bnd.mate().pos(),
            }
            .into());
        }
        let p = bnd.locus().pos();
        let q = bnd.mate().pos();
        // both breakpoint bases must exist
        self.check_pos(local_cid, p + 1)?;
        self.check_pos(mate_cid, q + 1)?;

        match (bnd.orientation(), bnd.remote_orientation()) {
            (false, true) => {
                // piece right of the mate continues after the local base
                self.add_adjacency(local_cid, p, mate_cid, q, bnd.replacement(), payload)
            }
            (true, false) => {
                // piece left of the mate precedes the local base
                self.add_adjacency(mate_cid, q, local_cid, p, bnd.replacement(), payload)
            }
            (false, false) => {
                // the piece ending at the mate is traversed reverse-complemented
                let (pos_cut_up, _) = self.split_at(local_cid, p + 1)?;
                let (alt_cut_up, _) = self.split_at(mate_cid, q + 1)?;
                let (alt, alt_rev) =
                    self.new_pair(local_cid, p + 1, p + 1, true, Some(bnd.replacement().as_slice()), payload);
                if let Some(up) = pos_cut_up {
                    self.add_edge(up, alt, true);
                    let up_rev = self.complement(up);
                    self.add_edge(alt_rev, up_rev, true);
                }
                if let Some(mate_up) = alt_cut_up {
                    let mate_up_rev = self.complement(mate_up);
                    self.add_edge(alt, mate_up_rev, true);
                    self.add_edge(mate_up, alt_rev, true);
                }
                debug!(
                    "added breakend {}:{} -> {}:{} (strand switch)",
                    bnd.locus().contig(),
                    p,
                    bnd.mate().contig(),
                    q
                );
                Ok(())
            }
            (true, true) => {
                // the piece starting at the mate is traversed reverse-complemented
                let (_, pos_cut_dn) = self.split_at(local_cid, p)?;
                let (_, alt_cut_dn) = self.split_at(mate_cid, q)?;
                let (alt, alt_rev) =
                    self.new_pair(local_cid, p, p, true, Some(bnd.replacement().as_slice()), payload);
                if let Some(mate_dn) = alt_cut_dn {
                    let mate_dn_rev = self.complement(mate_dn);
                    self.add_edge(mate_dn_rev, alt, true);
                    self.add_edge(alt_rev, mate_dn, true);
                }
                if let Some(down) = pos_cut_dn {
                    self.add_edge(alt, down, true);
                    let down_rev = self.complement(down);
                    self.add_edge(down_rev, alt_rev, true);
                }
                debug!(
                    "added breakend {}:{} -> {}:{} (strand switch)",
                    bnd.locus().contig(),
                    p,
                    bnd.mate().contig(),
                    q
                );
                Ok(())
            }
        }
    }

    /// Route one record to the matching mutator, attaching the record itself as
    /// node payload. All validation happens before the first mutation, so a
    /// rejected record leaves the graph untouched.
    pub fn apply_record(&mut self, record: &VariantRecord) -> Result<()> {
        let payload = Some(Arc::new(record.clone()));
        let contig = record.contig().as_str();
        let pos = record.pos();
        match record.variant() {
            Variant::Snv(base) => self.add_var(contig, pos, pos + 1, &[*base], payload),
            Variant::Mnv(alt) => self.add_var(contig, pos, pos + alt.len() as u64, alt, payload),
            Variant::Insertion(seq) => self.add_var(contig, pos + 1, pos + 1, seq, payload),
            Variant::Deletion(len) => self.add_var(contig, pos + 1, pos + 1 + len, b"", payload),
            Variant::Replacement {
                ref_allele,
                alt_allele,
            } => self.add_var(
                contig,
                pos,
                pos + ref_allele.len() as u64,
                alt_allele,
                payload,
            ),
            Variant::Breakend(bnd) => self.add_bnd(bnd, payload),
            Variant::None => Ok(()),
        }
    }

    /// Splice an alternate node between the cut after `(a_contig, a_pos)` and the
    /// cut before `(b_contig, b_pos)`. The cut points are kept in ascending
    /// `(contig, position)` order; reciprocal records produce the mirrored
    /// junction themselves.
    fn add_adjacency(
        &mut self,
        a_contig: ContigId,
        a_pos: u64,
        b_contig: ContigId,
        b_pos: u64,
        replacement: &[u8],
        payload: Option<Arc<VariantRecord>>,
    ) -> Result<()> {
        let ((a_contig, a_pos), (b_contig, b_pos)) = if (b_contig, b_pos) < (a_contig, a_pos) {
            ((b_contig, b_pos), (a_contig, a_pos))
        } else {
            ((a_contig, a_pos), (b_contig, b_pos))
        };

        let (up, _) = self.split_at(a_contig, a_pos + 1)?;
        let (_, down) = self.split_at(b_contig, b_pos)?;
        let (alt, alt_rev) =
            self.new_pair(a_contig, a_pos + 1, a_pos + 1, true, Some(replacement), payload);
        if let Some(up) = up {
            self.add_edge(up, alt, true);
        }
        if let Some(down) = down {
            self.add_edge(alt, down, true);
            let down_rev = self.complement(down);
            self.add_edge(down_rev, alt_rev, true);
        }
        if let Some(up) = up {
            let up_rev = self.complement(up);
            self.add_edge(alt_rev, up_rev, true);
        }
        debug!(
            "added breakend adjacency {}:{} -> {}:{}",
            self.contig(a_contig).name(),
            a_pos,
            self.contig(b_contig).name(),
            b_pos
        );
        Ok(())
    }

    fn check_pos(&self, contig: ContigId, pos: u64) -> Result<()> {
        let info = self.contig(contig);
        if pos > info.len() {
            return Err(Error::PositionOutOfBounds {
                contig: info.name().clone(),
                pos,
                len: info.len(),
            }
            .into());
        }
        Ok(())
    }

    /// Split the reference node containing `pos`, re-homing all edges of the
    /// replaced pair: incoming edges move to the upstream half, outgoing edges to
    /// the downstream half, each mirrored on the complement strand. Incoming
    /// edges are found through the mirror invariant, as the mirrors of the
    /// complement's outgoing edges.
    fn split_at(
        &mut self,
        contig: ContigId,
        pos: u64,
    ) -> Result<(Option<NodeId>, Option<NodeId>)> {
        let node_id = self.index.lookup(contig, pos).ok_or_else(|| {
            Error::InconsistentGraph {
                msg: format!(
                    "no reference node covers {}:{}",
                    self.contig(contig).name(),
                    pos
                ),
            }
        })?;
        let (start, end) = {
            let node = self.node(node_id);
            (node.start(), node.end())
        };

        if start == pos {
            // the boundary already exists
            return Ok((self.index.predecessor(contig, pos), Some(node_id)));
        }
        if end == pos {
            // right contig edge; nothing downstream to cut off
            return Ok((Some(node_id), None));
        }

        let comp_id = self.complement(node_id);
        let (up, up_rev) = self.new_pair(contig, start, pos, false, None, None);
        let (down, down_rev) = self.new_pair(contig, pos, end, false, None, None);
        self.add_edge(up, down, false);
        self.add_edge(down_rev, up_rev, false);

        let out = mem::take(&mut self.succs[node_id.0]);
        let out_rev = mem::take(&mut self.succs[comp_id.0]);
        for edge in &out {
            self.add_edge(down, edge.dst(), edge.is_alt());
        }
        for edge in &out_rev {
            self.add_edge(up_rev, edge.dst(), edge.is_alt());
        }
        for edge in &out_rev {
            let src = self.complement(edge.dst());
            self.retarget(src, node_id, up);
        }
        for edge in &out {
            let src = self.complement(edge.dst());
            self.retarget(src, comp_id, down_rev);
        }

        self.nodes[node_id.0] = None;
        self.nodes[comp_id.0] = None;
        self.index.replace_with_split(
            contig,
            start,
            IndexEntry {
                contig,
                start,
                end: pos,
                node: up,
            },
            IndexEntry {
                contig,
                start: pos,
                end,
                node: down,
            },
        );

        debug!(
            "split {}:{} into {} and {}",
            self.contig(contig).name(),
            pos,
            up,
            down
        );
        Ok((Some(up), Some(down)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crate::reference::InMemoryReference;
    use crate::variants::classify_alleles;

    fn reference() -> InMemoryReference {
        let mut reference = InMemoryReference::new();
        reference.push("ref", b"ATCAAGCACTA");
        reference
    }

    fn two_contigs() -> InMemoryReference {
        let mut reference = InMemoryReference::new();
        reference.push("chrA", b"AAAACCCC");
        reference.push("chrB", b"GGGGTTTT");
        reference
    }

    fn path_seqs(
        graph: &VariationGraph<InMemoryReference>,
        source: NodeId,
        sink: NodeId,
    ) -> Vec<String> {
        graph
            .all_paths(source, sink, 100)
            .map(|path| String::from_utf8(graph.path_seq(&path).unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_split_ref_pos() {
        let mut graph = VariationGraph::new(reference()).unwrap();
        let (up, down) = graph.split_ref_pos("ref", 5).unwrap();
        let (up, down) = (up.unwrap(), down.unwrap());
        assert_eq!(graph.node(up).start(), 0);
        assert_eq!(graph.node(up).end(), 5);
        assert_eq!(graph.node(down).start(), 5);
        assert_eq!(graph.node(down).end(), 11);
        assert_eq!(graph.complement(graph.complement(up)), up);
        graph.validate().unwrap();
    }

    #[test]
    fn test_split_is_idempotent() {
        let mut graph = VariationGraph::new(reference()).unwrap();
        let first = graph.split_ref_pos("ref", 5).unwrap();
        let count = graph.node_count();
        let second = graph.split_ref_pos("ref", 5).unwrap();
        assert_eq!(first, second);
        assert_eq!(graph.node_count(), count);
        graph.validate().unwrap();
    }

    #[test]
    fn test_split_at_contig_edges() {
        let mut graph = VariationGraph::new(reference()).unwrap();
        let (up, down) = graph.split_ref_pos("ref", 0).unwrap();
        assert!(up.is_none());
        assert!(down.is_some());
        let (up, down) = graph.split_ref_pos("ref", 11).unwrap();
        assert!(up.is_some());
        assert!(down.is_none());
        assert!(graph.split_ref_pos("ref", 12).is_err());
        graph.validate().unwrap();
    }

    #[test]
    fn test_split_rehomes_edges() {
        let mut graph = VariationGraph::new(reference()).unwrap();
        graph.add_var("ref", 5, 6, b"T", None).unwrap();
        // splitting downstream of the variant must keep the alt edges intact
        graph.split_ref_pos("ref", 8).unwrap();
        graph.validate().unwrap();

        let source = graph.lookup("ref", 0).unwrap();
        let sink = graph.lookup("ref", 10).unwrap();
        let mut seqs = path_seqs(&graph, source, sink);
        seqs.sort();
        assert_eq!(seqs, vec!["ATCAAGCACTA", "ATCAATCACTA"]);
    }

    #[test]
    fn test_add_var_out_of_bounds() {
        let mut graph = VariationGraph::new(reference()).unwrap();
        assert!(graph.add_var("ref", 5, 12, b"T", None).is_err());
        assert!(graph.add_var("ref", 6, 5, b"T", None).is_err());
        assert!(graph.add_var("unknown", 0, 1, b"T", None).is_err());
        graph.validate().unwrap();
    }

    #[test]
    fn test_add_bnd_intrachromosomal_rejected() {
        let mut graph = VariationGraph::new(two_contigs()).unwrap();
        let records = classify_alleles("chrA", 3, b"A", &[b"A[chrA:6["]).unwrap();
        let count = graph.node_count();
        assert!(graph.apply_record(&records[0]).is_err());
        // rejected records leave the graph untouched
        assert_eq!(graph.node_count(), count);
        graph.validate().unwrap();
    }

    #[test]
    fn test_add_bnd_join_after_forward() {
        // chrA:3 continues at chrB:4 (1-based 5)
        let mut graph = VariationGraph::new(two_contigs()).unwrap();
        let records = classify_alleles("chrA", 3, b"A", &[b"A[chrB:5["]).unwrap();
        graph.apply_record(&records[0]).unwrap();
        graph.validate().unwrap();

        let source = graph.lookup("chrA", 0).unwrap();
        let sink = graph.lookup("chrB", 7).unwrap();
        let seqs = path_seqs(&graph, source, sink);
        assert_eq!(seqs, vec!["AAAATTTT"]);
    }

    #[test]
    fn test_add_bnd_join_before_forward() {
        // piece of chrA up to position 3 precedes chrB:4
        let mut graph = VariationGraph::new(two_contigs()).unwrap();
        let records = classify_alleles("chrB", 4, b"T", &[b"]chrA:4]T"]).unwrap();
        graph.apply_record(&records[0]).unwrap();
        graph.validate().unwrap();

        let source = graph.lookup("chrA", 0).unwrap();
        let sink = graph.lookup("chrB", 7).unwrap();
        let seqs = path_seqs(&graph, source, sink);
        assert_eq!(seqs, vec!["AAAATTTT"]);
    }

    #[test]
    fn test_add_bnd_strand_switch_left() {
        // revcomp of chrB up to position 3 follows after chrA:3
        let mut graph = VariationGraph::new(two_contigs()).unwrap();
        let records = classify_alleles("chrA", 3, b"A", &[b"A]chrB:4]"]).unwrap();
        graph.apply_record(&records[0]).unwrap();
        graph.validate().unwrap();

        let source = graph.lookup("chrA", 0).unwrap();
        let mate_up = graph.lookup("chrB", 0).unwrap();
        let sink = graph.complement(mate_up);
        let seqs = path_seqs(&graph, source, sink);
        assert_eq!(seqs, vec!["AAAACCCC"]);
    }

    #[test]
    fn test_add_bnd_strand_switch_right() {
        // revcomp of chrB from position 4 precedes chrA:4
        let mut graph = VariationGraph::new(two_contigs()).unwrap();
        let records = classify_alleles("chrA", 4, b"C", &[b"[chrB:5[C"]).unwrap();
        graph.apply_record(&records[0]).unwrap();
        graph.validate().unwrap();

        let mate_dn = graph.lookup("chrB", 7).unwrap();
        let source = graph.complement(mate_dn);
        let sink = graph.lookup("chrA", 7).unwrap();
        let seqs = path_seqs(&graph, source, sink);
        assert_eq!(seqs, vec!["AAAACCCC"]);
    }

    #[test]
    fn test_payload_attached() {
        let mut graph = VariationGraph::new(reference()).unwrap();
        let records = classify_alleles("ref", 5, b"G", &[b"T"]).unwrap();
        graph.apply_record(&records[0]).unwrap();
        let alt = graph.alt_nodes().next().unwrap();
        let payload = graph.node(alt).payload().as_ref().unwrap();
        assert_eq!(payload.as_ref(), &records[0]);
    }

    #[test]
    fn test_random_variants_keep_invariants() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut reference = InMemoryReference::new();
        reference.push("chr1", b"ACGTACGTACGTACGTACGTACGTACGTACGT");
        let mut graph = VariationGraph::new(reference).unwrap();

        for _ in 0..50 {
            let start = rng.gen_range(0..32);
            match rng.gen_range(0..3) {
                0 => graph.add_var("chr1", start, start + 1, b"T", None).unwrap(),
                1 => graph.add_var("chr1", start, start, b"GGA", None).unwrap(),
                _ => {
                    let end = (start + rng.gen_range(1..4)).min(32);
                    graph.add_var("chr1", start, end, b"", None).unwrap();
                }
            }
            graph.validate().unwrap();
        }
    }
}
