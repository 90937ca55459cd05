use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("unknown contig {name}")]
    UnknownContig { name: String },
    #[error("position {pos} out of bounds for contig {contig} (length {len})")]
    PositionOutOfBounds { contig: String, pos: u64, len: u64 },
    #[error("breakend at {contig}:{pos} with mate at {contig}:{mate_pos}: intra-chromosomal breakends are not supported")]
    IntrachromosomalBreakend {
        contig: String,
        pos: u64,
        mate_pos: u64,
    },
    #[error("invalid BND record: ALT {spec} does not follow BND spec")]
    InvalidBNDRecordAlt { spec: String },
    #[error("unsupported variant at {contig}:{pos}: {msg}")]
    UnsupportedVariant {
        contig: String,
        pos: u64,
        msg: String,
    },
    #[error("cannot remove reference node {contig}:{start}-{end}: reference nodes must tile the contig")]
    RemoveReferenceNode {
        contig: String,
        start: u64,
        end: u64,
    },
    #[error("inconsistent graph: {msg}")]
    InconsistentGraph { msg: String },
    #[error("no path between the requested nodes")]
    NoPathFound,
}
