//! Error types

use thiserror::Error;

/// Everything that can go wrong building, loading or saving a tree.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Bad magic 0x{0:08x}")]
    BadMagic(u32),

    #[error("Unsupported file version {0}")]
    BadVersion(u8),

    #[error("Bad node flags 0x{0:02x}")]
    BadNodeFlags(u8),

    #[error("Invalid plane: normal length {normal_length}, d = {offset}")]
    InvalidPlane { normal_length: f32, offset: f32 },

    #[error("Triangle index {index} out of range for {count} triangles")]
    TriangleIndexOutOfRange { index: usize, count: usize },

    #[error("Node holds {count} triangles, more than the {max} allowed")]
    TooManyNodeTriangles { count: usize, max: usize },

    #[error("More than {0} nodes in tree data")]
    NodeCountExceeded(usize),

    #[error("Negative {0} in tree data")]
    NegativeCount(&'static str),

    #[error("Too many triangles for the file format: {0}")]
    TooManyTriangles(usize),

    #[error("Triangle {index} is degenerate")]
    DegenerateTriangle { index: usize },

    #[error("Missing section `{0}`")]
    MissingSection(String),

    #[error("Malformed section container: {0}")]
    Container(String),

    #[error("Malformed material id list: {0}")]
    MaterialIds(String),
}

pub type Result<T> = std::result::Result<T, Error>;
