use std::io;
use thiserror::Error;

/// Wire-level failures while packing or unpacking entry records.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum WireError {
    #[error("Cannot fit the entry in the destination ({cap} bytes, need {need})")]
    BufferTooSmall { need: usize, cap: usize },

    #[error("Source buffer is empty")]
    EmptyBuffer,

    #[error("Source buffer ends at offset {offset}, need {need} more bytes")]
    Truncated { offset: usize, need: usize },

    #[error("Serialization type is incorrect (expected {expected}, found {found})")]
    TagMismatch { expected: u8, found: u8 },

    #[error("Unknown serialization type ({0})")]
    UnknownKind(u8),
}

/// Failures while lexing or delta-decoding the textual trace stream.
///
/// Line numbers are 1-based and count from the start of the input,
/// headers included.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum FormatError {
    #[error("Malformed header at line {line} (expected `key|value`)")]
    MalformedHeader { line: usize },

    #[error("Missing blank-line separator between headers and entries")]
    MissingBody,

    #[error("Entry at line {line} has {found} fields, expected {expected}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Entry at line {line} has a non-integer `{field}` field")]
    InvalidInteger { line: usize, field: &'static str },

    #[error("Header `prec` value `{0}` is not an integer")]
    InvalidPrecision(String),

    #[error("Unsupported timestamp precision {0} (maximum is 9)")]
    UnsupportedPrecision(i64),
}

/// Violations of the nested-interval data invariant.
///
/// These indicate a bug or corrupt input and are fatal to the current trace.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum InvariantError {
    #[error(
        "Interval [{}, {}] overlaps [{}, {}] in a non-nested way",
        .existing.0, .existing.1, .added.0, .added.1
    )]
    OverlappingIntervals {
        existing: (i64, i64),
        added: (i64, i64),
    },
}

/// Invalid memory-format descriptions handed to the code generator.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum SchemaError {
    #[error("Dynamic-array field `{field}` of `{typename}` must be the last field")]
    DynamicArrayNotLast { typename: String, field: String },

    #[error("Pointer field `{field}` of `{typename}` cannot be serialized on its own")]
    BarePointerField { typename: String, field: String },

    #[error("Unsupported integer width ({0} bytes)")]
    UnsupportedWidth(usize),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Invariant(#[from] InvariantError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(
        "Encountered an IO error while reading the input stream ({})",
        .0.kind()
    )]
    Io(#[from] io::Error),
}
