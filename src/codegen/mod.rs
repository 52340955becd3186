//! Emits the C++ counterparts of the entry catalog: the entry-kind enum,
//! the packed record structs with their pack/unpack/size routines, and the
//! dispatch parser. Every artifact is self-signed with an embedded digest
//! so unintended edits can be detected.

use crate::{error::SchemaError, schema::EntryDescription};

pub use entry_structs::{EntryStructsCodegen, EntryStructsCppCodegen};
pub use entry_types::{EntryTypesCodegen, EntryTypesCppCodegen};
pub use parser::ParserCodegen;

pub mod entry_structs;
pub mod entry_types;
pub mod parser;

// Assembled from pieces so tools don't take this file for an artifact.
pub(crate) const SIGNED_SOURCE: &str = concat!("@", "generated", " ", "SignedSource<<>>");

const SIGNING_TOKEN: &str = concat!(
    "@",
    "generated",
    " ",
    "<<SignedSource::*O*zOeWoEQle#+L!plEphiEmie@IsG>>"
);

const DIGEST_OPEN: &str = "SignedSource<<";
const DIGEST_CLOSE: &str = ">>";

/// A single emitter: one output file worth of text.
pub trait Codegen {
    fn preferred_filename(&self) -> &'static str;

    fn generate(&self) -> Result<String, SchemaError>;
}

/// Replace the empty digest placeholder with the in-text masking token,
/// digest the masked text, and substitute the real digest back in.
///
/// Signing is idempotent under [`verify_signature`]: masking the digest
/// field to empty reproduces the signed-over text.
pub fn sign_source(text: &str) -> String {
    let masked = text.replace(SIGNED_SOURCE, SIGNING_TOKEN);
    let digest = md5::compute(masked.as_bytes());
    let signed = format!(
        concat!("@", "generated", " ", "SignedSource<<{:x}>>"),
        digest
    );
    text.replace(SIGNED_SOURCE, &signed)
}

/// Check the embedded digest of a signed artifact.
pub fn verify_signature(text: &str) -> bool {
    let Some(open) = text.find(DIGEST_OPEN) else {
        return false;
    };
    let digest_start = open + DIGEST_OPEN.len();
    let Some(digest_len) = text[digest_start..].find(DIGEST_CLOSE) else {
        return false;
    };
    let embedded = &text[digest_start..digest_start + digest_len];

    let blanked = format!(
        "{}{}",
        &text[..digest_start],
        &text[digest_start + digest_len..]
    );
    let masked = blanked.replace(SIGNED_SOURCE, SIGNING_TOKEN);
    format!("{:x}", md5::compute(masked.as_bytes())) == embedded
}

/// The artifact to emit.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Mode {
    /// Entry-kind enum header.
    EntryTypes,
    /// Entry-kind `to_string` source.
    EntryTypesCpp,
    /// Packed record struct header.
    EntryStructs,
    /// Pack/unpack/size routine source.
    EntryStructsCpp,
    /// Dispatch parser header.
    Parser,
}

/// Runs an emitter over an entry catalog and signs the output.
#[derive(Clone, Debug)]
pub struct CodegenProgram {
    mode: Mode,
    entries: Vec<EntryDescription>,
}

impl CodegenProgram {
    pub fn new(mode: Mode, entries: Vec<EntryDescription>) -> Self {
        Self { mode, entries }
    }

    pub fn preferred_filename(&self) -> &'static str {
        self.emitter().preferred_filename()
    }

    pub fn run(&self) -> Result<String, SchemaError> {
        Ok(sign_source(&self.emitter().generate()?))
    }

    fn emitter(&self) -> Box<dyn Codegen> {
        let entries = self.entries.clone();
        match self.mode {
            Mode::EntryTypes => Box::new(EntryTypesCodegen::new(entries)),
            Mode::EntryTypesCpp => Box::new(EntryTypesCppCodegen::new(entries)),
            Mode::EntryStructs => Box::new(EntryStructsCodegen::new(entries)),
            Mode::EntryStructsCpp => Box::new(EntryStructsCppCodegen::new(entries)),
            Mode::Parser => Box::new(ParserCodegen::new(entries)),
        }
    }
}

pub(crate) fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("  {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
