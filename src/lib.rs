#![doc = include_str!("../README.md")]

pub use crate::config::*;
pub use crate::error::Error;
pub use crate::interpreter::TraceFileInterpreter;
pub use crate::parser::{RawEntry, TraceFile};
pub use crate::symbols::SymbolIndex;
pub use crate::types::*;

pub mod codegen;
pub mod config;
pub mod constants;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod schema;
pub mod symbols;
pub mod types;
pub mod wire;
