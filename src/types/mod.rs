use derive_more::Display;
use fxhash::FxHashMap;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use intervals::{Interval, IntervalTree};
pub use trace::{Block, Edge, ExecutionUnit, Point, Trace};

pub mod intervals;
pub mod trace;

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Identifier of a trace object (unit, block, point).
///
/// An 11-character base64 rendering of a random nonzero 64-bit value;
/// locally unique within a trace.
#[derive(
    Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Serialize, Deserialize,
)]
#[display("{_0}")]
pub struct ObjectId(String);

impl ObjectId {
    pub fn random() -> Self {
        let (num, _) = Uuid::new_v4().as_u64_pair();
        Self::from_u64(num.max(1))
    }

    fn from_u64(mut num: u64) -> Self {
        let mut data = [b'A'; 11];
        for slot in data.iter_mut().rev() {
            if num == 0 {
                break;
            }
            *slot = BASE64_ALPHABET[(num % 64) as usize];
            num /= 64;
        }
        // SAFETY: the alphabet is ASCII
        Self(String::from_utf8(data.to_vec()).unwrap())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unit a counter value is denominated in.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Display,
    IntoPrimitive,
    TryFromPrimitive,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum CounterUnit {
    #[display("BYTES")]
    Bytes = 0,
    #[display("SECONDS")]
    Seconds = 1,
    #[display("ITEMS")]
    Items = 2,
    #[display("RATIO")]
    Ratio = 3,
}

/// A single resolved (or unresolved) stack frame, innermost last once the
/// trace has been reconstructed.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct StackFrame {
    pub identifier: u64,
    pub symbol: Option<String>,
}

/// Ordered list of frames, outermost first.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct StackTrace {
    pub frames: Vec<StackFrame>,
}

impl StackTrace {
    pub fn push(&mut self, identifier: u64, symbol: Option<String>) {
        self.frames.push(StackFrame { identifier, symbol });
    }
}

/// Property bags shared by every trace object.
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Properties {
    pub core_props: FxHashMap<String, String>,
    pub custom_props: FxHashMap<String, String>,
    pub counter_props: FxHashMap<CounterUnit, FxHashMap<String, i64>>,
    pub stack_traces: FxHashMap<String, StackTrace>,
    pub errors: Vec<String>,
}

impl Properties {
    pub fn add_counter<S: Into<String>>(&mut self, name: S, value: i64, unit: CounterUnit) {
        self.counter_props
            .entry(unit)
            .or_default()
            .insert(name.into(), value);
    }

    pub fn name(&self) -> Option<&str> {
        self.core_props.get("name").map(String::as_str)
    }

    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.core_props.insert("name".to_owned(), name.into());
    }
}
