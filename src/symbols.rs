use fxhash::FxHashMap;

/// Address-to-symbol mapping extracted from the application package.
///
/// Extraction itself happens elsewhere; the interpreter only consumes the
/// lookup surface when joining stack-frame addresses.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct SymbolIndex {
    pub method_index: FxHashMap<u64, String>,
}

impl SymbolIndex {
    pub fn new(method_index: FxHashMap<u64, String>) -> Self {
        Self { method_index }
    }

    pub fn lookup(&self, identifier: u64) -> Option<&str> {
        self.method_index.get(&identifier).map(String::as_str)
    }
}

impl FromIterator<(u64, String)> for SymbolIndex {
    fn from_iter<I: IntoIterator<Item = (u64, String)>>(iter: I) -> Self {
        Self {
            method_index: iter.into_iter().collect(),
        }
    }
}
