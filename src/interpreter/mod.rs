//! Reconstructs the hierarchical trace model from a lexed trace file:
//! links parents and children, rebuilds the per-thread block nesting,
//! assigns free-standing points to their deepest containing block, and
//! joins stack-frame addresses with symbols.

use crate::{
    constants::counter_name,
    error::Error,
    parser::{RawEntry, StandardEntry, TraceFile},
    symbols::SymbolIndex,
    types::{CounterUnit, Interval, IntervalTree, ObjectId, StackTrace, Trace},
};
use fxhash::FxHashMap;
use itertools::Itertools;
use tracing::{debug, warn};

const BLOCK_START_ENTRIES: &[&str] = &["MARK_PUSH", "IO_START"];
const BLOCK_END_ENTRIES: &[&str] = &["MARK_POP", "IO_END"];
const THREAD_METADATA_ENTRIES: &[&str] = &["TRACE_THREAD_NAME", "TRACE_THREAD_PRI"];

// For these kinds arg2 is not a parent link (CPU_COUNTER carries the core
// number there)
const IGNORE_PARENT_ENTRIES: &[&str] = &["CPU_COUNTER"];

/// The label a coalesced stack-trace point is stored under.
const STACK_TRACE_LABEL: &str = "stacks";

#[derive(Default)]
struct BlockEntries {
    begin: Option<usize>,
    end: Option<usize>,
}

/// One-shot interpreter for a single trace file.
pub struct TraceFileInterpreter<'a> {
    trace_file: &'a TraceFile,
    symbols: Option<&'a SymbolIndex>,
    parents: FxHashMap<usize, usize>,
    children: FxHashMap<usize, Vec<usize>>,
    /// unit name -> unit id
    units: FxHashMap<String, ObjectId>,
    /// block id -> the entries that opened and closed it
    block_entries: FxHashMap<ObjectId, BlockEntries>,
    dropped_links: usize,
}

impl<'a> TraceFileInterpreter<'a> {
    pub fn new(trace_file: &'a TraceFile, symbols: Option<&'a SymbolIndex>) -> Self {
        Self {
            trace_file,
            symbols,
            parents: FxHashMap::default(),
            children: FxHashMap::default(),
            units: FxHashMap::default(),
            block_entries: FxHashMap::default(),
            dropped_links: 0,
        }
    }

    /// Parent entry of an entry, by index into the trace file's entries.
    pub fn parent_of(&self, entry_idx: usize) -> Option<usize> {
        self.parents.get(&entry_idx).copied()
    }

    /// Entries dropped because their parent link did not resolve.
    pub fn dropped_links(&self) -> usize {
        self.dropped_links
    }

    pub fn interpret(&mut self) -> Result<Trace, Error> {
        self.calculate_parents_children();

        let timestamps = || {
            self.trace_file
                .entries
                .iter()
                .filter_map(RawEntry::timestamp)
        };
        let begin = timestamps().min().unwrap_or(0);
        let end = timestamps().max().unwrap_or(0);
        let mut trace = Trace::new(self.trace_file.trace_id().map(str::to_owned), begin, end);

        // Framework frame names come from JAVA_FRAME_NAME entries; those
        // entries do not participate in block building.
        let mut framework_frames: FxHashMap<i64, String> = FxHashMap::default();
        let mut thread_items: FxHashMap<i32, Vec<StandardEntryAt>> = FxHashMap::default();
        for (idx, entry) in self.trace_file.entries.iter().enumerate() {
            let RawEntry::Standard(e) = entry else {
                // Bytes entries are reached as children of the entries below
                continue;
            };
            if e.entry_type.as_str() == "JAVA_FRAME_NAME" {
                for &child in self.children.get(&idx).into_iter().flatten() {
                    if let RawEntry::Bytes(b) = &self.trace_file.entries[child] {
                        framework_frames.insert(e.arg3, b.data.clone());
                    }
                }
                continue;
            }
            thread_items
                .entry(e.tid)
                .or_default()
                .push(StandardEntryAt { idx, entry: *e });
        }

        for (tid, mut items) in thread_items
            .into_iter()
            .sorted_by_key(|(tid, _)| *tid)
        {
            items.sort_by_key(|item| (item.entry.timestamp, item.entry.id));
            let unit_id = self.ensure_unit(&mut trace, &tid.to_string());

            let mut stack: Vec<ObjectId> = Vec::new();
            // timestamp -> frame addresses, in arrival order
            let mut stacks: FxHashMap<i64, Vec<i64>> = FxHashMap::default();

            // First, build blocks.
            for item in &items {
                let e = &item.entry;
                let ty = e.entry_type.as_str();
                let block = if BLOCK_START_ENTRIES.contains(&ty) {
                    let block = Self::push_block(&mut trace, &unit_id, &mut stack, e.timestamp);
                    self.block_entries.entry(block.clone()).or_default().begin = Some(item.idx);
                    Some(block)
                } else if BLOCK_END_ENTRIES.contains(&ty) {
                    let block = Self::pop_block(&mut trace, &unit_id, &mut stack, e.timestamp);
                    self.block_entries.entry(block.clone()).or_default().end = Some(item.idx);
                    Some(block)
                } else if ty == "STACK_FRAME" {
                    // While we're here, build the stack trace buckets.
                    stacks.entry(e.timestamp).or_default().push(e.arg3);
                    None
                } else if THREAD_METADATA_ENTRIES.contains(&ty) {
                    self.process_thread_metadata(&mut trace, item.idx, e);
                    None
                } else {
                    None
                };

                if let Some(block_id) = block {
                    let entries = &self.block_entries[&block_id];
                    let name = self.resolve_name(&[entries.begin, entries.end]);
                    if let Some(block) = trace.blocks.get_mut(&block_id) {
                        block.properties.set_name(name);
                    }
                }
            }

            let tree = Self::normalize_unit(&mut trace, &unit_id)?;

            // Attach single points. This cannot happen during the
            // block-building pass: an unbalanced pop later in the thread
            // can still create the enclosing block for an earlier point.
            for item in &items {
                let e = &item.entry;
                match e.entry_type.as_str() {
                    "COUNTER" => {
                        let point_id =
                            Self::add_point(&mut trace, &unit_id, &tree, e.timestamp);
                        let counter = counter_name(e.arg1).map(str::to_owned).unwrap_or_else(|| {
                            debug!(counter_id = e.arg1, "Unknown counter id");
                            e.arg1.to_string()
                        });
                        let name = self.resolve_name(&[Some(item.idx)]);
                        if let Some(point) = trace.points.get_mut(&point_id) {
                            point
                                .properties
                                .add_counter(counter, e.arg3, CounterUnit::Items);
                            point.properties.set_name(name);
                        }
                    }
                    "STACK_FRAME" => {
                        // One point per distinct timestamp; frames arrive
                        // innermost-first and are stored outermost-first.
                        let Some(frames) = stacks.remove(&e.timestamp) else {
                            continue;
                        };
                        let point_id =
                            Self::add_point(&mut trace, &unit_id, &tree, e.timestamp);
                        let name = self.resolve_name(&[Some(item.idx)]);

                        let mut stacktrace = StackTrace::default();
                        for &frame in frames.iter().rev() {
                            let symbol = self
                                .symbols
                                .and_then(|s| s.lookup(frame as u64))
                                .or_else(|| framework_frames.get(&frame).map(String::as_str))
                                .map(str::to_owned);
                            stacktrace.push(frame as u64, symbol);
                        }
                        if let Some(point) = trace.points.get_mut(&point_id) {
                            point.properties.set_name(name);
                            point
                                .properties
                                .stack_traces
                                .insert(STACK_TRACE_LABEL.to_owned(), stacktrace);
                        }
                    }
                    _ => {}
                }
            }
        }

        if self.dropped_links > 0 {
            debug!(
                dropped = self.dropped_links,
                "Ignored unresolvable parent links"
            );
        }
        Ok(trace)
    }

    /// Single pass over the entry list building the `id -> entry`,
    /// parent and children maps. A link of 0 means no parent; links to
    /// unseen ids are dropped and counted.
    fn calculate_parents_children(&mut self) {
        let mut entries_by_id: FxHashMap<i32, usize> = FxHashMap::default();
        for (idx, entry) in self.trace_file.entries.iter().enumerate() {
            entries_by_id.insert(entry.id(), idx);
            let parent_id = match entry {
                RawEntry::Standard(e) => {
                    if IGNORE_PARENT_ENTRIES.contains(&e.entry_type.as_str()) {
                        continue;
                    }
                    e.arg2
                }
                RawEntry::Bytes(e) => e.arg1,
            };
            if parent_id == 0 {
                continue;
            }
            match entries_by_id.get(&parent_id) {
                Some(&parent_idx) if parent_idx != idx => {
                    self.parents.insert(idx, parent_idx);
                    self.children.entry(parent_idx).or_default().push(idx);
                }
                _ => self.dropped_links += 1,
            }
        }
    }

    fn ensure_unit(&mut self, trace: &mut Trace, tid: &str) -> ObjectId {
        let name = if Some(tid) == self.trace_file.pid() {
            format!("Main Thread_{tid}")
        } else {
            format!("Thread_{tid}")
        };
        if let Some(id) = self.units.get(&name) {
            return id.clone();
        }
        let id = trace.add_unit();
        if let Some(unit) = trace.units.get_mut(&id) {
            unit.properties.set_name(name.clone());
            unit.properties
                .custom_props
                .insert("tid".to_owned(), tid.to_owned());
            unit.properties
                .core_props
                .insert("priority".to_owned(), "0".to_owned());
        }
        self.units.insert(name, id.clone());
        id
    }

    fn push_block(
        trace: &mut Trace,
        unit_id: &ObjectId,
        stack: &mut Vec<ObjectId>,
        timestamp: i64,
    ) -> ObjectId {
        let block = trace.add_block(unit_id);
        trace.create_begin_point(&block, timestamp);
        stack.push(block.clone());
        block
    }

    fn pop_block(
        trace: &mut Trace,
        unit_id: &ObjectId,
        stack: &mut Vec<ObjectId>,
        timestamp: i64,
    ) -> ObjectId {
        let top_is_open = stack
            .last()
            .map(|top| trace.blocks[top].end.is_none())
            .unwrap_or(false);
        if top_is_open {
            // SAFETY: non-empty, checked above
            let block = stack.pop().unwrap();
            trace.create_end_point(&block, timestamp);
            block
        } else {
            // Unbalanced pop: an end-only block on top of the existing
            // stack; its begin is filled in at normalization.
            let block = trace.add_block(unit_id);
            trace.create_end_point(&block, timestamp);
            stack.push(block.clone());
            block
        }
    }

    /// Align blocks without a begin or an end to the bounds of the trace,
    /// then index the unit's blocks in an interval tree and connect the
    /// canonical parent-child block pairs.
    fn normalize_unit(
        trace: &mut Trace,
        unit_id: &ObjectId,
    ) -> Result<IntervalTree<ObjectId>, Error> {
        let block_ids = trace.units[unit_id].blocks.clone();
        for block_id in &block_ids {
            if trace.blocks[block_id].begin.is_none() {
                let begin = trace.begin;
                trace.create_begin_point(block_id, begin);
            }
            if trace.blocks[block_id].end.is_none() {
                let end = trace.end;
                trace.create_end_point(block_id, end);
            }
        }

        let mut tree = IntervalTree::new();
        for block_id in &block_ids {
            // SAFETY: both endpoints were just normalized
            let begin = trace.block_begin_timestamp(block_id).unwrap();
            let end = trace.block_end_timestamp(block_id).unwrap();
            tree.add_interval(begin, end, Some(block_id.clone()))?;
        }

        if let Some(root) = tree.root() {
            Self::assign_parent_child_blocks(trace, root);
        }
        Ok(tree)
    }

    fn assign_parent_child_blocks(trace: &mut Trace, node: &Interval<ObjectId>) {
        for child in node.children() {
            if let (Some(parent_block), Some(child_block)) = (&node.data, &child.data) {
                trace.add_child_block(parent_block, child_block);
            }
            Self::assign_parent_child_blocks(trace, child);
        }
    }

    /// Find the deepest block containing this timestamp and create a point
    /// within it. If no such block exists, a zero-length block holds the
    /// point.
    fn add_point(
        trace: &mut Trace,
        unit_id: &ObjectId,
        tree: &IntervalTree<ObjectId>,
        timestamp: i64,
    ) -> ObjectId {
        let owner = tree
            .find_interval(timestamp)
            .and_then(|interval| interval.data.clone());
        match owner {
            Some(block_id) => trace.add_point_to_block(&block_id, timestamp),
            None => {
                let block_id = trace.add_block(unit_id);
                trace.create_begin_point(&block_id, timestamp);
                trace.create_end_point(&block_id, timestamp);
                trace.add_point_to_block(&block_id, timestamp)
            }
        }
    }

    fn process_thread_metadata(&mut self, trace: &mut Trace, idx: usize, entry: &StandardEntry) {
        match entry.entry_type.as_str() {
            "TRACE_THREAD_PRI" => {
                let unit_id = self.ensure_unit(trace, &entry.tid.to_string());
                if let Some(unit) = trace.units.get_mut(&unit_id) {
                    unit.properties
                        .core_props
                        .insert("priority".to_owned(), entry.arg3.to_string());
                }
            }
            "TRACE_THREAD_NAME" => {
                // The STRING_KEY child carries the tid, its chained
                // STRING_VALUE the thread name.
                let Some(key_idx) = self.single_child(idx, "STRING_KEY") else {
                    warn!(entry = entry.id, "TRACE_THREAD_NAME without a tid key");
                    return;
                };
                let Some(value_idx) = self.single_child(key_idx, "STRING_VALUE") else {
                    warn!(entry = entry.id, "TRACE_THREAD_NAME without a name value");
                    return;
                };
                let tid = self.bytes_data(key_idx).to_owned();
                let tname = self.bytes_data(value_idx).to_owned();

                let unit_id = self.ensure_unit(trace, &tid);
                if let Some(unit) = trace.units.get_mut(&unit_id) {
                    let current = unit.properties.name().unwrap_or_default();
                    let name = if current.contains("Main") {
                        format!("(Main) {tname}")
                    } else {
                        tname
                    };
                    unit.properties.set_name(name);
                }
            }
            _ => {}
        }
    }

    /// The only child of `idx` with the given bytes type, if well-formed.
    fn single_child(&self, idx: usize, entry_type: &str) -> Option<usize> {
        let children = self.children.get(&idx)?;
        let child = *children.first()?;
        match &self.trace_file.entries[child] {
            RawEntry::Bytes(b) if b.entry_type.as_str() == entry_type => Some(child),
            _ => None,
        }
    }

    fn bytes_data(&self, idx: usize) -> &str {
        match &self.trace_file.entries[idx] {
            RawEntry::Bytes(b) => &b.data,
            RawEntry::Standard(_) => "",
        }
    }

    /// Look for a STRING_KEY child equal to `__name`; the name is in the
    /// chained STRING_VALUE. A key whose value got cut off yields nothing.
    fn find_name_by_string_key_value(&self, entry_idx: usize) -> Option<String> {
        let key_idx = self
            .children
            .get(&entry_idx)?
            .iter()
            .copied()
            .find(|&child| match &self.trace_file.entries[child] {
                RawEntry::Bytes(b) => {
                    b.entry_type.as_str() == "STRING_KEY" && b.data == "__name"
                }
                RawEntry::Standard(_) => false,
            })?;

        let value_idx = *self.children.get(&key_idx)?.first()?;
        match &self.trace_file.entries[value_idx] {
            RawEntry::Bytes(b) if b.entry_type.as_str() == "STRING_VALUE" => {
                Some(b.data.clone())
            }
            _ => {
                warn!(entry = entry_idx, "Name key without a chained STRING_VALUE");
                None
            }
        }
    }

    /// Alternatively, a STRING_NAME child names the entry directly.
    fn find_name_by_string_name(&self, entry_idx: usize) -> Option<String> {
        self.children
            .get(&entry_idx)?
            .iter()
            .find_map(|&child| match &self.trace_file.entries[child] {
                RawEntry::Bytes(b) if b.entry_type.as_str() == "STRING_NAME" => {
                    Some(b.data.clone())
                }
                _ => None,
            })
    }

    /// Derive the display name of a block or point from its contributing
    /// entries; a missing side of a block is called out in the name.
    fn resolve_name(&self, entry_indices: &[Option<usize>]) -> String {
        let name = entry_indices.iter().flatten().find_map(|&idx| {
            self.find_name_by_string_key_value(idx)
                .or_else(|| self.find_name_by_string_name(idx))
        });
        let name = name.unwrap_or_else(|| {
            entry_indices
                .iter()
                .flatten()
                .map(|&idx| self.trace_file.entries[idx].entry_type())
                .join(" to ")
        });

        if let [begin, end] = entry_indices {
            match (begin, end) {
                (Some(_), None) => return format!("{name} to Missing"),
                (None, Some(_)) => return format!("Missing to {name}"),
                _ => {}
            }
        }
        name
    }
}

#[derive(Copy, Clone, Debug)]
struct StandardEntryAt {
    idx: usize,
    entry: StandardEntry,
}
