//! The interpreted trace model: an arena of execution units, blocks and
//! points keyed by [`ObjectId`], with causal edges between points. Objects
//! refer to each other by id only, so the model is cycle-free and can be
//! serialized as-is.

use crate::types::{ObjectId, Properties};
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A zero-duration event attached to a block.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Point {
    pub id: ObjectId,
    pub timestamp: i64,
    pub properties: Properties,
}

/// A time interval on a single execution unit, bracketed by push/pop-family
/// entries. Both endpoints are guaranteed present after normalization.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Block {
    pub id: ObjectId,
    pub begin: Option<ObjectId>,
    pub end: Option<ObjectId>,
    pub other_points: Vec<ObjectId>,
    pub properties: Properties,
}

/// A per-thread grouping of blocks and points.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ExecutionUnit {
    pub id: ObjectId,
    pub blocks: Vec<ObjectId>,
    pub properties: Properties,
}

/// A causal relationship between two points: `source_point` is the cause
/// and `target_point` the effect.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Edge {
    pub source_point: ObjectId,
    pub target_point: ObjectId,
    pub properties: Properties,
}

/// Ids for a single object type are unique within a trace.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Trace {
    pub id: String,
    pub begin: i64,
    pub end: i64,
    pub units: FxHashMap<ObjectId, ExecutionUnit>,
    pub blocks: FxHashMap<ObjectId, Block>,
    pub points: FxHashMap<ObjectId, Point>,
    pub edges: Vec<Edge>,
    pub properties: Properties,
}

impl Trace {
    pub fn new(id: Option<String>, begin: i64, end: i64) -> Self {
        Self {
            id: id.unwrap_or_else(|| ObjectId::random().as_str().to_owned()),
            begin,
            end,
            units: FxHashMap::default(),
            blocks: FxHashMap::default(),
            points: FxHashMap::default(),
            edges: Vec::new(),
            properties: Properties::default(),
        }
    }

    pub fn add_unit(&mut self) -> ObjectId {
        let id = ObjectId::random();
        self.units.insert(
            id.clone(),
            ExecutionUnit {
                id: id.clone(),
                blocks: Vec::new(),
                properties: Properties::default(),
            },
        );
        id
    }

    pub fn add_block(&mut self, unit_id: &ObjectId) -> ObjectId {
        let id = ObjectId::random();
        self.blocks.insert(
            id.clone(),
            Block {
                id: id.clone(),
                begin: None,
                end: None,
                other_points: Vec::new(),
                properties: Properties::default(),
            },
        );
        self.units
            .get_mut(unit_id)
            .expect("unit of a new block exists")
            .blocks
            .push(id.clone());
        id
    }

    fn new_point(&mut self, timestamp: i64) -> ObjectId {
        let id = ObjectId::random();
        self.points.insert(
            id.clone(),
            Point {
                id: id.clone(),
                timestamp,
                properties: Properties::default(),
            },
        );
        id
    }

    pub fn create_begin_point(&mut self, block_id: &ObjectId, timestamp: i64) -> ObjectId {
        let point = self.new_point(timestamp);
        let block = self.blocks.get_mut(block_id).expect("block exists");
        debug_assert!(block.begin.is_none());
        block.begin = Some(point.clone());
        point
    }

    pub fn create_end_point(&mut self, block_id: &ObjectId, timestamp: i64) -> ObjectId {
        let point = self.new_point(timestamp);
        let block = self.blocks.get_mut(block_id).expect("block exists");
        debug_assert!(block.end.is_none());
        block.end = Some(point.clone());
        point
    }

    pub fn add_point_to_block(&mut self, block_id: &ObjectId, timestamp: i64) -> ObjectId {
        let point = self.new_point(timestamp);
        self.blocks
            .get_mut(block_id)
            .expect("block exists")
            .other_points
            .push(point.clone());
        point
    }

    pub fn add_edge(&mut self, source: &ObjectId, target: &ObjectId) -> &mut Edge {
        self.edges.push(Edge {
            source_point: source.clone(),
            target_point: target.clone(),
            properties: Properties::default(),
        });
        // SAFETY: just pushed
        self.edges.last_mut().unwrap()
    }

    /// Timestamp of a block's begin point, if one has been created.
    pub fn block_begin_timestamp(&self, block_id: &ObjectId) -> Option<i64> {
        let block = self.blocks.get(block_id)?;
        let point = self.points.get(block.begin.as_ref()?)?;
        Some(point.timestamp)
    }

    /// Timestamp of a block's end point, if one has been created.
    pub fn block_end_timestamp(&self, block_id: &ObjectId) -> Option<i64> {
        let block = self.blocks.get(block_id)?;
        let point = self.points.get(block.end.as_ref()?)?;
        Some(point.timestamp)
    }

    /// All point ids of a block: begin, others, end, in that order.
    pub fn block_points(&self, block_id: &ObjectId) -> Vec<ObjectId> {
        let Some(block) = self.blocks.get(block_id) else {
            return Vec::new();
        };
        block
            .begin
            .iter()
            .chain(block.other_points.iter())
            .chain(block.end.iter())
            .cloned()
            .collect()
    }

    /// Connect a parent block to a contained child block: two points on
    /// each side at call and return time, joined by `nested_call` and
    /// `nested_return` edges.
    pub fn add_child_block(&mut self, parent_id: &ObjectId, child_id: &ObjectId) {
        let call_time = self
            .block_begin_timestamp(child_id)
            .expect("normalized child has a begin");
        let return_time = self
            .block_end_timestamp(child_id)
            .expect("normalized child has an end");
        debug_assert!({
            let parent_begin = self.block_begin_timestamp(parent_id).unwrap();
            let parent_end = self.block_end_timestamp(parent_id).unwrap();
            parent_begin <= call_time && return_time <= parent_end
        });

        let call_from = self.add_point_to_block(parent_id, call_time);
        let call_to = self.add_point_to_block(child_id, call_time);
        let return_from = self.add_point_to_block(child_id, return_time);
        let return_to = self.add_point_to_block(parent_id, return_time);

        let call_edge = self.add_edge(&call_from, &call_to);
        call_edge
            .properties
            .core_props
            .insert("edge_event_source".to_owned(), "call_to_block".to_owned());
        call_edge
            .properties
            .core_props
            .insert("type".to_owned(), "nested_call".to_owned());

        let return_edge = self.add_edge(&return_from, &return_to);
        return_edge
            .properties
            .core_props
            .insert("edge_event_source".to_owned(), "wait_for_block".to_owned());
        return_edge
            .properties
            .core_props
            .insert("type".to_owned(), "nested_return".to_owned());
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn block_endpoints() {
        let mut trace = Trace::new(None, 0, 100);
        let unit = trace.add_unit();
        let block = trace.add_block(&unit);
        trace.create_begin_point(&block, 10);
        trace.create_end_point(&block, 20);

        assert_eq!(trace.block_begin_timestamp(&block), Some(10));
        assert_eq!(trace.block_end_timestamp(&block), Some(20));
        assert_eq!(trace.block_points(&block).len(), 2);
        assert_eq!(trace.units[&unit].blocks, vec![block]);
    }

    #[test]
    fn nested_call_edges() {
        let mut trace = Trace::new(None, 0, 100);
        let unit = trace.add_unit();
        let parent = trace.add_block(&unit);
        trace.create_begin_point(&parent, 0);
        trace.create_end_point(&parent, 100);
        let child = trace.add_block(&unit);
        trace.create_begin_point(&child, 10);
        trace.create_end_point(&child, 20);

        trace.add_child_block(&parent, &child);

        assert_eq!(trace.edges.len(), 2);
        assert_eq!(
            trace.edges[0].properties.core_props["type"],
            "nested_call"
        );
        assert_eq!(
            trace.edges[1].properties.core_props["type"],
            "nested_return"
        );
        // Call edge goes from a parent point to a child point at call time
        let call = &trace.edges[0];
        assert_eq!(trace.points[&call.source_point].timestamp, 10);
        assert_eq!(trace.points[&call.target_point].timestamp, 10);
        assert!(trace.blocks[&parent]
            .other_points
            .contains(&call.source_point));
        assert!(trace.blocks[&child]
            .other_points
            .contains(&call.target_point));
    }
}
