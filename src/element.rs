use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Tags of a single entity. Keys are unique within one entity.
pub type Tags = HashMap<String, String>;

/// A point on the planet.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i64,
    /// WGS84 latitude in decimal degrees.
    pub lat: f64,
    /// WGS84 longitude in decimal degrees.
    pub lon: f64,
    pub tags: Tags,
    /// Last-edit wall clock, when the block carries metadata.
    pub timestamp: Option<DateTime<Utc>>,
}

/// An ordered list of nodes forming a polyline or area.
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub id: i64,
    pub tags: Tags,
    /// Node ids in path order. May reference the same node twice
    /// (closed ways do).
    pub node_ids: Vec<i64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A group of entities with per-member roles.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: i64,
    pub tags: Tags,
    pub members: Vec<Member>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// What kind of entity a relation member points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

/// One member of a [`Relation`].
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: i64,
    pub member_type: MemberType,
    pub role: String,
}

/// One decoded OSM entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Node(Node),
    Way(Way),
    Relation(Relation),
}
