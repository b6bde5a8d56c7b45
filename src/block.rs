use chrono::{DateTime, Utc};
use prost::Message;
use tracing::trace;

use crate::blob;
use crate::element::{Element, Member, MemberType, Node, Relation, Tags, Way};
use crate::error::Error;
use crate::osm_pbf;

/// A typical PrimitiveBlock carries about 8k entities.
const TYPICAL_BLOCK_ENTITIES: usize = 8000;

/// Decodes one `OSMData` blob into the entities it carries, in file order.
///
/// The PrimitiveBlock, its string table and all transport arrays live only
/// for the duration of this call; emitted entities own their strings.
pub(crate) fn decode_block(blob: &osm_pbf::Blob) -> Result<Vec<Element>, Error> {
    let data = blob::payload(blob)?;
    let block = osm_pbf::PrimitiveBlock::decode(data.as_slice())?;
    let ctx = BlockContext::new(&block);
    let mut batch = Vec::with_capacity(TYPICAL_BLOCK_ENTITIES);
    for group in &block.primitivegroup {
        ctx.decode_group(group, &mut batch)?;
    }
    trace!(entities = batch.len(), "decoded primitive block");
    Ok(batch)
}

/// Block-scoped decode state: the string table and the geometry and date
/// scaling anchors.
struct BlockContext<'a> {
    strings: &'a [Vec<u8>],
    granularity: i64,
    lat_offset: i64,
    lon_offset: i64,
    date_granularity: i64,
}

impl<'a> BlockContext<'a> {
    fn new(block: &'a osm_pbf::PrimitiveBlock) -> Self {
        Self {
            strings: &block.stringtable.s,
            granularity: i64::from(block.granularity()),
            lat_offset: block.lat_offset(),
            lon_offset: block.lon_offset(),
            date_granularity: i64::from(block.date_granularity()),
        }
    }

    /// Entity kinds decode in a fixed order within each group, which is
    /// what keeps emission order equal to byte order.
    fn decode_group(
        &self,
        group: &osm_pbf::PrimitiveGroup,
        batch: &mut Vec<Element>,
    ) -> Result<(), Error> {
        for node in &group.nodes {
            batch.push(Element::Node(self.decode_node(node)?));
        }
        if let Some(dense) = &group.dense {
            self.decode_dense_nodes(dense, batch)?;
        }
        for way in &group.ways {
            batch.push(Element::Way(self.decode_way(way)?));
        }
        for relation in &group.relations {
            batch.push(Element::Relation(self.decode_relation(relation)?));
        }
        Ok(())
    }

    /// `1e-9 * (offset + granularity * value)` degrees.
    fn coord(&self, offset: i64, value: i64) -> f64 {
        1e-9 * (offset + self.granularity * value) as f64
    }

    fn string(&self, index: i64) -> Result<String, Error> {
        let bytes = usize::try_from(index)
            .ok()
            .and_then(|i| self.strings.get(i))
            .ok_or_else(|| {
                Error::CorruptBlock(format!(
                    "string table index {index} out of range (table holds {})",
                    self.strings.len()
                ))
            })?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn tags(&self, keys: &[u32], vals: &[u32]) -> Result<Tags, Error> {
        if keys.len() != vals.len() {
            return Err(Error::CorruptBlock(format!(
                "{} tag keys but {} tag values",
                keys.len(),
                vals.len()
            )));
        }
        let mut tags = Tags::with_capacity(keys.len());
        for (&key, &val) in keys.iter().zip(vals) {
            tags.insert(self.string(i64::from(key))?, self.string(i64::from(val))?);
        }
        Ok(tags)
    }

    /// Converts a stored timestamp (in units of `date_granularity`
    /// milliseconds) to UTC wall clock.
    fn timestamp(&self, stored: i64) -> Option<DateTime<Utc>> {
        stored
            .checked_mul(self.date_granularity)
            .and_then(DateTime::from_timestamp_millis)
    }

    fn info_timestamp(&self, info: Option<&osm_pbf::Info>) -> Option<DateTime<Utc>> {
        info.and_then(|info| info.timestamp)
            .and_then(|stored| self.timestamp(stored))
    }

    fn decode_node(&self, node: &osm_pbf::Node) -> Result<Node, Error> {
        Ok(Node {
            id: node.id,
            lat: self.coord(self.lat_offset, node.lat),
            lon: self.coord(self.lon_offset, node.lon),
            tags: self.tags(&node.keys, &node.vals)?,
            timestamp: self.info_timestamp(node.info.as_ref()),
        })
    }

    /// The hot path: five parallel arrays in positional correspondence,
    /// with ids, coordinates and timestamps delta coded from zero.
    fn decode_dense_nodes(
        &self,
        dense: &osm_pbf::DenseNodes,
        batch: &mut Vec<Element>,
    ) -> Result<(), Error> {
        let count = dense.id.len();
        if dense.lat.len() != count || dense.lon.len() != count {
            return Err(Error::CorruptBlock(format!(
                "dense nodes carry {count} ids but {} latitudes and {} longitudes",
                dense.lat.len(),
                dense.lon.len()
            )));
        }
        let timestamps = dense
            .denseinfo
            .as_ref()
            .map(|info| info.timestamp.as_slice())
            .filter(|stamps| !stamps.is_empty());
        if let Some(stamps) = timestamps {
            if stamps.len() != count {
                return Err(Error::CorruptBlock(format!(
                    "dense nodes carry {count} ids but {} timestamps",
                    stamps.len()
                )));
            }
        }

        let mut tag_reader = DenseTagReader::new(self, &dense.keys_vals);
        let (mut id, mut lat, mut lon, mut stamp) = (0i64, 0i64, 0i64, 0i64);
        for index in 0..count {
            id += dense.id[index];
            lat += dense.lat[index];
            lon += dense.lon[index];
            let timestamp = match timestamps {
                Some(stamps) => {
                    stamp += stamps[index];
                    self.timestamp(stamp)
                }
                None => None,
            };
            batch.push(Element::Node(Node {
                id,
                lat: self.coord(self.lat_offset, lat),
                lon: self.coord(self.lon_offset, lon),
                tags: tag_reader.next()?,
                timestamp,
            }));
        }
        Ok(())
    }

    fn decode_way(&self, way: &osm_pbf::Way) -> Result<Way, Error> {
        let mut node_ids = Vec::with_capacity(way.refs.len());
        let mut node_id = 0i64;
        for delta in &way.refs {
            node_id += delta;
            node_ids.push(node_id);
        }
        Ok(Way {
            id: way.id,
            tags: self.tags(&way.keys, &way.vals)?,
            node_ids,
            timestamp: self.info_timestamp(way.info.as_ref()),
        })
    }

    fn decode_relation(&self, relation: &osm_pbf::Relation) -> Result<Relation, Error> {
        Ok(Relation {
            id: relation.id,
            tags: self.tags(&relation.keys, &relation.vals)?,
            members: self.members(relation)?,
            timestamp: self.info_timestamp(relation.info.as_ref()),
        })
    }

    fn members(&self, relation: &osm_pbf::Relation) -> Result<Vec<Member>, Error> {
        let count = relation.memids.len();
        if relation.types.len() != count || relation.roles_sid.len() != count {
            return Err(Error::CorruptBlock(format!(
                "relation {} member arrays disagree: {count} ids, {} types, {} roles",
                relation.id,
                relation.types.len(),
                relation.roles_sid.len()
            )));
        }
        let mut members = Vec::with_capacity(count);
        let mut id = 0i64;
        for index in 0..count {
            id += relation.memids[index];
            let member_type = match osm_pbf::relation::MemberType::try_from(relation.types[index])
            {
                Ok(osm_pbf::relation::MemberType::Node) => MemberType::Node,
                Ok(osm_pbf::relation::MemberType::Way) => MemberType::Way,
                Ok(osm_pbf::relation::MemberType::Relation) => MemberType::Relation,
                Err(_) => {
                    return Err(Error::CorruptBlock(format!(
                        "relation {} member {index} has unknown type {}",
                        relation.id, relation.types[index]
                    )))
                }
            };
            members.push(Member {
                id,
                member_type,
                role: self.string(i64::from(relation.roles_sid[index]))?,
            });
        }
        Ok(members)
    }
}

/// Walks the interleaved DenseNodes `keys_vals` stream: per node a run of
/// `(key, value)` index pairs closed by a `0` sentinel. An empty stream
/// means no node in the group has tags.
struct DenseTagReader<'a> {
    ctx: &'a BlockContext<'a>,
    keys_vals: &'a [i32],
    cursor: usize,
}

impl<'a> DenseTagReader<'a> {
    fn new(ctx: &'a BlockContext<'a>, keys_vals: &'a [i32]) -> Self {
        Self {
            ctx,
            keys_vals,
            cursor: 0,
        }
    }

    /// Tags of the next node in the group.
    fn next(&mut self) -> Result<Tags, Error> {
        let mut tags = Tags::new();
        while let Some(&key) = self.keys_vals.get(self.cursor) {
            if key == 0 {
                break;
            }
            let val = *self.keys_vals.get(self.cursor + 1).ok_or_else(|| {
                Error::CorruptBlock("dense key/value stream ends after a key index".to_string())
            })?;
            tags.insert(
                self.ctx.string(i64::from(key))?,
                self.ctx.string(i64::from(val))?,
            );
            self.cursor += 2;
        }
        if self.cursor < self.keys_vals.len() {
            self.cursor += 1; // step over the 0 terminator
        }
        Ok(tags)
    }
}
