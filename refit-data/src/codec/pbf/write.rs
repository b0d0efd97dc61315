//! Uncompressed PBF encoding.

use std::{collections::HashMap, io::Write};

use camino::{Utf8Path, Utf8PathBuf};
use refit_core::{CodecError, Entity, EntityKind, EntitySink, Tags};

use super::{COORDINATE_SCALE, proto::Message};
use crate::codec::OutputStream;

/// Entities per primitive block; keeps blobs well below the 32 MiB limit.
const BLOCK_CAPACITY: usize = 8_000;
const WRITING_PROGRAM: &str = concat!("refit ", env!("CARGO_PKG_VERSION"));

/// Interns strings for one primitive block; index 0 is reserved.
#[derive(Debug)]
struct StringTable {
    indices: HashMap<String, u32>,
    strings: Vec<String>,
}

impl StringTable {
    fn new() -> Self {
        Self {
            indices: HashMap::new(),
            strings: vec![String::new()],
        }
    }

    fn intern(&mut self, value: &str) -> u64 {
        if let Some(index) = self.indices.get(value) {
            return u64::from(*index);
        }
        let index = u32::try_from(self.strings.len()).unwrap_or(u32::MAX);
        self.strings.push(value.to_owned());
        self.indices.insert(value.to_owned(), index);
        u64::from(index)
    }

    fn encode(&self) -> Message {
        let mut table = Message::new();
        for value in &self.strings {
            table.string(1, value);
        }
        table
    }
}

fn fixed_point(degrees: f64) -> i64 {
    (degrees * COORDINATE_SCALE).round() as i64
}

/// Streaming PBF writer.
///
/// Entities are buffered per kind and flushed as a primitive block whenever
/// the kind changes or the block is full.
#[derive(Debug)]
pub struct PbfWriter {
    path: Utf8PathBuf,
    out: OutputStream,
    kind: Option<EntityKind>,
    pending: Vec<Entity>,
}

impl PbfWriter {
    /// Start a PBF file, writing its header block immediately.
    ///
    /// # Errors
    /// Returns [`CodecError::Write`] if the header cannot be written.
    pub fn new(path: &Utf8Path, out: OutputStream) -> Result<Self, CodecError> {
        let mut writer = Self {
            path: path.to_path_buf(),
            out,
            kind: None,
            pending: Vec::with_capacity(BLOCK_CAPACITY),
        };
        let mut header = Message::new();
        header.string(4, "OsmSchema-V0.6");
        header.string(16, WRITING_PROGRAM);
        writer.write_blob("OSMHeader", &header)?;
        Ok(writer)
    }

    fn write_error(&self, source: std::io::Error) -> CodecError {
        CodecError::Write {
            path: self.path.clone(),
            source,
        }
    }

    fn write_blob(&mut self, blob_type: &str, payload: &Message) -> Result<(), CodecError> {
        let raw_size = i64::try_from(payload.len()).unwrap_or(i64::MAX);
        let mut blob = Message::new();
        blob.bytes(1, payload.as_bytes());
        blob.int(2, raw_size);

        let mut header = Message::new();
        header.string(1, blob_type);
        header.int(3, i64::try_from(blob.len()).unwrap_or(i64::MAX));

        let header_len = u32::try_from(header.len())
            .unwrap_or(u32::MAX)
            .to_be_bytes();
        let frame = [
            header_len.as_slice(),
            header.as_bytes(),
            blob.as_bytes(),
        ];
        for part in frame {
            self.out
                .write_all(part)
                .map_err(|source| self.write_error(source))?;
        }
        Ok(())
    }

    fn encode_tags(table: &mut StringTable, message: &mut Message, tags: &Tags) {
        let (keys, values): (Vec<u64>, Vec<u64>) = tags
            .iter()
            .map(|(key, value)| (table.intern(key), table.intern(value)))
            .unzip();
        message.packed_uint(2, keys);
        message.packed_uint(3, values);
    }

    fn encode_info(message: &mut Message, version: Option<u32>) {
        if let Some(version) = version {
            let mut info = Message::new();
            info.int(1, i64::from(version));
            message.message(4, &info);
        }
    }

    fn encode_entity(table: &mut StringTable, entity: &Entity) -> Message {
        let mut message = Message::new();
        match entity {
            Entity::Node(node) => {
                message.sint(1, node.id);
                Self::encode_tags(table, &mut message, &node.tags);
                Self::encode_info(&mut message, node.version);
                message.sint(8, fixed_point(node.location.y));
                message.sint(9, fixed_point(node.location.x));
            }
            Entity::Way(way) => {
                message.int(1, way.id);
                Self::encode_tags(table, &mut message, &way.tags);
                Self::encode_info(&mut message, way.version);
                message.packed_delta(8, way.node_refs.iter().copied());
            }
            Entity::Relation(relation) => {
                message.int(1, relation.id);
                Self::encode_tags(table, &mut message, &relation.tags);
                Self::encode_info(&mut message, relation.version);
                let roles: Vec<u64> = relation
                    .members
                    .iter()
                    .map(|member| table.intern(&member.role))
                    .collect();
                message.packed_uint(8, roles);
                message.packed_delta(9, relation.members.iter().map(|member| member.id));
                message.packed_uint(
                    10,
                    relation.members.iter().map(|member| match member.kind {
                        EntityKind::Node => 0,
                        EntityKind::Way => 1,
                        EntityKind::Relation => 2,
                    }),
                );
            }
        }
        message
    }

    fn flush_block(&mut self) -> Result<(), CodecError> {
        let Some(kind) = self.kind else {
            return Ok(());
        };
        if self.pending.is_empty() {
            return Ok(());
        }
        let group_field = match kind {
            EntityKind::Node => 1,
            EntityKind::Way => 3,
            EntityKind::Relation => 4,
        };
        let mut table = StringTable::new();
        let mut group = Message::new();
        for entity in self.pending.drain(..) {
            group.message(group_field, &Self::encode_entity(&mut table, &entity));
        }
        let mut block = Message::new();
        block.message(1, &table.encode());
        block.message(2, &group);
        self.write_blob("OSMData", &block)
    }
}

impl EntitySink for PbfWriter {
    fn write(&mut self, entity: &Entity) -> Result<(), CodecError> {
        if self.kind != Some(entity.kind()) || self.pending.len() >= BLOCK_CAPACITY {
            self.flush_block()?;
            self.kind = Some(entity.kind());
        }
        self.pending.push(entity.clone());
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), CodecError> {
        self.flush_block()?;
        let Self { path, out, .. } = *self;
        out.finish()
            .map_err(|source| CodecError::Write { path, source })
    }
}
