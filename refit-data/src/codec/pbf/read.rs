//! Block-at-a-time PBF decoding.

use camino::{Utf8Path, Utf8PathBuf};
use geo::Coord;
use log::debug;
use osmpbf::{BlobDecode, BlobReader, Element, RelMemberType};
use refit_core::{CodecError, Entity, EntityKind, Member, Node, Relation, Tags, Way};

use crate::codec::InputStream;

/// Lazy PBF reader holding at most one decoded block in memory.
pub struct PbfReader {
    path: Utf8PathBuf,
    blobs: BlobReader<InputStream>,
    pending: std::vec::IntoIter<Entity>,
    done: bool,
}

impl std::fmt::Debug for PbfReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PbfReader")
            .field("path", &self.path)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

fn collect_tags<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> Tags {
    pairs
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

fn version_from(raw: Option<i32>) -> Option<u32> {
    raw.and_then(|version| u32::try_from(version).ok())
}

const fn member_kind(member_type: &RelMemberType) -> EntityKind {
    match member_type {
        RelMemberType::Node => EntityKind::Node,
        RelMemberType::Way => EntityKind::Way,
        RelMemberType::Relation => EntityKind::Relation,
    }
}

impl PbfReader {
    /// Decode PBF data read from `input`; `path` labels errors.
    pub fn new(path: &Utf8Path, input: InputStream) -> Self {
        Self {
            path: path.to_path_buf(),
            blobs: BlobReader::new(input),
            pending: Vec::new().into_iter(),
            done: false,
        }
    }

    fn decode_error(&self, source: osmpbf::Error) -> CodecError {
        CodecError::Decode {
            path: self.path.clone(),
            source: Box::new(source),
        }
    }

    fn convert(&self, element: Element<'_>) -> Result<Entity, CodecError> {
        Ok(match element {
            Element::Node(node) => Entity::Node(Node {
                id: node.id(),
                version: version_from(node.info().version()),
                tags: collect_tags(node.tags()),
                location: Coord {
                    x: node.lon(),
                    y: node.lat(),
                },
            }),
            Element::DenseNode(node) => Entity::Node(Node {
                id: node.id(),
                version: version_from(node.info().map(|info| info.version())),
                tags: collect_tags(node.tags()),
                location: Coord {
                    x: node.lon(),
                    y: node.lat(),
                },
            }),
            Element::Way(way) => Entity::Way(Way {
                id: way.id(),
                version: version_from(way.info().version()),
                tags: collect_tags(way.tags()),
                node_refs: way.refs().collect(),
            }),
            Element::Relation(relation) => {
                let mut members = Vec::new();
                for member in relation.members() {
                    let role = member.role().map_err(|err| self.decode_error(err))?;
                    members.push(Member::new(
                        member_kind(&member.member_type),
                        member.member_id,
                        role,
                    ));
                }
                Entity::Relation(Relation {
                    id: relation.id(),
                    version: version_from(relation.info().version()),
                    tags: collect_tags(relation.tags()),
                    members,
                })
            }
        })
    }

    /// Decode the next data block, returning `false` at end of input.
    fn fill(&mut self) -> Result<bool, CodecError> {
        loop {
            let Some(blob) = self.blobs.next() else {
                return Ok(false);
            };
            let blob = blob.map_err(|err| self.decode_error(err))?;
            match blob.decode().map_err(|err| self.decode_error(err))? {
                BlobDecode::OsmHeader(_) => {}
                BlobDecode::OsmData(block) => {
                    let entities = block
                        .elements()
                        .map(|element| self.convert(element))
                        .collect::<Result<Vec<_>, _>>()?;
                    if entities.is_empty() {
                        continue;
                    }
                    self.pending = entities.into_iter();
                    return Ok(true);
                }
                BlobDecode::Unknown(kind) => {
                    debug!("{}: skipping unknown blob type {kind}", self.path);
                }
            }
        }
    }
}

impl Iterator for PbfReader {
    type Item = Result<Entity, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entity) = self.pending.next() {
                return Some(Ok(entity));
            }
            if self.done {
                return None;
            }
            match self.fill() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return None;
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
