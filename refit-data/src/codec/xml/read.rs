//! Streaming OSM XML parsing with `quick-xml`.
//!
//! Events are copied into owned [`Step`]s as soon as they are read so the
//! parser buffer can be reused while an element is being assembled.

use std::collections::HashMap;

use camino::{Utf8Path, Utf8PathBuf};
use geo::Coord;
use quick_xml::{Reader, events::Event};
use refit_core::{
    ChangeOperation, CodecError, Entity, EntityKey, EntityKind, Member, Node, Relation, Tags, Way,
};

use crate::codec::InputStream;

#[derive(Debug)]
enum Step {
    Open {
        name: String,
        attributes: HashMap<String, String>,
        empty: bool,
    },
    Close {
        name: String,
    },
    Eof,
    Other,
}

fn read_step(
    reader: &mut Reader<InputStream>,
    buf: &mut Vec<u8>,
    path: &Utf8Path,
) -> Result<Step, CodecError> {
    buf.clear();
    let position = reader.buffer_position();
    let decode = |err: quick_xml::Error| CodecError::Decode {
        path: path.to_path_buf(),
        source: Box::new(err),
    };
    let step = match reader.read_event_into(buf).map_err(decode)? {
        Event::Start(element) => Step::Open {
            name: String::from_utf8_lossy(element.name().as_ref()).into_owned(),
            attributes: collect_attributes(&element, path, position)?,
            empty: false,
        },
        Event::Empty(element) => Step::Open {
            name: String::from_utf8_lossy(element.name().as_ref()).into_owned(),
            attributes: collect_attributes(&element, path, position)?,
            empty: true,
        },
        Event::End(element) => Step::Close {
            name: String::from_utf8_lossy(element.name().as_ref()).into_owned(),
        },
        Event::Eof => Step::Eof,
        _ => Step::Other,
    };
    Ok(step)
}

fn collect_attributes(
    element: &quick_xml::events::BytesStart<'_>,
    path: &Utf8Path,
    position: impl std::fmt::Display,
) -> Result<HashMap<String, String>, CodecError> {
    let mut attributes = HashMap::new();
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|err| CodecError::Malformed {
            path: path.to_path_buf(),
            location: format!("byte {position}"),
            reason: err.to_string(),
        })?;
        let value = attribute
            .unescape_value()
            .map_err(|err| CodecError::Decode {
                path: path.to_path_buf(),
                source: Box::new(err),
            })?
            .into_owned();
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        attributes.insert(key, value);
    }
    Ok(attributes)
}

/// An entity element whose children are still being read.
#[derive(Debug)]
struct PartialElement {
    kind: EntityKind,
    attributes: HashMap<String, String>,
    tags: Tags,
    node_refs: Vec<i64>,
    members: Vec<Member>,
}

/// Assembles entity elements from a flat sequence of steps.
#[derive(Debug)]
struct Assembler {
    path: Utf8PathBuf,
    current: Option<PartialElement>,
}

impl Assembler {
    fn new(path: &Utf8Path) -> Self {
        Self {
            path: path.to_path_buf(),
            current: None,
        }
    }

    fn malformed(&self, element: &str, reason: impl Into<String>) -> CodecError {
        CodecError::Malformed {
            path: self.path.clone(),
            location: format!("<{element}>"),
            reason: reason.into(),
        }
    }

    fn required<'a>(
        &self,
        element: &str,
        attributes: &'a HashMap<String, String>,
        name: &str,
    ) -> Result<&'a str, CodecError> {
        attributes
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| self.malformed(element, format!("missing attribute {name:?}")))
    }

    fn parse<T: std::str::FromStr>(
        &self,
        element: &str,
        name: &str,
        value: &str,
    ) -> Result<T, CodecError> {
        value
            .parse()
            .map_err(|_| self.malformed(element, format!("invalid {name} {value:?}")))
    }

    /// Feed an opening tag; returns a finished element for self-closing entities.
    fn open(
        &mut self,
        name: &str,
        attributes: HashMap<String, String>,
        empty: bool,
    ) -> Result<Option<PartialElement>, CodecError> {
        if let Ok(kind) = name.parse::<EntityKind>() {
            if self.current.is_some() {
                return Err(self.malformed(name, "nested entity element"));
            }
            let element = PartialElement {
                kind,
                attributes,
                tags: Tags::new(),
                node_refs: Vec::new(),
                members: Vec::new(),
            };
            if empty {
                return Ok(Some(element));
            }
            self.current = Some(element);
            return Ok(None);
        }
        let Some(current) = self.current.as_ref() else {
            return Ok(None);
        };
        let parent = current.kind;
        match name {
            "tag" => {
                let key = self.required(name, &attributes, "k")?.to_owned();
                let value = self.required(name, &attributes, "v")?.to_owned();
                if let Some(current) = self.current.as_mut() {
                    current.tags.insert(key, value);
                }
            }
            "nd" if parent == EntityKind::Way => {
                let reference = self.parse(name, "ref", self.required(name, &attributes, "ref")?)?;
                if let Some(current) = self.current.as_mut() {
                    current.node_refs.push(reference);
                }
            }
            "member" if parent == EntityKind::Relation => {
                let kind = self
                    .required(name, &attributes, "type")?
                    .parse::<EntityKind>()
                    .map_err(|err| self.malformed(name, err.to_string()))?;
                let id = self.parse(name, "ref", self.required(name, &attributes, "ref")?)?;
                let role = attributes.get("role").cloned().unwrap_or_default();
                if let Some(current) = self.current.as_mut() {
                    current.members.push(Member::new(kind, id, role));
                }
            }
            _ => {}
        }
        Ok(None)
    }

    /// Feed a closing tag; returns the element it completes, if any.
    fn close(&mut self, name: &str) -> Option<PartialElement> {
        let closes_current = self
            .current
            .as_ref()
            .is_some_and(|current| current.kind.as_str() == name);
        if closes_current { self.current.take() } else { None }
    }

    fn key(&self, element: &PartialElement) -> Result<EntityKey, CodecError> {
        let tag = element.kind.as_str();
        let id = self.parse(tag, "id", self.required(tag, &element.attributes, "id")?)?;
        Ok(EntityKey::new(element.kind, id))
    }

    fn entity(&self, element: PartialElement) -> Result<Entity, CodecError> {
        let key = self.key(&element)?;
        let tag = element.kind.as_str();
        let version = element
            .attributes
            .get("version")
            .map(|raw| self.parse::<u32>(tag, "version", raw))
            .transpose()?;
        Ok(match element.kind {
            EntityKind::Node => {
                let lat = self.parse(tag, "lat", self.required(tag, &element.attributes, "lat")?)?;
                let lon = self.parse(tag, "lon", self.required(tag, &element.attributes, "lon")?)?;
                Entity::Node(Node {
                    id: key.id,
                    version,
                    tags: element.tags,
                    location: Coord { x: lon, y: lat },
                })
            }
            EntityKind::Way => Entity::Way(Way {
                id: key.id,
                version,
                tags: element.tags,
                node_refs: element.node_refs,
            }),
            EntityKind::Relation => Entity::Relation(Relation {
                id: key.id,
                version,
                tags: element.tags,
                members: element.members,
            }),
        })
    }
}

/// Lazy reader for OSM XML files.
pub struct OsmXmlReader {
    path: Utf8PathBuf,
    reader: Reader<InputStream>,
    buf: Vec<u8>,
    assembler: Assembler,
    done: bool,
}

impl std::fmt::Debug for OsmXmlReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OsmXmlReader")
            .field("path", &self.path)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

fn xml_reader(input: InputStream) -> Reader<InputStream> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);
    reader
}

impl OsmXmlReader {
    /// Parse OSM XML read from `input`; `path` labels errors.
    pub fn new(path: &Utf8Path, input: InputStream) -> Self {
        Self {
            path: path.to_path_buf(),
            reader: xml_reader(input),
            buf: Vec::new(),
            assembler: Assembler::new(path),
            done: false,
        }
    }

    fn next_entity(&mut self) -> Result<Option<Entity>, CodecError> {
        loop {
            let finished = match read_step(&mut self.reader, &mut self.buf, &self.path)? {
                Step::Open {
                    name,
                    attributes,
                    empty,
                } => self.assembler.open(&name, attributes, empty)?,
                Step::Close { name } => self.assembler.close(&name),
                Step::Eof => {
                    if let Some(open) = self.assembler.current.as_ref() {
                        return Err(self
                            .assembler
                            .malformed(open.kind.as_str(), "unterminated element at end of file"));
                    }
                    return Ok(None);
                }
                Step::Other => None,
            };
            if let Some(element) = finished {
                return self.assembler.entity(element).map(Some);
            }
        }
    }
}

impl Iterator for OsmXmlReader {
    type Item = Result<Entity, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.next_entity().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Create,
    Modify,
    Delete,
}

impl Section {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "create" => Some(Self::Create),
            "modify" => Some(Self::Modify),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Read every operation of an OSM change document, in document order.
///
/// Deletions only need an `id`; nodes inside `<delete>` may omit their
/// location.
///
/// # Errors
/// Returns [`CodecError::Malformed`] for entities outside a section or with
/// invalid attributes, and [`CodecError::Decode`] for XML syntax errors.
pub fn read_osc(path: &Utf8Path, input: InputStream) -> Result<Vec<ChangeOperation>, CodecError> {
    let mut reader = xml_reader(input);
    let mut buf = Vec::new();
    let mut assembler = Assembler::new(path);
    let mut section: Option<Section> = None;
    let mut operations = Vec::new();

    loop {
        let finished = match read_step(&mut reader, &mut buf, path)? {
            Step::Open {
                name,
                attributes,
                empty,
            } => {
                if let Some(opened) = Section::from_name(&name) {
                    section = (!empty).then_some(opened);
                    None
                } else {
                    assembler.open(&name, attributes, empty)?
                }
            }
            Step::Close { name } => {
                if Section::from_name(&name).is_some() {
                    section = None;
                    None
                } else {
                    assembler.close(&name)
                }
            }
            Step::Eof => break,
            Step::Other => None,
        };
        let Some(element) = finished else {
            continue;
        };
        let operation = match section {
            Some(Section::Create) => ChangeOperation::Create(assembler.entity(element)?),
            Some(Section::Modify) => ChangeOperation::Modify(assembler.entity(element)?),
            Some(Section::Delete) => ChangeOperation::Delete(assembler.key(&element)?),
            None => {
                return Err(assembler.malformed(
                    element.kind.as_str(),
                    "entity outside a create, modify or delete section",
                ));
            }
        };
        operations.push(operation);
    }
    Ok(operations)
}
