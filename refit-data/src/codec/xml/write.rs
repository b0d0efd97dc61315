//! OSM XML and OSM change XML output.

use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use quick_xml::escape::escape;
use refit_core::{ChangeOperation, CodecError, Entity, EntitySink, Tags};

use crate::codec::OutputStream;

const GENERATOR: &str = concat!("refit ", env!("CARGO_PKG_VERSION"));

fn write_tags(out: &mut impl Write, tags: &Tags, indent: &str) -> io::Result<()> {
    for (key, value) in tags {
        writeln!(
            out,
            r#"{indent}  <tag k="{}" v="{}"/>"#,
            escape(key.as_str()),
            escape(value.as_str())
        )?;
    }
    Ok(())
}

fn write_version(out: &mut impl Write, version: Option<u32>) -> io::Result<()> {
    match version {
        Some(version) => write!(out, r#" version="{version}""#),
        None => Ok(()),
    }
}

/// Write one entity element at the given indentation.
fn write_entity(out: &mut impl Write, entity: &Entity, indent: &str) -> io::Result<()> {
    let kind = entity.kind().as_str();
    write!(out, r#"{indent}<{kind} id="{}""#, entity.id())?;
    write_version(out, entity.version())?;
    let has_children = match entity {
        Entity::Node(node) => {
            write!(
                out,
                r#" lat="{:.7}" lon="{:.7}""#,
                node.location.y, node.location.x
            )?;
            !node.tags.is_empty()
        }
        Entity::Way(way) => !way.tags.is_empty() || !way.node_refs.is_empty(),
        Entity::Relation(relation) => !relation.tags.is_empty() || !relation.members.is_empty(),
    };
    if !has_children {
        return writeln!(out, "/>");
    }
    writeln!(out, ">")?;
    match entity {
        Entity::Node(_) => {}
        Entity::Way(way) => {
            for reference in &way.node_refs {
                writeln!(out, r#"{indent}  <nd ref="{reference}"/>"#)?;
            }
        }
        Entity::Relation(relation) => {
            for member in &relation.members {
                writeln!(
                    out,
                    r#"{indent}  <member type="{}" ref="{}" role="{}"/>"#,
                    member.kind,
                    member.id,
                    escape(member.role.as_str())
                )?;
            }
        }
    }
    write_tags(out, entity.tags(), indent)?;
    writeln!(out, "{indent}</{kind}>")
}

/// Streaming OSM XML writer.
#[derive(Debug)]
pub struct OsmXmlWriter {
    path: Utf8PathBuf,
    out: OutputStream,
}

impl OsmXmlWriter {
    /// Start an OSM XML document.
    ///
    /// # Errors
    /// Returns [`CodecError::Write`] if the prologue cannot be written.
    pub fn new(path: &Utf8Path, mut out: OutputStream) -> Result<Self, CodecError> {
        write!(
            out,
            "<?xml version='1.0' encoding='UTF-8'?>\n<osm version=\"0.6\" generator=\"{GENERATOR}\">\n"
        )
        .map_err(|source| CodecError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            out,
        })
    }
}

impl EntitySink for OsmXmlWriter {
    fn write(&mut self, entity: &Entity) -> Result<(), CodecError> {
        write_entity(&mut self.out, entity, "  ").map_err(|source| CodecError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn finish(self: Box<Self>) -> Result<(), CodecError> {
        let Self { path, mut out } = *self;
        writeln!(out, "</osm>")
            .and_then(|()| out.finish())
            .map_err(|source| CodecError::Write { path, source })
    }
}

fn write_section(
    out: &mut impl Write,
    name: &str,
    operations: &[ChangeOperation],
    keep: impl Fn(&ChangeOperation) -> bool,
) -> io::Result<()> {
    let mut selected = operations.iter().filter(|operation| keep(operation)).peekable();
    if selected.peek().is_none() {
        return Ok(());
    }
    writeln!(out, "  <{name}>")?;
    for operation in selected {
        match operation {
            ChangeOperation::Create(entity) | ChangeOperation::Modify(entity) => {
                write_entity(out, entity, "    ")?;
            }
            ChangeOperation::Delete(key) => {
                writeln!(out, r#"    <{} id="{}"/>"#, key.kind, key.id)?;
            }
        }
    }
    writeln!(out, "  </{name}>")
}

fn write_osc_body(out: &mut OutputStream, operations: &[ChangeOperation]) -> io::Result<()> {
    writeln!(out, "<?xml version='1.0' encoding='UTF-8'?>")?;
    writeln!(out, r#"<osmChange version="0.6" generator="{GENERATOR}">"#)?;
    write_section(out, "create", operations, |operation| {
        matches!(operation, ChangeOperation::Create(_))
    })?;
    write_section(out, "modify", operations, |operation| {
        matches!(operation, ChangeOperation::Modify(_))
    })?;
    write_section(out, "delete", operations, |operation| {
        matches!(operation, ChangeOperation::Delete(_))
    })?;
    writeln!(out, "</osmChange>")
}

/// Write an OSM change document with create, modify and delete sections.
///
/// Operations are grouped by section; within a section the given order is
/// kept. Empty sections are omitted.
///
/// # Errors
/// Returns [`CodecError::Write`] on I/O failure.
pub fn write_osc(
    path: &Utf8Path,
    mut out: OutputStream,
    operations: &[ChangeOperation],
) -> Result<(), CodecError> {
    write_osc_body(&mut out, operations)
        .and_then(|()| out.finish())
        .map_err(|source| CodecError::Write {
            path: path.to_path_buf(),
            source,
        })
}
