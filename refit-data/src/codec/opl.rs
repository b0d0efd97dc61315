//! OPL, the object-per-line text format.
//!
//! A line is a space-separated list of fields, each introduced by a single
//! letter: `n12 v3 dV Thighway=crossing x11.6 y52.1`. Characters that would
//! break the field structure are written as `%<hex code point>%`.

use std::io::{BufRead, Lines, Write};

use camino::{Utf8Path, Utf8PathBuf};
use geo::Coord;
use log::debug;
use refit_core::{
    CodecError, Entity, EntityKind, EntitySink, Member, Node, Relation, Tags, Way,
};

use super::{InputStream, OutputStream};

fn needs_escape(ch: char) -> bool {
    if ch.is_ascii() {
        !ch.is_ascii_graphic() || matches!(ch, ',' | '=' | '@' | '%')
    } else {
        !ch.is_alphanumeric()
    }
}

/// Escape a string for use inside an OPL field.
///
/// # Examples
/// ```
/// use refit_data::codec::opl_escape;
///
/// assert_eq!(opl_escape("Main St"), "Main%20%St");
/// assert_eq!(opl_escape("a=b,c"), "a%3d%b%2c%c");
/// ```
#[must_use]
pub fn opl_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if needs_escape(ch) {
            escaped.push_str(&format!("%{:x}%", u32::from(ch)));
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

fn unescape(value: &str) -> Result<String, String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let hex: String = chars.by_ref().take_while(|digit| *digit != '%').collect();
        let decoded = u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| format!("invalid escape %{hex}%"))?;
        out.push(decoded);
    }
    Ok(out)
}

/// Fields of one OPL line, split but not yet interpreted.
#[derive(Debug, Default)]
struct Fields<'a> {
    version: Option<&'a str>,
    deleted: bool,
    tags: Option<&'a str>,
    lon: Option<&'a str>,
    lat: Option<&'a str>,
    nodes: Option<&'a str>,
    members: Option<&'a str>,
}

fn parse_line(line: &str) -> Result<Option<Entity>, String> {
    let mut tokens = line.split(' ').filter(|token| !token.is_empty());
    let Some(head) = tokens.next() else {
        return Ok(None);
    };
    let mut head_chars = head.chars();
    let kind = head_chars
        .next()
        .and_then(EntityKind::from_letter)
        .ok_or_else(|| format!("unknown entity type in {head:?}"))?;
    let id: i64 = head_chars
        .as_str()
        .parse()
        .map_err(|_| format!("invalid id in {head:?}"))?;

    let mut fields = Fields::default();
    for token in tokens {
        let mut token_chars = token.chars();
        let Some(letter) = token_chars.next() else {
            continue;
        };
        let value = token_chars.as_str();
        match letter {
            'v' => fields.version = Some(value),
            'd' => fields.deleted = value == "D",
            'T' => fields.tags = Some(value),
            'x' => fields.lon = Some(value),
            'y' => fields.lat = Some(value),
            'N' => fields.nodes = Some(value),
            'M' => fields.members = Some(value),
            // changeset, timestamp, uid and user are not carried
            'c' | 't' | 'i' | 'u' => {}
            other => return Err(format!("unknown field {other:?}")),
        }
    }
    if fields.deleted {
        debug!("skipping deleted {kind} {id}");
        return Ok(None);
    }

    let version = fields
        .version
        .map(|raw| raw.parse::<u32>().map_err(|_| format!("invalid version {raw:?}")))
        .transpose()?;
    let tags = parse_tags(fields.tags.unwrap_or_default())?;
    let entity = match kind {
        EntityKind::Node => {
            let coordinate = |raw: Option<&str>, axis: &str| -> Result<f64, String> {
                raw.filter(|value| !value.is_empty())
                    .ok_or_else(|| format!("node {id} has no {axis} coordinate"))?
                    .parse()
                    .map_err(|_| format!("invalid {axis} coordinate for node {id}"))
            };
            Entity::Node(Node {
                id,
                version,
                tags,
                location: Coord {
                    x: coordinate(fields.lon, "x")?,
                    y: coordinate(fields.lat, "y")?,
                },
            })
        }
        EntityKind::Way => Entity::Way(Way {
            id,
            version,
            tags,
            node_refs: parse_node_list(fields.nodes.unwrap_or_default())?,
        }),
        EntityKind::Relation => Entity::Relation(Relation {
            id,
            version,
            tags,
            members: parse_members(fields.members.unwrap_or_default())?,
        }),
    };
    Ok(Some(entity))
}

fn parse_tags(raw: &str) -> Result<Tags, String> {
    let mut tags = Tags::new();
    for pair in raw.split(',').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("tag {pair:?} has no '='"))?;
        tags.insert(unescape(key)?, unescape(value)?);
    }
    Ok(tags)
}

fn parse_node_list(raw: &str) -> Result<Vec<i64>, String> {
    raw.split(',')
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.strip_prefix('n')
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| format!("invalid node reference {item:?}"))
        })
        .collect()
}

fn parse_members(raw: &str) -> Result<Vec<Member>, String> {
    raw.split(',')
        .filter(|item| !item.is_empty())
        .map(|item| {
            let (reference, role) = item.split_once('@').unwrap_or((item, ""));
            let mut chars = reference.chars();
            let kind = chars
                .next()
                .and_then(EntityKind::from_letter)
                .ok_or_else(|| format!("invalid member type in {item:?}"))?;
            let id = chars
                .as_str()
                .parse()
                .map_err(|_| format!("invalid member id in {item:?}"))?;
            Ok(Member::new(kind, id, unescape(role)?))
        })
        .collect()
}

/// Lazy OPL reader.
#[derive(Debug)]
pub struct OplReader {
    path: Utf8PathBuf,
    lines: Lines<InputStream>,
    line_number: usize,
    done: bool,
}

impl OplReader {
    /// Parse OPL read from `input`; `path` labels errors.
    pub fn new(path: &Utf8Path, input: InputStream) -> Self {
        Self {
            path: path.to_path_buf(),
            lines: input.lines(),
            line_number: 0,
            done: false,
        }
    }
}

impl Iterator for OplReader {
    type Item = Result<Entity, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let Some(line) = self.lines.next() else {
                self.done = true;
                break;
            };
            self.line_number += 1;
            let line = match line {
                Ok(line) => line,
                Err(source) => {
                    self.done = true;
                    return Some(Err(CodecError::Read {
                        path: self.path.clone(),
                        source,
                    }));
                }
            };
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match parse_line(trimmed) {
                Ok(Some(entity)) => return Some(Ok(entity)),
                Ok(None) => {}
                Err(reason) => {
                    self.done = true;
                    return Some(Err(CodecError::Malformed {
                        path: self.path.clone(),
                        location: format!("line {}", self.line_number),
                        reason,
                    }));
                }
            }
        }
        None
    }
}

fn format_tags(tags: &Tags) -> String {
    tags.iter()
        .map(|(key, value)| format!("{}={}", opl_escape(key), opl_escape(value)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Render one entity as an OPL line, without the trailing newline.
fn format_line(entity: &Entity) -> String {
    let mut line = format!("{}{}", entity.kind().letter(), entity.id());
    if let Some(version) = entity.version() {
        line.push_str(&format!(" v{version}"));
    }
    line.push_str(&format!(" dV T{}", format_tags(entity.tags())));
    match entity {
        Entity::Node(node) => {
            line.push_str(&format!(" x{:.7} y{:.7}", node.location.x, node.location.y));
        }
        Entity::Way(way) => {
            let refs: Vec<String> = way.node_refs.iter().map(|id| format!("n{id}")).collect();
            line.push_str(&format!(" N{}", refs.join(",")));
        }
        Entity::Relation(relation) => {
            let members: Vec<String> = relation
                .members
                .iter()
                .map(|member| {
                    format!(
                        "{}{}@{}",
                        member.kind.letter(),
                        member.id,
                        opl_escape(&member.role)
                    )
                })
                .collect();
            line.push_str(&format!(" M{}", members.join(",")));
        }
    }
    line
}

/// Streaming OPL writer.
#[derive(Debug)]
pub struct OplWriter {
    path: Utf8PathBuf,
    out: OutputStream,
}

impl OplWriter {
    /// Write OPL lines into `out`.
    pub fn new(path: &Utf8Path, out: OutputStream) -> Self {
        Self {
            path: path.to_path_buf(),
            out,
        }
    }
}

impl EntitySink for OplWriter {
    fn write(&mut self, entity: &Entity) -> Result<(), CodecError> {
        writeln!(self.out, "{}", format_line(entity)).map_err(|source| CodecError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn finish(self: Box<Self>) -> Result<(), CodecError> {
        let Self { path, out } = *self;
        out.finish()
            .map_err(|source| CodecError::Write { path, source })
    }
}
