//! Release manifest parsing
//!
//! The manifest groups builds as `project` → `platform` → `build`, each build
//! carrying `version`, `url`, `timestamp` and any number of `note` elements in
//! no particular order. The parser keeps an explicit stack of typed frames so
//! that text is only ever attributed to the build that encloses it.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;

use super::platform::Platform;
use crate::error::{StackError, StackResult};

/// Manifest project describing this launcher's own releases
pub const STACKMANAGER_PROJECT: &str = "stackmanager";

/// Newest build of one project for one platform
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionRecord {
    pub version: u64,
    pub download_url: String,
    pub timestamp: String,
    pub release_notes: String,
}

/// Parsed manifest: newest build per (project, platform)
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    projects: HashMap<String, HashMap<Platform, VersionRecord>>,
}

impl Manifest {
    pub fn parse(xml: &str) -> StackResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut manifest = Manifest::default();
        let mut stack: Vec<Frame> = Vec::new();

        loop {
            match reader.read_event().map_err(parse_error)? {
                Event::Start(start) => {
                    let frame = Frame::open(&stack, &start)?;
                    stack.push(frame);
                }
                Event::Empty(start) => {
                    let frame = Frame::open(&stack, &start)?;
                    frame.close(&mut stack, &mut manifest);
                }
                Event::Text(text) => {
                    if let Some(Frame::Field { text: buffer, .. }) = stack.last_mut() {
                        buffer.push_str(&text.unescape().map_err(parse_error)?);
                    }
                }
                Event::CData(data) => {
                    if let Some(Frame::Field { text: buffer, .. }) = stack.last_mut() {
                        buffer.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::End(_) => {
                    if let Some(frame) = stack.pop() {
                        frame.close(&mut stack, &mut manifest);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(manifest)
    }

    pub fn latest(&self, project: &str, platform: Platform) -> Option<&VersionRecord> {
        self.projects.get(project)?.get(&platform)
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Keep `record` unless an equal or newer build is already held
    fn offer(&mut self, project: &str, platform: Platform, record: VersionRecord) {
        let builds = self.projects.entry(project.to_string()).or_default();
        match builds.get(&platform) {
            Some(existing) if existing.version >= record.version => {}
            _ => {
                builds.insert(platform, record);
            }
        }
    }
}

/// Decide whether the manifest advertises a different build than the one running
///
/// Development builds (`dev` or an empty version) never report updates;
/// any other running version that differs from the latest one does.
pub fn update_available<'a>(
    manifest: &'a Manifest,
    running_version: &str,
    platform: Platform,
) -> Option<&'a VersionRecord> {
    let running = running_version.trim();
    if running.is_empty() || running.eq_ignore_ascii_case("dev") {
        return None;
    }

    let latest = manifest.latest(STACKMANAGER_PROJECT, platform)?;
    let same = match running.parse::<u64>() {
        Ok(version) => version == latest.version,
        Err(_) => false,
    };
    (!same).then_some(latest)
}

fn parse_error(error: impl std::fmt::Display) -> StackError {
    StackError::ManifestParse {
        message: error.to_string(),
    }
}

fn name_attribute(start: &BytesStart<'_>) -> StackResult<Option<String>> {
    let Some(attribute) = start.try_get_attribute("name").map_err(parse_error)? else {
        return Ok(None);
    };
    let value = attribute.unescape_value().map_err(parse_error)?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Version,
    Url,
    Timestamp,
    Note,
}

#[derive(Debug, Default)]
struct BuildDraft {
    version: String,
    url: String,
    timestamp: String,
    notes: Vec<String>,
}

impl BuildDraft {
    fn assign(&mut self, field: Field, text: String) {
        match field {
            Field::Version => self.version = text,
            Field::Url => self.url = text,
            Field::Timestamp => self.timestamp = text,
            Field::Note => self.notes.push(text),
        }
    }

    /// Builds without a positive integer version are not comparable
    fn into_record(self) -> Option<VersionRecord> {
        let version = self.version.trim().parse::<u64>().ok().filter(|v| *v > 0)?;
        Some(VersionRecord {
            version,
            download_url: self.url.trim().to_string(),
            timestamp: self.timestamp.trim().to_string(),
            release_notes: self.notes.join("\n"),
        })
    }
}

#[derive(Debug)]
enum Frame {
    Project { name: Option<String> },
    Platform { platform: Option<Platform>, best: Option<VersionRecord> },
    Build(BuildDraft),
    Field { field: Field, text: String },
    Ignored,
}

impl Frame {
    fn open(stack: &[Frame], start: &BytesStart<'_>) -> StackResult<Frame> {
        let parent = stack.last();
        let frame = match (start.name().as_ref(), parent) {
            (b"project", _) => Frame::Project {
                name: name_attribute(start)?,
            },
            (b"platform", Some(Frame::Project { name: Some(_) })) => Frame::Platform {
                platform: name_attribute(start)?.as_deref().and_then(Platform::from_manifest_name),
                best: None,
            },
            (b"build", Some(Frame::Platform { platform: Some(_), .. })) => Frame::Build(BuildDraft::default()),
            (tag, Some(Frame::Build(_))) => match tag {
                b"version" => Frame::Field { field: Field::Version, text: String::new() },
                b"url" => Frame::Field { field: Field::Url, text: String::new() },
                b"timestamp" => Frame::Field { field: Field::Timestamp, text: String::new() },
                b"note" => Frame::Field { field: Field::Note, text: String::new() },
                _ => Frame::Ignored,
            },
            _ => Frame::Ignored,
        };
        Ok(frame)
    }

    /// Fold a finished frame into its parent (or the manifest)
    fn close(self, stack: &mut [Frame], manifest: &mut Manifest) {
        match self {
            Frame::Field { field, text } => {
                if let Some(Frame::Build(draft)) = stack.last_mut() {
                    draft.assign(field, text);
                }
            }
            Frame::Build(draft) => {
                let Some(record) = draft.into_record() else {
                    return;
                };
                if let Some(Frame::Platform { best, .. }) = stack.last_mut() {
                    // strictly greater replaces, so the first of equal versions wins
                    let newer = best.as_ref().map_or(true, |current| record.version > current.version);
                    if newer {
                        *best = Some(record);
                    }
                }
            }
            Frame::Platform {
                platform: Some(platform),
                best: Some(record),
            } => {
                if let Some(Frame::Project { name: Some(project) }) = stack.last() {
                    manifest.offer(project, platform, record);
                }
            }
            Frame::Platform { .. } | Frame::Project { .. } | Frame::Ignored => {}
        }
    }
}
