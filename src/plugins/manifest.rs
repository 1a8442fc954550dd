//! Plugin manifest parsing
//!
//! A manifest is an ordered list of plugin libraries to load at startup.
//! Order matters: a plugin may rely on capabilities registered with the host
//! by plugins listed before it, so entries are returned in document order and
//! a manifest with any invalid entry is rejected as a whole.
//!
//! Three encodings are accepted. XML is the format existing deployments use:
//!
//! ```xml
//! <config>
//!   <plugin path="OgreRenderingModule" />
//!   <plugin path="/opt/hearth/libaudio.so" args="--device default" />
//! </config>
//! ```
//!
//! YAML and JSON carry the same records, either under a `plugins` key or as a
//! bare list, with plain strings as shorthand for `{ path: ... }`.

use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use tracing::debug;

use super::error::{PluginError, Result};

/// One plugin record from a manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Library path or bare plugin name, resolved later by the loader
    pub path: String,
    /// Opaque argument string handed to the plugin's entry point
    pub args: Option<String>,
}

impl ManifestEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            args: None,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }
}

/// Encoding of a manifest document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Xml,
    Yaml,
    Json,
}

impl ManifestFormat {
    /// Pick the format from the file extension, falling back to sniffing the
    /// first non-whitespace character of the document
    #[must_use]
    pub fn detect(path: &Path, contents: &str) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("xml") => Self::Xml,
            Some("yaml" | "yml") => Self::Yaml,
            Some("json") => Self::Json,
            _ => match contents.trim_start().chars().next() {
                Some('<') => Self::Xml,
                Some('{' | '[') => Self::Json,
                _ => Self::Yaml,
            },
        }
    }
}

/// Reads plugin manifests
pub struct ManifestParser;

impl ManifestParser {
    /// Parse the manifest at `path`
    ///
    /// # Errors
    /// Returns `ManifestNotFound` if the file cannot be read and
    /// `ManifestMalformed` if any part of it violates the manifest schema.
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Vec<ManifestEntry>> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| PluginError::ManifestNotFound {
            path: path.to_path_buf(),
            source,
        })?;

        let format = ManifestFormat::detect(path, &contents);
        debug!("Parsing plugin manifest {} as {:?}", path.display(), format);

        Self::parse_str(&contents, format, path)
    }

    /// Parse an in-memory manifest; `origin` is only used in error reports
    ///
    /// # Errors
    /// Returns `ManifestMalformed` if the document violates the manifest schema.
    pub fn parse_str(contents: &str, format: ManifestFormat, origin: &Path) -> Result<Vec<ManifestEntry>> {
        let entries = match format {
            ManifestFormat::Xml => parse_xml(contents),
            ManifestFormat::Yaml => serde_yaml::from_str::<Document>(contents)
                .map_err(|e| e.to_string())
                .and_then(Document::into_entries),
            ManifestFormat::Json => serde_json::from_str::<Document>(contents)
                .map_err(|e| e.to_string())
                .and_then(Document::into_entries),
        }
        .map_err(|reason| malformed(origin, reason))?;

        // A NUL byte cannot cross the C entry point boundary
        if let Some(index) = entries
            .iter()
            .position(|entry| entry.args.as_deref().is_some_and(|args| args.contains('\0')))
        {
            return Err(malformed(
                origin,
                format!("entry {} has an argument string containing NUL", index + 1),
            ));
        }

        Ok(entries)
    }
}

fn malformed(origin: &Path, reason: String) -> PluginError {
    PluginError::ManifestMalformed {
        path: origin.to_path_buf(),
        reason,
    }
}

fn require_path(index: usize, path: Option<String>) -> std::result::Result<String, String> {
    match path {
        Some(path) if !path.trim().is_empty() => Ok(path),
        Some(_) => Err(format!("entry {} has an empty path", index + 1)),
        None => Err(format!("entry {} is missing its path", index + 1)),
    }
}

fn parse_xml(contents: &str) -> std::result::Result<Vec<ManifestEntry>, String> {
    let mut reader = Reader::from_str(contents);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("invalid XML at byte {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Start(element) => {
                visit_element(&element, depth, &mut seen_root, &mut entries)?;
                depth += 1;
            }
            Event::Empty(element) => {
                visit_element(&element, depth, &mut seen_root, &mut entries)?;
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err("unexpected end of document inside an open element".to_string());
    }
    if !seen_root {
        return Err("document has no root element".to_string());
    }

    Ok(entries)
}

fn visit_element(
    element: &BytesStart<'_>,
    depth: usize,
    seen_root: &mut bool,
    entries: &mut Vec<ManifestEntry>,
) -> std::result::Result<(), String> {
    if depth == 0 {
        if *seen_root {
            return Err("document has more than one root element".to_string());
        }
        *seen_root = true;
        return Ok(());
    }

    // Only direct children of the root describe plugins
    if depth != 1 || element.name().as_ref() != b"plugin" {
        debug!(
            "Ignoring manifest element <{}>",
            String::from_utf8_lossy(element.name().as_ref())
        );
        return Ok(());
    }

    let mut path = None;
    let mut args = None;
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| format!("invalid attribute: {e}"))?;
        let value = attribute
            .unescape_value()
            .map_err(|e| format!("invalid attribute value: {e}"))?
            .into_owned();
        match attribute.key.as_ref() {
            b"path" => path = Some(value),
            b"args" => args = Some(value),
            _ => {}
        }
    }

    let path = require_path(entries.len(), path)?;
    entries.push(ManifestEntry { path, args });
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Listed { plugins: Vec<RawEntry> },
    Bare(Vec<RawEntry>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Path(String),
    Record {
        #[serde(default)]
        path: Option<String>,
        #[serde(default)]
        args: Option<String>,
    },
}

impl Document {
    fn into_entries(self) -> std::result::Result<Vec<ManifestEntry>, String> {
        let raw = match self {
            Self::Listed { plugins } | Self::Bare(plugins) => plugins,
        };

        raw.into_iter()
            .enumerate()
            .map(|(index, entry)| match entry {
                RawEntry::Path(path) => Ok(ManifestEntry {
                    path: require_path(index, Some(path))?,
                    args: None,
                }),
                RawEntry::Record { path, args } => Ok(ManifestEntry {
                    path: require_path(index, path)?,
                    args,
                }),
            })
            .collect()
    }
}

/// Default manifest file name looked up next to the host configuration
pub const DEFAULT_MANIFEST: &str = "plugins.xml";

/// Where a manifest path given on the command line or in config points to
#[must_use]
pub fn resolve_manifest_path(base: Option<&Path>, manifest: &Path) -> PathBuf {
    match base {
        Some(base) if manifest.is_relative() => base.join(manifest),
        _ => manifest.to_path_buf(),
    }
}
