//! Minimal Office Open XML package model.
//!
//! A `.docx` file is a zip container of named parts. Parts reference each
//! other through relationship parts (`_rels/*.rels`) and declare their media
//! types in `[Content_Types].xml`. This module keeps every part as raw bytes
//! and only parses the pieces the header/footer composition touches.

pub mod content_types;
pub mod document;
pub mod markup;
pub mod relationships;

pub use content_types::ContentTypes;
pub use relationships::{Relationship, Relationships};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_HEADER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
pub const REL_FOOTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
pub const REL_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

pub const CT_MAIN_DOCUMENT: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
pub const CT_HEADER: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml";
pub const CT_FOOTER: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml";
pub const CT_RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";

pub const DEFAULT_MAIN_DOCUMENT: &str = "word/document.xml";

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("invalid zip container: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error while reading package: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("part {0} is missing from the package")]
    MissingPart(String),

    #[error("part {0} is not valid UTF-8")]
    Encoding(String),

    #[error("{scope} exceeds the {limit} byte inflation limit")]
    TooLarge { scope: String, limit: u64 },

    #[error("no free {0} id left in the package")]
    IdsExhausted(&'static str),
}

/// Caps on inflated size, applied while reading the zip container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageLimits {
    pub max_part_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: 64 * 1024 * 1024,
            max_total_bytes: 256 * 1024 * 1024,
        }
    }
}

impl PackageError {
    pub(crate) fn xml(part: &str, err: impl std::fmt::Display) -> Self {
        PackageError::Xml {
            part: part.to_string(),
            message: err.to_string(),
        }
    }
}

/// Unescaped `(name, value)` pairs of an element's attributes.
pub(crate) fn read_attributes(
    part: &str,
    element: &BytesStart<'_>,
) -> Result<Vec<(String, String)>, PackageError> {
    element
        .attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| PackageError::xml(part, e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| PackageError::xml(part, e))?
                .into_owned();
            Ok((key, value))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub data: Vec<u8>,
}

/// In-memory package. Part order is preserved on save; new parts go last.
#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    parts: Vec<Part>,
}

impl DocxPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PackageError> {
        Self::from_bytes_with_limits(bytes, PackageLimits::default())
    }

    /// Inflate every part, failing as soon as one part or the running
    /// total passes `limits`. Sizes declared by the archive are not trusted.
    pub fn from_bytes_with_limits(
        bytes: &[u8],
        limits: PackageLimits,
    ) -> Result<Self, PackageError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::new();
        let mut total: u64 = 0;

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().trim_start_matches('/').to_string();

            let remaining = limits.max_total_bytes.saturating_sub(total);
            let cap = limits.max_part_bytes.min(remaining);
            let mut data = Vec::new();
            file.by_ref()
                .take(cap.saturating_add(1))
                .read_to_end(&mut data)?;

            let size = data.len() as u64;
            if size > limits.max_part_bytes {
                return Err(PackageError::TooLarge {
                    scope: format!("part {name}"),
                    limit: limits.max_part_bytes,
                });
            }
            if size > remaining {
                return Err(PackageError::TooLarge {
                    scope: "package".to_string(),
                    limit: limits.max_total_bytes,
                });
            }

            total += size;
            parts.push(Part { name, data });
        }

        Ok(Self { parts })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PackageError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        // Consumers sniff the content-types part first.
        let ordered = self
            .parts
            .iter()
            .filter(|p| p.name == CONTENT_TYPES_PART)
            .chain(self.parts.iter().filter(|p| p.name != CONTENT_TYPES_PART));

        for part in ordered {
            writer.start_file(part.name.as_str(), options)?;
            writer.write_all(&part.data)?;
        }

        Ok(writer.finish()?.into_inner())
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.data.as_slice())
    }

    /// Part names compare case-insensitively, as OPC requires.
    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// Replace the part in place, or append it.
    pub fn put_part(&mut self, name: impl Into<String>, data: Vec<u8>) {
        let name = name.into();
        match self
            .parts
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(&name))
        {
            Some(part) => part.data = data,
            None => self.parts.push(Part { name, data }),
        }
    }

    pub fn content_types(&self) -> Result<ContentTypes, PackageError> {
        match self.part(CONTENT_TYPES_PART) {
            Some(xml) => ContentTypes::parse(xml),
            None => Ok(ContentTypes::with_defaults()),
        }
    }

    pub fn set_content_types(&mut self, types: &ContentTypes) {
        self.put_part(CONTENT_TYPES_PART, types.to_xml().into_bytes());
    }

    /// Relationships whose source is `source`; `""` is the package root.
    pub fn relationships(&self, source: &str) -> Result<Relationships, PackageError> {
        let path = rels_path_for(source);
        match self.part(&path) {
            Some(xml) => Relationships::parse(&path, xml),
            None => Ok(Relationships::default()),
        }
    }

    pub fn set_relationships(&mut self, source: &str, rels: &Relationships) {
        self.put_part(rels_path_for(source), rels.to_xml().into_bytes());
    }

    /// First free `{dir}/{stem}{n}.{ext}` with n starting at 1.
    pub fn next_part_name(&self, dir: &str, stem: &str, ext: &str) -> String {
        let mut n = 1;
        loop {
            let candidate = join_part(dir, &format!("{stem}{n}.{ext}"));
            if !self.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Every `wp:docPr/@id` used by the XML parts.
    pub fn drawing_ids(&self) -> BTreeSet<u32> {
        let mut ids = BTreeSet::new();
        for part in self.parts.iter().filter(|p| p.name.ends_with(".xml")) {
            collect_doc_pr_ids(&part.data, &mut ids);
        }
        ids
    }

    /// Locate the main document part through the root relationships,
    /// creating an empty document when the package has none.
    pub fn ensure_main_document(&mut self) -> Result<String, PackageError> {
        let mut root_rels = self.relationships("")?;

        let existing = root_rels
            .find_by_type(REL_OFFICE_DOCUMENT)
            .map(|rel| resolve_target("", &rel.target));

        let name = match existing {
            Some(name) => name,
            None => {
                root_rels.add(REL_OFFICE_DOCUMENT, DEFAULT_MAIN_DOCUMENT);
                self.set_relationships("", &root_rels);
                DEFAULT_MAIN_DOCUMENT.to_string()
            }
        };

        if !self.contains(&name) {
            tracing::debug!(part = %name, "Package has no main document, creating an empty one");
            self.put_part(name.clone(), markup::empty_document().into_bytes());
        }

        let mut types = self.content_types()?;
        if types.override_for(&name).is_none() {
            types.set_override(&name, CT_MAIN_DOCUMENT);
            types.ensure_default("rels", CT_RELATIONSHIPS);
            types.ensure_default("xml", "application/xml");
            self.set_content_types(&types);
        }

        Ok(name)
    }
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`; `""` -> `_rels/.rels`.
pub fn rels_path_for(part: &str) -> String {
    let (dir, file) = split_part(part);
    join_part(&join_part(dir, "_rels"), &format!("{file}.rels"))
}

/// Resolve a relationship target against the directory of its source part.
pub fn resolve_target(source: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute);
    }
    let (dir, _) = split_part(source);
    normalize(&join_part(dir, target))
}

/// Target of `part` as written in a relationship owned by `source`.
pub fn relative_target(source: &str, part: &str) -> String {
    let (dir, _) = split_part(source);
    if dir.is_empty() {
        return part.to_string();
    }
    match part.strip_prefix(dir).and_then(|rest| rest.strip_prefix('/')) {
        Some(rest) => rest.to_string(),
        None => format!("/{part}"),
    }
}

pub fn parent_dir(part: &str) -> &str {
    split_part(part).0
}

fn split_part(part: &str) -> (&str, &str) {
    match part.rfind('/') {
        Some(idx) => (&part[..idx], &part[idx + 1..]),
        None => ("", part),
    }
}

pub(crate) fn join_part(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

fn collect_doc_pr_ids(xml: &[u8], ids: &mut BTreeSet<u32>) {
    let mut reader = Reader::from_reader(xml);
    // Unreadable parts simply contribute nothing.
    while let Ok(event) = reader.read_event() {
        match event {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"docPr" => {
                let id = e
                    .attributes()
                    .with_checks(false)
                    .flatten()
                    .find(|a| a.key.as_ref() == b"id")
                    .and_then(|a| std::str::from_utf8(&a.value).ok()?.parse::<u32>().ok());
                if let Some(id) = id {
                    ids.insert(id);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
}

fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package_with(parts: &[(&str, &str)]) -> DocxPackage {
        let mut pkg = DocxPackage::default();
        for (name, data) in parts {
            pkg.put_part(*name, data.as_bytes().to_vec());
        }
        pkg
    }

    #[test]
    fn rels_paths() {
        assert_eq!(rels_path_for(""), "_rels/.rels");
        assert_eq!(
            rels_path_for("word/document.xml"),
            "word/_rels/document.xml.rels"
        );
        assert_eq!(
            rels_path_for("word/header1.xml"),
            "word/_rels/header1.xml.rels"
        );
    }

    #[test]
    fn targets_resolve_relative_to_source() {
        assert_eq!(
            resolve_target("", "word/document.xml"),
            "word/document.xml"
        );
        assert_eq!(
            resolve_target("word/document.xml", "media/image1.png"),
            "word/media/image1.png"
        );
        assert_eq!(
            resolve_target("word/document.xml", "../customXml/item1.xml"),
            "customXml/item1.xml"
        );
        assert_eq!(
            resolve_target("word/document.xml", "/word/styles.xml"),
            "word/styles.xml"
        );
        assert_eq!(
            relative_target("word/document.xml", "word/header1.xml"),
            "header1.xml"
        );
        assert_eq!(
            relative_target("word/document.xml", "other/header1.xml"),
            "/other/header1.xml"
        );
    }

    #[test]
    fn next_part_name_skips_taken_names() {
        let pkg = package_with(&[("word/header1.xml", ""), ("word/header2.xml", "")]);
        assert_eq!(
            pkg.next_part_name("word", "header", "xml"),
            "word/header3.xml"
        );
        assert_eq!(
            pkg.next_part_name("word", "footer", "xml"),
            "word/footer1.xml"
        );
    }

    #[test]
    fn zip_round_trip_keeps_parts() {
        let pkg = package_with(&[
            ("word/document.xml", "<w:document/>"),
            (CONTENT_TYPES_PART, "<Types/>"),
        ]);

        let reopened = DocxPackage::from_bytes(&pkg.to_bytes().unwrap()).unwrap();

        let names: Vec<&str> = reopened.part_names().collect();
        assert_eq!(names, vec![CONTENT_TYPES_PART, "word/document.xml"]);
        assert_eq!(
            reopened.part("word/document.xml"),
            Some("<w:document/>".as_bytes())
        );
    }

    #[test]
    fn drawing_ids_scan_xml_parts() {
        let pkg = package_with(&[
            (
                "word/document.xml",
                r#"<w:document><wp:docPr id="7" name="a"/><wp:docPr id="3" name="b"/></w:document>"#,
            ),
            ("word/header1.xml", r#"<w:hdr><wp:docPr id="12" name="c"/></w:hdr>"#),
            ("word/media/image1.png", "<wp:docPr id=\"99\"/>"),
        ]);

        assert_eq!(pkg.drawing_ids().into_iter().collect::<Vec<_>>(), [3, 7, 12]);
        assert!(DocxPackage::default().drawing_ids().is_empty());
    }

    fn deflated_zip(parts: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn compressible_part_over_limit_is_rejected() {
        let bytes = deflated_zip(&[("word/document.xml", vec![b'a'; 4 * 1024 * 1024])]);
        assert!(bytes.len() < 64 * 1024);

        let limits = PackageLimits {
            max_part_bytes: 1024 * 1024,
            max_total_bytes: 8 * 1024 * 1024,
        };
        let err = DocxPackage::from_bytes_with_limits(&bytes, limits).unwrap_err();

        assert!(matches!(
            err,
            PackageError::TooLarge { limit, .. } if limit == 1024 * 1024
        ));
    }

    #[test]
    fn total_inflated_size_is_capped() {
        let bytes = deflated_zip(&[
            ("word/document.xml", vec![b'a'; 600 * 1024]),
            ("word/styles.xml", vec![b'b'; 600 * 1024]),
        ]);
        let limits = PackageLimits {
            max_part_bytes: 1024 * 1024,
            max_total_bytes: 1024 * 1024,
        };

        let err = DocxPackage::from_bytes_with_limits(&bytes, limits).unwrap_err();
        assert!(matches!(err, PackageError::TooLarge { ref scope, .. } if scope == "package"));

        let roomy = PackageLimits {
            max_part_bytes: 1024 * 1024,
            max_total_bytes: 2 * 1024 * 1024,
        };
        let pkg = DocxPackage::from_bytes_with_limits(&bytes, roomy).unwrap();
        assert_eq!(pkg.part("word/styles.xml").map(<[u8]>::len), Some(600 * 1024));
    }

    #[test]
    fn part_names_ignore_case() {
        let pkg = package_with(&[("word/Header1.xml", "<w:hdr/>")]);

        assert!(pkg.contains("word/header1.xml"));
        assert_eq!(pkg.part("WORD/HEADER1.XML"), Some("<w:hdr/>".as_bytes()));
        assert_eq!(
            pkg.next_part_name("word", "header", "xml"),
            "word/header2.xml"
        );
    }

    #[test]
    fn non_zip_bytes_are_rejected() {
        let err = DocxPackage::from_bytes(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, PackageError::Zip(_)));
    }

    #[test]
    fn ensure_main_document_creates_missing_document() {
        let mut pkg = DocxPackage::default();

        let name = pkg.ensure_main_document().unwrap();

        assert_eq!(name, DEFAULT_MAIN_DOCUMENT);
        assert!(pkg.contains(DEFAULT_MAIN_DOCUMENT));
        let rels = pkg.relationships("").unwrap();
        assert_eq!(
            rels.find_by_type(REL_OFFICE_DOCUMENT).unwrap().target,
            DEFAULT_MAIN_DOCUMENT
        );
        let types = pkg.content_types().unwrap();
        assert_eq!(
            types.override_for(DEFAULT_MAIN_DOCUMENT),
            Some(CT_MAIN_DOCUMENT)
        );
    }

    #[test]
    fn ensure_main_document_follows_root_relationship() {
        let mut pkg = package_with(&[
            (
                "_rels/.rels",
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="/word/main.xml"/></Relationships>"#,
            ),
            ("word/main.xml", "<w:document/>"),
        ]);

        let name = pkg.ensure_main_document().unwrap();

        assert_eq!(name, "word/main.xml");
        assert_eq!(pkg.part("word/main.xml"), Some("<w:document/>".as_bytes()));
        assert!(!pkg.contains(DEFAULT_MAIN_DOCUMENT));
    }
}
