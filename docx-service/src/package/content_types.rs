use super::{PackageError, read_attributes, CONTENT_TYPES_PART};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

/// `[Content_Types].xml`: extension defaults plus per-part overrides.
///
/// Part names are stored without the leading `/` used on the wire and
/// compared case-insensitively, as OPC part names are.
#[derive(Debug, Clone, Default)]
pub struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn with_defaults() -> Self {
        let mut types = Self::default();
        types.ensure_default("rels", super::CT_RELATIONSHIPS);
        types.ensure_default("xml", "application/xml");
        types
    }

    pub fn parse(xml: &[u8]) -> Result<Self, PackageError> {
        let mut reader = Reader::from_reader(xml);
        let mut types = Self::default();

        loop {
            match reader
                .read_event()
                .map_err(|e| PackageError::xml(CONTENT_TYPES_PART, e))?
            {
                Event::Start(e) | Event::Empty(e) => {
                    let local = e.local_name();
                    let is_default = local.as_ref() == b"Default";
                    if !is_default && local.as_ref() != b"Override" {
                        continue;
                    }

                    let mut key = None;
                    let mut content_type = None;
                    for (name, value) in read_attributes(CONTENT_TYPES_PART, &e)? {
                        match name.as_str() {
                            "Extension" | "PartName" => key = Some(value),
                            "ContentType" => content_type = Some(value),
                            _ => {}
                        }
                    }

                    if let (Some(key), Some(content_type)) = (key, content_type) {
                        if is_default {
                            types.defaults.push((key, content_type));
                        } else {
                            let part = key.trim_start_matches('/').to_string();
                            types.overrides.push((part, content_type));
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(types)
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(&format!(r#"<Types xmlns="{CONTENT_TYPES_NS}">"#));
        for (extension, content_type) in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape(extension.as_str()),
                escape(content_type.as_str())
            ));
        }
        for (part, content_type) in &self.overrides {
            xml.push_str(&format!(
                r#"<Override PartName="/{}" ContentType="{}"/>"#,
                escape(part.as_str()),
                escape(content_type.as_str())
            ));
        }
        xml.push_str("</Types>");
        xml
    }

    pub fn default_for(&self, extension: &str) -> Option<&str> {
        self.defaults
            .iter()
            .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
            .map(|(_, ct)| ct.as_str())
    }

    /// Register `extension` unless a default already covers it.
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) {
        if self.default_for(extension).is_none() {
            self.defaults
                .push((extension.to_string(), content_type.to_string()));
        }
    }

    pub fn override_for(&self, part: &str) -> Option<&str> {
        let part = part.trim_start_matches('/');
        self.overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(part))
            .map(|(_, ct)| ct.as_str())
    }

    pub fn set_override(&mut self, part: &str, content_type: &str) {
        let part = part.trim_start_matches('/');
        match self
            .overrides
            .iter_mut()
            .find(|(name, _)| name.eq_ignore_ascii_case(part))
        {
            Some(entry) => entry.1 = content_type.to_string(),
            None => self
                .overrides
                .push((part.to_string(), content_type.to_string())),
        }
    }
}
