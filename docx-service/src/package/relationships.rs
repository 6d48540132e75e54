use super::{PackageError, read_attributes};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub target_mode: Option<String>,
}

/// Contents of one `.rels` part.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    entries: Vec<Relationship>,
}

impl Relationships {
    pub fn parse(part: &str, xml: &[u8]) -> Result<Self, PackageError> {
        let mut reader = Reader::from_reader(xml);
        let mut entries = Vec::new();

        loop {
            match reader.read_event().map_err(|e| PackageError::xml(part, e))? {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                    let mut rel = Relationship {
                        id: String::new(),
                        rel_type: String::new(),
                        target: String::new(),
                        target_mode: None,
                    };
                    for (key, value) in read_attributes(part, &e)? {
                        match key.as_str() {
                            "Id" => rel.id = value,
                            "Type" => rel.rel_type = value,
                            "Target" => rel.target = value,
                            "TargetMode" => rel.target_mode = Some(value),
                            _ => {}
                        }
                    }
                    if rel.id.is_empty() {
                        return Err(PackageError::xml(part, "relationship without Id"));
                    }
                    entries.push(rel);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(Self { entries })
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        xml.push_str(&format!(r#"<Relationships xmlns="{RELATIONSHIPS_NS}">"#));
        for rel in &self.entries {
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}""#,
                escape(rel.id.as_str()),
                escape(rel.rel_type.as_str()),
                escape(rel.target.as_str()),
            ));
            if let Some(mode) = &rel.target_mode {
                xml.push_str(&format!(r#" TargetMode="{}""#, escape(mode.as_str())));
            }
            xml.push_str("/>");
        }
        xml.push_str("</Relationships>");
        xml
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.id == id)
    }

    pub fn find_by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.entries.iter().find(|r| r.rel_type == rel_type)
    }

    /// Append an internal relationship and return its new id.
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let id = self.next_id();
        self.entries.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            target_mode: None,
        });
        id
    }

    /// `rId{n}` above the highest numeric id, or the lowest free one once
    /// the numbering has reached `u32::MAX`.
    fn next_id(&self) -> String {
        let highest = self
            .entries
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);

        // Ids are free-form; skip anything a producer already used verbatim.
        let free = |n: &u32| self.get(&format!("rId{n}")).is_none();
        let candidate = (highest..=u32::MAX)
            .skip(1)
            .find(free)
            .or_else(|| (1..=highest).find(free));

        match candidate {
            Some(n) => format!("rId{n}"),
            None => format!("rId{}", uuid::Uuid::new_v4().simple()),
        }
    }
}
