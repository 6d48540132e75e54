//! Section-property rewriting for the main document part.

use super::markup::{R_NS, W_NS};
use super::PackageError;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// Point the document's final section at the given header/footer parts.
///
/// The last `w:sectPr` that is a direct child of `w:body` loses every
/// existing `w:headerReference`/`w:footerReference` and gains default
/// references to `header_rid` and `footer_rid` as its first children.
/// A missing `w:sectPr` (or `w:body`) is created. Everything else is copied
/// through byte for byte.
pub fn attach_header_footer(
    part: &str,
    xml: &[u8],
    header_rid: &str,
    footer_rid: &str,
) -> Result<Vec<u8>, PackageError> {
    let target = body_section_count(part, xml)?;
    let references = format!(
        r#"<w:headerReference w:type="default" r:id="{}"/><w:footerReference w:type="default" r:id="{}"/>"#,
        quick_xml::escape::escape(header_rid),
        quick_xml::escape::escape(footer_rid),
    );
    let new_section = format!("<w:sectPr>{references}</w:sectPr>");

    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len() + 512));

    let mut depth = 0usize;
    let mut body_open = false;
    let mut body_seen = false;
    let mut sections_seen = 0usize;
    let mut in_target: Option<usize> = None;
    let mut skipping: Option<usize> = None;
    let mut attached = false;

    loop {
        let event = reader.read_event().map_err(xml_error(part))?;

        if let Some(skip_depth) = skipping {
            match event {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    if depth == skip_depth {
                        skipping = None;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) => {
                let local = e.local_name().as_ref().to_vec();
                if depth == 0 {
                    writer
                        .write_event(Event::Start(with_namespaces(&e)))
                        .map_err(xml_error(part))?;
                } else if depth == 1 && local == b"body" {
                    body_open = true;
                    body_seen = true;
                    writer.write_event(Event::Start(e)).map_err(xml_error(part))?;
                } else if body_open && depth == 2 && local == b"sectPr" {
                    sections_seen += 1;
                    writer.write_event(Event::Start(e)).map_err(xml_error(part))?;
                    if sections_seen == target {
                        writer.get_mut().extend_from_slice(references.as_bytes());
                        attached = true;
                        in_target = Some(depth);
                    }
                } else if in_target.is_some_and(|d| depth == d + 1) && is_hdr_ftr_reference(&local)
                {
                    skipping = Some(depth);
                } else {
                    writer.write_event(Event::Start(e)).map_err(xml_error(part))?;
                }
                depth += 1;
            }
            Event::Empty(e) => {
                let local = e.local_name().as_ref().to_vec();
                if depth == 0 {
                    // `<w:document/>`: emit a full skeleton.
                    let root = with_namespaces(&e);
                    let name = String::from_utf8_lossy(root.name().as_ref()).into_owned();
                    writer.write_event(Event::Start(root)).map_err(xml_error(part))?;
                    writer
                        .get_mut()
                        .extend_from_slice(format!("<w:body>{new_section}</w:body>").as_bytes());
                    writer
                        .write_event(Event::End(BytesEnd::new(name)))
                        .map_err(xml_error(part))?;
                    body_seen = true;
                    attached = true;
                } else if depth == 1 && local == b"body" {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    writer.write_event(Event::Start(e)).map_err(xml_error(part))?;
                    writer.get_mut().extend_from_slice(new_section.as_bytes());
                    writer
                        .write_event(Event::End(BytesEnd::new(name)))
                        .map_err(xml_error(part))?;
                    body_seen = true;
                    attached = true;
                } else if body_open && depth == 2 && local == b"sectPr" {
                    sections_seen += 1;
                    if sections_seen == target {
                        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                        writer.write_event(Event::Start(e)).map_err(xml_error(part))?;
                        writer.get_mut().extend_from_slice(references.as_bytes());
                        writer
                            .write_event(Event::End(BytesEnd::new(name)))
                            .map_err(xml_error(part))?;
                        attached = true;
                    } else {
                        writer.write_event(Event::Empty(e)).map_err(xml_error(part))?;
                    }
                } else if in_target.is_some_and(|d| depth == d + 1) && is_hdr_ftr_reference(&local)
                {
                    // dropped
                } else {
                    writer.write_event(Event::Empty(e)).map_err(xml_error(part))?;
                }
            }
            Event::End(e) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| PackageError::xml(part, "unbalanced end tag"))?;
                let local = e.local_name().as_ref().to_vec();

                if in_target == Some(depth) {
                    in_target = None;
                }
                if depth == 1 && local == b"body" {
                    body_open = false;
                    if !attached {
                        writer.get_mut().extend_from_slice(new_section.as_bytes());
                        attached = true;
                    }
                }
                if depth == 0 && !body_seen {
                    writer
                        .get_mut()
                        .extend_from_slice(format!("<w:body>{new_section}</w:body>").as_bytes());
                    body_seen = true;
                    attached = true;
                }
                writer.write_event(Event::End(e)).map_err(xml_error(part))?;
            }
            Event::Eof => break,
            other => writer.write_event(other).map_err(xml_error(part))?,
        }
    }

    if !attached {
        return Err(PackageError::xml(part, "document has no root element"));
    }

    Ok(writer.into_inner())
}

fn xml_error<E: std::fmt::Display>(part: &str) -> impl Fn(E) -> PackageError + '_ {
    move |e| PackageError::xml(part, e)
}

fn is_hdr_ftr_reference(local: &[u8]) -> bool {
    local == b"headerReference" || local == b"footerReference"
}

/// Ordinal (1-based) of the last body-level `w:sectPr`, or 0 if none.
fn body_section_count(part: &str, xml: &[u8]) -> Result<usize, PackageError> {
    let mut reader = Reader::from_reader(xml);
    let mut depth = 0usize;
    let mut body_open = false;
    let mut count = 0usize;

    loop {
        match reader.read_event().map_err(|e| PackageError::xml(part, e))? {
            Event::Start(e) => {
                let local = e.local_name();
                if depth == 1 && local.as_ref() == b"body" {
                    body_open = true;
                } else if body_open && depth == 2 && local.as_ref() == b"sectPr" {
                    count += 1;
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if body_open && depth == 2 && e.local_name().as_ref() == b"sectPr" {
                    count += 1;
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if depth == 1 && e.local_name().as_ref() == b"body" {
                    body_open = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(count)
}

/// Copy of the root start tag with `xmlns:w` and `xmlns:r` declared.
fn with_namespaces(root: &BytesStart<'_>) -> BytesStart<'static> {
    let mut has_w = false;
    let mut has_r = false;
    for attr in root.attributes().with_checks(false).flatten() {
        match attr.key.as_ref() {
            b"xmlns:w" => has_w = true,
            b"xmlns:r" => has_r = true,
            _ => {}
        }
    }

    let mut start = root.clone().into_owned();
    if !has_w {
        start.push_attribute(("xmlns:w", W_NS));
    }
    if !has_r {
        start.push_attribute(("xmlns:r", R_NS));
    }
    start
}
