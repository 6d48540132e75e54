//! WordprocessingML / DrawingML fragments for generated parts.

use quick_xml::escape::escape;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WP_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// English Metric Units per screen pixel at 96 DPI.
pub const EMU_PER_PIXEL: i64 = 9525;

/// Size of a drawing in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub cx: i64,
    pub cy: i64,
}

impl Extent {
    /// Fixed size used for header logos and plain header/footer images.
    pub const INLINE_DEFAULT: Extent = Extent {
        cx: 990_000,
        cy: 792_000,
    };

    pub const fn from_pixels(width: i64, height: i64) -> Self {
        Self {
            cx: width * EMU_PER_PIXEL,
            cy: height * EMU_PER_PIXEL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
}

/// One embedded picture: its relationship id plus drawing properties.
#[derive(Debug, Clone)]
pub struct InlineImage<'a> {
    pub relationship_id: &'a str,
    pub extent: Extent,
    /// `wp:docPr/@id`, unique among drawings of the document.
    pub drawing_id: u32,
    pub name: &'a str,
}

pub fn empty_document() -> String {
    format!(
        r#"{XML_DECL}<w:document xmlns:w="{W_NS}" xmlns:r="{R_NS}"><w:body><w:sectPr/></w:body></w:document>"#
    )
}

pub fn header(content: &str) -> String {
    story_root("w:hdr", content)
}

pub fn footer(content: &str) -> String {
    story_root("w:ftr", content)
}

fn story_root(tag: &str, content: &str) -> String {
    format!(
        r#"{XML_DECL}<{tag} xmlns:w="{W_NS}" xmlns:r="{R_NS}" xmlns:wp="{WP_NS}" xmlns:a="{A_NS}" xmlns:pic="{PIC_NS}">{content}</{tag}>"#
    )
}

pub fn empty_paragraph() -> String {
    "<w:p/>".to_string()
}

pub fn text_paragraph(text: &str) -> String {
    format!("<w:p><w:r>{}</w:r></w:p>", text_element(text))
}

/// Paragraph whose lines are separated by `w:br` inside a single run.
pub fn multiline_paragraph(lines: &[&str]) -> String {
    let body = lines
        .iter()
        .map(|line| text_element(line))
        .collect::<Vec<_>>()
        .join("<w:br/>");
    format!("<w:p><w:r>{body}</w:r></w:p>")
}

pub fn image_paragraph(image: &InlineImage<'_>, alignment: Alignment) -> String {
    let properties = match alignment {
        Alignment::Left => String::new(),
        Alignment::Center => r#"<w:pPr><w:jc w:val="center"/></w:pPr>"#.to_string(),
    };
    format!("<w:p>{properties}{}</w:p>", drawing_run(image))
}

fn text_element(text: &str) -> String {
    format!(r#"<w:t xml:space="preserve">{}</w:t>"#, escape(text))
}

/// `w:r` holding an inline picture that references `image.relationship_id`.
pub fn drawing_run(image: &InlineImage<'_>) -> String {
    let Extent { cx, cy } = image.extent;
    let name = escape(image.name);
    let rid = escape(image.relationship_id);
    let id = image.drawing_id;

    format!(
        concat!(
            r#"<w:r><w:drawing>"#,
            r#"<wp:inline distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:effectExtent l="0" t="0" r="0" b="0"/>"#,
            r#"<wp:docPr id="{id}" name="{name}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic><a:graphicData uri="{pic_ns}">"#,
            r#"<pic:pic>"#,
            r#"<pic:nvPicPr><pic:cNvPr id="0" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic>"#,
            r#"</a:graphicData></a:graphic>"#,
            r#"</wp:inline>"#,
            r#"</w:drawing></w:r>"#,
        ),
        cx = cx,
        cy = cy,
        id = id,
        name = name,
        rid = rid,
        pic_ns = PIC_NS,
    )
}

/// Text fields of the document-control header table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMetadata {
    pub title: String,
    pub code: String,
    pub version: String,
    pub page: String,
    pub prepared_by: String,
    pub prepared_on: String,
    pub reviewed_by: String,
    pub reviewed_on: String,
    pub approved_by: String,
    pub approved_on: String,
}

// Grid in twips; 9360 is the text width of a Letter page with 1" margins.
const GRID_COLUMNS: [u32; 3] = [2160, 4320, 2880];

/// Bordered full-width table: logo, title and code/version/page on the
/// first row, the three sign-off blocks on the second.
pub fn metadata_table(logo: &InlineImage<'_>, meta: &HeaderMetadata) -> String {
    let first_row = [
        format!("<w:p>{}</w:p>", drawing_run(logo)),
        text_paragraph(&format!("Título: {}", meta.title)),
        [
            text_paragraph(&format!("Código: {}", meta.code)),
            text_paragraph(&format!("Versión: {}", meta.version)),
            text_paragraph(&format!("Página: {}", meta.page)),
        ]
        .concat(),
    ];

    let second_row = [
        sign_off("Elaboró", &meta.prepared_by, &meta.prepared_on),
        sign_off("Revisó", &meta.reviewed_by, &meta.reviewed_on),
        sign_off("Aprobó", &meta.approved_by, &meta.approved_on),
    ];

    let borders = ["top", "left", "bottom", "right", "insideH", "insideV"]
        .iter()
        .map(|side| format!(r#"<w:{side} w:val="single" w:sz="4" w:space="0" w:color="auto"/>"#))
        .collect::<String>();

    let grid = GRID_COLUMNS
        .iter()
        .map(|w| format!(r#"<w:gridCol w:w="{w}"/>"#))
        .collect::<String>();

    format!(
        concat!(
            r#"<w:tbl>"#,
            r#"<w:tblPr><w:tblW w:w="5000" w:type="pct"/><w:tblBorders>{borders}</w:tblBorders></w:tblPr>"#,
            r#"<w:tblGrid>{grid}</w:tblGrid>"#,
            r#"{first}{second}"#,
            r#"</w:tbl>"#,
        ),
        borders = borders,
        grid = grid,
        first = table_row(&first_row),
        second = table_row(&second_row),
    )
}

fn sign_off(label: &str, name: &str, date: &str) -> String {
    let signer = format!("{label}: {name}");
    let signed_on = format!("Fecha: {date}");
    multiline_paragraph(&[signer.as_str(), signed_on.as_str()])
}

fn table_row(cells: &[String; 3]) -> String {
    let cells = cells
        .iter()
        .zip(GRID_COLUMNS)
        .map(|(content, width)| {
            format!(
                r#"<w:tc><w:tcPr><w:tcW w:w="{width}" w:type="dxa"/><w:vAlign w:val="center"/></w:tcPr>{content}</w:tc>"#
            )
        })
        .collect::<String>();
    format!("<w:tr>{cells}</w:tr>")
}
