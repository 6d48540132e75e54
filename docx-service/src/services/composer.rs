//! Header/footer composition over an in-memory `.docx` package.

use crate::dtos::documents::non_empty;
use crate::dtos::InsertHeaderFooterRequest;
use crate::package::markup::{self, Alignment, Extent, HeaderMetadata, InlineImage};
use crate::package::{
    document, join_part, parent_dir, relative_target, ContentTypes, DocxPackage, PackageError,
    PackageLimits, Relationships, CT_FOOTER, CT_HEADER, REL_FOOTER, REL_HEADER, REL_IMAGE,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::ImageFormat;
use service_core::error::AppError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FIELD_DOCUMENT: &str = "ArchivoBase64";
pub const FIELD_HEADER: &str = "Encabezado";
pub const FIELD_FOOTER: &str = "PieDePagina";
pub const FIELD_LOGO: &str = "ImagenBase64";

const HEADER_TEMPLATE: &str = "header.jpeg";
const FOOTER_TEMPLATE: &str = "footer.jpeg";

/// Centered footer picture of the metadata layout.
const METADATA_FOOTER_EXTENT: Extent = Extent::from_pixels(500, 100);

const INVALID_DOCUMENT_MESSAGE: &str = "El archivo no es un documento Word válido";
const OVERSIZED_DOCUMENT_MESSAGE: &str = "El documento excede el tamaño máximo permitido";

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("El campo {field} no es un base64 válido")]
    InvalidBase64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("El campo {field} es obligatorio")]
    MissingField { field: &'static str },

    #[error("El campo {field} no contiene una imagen PNG, JPEG, GIF o BMP")]
    UnsupportedImage { field: &'static str },

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("failed to read template {}", .path.display())]
    Template {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template {} is not a supported image", .path.display())]
    InvalidTemplate { path: PathBuf },
}

impl From<ComposeError> for AppError {
    fn from(err: ComposeError) -> Self {
        match err {
            ComposeError::InvalidBase64 { .. }
            | ComposeError::MissingField { .. }
            | ComposeError::UnsupportedImage { .. } => {
                AppError::BadRequest(anyhow::anyhow!(err.to_string()))
            }
            ComposeError::Package(source) => {
                tracing::warn!(error = %source, "Rejected source document");
                let message = match source {
                    PackageError::TooLarge { .. } => OVERSIZED_DOCUMENT_MESSAGE,
                    _ => INVALID_DOCUMENT_MESSAGE,
                };
                AppError::BadRequest(anyhow::anyhow!(message))
            }
            ComposeError::Template { .. } | ComposeError::InvalidTemplate { .. } => {
                AppError::InternalError(anyhow::Error::new(err))
            }
        }
    }
}

/// Decoded picture together with its sniffed format.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl ImagePayload {
    /// `None` when the bytes are not PNG, JPEG, GIF or BMP.
    pub fn sniff(bytes: Vec<u8>) -> Option<Self> {
        match image::guess_format(&bytes) {
            Ok(
                format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::Bmp),
            ) => Some(Self { bytes, format }),
            _ => None,
        }
    }

    fn from_field(field: &'static str, bytes: Vec<u8>) -> Result<Self, ComposeError> {
        Self::sniff(bytes).ok_or(ComposeError::UnsupportedImage { field })
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            _ => "jpeg",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Bmp => "image/bmp",
            _ => "image/jpeg",
        }
    }
}

/// What goes into the new header and footer.
#[derive(Debug, Clone)]
pub enum Composition {
    Images {
        header: ImagePayload,
        footer: ImagePayload,
    },
    Metadata {
        logo: ImagePayload,
        /// `None` leaves the footer with an empty paragraph.
        footer: Option<ImagePayload>,
        metadata: HeaderMetadata,
    },
}

impl Composition {
    pub fn variant(&self) -> &'static str {
        match self {
            Composition::Images { .. } => "images",
            Composition::Metadata { .. } => "metadata",
        }
    }
}

/// Decoded request, ready to compose.
#[derive(Debug, Clone)]
pub struct CompositionJob {
    pub source: Vec<u8>,
    pub composition: Composition,
}

#[derive(Debug, Clone)]
pub struct DocumentComposer {
    templates_dir: PathBuf,
    limits: PackageLimits,
}

impl DocumentComposer {
    pub fn new(templates_dir: impl Into<PathBuf>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            limits: PackageLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: PackageLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    /// Decode the request payloads and pick the variant. The metadata
    /// logo falls back to `Encabezado`, then to the header template.
    pub fn plan(&self, request: &InsertHeaderFooterRequest) -> Result<CompositionJob, ComposeError> {
        let source = decode_required(FIELD_DOCUMENT, &request.archivo_base64)?;

        let composition = if request.is_metadata_variant() {
            let logo = match (
                non_empty(&request.imagen_base64),
                non_empty(&request.encabezado),
            ) {
                (Some(value), _) => ImagePayload::from_field(FIELD_LOGO, decode(FIELD_LOGO, value)?)?,
                (None, Some(value)) => {
                    ImagePayload::from_field(FIELD_HEADER, decode(FIELD_HEADER, value)?)?
                }
                (None, None) => self.required_template(HEADER_TEMPLATE)?,
            };
            let footer = match non_empty(&request.pie_de_pagina) {
                Some(value) => Some(ImagePayload::from_field(
                    FIELD_FOOTER,
                    decode(FIELD_FOOTER, value)?,
                )?),
                None => self.optional_template(FOOTER_TEMPLATE)?,
            };
            Composition::Metadata {
                logo,
                footer,
                metadata: metadata_from(request),
            }
        } else {
            let header = decode_required(FIELD_HEADER, request.encabezado.as_deref().unwrap_or(""))?;
            let footer = decode_required(
                FIELD_FOOTER,
                request.pie_de_pagina.as_deref().unwrap_or(""),
            )?;
            Composition::Images {
                header: ImagePayload::from_field(FIELD_HEADER, header)?,
                footer: ImagePayload::from_field(FIELD_FOOTER, footer)?,
            }
        };

        Ok(CompositionJob {
            source,
            composition,
        })
    }

    /// Add a fresh header and footer to `source` and point the final
    /// section at them. Returns the serialized package.
    pub fn compose(&self, source: &[u8], composition: Composition) -> Result<Vec<u8>, ComposeError> {
        let mut package = DocxPackage::from_bytes_with_limits(source, self.limits)?;
        let main = package.ensure_main_document()?;
        let dir = parent_dir(&main).to_string();

        let mut types = package.content_types()?;
        let mut drawings = DrawingIds::new(package.drawing_ids());

        let header_part = package.next_part_name(&dir, "header", "xml");
        let footer_part = package.next_part_name(&dir, "footer", "xml");
        let mut header_rels = Relationships::default();
        let mut footer_rels = Relationships::default();

        let (header_body, footer_body) = match composition {
            Composition::Images { header, footer } => {
                let header_rid =
                    embed_image(&mut package, &mut types, &header_part, &mut header_rels, header);
                let footer_rid =
                    embed_image(&mut package, &mut types, &footer_part, &mut footer_rels, footer);

                let header_image = InlineImage {
                    relationship_id: &header_rid,
                    extent: Extent::INLINE_DEFAULT,
                    drawing_id: drawings.next()?,
                    name: "Encabezado",
                };
                let footer_image = InlineImage {
                    relationship_id: &footer_rid,
                    extent: Extent::INLINE_DEFAULT,
                    drawing_id: drawings.next()?,
                    name: "Pie de pagina",
                };
                (
                    markup::image_paragraph(&header_image, Alignment::Left),
                    markup::image_paragraph(&footer_image, Alignment::Left),
                )
            }
            Composition::Metadata {
                logo,
                footer,
                metadata,
            } => {
                let logo_rid =
                    embed_image(&mut package, &mut types, &header_part, &mut header_rels, logo);
                let logo_image = InlineImage {
                    relationship_id: &logo_rid,
                    extent: Extent::INLINE_DEFAULT,
                    drawing_id: drawings.next()?,
                    name: "Logo",
                };
                // A story must end with a paragraph, so one follows the table.
                let header_body = format!(
                    "{}{}",
                    markup::metadata_table(&logo_image, &metadata),
                    markup::empty_paragraph()
                );

                let footer_body = match footer {
                    Some(footer) => {
                        let footer_rid = embed_image(
                            &mut package,
                            &mut types,
                            &footer_part,
                            &mut footer_rels,
                            footer,
                        );
                        let footer_image = InlineImage {
                            relationship_id: &footer_rid,
                            extent: METADATA_FOOTER_EXTENT,
                            drawing_id: drawings.next()?,
                            name: "Pie de pagina",
                        };
                        markup::image_paragraph(&footer_image, Alignment::Center)
                    }
                    None => {
                        tracing::warn!(
                            template = %self.templates_dir.join(FOOTER_TEMPLATE).display(),
                            "Footer template not found, leaving footer empty"
                        );
                        markup::empty_paragraph()
                    }
                };
                (header_body, footer_body)
            }
        };

        package.put_part(header_part.clone(), markup::header(&header_body).into_bytes());
        package.put_part(footer_part.clone(), markup::footer(&footer_body).into_bytes());
        if !header_rels.is_empty() {
            package.set_relationships(&header_part, &header_rels);
        }
        if !footer_rels.is_empty() {
            package.set_relationships(&footer_part, &footer_rels);
        }
        types.set_override(&header_part, CT_HEADER);
        types.set_override(&footer_part, CT_FOOTER);

        let mut main_rels = package.relationships(&main)?;
        let header_rid = main_rels.add(REL_HEADER, &relative_target(&main, &header_part));
        let footer_rid = main_rels.add(REL_FOOTER, &relative_target(&main, &footer_part));
        package.set_relationships(&main, &main_rels);

        let main_xml = package
            .part(&main)
            .ok_or_else(|| PackageError::MissingPart(main.clone()))?;
        let rewritten = document::attach_header_footer(&main, main_xml, &header_rid, &footer_rid)?;
        package.put_part(main.clone(), rewritten);

        package.set_content_types(&types);

        tracing::debug!(
            main = %main,
            header = %header_part,
            footer = %footer_part,
            "Attached header and footer"
        );

        Ok(package.to_bytes()?)
    }

    /// `plan` followed by `compose`.
    pub fn run(&self, request: &InsertHeaderFooterRequest) -> Result<(&'static str, Vec<u8>), ComposeError> {
        let job = self.plan(request)?;
        let variant = job.composition.variant();
        let bytes = self.compose(&job.source, job.composition)?;
        Ok((variant, bytes))
    }

    fn required_template(&self, name: &str) -> Result<ImagePayload, ComposeError> {
        let path = self.templates_dir.join(name);
        let bytes = std::fs::read(&path).map_err(|source| ComposeError::Template {
            path: path.clone(),
            source,
        })?;
        ImagePayload::sniff(bytes).ok_or(ComposeError::InvalidTemplate { path })
    }

    fn optional_template(&self, name: &str) -> Result<Option<ImagePayload>, ComposeError> {
        match self.required_template(name) {
            Ok(image) => Ok(Some(image)),
            Err(ComposeError::Template { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// `wp:docPr` ids for new drawings: above the highest one in the package,
/// or the lowest unused ones once the numbering has reached `u32::MAX`.
struct DrawingIds {
    taken: BTreeSet<u32>,
    last: u32,
}

impl DrawingIds {
    fn new(taken: BTreeSet<u32>) -> Self {
        let last = taken.last().copied().unwrap_or(0);
        Self { taken, last }
    }

    fn next(&mut self) -> Result<u32, PackageError> {
        let id = match self.last.checked_add(1) {
            Some(id) if !self.taken.contains(&id) => Some(id),
            _ => (1..=u32::MAX).find(|id| !self.taken.contains(id)),
        }
        .ok_or(PackageError::IdsExhausted("drawing"))?;

        self.taken.insert(id);
        self.last = id;
        Ok(id)
    }
}

/// Store `image` as a media part next to `owner` and relate it from there.
fn embed_image(
    package: &mut DocxPackage,
    types: &mut ContentTypes,
    owner: &str,
    owner_rels: &mut Relationships,
    image: ImagePayload,
) -> String {
    let media_dir = join_part(parent_dir(owner), "media");
    let name = package.next_part_name(&media_dir, "image", image.extension());
    types.ensure_default(image.extension(), image.content_type());
    let target = relative_target(owner, &name);
    package.put_part(name, image.bytes);
    owner_rels.add(REL_IMAGE, &target)
}

fn metadata_from(request: &InsertHeaderFooterRequest) -> HeaderMetadata {
    let text = |field: &Option<String>| field.clone().unwrap_or_default();
    HeaderMetadata {
        title: text(&request.titulo_documento),
        code: text(&request.codigo),
        version: text(&request.version),
        page: text(&request.pagina),
        prepared_by: text(&request.elaboro),
        prepared_on: text(&request.fecha_elaboro),
        reviewed_by: text(&request.reviso),
        reviewed_on: text(&request.fecha_reviso),
        approved_by: text(&request.aprobo),
        approved_on: text(&request.fecha_aprobo),
    }
}

fn decode_required(field: &'static str, value: &str) -> Result<Vec<u8>, ComposeError> {
    if value.trim().is_empty() {
        return Err(ComposeError::MissingField { field });
    }
    decode(field, value)
}

/// Standard base64, tolerating a `data:<mime>;base64,` prefix and embedded
/// whitespace.
fn decode(field: &'static str, value: &str) -> Result<Vec<u8>, ComposeError> {
    let value = value.trim();
    let payload = match value.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => value,
    };
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|source| ComposeError::InvalidBase64 { field, source })?;
    if bytes.is_empty() {
        return Err(ComposeError::MissingField { field });
    }
    Ok(bytes)
}
