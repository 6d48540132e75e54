use serde::{Deserialize, Serialize};
use validator::Validate;

/// Body of `POST /api/WordDocument/insertar-header-footer`.
///
/// Carries both request variants: `Encabezado`/`PieDePagina` images, or a
/// logo plus document-control fields. Keys are PascalCase on the wire;
/// camelCase is accepted too.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct InsertHeaderFooterRequest {
    #[serde(default, alias = "archivoBase64")]
    pub archivo_base64: String,

    #[serde(default, alias = "encabezado")]
    pub encabezado: Option<String>,
    #[serde(default, alias = "pieDePagina")]
    pub pie_de_pagina: Option<String>,

    #[serde(default, alias = "imagenBase64")]
    pub imagen_base64: Option<String>,
    #[serde(default, alias = "tituloDocumento")]
    #[validate(length(max = 500))]
    pub titulo_documento: Option<String>,
    #[serde(default, alias = "codigo")]
    #[validate(length(max = 100))]
    pub codigo: Option<String>,
    #[serde(default, alias = "version")]
    #[validate(length(max = 100))]
    pub version: Option<String>,
    #[serde(default, alias = "pagina")]
    #[validate(length(max = 100))]
    pub pagina: Option<String>,
    #[serde(default, alias = "elaboro")]
    #[validate(length(max = 200))]
    pub elaboro: Option<String>,
    #[serde(default, alias = "fechaElaboro")]
    #[validate(length(max = 100))]
    pub fecha_elaboro: Option<String>,
    #[serde(default, alias = "reviso")]
    #[validate(length(max = 200))]
    pub reviso: Option<String>,
    #[serde(default, alias = "fechaReviso")]
    #[validate(length(max = 100))]
    pub fecha_reviso: Option<String>,
    #[serde(default, alias = "aprobo")]
    #[validate(length(max = 200))]
    pub aprobo: Option<String>,
    #[serde(default, alias = "fechaAprobo")]
    #[validate(length(max = 100))]
    pub fecha_aprobo: Option<String>,
}

impl InsertHeaderFooterRequest {
    /// Any logo or document-control field selects the metadata table.
    pub fn is_metadata_variant(&self) -> bool {
        [
            &self.imagen_base64,
            &self.titulo_documento,
            &self.codigo,
            &self.version,
            &self.pagina,
            &self.elaboro,
            &self.fecha_elaboro,
            &self.reviso,
            &self.fecha_reviso,
            &self.aprobo,
            &self.fecha_aprobo,
        ]
        .iter()
        .any(|field| non_empty(field).is_some())
    }
}

pub(crate) fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InsertHeaderFooterResponse {
    #[serde(rename = "Ruta")]
    pub ruta: String,
}

/// Body of `POST /api/WordDocument/obtener-archivo`.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveDocumentRequest {
    #[serde(rename = "Ruta", alias = "ruta", default)]
    pub ruta: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub environment: String,
    #[serde(rename = "timeUtc")]
    pub time_utc: String,
    pub message: String,
}
