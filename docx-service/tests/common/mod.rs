#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use docx_service::config::{DocxConfig, StorageConfig};
use docx_service::startup::Application;
use serde_json::Value;
use service_core::config::Config as CoreConfig;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDRtest";
pub const JPEG: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0test";

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub storage_path: PathBuf,
    pub templates_path: PathBuf,
    pub client: reqwest::Client,
    _root: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn with a hook that can seed the templates directory before the
    /// application starts.
    pub async fn spawn_with(prepare: impl FnOnce(&Path)) -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        let templates_path = root.path().join("Plantillas");
        std::fs::create_dir_all(&templates_path).expect("Failed to create templates dir");
        prepare(&templates_path);

        let config = DocxConfig {
            common: CoreConfig {
                port: 0, // Random port for testing
                ..CoreConfig::default()
            },
            environment: "test".to_string(),
            storage: StorageConfig {
                local_path: root.path().join("ArchivosWord"),
                retention_hours: 0,
            },
            templates_dir: templates_path.clone(),
            max_request_bytes: 52_428_800,
            max_part_bytes: 67_108_864,
            max_package_bytes: 268_435_456,
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);
        let storage_path = std::fs::canonicalize(root.path().join("ArchivosWord"))
            .expect("Storage directory should exist");

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        TestApp {
            address,
            port,
            storage_path,
            templates_path,
            client: reqwest::Client::new(),
            _root: root,
        }
    }

    pub async fn insert_header_footer(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(format!(
                "{}/api/WordDocument/insertar-header-footer",
                self.address
            ))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn retrieve(&self, ruta: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/api/WordDocument/obtener-archivo", self.address))
            .json(&serde_json::json!({ "Ruta": ruta }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Names of the files currently in the storage directory.
    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.storage_path)
            .expect("Failed to read storage dir")
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Smallest package Word opens: content types, root rels, one paragraph.
pub fn sample_docx() -> Vec<u8> {
    build_zip(&[
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#,
        ),
        (
            "word/document.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Contenido</w:t></w:r></w:p><w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#,
        ),
    ])
}

pub fn build_zip(parts: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in parts {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("Failed to start zip entry");
        writer
            .write_all(data.as_bytes())
            .expect("Failed to write zip entry");
    }
    writer.finish().expect("Failed to finish zip").into_inner()
}

/// Read one part of a zip package as text.
pub fn read_part(package: &[u8], name: &str) -> Option<String> {
    let mut archive = ZipArchive::new(Cursor::new(package)).expect("Not a zip package");
    let mut entry = archive.by_name(name).ok()?;
    let mut text = String::new();
    entry.read_to_string(&mut text).ok()?;
    Some(text)
}

pub fn part_names(package: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(package)).expect("Not a zip package");
    archive.file_names().map(str::to_string).collect()
}
