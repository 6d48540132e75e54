mod common;

use common::{b64, sample_docx, TestApp, DOCX_CONTENT_TYPE, PNG};
use serde_json::json;

async fn issue_document(app: &TestApp) -> String {
    let response = app
        .insert_header_footer(&json!({
            "ArchivoBase64": b64(&sample_docx()),
            "Encabezado": b64(PNG),
            "PieDePagina": b64(PNG),
        }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    body["Ruta"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn retrieve_returns_stored_bytes() {
    let app = TestApp::spawn().await;
    let ruta = issue_document(&app).await;

    let response = app.retrieve(&ruta).await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], DOCX_CONTENT_TYPE);
    let file_name = std::path::Path::new(&ruta)
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert_eq!(
        response.headers()["content-disposition"],
        format!("attachment; filename=\"{}\"", file_name).as_str()
    );

    let bytes = response.bytes().await.unwrap();
    let on_disk = std::fs::read(&ruta).unwrap();
    assert_eq!(bytes.as_ref(), on_disk.as_slice());
}

#[tokio::test]
async fn unknown_reference_is_not_found() {
    let app = TestApp::spawn().await;
    let missing = app
        .storage_path
        .join("doc_123e4567-e89b-42d3-a456-426614174000.docx");

    let response = app.retrieve(&missing.display().to_string()).await;

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "Error": "Archivo no encontrado" }));
}

#[tokio::test]
async fn paths_outside_the_store_are_not_found() {
    let app = TestApp::spawn().await;
    let outside = app.templates_path.join("secret.txt");
    std::fs::write(&outside, "secret").unwrap();

    for reference in [
        outside.display().to_string(),
        "../Plantillas/secret.txt".to_string(),
        "/etc/passwd".to_string(),
        format!("{}/../Plantillas/secret.txt", app.storage_path.display()),
        String::new(),
    ] {
        let response = app.retrieve(&reference).await;
        assert_eq!(response.status().as_u16(), 404, "{reference}");
    }
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/api/WordDocument/obtener-archivo", app.address))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["Error"].is_string());
}
