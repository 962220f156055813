//! HTTP API for invoice extraction.
//!
//! Routes:
//! - `GET /health`, liveness; never touches the engines
//! - `GET /`, welcome message with the endpoint list
//! - `POST /process-invoice` (alias `POST /process`), OCR pipeline
//! - `POST /process-invoice-ai`, vision-model pipeline
//!
//! Uploads are `multipart/form-data` with the document in a field named
//! `file`. Each request is processed independently; no state is kept between
//! requests.

mod error;
mod handlers;
mod routes;

pub use handlers::ProcessResponse;
pub use routes::create_router;

use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use std::net::SocketAddr;
use std::sync::Arc;

/// Default upload limit: 20 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Listener and HTTP-level settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. `*` allows any origin.
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["http://localhost:3000".to_string()],
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Shared state for the handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ExtractionConfig>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: ExtractionConfig, max_upload_bytes: usize) -> Self {
        Self {
            config: Arc::new(config),
            max_upload_bytes,
        }
    }
}

/// Bind and serve until the process is stopped.
pub async fn serve(config: ExtractionConfig, server: &ServerConfig) -> Result<(), InvoiceError> {
    let state = AppState::new(config, server.max_upload_bytes);
    let app = create_router(state, &server.cors_origins)?;

    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .map_err(|e| {
            InvoiceError::InvalidConfig(format!(
                "invalid listen address {}:{}: {}",
                server.host, server.port, e
            ))
        })?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| InvoiceError::Internal(format!("Failed to bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| InvoiceError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::VisionModel;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use edgequake_llm::ImageData;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use tower::ServiceExt;

    const BOUNDARY: &str = "invoice-test-boundary";

    struct StubModel(&'static str);

    #[async_trait]
    impl VisionModel for StubModel {
        fn provider_name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            _system_prompt: &str,
            _instruction: &str,
            _pages: Vec<ImageData>,
        ) -> Result<String, InvoiceError> {
            Ok(self.0.to_string())
        }
    }

    /// One multipart part: field name, optional filename and content type.
    struct Part<'a> {
        name: &'a str,
        filename: Option<&'a str>,
        content_type: Option<&'a str>,
        data: &'a [u8],
    }

    fn file_part<'a>(filename: &'a str, content_type: &'a str, data: &'a [u8]) -> Part<'a> {
        Part {
            name: "file",
            filename: Some(filename),
            content_type: Some(content_type),
            data,
        }
    }

    fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        let mut body: Vec<u8> = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
            if let Some(filename) = part.filename {
                disposition.push_str(&format!("; filename=\"{}\"", filename));
            }
            body.extend_from_slice(disposition.as_bytes());
            body.extend_from_slice(b"\r\n");
            if let Some(ct) = part.content_type {
                body.extend_from_slice(format!("Content-Type: {}\r\n", ct).as_bytes());
            }
            body.extend_from_slice(b"\r\n");
            body.extend_from_slice(part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn app_with(config: ExtractionConfig) -> axum::Router {
        let state = AppState::new(config, DEFAULT_MAX_UPLOAD_BYTES);
        create_router(state, &ServerConfig::default().cors_origins).unwrap()
    }

    fn offline_config() -> ExtractionConfig {
        ExtractionConfig::builder()
            .tesseract_path("/nonexistent/bin/tesseract")
            .pdftoppm_path("/nonexistent/bin/pdftoppm")
            .build()
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_ignores_engine_availability() {
        let app = app_with(offline_config());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["message"], "Invoice Processing API is running");
    }

    #[tokio::test]
    async fn root_lists_endpoints() {
        let app = app_with(offline_config());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert!(json["endpoints"]["POST /process-invoice-ai"].is_string());
    }

    #[tokio::test]
    async fn unsupported_format_is_415() {
        let app = app_with(offline_config());
        let request = multipart_request(
            "/process-invoice",
            &[file_part("notes.txt", "text/plain", b"hello")],
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "UnsupportedFormat");
    }

    #[tokio::test]
    async fn missing_file_part_is_400() {
        let app = app_with(offline_config());
        let request = multipart_request(
            "/process-invoice",
            &[Part {
                name: "comment",
                filename: None,
                content_type: None,
                data: b"no file here",
            }],
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "MissingUpload");
    }

    #[tokio::test]
    async fn non_multipart_body_is_400() {
        let app = app_with(offline_config());
        let request = Request::builder()
            .method("POST")
            .uri("/process-invoice")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "InvalidUpload");
    }

    #[tokio::test]
    async fn oversized_upload_is_413() {
        let state = AppState::new(offline_config(), 1024);
        let app = create_router(state, &["*".to_string()]).unwrap();
        let big = vec![0u8; 8 * 1024];
        let request = multipart_request("/process-invoice", &[file_part("big.png", "image/png", &big)]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["error"], "UploadTooLarge");
    }

    #[tokio::test]
    async fn missing_engine_is_503_without_partial_record() {
        let app = app_with(offline_config());
        let png = png_bytes();
        let request = multipart_request("/process-invoice", &[file_part("scan.png", "image/png", &png)]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "EngineUnavailable");
        assert!(json.get("extracted_data").is_none());
    }

    #[tokio::test]
    async fn malformed_model_answer_is_502() {
        let config = ExtractionConfig::builder()
            .vision_model(Arc::new(StubModel("I could not find an invoice here.")))
            .build()
            .unwrap();
        let app = app_with(config);
        let png = png_bytes();
        let request = multipart_request("/process-invoice-ai", &[file_part("scan.png", "image/png", &png)]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = json_body(response).await;
        assert_eq!(json["error"], "ParseError");
        assert!(json.get("extracted_data").is_none());
    }

    #[tokio::test]
    async fn empty_model_object_is_502_not_null_record() {
        let config = ExtractionConfig::builder()
            .vision_model(Arc::new(StubModel("{}")))
            .build()
            .unwrap();
        let app = app_with(config);
        let png = png_bytes();
        let request = multipart_request("/process-invoice-ai", &[file_part("scan.png", "image/png", &png)]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = json_body(response).await;
        assert_eq!(json["error"], "ParseError");
        assert!(json.get("extracted_data").is_none());
    }

    #[tokio::test]
    async fn ai_route_returns_envelope() {
        let config = ExtractionConfig::builder()
            .vision_model(Arc::new(StubModel(
                "```json\n{\"invoice_number\": \"12345\", \"vendor_name\": \"ACME Corp\", \"total_amount\": 100}\n```",
            )))
            .build()
            .unwrap();
        let app = app_with(config);
        let png = png_bytes();
        let request = multipart_request("/process-invoice-ai", &[file_part("scan.png", "image/png", &png)]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["filename"], "scan.png");
        assert_eq!(json["file_size_bytes"], png.len());
        assert_eq!(json["method"], "ai");
        assert_eq!(json["page_count"], 1);
        assert_eq!(json["extracted_data"]["invoice_number"], "12345");
        assert_eq!(json["extracted_data"]["vendor"], "ACME Corp");
        assert_eq!(json["extracted_data"]["total_amount"], "100");
    }

    #[tokio::test]
    async fn first_named_file_part_is_used_as_fallback() {
        let config = ExtractionConfig::builder()
            .vision_model(Arc::new(StubModel(r#"{"invoice_number": null}"#)))
            .build()
            .unwrap();
        let app = app_with(config);
        let png = png_bytes();
        let request = multipart_request(
            "/process-invoice-ai",
            &[
                Part {
                    name: "comment",
                    filename: None,
                    content_type: None,
                    data: b"ignored",
                },
                Part {
                    name: "document",
                    filename: Some("upload.png"),
                    content_type: Some("image/png"),
                    data: &png,
                },
            ],
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["filename"], "upload.png");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_alias_runs_ocr() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("tesseract");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf 'ACME Corp\\nInvoice #12345\\nTotal: $100.00\\n'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = ExtractionConfig::builder().tesseract_path(&script).build().unwrap();
        let app = app_with(config);
        let png = png_bytes();
        let request = multipart_request("/process", &[file_part("scan.png", "image/png", &png)]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["method"], "ocr");
        assert_eq!(json["extracted_data"]["invoice_number"], "12345");
        assert_eq!(json["extracted_data"]["total_amount"], "$100.00");
        assert_eq!(json["extracted_data"]["vendor"], "ACME Corp");
    }
}
