//! Tests for the conversion server API
//!
//! Test categories:
//! - Output naming and content types (property-based)
//! - Upload decoding
//! - HTTP endpoints through the full router, backed by an in-memory store

#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;

    use crate::body_limit;
    use crate::models::{content_type, output_name};

    proptest! {
        /// Output names are single path components with the requested extension
        #[test]
        fn output_name_is_a_plain_filename(
            name in ".{0,40}",
            suffix in proptest::option::of("[a-z]{1,12}"),
            ext in prop_oneof![Just("pdf"), Just("txt"), Just("docx")],
        ) {
            let out = output_name(&name, suffix.as_deref(), ext);
            let expected_ending = format!(".{}", ext);
            prop_assert!(out.ends_with(&expected_ending));
            prop_assert!(!out.contains('/'));
            prop_assert!(!out.contains('\\'));
            prop_assert!(!out.starts_with('.'));
            if let Some(suffix) = &suffix {
                let expected = format!("_{}.{}", suffix, ext);
                prop_assert!(out.ends_with(&expected));
            }
        }

        /// The upload stem survives, whatever directory it came from
        #[test]
        fn output_name_keeps_stem(stem in "[A-Za-z0-9_-]{1,20}", dir in "([a-z]{1,8}/){0,3}") {
            let name = format!("{}{}.pdf", dir, stem);
            prop_assert_eq!(output_name(&name, Some("split"), "pdf"), format!("{}_split.pdf", stem));
        }

        /// Known extensions never fall back to octet-stream
        #[test]
        fn content_type_ignores_case(stem in "[a-z]{1,10}", upper in any::<bool>()) {
            let name = if upper { format!("{}.PDF", stem) } else { format!("{}.pdf", stem) };
            prop_assert_eq!(content_type(&name), "application/pdf");
        }

        /// Base64 overhead always fits under the body limit
        #[test]
        fn body_limit_covers_encoded_upload(mb in 1usize..512) {
            let raw = mb * 1024 * 1024;
            let encoded = raw.div_ceil(3) * 4;
            prop_assert!(body_limit(mb) > encoded);
        }
    }
}

#[cfg(test)]
mod model_tests {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use pretty_assertions::assert_eq;

    use crate::error::ServerError;
    use crate::models::{output_name, UploadedFile};

    fn upload(data: String) -> UploadedFile {
        UploadedFile {
            name: "in.pdf".into(),
            data,
        }
    }

    #[test]
    fn test_output_names() {
        assert_eq!(
            output_name("report.pdf", Some("compressed"), "pdf"),
            "report_compressed.pdf"
        );
        assert_eq!(output_name("deck.final.pptx", None, "pdf"), "deck.final.pdf");
        assert_eq!(output_name("C:\\docs\\scan.jpg", None, "pdf"), "scan.pdf");
        assert_eq!(output_name("", Some("merged"), "pdf"), "document_merged.pdf");
        assert_eq!(output_name(".pdf", None, "txt"), "document.txt");
    }

    #[test]
    fn test_decode_plain_and_data_url() {
        let encoded = STANDARD.encode(b"%PDF-1.7");
        assert_eq!(upload(encoded.clone()).decode().unwrap(), b"%PDF-1.7");
        let data_url = format!("data:application/pdf;base64,{}", encoded);
        assert_eq!(upload(data_url).decode().unwrap(), b"%PDF-1.7");
    }

    #[test]
    fn test_decode_rejects_bad_and_empty_payloads() {
        assert!(matches!(
            upload("not base64!".into()).decode(),
            Err(ServerError::InvalidRequest(_))
        ));
        assert!(matches!(
            upload(String::new()).decode(),
            Err(ServerError::InvalidRequest(_))
        ));
    }
}

#[cfg(test)]
mod http_endpoint_tests {
    //! HTTP endpoint integration tests using axum-test

    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::TestServer;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use convert_core::{page_count, ContentStore, DiskStore, MemoryStore};
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use serde_json::{json, Value};

    use crate::{app, body_limit, AppState};

    /// Create a PDF with N pages, each showing "Page N"
    fn create_test_pdf(num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids: Vec<Object> = Vec::new();
        for i in 0..num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![100.into(), 700.into()]),
                    Operation::new(
                        "Tj",
                        vec![Object::string_literal(format!("Page {}", i + 1))],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => num_pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn file_json(name: &str, bytes: &[u8]) -> Value {
        json!({ "name": name, "data": STANDARD.encode(bytes) })
    }

    fn create_test_server() -> (TestServer, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = AppState {
            store: store.clone(),
        };
        let server = TestServer::new(app(state, body_limit(50))).unwrap();
        (server, store)
    }

    async fn download(server: &TestServer, body: &Value) -> Vec<u8> {
        let url = body["file"]["download_url"].as_str().unwrap();
        let response = server.get(url).await;
        response.assert_status_ok();
        response.as_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let (server, _) = create_test_server();
        let response = server.get("/health").await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "convert-api");
    }

    #[tokio::test]
    async fn test_info_reports_pages_and_format() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/info")
            .json(&json!({ "file": file_json("three.pdf", &create_test_pdf(3)) }))
            .await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["format"], "pdf");
        assert_eq!(json["page_count"], 3);
    }

    #[tokio::test]
    async fn test_merge_concatenates_and_stores() {
        let (server, store) = create_test_server();
        let response = server
            .post("/api/merge")
            .json(&json!({
                "files": [
                    file_json("a.pdf", &create_test_pdf(2)),
                    file_json("b.pdf", &create_test_pdf(3)),
                ]
            }))
            .await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert!(json["success"].as_bool().unwrap());
        assert_eq!(json["file"]["filename"], "a_merged.pdf");
        assert_eq!(json["metrics"]["page_count"], 5);
        assert_eq!(store.len(), 1);

        let merged = download(&server, &json).await;
        assert_eq!(page_count(&merged).unwrap(), 5);
    }

    #[tokio::test]
    async fn test_merge_without_files_is_bad_request() {
        let (server, _) = create_test_server();
        let response = server.post("/api/merge").json(&json!({ "files": [] })).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let json = response.json::<Value>();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_split_keeps_expression_order() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/split")
            .json(&json!({
                "file": file_json("report.pdf", &create_test_pdf(5)),
                "pages": "3,1-2",
            }))
            .await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["file"]["filename"], "report_split.pdf");
        assert_eq!(json["metrics"]["page_count"], 3);

        let doc = Document::load_mem(&download(&server, &json).await).unwrap();
        let pages: Vec<_> = doc.get_pages().into_values().collect();
        let first = String::from_utf8_lossy(&doc.get_page_content(pages[0]).unwrap()).into_owned();
        assert!(first.contains("(Page 3)"));
    }

    #[tokio::test]
    async fn test_split_rejects_malformed_range() {
        let (server, store) = create_test_server();
        let response = server
            .post("/api/split")
            .json(&json!({
                "file": file_json("report.pdf", &create_test_pdf(5)),
                "pages": "1,two",
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_RANGE");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_split_out_of_range_selects_nothing() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/split")
            .json(&json!({
                "file": file_json("report.pdf", &create_test_pdf(2)),
                "pages": "7-9",
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_RANGE");
    }

    #[tokio::test]
    async fn test_compress_reports_summary() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/compress")
            .json(&json!({
                "file": file_json("report.pdf", &create_test_pdf(2)),
                "target_size_kb": 500,
            }))
            .await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["file"]["filename"], "report_compressed.pdf");
        assert_eq!(json["compression"]["target_reached"], true);
        assert_eq!(json["compression"]["attempts"], 1);
        assert_eq!(json["compression"]["target_bytes"], 500 * 1024);
    }

    #[tokio::test]
    async fn test_compress_rejects_unknown_tier() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/compress")
            .json(&json!({
                "file": file_json("report.pdf", &create_test_pdf(1)),
                "quality": "extreme",
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_OPTION");
    }

    #[tokio::test]
    async fn test_rotate_selected_pages() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/rotate")
            .json(&json!({
                "file": file_json("scan.pdf", &create_test_pdf(4)),
                "angle": 90,
                "pages": "2-3",
            }))
            .await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["pages_affected"], 2);
        assert_eq!(json["metrics"]["page_count"], 4);
    }

    #[tokio::test]
    async fn test_rotate_rejects_odd_angle() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/rotate")
            .json(&json!({
                "file": file_json("scan.pdf", &create_test_pdf(1)),
                "angle": 45,
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_watermark_every_page() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/watermark")
            .json(&json!({
                "file": file_json("draft.pdf", &create_test_pdf(3)),
                "text": "DRAFT",
                "color": "#ff0000",
            }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["pages_affected"], 3);
    }

    #[tokio::test]
    async fn test_watermark_requires_text() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/watermark")
            .json(&json!({ "file": file_json("draft.pdf", &create_test_pdf(1)) }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_OPTION");
    }

    #[tokio::test]
    async fn test_protect_adds_encryption() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/protect")
            .json(&json!({
                "file": file_json("secret.pdf", &create_test_pdf(1)),
                "password": "hunter2",
            }))
            .await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        let protected = download(&server, &json).await;
        assert!(protected.starts_with(b"%PDF-"));
        assert!(protected.windows(8).any(|w| w == b"/Encrypt"));
        assert!(!protected.windows(8).any(|w| w == b"(Page 1)"));
    }

    #[tokio::test]
    async fn test_protect_requires_password() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/protect")
            .json(&json!({ "file": file_json("secret.pdf", &create_test_pdf(1)) }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pdf_to_text_download() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/convert/pdf-to-text")
            .json(&json!({ "file": file_json("notes.pdf", &create_test_pdf(2)) }))
            .await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["file"]["filename"], "notes.txt");
        assert!(json["metrics"]["page_count"].is_null());

        let url = json["file"]["download_url"].as_str().unwrap();
        let download = server.get(url).await;
        download.assert_status_ok();
        assert_eq!(
            download.header("content-type").to_str().unwrap(),
            "text/plain; charset=utf-8"
        );
        assert!(download.text().contains("Page 2"));
    }

    #[tokio::test]
    async fn test_pdf_to_word_and_back() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/convert/pdf-to-word")
            .json(&json!({ "file": file_json("letter.pdf", &create_test_pdf(1)) }))
            .await;
        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["file"]["filename"], "letter.docx");
        let docx = download(&server, &json).await;

        let response = server
            .post("/api/convert/word-to-pdf")
            .json(&json!({ "file": file_json("letter.docx", &docx) }))
            .await;
        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["file"]["filename"], "letter.pdf");
        assert_eq!(json["metrics"]["page_count"], 1);
    }

    #[tokio::test]
    async fn test_ppt_to_pdf_rejects_pdf_input() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/convert/ppt-to-pdf")
            .json(&json!({ "file": file_json("deck.pptx", &create_test_pdf(1)) }))
            .await;
        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(response.json::<Value>()["code"], "UNSUPPORTED_FORMAT");
    }

    #[tokio::test]
    async fn test_images_to_pdf_rejects_non_images() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/convert/images-to-pdf")
            .json(&json!({ "files": [file_json("doc.pdf", &create_test_pdf(1))] }))
            .await;
        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_unreadable_pdf_is_422() {
        let (server, _) = create_test_server();
        let response = server
            .post("/api/rotate")
            .json(&json!({
                "file": file_json("broken.pdf", b"%PDF-1.7 garbage"),
                "angle": 90,
            }))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<Value>()["code"], "UNREADABLE_DOCUMENT");
    }

    #[tokio::test]
    async fn test_unknown_file_is_404() {
        let (server, _) = create_test_server();
        server
            .get("/api/files/0f8fad5b-d9cb-469f-a165-70867728950e")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get("/api/files/not-a-uuid")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_disk_store_serves_pdf_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ContentStore> = Arc::new(DiskStore::new(dir.path()).unwrap());
        let server = TestServer::new(app(AppState { store }, body_limit(50))).unwrap();

        let response = server
            .post("/api/split")
            .json(&json!({
                "file": file_json("report.pdf", &create_test_pdf(3)),
                "pages": "2",
            }))
            .await;
        response.assert_status_ok();

        let url = response.json::<Value>()["file"]["download_url"]
            .as_str()
            .unwrap()
            .to_string();
        let download = server.get(&url).await;
        download.assert_status_ok();
        assert_eq!(download.header("content-type").to_str().unwrap(), "application/pdf");
        assert!(download
            .header("content-disposition")
            .to_str()
            .unwrap()
            .contains("report_split.pdf"));
        assert_eq!(page_count(download.as_bytes()).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let server = TestServer::new(app(AppState { store }, 1024)).unwrap();
        let response = server
            .post("/api/info")
            .json(&json!({ "file": file_json("big.pdf", &vec![b'x'; 4096]) }))
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    }
}
