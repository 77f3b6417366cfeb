use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tower::ServiceExt;

use super::{router, AppState};
use crate::asset::AssetStatus;
use crate::auth::{hash_password_with_rounds, Role};
use crate::config::Config;
use crate::document::MemoryBlobStore;
use crate::import::xlsx::template_bytes;
use crate::import::TEMPLATE_COLUMNS;
use crate::storage::Storage;

const BOUNDARY: &str = "assetrack-test-boundary";

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    fn new() -> Self {
        let storage = Storage::open_in_memory().unwrap();
        for (name, role) in [("dev", Role::Developer), ("ravi", Role::User)] {
            storage
                .create_user(name, &hash_password_with_rounds("secret", 1_000), role)
                .unwrap();
        }
        let state =
            AppState::new(storage, Arc::new(MemoryBlobStore::new()), Config::default()).unwrap();
        Self {
            router: router(state.clone()),
            state,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, cookie: Option<&str>, body: &str) -> Response {
        let mut builder = Request::post(uri).header(CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn post_multipart(&self, uri: &str, cookie: &str, parts: &[Part<'_>]) -> Response {
        let request = Request::post(uri)
            .header(COOKIE, cookie)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }

    /// Log in and return the `Cookie` header value.
    async fn login(&self, username: &str) -> String {
        let response = self
            .post_form("/login", None, &format!("username={username}&password=secret"))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }

    async fn add_asset(&self, cookie: &str, code: &str) -> i64 {
        let response = self
            .post_form(
                "/assets/add",
                Some(cookie),
                &format!("asset_code={code}&asset_name=Hydraulic+Press&plant=Plant-1"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = location(&response);
        location.trim_start_matches("/assets/").parse().unwrap()
    }
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn location(response: &Response) -> String {
    response.headers()[LOCATION].to_str().unwrap().to_string()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_healthz() {
    let app = TestApp::new();
    let response = app.get("/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn test_protected_pages_redirect_to_login() {
    let app = TestApp::new();
    for uri in ["/assets", "/assets/add", "/assets/1", "/assets/import"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/login");
    }

    let response = app.get("/assets", Some("assetrack_session=bogus")).await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_login_failure_and_success() {
    let app = TestApp::new();

    let response = app
        .post_form("/login", None, "username=ravi&password=wrong")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Invalid credentials"));

    let cookie = app.login("ravi").await;
    assert!(cookie.starts_with("assetrack_session="));

    let response = app.get("/assets", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("ravi (user)"));

    let response = app.get("/login", Some(&cookie)).await;
    assert_eq!(location(&response), "/assets");
}

#[tokio::test]
async fn test_disabled_user_cannot_log_in() {
    let app = TestApp::new();
    app.state
        .with_db(|db| db.set_user_active("ravi", false))
        .unwrap();
    let response = app
        .post_form("/login", None, "username=ravi&password=secret")
        .await;
    assert!(body_text(response).await.contains("Invalid credentials"));
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    let cookie = app.login("ravi").await;

    let response = app.get("/logout", Some(&cookie)).await;
    assert_eq!(location(&response), "/login");
    assert!(response.headers()[SET_COOKIE]
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    let response = app.get("/assets", Some(&cookie)).await;
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_add_asset_and_view_detail() {
    let app = TestApp::new();
    let cookie = app.login("ravi").await;
    let id = app.add_asset(&cookie, "A001").await;

    let page = body_text(app.get(&format!("/assets/{id}"), Some(&cookie)).await).await;
    assert!(page.contains("Asset A001 added"));
    assert!(page.contains("Hydraulic Press"));
    assert!(page.contains("Asset Created"));
    assert!(page.contains("No AMC"));

    // flashes are shown once
    let page = body_text(app.get(&format!("/assets/{id}"), Some(&cookie)).await).await;
    assert!(!page.contains("Asset A001 added"));

    let list = body_text(app.get("/assets?search=a00", Some(&cookie)).await).await;
    assert!(list.contains("A001"));
    let list = body_text(app.get("/assets?status=Scrapped", Some(&cookie)).await).await;
    assert!(!list.contains(">A001<"));
}

#[tokio::test]
async fn test_add_asset_validation_rerenders_form() {
    let app = TestApp::new();
    let cookie = app.login("ravi").await;

    let response = app
        .post_form("/assets/add", Some(&cookie), "asset_code=A001&asset_name=")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Missing Asset Name"));
    assert!(page.contains(r#"value="A001""#));

    app.add_asset(&cookie, "A002").await;
    let page = body_text(
        app.post_form(
            "/assets/add",
            Some(&cookie),
            "asset_code=A002&asset_name=Other",
        )
        .await,
    )
    .await;
    assert!(page.contains("Asset Code already exists: A002"));
}

#[tokio::test]
async fn test_edit_asset() {
    let app = TestApp::new();
    let cookie = app.login("ravi").await;
    let id = app.add_asset(&cookie, "A001").await;

    let form = body_text(app.get(&format!("/assets/edit/{id}"), Some(&cookie)).await).await;
    assert!(form.contains(r#"value="Hydraulic Press""#));

    let response = app
        .post_form(
            &format!("/assets/edit/{id}"),
            Some(&cookie),
            "asset_code=A001&asset_name=Press+Mk2&location=Bay+4",
        )
        .await;
    assert_eq!(location(&response), format!("/assets/{id}"));

    let asset = app.state.with_db(|db| db.require_asset(id)).unwrap();
    assert_eq!(asset.asset_name, "Press Mk2");
    assert_eq!(asset.location.as_deref(), Some("Bay 4"));
}

#[tokio::test]
async fn test_missing_asset_is_404() {
    let app = TestApp::new();
    let cookie = app.login("ravi").await;
    let response = app.get("/assets/999", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/no/such/page", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scrap_requires_developer_and_locks_asset() {
    let app = TestApp::new();
    let user = app.login("ravi").await;
    let dev = app.login("dev").await;
    let id = app.add_asset(&user, "A001").await;
    let scrap_uri = format!("/assets/{id}/scrap");

    let response = app
        .post_form(&scrap_uri, Some(&user), "reason=worn+out")
        .await;
    assert_eq!(location(&response), "/assets");
    let list = body_text(app.get("/assets", Some(&user)).await).await;
    assert!(list.contains("Access denied"));
    let asset = app.state.with_db(|db| db.require_asset(id)).unwrap();
    assert_eq!(asset.status, AssetStatus::Active);

    let response = app.post_form(&scrap_uri, Some(&dev), "reason=").await;
    assert_eq!(location(&response), format!("/assets/{id}"));
    let page = body_text(app.get(&format!("/assets/{id}"), Some(&dev)).await).await;
    assert!(page.contains("Scrap reason is required"));

    app.post_form(&scrap_uri, Some(&dev), "reason=worn+out")
        .await;
    let asset = app.state.with_db(|db| db.require_asset(id)).unwrap();
    assert_eq!(asset.status, AssetStatus::Scrapped);

    // every write is now refused
    let response = app
        .post_form(
            &format!("/assets/{id}/events"),
            Some(&user),
            "kind=note&description=still+here",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let page = body_text(app.get(&format!("/assets/{id}"), Some(&user)).await).await;
    assert!(page.contains("is scrapped"));
    assert!(page.contains("read-only"));

    let response = app.get(&format!("/assets/edit/{id}"), Some(&user)).await;
    assert_eq!(location(&response), format!("/assets/{id}"));
}

#[tokio::test]
async fn test_amc_overlap_is_flashed() {
    let app = TestApp::new();
    let cookie = app.login("ravi").await;
    let id = app.add_asset(&cookie, "A001").await;
    let uri = format!("/assets/{id}/amc");

    app.post_form(
        &uri,
        Some(&cookie),
        "vendor=Acme&start_date=2026-01-01&end_date=2026-12-31",
    )
    .await;
    app.post_form(
        &uri,
        Some(&cookie),
        "vendor=Other&start_date=2026-06-01&end_date=2027-05-31",
    )
    .await;

    let page = body_text(app.get(&format!("/assets/{id}"), Some(&cookie)).await).await;
    assert!(page.contains("AMC added (01/01/2026 - 31/12/2026)"));
    assert!(page.contains("overlaps existing contract"));
    assert_eq!(app.state.with_db(|db| db.list_amcs(id)).unwrap().len(), 1);
}

#[tokio::test]
async fn test_record_calibration_and_event() {
    let app = TestApp::new();
    let cookie = app.login("ravi").await;
    let id = app.add_asset(&cookie, "A001").await;

    app.post_form(
        &format!("/assets/{id}/calibrations"),
        Some(&cookie),
        "calibrated_on=2026-01-10&next_due_on=2027-01-10&result=Pass",
    )
    .await;
    app.post_form(
        &format!("/assets/{id}/events"),
        Some(&cookie),
        "kind=breakdown&event_date=2026-01-11&description=Spindle+seized",
    )
    .await;
    app.post_form(
        &format!("/assets/{id}/events"),
        Some(&cookie),
        "kind=asset_scrapped&description=sneaky",
    )
    .await;

    let page = body_text(app.get(&format!("/assets/{id}"), Some(&cookie)).await).await;
    assert!(page.contains("next due 10/01/2027"));
    assert!(page.contains("Spindle seized"));
    assert!(page.contains("recorded automatically"));
    let events = app.state.with_db(|db| db.list_events(id)).unwrap();
    assert!(events.iter().all(|e| e.description != "sneaky"));
}

#[tokio::test]
async fn test_document_upload_and_download() {
    let app = TestApp::new();
    let cookie = app.login("ravi").await;
    let id = app.add_asset(&cookie, "A001").await;
    let uri = format!("/assets/{id}/documents");
    let pdf: &[u8] = b"%PDF-1.4\n1 0 obj\n%%EOF\n";

    app.post_multipart(
        &uri,
        &cookie,
        &[Part::Text("kind", "invoice"), Part::File("file", "notes.txt", b"hello")],
    )
    .await;
    app.post_multipart(
        &uri,
        &cookie,
        &[Part::Text("kind", "invoice"), Part::File("file", "Invoice 2026.pdf", pdf)],
    )
    .await;
    app.post_multipart(
        &uri,
        &cookie,
        &[Part::Text("kind", "warranty"), Part::File("file", "copy.pdf", pdf)],
    )
    .await;

    let page = body_text(app.get(&format!("/assets/{id}"), Some(&cookie)).await).await;
    assert!(page.contains("only PDF files are allowed"));
    assert!(page.contains("Uploaded A001_invoice_Invoice_2026.pdf"));
    assert!(page.contains("already attached"));

    let documents = app.state.with_db(|db| db.list_documents(id)).unwrap();
    assert_eq!(documents.len(), 1);

    let response = app
        .get(&format!("/documents/{}/download", documents[0].id), Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/pdf");
    assert!(response.headers()[CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("A001_invoice_Invoice_2026.pdf"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), pdf);

    let response = app.get("/documents/999/download", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_replaces_unrecorded_file() {
    let app = TestApp::new();
    let cookie = app.login("ravi").await;
    let id = app.add_asset(&cookie, "A001").await;

    // left behind by an upload that died before its record was written
    app.state
        .blobs()
        .put_new(id, "A001_invoice_x.pdf", b"%PDF-partial")
        .await
        .unwrap();

    let pdf: &[u8] = b"%PDF-1.4\nfresh\n%%EOF\n";
    let response = app
        .post_multipart(
            &format!("/assets/{id}/documents"),
            &cookie,
            &[Part::Text("kind", "invoice"), Part::File("file", "x.pdf", pdf)],
        )
        .await;
    assert_eq!(location(&response), format!("/assets/{id}"));

    let page = body_text(app.get(&format!("/assets/{id}"), Some(&cookie)).await).await;
    assert!(page.contains("Uploaded A001_invoice_x.pdf"));

    let documents = app.state.with_db(|db| db.list_documents(id)).unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(
        app.state.blobs().read(id, "A001_invoice_x.pdf").await.unwrap(),
        pdf
    );

    // a recorded file is still never replaced
    app.post_multipart(
        &format!("/assets/{id}/documents"),
        &cookie,
        &[Part::Text("kind", "invoice"), Part::File("file", "x.pdf", b"%PDF-1.4 other")],
    )
    .await;
    let page = body_text(app.get(&format!("/assets/{id}"), Some(&cookie)).await).await;
    assert!(page.contains("already exists"));
    assert_eq!(
        app.state.blobs().read(id, "A001_invoice_x.pdf").await.unwrap(),
        pdf
    );
}

#[tokio::test]
async fn test_import_preview_and_confirm() {
    let app = TestApp::new();
    let user = app.login("ravi").await;
    let dev = app.login("dev").await;
    let workbook = template_bytes().unwrap();

    let response = app
        .post_multipart(
            "/assets/import",
            &dev,
            &[Part::File("file", "assets.csv", b"a,b")],
        )
        .await;
    assert_eq!(location(&response), "/assets/import");
    let page = body_text(app.get("/assets/import", Some(&dev)).await).await;
    assert!(page.contains("Please upload a valid .xlsx Excel file"));

    // regular users may preview but not confirm
    let page = body_text(
        app.post_multipart(
            "/assets/import",
            &user,
            &[Part::File("file", "assets.xlsx", &workbook)],
        )
        .await,
    )
    .await;
    assert!(page.contains("Only a developer account can confirm"));
    let response = app.post_form("/assets/import/confirm", Some(&user), "").await;
    assert_eq!(location(&response), "/assets");

    let page = body_text(
        app.post_multipart(
            "/assets/import",
            &dev,
            &[Part::File("file", "assets.xlsx", &workbook)],
        )
        .await,
    )
    .await;
    assert!(page.contains("1 valid row(s): 1 new, 0 update(s)"));
    assert!(page.contains("Confirm Import"));

    let response = app.post_form("/assets/import/confirm", Some(&dev), "").await;
    assert_eq!(location(&response), "/assets");
    let list = body_text(app.get("/assets", Some(&dev)).await).await;
    assert!(list.contains("Imported: 1 created, 0 updated"));
    assert!(app.state.with_db(|db| db.find_by_code("A001")).unwrap().is_some());

    // the batch is consumed by confirming it
    let response = app.post_form("/assets/import/confirm", Some(&dev), "").await;
    assert_eq!(location(&response), "/assets/import");
    let page = body_text(app.get("/assets/import", Some(&dev)).await).await;
    assert!(page.contains("No pending import"));

    // a second upload of the same sheet becomes an update
    let page = body_text(
        app.post_multipart(
            "/assets/import",
            &dev,
            &[Part::File("file", "assets.xlsx", &workbook)],
        )
        .await,
    )
    .await;
    assert!(page.contains("0 new, 1 update(s)"));
}

#[tokio::test]
async fn test_import_with_only_invalid_rows_is_flagged() {
    let app = TestApp::new();
    let dev = app.login("dev").await;

    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in (0u16..).zip(TEMPLATE_COLUMNS) {
        sheet.write_string(0, col, header).unwrap();
    }
    sheet.write_string(1, 0, "bad code").unwrap();
    sheet.write_string(1, 1, "Lathe").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let page = body_text(
        app.post_multipart("/assets/import", &dev, &[Part::File("file", "bad.xlsx", &bytes)])
            .await,
    )
    .await;
    assert!(page.contains(
        r#"<div class="flash flash-danger">All rows are invalid. Please fix errors and re-upload the file.</div>"#
    ));
    assert!(page.contains("0 valid row(s)"));
    assert!(!page.contains("Confirm Import"));

    let response = app.post_form("/assets/import/confirm", Some(&dev), "").await;
    assert_eq!(location(&response), "/assets/import");
    let page = body_text(app.get("/assets/import", Some(&dev)).await).await;
    assert!(page.contains("No pending import"));
}

#[tokio::test]
async fn test_template_download() {
    let app = TestApp::new();
    let cookie = app.login("ravi").await;
    let response = app.get("/assets/import/template", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("ACM_Asset_Import_Template.xlsx"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(bytes.starts_with(b"PK"));
}
