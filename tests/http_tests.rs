use std::fs;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use serde_json::Value;
use tempfile::TempDir;

use dose3d_backend::app_state::AppState;
use dose3d_backend::grid_store::GridStore;
use dose3d_backend::routes;
use dose3d_backend::utils::parser_registry::ParserRegistry;

/// nx=2 ny=2 nz=2，剂量 1..8
const CUBE: &str = "2 2 2\n0 1 2\n0 2 4\n0 3 6\n1 2 3 4 5 6 7 8\n0.1 0.1 0.1 0.1 0.2 0.2 0.2 0.2\n";

fn resource_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("cube.3ddose"), CUBE).unwrap();
    fs::write(dir.path().join("uneven.3ddose"), "1 1 2\n0 1\n0 1\n0 1 3\n1 2\n1 2\n").unwrap();
    fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    dir
}

fn app_state(dir: &TempDir) -> web::Data<AppState> {
    web::Data::new(AppState {
        parser_registry: Arc::new(ParserRegistry::new()),
        resource_dir: dir.path().to_string_lossy().into_owned(),
        grid_store: Arc::new(GridStore::new()),
    })
}

#[actix_web::test]
async fn health_lists_supported_extensions() {
    let dir = resource_dir();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&dir))
            .configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["supported_extensions"], serde_json::json!(["3ddose", "dosez"]));
}

#[actix_web::test]
async fn summary_reports_shape_extents_and_range() {
    let dir = resource_dir();
    let state = app_state(&dir);
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/dose-grid?file=cube.3ddose")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["shape"], serde_json::json!({"nz": 2, "nx": 2, "ny": 2}));
    assert_eq!(body["size"], 8);
    assert_eq!(body["resolution"], serde_json::json!([1.0, 2.0, 3.0]));
    assert_eq!(body["x_extent"], serde_json::json!([0.0, 2.0]));
    assert_eq!(body["y_extent"], serde_json::json!([0.0, 4.0]));
    assert_eq!(body["z_extent"], serde_json::json!([0.0, 6.0]));
    assert_eq!(body["min"], 1.0);
    assert_eq!(body["max"], 8.0);
    assert_eq!(state.grid_store.grid_count(), 1);
}

#[actix_web::test]
async fn slice_returns_little_endian_z_layer() {
    let dir = resource_dir();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&dir))
            .configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/dose-grid/slice?file=cube.3ddose&z=1")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("X-Slice-Rows").unwrap(), "2");
    assert_eq!(resp.headers().get("X-Slice-Cols").unwrap(), "2");
    assert_eq!(resp.headers().get("X-Extent").unwrap(), "0,2,0,4");

    let bytes = test::read_body(resp).await;
    let values: Vec<f64> = bytes
        .chunks_exact(8)
        .map(|chunk| f64::from_le_bytes(chunk.try_into().unwrap()))
        .collect();
    assert_eq!(values, vec![5.0, 6.0, 7.0, 8.0]);
}

#[actix_web::test]
async fn uncertainty_slice_and_bad_index() {
    let dir = resource_dir();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&dir))
            .configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/dose-grid/slice?file=cube.3ddose&z=0&field=uncertainty")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("X-Slice-Field").unwrap(), "uncertainty");
    assert_eq!(test::read_body(resp).await.len(), 4 * 8);

    let req = test::TestRequest::get()
        .uri("/dose-grid/slice?file=cube.3ddose&z=2")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn convert_writes_reloadable_cache() {
    let dir = resource_dir();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&dir))
            .configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/dose-grid/convert")
        .set_json(serde_json::json!({"file": "cube.3ddose"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["output"], "cube.dosez");
    assert!(dir.path().join("cube.dosez").exists());

    let req = test::TestRequest::get()
        .uri("/dose-grid?file=cube.dosez")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["size"], 8);
    assert_eq!(body["max"], 8.0);
    assert_eq!(body["resolution"], serde_json::json!([1.0, 2.0, 3.0]));

    let req = test::TestRequest::post()
        .uri("/dose-grid/convert")
        .set_json(serde_json::json!({"file": "cube.dosez"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn errors_map_to_status_codes() {
    let dir = resource_dir();
    let app = test::init_service(
        App::new()
            .app_data(app_state(&dir))
            .configure(routes::configure),
    )
    .await;

    let cases = [
        ("/dose-grid?file=notes.txt", StatusCode::BAD_REQUEST),
        ("/dose-grid?file=missing.3ddose", StatusCode::NOT_FOUND),
        ("/dose-grid?file=../cube.3ddose", StatusCode::BAD_REQUEST),
        ("/dose-grid?file=uneven.3ddose", StatusCode::UNPROCESSABLE_ENTITY),
    ];
    for (uri, expected) in cases {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), expected, "{}", uri);
    }

    let req = test::TestRequest::get()
        .uri("/dose-grid?file=uneven.3ddose")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["details"], "Non-linear resolution in either x, y or z.");
}
