use std::path::Path;

use actix_web::{HttpResponse, Responder, post, web};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::dose_grid::GridShape;
use crate::handlers::dose_grid::load_grid;
use crate::handlers::error_response;

/// 缓存文件的扩展名
pub const CACHE_EXTENSION: &str = "dosez";

#[derive(Deserialize)]
pub struct ConvertRequest {
    pub file: String,
}

#[derive(Serialize)]
pub struct ConvertResponse {
    pub file: String,
    /// 相对资源目录的输出文件名
    pub output: String,
    pub shape: GridShape,
    pub size: usize,
}

/// 将剂量文件转换为 `.dosez` 缓存，输出与源文件同目录同名
#[post("/dose-grid/convert")]
pub async fn convert_dose_grid(
    data: web::Data<AppState>,
    payload: web::Json<ConvertRequest>,
) -> impl Responder {
    let file = &payload.file;
    let is_cache = Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CACHE_EXTENSION));
    if is_cache {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "文件已是缓存格式",
            "file": file,
        }));
    }

    let (source_path, grid) = match load_grid(data.get_ref(), file).await {
        Ok(loaded) => loaded,
        Err(err) => return err,
    };

    let output_path = source_path.with_extension(CACHE_EXTENSION);
    let dump_grid = grid.clone();
    let dumped = web::block(move || dump_grid.dump(&output_path)).await;

    match dumped {
        Ok(Ok(())) => HttpResponse::Ok().json(ConvertResponse {
            file: file.clone(),
            output: Path::new(file)
                .with_extension(CACHE_EXTENSION)
                .to_string_lossy()
                .into_owned(),
            shape: grid.shape(),
            size: grid.size(),
        }),
        Ok(Err(e)) => error_response(file, &e),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "转换任务执行失败",
            "file": file,
            "details": e.to_string(),
        })),
    }
}
