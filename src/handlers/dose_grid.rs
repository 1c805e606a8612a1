use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{HttpResponse, Responder, get, web};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::dose_grid::{DoseGrid, GridShape};
use crate::handlers::error_response;

#[derive(Deserialize)]
pub struct DoseGridQuery {
    /// 文件名，例如 "phantom.3ddose"
    pub file: String,
}

/// 剂量网格摘要
#[derive(Serialize)]
pub struct DoseGridSummary {
    pub file: String,
    /// (Z, X, Y) 顺序
    pub shape: GridShape,
    pub size: usize,
    pub resolution: Vec<f64>,
    pub x_extent: (f64, f64),
    pub y_extent: (f64, f64),
    pub z_extent: (f64, f64),
    pub min: f64,
    pub max: f64,
}

impl DoseGridSummary {
    pub fn new(file: &str, grid: &DoseGrid) -> Self {
        Self {
            file: file.to_string(),
            shape: grid.shape(),
            size: grid.size(),
            resolution: grid.resolution().to_vec(),
            x_extent: grid.x_extent(),
            y_extent: grid.y_extent(),
            z_extent: grid.z_extent(),
            min: grid.min(),
            max: grid.max(),
        }
    }
}

/// 剂量网格接口，根据文件名自动识别文件格式并返回摘要
/// 例如: /dose-grid?file=phantom.3ddose
#[get("/dose-grid")]
pub async fn get_dose_grid(
    data: web::Data<AppState>,
    query: web::Query<DoseGridQuery>,
) -> impl Responder {
    match load_grid(data.get_ref(), &query.file).await {
        Ok((_, grid)) => HttpResponse::Ok().json(DoseGridSummary::new(&query.file, &grid)),
        Err(err) => err,
    }
}

/// 加载（或从缓存取出）资源目录下的剂量网格
///
/// ## 返回
/// - `Ok((path, grid))`: 文件的完整路径与共享的网格
/// - `Err(HttpResponse)`: 路径非法、格式不支持或加载失败时的错误响应
pub(crate) async fn load_grid(
    app_state: &AppState,
    file: &str,
) -> Result<(PathBuf, Arc<DoseGrid>), HttpResponse> {
    // ==================== 步骤 1: 构建文件路径 ====================
    let Some(file_path) = app_state.resolve(file) else {
        return Err(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "非法的文件路径",
            "file": file,
        })));
    };

    // ==================== 步骤 2: 查找匹配的解析器 ====================
    if app_state
        .parser_registry
        .find_parser_for_file(&file_path)
        .is_none()
    {
        let supported = app_state.parser_registry.supported_extensions();
        return Err(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "不支持的文件格式",
            "file": file,
            "supported_extensions": supported,
        })));
    }

    // ==================== 步骤 3: 在阻塞线程池中加载 ====================
    let registry = app_state.parser_registry.clone();
    let store = app_state.grid_store.clone();
    let path = file_path.clone();
    let loaded = web::block(move || store.get_or_load(&path, |p| registry.load(p))).await;

    match loaded {
        Ok(Ok(grid)) => Ok((file_path, grid)),
        Ok(Err(e)) => Err(error_response(file, &e)),
        Err(e) => Err(HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "加载任务执行失败",
            "file": file,
            "details": e.to_string(),
        }))),
    }
}
