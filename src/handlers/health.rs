use actix_web::{HttpResponse, Responder, get, web};

use crate::app_state::AppState;

/// 根路径健康检查/服务说明
#[get("/")]
pub async fn hello(data: web::Data<AppState>) -> impl Responder {
    let supported = data.parser_registry.supported_extensions();
    HttpResponse::Ok().json(serde_json::json!({
        "message": "三维剂量网格数据服务",
        "endpoints": [
            "GET /dose-grid?file=<filename>",
            "GET /dose-grid/slice?file=<filename>&z=<index>&field=dose|uncertainty",
            "POST /dose-grid/convert",
        ],
        "supported_extensions": supported,
        "resource_dir": data.resource_dir,
        "loaded_grids": data.grid_store.grid_count(),
    }))
}
