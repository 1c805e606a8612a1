use actix_web::{HttpResponse, Responder, get, http::header::ContentType, web};
use byteorder::{LittleEndian, WriteBytesExt};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::handlers::dose_grid::load_grid;

/// 切片取自哪个数组
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceField {
    #[default]
    Dose,
    Uncertainty,
}

impl SliceField {
    fn as_str(self) -> &'static str {
        match self {
            SliceField::Dose => "dose",
            SliceField::Uncertainty => "uncertainty",
        }
    }
}

#[derive(Deserialize)]
pub struct SliceQuery {
    pub file: String,
    /// Z 层索引
    pub z: usize,
    #[serde(default)]
    pub field: SliceField,
}

/// 返回单个 Z 层切片，供绘图端使用
/// 数据为 (nx, ny) 行优先的小端 f64 序列，extent 按 x0,x1,y0,y1 放在响应头中
#[get("/dose-grid/slice")]
pub async fn get_dose_slice(
    data: web::Data<AppState>,
    query: web::Query<SliceQuery>,
) -> impl Responder {
    let grid = match load_grid(data.get_ref(), &query.file).await {
        Ok((_, grid)) => grid,
        Err(err) => return err,
    };

    let slice = match query.field {
        SliceField::Dose => grid.dose_slice(query.z),
        SliceField::Uncertainty => grid.uncertainty_slice(query.z),
    };
    let Some(slice) = slice else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "无效的 z 索引",
            "file": query.file,
            "z": query.z,
            "nz": grid.shape().nz,
        }));
    };

    let (rows, cols) = slice.dim();
    let mut bytes = Vec::with_capacity(slice.len() * std::mem::size_of::<f64>());
    for &value in slice.iter() {
        if let Err(e) = bytes.write_f64::<LittleEndian>(value) {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "写入切片数据失败",
                "details": e.to_string(),
            }));
        }
    }

    let (x0, x1) = grid.x_extent();
    let (y0, y1) = grid.y_extent();
    HttpResponse::Ok()
        .content_type(ContentType::octet_stream())
        .append_header(("X-Slice-Index", query.z.to_string()))
        .append_header(("X-Slice-Field", query.field.as_str()))
        .append_header(("X-Slice-Rows", rows.to_string()))
        .append_header(("X-Slice-Cols", cols.to_string()))
        .append_header(("X-Extent", format!("{},{},{},{}", x0, x1, y0, y1)))
        .body(bytes)
}
