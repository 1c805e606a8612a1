pub mod convert;
pub mod dose_grid;
pub mod health;
pub mod slice;

use actix_web::HttpResponse;
use log::error;

use crate::error::DoseError;

pub use convert::convert_dose_grid;
pub use dose_grid::get_dose_grid;
pub use health::hello;
pub use slice::get_dose_slice;

/// 将加载/保存错误转换为 JSON 错误响应
pub(crate) fn error_response(file: &str, err: &DoseError) -> HttpResponse {
    error!("处理 {} 失败: {}", file, err);
    let (mut builder, message) = match err {
        DoseError::UnsupportedFormat { .. } => (HttpResponse::BadRequest(), "不支持的文件格式"),
        DoseError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (HttpResponse::NotFound(), "文件不存在或无法访问")
        }
        DoseError::Io(_) => (HttpResponse::InternalServerError(), "读写文件失败"),
        DoseError::NonUniformGrid
        | DoseError::SizeMismatch { .. }
        | DoseError::Parse { .. }
        | DoseError::Cache(_) => (HttpResponse::UnprocessableEntity(), "剂量文件内容不合法"),
    };
    builder.json(serde_json::json!({
        "error": message,
        "file": file,
        "details": err.to_string(),
    }))
}
