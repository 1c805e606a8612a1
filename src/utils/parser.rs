use std::path::Path;

use crate::dose_grid::DoseGrid;
use crate::error::Result;

/// 剂量网格解析器 trait
/// 不同文件格式需要实现这个 trait
pub trait DoseGridParser: Send + Sync {
    /// 获取支持的文件扩展名（不含点号），例如: "3ddose"
    fn supported_extensions(&self) -> Vec<&'static str>;

    /// 检查文件扩展名是否被支持
    fn supports(&self, extension: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// 从文件路径解析完整的剂量网格
    fn parse_from_file(&self, file_path: &Path) -> Result<DoseGrid>;

    /// 获取解析器名称（用于日志和错误信息）
    fn name(&self) -> &'static str;
}
