pub mod cache;
pub mod dose3d;

pub use cache::DoseCacheParser;
pub use dose3d::Dose3dParser;

/// 获取所有可用的解析器
pub fn get_all_parsers() -> Vec<Box<dyn crate::utils::parser::DoseGridParser>> {
    vec![Box::new(Dose3dParser::new()), Box::new(DoseCacheParser::new())]
}
