use std::path::Path;

use log::info;

use crate::dose_grid::DoseGrid;
use crate::error::{DoseError, Result};
use crate::utils::parser::DoseGridParser;

/// 解析器注册表
/// 管理所有可用的剂量网格解析器，并根据文件扩展名匹配对应的解析器
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DoseGridParser>>,
}

impl ParserRegistry {
    /// 创建新的解析器注册表，自动注册所有可用的解析器
    pub fn new() -> Self {
        let parsers = crate::parsers::get_all_parsers();
        Self { parsers }
    }

    /// 根据文件扩展名查找匹配的解析器
    /// extension: 文件扩展名（不含点号），例如 "3ddose"
    pub fn find_parser(&self, extension: &str) -> Option<&dyn DoseGridParser> {
        self.parsers
            .iter()
            .find(|parser| parser.supports(extension))
            .map(|p| p.as_ref())
    }

    /// 根据文件路径查找匹配的解析器
    /// 自动提取文件扩展名
    pub fn find_parser_for_file(&self, file_path: &Path) -> Option<&dyn DoseGridParser> {
        let extension = file_path.extension().and_then(|ext| ext.to_str())?;
        self.find_parser(extension)
    }

    /// 选择解析器并加载，扩展名无法识别时返回 [`DoseError::UnsupportedFormat`]
    pub fn load(&self, file_path: &Path) -> Result<DoseGrid> {
        let parser =
            self.find_parser_for_file(file_path)
                .ok_or_else(|| DoseError::UnsupportedFormat {
                    path: file_path.to_path_buf(),
                })?;
        info!("使用 {} 加载 {}", parser.name(), file_path.display());
        parser.parse_from_file(file_path)
    }

    /// 获取所有支持的扩展名列表
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions = Vec::new();
        for parser in &self.parsers {
            extensions.extend(
                parser
                    .supported_extensions()
                    .iter()
                    .map(|s| s.to_lowercase()),
            );
        }
        extensions.sort();
        extensions.dedup();
        extensions
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_parsers_case_insensitively() {
        let registry = ParserRegistry::new();
        assert!(registry.find_parser("3DDOSE").is_some());
        assert!(registry.find_parser("dosez").is_some());
        assert!(registry.find_parser("npy").is_none());
        assert_eq!(
            registry
                .find_parser_for_file(Path::new("plans/phantom.3DDose"))
                .map(|parser| parser.name()),
            Some("3ddose Parser")
        );
        assert!(registry.find_parser_for_file(Path::new("phantom")).is_none());
        assert_eq!(registry.supported_extensions(), vec!["3ddose", "dosez"]);
    }

    #[test]
    fn unknown_extension_is_a_format_error() {
        let registry = ParserRegistry::new();
        let err = registry.load(Path::new("phantom.txt")).unwrap_err();
        assert!(matches!(err, DoseError::UnsupportedFormat { .. }));

        let err = registry.load(Path::new("no_extension")).unwrap_err();
        assert!(matches!(err, DoseError::UnsupportedFormat { .. }));
    }
}
