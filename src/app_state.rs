use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::grid_store::GridStore;
use crate::utils::parser_registry::ParserRegistry;

/// 全局应用状态，负责在各个 handler 之间共享解析器、资源目录与已加载网格
pub struct AppState {
    pub parser_registry: Arc<ParserRegistry>,
    pub resource_dir: String,
    pub grid_store: Arc<GridStore>,
}

impl AppState {
    /// 将请求中的文件名解析为资源目录下的路径
    /// 拒绝绝对路径和包含 `..` 的路径
    pub fn resolve(&self, file: &str) -> Option<PathBuf> {
        let relative = Path::new(file);
        let is_plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if file.is_empty() || !is_plain {
            return None;
        }
        Some(Path::new(&self.resource_dir).join(relative))
    }
}
