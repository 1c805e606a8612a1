use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::dose_grid::DoseGrid;
use crate::error::Result;

/// 已加载的网格及其加载时间
struct StoredGrid {
    grid: Arc<DoseGrid>,
    /// 加载时间，用于 TTL 过期检查
    loaded_at: Instant,
}

/// 已加载剂量网格的缓存，以文件路径为 key
/// 网格本身不可变，多个请求通过 Arc 共享同一份数据
pub struct GridStore {
    grids: RwLock<HashMap<PathBuf, StoredGrid>>,
    /// TTL（Time-To-Live）默认过期时间：30 分钟
    default_ttl: Duration,
}

impl GridStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(30 * 60))
    }

    /// 创建带自定义 TTL 的 GridStore
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            grids: RwLock::new(HashMap::new()),
            default_ttl: ttl,
        }
    }

    pub fn insert(&self, path: &Path, grid: DoseGrid) -> Arc<DoseGrid> {
        let grid = Arc::new(grid);
        self.grids.write().insert(
            path.to_path_buf(),
            StoredGrid {
                grid: grid.clone(),
                loaded_at: Instant::now(),
            },
        );
        grid
    }

    /// 获取未过期的网格
    pub fn get(&self, path: &Path) -> Option<Arc<DoseGrid>> {
        self.grids
            .read()
            .get(path)
            .filter(|stored| stored.loaded_at.elapsed() < self.default_ttl)
            .map(|stored| stored.grid.clone())
    }

    /// 命中缓存时直接返回，否则调用 `load` 并缓存结果
    /// 加载期间不持有锁，加载失败时不写入缓存
    pub fn get_or_load<F>(&self, path: &Path, load: F) -> Result<Arc<DoseGrid>>
    where
        F: FnOnce(&Path) -> Result<DoseGrid>,
    {
        if let Some(grid) = self.get(path) {
            return Ok(grid);
        }
        let grid = load(path)?;
        Ok(self.insert(path, grid))
    }

    /// 清理过期的网格
    /// 返回清理的网格数量
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut grids = self.grids.write();
        let before_count = grids.len();

        grids.retain(|_, stored| now.duration_since(stored.loaded_at) < self.default_ttl);

        before_count - grids.len()
    }

    /// 获取当前缓存的网格数量
    pub fn grid_count(&self) -> usize {
        self.grids.read().len()
    }

    /// 获取默认 TTL
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for GridStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dose_grid::{AxisPositions, GridShape};
    use crate::error::DoseError;

    fn tiny_grid() -> DoseGrid {
        DoseGrid::from_legacy_parts(
            GridShape::from_voxel_counts(1, 1, 1),
            AxisPositions::new(vec![0.0, 1.0], vec![0.0, 1.0], vec![0.0, 1.0]),
            vec![2.0],
            vec![0.5],
        )
        .unwrap()
    }

    #[test]
    fn loads_once_and_reuses() {
        let store = GridStore::new();
        let path = Path::new("a.3ddose");
        let mut calls = 0;

        let first = store
            .get_or_load(path, |_| {
                calls += 1;
                Ok(tiny_grid())
            })
            .unwrap();
        let second = store
            .get_or_load(path, |_| {
                calls += 1;
                Ok(tiny_grid())
            })
            .unwrap();

        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.grid_count(), 1);
    }

    #[test]
    fn failed_load_is_not_cached() {
        let store = GridStore::new();
        let result = store.get_or_load(Path::new("bad.3ddose"), |_| Err(DoseError::NonUniformGrid));
        assert!(result.is_err());
        assert_eq!(store.grid_count(), 0);
    }

    #[test]
    fn expired_grids_are_hidden_and_cleaned() {
        let store = GridStore::with_ttl(Duration::ZERO);
        store.insert(Path::new("a.3ddose"), tiny_grid());
        assert!(store.get(Path::new("a.3ddose")).is_none());
        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.grid_count(), 0);
    }
}
