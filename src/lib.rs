//! 三维剂量网格的加载、缓存与查询
//!
//! 支持两种输入：
//! - `.3ddose` 行定位的文本格式
//! - `.dosez` gzip 压缩的具名数组缓存，由 [`DoseGrid::dump`] 生成
//!
//! ```no_run
//! use dose3d_backend::DoseGrid;
//!
//! let grid = DoseGrid::load("phantom.3ddose")?;
//! println!("{:?} {} {}", grid.x_extent(), grid.min(), grid.max());
//! grid.dump("phantom.dosez")?;
//! # Ok::<(), dose3d_backend::DoseError>(())
//! ```

pub mod app_state;
pub mod config;
pub mod dose_grid;
pub mod error;
pub mod grid_store;
pub mod handlers;
pub mod parsers;
pub mod routes;
pub mod utils;

pub use dose_grid::{AxisPositions, AxisSpacing, DoseGrid, GridShape};
pub use error::{DoseError, GridArray, Result};
