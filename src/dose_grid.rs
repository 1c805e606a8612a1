use std::path::Path;

use log::debug;
use ndarray::{Array3, ArrayView2, Axis};
use serde::Serialize;

use crate::error::{DoseError, GridArray, Result};
use crate::parsers::cache;
use crate::utils::parser_registry::ParserRegistry;

/// 判断某轴间距是否均匀时使用的相对容差
pub const RESOLUTION_TOLERANCE: f64 = 1e-6;

/// 网格维度，存储顺序固定为 (Z, X, Y)
///
/// 3ddose 文件头按 (x, y, z) 给出体素数，这里显式保存为 Z 优先的存储顺序，
/// 与 `dose` / `uncertainty` 数组的轴顺序一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridShape {
    pub nz: usize,
    pub nx: usize,
    pub ny: usize,
}

impl GridShape {
    /// 按文件头的读取顺序 (nx, ny, nz) 构建
    pub fn from_voxel_counts(nx: usize, ny: usize, nz: usize) -> Self {
        GridShape { nz, nx, ny }
    }

    /// 从数组维度 (Z, X, Y) 构建
    pub fn from_dim((nz, nx, ny): (usize, usize, usize)) -> Self {
        GridShape { nz, nx, ny }
    }

    /// 数组维度，(Z, X, Y) 顺序
    pub fn dim(&self) -> (usize, usize, usize) {
        (self.nz, self.nx, self.ny)
    }

    /// 体素总数，乘积溢出时返回 None
    pub fn checked_size(&self) -> Option<usize> {
        self.nz.checked_mul(self.nx)?.checked_mul(self.ny)
    }

    /// 体素总数，溢出时饱和到 `usize::MAX`
    pub fn size(&self) -> usize {
        self.checked_size().unwrap_or(usize::MAX)
    }
}

/// 各轴的体素边界坐标，语义顺序为 (x, y, z)
#[derive(Debug, Clone, PartialEq)]
pub struct AxisPositions {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl AxisPositions {
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        AxisPositions { x, y, z }
    }

    /// 按 [x, y, z] 顺序返回
    pub fn axes(&self) -> [&[f64]; 3] {
        [&self.x, &self.y, &self.z]
    }

    /// 逐轴相邻边界的差值
    pub fn spacing(&self) -> AxisSpacing {
        AxisSpacing {
            x: diff(&self.x),
            y: diff(&self.y),
            z: diff(&self.z),
        }
    }
}

/// 各轴相邻边界的间距，顺序与 [`AxisPositions`] 相同
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSpacing {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl AxisSpacing {
    pub fn axes(&self) -> [&[f64]; 3] {
        [&self.x, &self.y, &self.z]
    }

    /// 只保留间距不含 0 的轴的首个间距，其余轴被静默丢弃
    /// 缓存路径使用，不检查间距是否均匀
    pub fn nonzero_resolution(&self) -> Vec<f64> {
        self.axes()
            .iter()
            .filter(|steps| !steps.is_empty() && steps.iter().all(|&d| d != 0.0))
            .map(|steps| steps[0])
            .collect()
    }

    /// 只保留间距均匀且不含 0 的轴的分辨率，其余轴被静默丢弃
    pub fn uniform_resolution(&self) -> Vec<f64> {
        self.axes()
            .iter()
            .filter_map(|steps| uniform_step(steps))
            .collect()
    }

    /// 三个轴都必须是均匀间距，否则返回 [`DoseError::NonUniformGrid`]
    pub fn require_uniform(&self) -> Result<Vec<f64>> {
        let resolution = self.uniform_resolution();
        if resolution.len() != 3 {
            return Err(DoseError::NonUniformGrid);
        }
        Ok(resolution)
    }
}

fn diff(positions: &[f64]) -> Vec<f64> {
    positions.windows(2).map(|w| w[1] - w[0]).collect()
}

fn uniform_step(steps: &[f64]) -> Option<f64> {
    let first = *steps.first()?;
    if steps.iter().any(|&d| d == 0.0) {
        return None;
    }
    let tolerance = RESOLUTION_TOLERANCE * first.abs();
    steps
        .iter()
        .all(|&d| (d - first).abs() <= tolerance)
        .then_some(first)
}

/// 三维剂量网格
///
/// 构建后不可变。`shape`、`dose`、`uncertainty` 使用 (Z, X, Y) 轴顺序，
/// `positions`、`spacing` 以及各 extent 使用 (x, y, z) 轴顺序。
///
/// 两条加载路径对分辨率的校验不对称：
/// - `.3ddose` 文本格式要求三个轴都是均匀间距，否则加载失败；
/// - `.dosez` 缓存格式被视为已校验网格的转储，只丢弃含 0 间距的轴，
///   不检查均匀性，也不要求 `resolution` 有三个元素。
#[derive(Debug, Clone)]
pub struct DoseGrid {
    shape: GridShape,
    positions: AxisPositions,
    spacing: AxisSpacing,
    resolution: Vec<f64>,
    dose: Array3<f64>,
    uncertainty: Array3<f64>,
}

impl DoseGrid {
    /// 根据文件扩展名选择解析器加载网格
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        ParserRegistry::new().load(path.as_ref())
    }

    /// 将网格写入 `.dosez` 缓存归档，已存在的文件会被覆盖
    pub fn dump(&self, path: impl AsRef<Path>) -> Result<()> {
        cache::write_dose_grid(self, path.as_ref())
    }

    /// 由文本格式解析出的扁平数组构建，三个轴必须均匀
    pub fn from_legacy_parts(
        shape: GridShape,
        positions: AxisPositions,
        dose: Vec<f64>,
        uncertainty: Vec<f64>,
    ) -> Result<Self> {
        match shape.checked_size() {
            Some(0) => {
                return Err(DoseError::Parse {
                    line: 0,
                    message: format!("voxel counts must be positive, got {:?}", shape),
                });
            }
            None => {
                return Err(DoseError::Parse {
                    line: 0,
                    message: format!("voxel count overflows, got {:?}", shape),
                });
            }
            Some(_) => {}
        }
        check_positions(&positions).map_err(|(axis, name)| DoseError::Parse {
            line: axis + 1,
            message: format!("{} boundaries are empty", name),
        })?;

        let spacing = positions.spacing();
        let resolution = spacing.require_uniform()?;
        let dose = reshape(shape, dose, GridArray::Dose)?;
        let uncertainty = reshape(shape, uncertainty, GridArray::Uncertainty)?;

        Ok(Self::from_arrays(positions, spacing, resolution, dose, uncertainty))
    }

    /// 由缓存归档中的数组构建，shape 直接取自 `dose`
    pub fn from_cache_parts(
        positions: AxisPositions,
        dose: Array3<f64>,
        uncertainty: Array3<f64>,
    ) -> Result<Self> {
        if dose.is_empty() {
            return Err(DoseError::Cache("dose array is empty".to_string()));
        }
        if uncertainty.dim() != dose.dim() {
            return Err(DoseError::SizeMismatch {
                array: GridArray::Uncertainty,
                expected: dose.len(),
                actual: uncertainty.len(),
            });
        }
        check_positions(&positions)
            .map_err(|(_, name)| DoseError::Cache(format!("{} is empty", name)))?;

        let spacing = positions.spacing();
        let resolution = spacing.nonzero_resolution();
        Ok(Self::from_arrays(positions, spacing, resolution, dose, uncertainty))
    }

    fn from_arrays(
        positions: AxisPositions,
        spacing: AxisSpacing,
        resolution: Vec<f64>,
        dose: Array3<f64>,
        uncertainty: Array3<f64>,
    ) -> Self {
        let shape = GridShape::from_dim(dose.dim());
        debug!(
            "构建剂量网格: shape {:?}, resolution {:?}",
            shape.dim(),
            resolution
        );
        DoseGrid {
            shape,
            positions,
            spacing,
            resolution,
            dose,
            uncertainty,
        }
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    /// 体素总数，始终等于 `dose.len()` 与 `uncertainty.len()`
    pub fn size(&self) -> usize {
        self.shape.size()
    }

    pub fn positions(&self) -> &AxisPositions {
        &self.positions
    }

    pub fn spacing(&self) -> &AxisSpacing {
        &self.spacing
    }

    /// 各轴分辨率，文本格式加载时恒为 3 个元素，缓存加载时可能更少
    pub fn resolution(&self) -> &[f64] {
        &self.resolution
    }

    pub fn dose(&self) -> &Array3<f64> {
        &self.dose
    }

    pub fn uncertainty(&self) -> &Array3<f64> {
        &self.uncertainty
    }

    /// 第 `z` 层剂量切片，形状为 (nx, ny)
    pub fn dose_slice(&self, z: usize) -> Option<ArrayView2<'_, f64>> {
        slice_at(&self.dose, z)
    }

    pub fn uncertainty_slice(&self, z: usize) -> Option<ArrayView2<'_, f64>> {
        slice_at(&self.uncertainty, z)
    }

    pub fn min(&self) -> f64 {
        self.dose.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.dose.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn x_extent(&self) -> (f64, f64) {
        extent(&self.positions.x)
    }

    pub fn y_extent(&self) -> (f64, f64) {
        extent(&self.positions.y)
    }

    pub fn z_extent(&self) -> (f64, f64) {
        extent(&self.positions.z)
    }
}

fn check_positions(positions: &AxisPositions) -> std::result::Result<(), (usize, &'static str)> {
    const NAMES: [&str; 3] = ["x_positions", "y_positions", "z_positions"];
    match positions.axes().iter().position(|axis| axis.is_empty()) {
        Some(axis) => Err((axis, NAMES[axis])),
        None => Ok(()),
    }
}

fn reshape(shape: GridShape, values: Vec<f64>, array: GridArray) -> Result<Array3<f64>> {
    let actual = values.len();
    let mismatch = || DoseError::SizeMismatch {
        array,
        expected: shape.size(),
        actual,
    };
    if actual != shape.size() {
        return Err(mismatch());
    }
    Array3::from_shape_vec(shape.dim(), values).map_err(|_| mismatch())
}

fn slice_at(array: &Array3<f64>, z: usize) -> Option<ArrayView2<'_, f64>> {
    (z < array.len_of(Axis(0))).then(|| array.index_axis(Axis(0), z))
}

// 构建时保证每个轴至少有一个边界
fn extent(boundaries: &[f64]) -> (f64, f64) {
    (boundaries[0], boundaries[boundaries.len() - 1])
}
