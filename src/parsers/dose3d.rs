use std::path::Path;

use log::{info, warn};

use crate::dose_grid::{AxisPositions, DoseGrid, GridShape};
use crate::error::{DoseError, Result};
use crate::utils::parser::DoseGridParser;

/// 文件固定的行布局
const HEADER_LINE: usize = 0;
const POSITION_LINES: [usize; 3] = [1, 2, 3];
const DOSE_LINE: usize = 4;
const UNCERTAINTY_LINE: usize = 5;
const REQUIRED_LINES: usize = 6;

/// 3ddose 文本格式解析器
///
/// 文件按行定位，没有注释或版本信息：
/// ```text
/// 0: nx ny nz
/// 1: x 边界 (nx + 1 个)
/// 2: y 边界 (ny + 1 个)
/// 3: z 边界 (nz + 1 个)
/// 4: 扁平化剂量 (Z 优先)
/// 5: 扁平化不确定度 (Z 优先)
/// ```
pub struct Dose3dParser;

impl Dose3dParser {
    pub fn new() -> Self {
        Dose3dParser
    }
}

impl Default for Dose3dParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DoseGridParser for Dose3dParser {
    fn supported_extensions(&self) -> Vec<&'static str> {
        vec!["3ddose"]
    }

    fn name(&self) -> &'static str {
        "3ddose Parser"
    }

    fn parse_from_file(&self, file_path: &Path) -> Result<DoseGrid> {
        let text = std::fs::read_to_string(file_path)?;
        let grid = parse_dose3d(&text)?;
        info!(
            "{} 解析完成: shape {:?}, {} 个体素",
            file_path.display(),
            grid.shape().dim(),
            grid.size()
        );
        Ok(grid)
    }
}

/// 解析 3ddose 文件的全部内容
///
/// 校验顺序与格式的行顺序一致：先检查三个轴是否均匀，再检查剂量与不确定度的元素数。
pub fn parse_dose3d(text: &str) -> Result<DoseGrid> {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() < REQUIRED_LINES {
        return Err(DoseError::Parse {
            line: lines.len(),
            message: format!(
                "expected at least {} lines, found {}",
                REQUIRED_LINES,
                lines.len()
            ),
        });
    }

    let shape = parse_header(lines[HEADER_LINE])?;

    let [x, y, z] = POSITION_LINES.map(|line| parse_positions(lines[line], line));
    let positions = AxisPositions::new(x?, y?, z?);
    warn_on_boundary_counts(shape, &positions);

    // from_legacy_parts 会再次校验，这里只为在解析大数组之前提前失败
    positions.spacing().require_uniform()?;

    let dose = parse_floats(lines[DOSE_LINE], DOSE_LINE)?;
    let uncertainty = parse_floats(lines[UNCERTAINTY_LINE], UNCERTAINTY_LINE)?;

    DoseGrid::from_legacy_parts(shape, positions, dose, uncertainty)
}

/// 解析文件头 "nx ny nz"，返回 (Z, X, Y) 顺序的 shape
fn parse_header(line: &str) -> Result<GridShape> {
    let counts: Vec<usize> = line
        .split_whitespace()
        .map(|s| s.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| DoseError::Parse {
            line: HEADER_LINE,
            message: format!("invalid voxel count: {}", e),
        })?;

    let &[nx, ny, nz] = counts.as_slice() else {
        return Err(DoseError::Parse {
            line: HEADER_LINE,
            message: format!("expected 3 voxel counts, found {}", counts.len()),
        });
    };

    if nx == 0 || ny == 0 || nz == 0 {
        return Err(DoseError::Parse {
            line: HEADER_LINE,
            message: format!("voxel counts must be positive, got {} {} {}", nx, ny, nz),
        });
    }

    let shape = GridShape::from_voxel_counts(nx, ny, nz);
    if shape.checked_size().is_none() {
        return Err(DoseError::Parse {
            line: HEADER_LINE,
            message: format!("voxel count {} x {} x {} overflows", nx, ny, nz),
        });
    }
    Ok(shape)
}

fn parse_positions(line: &str, index: usize) -> Result<Vec<f64>> {
    let values = parse_floats(line, index)?;
    if values.is_empty() {
        return Err(DoseError::Parse {
            line: index,
            message: "no boundary coordinates".to_string(),
        });
    }
    Ok(values)
}

fn parse_floats(line: &str, index: usize) -> Result<Vec<f64>> {
    line.split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| DoseError::Parse {
                line: index,
                message: format!("cannot parse '{}' as a number", token),
            })
        })
        .collect()
}

fn warn_on_boundary_counts(shape: GridShape, positions: &AxisPositions) {
    let counts = [shape.nx, shape.ny, shape.nz];
    for ((name, boundaries), count) in ["x", "y", "z"]
        .iter()
        .zip(positions.axes())
        .zip(counts)
    {
        if boundaries.len().checked_sub(1) != Some(count) {
            warn!(
                "{} 轴有 {} 个体素，但给出了 {} 个边界坐标",
                name,
                count,
                boundaries.len()
            );
        }
    }
}
