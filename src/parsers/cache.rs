use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::info;
use ndarray::Array3;

use crate::dose_grid::{AxisPositions, DoseGrid};
use crate::error::{DoseError, Result};
use crate::utils::parser::DoseGridParser;

/// 解压后负载的文件标识
pub const MAGIC: &[u8; 4] = b"DGZ1";

pub const DOSE_KEY: &str = "dose";
pub const UNCERTAINTY_KEY: &str = "uncertainty";
pub const X_POSITIONS_KEY: &str = "x_positions";
pub const Y_POSITIONS_KEY: &str = "y_positions";
pub const Z_POSITIONS_KEY: &str = "z_positions";

// 读取时预分配的上限，避免损坏的维度信息导致一次性申请过多内存
const MAX_PREALLOC: usize = 1 << 20;

/// 归档中的一个数组，数据按 C 顺序扁平存储
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArray {
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

/// gzip 压缩的具名数组归档
///
/// 解压后的布局（小端序）：
/// ```text
/// magic    "DGZ1"
/// count    u32
/// entry*   name_len u16 | name utf-8 | ndim u8 | dims u64 * ndim | values f64 * prod(dims)
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedArrayArchive {
    arrays: BTreeMap<String, StoredArray>,
}

impl NamedArrayArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, shape: Vec<usize>, data: Vec<f64>) {
        self.arrays
            .insert(name.to_string(), StoredArray { shape, data });
    }

    pub fn get(&self, name: &str) -> Option<&StoredArray> {
        self.arrays.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    /// 取出一维数组
    pub fn take_vector(&mut self, name: &str) -> Result<Vec<f64>> {
        let array = self.take(name)?;
        if array.shape.len() != 1 {
            return Err(DoseError::Cache(format!(
                "'{}' should be 1-dimensional, found shape {:?}",
                name, array.shape
            )));
        }
        Ok(array.data)
    }

    /// 取出三维数组
    pub fn take_volume(&mut self, name: &str) -> Result<Array3<f64>> {
        let array = self.take(name)?;
        let &[d0, d1, d2] = array.shape.as_slice() else {
            return Err(DoseError::Cache(format!(
                "'{}' should be 3-dimensional, found shape {:?}",
                name, array.shape
            )));
        };
        Array3::from_shape_vec((d0, d1, d2), array.data)
            .map_err(|e| DoseError::Cache(format!("'{}': {}", name, e)))
    }

    fn take(&mut self, name: &str) -> Result<StoredArray> {
        self.arrays
            .remove(name)
            .ok_or_else(|| DoseError::Cache(format!("missing array '{}'", name)))
    }

    /// 写出未压缩的负载
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(self.arrays.len() as u32)?;
        for (name, array) in &self.arrays {
            writer.write_u16::<LittleEndian>(name.len() as u16)?;
            writer.write_all(name.as_bytes())?;
            writer.write_u8(array.shape.len() as u8)?;
            for &dim in &array.shape {
                writer.write_u64::<LittleEndian>(dim as u64)?;
            }
            for &value in &array.data {
                writer.write_f64::<LittleEndian>(value)?;
            }
        }
        Ok(())
    }

    /// 读取未压缩的负载
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(truncated)?;
        if &magic != MAGIC {
            return Err(DoseError::Cache(format!("bad magic {:?}", magic)));
        }

        let count = reader.read_u32::<LittleEndian>().map_err(truncated)?;
        let mut archive = Self::new();
        for _ in 0..count {
            let name_len = reader.read_u16::<LittleEndian>().map_err(truncated)? as usize;
            let mut name = vec![0u8; name_len];
            reader.read_exact(&mut name).map_err(truncated)?;
            let name = String::from_utf8(name)
                .map_err(|_| DoseError::Cache("array name is not valid utf-8".to_string()))?;

            let ndim = reader.read_u8().map_err(truncated)?;
            let mut shape = Vec::with_capacity(ndim as usize);
            for _ in 0..ndim {
                shape.push(reader.read_u64::<LittleEndian>().map_err(truncated)? as usize);
            }
            let len = shape
                .iter()
                .try_fold(1usize, |acc, &d| acc.checked_mul(d))
                .ok_or_else(|| DoseError::Cache(format!("'{}' shape overflows", name)))?;

            let mut data = Vec::with_capacity(len.min(MAX_PREALLOC));
            for _ in 0..len {
                data.push(reader.read_f64::<LittleEndian>().map_err(truncated)?);
            }
            archive.arrays.insert(name, StoredArray { shape, data });
        }
        Ok(archive)
    }

    /// 压缩写入文件，已存在的文件会被覆盖
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        self.write_to(&mut encoder)?;
        encoder.finish()?.flush()?;
        Ok(())
    }

    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut decoder = GzDecoder::new(BufReader::new(file));
        Self::read_from(&mut decoder)
    }
}

fn truncated(e: io::Error) -> DoseError {
    if e.kind() == ErrorKind::UnexpectedEof {
        DoseError::Cache("archive is truncated".to_string())
    } else {
        DoseError::Io(e)
    }
}

/// 将网格的剂量、不确定度与三个轴的边界坐标写入归档
pub fn write_dose_grid(grid: &DoseGrid, path: &Path) -> Result<()> {
    let mut archive = NamedArrayArchive::new();
    archive.insert(
        DOSE_KEY,
        grid.dose().shape().to_vec(),
        grid.dose().iter().copied().collect(),
    );
    archive.insert(
        UNCERTAINTY_KEY,
        grid.uncertainty().shape().to_vec(),
        grid.uncertainty().iter().copied().collect(),
    );
    let positions = grid.positions();
    for (key, axis) in [X_POSITIONS_KEY, Y_POSITIONS_KEY, Z_POSITIONS_KEY]
        .into_iter()
        .zip(positions.axes())
    {
        archive.insert(key, vec![axis.len()], axis.to_vec());
    }

    archive.save(path)?;
    info!("剂量网格已写入 {}", path.display());
    Ok(())
}

/// 从归档重建网格，只丢弃含 0 间距的轴，不检查均匀性
pub fn read_dose_grid(path: &Path) -> Result<DoseGrid> {
    let mut archive = NamedArrayArchive::open(path)?;
    let dose = archive.take_volume(DOSE_KEY)?;
    let uncertainty = archive.take_volume(UNCERTAINTY_KEY)?;
    let positions = AxisPositions::new(
        archive.take_vector(X_POSITIONS_KEY)?,
        archive.take_vector(Y_POSITIONS_KEY)?,
        archive.take_vector(Z_POSITIONS_KEY)?,
    );
    DoseGrid::from_cache_parts(positions, dose, uncertainty)
}

/// `.dosez` 缓存格式解析器
pub struct DoseCacheParser;

impl DoseCacheParser {
    pub fn new() -> Self {
        DoseCacheParser
    }
}

impl Default for DoseCacheParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DoseGridParser for DoseCacheParser {
    fn supported_extensions(&self) -> Vec<&'static str> {
        vec!["dosez"]
    }

    fn name(&self) -> &'static str {
        "Dose Cache Parser"
    }

    fn parse_from_file(&self, file_path: &Path) -> Result<DoseGrid> {
        let grid = read_dose_grid(file_path)?;
        info!(
            "{} 缓存读取完成: shape {:?}, resolution {:?}",
            file_path.display(),
            grid.shape().dim(),
            grid.resolution()
        );
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_archive() -> NamedArrayArchive {
        let mut archive = NamedArrayArchive::new();
        archive.insert("volume", vec![1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        archive.insert("axis", vec![3], vec![0.0, 0.5, 1.0]);
        archive
    }

    #[test]
    fn payload_starts_with_magic_and_count() {
        let mut bytes = Vec::new();
        sample_archive().write_to(&mut bytes).unwrap();
        assert_eq!(&bytes[..4], MAGIC);
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 2);
    }

    #[test]
    fn payload_reads_back_named_arrays() {
        let mut bytes = Vec::new();
        sample_archive().write_to(&mut bytes).unwrap();
        let mut archive = NamedArrayArchive::read_from(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(archive.names().collect::<Vec<_>>(), vec!["axis", "volume"]);
        let volume = archive.take_volume("volume").unwrap();
        assert_eq!(volume.dim(), (1, 2, 2));
        assert_eq!(volume[[0, 1, 0]], 3.0);
        assert_eq!(archive.take_vector("axis").unwrap(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn wrong_dimensionality_is_rejected() {
        let mut archive = sample_archive();
        assert!(matches!(
            archive.take_vector("volume"),
            Err(DoseError::Cache(_))
        ));
        assert!(matches!(archive.take_volume("axis"), Err(DoseError::Cache(_))));
        assert!(matches!(archive.take_vector("missing"), Err(DoseError::Cache(_))));
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = Vec::new();
        sample_archive().write_to(&mut bytes).unwrap();
        bytes[0] = b'X';
        let err = NamedArrayArchive::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, DoseError::Cache(_)));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut bytes = Vec::new();
        sample_archive().write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);
        let err = NamedArrayArchive::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }
}
