use std::path::PathBuf;

use thiserror::Error;

/// 剂量网格加载/保存过程中的错误
#[derive(Debug, Error)]
pub enum DoseError {
    /// 文件扩展名没有对应的解析器
    #[error("Unrecognized dose file format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("Non-linear resolution in either x, y or z.")]
    NonUniformGrid,

    #[error(
        "{} array size does not match that specified: expected {expected}, found {actual}",
        .array.label()
    )]
    SizeMismatch {
        array: GridArray,
        expected: usize,
        actual: usize,
    },

    /// 文本格式不合法，line 为 0 起始的行号
    #[error("Malformed 3ddose data at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Malformed dose cache archive: {0}")]
    Cache(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 网格中与 shape 对齐的两个数组
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridArray {
    Dose,
    Uncertainty,
}

impl GridArray {
    pub fn label(self) -> &'static str {
        match self {
            GridArray::Dose => "Dose",
            GridArray::Uncertainty => "Uncertainty",
        }
    }
}

pub type Result<T> = std::result::Result<T, DoseError>;
