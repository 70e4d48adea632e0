use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use rust_embed::RustEmbed;
use serde::Deserialize;
use thiserror::Error;

use crate::color_match::ColorSample;

/// CSV 调色板必须且只能包含这四列（顺序敏感）
pub const REQUIRED_COLUMNS: [&str; 4] = ["Name", "R", "G", "B"];

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("palette file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read palette: {0}")]
    Io(#[from] std::io::Error),

    #[error("palette must have columns {REQUIRED_COLUMNS:?}, found {found:?}")]
    Schema { found: Vec<String> },

    #[error("malformed palette row at line {line}: {message}")]
    Row { line: u64, message: String },

    #[error("palette row at line {line} has an empty name")]
    EmptyName { line: u64 },

    #[error("no built-in palette named {0}")]
    MissingEmbedded(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteEntry {
    pub name: String,
    pub color: ColorSample,
}

impl PaletteEntry {
    pub fn new(name: impl Into<String>, color: ColorSample) -> Self {
        Self { name: name.into(), color }
    }
}

/// 调色板来源：内置资源或磁盘文件
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaletteSource {
    Embedded(String),
    File(PathBuf),
}

impl fmt::Display for PaletteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaletteSource::Embedded(name) => write!(f, "built-in {name}"),
            PaletteSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// 一个类别（如肤色、布料染料、土壤）对应的有序调色板
#[derive(Clone, Debug)]
pub struct Palette {
    pub label: String,
    pub entries: Vec<PaletteEntry>,
    pub source: PaletteSource,
}

#[derive(Deserialize)]
struct Row {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "R")]
    r: i32,
    #[serde(rename = "G")]
    g: i32,
    #[serde(rename = "B")]
    b: i32,
}

impl Palette {
    /// 从磁盘 CSV 读取；文件不存在时返回 `LoadError::NotFound`
    pub fn from_csv_path(label: impl Into<String>, path: &Path) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        let entries = parse_entries(file)?;
        log::info!("loaded palette {} ({} entries)", path.display(), entries.len());
        Ok(Self { label: label.into(), entries, source: PaletteSource::File(path.to_path_buf()) })
    }

    /// 从任意 reader 读取 CSV（表头必须为 `Name,R,G,B`）
    pub fn from_csv_reader<R: Read>(label: impl Into<String>, source: PaletteSource, reader: R) -> Result<Self, LoadError> {
        let entries = parse_entries(reader)?;
        Ok(Self { label: label.into(), entries, source })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entries<R: Read>(reader: R) -> Result<Vec<PaletteEntry>, LoadError> {
    // 表头必须逐字匹配，只对数据行去除首尾空白
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = rdr.headers().map_err(csv_to_load_error)?.clone();
    if headers.iter().ne(REQUIRED_COLUMNS.iter().copied()) {
        return Err(LoadError::Schema { found: headers.iter().map(str::to_owned).collect() });
    }

    let mut entries = Vec::new();
    for result in rdr.records() {
        let mut record = result.map_err(csv_to_load_error)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        record.trim();
        let row: Row = record
            .deserialize(Some(&headers))
            .map_err(|e| LoadError::Row { line, message: e.to_string() })?;
        if row.name.is_empty() {
            return Err(LoadError::EmptyName { line });
        }
        entries.push(PaletteEntry::new(row.name, ColorSample::new(row.r, row.g, row.b)));
    }
    Ok(entries)
}

fn csv_to_load_error(err: csv::Error) -> LoadError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) => LoadError::Io(e),
        _ => LoadError::Row { line, message },
    }
}

#[derive(RustEmbed)]
#[folder = "palettes"]
pub struct EmbeddedPalettes;

impl EmbeddedPalettes {
    pub const SKIN_TONES: &'static str = "skin_tones.csv";
    pub const FABRIC_DYES: &'static str = "fabric_dyes.csv";
    pub const SOIL_COLORS: &'static str = "soil_colors.csv";

    /// 解析一个内置 CSV 调色板
    pub fn load(label: impl Into<String>, file: &str) -> Result<Palette, LoadError> {
        let data = EmbeddedPalettes::get(file).ok_or_else(|| LoadError::MissingEmbedded(file.to_string()))?;
        Palette::from_csv_reader(label, PaletteSource::Embedded(file.to_string()), data.data.as_ref())
    }

    /// 所有内置调色板文件名（排序后）
    pub fn names() -> Vec<String> {
        let mut v: Vec<String> = EmbeddedPalettes::iter()
            .filter(|p| p.to_ascii_lowercase().ends_with(".csv"))
            .map(|p| p.into_owned())
            .collect();
        v.sort();
        v
    }
}
