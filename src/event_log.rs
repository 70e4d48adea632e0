use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::color_match::ColorSample;

pub const LOG_HEADER: [&str; 6] = ["Timestamp", "Category", "Name", "R", "G", "B"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Error, Debug)]
pub enum LogError {
    #[error("log file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log file CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// 一条匹配记录：`Timestamp,Category,Name,R,G,B`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: String,
    pub category: String,
    pub name: String,
    pub sample: ColorSample,
}

impl LogRecord {
    pub fn new(at: DateTime<Local>, category: &str, name: &str, sample: ColorSample) -> Self {
        Self {
            timestamp: format_timestamp(at),
            category: category.to_owned(),
            name: name.to_owned(),
            sample,
        }
    }
}

pub fn format_timestamp(at: DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// 只追加的 CSV 日志
#[derive(Clone, Debug)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    /// 首次使用时创建文件并写入表头；已存在则不改动
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LogError> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(file);
                w.write_record(LOG_HEADER)?;
                w.flush()?;
                log::info!("created log file {}", path.display());
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加若干记录，返回前已落盘
    pub fn append(&self, records: &[LogRecord]) -> Result<(), LogError> {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        for rec in records {
            let (r, g, b) = (rec.sample.r.to_string(), rec.sample.g.to_string(), rec.sample.b.to_string());
            w.write_record([
                rec.timestamp.as_str(),
                rec.category.as_str(),
                rec.name.as_str(),
                r.as_str(),
                g.as_str(),
                b.as_str(),
            ])?;
        }
        w.flush()?;
        Ok(())
    }

    /// 读取最后 `limit` 条记录（用于界面展示），无法解析的行会被跳过
    pub fn read_recent(&self, limit: usize) -> Result<Vec<LogRecord>, LogError> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).flexible(true).from_path(&self.path)?;
        let mut out = Vec::new();
        for result in rdr.records() {
            let rec = match result {
                Ok(rec) => rec,
                Err(e) if e.is_io_error() => return Err(e.into()),
                // 例如非 UTF-8 的名称：跳过这一行，继续读取
                Err(e) => {
                    log::warn!("skipping unreadable log line: {e}");
                    continue;
                }
            };
            match parse_record(&rec) {
                Some(r) => out.push(r),
                None => log::warn!("skipping malformed log line {:?}", rec.position().map(|p| p.line())),
            }
        }
        let skip = out.len().saturating_sub(limit);
        Ok(out.split_off(skip))
    }
}

/// 把新写入的记录接到内存中的最近记录后面，只保留最后 `limit` 条
pub fn push_recent(recent: &mut Vec<LogRecord>, records: &[LogRecord], limit: usize) {
    recent.extend_from_slice(records);
    let excess = recent.len().saturating_sub(limit);
    recent.drain(..excess);
}

fn parse_record(rec: &csv::StringRecord) -> Option<LogRecord> {
    if rec.len() != LOG_HEADER.len() { return None; }
    let channel = |i: usize| rec.get(i).and_then(|v| v.trim().parse::<i32>().ok());
    Some(LogRecord {
        timestamp: rec.get(0)?.to_owned(),
        category: rec.get(1)?.to_owned(),
        name: rec.get(2)?.to_owned(),
        sample: ColorSample::new(channel(3)?, channel(4)?, channel(5)?),
    })
}
