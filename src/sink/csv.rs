// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::sink::{OutputRecord, RecordSink, SinkError};

/// CSV输出
///
/// 创建时写入表头行。字段按RFC 4180规则引用：
/// 包含分隔符、引号或换行的单元格加双引号并转义内部引号。
pub struct CsvSink {
    writer: BufWriter<File>,
    include_sentiment: bool,
}

impl CsvSink {
    /// 创建输出文件并写入表头
    ///
    /// # 参数
    ///
    /// * `path` - 输出文件路径
    /// * `include_sentiment` - 是否包含sentimentScore列
    pub async fn create(path: impl AsRef<Path>, include_sentiment: bool) -> std::io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = File::create(path).await?;
        let mut sink = Self {
            writer: BufWriter::new(file),
            include_sentiment,
        };

        let mut header = vec![
            "url".to_string(),
            "title".to_string(),
            "summary".to_string(),
            "publishedAt".to_string(),
            "source".to_string(),
            "fingerprint".to_string(),
        ];
        if include_sentiment {
            header.push("sentimentScore".to_string());
        }
        sink.writer.write_all(format_row(&header).as_bytes()).await?;
        Ok(sink)
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    async fn emit(&mut self, record: &OutputRecord) -> Result<(), SinkError> {
        let mut row = vec![
            record.url.clone(),
            record.title.clone(),
            record.summary.clone(),
            record.published_at.clone().unwrap_or_default(),
            record.source.clone(),
            record.fingerprint.clone(),
        ];
        if self.include_sentiment {
            row.push(match record.sentiment_score.flatten() {
                Some(score) => score.to_string(),
                None => String::new(),
            });
        }
        self.writer.write_all(format_row(&row).as_bytes()).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush().await?;
        Ok(())
    }
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// 格式化一行CSV（含行尾换行）
fn format_row(row: &[String]) -> String {
    let mut line = String::new();
    let mut first = true;
    for cell in row {
        if !first {
            line.push(',');
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            line.push('"');
            line.push_str(&cell.replace('"', "\"\""));
            line.push('"');
        } else {
            line.push_str(cell);
        }
    }
    line.push('\n');
    line
}
