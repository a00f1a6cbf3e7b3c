use billview_core::TransactionRecord;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::{self, JoinSet};

use crate::matcher::Categorizer;
use crate::reader::{read_csv_rows, read_sheet_rows, CsvLayout, ImportError, SheetLayout};
use crate::{alipay, wechat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    AlipayCsv,
    WechatSheet,
}

impl SourceFormat {
    /// Picks the layout from the file name suffix, ignoring case.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        if name.ends_with(".csv") {
            Some(SourceFormat::AlipayCsv)
        } else if name.ends_with(".xlsx") || name.ends_with(".xls") {
            Some(SourceFormat::WechatSheet)
        } else {
            None
        }
    }

    pub fn normalize_bytes(
        self,
        data: Vec<u8>,
        file_name: &str,
        categorizer: &dyn Categorizer,
    ) -> Result<Vec<TransactionRecord>, ImportError> {
        match self {
            SourceFormat::AlipayCsv => {
                let rows = read_csv_rows(&data, &CsvLayout::alipay())?;
                Ok(alipay::normalize(rows, file_name, categorizer))
            }
            SourceFormat::WechatSheet => {
                let rows = read_sheet_rows(data, &SheetLayout::wechat())?;
                Ok(wechat::normalize(rows, file_name, categorizer))
            }
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::AlipayCsv => write!(f, "Alipay CSV"),
            SourceFormat::WechatSheet => write!(f, "WeChat spreadsheet"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FileSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub source: FileSource,
}

impl InputFile {
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        InputFile {
            name: name.into(),
            source: FileSource::Bytes(data),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        InputFile {
            name: path.display().to_string(),
            source: FileSource::Path(path.to_path_buf()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Imported { records: usize },
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub file_name: String,
    pub status: FileStatus,
}

/// Everything an import run produced. Records from one file keep their
/// order; files appear in completion order.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub records: Vec<TransactionRecord>,
    pub outcomes: Vec<FileOutcome>,
}

impl ImportReport {
    pub fn outcome(&self, file_name: &str) -> Option<&FileStatus> {
        self.outcomes
            .iter()
            .find(|o| o.file_name == file_name)
            .map(|o| &o.status)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, FileStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, FileStatus::Failed { .. }))
    }
}

/// Dispatches statement files to their normalizer and gathers the results.
pub struct Importer {
    categorizer: Arc<dyn Categorizer>,
}

impl Importer {
    pub fn new(categorizer: Arc<dyn Categorizer>) -> Self {
        Self { categorizer }
    }

    pub async fn import_paths(&self, paths: &[PathBuf]) -> ImportReport {
        self.import(paths.iter().map(|p| InputFile::from_path(p)).collect())
            .await
    }

    /// Imports every file concurrently. Unsupported and unreadable files are
    /// reported in the outcomes and contribute no records; nothing fails the
    /// run as a whole.
    pub async fn import(&self, files: Vec<InputFile>) -> ImportReport {
        let mut report = ImportReport::default();
        let mut tasks = JoinSet::new();
        let mut names: HashMap<task::Id, String> = HashMap::new();

        for file in files {
            let Some(format) = SourceFormat::from_file_name(&file.name) else {
                tracing::warn!("Unsupported file type, skipping: {}", file.name);
                report.outcomes.push(FileOutcome {
                    file_name: file.name,
                    status: FileStatus::Skipped {
                        reason: "unsupported file type".to_string(),
                    },
                });
                continue;
            };

            let categorizer = Arc::clone(&self.categorizer);
            let file_name = file.name.clone();
            let handle = tasks.spawn(process_file(file, format, categorizer));
            names.insert(handle.id(), file_name);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(e) => {
                    tracing::error!("Import task aborted: {e}");
                    (e.id(), Err(ImportError::Task(e)))
                }
            };
            let file_name = names.remove(&id).unwrap_or_default();

            match result {
                Ok(records) => {
                    tracing::info!("{file_name}: imported {} records", records.len());
                    report.outcomes.push(FileOutcome {
                        file_name,
                        status: FileStatus::Imported {
                            records: records.len(),
                        },
                    });
                    report.records.extend(records);
                }
                Err(e) => {
                    tracing::warn!("{file_name}: import failed: {e}");
                    report.outcomes.push(FileOutcome {
                        file_name,
                        status: FileStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        report
    }
}

async fn process_file(
    file: InputFile,
    format: SourceFormat,
    categorizer: Arc<dyn Categorizer>,
) -> Result<Vec<TransactionRecord>, ImportError> {
    tracing::info!("Processing {format} file: {}", file.name);
    let InputFile { name, source } = file;
    let data = match source {
        FileSource::Bytes(data) => data,
        FileSource::Path(path) => tokio::fs::read(&path).await?,
    };

    // Decoding and workbook parsing are CPU-bound.
    let parsed = task::spawn_blocking(move || {
        format.normalize_bytes(data, &name, categorizer.as_ref())
    })
    .await;
    match parsed {
        Ok(result) => result,
        // A parser panic fails the whole import task for this file.
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(e.into()),
    }
}
