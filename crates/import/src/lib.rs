pub mod alipay;
pub mod export;
pub mod importer;
pub mod matcher;
pub mod reader;
pub mod wechat;

pub use export::export_csv;
pub use importer::{FileOutcome, FileSource, FileStatus, ImportReport, Importer, InputFile, SourceFormat};
pub use matcher::{recategorize, Categorizer, CategoryMatcher, KeywordIndex, MatcherState};
pub use reader::{read_csv_rows, read_sheet_rows, CsvLayout, ImportError, RawRow, SheetLayout};
