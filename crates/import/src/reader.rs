use calamine::{Data, Reader};
use encoding_rs::Encoding;
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Sheet(#[from] calamine::Error),
    #[error("No header row after skipping {0} lines")]
    MissingHeader(usize),
    #[error("Workbook has no worksheet")]
    EmptySheet,
    #[error("Background parse task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One parsed statement line, keyed by column header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow(HashMap<String, String>);

impl RawRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    /// Cell text, treating a missing column the same as an empty cell.
    pub fn text(&self, column: &str) -> &str {
        self.get(column).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        RawRow(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Where the header sits in a delimited-text export and how it is encoded.
#[derive(Debug, Clone, Copy)]
pub struct CsvLayout {
    pub skip_lines: usize,
    pub encoding: &'static Encoding,
}

impl CsvLayout {
    /// Alipay exports: GBK text with a 24-line preamble before the header.
    pub fn alipay() -> Self {
        CsvLayout {
            skip_lines: 24,
            encoding: encoding_rs::GBK,
        }
    }
}

/// Spreadsheet exports without a usable header row: data starts at a fixed
/// row and columns are named positionally.
#[derive(Debug, Clone, Copy)]
pub struct SheetLayout {
    pub first_data_row: u32,
    pub headers: &'static [&'static str],
}

impl SheetLayout {
    pub fn wechat() -> Self {
        SheetLayout {
            first_data_row: 17,
            headers: crate::wechat::HEADERS,
        }
    }
}

pub fn read_csv_rows(data: &[u8], layout: &CsvLayout) -> Result<Vec<RawRow>, ImportError> {
    let (text, encoding, had_errors) = layout.encoding.decode(data);
    if had_errors {
        tracing::warn!(
            "Input is not valid {}; undecodable bytes were replaced",
            encoding.name()
        );
    }

    let body = text
        .splitn(layout.skip_lines + 1, '\n')
        .nth(layout.skip_lines)
        .ok_or(ImportError::MissingHeader(layout.skip_lines))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(ImportError::MissingHeader(layout.skip_lines));
    }

    let mut rows: Vec<RawRow> = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.trim(), v))
                .collect(),
        );
    }
    Ok(rows)
}

pub fn read_sheet_rows(data: Vec<u8>, layout: &SheetLayout) -> Result<Vec<RawRow>, ImportError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(data))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ImportError::EmptySheet)??;

    let Some((last_row, _)) = range.end() else {
        return Ok(Vec::new());
    };

    let mut rows: Vec<RawRow> = Vec::new();
    for row in layout.first_data_row..=last_row {
        let cells: Vec<String> = (0..layout.headers.len() as u32)
            .map(|col| range.get_value((row, col)).map(cell_text).unwrap_or_default())
            .collect();
        // Blank lines between sections carry no transaction.
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(layout.headers.iter().copied().zip(cells).collect());
    }
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        other => other.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_skips_preamble_and_decodes_gbk() {
        let data = fixtures::alipay_csv(&[
            "2025-11-15 15:06:08,餐饮美食,淘宝闪购,e50***@alibaba-inc.com,古茗外卖订单,支出,5.50,花呗,交易成功,2025111522001189991415504764\t,13150600725111561969619509886\t,,",
        ]);
        let rows = read_csv_rows(&data, &CsvLayout::alipay()).unwrap();
        // The footer line comes through as a row of its own.
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("交易对方"), Some("淘宝闪购"));
        assert_eq!(rows[0].get("商品说明"), Some("古茗外卖订单"));
        assert_eq!(rows[0].get("金额"), Some("5.50"));
        assert_eq!(
            rows[0].get("交易订单号"),
            Some("2025111522001189991415504764\t")
        );
    }

    #[test]
    fn csv_short_file_has_no_header() {
        let (bytes, _, _) = encoding_rs::GBK.encode("只有一行\n");
        let err = read_csv_rows(&bytes, &CsvLayout::alipay()).unwrap_err();
        assert!(matches!(err, ImportError::MissingHeader(24)));
    }

    #[test]
    fn sheet_reads_fixed_columns_from_offset() {
        let data = fixtures::wechat_xlsx(&[
            [
                "2025-11-15 18:21:45",
                "商户消费",
                "京东商城平台商户",
                "京东-订单编号343616795360",
                "支出",
                "¥47.50",
                "招商银行储蓄卡(3511)",
                "支付成功",
                "4200002851202511152141016602",
                "1012734925111518214400129",
                "/",
            ],
            [
                "2025-11-16 08:00:00",
                "转账",
                "张三",
                "",
                "收入",
                "¥100.00",
                "/",
                "已存入零钱",
                "1000050001202511160000000001",
                "",
                "/",
            ],
        ]);
        let rows = read_sheet_rows(data, &SheetLayout::wechat()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("交易对方"), Some("京东商城平台商户"));
        assert_eq!(rows[0].get("金额(元)"), Some("¥47.50"));
        assert_eq!(rows[0].get("交易单号"), Some("4200002851202511152141016602"));
        // Empty cells are present as empty strings.
        assert_eq!(rows[1].get("商品"), Some(""));
        assert!(crate::wechat::HEADERS
            .iter()
            .all(|h| rows[1].get(h).is_some()));
    }

    #[test]
    fn sheet_without_data_rows_is_empty() {
        let data = fixtures::wechat_xlsx(&[]);
        let rows = read_sheet_rows(data, &SheetLayout::wechat()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn garbage_bytes_are_a_sheet_error() {
        let err = read_sheet_rows(b"not a workbook".to_vec(), &SheetLayout::wechat()).unwrap_err();
        assert!(matches!(err, ImportError::Sheet(_)));
    }

    #[test]
    fn raw_row_text_defaults_to_empty() {
        let row: RawRow = [("收/支", "支出")].into_iter().collect();
        assert_eq!(row.text("收/支"), "支出");
        assert_eq!(row.text("备注"), "");
        assert_eq!(row.get("备注"), None);
    }
}
