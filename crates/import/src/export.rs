use billview_core::TransactionRecord;
use std::io::Write;

/// Column order of exported statements. Matches the import-side field names
/// so an export reads like a cleaned-up statement.
pub const EXPORT_HEADERS: [&str; 8] = [
    "交易时间",
    "交易分类",
    "交易对方",
    "商品",
    "收/支",
    "金额",
    "交易订单号",
    "备注",
];

/// Writes `records` as UTF-8 CSV with a header row.
pub fn export_csv<W: Write>(records: &[TransactionRecord], writer: W) -> Result<(), csv::Error> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(EXPORT_HEADERS)?;
    for r in records {
        let amount = r.amount.to_string();
        out.write_record([
            r.transaction_time.as_str(),
            r.transaction_category.as_str(),
            r.counterparty.as_str(),
            r.product_name.as_str(),
            r.kind.as_str(),
            amount.as_str(),
            r.transaction_id.as_str(),
            r.remark.as_str(),
        ])?;
    }
    out.flush()?;
    Ok(())
}
