//! Alipay statement rows (GBK CSV export).
//!
//! Only the columns below are carried into the canonical record; the
//! counter-account, payment method, status and merchant order number columns
//! are dropped.

use billview_core::{parse_amount, TransactionRecord, OTHER_CATEGORY};

use crate::matcher::Categorizer;
use crate::reader::RawRow;

pub const TIME: &str = "交易时间";
pub const CATEGORY: &str = "交易分类";
pub const COUNTERPARTY: &str = "交易对方";
pub const DESCRIPTION: &str = "商品说明";
pub const PRODUCT: &str = "商品";
pub const DIRECTION: &str = "收/支";
pub const AMOUNT: &str = "金额";
pub const ORDER_ID: &str = "交易订单号";
pub const REMARK: &str = "备注";

/// `收/支` value for entries that move no money in or out (transfers between
/// own accounts, refunds of frozen funds, ...).
pub const NOT_COUNTED: &str = "不计收支";

pub fn normalize(
    mut rows: Vec<RawRow>,
    file_name: &str,
    categorizer: &dyn Categorizer,
) -> Vec<TransactionRecord> {
    // The export ends in a footer line that parses as a malformed row.
    if rows.pop().is_none() {
        tracing::warn!("{file_name}: no rows after the header");
        return Vec::new();
    }

    let total = rows.len();
    let records: Vec<TransactionRecord> = rows
        .into_iter()
        .filter(|row| row.text(DIRECTION) != NOT_COUNTED)
        .map(|row| to_record(&row, categorizer))
        .collect();
    tracing::debug!(
        "{file_name}: {} of {total} rows kept after dropping {NOT_COUNTED}",
        records.len()
    );
    records
}

fn to_record(row: &RawRow, categorizer: &dyn Categorizer) -> TransactionRecord {
    let counterparty = row.text(COUNTERPARTY);
    let product_name = match row.text(DESCRIPTION) {
        "" => row.text(PRODUCT).to_string(),
        description => format!("[{counterparty}] - {description}").trim().to_string(),
    };

    let transaction_category = if product_name.is_empty() {
        row.text(CATEGORY).to_string()
    } else {
        categorizer
            .match_category(&product_name)
            .unwrap_or_else(|| OTHER_CATEGORY.to_string())
    };

    TransactionRecord {
        id: None,
        transaction_id: row.text(ORDER_ID).trim_end().to_string(),
        transaction_time: row.text(TIME).to_string(),
        transaction_category,
        counterparty: counterparty.to_string(),
        amount: parse_amount(row.text(AMOUNT)),
        kind: row.text(DIRECTION).to_string(),
        product_name,
        remark: row.text(REMARK).to_string(),
    }
}
