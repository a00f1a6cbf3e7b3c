//! WeChat Pay statement rows (XLSX export).

use billview_core::{parse_amount, TransactionRecord, OTHER_CATEGORY};
use rust_decimal::Decimal;

use crate::matcher::Categorizer;
use crate::reader::RawRow;

pub const TIME: &str = "交易时间";
pub const COUNTERPARTY: &str = "交易对方";
pub const PRODUCT: &str = "商品";
pub const DIRECTION: &str = "收/支";
pub const AMOUNT: &str = "金额(元)";
pub const ORDER_ID: &str = "交易单号";
pub const REMARK: &str = "备注";

/// Column names by position. The sheet's own header row sits above the data
/// offset and is not read.
pub const HEADERS: &[&str] = &[
    "交易时间",
    "交易类型",
    "交易对方",
    "商品",
    "收/支",
    "金额(元)",
    "支付方式",
    "当前状态",
    "交易单号",
    "商户单号",
    "备注",
];

/// `收/支` value for rows that are neither income nor expense.
pub const NOT_COUNTED: &str = "/";

/// Small JD orders are food delivery sub-orders booked under the JD mall
/// merchant.
const JD_MARKER: &str = "京东";
const JD_FOOD_CATEGORY: &str = "餐饮美食";
const JD_FOOD_THRESHOLD: i64 = 30;

/// The category a JD order is forced into when it is small enough to be a
/// food sub-order, regardless of the keyword rules.
pub fn jd_food_override(product_name: &str, amount: Decimal) -> Option<&'static str> {
    (product_name.contains(JD_MARKER) && amount < Decimal::from(JD_FOOD_THRESHOLD))
        .then_some(JD_FOOD_CATEGORY)
}

pub fn normalize(
    rows: Vec<RawRow>,
    file_name: &str,
    categorizer: &dyn Categorizer,
) -> Vec<TransactionRecord> {
    let total = rows.len();
    let records: Vec<TransactionRecord> = rows
        .into_iter()
        .filter(|row| row.text(DIRECTION) != NOT_COUNTED)
        .map(|row| to_record(&row, categorizer))
        .collect();
    tracing::debug!(
        "{file_name}: {} of {total} rows kept after dropping '{NOT_COUNTED}'",
        records.len()
    );
    records
}

fn to_record(row: &RawRow, categorizer: &dyn Categorizer) -> TransactionRecord {
    let counterparty = row.text(COUNTERPARTY);
    let amount = parse_amount(row.text(AMOUNT));
    let product_name = match row.text(PRODUCT) {
        "" => String::new(),
        product => format!("[{counterparty}] - {product}").trim().to_string(),
    };

    let transaction_category = if product_name.is_empty() {
        String::new()
    } else {
        match jd_food_override(&product_name, amount) {
            Some(forced) => forced.to_string(),
            None => categorizer
                .match_category(&product_name)
                .unwrap_or_else(|| OTHER_CATEGORY.to_string()),
        }
    };

    TransactionRecord {
        id: None,
        transaction_id: row.text(ORDER_ID).trim().to_string(),
        transaction_time: row.text(TIME).to_string(),
        transaction_category,
        counterparty: counterparty.to_string(),
        amount,
        kind: row.text(DIRECTION).to_string(),
        product_name,
        remark: row.text(REMARK).to_string(),
    }
}
