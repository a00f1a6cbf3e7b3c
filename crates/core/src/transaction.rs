use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const EXPENSE: &str = "支出";
pub const INCOME: &str = "收入";

/// Canonical transaction shape shared by every statement layout.
///
/// String fields are never absent: a column missing from the source becomes
/// an empty string, and an unreadable amount becomes zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<i64>,
    pub transaction_id: String,
    pub transaction_time: String,
    pub transaction_category: String,
    pub counterparty: String,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: String,
    pub product_name: String,
    pub remark: String,
}
