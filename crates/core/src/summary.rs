use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::category::OTHER_CATEGORY;
use super::transaction::TransactionRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Decimal,
    pub count: usize,
}

/// Totals `records` of the given kind (`支出`/`收入`) per category, largest
/// first. Records with an empty category are counted under `其他`.
pub fn summarize_by_category(records: &[TransactionRecord], kind: &str) -> Vec<CategoryTotal> {
    let mut totals: HashMap<&str, (Decimal, usize)> = HashMap::new();
    for record in records.iter().filter(|r| r.kind == kind) {
        let category = if record.transaction_category.is_empty() {
            OTHER_CATEGORY
        } else {
            record.transaction_category.as_str()
        };
        let entry = totals.entry(category).or_insert((Decimal::ZERO, 0));
        entry.0 += record.amount;
        entry.1 += 1;
    }

    let mut out: Vec<CategoryTotal> = totals
        .into_iter()
        .map(|(category, (total, count))| CategoryTotal {
            category: category.to_string(),
            total,
            count,
        })
        .collect();
    out.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    out
}
