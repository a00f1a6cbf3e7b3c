pub mod amount;
pub mod category;
pub mod period;
pub mod summary;
pub mod transaction;

pub use amount::parse_amount;
pub use category::{CategoryRule, RuleStore, StoreError, DEFAULT_CATEGORIES, OTHER_CATEGORY};
pub use period::Month;
pub use summary::{summarize_by_category, CategoryTotal};
pub use transaction::{TransactionRecord, EXPENSE, INCOME};
