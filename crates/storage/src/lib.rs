pub mod db;
pub mod rule_store;

pub use db::{
    clear_transactions, count_category_rules, count_transactions, create_db,
    delete_category_rule, delete_transaction, get_category_rules, get_transactions,
    insert_category_rules, insert_transactions, save_category_rule, seed_default_categories,
    update_transaction_category, DbPool, TransactionFilter,
};
pub use rule_store::SqliteRuleStore;
