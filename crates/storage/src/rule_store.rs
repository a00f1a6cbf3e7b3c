use async_trait::async_trait;
use billview_core::{CategoryRule, RuleStore, StoreError};

use crate::db::{get_category_rules, insert_category_rules, DbPool};

/// `RuleStore` over the `categories` table.
#[derive(Debug, Clone)]
pub struct SqliteRuleStore {
    pool: DbPool,
}

impl SqliteRuleStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleStore for SqliteRuleStore {
    async fn all_rules(&self) -> Result<Vec<CategoryRule>, StoreError> {
        get_category_rules(&self.pool).await.map_err(StoreError::new)
    }

    async fn insert_rules(&self, rules: &[CategoryRule]) -> Result<(), StoreError> {
        insert_category_rules(&self.pool, rules)
            .await
            .map_err(StoreError::new)
    }
}
