use billview_core::{CategoryRule, Month, TransactionRecord};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, Pool, QueryBuilder, Sqlite};
use std::path::Path;
use std::str::FromStr;

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_id TEXT NOT NULL DEFAULT '',
            transaction_time TEXT NOT NULL DEFAULT '',
            transaction_category TEXT NOT NULL DEFAULT '',
            counterparty TEXT NOT NULL DEFAULT '',
            amount TEXT NOT NULL DEFAULT '0',
            type TEXT NOT NULL DEFAULT '',
            product_name TEXT NOT NULL DEFAULT '',
            remark TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    for column in [
        "transaction_id",
        "transaction_time",
        "counterparty",
        "amount",
        "type",
        "product_name",
        "remark",
    ] {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_transactions_{column} ON transactions ({column})"
        ))
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL UNIQUE CHECK (category <> ''),
            keywords TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── Categories ────────────────────────────────────────────────────────────────

fn encode_keywords(keywords: &[String]) -> Result<String, sqlx::Error> {
    serde_json::to_string(keywords).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

fn decode_keywords(raw: &str) -> Result<Vec<String>, sqlx::Error> {
    serde_json::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub async fn get_category_rules(pool: &DbPool) -> Result<Vec<CategoryRule>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, String, String)>(
        "SELECT id, category, keywords FROM categories ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(id, category, keywords)| {
            Ok(CategoryRule {
                id: Some(id),
                category,
                keywords: decode_keywords(&keywords)?,
            })
        })
        .collect()
}

pub async fn count_category_rules(pool: &DbPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories")
        .fetch_one(pool)
        .await
}

/// Inserts `rules` in order, all or nothing.
pub async fn insert_category_rules(
    pool: &DbPool,
    rules: &[CategoryRule],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for rule in rules {
        sqlx::query("INSERT INTO categories (category, keywords) VALUES (?, ?)")
            .bind(&rule.category)
            .bind(encode_keywords(&rule.keywords)?)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Writes the built-in rule set when the table is empty. Returns the number
/// of rules inserted.
pub async fn seed_default_categories(pool: &DbPool) -> Result<usize, sqlx::Error> {
    if count_category_rules(pool).await? > 0 {
        return Ok(0);
    }
    let defaults = CategoryRule::defaults();
    insert_category_rules(pool, &defaults).await?;
    tracing::info!("Seeded {} default category rules", defaults.len());
    Ok(defaults.len())
}

/// Insert or replace the keyword list of a category, keeping its id (and so
/// its position in iteration order) when it already exists.
pub async fn save_category_rule(pool: &DbPool, rule: &CategoryRule) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO categories (category, keywords) VALUES (?, ?) \
         ON CONFLICT(category) DO UPDATE SET keywords = excluded.keywords \
         RETURNING id",
    )
    .bind(&rule.category)
    .bind(encode_keywords(&rule.keywords)?)
    .fetch_one(pool)
    .await
}

pub async fn delete_category_rule(pool: &DbPool, category: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM categories WHERE category = ?")
        .bind(category)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ── Transactions ──────────────────────────────────────────────────────────────

type TransactionRow = (i64, String, String, String, String, String, String, String, String);

fn record_from_row(r: TransactionRow) -> TransactionRecord {
    TransactionRecord {
        id: Some(r.0),
        transaction_id: r.1,
        transaction_time: r.2,
        transaction_category: r.3,
        counterparty: r.4,
        amount: Decimal::from_str(&r.5).unwrap_or(Decimal::ZERO),
        kind: r.6,
        product_name: r.7,
        remark: r.8,
    }
}

/// Persists imported records in one SQL transaction and returns their new ids
/// in input order.
pub async fn insert_transactions(
    pool: &DbPool,
    records: &[TransactionRecord],
) -> Result<Vec<i64>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(records.len());
    for record in records {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO transactions (transaction_id, transaction_time, transaction_category, counterparty, amount, type, product_name, remark) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(&record.transaction_id)
        .bind(&record.transaction_time)
        .bind(&record.transaction_category)
        .bind(&record.counterparty)
        .bind(record.amount.to_string())
        .bind(&record.kind)
        .bind(&record.product_name)
        .bind(&record.remark)
        .fetch_one(&mut *tx)
        .await?;
        ids.push(id);
    }
    tx.commit().await?;
    Ok(ids)
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub month: Option<Month>,
    pub category: Option<String>,
    pub kind: Option<String>,
    pub limit: Option<i64>,
}

/// Stored transactions, newest first.
pub async fn get_transactions(
    pool: &DbPool,
    filter: &TransactionFilter,
) -> Result<Vec<TransactionRecord>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new(
        "SELECT id, transaction_id, transaction_time, transaction_category, counterparty, amount, type, product_name, remark FROM transactions WHERE 1 = 1",
    );
    if let Some(month) = filter.month {
        qb.push(" AND transaction_time LIKE ")
            .push_bind(format!("{}%", month.time_prefix()));
    }
    if let Some(category) = &filter.category {
        qb.push(" AND transaction_category = ").push_bind(category.clone());
    }
    if let Some(kind) = &filter.kind {
        qb.push(" AND type = ").push_bind(kind.clone());
    }
    qb.push(" ORDER BY transaction_time DESC, id DESC");
    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(limit);
    }

    let rows = qb.build_query_as::<TransactionRow>().fetch_all(pool).await?;
    Ok(rows.into_iter().map(record_from_row).collect())
}

pub async fn count_transactions(pool: &DbPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM transactions")
        .fetch_one(pool)
        .await
}

pub async fn update_transaction_category(
    pool: &DbPool,
    id: i64,
    category: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE transactions SET transaction_category = ? WHERE id = ?")
        .bind(category)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_transaction(pool: &DbPool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn clear_transactions(pool: &DbPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM transactions")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
