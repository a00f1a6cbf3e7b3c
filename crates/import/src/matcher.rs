use billview_core::{CategoryRule, RuleStore, StoreError, OTHER_CATEGORY};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::wechat;

/// Anything that can name a category for a product description.
pub trait Categorizer: Send + Sync {
    fn match_category(&self, text: &str) -> Option<String>;

    /// `false` while `match_category` answers `None` for lack of rules rather
    /// than for lack of a match.
    fn is_ready(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

/// Keyword → category lookup table.
///
/// Iteration follows the order in which each keyword was first inserted. A
/// keyword inserted again takes the newer category but keeps its place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordIndex {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl KeywordIndex {
    pub fn from_rules(rules: &[CategoryRule]) -> Self {
        let mut index = KeywordIndex::default();
        for rule in rules {
            for keyword in &rule.keywords {
                index.insert(keyword, &rule.category);
            }
        }
        index
    }

    pub fn insert(&mut self, keyword: &str, category: &str) {
        // An empty keyword is a substring of everything.
        if keyword.is_empty() {
            return;
        }
        match self.positions.get(keyword) {
            Some(&pos) => self.entries[pos].1 = category.to_string(),
            None => {
                self.positions.insert(keyword.to_string(), self.entries.len());
                self.entries.push((keyword.to_string(), category.to_string()));
            }
        }
    }

    /// Category of the first keyword contained in `text`.
    pub fn find(&self, text: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(keyword, _)| text.contains(keyword.as_str()))
            .map(|(_, category)| category.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
struct Snapshot {
    state: MatcherState,
    index: KeywordIndex,
}

impl Snapshot {
    fn empty(state: MatcherState) -> Arc<Self> {
        Arc::new(Snapshot {
            state,
            index: KeywordIndex::default(),
        })
    }
}

/// Keyword categorizer backed by a [`RuleStore`].
///
/// Lookups read an immutable snapshot; `load`/`reload` build a new index off
/// to the side and publish it in one pointer swap, so a caller sees either a
/// complete index or the not-ready state.
pub struct CategoryMatcher {
    store: Arc<dyn RuleStore>,
    snapshot: RwLock<Arc<Snapshot>>,
    /// Bumped by every `load`; only the latest one may publish.
    generation: AtomicU64,
}

impl CategoryMatcher {
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self {
            store,
            snapshot: RwLock::new(Snapshot::empty(MatcherState::Uninitialized)),
            generation: AtomicU64::new(0),
        }
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn publish(&self, next: Arc<Snapshot>) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn publish_if_current(&self, generation: u64, next: Arc<Snapshot>) -> bool {
        let mut slot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        if self.generation.load(Ordering::SeqCst) != generation {
            return false;
        }
        *slot = next;
        true
    }

    pub fn state(&self) -> MatcherState {
        self.current().state
    }

    pub fn keyword_count(&self) -> usize {
        self.current().index.len()
    }

    /// Current keyword → category pairs in match order.
    pub fn mappings(&self) -> Vec<(String, String)> {
        self.current()
            .index
            .iter()
            .map(|(k, c)| (k.to_string(), c.to_string()))
            .collect()
    }

    /// Reads the rules (seeding the defaults into an empty store) and
    /// publishes a fresh index. Store failures are logged and leave the
    /// matcher `Failed`; they are never returned.
    ///
    /// When loads overlap, the one started last wins; an older load that
    /// finishes later is discarded and reports the state currently published.
    pub async fn load(&self) -> MatcherState {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.is_ready() {
            self.publish(Snapshot::empty(MatcherState::Loading));
        }

        let next = match self.fetch_rules().await {
            Ok(rules) => {
                let index = KeywordIndex::from_rules(&rules);
                tracing::info!(
                    "Loaded {} category rules with {} keywords",
                    rules.len(),
                    index.len()
                );
                Arc::new(Snapshot {
                    state: MatcherState::Ready,
                    index,
                })
            }
            Err(e) => {
                tracing::error!("Failed to load category rules: {e}");
                Snapshot::empty(MatcherState::Failed)
            }
        };

        let state = next.state;
        if self.publish_if_current(generation, next) {
            state
        } else {
            tracing::debug!("Discarding rules from superseded load #{generation}");
            self.state()
        }
    }

    /// Drops the current index and loads the rules again.
    pub async fn reload(&self) -> MatcherState {
        self.publish(Snapshot::empty(MatcherState::Loading));
        self.load().await
    }

    async fn fetch_rules(&self) -> Result<Vec<CategoryRule>, StoreError> {
        let rules = self.store.all_rules().await?;
        if !rules.is_empty() {
            return Ok(rules);
        }

        let defaults = CategoryRule::defaults();
        tracing::info!(
            "Category store is empty, seeding {} default rules",
            defaults.len()
        );
        self.store.insert_rules(&defaults).await?;
        self.store.all_rules().await
    }

    /// Matcher result with the `其他` fallback applied.
    pub fn category_or_other(&self, text: &str) -> String {
        self.match_category(text)
            .unwrap_or_else(|| OTHER_CATEGORY.to_string())
    }
}

impl Categorizer for CategoryMatcher {
    fn match_category(&self, text: &str) -> Option<String> {
        let snapshot = self.current();
        if snapshot.state != MatcherState::Ready {
            tracing::warn!(
                "Category rules not loaded ({:?}); leaving '{}' unmatched",
                snapshot.state,
                text
            );
            return None;
        }
        snapshot.index.find(text).map(str::to_string)
    }

    fn is_ready(&self) -> bool {
        self.state() == MatcherState::Ready
    }
}

/// Re-runs keyword matching over stored records. Returns `(position, new
/// category)` for every record whose category would change.
///
/// Left alone: records without a product description, and small JD orders
/// already carrying the food category the WeChat import forces on them. An
/// unready categorizer yields no changes at all.
pub fn recategorize(
    records: &[billview_core::TransactionRecord],
    categorizer: &dyn Categorizer,
) -> Vec<(usize, String)> {
    if !categorizer.is_ready() {
        tracing::warn!("Category rules not loaded; keeping stored categories");
        return Vec::new();
    }

    records
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.product_name.is_empty())
        .filter(|(_, r)| {
            wechat::jd_food_override(&r.product_name, r.amount)
                != Some(r.transaction_category.as_str())
        })
        .filter_map(|(i, r)| {
            let category = categorizer
                .match_category(&r.product_name)
                .unwrap_or_else(|| OTHER_CATEGORY.to_string());
            (category != r.transaction_category).then_some((i, category))
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use billview_core::TransactionRecord;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn rule(category: &str, keywords: &[&str]) -> CategoryRule {
        CategoryRule::new(category, keywords)
    }

    #[test]
    fn index_first_hit_wins() {
        let index = KeywordIndex::from_rules(&[
            rule("购物消费", &["淘宝", "京东"]),
            rule("餐饮美食", &["外卖"]),
        ]);
        // Both 淘宝 and 外卖 occur; 淘宝 was indexed first.
        assert_eq!(index.find("[淘宝闪购] - 古茗外卖订单"), Some("购物消费"));
        assert_eq!(index.find("美团外卖"), Some("餐饮美食"));
        assert_eq!(index.find("中国石化"), None);
    }

    #[test]
    fn index_duplicate_keyword_later_rule_wins_keeps_position() {
        let index = KeywordIndex::from_rules(&[
            rule("A", &["x", "y"]),
            rule("B", &["z", "x"]),
        ]);
        let pairs: Vec<_> = index.iter().collect();
        assert_eq!(pairs, vec![("x", "B"), ("y", "A"), ("z", "B")]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn index_ignores_empty_keyword() {
        let index = KeywordIndex::from_rules(&[rule("A", &[""]), rule("B", &["b"])]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.find("anything"), None);
    }

    #[test]
    fn no_specificity_ranking() {
        // The longer keyword appears later, so the shorter one wins.
        let index = KeywordIndex::from_rules(&[
            rule("生活服务", &["服务"]),
            rule("医疗健康", &["医疗服务"]),
        ]);
        assert_eq!(index.find("社区医疗服务中心"), Some("生活服务"));
    }

    #[tokio::test]
    async fn unloaded_matcher_returns_none() {
        let matcher = CategoryMatcher::new(Arc::new(MemoryStore::default()));
        assert_eq!(matcher.state(), MatcherState::Uninitialized);
        assert_eq!(matcher.match_category("美团外卖"), None);
        assert_eq!(matcher.category_or_other("美团外卖"), "其他");
    }

    #[tokio::test]
    async fn load_seeds_empty_store_exactly_once() {
        let store = Arc::new(MemoryStore::default());
        let matcher = CategoryMatcher::new(store.clone());

        assert_eq!(matcher.load().await, MatcherState::Ready);
        assert_eq!(store.insert_calls(), 1);
        assert_eq!(store.rules.lock().unwrap().len(), 14);

        matcher.load().await;
        matcher.reload().await;
        assert_eq!(store.insert_calls(), 1);
        assert_eq!(store.rules.lock().unwrap().len(), 14);
    }

    #[tokio::test]
    async fn non_empty_store_is_not_seeded() {
        let store = Arc::new(MemoryStore::with_rules(vec![rule("宠物", &["猫粮"])]));
        let matcher = CategoryMatcher::new(store.clone());
        matcher.load().await;
        assert_eq!(store.insert_calls(), 0);
        assert_eq!(matcher.keyword_count(), 1);
        assert_eq!(matcher.match_category("皇家猫粮").as_deref(), Some("宠物"));
        assert_eq!(matcher.match_category("美团外卖"), None);
    }

    #[tokio::test]
    async fn default_rules_categorize_common_descriptions() {
        let matcher = ready_matcher(Vec::new()).await;
        assert_eq!(
            matcher.match_category("[滴滴出行] - 快车订单").as_deref(),
            Some("交通出行")
        );
        assert_eq!(
            matcher.match_category("[张三] - 转账").as_deref(),
            Some("人情世故")
        );
        assert_eq!(matcher.match_category("[中国石化] - 加油"), None);
    }

    #[tokio::test]
    async fn reload_twice_gives_identical_mappings() {
        let matcher = ready_matcher(Vec::new()).await;
        matcher.reload().await;
        let first = matcher.mappings();
        matcher.reload().await;
        let second = matcher.mappings();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn reload_picks_up_rule_changes() {
        let store = Arc::new(MemoryStore::with_rules(vec![rule("A", &["a"])]));
        let matcher = CategoryMatcher::new(store.clone());
        matcher.load().await;
        assert_eq!(matcher.match_category("b").as_deref(), None);

        store.rules.lock().unwrap().push(rule("B", &["b"]));
        matcher.reload().await;
        assert_eq!(matcher.match_category("b").as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn store_failure_leaves_matcher_failed() {
        let matcher = CategoryMatcher::new(Arc::new(FailingStore));
        assert_eq!(matcher.load().await, MatcherState::Failed);
        assert!(!matcher.is_ready());
        assert_eq!(matcher.match_category("美团外卖"), None);
    }

    #[tokio::test]
    async fn seed_failure_leaves_matcher_failed() {
        let matcher = CategoryMatcher::new(Arc::new(ReadOnlyStore));
        assert_eq!(matcher.load().await, MatcherState::Failed);
        assert_eq!(matcher.keyword_count(), 0);
    }

    #[tokio::test]
    async fn lookups_during_reload_see_not_ready_then_new_index() {
        let store = Arc::new(MemoryStore::with_rules(vec![rule("A", &["a"])]));
        let matcher = Arc::new(CategoryMatcher::new(store.clone()));
        matcher.load().await;
        assert_eq!(matcher.match_category("a").as_deref(), Some("A"));

        let gate = store.gate.lock().await;
        let reloading = tokio::spawn({
            let matcher = Arc::clone(&matcher);
            async move { matcher.reload().await }
        });
        while matcher.state() != MatcherState::Loading {
            tokio::task::yield_now().await;
        }
        assert_eq!(matcher.match_category("a"), None);
        assert_eq!(matcher.keyword_count(), 0);

        drop(gate);
        assert_eq!(reloading.await.unwrap(), MatcherState::Ready);
        assert_eq!(matcher.match_category("a").as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn recategorize_reports_only_changes() {
        let matcher = ready_matcher(Vec::new()).await;
        let records = vec![
            TransactionRecord {
                product_name: "[美团] - 外卖".to_string(),
                transaction_category: "其他".to_string(),
                ..Default::default()
            },
            TransactionRecord {
                product_name: "[滴滴] - 快车".to_string(),
                transaction_category: "交通出行".to_string(),
                ..Default::default()
            },
            TransactionRecord {
                product_name: String::new(),
                transaction_category: "信用借还".to_string(),
                ..Default::default()
            },
            TransactionRecord {
                product_name: "[中国石化] - 加油".to_string(),
                transaction_category: "交通出行".to_string(),
                ..Default::default()
            },
        ];
        let changes = recategorize(&records, matcher.as_ref());
        assert_eq!(
            changes,
            vec![(0, "餐饮美食".to_string()), (3, "其他".to_string())]
        );
    }

    #[tokio::test]
    async fn superseded_load_does_not_replace_newer_index() {
        let store = Arc::new(SlowFirstReadStore::new(
            vec![rule("旧分类", &["a"])],
            vec![rule("新分类", &["a"])],
        ));
        let matcher = Arc::new(CategoryMatcher::new(store.clone()));

        let first = tokio::spawn({
            let matcher = Arc::clone(&matcher);
            async move { matcher.load().await }
        });
        while store.reads() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(matcher.reload().await, MatcherState::Ready);
        assert_eq!(matcher.match_category("a").as_deref(), Some("新分类"));

        store.release.notify_one();
        assert_eq!(first.await.unwrap(), MatcherState::Ready);
        assert_eq!(matcher.match_category("a").as_deref(), Some("新分类"));
    }

    #[tokio::test]
    async fn recategorize_with_failed_rules_changes_nothing() {
        let matcher = CategoryMatcher::new(Arc::new(FailingStore));
        assert_eq!(matcher.load().await, MatcherState::Failed);

        let records = vec![TransactionRecord {
            product_name: "[美团] - 外卖".to_string(),
            transaction_category: "餐饮美食".to_string(),
            ..Default::default()
        }];
        assert!(recategorize(&records, &matcher).is_empty());
    }

    #[tokio::test]
    async fn recategorize_keeps_forced_jd_food_orders() {
        let matcher = ready_matcher(Vec::new()).await;
        let jd = |amount: &str, category: &str| TransactionRecord {
            product_name: "[京东商城平台商户] - 京东-订单编号1".to_string(),
            amount: Decimal::from_str(amount).unwrap(),
            transaction_category: category.to_string(),
            ..Default::default()
        };
        let records = vec![
            // Forced to food at WeChat import.
            jd("25.00", "餐饮美食"),
            // Alipay import of the same order keeps the general match.
            jd("25.00", "购物消费"),
            jd("25.00", "其他"),
            jd("45.00", "餐饮美食"),
        ];
        let changes = recategorize(&records, matcher.as_ref());
        assert_eq!(
            changes,
            vec![(2, "购物消费".to_string()), (3, "购物消费".to_string())]
        );
    }
}
