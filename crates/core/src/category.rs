use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bucket for transactions no keyword claims.
pub const OTHER_CATEGORY: &str = "其他";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<i64>,
    pub category: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(category: &str, keywords: &[&str]) -> Self {
        CategoryRule {
            id: None,
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// The built-in rule set written to an empty store, in seed order.
    pub fn defaults() -> Vec<CategoryRule> {
        DEFAULT_CATEGORIES
            .iter()
            .map(|(category, keywords)| CategoryRule::new(category, keywords))
            .collect()
    }
}

pub const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    ("早餐", &["早餐", "颜邦芹"]),
    ("房租", &["房租", "爱尚"]),
    ("收入", &["收入", "打开拼多多，领更多现金红包"]),
    (
        "餐饮美食",
        &[
            "外卖",
            "螺蛳粉",
            "火锅",
            "面馆",
            "餐饮",
            "美团",
            "拼一餐餐饮",
            "娟",
            "麦当劳",
            "肯德基",
            "文森纪",
        ],
    ),
    (
        "交通出行",
        &[
            "滴滴",
            "出租车",
            "公交",
            "地铁",
            "共享单车",
            "花小猪",
            "哈啰",
            "易通卡",
            "北京鸿易博",
        ],
    ),
    (
        "购物消费",
        &[
            "淘宝", "京东", "拼多多", "超市", "便利店", "消费", "购物", "收款", "电商",
        ],
    ),
    ("充值缴费", &["充值", "缴费", "话费", "电费", "水费"]),
    ("娱乐休闲", &["电影", "游戏", "KTV", "娱乐"]),
    ("医疗健康", &["医院", "药店", "体检", "医疗"]),
    ("教育培训", &["教育", "培训", "课程", "学习"]),
    ("生活服务", &["生活", "服务"]),
    ("数码电器", &["数码", "电器"]),
    ("投资理财", &["投资", "理财"]),
    ("人情世故", &["转账"]),
];

#[derive(Debug, Error)]
#[error("rule store error: {0}")]
pub struct StoreError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl StoreError {
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError(Box::new(err))
    }
}

/// Persistent source of category rules.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// All rules in store iteration order (ascending id).
    async fn all_rules(&self) -> Result<Vec<CategoryRule>, StoreError>;

    async fn insert_rules(&self, rules: &[CategoryRule]) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn default_table_has_fourteen_unique_categories() {
        let rules = CategoryRule::defaults();
        assert_eq!(rules.len(), 14);
        let names: HashSet<_> = rules.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(names.len(), 14);
        assert!(rules.iter().all(|r| !r.category.is_empty() && !r.keywords.is_empty()));
    }

    #[test]
    fn defaults_keep_table_order() {
        let rules = CategoryRule::defaults();
        assert_eq!(rules[0].category, "早餐");
        assert_eq!(rules[3].category, "餐饮美食");
        assert_eq!(rules[13].category, "人情世故");
        assert_eq!(rules[13].keywords, vec!["转账".to_string()]);
    }
}
