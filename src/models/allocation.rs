//! 资产配置模型
//!
//! 按分类描述每个资产的目标权重，权重之和必须为 1

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

/// 权重之和允许的误差
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// 资产配置错误
#[derive(Error, Debug, PartialEq)]
pub enum AllocationError {
    #[error("资产配置为空")]
    Empty,

    #[error("分类名称不能为空")]
    EmptyCategoryName,

    #[error("无效的资产代码: {0}")]
    InvalidSymbol(String),

    #[error("资产 {0} 重复配置")]
    DuplicateSymbol(String),

    #[error("资产 {symbol} 的权重 {weight} 不在 [0, 1] 范围内")]
    InvalidWeight { symbol: String, weight: f64 },

    #[error("权重之和为 {0}，应为 1")]
    WeightSum(f64),
}

/// 资产配置分类（如 Large Cap）
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AllocationCategory {
    pub name: String,
    /// (资产代码, 目标权重)，按声明顺序
    pub assets: Vec<(String, f64)>,
}

impl AllocationCategory {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            assets: Vec::new(),
        }
    }

    /// 添加资产，代码统一转为大写
    pub fn with_asset(mut self, symbol: &str, weight: f64) -> Self {
        self.assets.push((symbol.trim().to_uppercase(), weight));
        self
    }

    /// 分类目标权重
    pub fn weight(&self) -> f64 {
        self.assets.iter().map(|(_, w)| w).sum()
    }
}

/// 资产配置
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Allocation {
    pub categories: Vec<AllocationCategory>,
}

impl Allocation {
    pub fn new() -> Self {
        Self {
            categories: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: AllocationCategory) -> Self {
        self.categories.push(category);
        self
    }

    /// 校验配置，通过后返回自身
    pub fn verify(self) -> Result<Self, AllocationError> {
        if self.categories.is_empty() {
            return Err(AllocationError::Empty);
        }

        let symbol_re = Regex::new(r"^[A-Z0-9]{2,10}$").expect("static regex");
        let mut seen = HashSet::new();
        let mut total = 0.0;

        for category in &self.categories {
            if category.name.is_empty() {
                return Err(AllocationError::EmptyCategoryName);
            }
            for (symbol, weight) in &category.assets {
                if !symbol_re.is_match(symbol) {
                    return Err(AllocationError::InvalidSymbol(symbol.clone()));
                }
                if !seen.insert(symbol.as_str()) {
                    return Err(AllocationError::DuplicateSymbol(symbol.clone()));
                }
                if !weight.is_finite() || *weight < 0.0 || *weight > 1.0 {
                    return Err(AllocationError::InvalidWeight {
                        symbol: symbol.clone(),
                        weight: *weight,
                    });
                }
                total += weight;
            }
        }

        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(AllocationError::WeightSum(total));
        }

        Ok(self)
    }

    /// 所有资产代码（按声明顺序，包含权重为 0 的资产）
    pub fn symbols(&self) -> Vec<String> {
        self.categories
            .iter()
            .flat_map(|c| c.assets.iter().map(|(s, _)| s.clone()))
            .collect()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.weight_of(symbol).is_some()
    }

    /// 资产目标权重
    pub fn weight_of(&self, symbol: &str) -> Option<f64> {
        self.categories
            .iter()
            .flat_map(|c| c.assets.iter())
            .find(|(s, _)| s == symbol)
            .map(|(_, w)| *w)
    }

    /// 资产所属分类名称
    pub fn category_of(&self, symbol: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.assets.iter().any(|(s, _)| s == symbol))
            .map(|c| c.name.as_str())
    }

    /// 去掉部分资产后的配置，剩余权重按比例放大，总和仍为 1
    ///
    /// 去掉后为空的分类一并移除
    pub fn without(&self, excluded: &[String]) -> Allocation {
        let mut categories: Vec<AllocationCategory> = self
            .categories
            .iter()
            .map(|c| AllocationCategory {
                name: c.name.clone(),
                assets: c
                    .assets
                    .iter()
                    .filter(|(s, _)| !excluded.contains(s))
                    .cloned()
                    .collect(),
            })
            .filter(|c| !c.assets.is_empty())
            .collect();

        let total: f64 = categories.iter().map(|c| c.weight()).sum();
        if total > 0.0 {
            for (_, weight) in categories.iter_mut().flat_map(|c| c.assets.iter_mut()) {
                *weight /= total;
            }
        }

        Allocation { categories }
    }

    pub fn category_weight(&self, name: &str) -> Option<f64> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.weight())
    }
}

impl Default for Allocation {
    /// 内置资产配置
    fn default() -> Self {
        Allocation::new()
            .with_category(
                AllocationCategory::new("Large Cap")
                    .with_asset("ETH", 0.23)
                    .with_asset("BTC", 0.18)
                    .with_asset("ADA", 0.14)
                    .with_asset("SOL", 0.05),
            )
            .with_category(
                AllocationCategory::new("Mid Cap")
                    .with_asset("LINK", 0.13)
                    .with_asset("MATIC", 0.13)
                    .with_asset("UNI", 0.09)
                    .with_asset("DOT", 0.05),
            )
            .with_category(AllocationCategory::new("Other").with_asset("BNB", 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allocation_verifies() {
        let allocation = Allocation::default().verify().unwrap();
        assert_eq!(
            allocation.symbols(),
            vec!["ETH", "BTC", "ADA", "SOL", "LINK", "MATIC", "UNI", "DOT", "BNB"]
        );
        assert_eq!(allocation.weight_of("BNB"), Some(0.0));
        assert_eq!(allocation.category_of("UNI"), Some("Mid Cap"));
        assert!((allocation.category_weight("Large Cap").unwrap() - 0.60).abs() < 1e-9);
    }

    #[test]
    fn test_without_renormalizes_weights() {
        let allocation = Allocation::default().verify().unwrap();
        let reduced = allocation.without(&["ETH".to_string(), "LINK".to_string()]);

        assert!(!reduced.contains("ETH"));
        assert!(!reduced.contains("LINK"));
        // 剩余 0.64，BTC 0.18 -> 0.28125
        assert!((reduced.weight_of("BTC").unwrap() - 0.28125).abs() < 1e-9);
        assert_eq!(reduced.weight_of("BNB"), Some(0.0));
        assert!(reduced.clone().verify().is_ok());

        let only_other = allocation.without(&allocation.symbols()[..8].to_vec());
        assert_eq!(only_other.categories.len(), 1);
        assert_eq!(only_other.categories[0].name, "Other");
    }

    #[test]
    fn test_symbols_are_uppercased() {
        let allocation = Allocation::new()
            .with_category(AllocationCategory::new("All").with_asset(" btc ", 1.0))
            .verify()
            .unwrap();
        assert!(allocation.contains("BTC"));
        assert!(!allocation.contains("btc"));
    }

    #[test]
    fn test_weight_sum_must_be_one() {
        let result = Allocation::new()
            .with_category(
                AllocationCategory::new("All")
                    .with_asset("BTC", 0.5)
                    .with_asset("ETH", 0.4),
            )
            .verify();
        assert!(matches!(result, Err(AllocationError::WeightSum(_))));
    }

    #[test]
    fn test_duplicate_across_categories() {
        let result = Allocation::new()
            .with_category(AllocationCategory::new("A").with_asset("BTC", 0.5))
            .with_category(AllocationCategory::new("B").with_asset("BTC", 0.5))
            .verify();
        assert_eq!(result, Err(AllocationError::DuplicateSymbol("BTC".to_string())));
    }

    #[test]
    fn test_invalid_weight_and_symbol() {
        let negative = Allocation::new()
            .with_category(
                AllocationCategory::new("A")
                    .with_asset("BTC", 1.5)
                    .with_asset("ETH", -0.5),
            )
            .verify();
        assert!(matches!(negative, Err(AllocationError::InvalidWeight { .. })));

        let bad_symbol = Allocation::new()
            .with_category(AllocationCategory::new("A").with_asset("BTC/USD", 1.0))
            .verify();
        assert!(matches!(bad_symbol, Err(AllocationError::InvalidSymbol(_))));
    }

    #[test]
    fn test_empty_allocation() {
        assert_eq!(Allocation::new().verify(), Err(AllocationError::Empty));
        let unnamed = Allocation::new()
            .with_category(AllocationCategory::new("  ").with_asset("BTC", 1.0))
            .verify();
        assert_eq!(unnamed, Err(AllocationError::EmptyCategoryName));
    }
}
