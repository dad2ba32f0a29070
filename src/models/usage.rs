//! Token 用量统计

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// 一次或多次 LLM 调用的 token 用量
///
/// 按字段逐点相加合并；整个批次内只增不减。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn new(total_tokens: u64, prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            total_tokens,
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for TokenUsage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            total_tokens: self.total_tokens + rhs.total_tokens,
            prompt_tokens: self.prompt_tokens + rhs.prompt_tokens,
            completion_tokens: self.completion_tokens + rhs.completion_tokens,
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl Display for TokenUsage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total tokens: {}, prompt tokens: {}, completion tokens: {}",
            self.total_tokens, self.prompt_tokens, self.completion_tokens
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_is_pointwise_and_order_independent() {
        let deltas = vec![
            TokenUsage::new(120, 100, 20),
            TokenUsage::new(3000, 2900, 100),
            TokenUsage::new(45, 40, 5),
        ];

        let forward: TokenUsage = deltas.iter().copied().sum();
        let backward: TokenUsage = deltas.iter().rev().copied().sum();

        assert_eq!(forward, TokenUsage::new(3165, 3040, 125));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_add_assign_never_decreases() {
        let mut total = TokenUsage::default();
        assert!(total.is_zero());

        total += TokenUsage::new(10, 7, 3);
        let before = total;
        total += TokenUsage::default();

        assert_eq!(total, before);
        assert_eq!(total.to_string(), "total tokens: 10, prompt tokens: 7, completion tokens: 3");
    }
}
