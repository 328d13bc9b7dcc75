//! Proportional allocation of total supply.
//!
//! Each bucket receives `floor(total_supply × fraction)` whole tokens. With
//! fractions summing to exactly 1 the amounts sum to `total_supply` minus at
//! most `n - 1` tokens; the remainder policy decides where those go.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use crate::config::{DeploymentConfig, Recipient, RemainderPolicy};
use crate::error::{ConfigError, DeployError, Result};

/// Canonical execution order for well-known bucket names.
///
/// Buckets with other names run after these, in configuration order.
pub const BUCKET_ORDER: &[&str] = &["liquidity", "community", "team", "marketing", "reserve"];

/// One computed allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    /// Bucket name.
    pub name: String,
    /// Configured fraction of total supply.
    pub fraction: Decimal,
    /// Whole tokens allocated.
    pub amount: u64,
    /// Recipient of the tokens.
    pub recipient: Recipient,
    /// Human-readable purpose.
    pub purpose: String,
}

/// Result of splitting the supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationTable {
    /// Allocations in execution order.
    pub allocations: Vec<Allocation>,
    /// Tokens not assigned to any bucket by flooring.
    pub rounding_remainder: u64,
    /// Whether the rounding remainder was assigned to a bucket.
    pub remainder_assigned: bool,
}

/// Returns the sort rank of a bucket name.
fn bucket_rank(name: &str) -> usize {
    BUCKET_ORDER
        .iter()
        .position(|b| *b == name)
        .unwrap_or(BUCKET_ORDER.len())
}

/// Computes `floor(total × fraction)`.
///
/// # Errors
///
/// Returns an error if the fraction is negative or the product overflows.
pub fn floor_share(total: u64, fraction: Decimal) -> Result<u64> {
    Decimal::from(total)
        .checked_mul(fraction)
        .map(|v| v.floor())
        .and_then(|v| v.to_u64())
        .ok_or_else(|| {
            DeployError::Config(ConfigError::validation(
                format!("fraction {fraction} of {total} is not a representable amount"),
                "allocations",
            ))
        })
}

/// Splits the configured total supply across the allocation table.
///
/// Pure function of the configuration: the same configuration always yields
/// the same table.
///
/// # Errors
///
/// Returns an error if an allocation amount cannot be represented.
pub fn compute_allocations(config: &DeploymentConfig) -> Result<AllocationTable> {
    let total = config.token.total_supply;

    let mut ordered: Vec<_> = config.allocations.iter().collect();
    // Stable: unknown names keep configuration order.
    ordered.sort_by_key(|a| bucket_rank(&a.name));

    let mut allocations = Vec::with_capacity(ordered.len());
    let mut exact_total = Decimal::ZERO;
    for allocation in ordered {
        exact_total += allocation.fraction;
        allocations.push(Allocation {
            name: allocation.name.clone(),
            fraction: allocation.fraction,
            amount: floor_share(total, allocation.fraction)?,
            recipient: allocation.recipient.clone(),
            purpose: allocation.purpose.clone(),
        });
    }

    let allocated: u64 = allocations.iter().map(|a| a.amount).sum();
    let intended = floor_share(total, exact_total.min(Decimal::ONE))?;
    let rounding_remainder = intended.saturating_sub(allocated);

    let target = match config.execution.remainder {
        RemainderPolicy::Forfeit => None,
        RemainderPolicy::First => allocations.first_mut(),
        RemainderPolicy::Last => allocations.last_mut(),
    };

    let remainder_assigned = match target {
        Some(allocation) if rounding_remainder > 0 => {
            allocation.amount += rounding_remainder;
            true
        }
        _ => false,
    };

    Ok(AllocationTable {
        allocations,
        rounding_remainder,
        remainder_assigned,
    })
}

impl AllocationTable {
    /// Sum of all allocated amounts.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.allocations.iter().map(|a| a.amount).sum()
    }

    /// Finds an allocation by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Allocation> {
        self.allocations.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn config(total: u64, allocations: &[(&str, &str)], remainder: &str) -> DeploymentConfig {
        let mut yaml = format!(
            "token: {{ name: T, symbol: T, total_supply: {total} }}\n\
             networks:\n  devnet: {{ endpoint: 'sim://devnet' }}\n\
             execution: {{ remainder: {remainder} }}\n\
             allocations:\n"
        );
        for (name, fraction) in allocations {
            yaml.push_str(&format!(
                "  - {{ name: {name}, fraction: {fraction}, recipient: {{ credential: {name} }} }}\n"
            ));
        }
        ConfigParser::new().parse_str(&yaml, None).unwrap()
    }

    fn standard(total: u64, remainder: &str) -> DeploymentConfig {
        config(
            total,
            &[
                ("liquidity", "0.4"),
                ("community", "0.3"),
                ("team", "0.15"),
                ("marketing", "0.1"),
                ("reserve", "0.05"),
            ],
            remainder,
        )
    }

    #[test]
    fn test_standard_split() {
        let table = compute_allocations(&standard(100_000_000, "forfeit")).unwrap();
        let amounts: Vec<u64> = table.allocations.iter().map(|a| a.amount).collect();
        assert_eq!(amounts, vec![40_000_000, 30_000_000, 15_000_000, 10_000_000, 5_000_000]);
        assert_eq!(table.total(), 100_000_000);
        assert_eq!(table.rounding_remainder, 0);
    }

    #[test]
    fn test_canonical_order_applied() {
        let cfg = config(
            1000,
            &[("reserve", "0.1"), ("advisors", "0.1"), ("team", "0.2"), ("liquidity", "0.6")],
            "forfeit",
        );
        let table = compute_allocations(&cfg).unwrap();
        let names: Vec<&str> = table.allocations.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["liquidity", "team", "reserve", "advisors"]);
    }

    #[test]
    fn test_flooring_bound() {
        let cfg = config(100, &[("a", "0.333"), ("b", "0.333"), ("c", "0.334")], "forfeit");
        let table = compute_allocations(&cfg).unwrap();
        assert_eq!(table.total(), 33 + 33 + 33);
        assert_eq!(table.rounding_remainder, 1);
        assert!(table.rounding_remainder <= 2);
        assert!(!table.remainder_assigned);
    }

    #[test]
    fn test_remainder_to_last() {
        let cfg = config(100, &[("a", "0.333"), ("b", "0.333"), ("c", "0.334")], "last");
        let table = compute_allocations(&cfg).unwrap();
        assert_eq!(table.total(), 100);
        assert_eq!(table.get("c").unwrap().amount, 34);
        assert!(table.remainder_assigned);
    }

    #[test]
    fn test_remainder_to_first() {
        let cfg = config(10, &[("liquidity", "0.55"), ("team", "0.45")], "first");
        let table = compute_allocations(&cfg).unwrap();
        assert_eq!(table.get("liquidity").unwrap().amount, 6);
        assert_eq!(table.get("team").unwrap().amount, 4);
    }

    #[test]
    fn test_partial_fractions_do_not_assign_unallocated_supply() {
        let cfg = config(1000, &[("liquidity", "0.5")], "last");
        let table = compute_allocations(&cfg).unwrap();
        assert_eq!(table.total(), 500);
        assert_eq!(table.rounding_remainder, 0);
    }

    #[test]
    fn test_deterministic() {
        let cfg = standard(123_456_789, "forfeit");
        assert_eq!(compute_allocations(&cfg).unwrap(), compute_allocations(&cfg).unwrap());
    }
}
