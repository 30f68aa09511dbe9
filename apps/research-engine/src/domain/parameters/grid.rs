//! Parameter grid expansion for optimization sweeps.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::range::{ParameterError, ParameterRange};
use super::value::ParamValue;

/// One concrete assignment of values across all tunable parameters.
pub type ParameterSet = HashMap<String, ParamValue>;

/// A fully-expanded parameter grid.
///
/// Values are keyed by parameter name; `order` preserves declaration order so
/// that [`ParameterGrid::combinations`] is deterministic. Earlier-declared
/// dimensions vary slowest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterGrid {
    values: HashMap<String, Vec<ParamValue>>,
    order: Vec<String>,
}

impl ParameterGrid {
    /// Expand an ordered list of named ranges into a grid.
    ///
    /// # Errors
    ///
    /// Propagates [`ParameterError`] from any range that fails validation.
    pub fn from_ranges(ranges: &[(String, ParameterRange)]) -> Result<Self, ParameterError> {
        let mut values = HashMap::with_capacity(ranges.len());
        let mut order = Vec::with_capacity(ranges.len());

        for (name, range) in ranges {
            let expanded = range.expand(name)?;
            order.push(name.clone());
            values.insert(name.clone(), expanded);
        }

        Ok(Self { values, order })
    }

    /// Parameter names in declaration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Get the total number of parameter combinations.
    ///
    /// An empty grid has zero combinations.
    #[must_use]
    pub fn total_combinations(&self) -> usize {
        if self.order.is_empty() {
            return 0;
        }
        self.values.values().map(Vec::len).product()
    }

    /// Fail if the grid would expand past `limit` combinations.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::TooManyCombinations`] when over the limit.
    pub fn ensure_within(&self, limit: usize) -> Result<(), ParameterError> {
        let total = self.total_combinations();
        if total > limit {
            return Err(ParameterError::TooManyCombinations { total, limit });
        }
        Ok(())
    }

    /// Generate all parameter combinations in declaration order.
    ///
    /// An empty grid yields an empty list, not a single empty combination.
    #[must_use]
    pub fn combinations(&self) -> Vec<ParameterSet> {
        if self.order.is_empty() {
            return Vec::new();
        }

        let mut result = vec![ParameterSet::new()];

        for param_name in &self.order {
            let Some(values) = self.values.get(param_name) else {
                continue;
            };

            let mut new_result = Vec::with_capacity(result.len() * values.len());
            for combo in &result {
                for value in values {
                    let mut new_combo = combo.clone();
                    new_combo.insert(param_name.clone(), value.clone());
                    new_result.push(new_combo);
                }
            }
            result = new_result;
        }

        result
    }

    /// Check if grid is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty() || self.total_combinations() == 0
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn choice(values: &[i64]) -> ParameterRange {
        ParameterRange::Choice {
            values: values.iter().copied().map(ParamValue::Int).collect(),
        }
    }

    #[test]
    fn test_choice_and_range_expand_to_product() {
        let ranges = vec![
            ("a".to_string(), choice(&[1, 2])),
            (
                "b".to_string(),
                ParameterRange::Range {
                    start: ParamValue::Int(0),
                    stop: ParamValue::Int(4),
                    step: ParamValue::Int(2),
                },
            ),
        ];

        let grid = ParameterGrid::from_ranges(&ranges).unwrap();
        assert_eq!(grid.total_combinations(), 6);

        let combos = grid.combinations();
        assert_eq!(combos.len(), 6);

        // Each {a, b} pair appears exactly once.
        for a in [1i64, 2] {
            for b in [0i64, 2, 4] {
                let matches = combos
                    .iter()
                    .filter(|c| {
                        c.get("a") == Some(&ParamValue::Int(a))
                            && c.get("b") == Some(&ParamValue::Int(b))
                    })
                    .count();
                assert_eq!(matches, 1, "pair a={a} b={b} should appear once");
            }
        }
    }

    #[test]
    fn test_empty_grid_yields_no_combinations() {
        let grid = ParameterGrid::from_ranges(&[]).unwrap();
        assert!(grid.is_empty());
        assert_eq!(grid.total_combinations(), 0);
        assert!(grid.combinations().is_empty());
    }

    #[test]
    fn test_declaration_order_varies_first_dimension_slowest() {
        let ranges = vec![
            ("a".to_string(), choice(&[1, 2])),
            ("b".to_string(), choice(&[10, 20])),
        ];

        let grid = ParameterGrid::from_ranges(&ranges).unwrap();
        assert_eq!(grid.names(), &["a".to_string(), "b".to_string()]);

        let combos = grid.combinations();
        assert_eq!(combos[0].get("a"), Some(&ParamValue::Int(1)));
        assert_eq!(combos[0].get("b"), Some(&ParamValue::Int(10)));
        assert_eq!(combos[1].get("a"), Some(&ParamValue::Int(1)));
        assert_eq!(combos[1].get("b"), Some(&ParamValue::Int(20)));
        assert_eq!(combos[3].get("a"), Some(&ParamValue::Int(2)));
        assert_eq!(combos[3].get("b"), Some(&ParamValue::Int(20)));
    }

    #[test]
    fn test_ceiling_enforced() {
        let ranges = vec![
            ("a".to_string(), choice(&[1, 2, 3, 4])),
            ("b".to_string(), choice(&[1, 2, 3, 4])),
        ];

        let grid = ParameterGrid::from_ranges(&ranges).unwrap();
        assert!(grid.ensure_within(16).is_ok());

        let Err(e) = grid.ensure_within(15) else {
            panic!("16 combinations should exceed a limit of 15");
        };
        assert_eq!(
            e,
            ParameterError::TooManyCombinations {
                total: 16,
                limit: 15
            }
        );
    }

    #[test]
    fn test_invalid_range_propagates() {
        let ranges = vec![("a".to_string(), ParameterRange::Choice { values: vec![] })];
        assert!(ParameterGrid::from_ranges(&ranges).is_err());
    }

    proptest! {
        #[test]
        fn prop_combination_count_is_product(sizes in prop::collection::vec(1usize..5, 1..4)) {
            let ranges: Vec<(String, ParameterRange)> = sizes
                .iter()
                .enumerate()
                .map(|(i, &n)| {
                    let values: Vec<i64> = (0..n as i64).collect();
                    (format!("p{i}"), choice(&values))
                })
                .collect();

            let grid = ParameterGrid::from_ranges(&ranges).unwrap();
            let expected: usize = sizes.iter().product();
            prop_assert_eq!(grid.total_combinations(), expected);
            prop_assert_eq!(grid.combinations().len(), expected);
        }
    }
}
