//! Parameter range declarations and their eager expansion.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::value::ParamValue;

/// Errors raised while validating or expanding parameter ranges.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParameterError {
    /// A `choice` range declared no candidate values.
    #[error("parameter '{name}': choice list is empty")]
    EmptyChoice {
        /// Offending parameter name.
        name: String,
    },

    /// A `range` bound was not a finite number.
    #[error("parameter '{name}': range bounds must be finite numbers")]
    NonNumericBound {
        /// Offending parameter name.
        name: String,
    },

    /// A `range` step was zero or negative.
    #[error("parameter '{name}': range step must be positive")]
    NonPositiveStep {
        /// Offending parameter name.
        name: String,
    },

    /// A `range` declared `stop` below `start`.
    #[error("parameter '{name}': range stop must not be below start")]
    InvertedRange {
        /// Offending parameter name.
        name: String,
    },

    /// Grid expansion would exceed the configured safety ceiling.
    #[error("parameter grid expands to {total} combinations, exceeding the limit of {limit}")]
    TooManyCombinations {
        /// Number of combinations the grid would produce.
        total: usize,
        /// Configured ceiling.
        limit: usize,
    },
}

/// Declaration of one tunable dimension.
///
/// Wire format is tagged by `type`; unknown tags are rejected at
/// deserialization:
///
/// ```json
/// {"type": "choice", "values": [10, 20, 50]}
/// {"type": "range", "start": 0, "stop": 4, "step": 2}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ParameterRange {
    /// Explicit list of candidate values.
    Choice {
        /// Candidate values, tried in the given order.
        values: Vec<ParamValue>,
    },
    /// Numeric progression from `start` to `stop` (inclusive when the step
    /// lands on it) in increments of `step`.
    Range {
        /// First value.
        start: ParamValue,
        /// Upper bound.
        stop: ParamValue,
        /// Increment, must be positive.
        step: ParamValue,
    },
}

impl ParameterRange {
    /// Expand this range into its discrete values.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError`] for empty choice lists, non-numeric or
    /// non-finite range bounds, non-positive steps, and inverted ranges.
    pub fn expand(&self, name: &str) -> Result<Vec<ParamValue>, ParameterError> {
        match self {
            Self::Choice { values } => {
                if values.is_empty() {
                    return Err(ParameterError::EmptyChoice {
                        name: name.to_string(),
                    });
                }
                Ok(values.clone())
            }
            Self::Range { start, stop, step } => expand_numeric(name, start, stop, step),
        }
    }
}

/// Ordered collection of named parameter ranges.
///
/// Serializes as a JSON object. Deserialization visits entries in document
/// order, so declaration order survives the wire without an order-preserving
/// map type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterRanges(Vec<(String, ParameterRange)>);

impl ParameterRanges {
    /// Wrap an ordered list of named ranges.
    #[must_use]
    pub const fn new(ranges: Vec<(String, ParameterRange)>) -> Self {
        Self(ranges)
    }

    /// Ranges in declaration order.
    #[must_use]
    pub fn as_slice(&self) -> &[(String, ParameterRange)] {
        &self.0
    }

    /// Number of declared dimensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no dimensions are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(String, ParameterRange)>> for ParameterRanges {
    fn from(ranges: Vec<(String, ParameterRange)>) -> Self {
        Self(ranges)
    }
}

impl Serialize for ParameterRanges {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, range) in &self.0 {
            map.serialize_entry(name, range)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParameterRanges {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RangesVisitor;

        impl<'de> Visitor<'de> for RangesVisitor {
            type Value = ParameterRanges;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of parameter name to range declaration")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut ranges = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, range)) = access.next_entry::<String, ParameterRange>()? {
                    ranges.push((name, range));
                }
                Ok(ParameterRanges(ranges))
            }
        }

        deserializer.deserialize_map(RangesVisitor)
    }
}

/// Expand a numeric range, preserving integer typing when every bound is an
/// integer.
fn expand_numeric(
    name: &str,
    start: &ParamValue,
    stop: &ParamValue,
    step: &ParamValue,
) -> Result<Vec<ParamValue>, ParameterError> {
    let (Some(start_f), Some(stop_f), Some(step_f)) =
        (start.as_float(), stop.as_float(), step.as_float())
    else {
        return Err(ParameterError::NonNumericBound {
            name: name.to_string(),
        });
    };

    if !start_f.is_finite() || !stop_f.is_finite() || !step_f.is_finite() {
        return Err(ParameterError::NonNumericBound {
            name: name.to_string(),
        });
    }
    if step_f <= 0.0 {
        return Err(ParameterError::NonPositiveStep {
            name: name.to_string(),
        });
    }
    if stop_f < start_f {
        return Err(ParameterError::InvertedRange {
            name: name.to_string(),
        });
    }

    // Integer bounds expand with exact integer arithmetic.
    if let (ParamValue::Int(s), ParamValue::Int(e), ParamValue::Int(st)) = (start, stop, step) {
        let values: Vec<ParamValue> = (*s..=*e)
            .step_by(st.unsigned_abs() as usize)
            .map(ParamValue::Int)
            .collect();
        return Ok(values);
    }

    // Float path: index-based progression, with an epsilon so a stop bound the
    // step lands on exactly is still included despite representation drift.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = ((stop_f - start_f) / step_f + 1e-9).floor() as usize + 1;
    let values = (0..count)
        .map(|i| ParamValue::Float(step_f.mul_add(i as f64, start_f)))
        .collect();
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_expansion_preserves_order() {
        let range = ParameterRange::Choice {
            values: vec![
                ParamValue::Int(20),
                ParamValue::Int(10),
                ParamValue::Int(50),
            ],
        };

        let values = range.expand("period").unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Int(20),
                ParamValue::Int(10),
                ParamValue::Int(50)
            ]
        );
    }

    #[test]
    fn test_empty_choice_rejected() {
        let range = ParameterRange::Choice { values: vec![] };

        let Err(e) = range.expand("period") else {
            panic!("empty choice should be rejected");
        };
        assert_eq!(
            e,
            ParameterError::EmptyChoice {
                name: "period".to_string()
            }
        );
    }

    #[test]
    fn test_integer_range_inclusive_of_stop() {
        let range = ParameterRange::Range {
            start: ParamValue::Int(0),
            stop: ParamValue::Int(4),
            step: ParamValue::Int(2),
        };

        let values = range.expand("b").unwrap();
        assert_eq!(
            values,
            vec![ParamValue::Int(0), ParamValue::Int(2), ParamValue::Int(4)]
        );
    }

    #[test]
    fn test_float_range_expansion() {
        let range = ParameterRange::Range {
            start: ParamValue::Float(0.1),
            stop: ParamValue::Float(0.5),
            step: ParamValue::Float(0.1),
        };

        let values = range.expand("stop_pct").unwrap();
        assert_eq!(values.len(), 5);
        assert_eq!(values[0], ParamValue::Float(0.1));
        let Some(last) = values.last().and_then(ParamValue::as_float) else {
            panic!("range should not be empty");
        };
        assert!((last - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_non_numeric_bounds_rejected() {
        let range = ParameterRange::Range {
            start: ParamValue::String("low".to_string()),
            stop: ParamValue::Int(4),
            step: ParamValue::Int(2),
        };

        let Err(e) = range.expand("b") else {
            panic!("string bound should be rejected");
        };
        assert!(matches!(e, ParameterError::NonNumericBound { .. }));
    }

    #[test]
    fn test_nan_bound_rejected() {
        let range = ParameterRange::Range {
            start: ParamValue::Float(f64::NAN),
            stop: ParamValue::Float(1.0),
            step: ParamValue::Float(0.5),
        };

        assert!(matches!(
            range.expand("x"),
            Err(ParameterError::NonNumericBound { .. })
        ));
    }

    #[test]
    fn test_non_positive_step_rejected() {
        let range = ParameterRange::Range {
            start: ParamValue::Int(0),
            stop: ParamValue::Int(4),
            step: ParamValue::Int(0),
        };

        assert!(matches!(
            range.expand("b"),
            Err(ParameterError::NonPositiveStep { .. })
        ));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let range = ParameterRange::Range {
            start: ParamValue::Int(5),
            stop: ParamValue::Int(1),
            step: ParamValue::Int(1),
        };

        assert!(matches!(
            range.expand("b"),
            Err(ParameterError::InvertedRange { .. })
        ));
    }

    #[test]
    fn test_unknown_type_tag_rejected() {
        let result: Result<ParameterRange, _> =
            serde_json::from_str(r#"{"type": "linspace", "start": 0, "stop": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_parameter_ranges_preserve_document_order() {
        let json = r#"{
            "slow": {"type": "choice", "values": [50, 100]},
            "fast": {"type": "choice", "values": [5, 10]},
            "alpha": {"type": "range", "start": 0, "stop": 1, "step": 1}
        }"#;

        let ranges: ParameterRanges = serde_json::from_str(json).unwrap();
        let names: Vec<&str> = ranges.as_slice().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast", "alpha"]);
    }

    #[test]
    fn test_parameter_ranges_serialize_as_object() {
        let ranges = ParameterRanges::new(vec![(
            "x".to_string(),
            ParameterRange::Choice {
                values: vec![ParamValue::Int(1)],
            },
        )]);

        let json = serde_json::to_value(&ranges).unwrap();
        assert_eq!(json["x"]["type"], "choice");
    }

    #[test]
    fn test_wire_format_round_trip() {
        let parsed: ParameterRange =
            serde_json::from_str(r#"{"type": "range", "start": 0, "stop": 4, "step": 2}"#)
                .unwrap();
        assert_eq!(
            parsed,
            ParameterRange::Range {
                start: ParamValue::Int(0),
                stop: ParamValue::Int(4),
                step: ParamValue::Int(2),
            }
        );

        let parsed: ParameterRange =
            serde_json::from_str(r#"{"type": "choice", "values": [1, 2, 3]}"#).unwrap();
        assert!(matches!(parsed, ParameterRange::Choice { .. }));
    }
}
