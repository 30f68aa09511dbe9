//! Positional train/validation split.

use crate::application::ports::Dataset;

/// A dataset divided into a leading training slice and an optional trailing
/// validation slice.
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    /// Leading slice the sweep evaluates against.
    pub train: Dataset,
    /// Trailing hold-out slice, absent when the split is disabled or empty.
    pub validation: Option<Dataset>,
}

/// Split a dataset by position into train and validation slices.
///
/// The training slice takes the leading `1 - validation_fraction` of rows
/// (index truncated toward zero) and the validation slice the remainder.
/// Fractions outside `(0, 1)` disable the split; time-ordered rows are never
/// shuffled.
#[must_use]
pub fn split_dataset(dataset: &Dataset, validation_fraction: f64) -> DatasetSplit {
    if !validation_fraction.is_finite() || validation_fraction <= 0.0 || validation_fraction >= 1.0
    {
        return DatasetSplit {
            train: dataset.clone(),
            validation: None,
        };
    }

    let len = dataset.len();
    let split_index = (len as f64 * (1.0 - validation_fraction)) as usize;
    let validation = dataset.slice(split_index, len);

    DatasetSplit {
        train: dataset.slice(0, split_index),
        validation: if validation.is_empty() {
            None
        } else {
            Some(validation)
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    fn dataset(rows: usize) -> Dataset {
        Dataset::new("spy-1h", (0..rows).map(|i| json!({"close": i})).collect())
    }

    #[test]
    fn split_takes_trailing_rows_for_validation() {
        let split = split_dataset(&dataset(10), 0.3);

        assert_eq!(split.train.len(), 7);
        let validation = split.validation.unwrap();
        assert_eq!(validation.len(), 3);
        assert_eq!(validation.rows()[0]["close"], json!(7));
    }

    #[test_case(0.0 ; "zero fraction")]
    #[test_case(-0.5 ; "negative fraction")]
    #[test_case(1.0 ; "full fraction")]
    #[test_case(1.5 ; "over one")]
    #[test_case(f64::NAN ; "nan")]
    fn out_of_range_fraction_disables_split(fraction: f64) {
        let split = split_dataset(&dataset(10), fraction);
        assert_eq!(split.train.len(), 10);
        assert!(split.validation.is_none());
    }

    #[test]
    fn split_index_truncates_toward_zero() {
        // 7 * 0.75 = 5.25 -> train gets 5 rows, validation 2.
        let split = split_dataset(&dataset(7), 0.25);
        assert_eq!(split.train.len(), 5);
        assert_eq!(split.validation.unwrap().len(), 2);
    }

    #[test]
    fn empty_validation_slice_collapses_to_none() {
        // 1 * (1 - 0.3) = 0.7 -> split index 0, validation takes the row.
        let split = split_dataset(&dataset(1), 0.3);
        assert_eq!(split.train.len(), 0);
        assert_eq!(split.validation.unwrap().len(), 1);

        let empty = split_dataset(&dataset(0), 0.3);
        assert_eq!(empty.train.len(), 0);
        assert!(empty.validation.is_none());
    }
}
