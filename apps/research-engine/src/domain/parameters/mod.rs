//! Tunable parameters for optimization sweeps.
//!
//! A sweep is declared as an ordered list of named [`ParameterRange`]s. Each
//! range expands eagerly into discrete [`ParamValue`]s, and the
//! [`ParameterGrid`] takes the Cartesian product across dimensions in
//! declaration order. Declaration order is load-bearing: best-result
//! tie-breaking is defined over grid iteration order.

mod grid;
mod range;
mod value;

pub use grid::{ParameterGrid, ParameterSet};
pub use range::{ParameterError, ParameterRange, ParameterRanges};
pub use value::ParamValue;
