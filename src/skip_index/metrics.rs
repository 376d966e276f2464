//! Per-chunk min/max summaries

use std::cmp::Ordering;

use crate::plan::OpType;
use crate::storage::{ScalarField, ScalarValue, ValueRef};

/// Min/max of one field within one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChunkMetrics {
    pub min: ScalarValue,
    pub max: ScalarValue,
}

impl FieldChunkMetrics {
    /// Summarizes a comparable scalar payload.
    ///
    /// Returns `None` for empty chunks, for JSON and ARRAY payloads, and for
    /// float chunks containing NaN (NaN rows satisfy `!=` against every
    /// literal, which a min/max pair cannot express).
    pub fn from_scalars(data: &ScalarField) -> Option<Self> {
        match data {
            ScalarField::Bool(v) => min_max_by(v.iter().copied(), |a, b| a.cmp(b))
                .map(|(min, max)| Self::new(ScalarValue::Bool(min), ScalarValue::Bool(max))),
            ScalarField::Int(v) => min_max_by(v.iter().map(|x| *x as i64), |a, b| a.cmp(b))
                .map(|(min, max)| Self::new(ScalarValue::Int(min), ScalarValue::Int(max))),
            ScalarField::Long(v) => min_max_by(v.iter().copied(), |a, b| a.cmp(b))
                .map(|(min, max)| Self::new(ScalarValue::Int(min), ScalarValue::Int(max))),
            ScalarField::Float(v) => Self::from_floats(v.iter().map(|x| *x as f64)),
            ScalarField::Double(v) => Self::from_floats(v.iter().copied()),
            ScalarField::String(v) => min_max_by(v.iter(), |a, b| a.cmp(b)).map(|(min, max)| {
                Self::new(
                    ScalarValue::String(min.clone()),
                    ScalarValue::String(max.clone()),
                )
            }),
            ScalarField::Json(_) | ScalarField::Array { .. } => None,
        }
    }

    fn from_floats(values: impl Iterator<Item = f64> + Clone) -> Option<Self> {
        if values.clone().any(f64::is_nan) {
            return None;
        }
        min_max_by(values, |a, b| a.total_cmp(b))
            .map(|(min, max)| Self::new(ScalarValue::Float(min), ScalarValue::Float(max)))
    }

    fn new(min: ScalarValue, max: ScalarValue) -> Self {
        Self { min, max }
    }

    fn cmp_min(&self, value: ValueRef<'_>) -> Option<Ordering> {
        self.min.as_value_ref().compare(&value)
    }

    fn cmp_max(&self, value: ValueRef<'_>) -> Option<Ordering> {
        self.max.as_value_ref().compare(&value)
    }

    /// True iff no row in `[min, max]` can satisfy `row OP value`
    pub fn excludes_unary(&self, op: OpType, value: ValueRef<'_>) -> bool {
        if let OpType::PrefixMatch = op {
            return self.excludes_prefix(value);
        }
        let (Some(min), Some(max)) = (self.cmp_min(value), self.cmp_max(value)) else {
            return false;
        };
        match op {
            OpType::Equal => min == Ordering::Greater || max == Ordering::Less,
            OpType::NotEqual => min == Ordering::Equal && max == Ordering::Equal,
            OpType::GreaterThan => max != Ordering::Greater,
            OpType::GreaterEqual => max == Ordering::Less,
            OpType::LessThan => min != Ordering::Less,
            OpType::LessEqual => min == Ordering::Greater,
            OpType::PrefixMatch => false,
        }
    }

    /// Strings sharing a prefix form one contiguous range starting at the
    /// prefix itself
    fn excludes_prefix(&self, value: ValueRef<'_>) -> bool {
        match (&self.min, &self.max, value) {
            (ScalarValue::String(min), ScalarValue::String(max), ValueRef::Str(prefix)) => {
                max.as_str() < prefix || (min.as_str() > prefix && !min.starts_with(prefix))
            }
            _ => false,
        }
    }

    /// True iff `[min, max]` and the query range do not overlap
    pub fn excludes_range(
        &self,
        lower: ValueRef<'_>,
        upper: ValueRef<'_>,
        lower_inclusive: bool,
        upper_inclusive: bool,
    ) -> bool {
        let (Some(max_vs_lower), Some(min_vs_upper)) = (self.cmp_max(lower), self.cmp_min(upper))
        else {
            return false;
        };
        let below = match max_vs_lower {
            Ordering::Less => true,
            Ordering::Equal => !lower_inclusive,
            Ordering::Greater => false,
        };
        let above = match min_vs_upper {
            Ordering::Greater => true,
            Ordering::Equal => !upper_inclusive,
            Ordering::Less => false,
        };
        below || above
    }
}

fn min_max_by<T, I, F>(mut values: I, cmp: F) -> Option<(T, T)>
where
    T: Clone,
    I: Iterator<Item = T>,
    F: Fn(&T, &T) -> Ordering,
{
    let first = values.next()?;
    Some(values.fold((first.clone(), first), |(min, max), v| {
        let min = if cmp(&v, &min) == Ordering::Less { v.clone() } else { min };
        let max = if cmp(&v, &max) == Ordering::Greater { v } else { max };
        (min, max)
    }))
}
