//! Parsing and application of OPC UA numeric ranges ("2", "1:4", "1:4,0:2").

use crate::{status_code::StatusCode, variant::Variant};

/// A parsed index range applied to array values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NumericRange {
    /// No range, the whole value.
    #[default]
    None,
    /// A single element.
    Index(u32),
    /// An inclusive range `min:max` with `min < max`.
    Range(u32, u32),
    /// One range per dimension.
    MultipleRanges(Vec<NumericRange>),
}

impl NumericRange {
    /// Parse the string form. An empty string is the no-range value.
    pub fn parse(s: &str) -> Result<NumericRange, StatusCode> {
        if s.is_empty() {
            return Ok(NumericRange::None);
        }
        let dims: Vec<&str> = s.split(',').collect();
        if dims.len() > 1 {
            let ranges = dims
                .into_iter()
                .map(Self::parse_dimension)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(NumericRange::MultipleRanges(ranges))
        } else {
            Self::parse_dimension(s)
        }
    }

    fn parse_dimension(s: &str) -> Result<NumericRange, StatusCode> {
        match s.split_once(':') {
            None => {
                let idx = s
                    .parse::<u32>()
                    .map_err(|_| StatusCode::BadIndexRangeInvalid)?;
                Ok(NumericRange::Index(idx))
            }
            Some((min, max)) => {
                let min = min
                    .parse::<u32>()
                    .map_err(|_| StatusCode::BadIndexRangeInvalid)?;
                let max = max
                    .parse::<u32>()
                    .map_err(|_| StatusCode::BadIndexRangeInvalid)?;
                // A degenerate or inverted range is invalid per the standard
                if min >= max {
                    return Err(StatusCode::BadIndexRangeInvalid);
                }
                Ok(NumericRange::Range(min, max))
            }
        }
    }

    /// Whether this is the no-range value.
    pub fn is_none(&self) -> bool {
        matches!(self, NumericRange::None)
    }

    /// Apply the range to a value. Scalars only accept the no-range value;
    /// arrays are sliced, out-of-bounds is `BadIndexRangeNoData`.
    pub fn apply(&self, value: &Variant) -> Result<Variant, StatusCode> {
        match self {
            NumericRange::None => Ok(value.clone()),
            NumericRange::Index(idx) => match value.as_array() {
                Some(values) => values
                    .get(*idx as usize)
                    .cloned()
                    .ok_or(StatusCode::BadIndexRangeNoData),
                None => Err(StatusCode::BadIndexRangeNoData),
            },
            NumericRange::Range(min, max) => match value {
                Variant::Array(a) => {
                    let min = *min as usize;
                    let max = *max as usize;
                    if min >= a.values.len() {
                        return Err(StatusCode::BadIndexRangeNoData);
                    }
                    let max = max.min(a.values.len() - 1);
                    Ok(Variant::from_array(
                        a.value_type,
                        a.values[min..=max].to_vec(),
                    ))
                }
                _ => Err(StatusCode::BadIndexRangeNoData),
            },
            // Only single-dimension arrays are stored, so a multi range
            // beyond the first dimension never yields data.
            NumericRange::MultipleRanges(ranges) => match ranges.first() {
                Some(first) if ranges.len() == 1 => first.apply(value),
                _ => Err(StatusCode::BadIndexRangeNoData),
            },
        }
    }
}
