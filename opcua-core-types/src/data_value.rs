use crate::{date_time::DateTime, status_code::StatusCode, variant::Variant};

/// A value with its quality and timestamps, the unit read from and written
/// to variable nodes and delivered in data change notifications.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataValue {
    /// The value. `None` when the read failed or the attribute is empty.
    pub value: Option<Variant>,
    /// The status. `None` means implicit `Good`.
    pub status: Option<StatusCode>,
    /// When the source produced the value.
    pub source_timestamp: Option<DateTime>,
    /// Picoseconds fraction of the source timestamp.
    pub source_picoseconds: Option<i16>,
    /// When the server observed the value.
    pub server_timestamp: Option<DateTime>,
    /// Picoseconds fraction of the server timestamp.
    pub server_picoseconds: Option<i16>,
}

impl DataValue {
    /// A value with both timestamps set to now.
    pub fn new_now(value: impl Into<Variant>) -> DataValue {
        let now = DateTime::now();
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(now),
            server_timestamp: Some(now),
            ..Default::default()
        }
    }

    /// A value with both timestamps set to the given time.
    pub fn new_at(value: impl Into<Variant>, time: DateTime) -> DataValue {
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(time),
            server_timestamp: Some(time),
            ..Default::default()
        }
    }

    /// A value-less data value carrying only a status.
    pub fn from_status(status: StatusCode) -> DataValue {
        DataValue {
            status: Some(status),
            ..Default::default()
        }
    }

    /// An entirely empty data value.
    pub fn null() -> DataValue {
        DataValue::default()
    }

    /// The effective status, `Good` when unset.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    /// Whether a value is present.
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_good_status() {
        let v = DataValue {
            value: Some(Variant::from(1i32)),
            ..Default::default()
        };
        assert_eq!(v.status(), StatusCode::Good);
        assert!(v.has_value());
        assert!(!DataValue::from_status(StatusCode::BadNodeIdUnknown).has_value());
    }
}
