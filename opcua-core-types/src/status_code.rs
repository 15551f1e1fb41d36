use std::fmt;

use bitflags::bitflags;

macro_rules! status_codes {
    ($($name:ident = $value:literal),+ $(,)?) => {
        impl StatusCode {
            $(
                #[allow(missing_docs)]
                pub const $name: StatusCode = StatusCode($value);
            )+

            /// The symbolic name of the code, or `None` for a code outside
            /// the set surfaced by this runtime.
            pub fn name(&self) -> Option<&'static str> {
                match self.0 & !Self::INFO_MASK {
                    $($value => Some(stringify!($name)),)+
                    _ => None,
                }
            }
        }
    };
}

/// An OPC UA status code. The upper two bits hold the severity, the lower
/// ten bits carry structure/limit info set by the subscription engine on
/// queue overflow.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(u32);

bitflags! {
    /// The info bits of a status code with `InfoType = DataValue`.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct SubStatusBits: u32 {
        /// The code carries DataValue info bits.
        const INFO_TYPE_DATA_VALUE = 0x0000_0400;
        /// A value was lost from the monitored item queue.
        const OVERFLOW = 0x0000_0080;
    }
}

status_codes! {
    Good = 0x0000_0000,
    GoodSubscriptionTransferred = 0x002D_0000,
    Uncertain = 0x4000_0000,
    BadUnexpectedError = 0x8001_0000,
    BadInternalError = 0x8002_0000,
    BadOutOfMemory = 0x8003_0000,
    BadTimeout = 0x800A_0000,
    BadNothingToDo = 0x800F_0000,
    BadTooManyOperations = 0x8010_0000,
    BadNodeIdInvalid = 0x8033_0000,
    BadNodeIdUnknown = 0x8034_0000,
    BadAttributeIdInvalid = 0x8035_0000,
    BadIndexRangeInvalid = 0x8036_0000,
    BadIndexRangeNoData = 0x8037_0000,
    BadNotReadable = 0x803A_0000,
    BadNotWritable = 0x803B_0000,
    BadNotSupported = 0x803D_0000,
    BadNotFound = 0x803E_0000,
    BadNoDataAvailable = 0x804F_0000,
    BadIdentityTokenInvalid = 0x8020_0000,
    BadSessionIdInvalid = 0x8025_0000,
    BadSessionClosed = 0x8026_0000,
    BadRequestTimeout = 0x802A_0000,
    BadSubscriptionIdInvalid = 0x8028_0000,
    BadSequenceNumberInvalid = 0x802F_0000,
    BadNodeIdExists = 0x805E_0000,
    BadNodeClassInvalid = 0x805F_0000,
    BadBrowseNameInvalid = 0x8060_0000,
    BadBrowseNameDuplicated = 0x8061_0000,
    BadReferenceNotAllowed = 0x8062_0000,
    BadReferenceTypeIdInvalid = 0x804C_0000,
    BadBrowseDirectionInvalid = 0x804D_0000,
    BadNodeNotInView = 0x804E_0000,
    BadSourceNodeIdInvalid = 0x8064_0000,
    BadTargetNodeIdInvalid = 0x8065_0000,
    BadTypeDefinitionInvalid = 0x8063_0000,
    BadTypeMismatch = 0x8074_0000,
    BadMethodInvalid = 0x8075_0000,
    BadArgumentsMissing = 0x8076_0000,
    BadNotExecutable = 0x8111_0000,
    BadTooManySubscriptions = 0x8077_0000,
    BadTooManyPublishRequests = 0x8078_0000,
    BadNoSubscription = 0x8079_0000,
    BadSequenceNumberUnknown = 0x807A_0000,
    BadMessageNotAvailable = 0x807B_0000,
    BadMonitoredItemIdInvalid = 0x8042_0000,
    BadMonitoredItemFilterInvalid = 0x8043_0000,
    BadMonitoredItemFilterUnsupported = 0x8044_0000,
    BadFilterNotAllowed = 0x8045_0000,
    BadFilterOperatorInvalid = 0x80C1_0000,
    BadFilterOperatorUnsupported = 0x80C2_0000,
    BadFilterOperandCountMismatch = 0x80C3_0000,
    BadFilterOperandInvalid = 0x8049_0000,
    BadFilterElementInvalid = 0x80C4_0000,
    BadFilterLiteralInvalid = 0x80C5_0000,
    BadEventFilterInvalid = 0x8047_0000,
    BadContentFilterInvalid = 0x8048_0000,
    BadNoMatch = 0x806F_0000,
    BadInvalidArgument = 0x80AB_0000,
    BadUserAccessDenied = 0x801F_0000,
    BadNoCommunication = 0x8031_0000,
    BadWaitingForInitialData = 0x8032_0000,
    BadDataEncodingInvalid = 0x8038_0000,
    BadDataEncodingUnsupported = 0x8039_0000,
    BadOutOfRange = 0x803C_0000,
    BadSecureChannelIdInvalid = 0x8022_0000,
    BadServiceUnsupported = 0x800B_0000,
    BadShutdown = 0x800C_0000,
}

impl StatusCode {
    const SEVERITY_MASK: u32 = 0xC000_0000;
    const INFO_MASK: u32 = 0x0000_0FFF;

    /// Build a status code from its numeric representation.
    pub fn from_raw(value: u32) -> Self {
        StatusCode(value)
    }

    /// The numeric representation.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Severity is good.
    pub fn is_good(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == 0
    }

    /// Severity is bad.
    pub fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Severity is uncertain.
    pub fn is_uncertain(&self) -> bool {
        self.0 & Self::SEVERITY_MASK == 0x4000_0000
    }

    /// The code with all info bits cleared.
    pub fn base(&self) -> StatusCode {
        StatusCode(self.0 & !Self::INFO_MASK)
    }

    /// Set the DataValue info type together with the given info bits.
    pub fn with_info_bits(&self, bits: SubStatusBits) -> StatusCode {
        StatusCode(self.0 | bits.bits())
    }

    /// Clear the DataValue info type and info bits.
    pub fn without_info_bits(&self) -> StatusCode {
        StatusCode(self.0 & !SubStatusBits::all().bits())
    }

    /// Check whether the given info bits are set.
    pub fn contains_info_bits(&self, bits: SubStatusBits) -> bool {
        self.0 & bits.bits() == bits.bits()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "StatusCode({:#010X})", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity() {
        assert!(StatusCode::Good.is_good());
        assert!(!StatusCode::Good.is_bad());
        assert!(StatusCode::BadInternalError.is_bad());
        assert!(StatusCode::Uncertain.is_uncertain());
        assert!(StatusCode::GoodSubscriptionTransferred.is_good());
    }

    #[test]
    fn info_bits_roundtrip() {
        let code = StatusCode::Good
            .with_info_bits(SubStatusBits::INFO_TYPE_DATA_VALUE | SubStatusBits::OVERFLOW);
        assert!(code.contains_info_bits(SubStatusBits::OVERFLOW));
        assert!(code.is_good());
        assert_eq!(code.without_info_bits(), StatusCode::Good);
        assert_eq!(code.base(), StatusCode::Good);
    }

    #[test]
    fn names() {
        assert_eq!(StatusCode::BadNoMatch.name(), Some("BadNoMatch"));
        let flagged = StatusCode::BadNoMatch.with_info_bits(SubStatusBits::OVERFLOW);
        assert_eq!(flagged.name(), Some("BadNoMatch"));
        assert_eq!(StatusCode::from_raw(0xDEAD_BEEF).name(), None);
    }
}
