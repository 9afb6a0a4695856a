//! Property Access Services
//!
//! The request/response payloads a polling application exchanges with a
//! remote device: ReadProperty and WriteProperty requests, the ReadProperty
//! acknowledgement, and the [`Confirmation`] taxonomy that distinguishes a
//! successful value from a protocol-level error, reject or abort.
//!
//! # Overview
//!
//! Service parameters are context-tagged in the order the standard assigns:
//! object identifier (0), property identifier (1), optional array index (2),
//! then for writes the value bracketed by opening/closing tag 3 and an
//! optional priority (4). The APDU framing is a type octet, the invoke id
//! correlating request and response, and the service choice.
//!
//! A response APDU decodes into a [`Confirmation`], which callers must match
//! on before treating it as data: a remote error, reject or abort is a value
//! here, not a crate error. Local decode failures stay
//! [`EncodingError`](crate::encoding::EncodingError)s.
//!
//! # Example
//!
//! ```rust
//! use bacstack::pdu::PduData;
//! use bacstack::primitive::{ObjectIdentifier, ObjectType};
//! use bacstack::object::PropertyIdentifier;
//! use bacstack::service::{ReadPropertyRequest, encode_confirmed_request,
//!     ConfirmedServiceChoice};
//!
//! let request = ReadPropertyRequest::new(
//!     ObjectIdentifier::new(ObjectType::AnalogInput, 5),
//!     PropertyIdentifier::PresentValue,
//! );
//!
//! let mut pdu = PduData::new();
//! encode_confirmed_request(1, ConfirmedServiceChoice::ReadProperty, &mut pdu);
//! request.encode(&mut pdu).unwrap();
//! ```

#[cfg(feature = "std")]
use std::error::Error;

#[cfg(feature = "std")]
use std::fmt;

#[cfg(not(feature = "std"))]
use core::fmt;

use log::debug;

use crate::encoding::{
    ApplicationTag, EncodingError, Result as EncodingResult, Tag, TagClass, TagList,
};
use crate::extensible_enum;
use crate::object::{GenericObject, ObjectError, PropertyIdentifier};
use crate::pdu::PduData;
use crate::primitive::{Atomic, Enumerated, Enumeration, ObjectIdentifier, Unsigned, Value};

/// Result type for service operations
#[cfg(feature = "std")]
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(not(feature = "std"))]
pub type Result<T> = core::result::Result<T, ServiceError>;

/// Errors that can occur while framing or decoding service payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service choice octet names no service this crate knows
    UnsupportedServiceChoice(u8),
    /// The APDU type octet does not fit the exchange being decoded
    UnexpectedApduType(u8),
    /// Malformed service payload
    Encoding(EncodingError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::UnsupportedServiceChoice(choice) => {
                write!(f, "Unsupported service choice: {}", choice)
            }
            ServiceError::UnexpectedApduType(apdu_type) => {
                write!(f, "Unexpected APDU type: {}", apdu_type)
            }
            ServiceError::Encoding(err) => write!(f, "Encoding error: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl Error for ServiceError {}

impl From<EncodingError> for ServiceError {
    fn from(err: EncodingError) -> Self {
        ServiceError::Encoding(err)
    }
}

/// APDU type octet values, carried in the upper nibble of the first octet.
pub mod apdu_type {
    pub const CONFIRMED_REQUEST: u8 = 0;
    pub const UNCONFIRMED_REQUEST: u8 = 1;
    pub const SIMPLE_ACK: u8 = 2;
    pub const COMPLEX_ACK: u8 = 3;
    pub const SEGMENT_ACK: u8 = 4;
    pub const ERROR: u8 = 5;
    pub const REJECT: u8 = 6;
    pub const ABORT: u8 = 7;
}

/// Confirmed service choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfirmedServiceChoice {
    ReadProperty = 12,
    ReadPropertyMultiple = 14,
    WriteProperty = 15,
    WritePropertyMultiple = 16,
}

impl TryFrom<u8> for ConfirmedServiceChoice {
    type Error = ServiceError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            12 => Ok(Self::ReadProperty),
            14 => Ok(Self::ReadPropertyMultiple),
            15 => Ok(Self::WriteProperty),
            16 => Ok(Self::WritePropertyMultiple),
            _ => Err(ServiceError::UnsupportedServiceChoice(value)),
        }
    }
}

extensible_enum! {
    /// Error classes returned in an error response. Values 64 and above are
    /// vendor-proprietary.
    ErrorClass {
        Device = 0,
        Object = 1,
        Property = 2,
        Resources = 3,
        Security = 4,
        Services = 5,
        Vt = 6,
        Communication = 7,
    },
    64..=65535
}

extensible_enum! {
    /// Error codes returned in an error response. Values 256 and above are
    /// vendor-proprietary.
    ErrorCode {
        Other = 0,
        DeviceBusy = 3,
        InconsistentParameters = 7,
        InvalidDataType = 9,
        MissingRequiredParameter = 16,
        NoSpaceToWriteProperty = 20,
        OperationalProblem = 25,
        ReadAccessDenied = 27,
        ServiceRequestDenied = 29,
        Timeout = 30,
        UnknownObject = 31,
        UnknownProperty = 32,
        UnsupportedObjectType = 36,
        ValueOutOfRange = 37,
        WriteAccessDenied = 40,
        CharacterSetNotSupported = 41,
        InvalidArrayIndex = 42,
        PropertyIsNotAnArray = 50,
    },
    256..=65535
}

extensible_enum! {
    /// Reject reasons. Values 64 and above are vendor-proprietary.
    RejectReason {
        Other = 0,
        BufferOverflow = 1,
        InconsistentParameters = 2,
        InvalidParameterDataType = 3,
        InvalidTag = 4,
        MissingRequiredParameter = 5,
        ParameterOutOfRange = 6,
        TooManyArguments = 7,
        UndefinedEnumeration = 8,
        UnrecognizedService = 9,
    },
    64..=255
}

extensible_enum! {
    /// Abort reasons. Values 64 and above are vendor-proprietary.
    AbortReason {
        Other = 0,
        BufferOverflow = 1,
        InvalidApduInThisState = 2,
        PreemptedByHigherPriorityTask = 3,
        SegmentationNotSupported = 4,
        SecurityError = 5,
        InsufficientSecurity = 6,
        WindowSizeOutOfRange = 7,
        ApplicationExceededReplyTime = 8,
        OutOfResources = 9,
        TsmTimeout = 10,
        ApduTooLong = 11,
    },
    64..=255
}

//
//  context-tagged parameter helpers
//

fn encode_context_object_id(
    object_id: &ObjectIdentifier,
    context: u32,
    pdu: &mut PduData,
) -> EncodingResult<()> {
    object_id.encode().app_to_context(context)?.encode(pdu)
}

fn encode_context_enumerated(value: u32, context: u32, pdu: &mut PduData) -> EncodingResult<()> {
    Enumerated(value).encode().app_to_context(context)?.encode(pdu)
}

fn encode_context_unsigned(value: u32, context: u32, pdu: &mut PduData) -> EncodingResult<()> {
    Unsigned(value).encode().app_to_context(context)?.encode(pdu)
}

fn decode_context(pdu: &mut PduData, context: u32, what: &'static str) -> EncodingResult<Tag> {
    let tag = Tag::decode(pdu)?;
    if !tag.is_context(context) {
        return Err(EncodingError::TagMismatch(what));
    }
    Ok(tag)
}

/// Drain tags up to the closing tag matching an already-consumed opening
/// tag with the given context number.
fn decode_bracketed(pdu: &mut PduData, context: u32) -> EncodingResult<TagList> {
    let mut group = TagList::new();
    let mut level: i32 = 0;

    loop {
        let tag = Tag::decode(pdu)?;
        match tag.class {
            TagClass::Opening => level += 1,
            TagClass::Closing => {
                if level == 0 {
                    if tag.number != context {
                        return Err(EncodingError::UnbalancedTags);
                    }
                    return Ok(group);
                }
                level -= 1;
            }
            _ => {}
        }
        group.push(tag);
    }
}

//
//  ReadProperty
//

/// A ReadProperty request: which property of which object, optionally one
/// array element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPropertyRequest {
    pub object_id: ObjectIdentifier,
    pub property: PropertyIdentifier,
    pub array_index: Option<u32>,
}

impl ReadPropertyRequest {
    pub fn new(object_id: ObjectIdentifier, property: PropertyIdentifier) -> Self {
        Self {
            object_id,
            property,
            array_index: None,
        }
    }

    pub fn with_array_index(mut self, array_index: u32) -> Self {
        self.array_index = Some(array_index);
        self
    }

    pub fn encode(&self, pdu: &mut PduData) -> EncodingResult<()> {
        encode_context_object_id(&self.object_id, 0, pdu)?;
        encode_context_enumerated(self.property.to_value(), 1, pdu)?;
        if let Some(index) = self.array_index {
            encode_context_unsigned(index, 2, pdu)?;
        }
        Ok(())
    }

    pub fn decode(pdu: &mut PduData) -> EncodingResult<Self> {
        let tag = decode_context(pdu, 0, "object identifier context")?;
        let object_id =
            ObjectIdentifier::decode(&tag.context_to_app(ApplicationTag::ObjectIdentifier)?)?;

        let tag = decode_context(pdu, 1, "property identifier context")?;
        let property = PropertyIdentifier::from_value(
            Enumerated::decode(&tag.context_to_app(ApplicationTag::Enumerated)?)?.0,
        );

        let array_index = if pdu.remaining() > 0 {
            let tag = decode_context(pdu, 2, "array index context")?;
            Some(Unsigned::decode(&tag.context_to_app(ApplicationTag::Unsigned)?)?.0)
        } else {
            None
        };

        Ok(Self {
            object_id,
            property,
            array_index,
        })
    }
}

/// A ReadProperty acknowledgement: the request parameters echoed back plus
/// the value, bracketed by context tag 3.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPropertyAck {
    pub object_id: ObjectIdentifier,
    pub property: PropertyIdentifier,
    pub array_index: Option<u32>,
    pub value: Value,
}

impl ReadPropertyAck {
    pub fn new(request: &ReadPropertyRequest, value: Value) -> Self {
        Self {
            object_id: request.object_id,
            property: request.property,
            array_index: request.array_index,
            value,
        }
    }

    pub fn encode(&self, pdu: &mut PduData) -> EncodingResult<()> {
        encode_context_object_id(&self.object_id, 0, pdu)?;
        encode_context_enumerated(self.property.to_value(), 1, pdu)?;
        if let Some(index) = self.array_index {
            encode_context_unsigned(index, 2, pdu)?;
        }

        Tag::opening(3).encode(pdu)?;
        let mut tags = TagList::new();
        self.value.encode(&mut tags);
        tags.encode(pdu)?;
        Tag::closing(3).encode(pdu)
    }

    pub fn decode(pdu: &mut PduData) -> EncodingResult<Self> {
        let tag = decode_context(pdu, 0, "object identifier context")?;
        let object_id =
            ObjectIdentifier::decode(&tag.context_to_app(ApplicationTag::ObjectIdentifier)?)?;

        let tag = decode_context(pdu, 1, "property identifier context")?;
        let property = PropertyIdentifier::from_value(
            Enumerated::decode(&tag.context_to_app(ApplicationTag::Enumerated)?)?.0,
        );

        let mut array_index = None;
        let mut tag = Tag::decode(pdu)?;
        if tag.is_context(2) {
            array_index =
                Some(Unsigned::decode(&tag.context_to_app(ApplicationTag::Unsigned)?)?.0);
            tag = Tag::decode(pdu)?;
        }

        if tag.class != TagClass::Opening || tag.number != 3 {
            return Err(EncodingError::TagMismatch("property value opening"));
        }
        let value = Value::decode_list(&decode_bracketed(pdu, 3)?)?;

        Ok(Self {
            object_id,
            property,
            array_index,
            value,
        })
    }

    /// Encode the complete complex-ack APDU carrying this acknowledgement.
    pub fn encode_apdu(&self, invoke_id: u8, pdu: &mut PduData) -> EncodingResult<()> {
        pdu.put(apdu_type::COMPLEX_ACK << 4);
        pdu.put(invoke_id);
        pdu.put(ConfirmedServiceChoice::ReadProperty as u8);
        self.encode(pdu)
    }
}

//
//  WriteProperty
//

/// A WriteProperty request: the value bracketed by context tag 3, with an
/// optional command priority.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePropertyRequest {
    pub object_id: ObjectIdentifier,
    pub property: PropertyIdentifier,
    pub array_index: Option<u32>,
    pub value: Value,
    pub priority: Option<u8>,
}

impl WritePropertyRequest {
    pub fn new(object_id: ObjectIdentifier, property: PropertyIdentifier, value: Value) -> Self {
        Self {
            object_id,
            property,
            array_index: None,
            value,
            priority: None,
        }
    }

    pub fn with_array_index(mut self, array_index: u32) -> Self {
        self.array_index = Some(array_index);
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn encode(&self, pdu: &mut PduData) -> EncodingResult<()> {
        encode_context_object_id(&self.object_id, 0, pdu)?;
        encode_context_enumerated(self.property.to_value(), 1, pdu)?;
        if let Some(index) = self.array_index {
            encode_context_unsigned(index, 2, pdu)?;
        }

        Tag::opening(3).encode(pdu)?;
        let mut tags = TagList::new();
        self.value.encode(&mut tags);
        tags.encode(pdu)?;
        Tag::closing(3).encode(pdu)?;

        if let Some(priority) = self.priority {
            encode_context_unsigned(priority as u32, 4, pdu)?;
        }
        Ok(())
    }

    pub fn decode(pdu: &mut PduData) -> EncodingResult<Self> {
        let tag = decode_context(pdu, 0, "object identifier context")?;
        let object_id =
            ObjectIdentifier::decode(&tag.context_to_app(ApplicationTag::ObjectIdentifier)?)?;

        let tag = decode_context(pdu, 1, "property identifier context")?;
        let property = PropertyIdentifier::from_value(
            Enumerated::decode(&tag.context_to_app(ApplicationTag::Enumerated)?)?.0,
        );

        let mut array_index = None;
        let mut tag = Tag::decode(pdu)?;
        if tag.is_context(2) {
            array_index =
                Some(Unsigned::decode(&tag.context_to_app(ApplicationTag::Unsigned)?)?.0);
            tag = Tag::decode(pdu)?;
        }

        if tag.class != TagClass::Opening || tag.number != 3 {
            return Err(EncodingError::TagMismatch("property value opening"));
        }
        let value = Value::decode_list(&decode_bracketed(pdu, 3)?)?;

        let priority = if pdu.remaining() > 0 {
            let tag = decode_context(pdu, 4, "priority context")?;
            Some(Unsigned::decode(&tag.context_to_app(ApplicationTag::Unsigned)?)?.0 as u8)
        } else {
            None
        };

        Ok(Self {
            object_id,
            property,
            array_index,
            value,
            priority,
        })
    }
}

//
//  APDU framing
//

/// Write the confirmed-request header; the service payload follows.
pub fn encode_confirmed_request(
    invoke_id: u8,
    choice: ConfirmedServiceChoice,
    pdu: &mut PduData,
) {
    pdu.put(apdu_type::CONFIRMED_REQUEST << 4);
    pdu.put(invoke_id);
    pdu.put(choice as u8);
}

/// Read the confirmed-request header, leaving the service payload in the
/// cursor.
pub fn decode_confirmed_request(pdu: &mut PduData) -> Result<(u8, ConfirmedServiceChoice)> {
    let octet = pdu.get()?;
    if octet >> 4 != apdu_type::CONFIRMED_REQUEST {
        return Err(ServiceError::UnexpectedApduType(octet >> 4));
    }
    let invoke_id = pdu.get()?;
    let choice = ConfirmedServiceChoice::try_from(pdu.get()?)?;
    Ok((invoke_id, choice))
}

/// Encode a simple-ack APDU, the whole response to a successful write.
pub fn encode_simple_ack(invoke_id: u8, choice: ConfirmedServiceChoice, pdu: &mut PduData) {
    pdu.put(apdu_type::SIMPLE_ACK << 4);
    pdu.put(invoke_id);
    pdu.put(choice as u8);
}

/// Encode an error APDU: the failed service choice, then the error class
/// and code as application-tagged enumerated values.
pub fn encode_error(
    invoke_id: u8,
    choice: ConfirmedServiceChoice,
    class: ErrorClass,
    code: ErrorCode,
    pdu: &mut PduData,
) -> EncodingResult<()> {
    pdu.put(apdu_type::ERROR << 4);
    pdu.put(invoke_id);
    pdu.put(choice as u8);
    Enumerated(class.to_value()).encode().encode(pdu)?;
    Enumerated(code.to_value()).encode().encode(pdu)
}

/// Encode a reject APDU.
pub fn encode_reject(invoke_id: u8, reason: RejectReason, pdu: &mut PduData) {
    pdu.put(apdu_type::REJECT << 4);
    pdu.put(invoke_id);
    pdu.put(reason.to_value() as u8);
}

/// Encode an abort APDU.
pub fn encode_abort(invoke_id: u8, reason: AbortReason, pdu: &mut PduData) {
    pdu.put(apdu_type::ABORT << 4);
    pdu.put(invoke_id);
    pdu.put(reason.to_value() as u8);
}

//
//  Confirmation
//

/// The outcome of a confirmed request, as the polling application sees it.
///
/// A remote failure is a value of this type, not a crate error; callers
/// must match on the kind before using the payload. Only a malformed
/// response surfaces as a [`ServiceError`].
#[derive(Debug, Clone, PartialEq)]
pub enum Confirmation {
    /// The request succeeded; a simple ack carries [`Value::Null`]
    Ack(Value),
    /// The remote peer answered with an error class and code
    ServiceError { class: ErrorClass, code: ErrorCode },
    /// The remote peer rejected the request outright
    Reject(RejectReason),
    /// The remote peer abandoned the transaction
    Abort(AbortReason),
}

impl Confirmation {
    /// True for the ack variant.
    pub fn is_ack(&self) -> bool {
        matches!(self, Confirmation::Ack(_))
    }

    /// Decode a response APDU into the invoke id and the outcome.
    pub fn decode(pdu: &mut PduData) -> Result<(u8, Confirmation)> {
        let octet = pdu.get()?;
        let invoke_id = pdu.get()?;

        let confirmation = match octet >> 4 {
            apdu_type::SIMPLE_ACK => {
                let _choice = pdu.get()?;
                Confirmation::Ack(Value::Null)
            }
            apdu_type::COMPLEX_ACK => {
                let choice = ConfirmedServiceChoice::try_from(pdu.get()?)?;
                let value = match choice {
                    ConfirmedServiceChoice::ReadProperty => ReadPropertyAck::decode(pdu)?.value,
                    _ => Value::decode_list(&TagList::decode(pdu)?)?,
                };
                Confirmation::Ack(value)
            }
            apdu_type::ERROR => {
                let _choice = pdu.get()?;
                let class = Enumerated::decode(&Tag::decode(pdu)?)?.0;
                let code = Enumerated::decode(&Tag::decode(pdu)?)?.0;
                Confirmation::ServiceError {
                    class: ErrorClass::from_value(class),
                    code: ErrorCode::from_value(code),
                }
            }
            apdu_type::REJECT => {
                Confirmation::Reject(RejectReason::from_value(pdu.get()? as u32))
            }
            apdu_type::ABORT => {
                Confirmation::Abort(AbortReason::from_value(pdu.get()? as u32))
            }
            other => return Err(ServiceError::UnexpectedApduType(other)),
        };

        debug!("confirmation {} {:?}", invoke_id, confirmation);
        Ok((invoke_id, confirmation))
    }
}

fn object_error_outcome(err: ObjectError) -> Confirmation {
    let code = match err {
        ObjectError::UnknownProperty(_) => ErrorCode::UnknownProperty,
        ObjectError::ValueRequired(_) => ErrorCode::MissingRequiredParameter,
        ObjectError::WriteAccessDenied(_) => ErrorCode::WriteAccessDenied,
        ObjectError::PropertyIsNotAnArray(_) => ErrorCode::PropertyIsNotAnArray,
        ObjectError::UninitializedArray(_) | ObjectError::InvalidArrayIndex(_) => {
            ErrorCode::InvalidArrayIndex
        }
        ObjectError::InvalidValue(_) => ErrorCode::InvalidDataType,
    };
    Confirmation::ServiceError {
        class: ErrorClass::Property,
        code,
    }
}

/// Serve a ReadProperty request against a local object.
///
/// The responder side of the polling contract: the outcome is always a
/// [`Confirmation`], never a crate error. A property with no stored value
/// reads as unknown-property.
pub fn read_property_outcome(
    object: &GenericObject,
    request: &ReadPropertyRequest,
) -> Confirmation {
    match object.read_property(request.property, request.array_index) {
        Ok(Some(value)) => Confirmation::Ack(value),
        Ok(None) => Confirmation::ServiceError {
            class: ErrorClass::Property,
            code: ErrorCode::UnknownProperty,
        },
        Err(err) => object_error_outcome(err),
    }
}

/// Serve a WriteProperty request against a local object, enforcing the
/// property's access rules.
pub fn write_property_outcome(
    object: &mut GenericObject,
    request: &WritePropertyRequest,
) -> Confirmation {
    match object.write_property(
        request.property,
        Some(request.value.clone()),
        request.array_index,
    ) {
        Ok(()) => Confirmation::Ack(Value::Null),
        Err(err) => object_error_outcome(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::schemas::standard_registry;
    use crate::primitive::ObjectType;

    fn analog_input() -> GenericObject {
        let registry = standard_registry();
        let schema = registry.get(ObjectType::AnalogInput, 0).unwrap();
        GenericObject::new(
            schema,
            vec![
                (
                    PropertyIdentifier::ObjectIdentifier,
                    Value::ObjectIdentifier(ObjectIdentifier::new(ObjectType::AnalogInput, 5)),
                ),
                (
                    PropertyIdentifier::ObjectName,
                    Value::CharacterString("AI-5".into()),
                ),
                (PropertyIdentifier::PresentValue, Value::Real(23.5)),
            ],
        )
        .unwrap()
    }

    fn analog_value() -> GenericObject {
        let registry = standard_registry();
        let schema = registry.get(ObjectType::AnalogValue, 0).unwrap();
        GenericObject::new(
            schema,
            vec![
                (
                    PropertyIdentifier::ObjectIdentifier,
                    Value::ObjectIdentifier(ObjectIdentifier::new(ObjectType::AnalogValue, 2)),
                ),
                (
                    PropertyIdentifier::ObjectName,
                    Value::CharacterString("AV-2".into()),
                ),
                (PropertyIdentifier::PresentValue, Value::Real(20.0)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_read_property_request_wire_form() {
        let request = ReadPropertyRequest::new(
            ObjectIdentifier::new(ObjectType::AnalogInput, 5),
            PropertyIdentifier::PresentValue,
        );

        let mut pdu = PduData::new();
        request.encode(&mut pdu).unwrap();
        // context 0 object id (4 octets), context 1 property (1 octet)
        assert_eq!(
            pdu.as_slice(),
            &[0x0C, 0x00, 0x00, 0x00, 0x05, 0x19, 85]
        );

        assert_eq!(ReadPropertyRequest::decode(&mut pdu).unwrap(), request);
    }

    #[test]
    fn test_read_property_request_with_index() {
        let request = ReadPropertyRequest::new(
            ObjectIdentifier::new(ObjectType::Device, 1234),
            PropertyIdentifier::ObjectList,
        )
        .with_array_index(0);

        let mut pdu = PduData::new();
        request.encode(&mut pdu).unwrap();
        assert_eq!(ReadPropertyRequest::decode(&mut pdu).unwrap(), request);
    }

    #[test]
    fn test_read_property_request_rejects_wrong_context() {
        // property identifier tagged 2 instead of 1
        let mut pdu = PduData::new();
        ObjectIdentifier::new(ObjectType::AnalogInput, 1)
            .encode()
            .app_to_context(0)
            .unwrap()
            .encode(&mut pdu)
            .unwrap();
        Enumerated(85).encode().app_to_context(2).unwrap().encode(&mut pdu).unwrap();

        assert!(matches!(
            ReadPropertyRequest::decode(&mut pdu),
            Err(EncodingError::TagMismatch(_))
        ));
    }

    #[test]
    fn test_read_property_ack_roundtrip() {
        let request = ReadPropertyRequest::new(
            ObjectIdentifier::new(ObjectType::AnalogInput, 5),
            PropertyIdentifier::PresentValue,
        );
        let ack = ReadPropertyAck::new(&request, Value::Real(23.5));

        let mut pdu = PduData::new();
        ack.encode(&mut pdu).unwrap();
        assert_eq!(ReadPropertyAck::decode(&mut pdu).unwrap(), ack);
    }

    #[test]
    fn test_read_property_ack_list_value() {
        let request = ReadPropertyRequest::new(
            ObjectIdentifier::new(ObjectType::Device, 1),
            PropertyIdentifier::ObjectList,
        );
        let ack = ReadPropertyAck::new(
            &request,
            Value::List(vec![
                Value::ObjectIdentifier(ObjectIdentifier::new(ObjectType::Device, 1)),
                Value::ObjectIdentifier(ObjectIdentifier::new(ObjectType::AnalogInput, 5)),
            ]),
        );

        let mut pdu = PduData::new();
        ack.encode(&mut pdu).unwrap();
        assert_eq!(ReadPropertyAck::decode(&mut pdu).unwrap(), ack);
    }

    #[test]
    fn test_write_property_request_roundtrip() {
        let request = WritePropertyRequest::new(
            ObjectIdentifier::new(ObjectType::AnalogValue, 2),
            PropertyIdentifier::PresentValue,
            Value::Real(21.0),
        )
        .with_priority(8);

        let mut pdu = PduData::new();
        request.encode(&mut pdu).unwrap();
        assert_eq!(WritePropertyRequest::decode(&mut pdu).unwrap(), request);
    }

    #[test]
    fn test_write_property_request_with_index() {
        let request = WritePropertyRequest::new(
            ObjectIdentifier::new(ObjectType::AnalogValue, 2),
            PropertyIdentifier::PriorityArray,
            Value::Real(3.5),
        )
        .with_array_index(7);

        let mut pdu = PduData::new();
        request.encode(&mut pdu).unwrap();
        assert_eq!(WritePropertyRequest::decode(&mut pdu).unwrap(), request);
    }

    #[test]
    fn test_confirmed_request_header() {
        let mut pdu = PduData::new();
        encode_confirmed_request(42, ConfirmedServiceChoice::ReadProperty, &mut pdu);
        assert_eq!(pdu.as_slice(), &[0x00, 42, 12]);

        assert_eq!(
            decode_confirmed_request(&mut pdu).unwrap(),
            (42, ConfirmedServiceChoice::ReadProperty)
        );
    }

    #[test]
    fn test_unknown_service_choice() {
        let mut pdu = PduData::from_slice(&[0x00, 1, 99]);
        assert_eq!(
            decode_confirmed_request(&mut pdu).unwrap_err(),
            ServiceError::UnsupportedServiceChoice(99)
        );
    }

    #[test]
    fn test_confirmation_complex_ack() {
        let request = ReadPropertyRequest::new(
            ObjectIdentifier::new(ObjectType::AnalogInput, 5),
            PropertyIdentifier::PresentValue,
        );
        let ack = ReadPropertyAck::new(&request, Value::Real(23.5));

        let mut pdu = PduData::new();
        ack.encode_apdu(7, &mut pdu).unwrap();

        let (invoke_id, confirmation) = Confirmation::decode(&mut pdu).unwrap();
        assert_eq!(invoke_id, 7);
        assert_eq!(confirmation, Confirmation::Ack(Value::Real(23.5)));
    }

    #[test]
    fn test_confirmation_simple_ack() {
        let mut pdu = PduData::new();
        encode_simple_ack(9, ConfirmedServiceChoice::WriteProperty, &mut pdu);

        let (invoke_id, confirmation) = Confirmation::decode(&mut pdu).unwrap();
        assert_eq!(invoke_id, 9);
        assert_eq!(confirmation, Confirmation::Ack(Value::Null));
    }

    #[test]
    fn test_confirmation_error() {
        let mut pdu = PduData::new();
        encode_error(
            3,
            ConfirmedServiceChoice::ReadProperty,
            ErrorClass::Property,
            ErrorCode::UnknownProperty,
            &mut pdu,
        )
        .unwrap();

        let (invoke_id, confirmation) = Confirmation::decode(&mut pdu).unwrap();
        assert_eq!(invoke_id, 3);
        assert_eq!(
            confirmation,
            Confirmation::ServiceError {
                class: ErrorClass::Property,
                code: ErrorCode::UnknownProperty,
            }
        );
        assert!(!confirmation.is_ack());
    }

    #[test]
    fn test_confirmation_abort_and_reject() {
        let mut pdu = PduData::new();
        encode_abort(4, AbortReason::SegmentationNotSupported, &mut pdu);
        let (_, confirmation) = Confirmation::decode(&mut pdu).unwrap();
        assert_eq!(
            confirmation,
            Confirmation::Abort(AbortReason::SegmentationNotSupported)
        );

        let mut pdu = PduData::new();
        encode_reject(5, RejectReason::UnrecognizedService, &mut pdu);
        let (_, confirmation) = Confirmation::decode(&mut pdu).unwrap();
        assert_eq!(
            confirmation,
            Confirmation::Reject(RejectReason::UnrecognizedService)
        );
    }

    #[test]
    fn test_confirmation_vendor_abort_reason_survives() {
        let mut pdu = PduData::from_slice(&[0x70, 1, 200]);
        let (_, confirmation) = Confirmation::decode(&mut pdu).unwrap();
        match confirmation {
            Confirmation::Abort(AbortReason::Vendor(value)) => assert_eq!(value.value(), 200),
            other => panic!("expected vendor abort, got {:?}", other),
        }
    }

    #[test]
    fn test_confirmation_truncated_fails_locally() {
        let mut pdu = PduData::from_slice(&[0x50, 3]);
        assert_eq!(
            Confirmation::decode(&mut pdu).unwrap_err(),
            ServiceError::Encoding(EncodingError::UnexpectedEndOfData)
        );
    }

    #[test]
    fn test_read_outcome_ack() {
        let object = analog_input();
        let request = ReadPropertyRequest::new(
            ObjectIdentifier::new(ObjectType::AnalogInput, 5),
            PropertyIdentifier::PresentValue,
        );
        assert_eq!(
            read_property_outcome(&object, &request),
            Confirmation::Ack(Value::Real(23.5))
        );
    }

    #[test]
    fn test_read_outcome_unknown_property() {
        let object = analog_input();
        let request = ReadPropertyRequest::new(
            ObjectIdentifier::new(ObjectType::AnalogInput, 5),
            PropertyIdentifier::ApduTimeout,
        );
        assert_eq!(
            read_property_outcome(&object, &request),
            Confirmation::ServiceError {
                class: ErrorClass::Property,
                code: ErrorCode::UnknownProperty,
            }
        );
    }

    #[test]
    fn test_read_outcome_not_an_array() {
        let object = analog_input();
        let request = ReadPropertyRequest::new(
            ObjectIdentifier::new(ObjectType::AnalogInput, 5),
            PropertyIdentifier::PresentValue,
        )
        .with_array_index(1);
        assert_eq!(
            read_property_outcome(&object, &request),
            Confirmation::ServiceError {
                class: ErrorClass::Property,
                code: ErrorCode::PropertyIsNotAnArray,
            }
        );
    }

    #[test]
    fn test_write_outcome_ack_and_denied() {
        let mut object = analog_value();
        let request = WritePropertyRequest::new(
            ObjectIdentifier::new(ObjectType::AnalogValue, 2),
            PropertyIdentifier::PresentValue,
            Value::Real(22.5),
        );
        assert_eq!(
            write_property_outcome(&mut object, &request),
            Confirmation::Ack(Value::Null)
        );
        assert_eq!(
            object
                .read_property(PropertyIdentifier::PresentValue, None)
                .unwrap(),
            Some(Value::Real(22.5))
        );

        let denied = WritePropertyRequest::new(
            ObjectIdentifier::new(ObjectType::AnalogValue, 2),
            PropertyIdentifier::ObjectName,
            Value::CharacterString("other".into()),
        );
        assert_eq!(
            write_property_outcome(&mut object, &denied),
            Confirmation::ServiceError {
                class: ErrorClass::Property,
                code: ErrorCode::WriteAccessDenied,
            }
        );
    }

    #[test]
    fn test_request_response_exchange() {
        // the full polling exchange: frame a request, serve it, decode the
        // confirmation on the way back
        let object = analog_input();
        let request = ReadPropertyRequest::new(
            ObjectIdentifier::new(ObjectType::AnalogInput, 5),
            PropertyIdentifier::PresentValue,
        );

        let mut wire = PduData::new();
        encode_confirmed_request(11, ConfirmedServiceChoice::ReadProperty, &mut wire);
        request.encode(&mut wire).unwrap();

        // responder
        let (invoke_id, choice) = decode_confirmed_request(&mut wire).unwrap();
        assert_eq!(choice, ConfirmedServiceChoice::ReadProperty);
        let decoded = ReadPropertyRequest::decode(&mut wire).unwrap();
        let mut response = PduData::new();
        match read_property_outcome(&object, &decoded) {
            Confirmation::Ack(value) => ReadPropertyAck::new(&decoded, value)
                .encode_apdu(invoke_id, &mut response)
                .unwrap(),
            other => panic!("expected ack, got {:?}", other),
        }

        // requester
        let (invoke_id, confirmation) = Confirmation::decode(&mut response).unwrap();
        assert_eq!(invoke_id, 11);
        assert_eq!(confirmation, Confirmation::Ack(Value::Real(23.5)));
    }
}
