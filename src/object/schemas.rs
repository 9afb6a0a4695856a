//! Standard object schemas.
//!
//! The composed property tables for the object types the surrounding
//! applications work with: the device object and the analog input/value
//! points a polling application reads. Other standard types register their
//! own schemas the same way.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use crate::encoding::ApplicationTag;
use crate::object::{Property, PropertyIdentifier, PropertyType, SchemaBuilder, SchemaRegistry};
use crate::primitive::{ObjectType, Value};

/// Properties common to every object type.
pub fn common_properties() -> Vec<Property> {
    vec![
        Property::readable(
            PropertyIdentifier::ObjectIdentifier,
            PropertyType::Atomic(ApplicationTag::ObjectIdentifier),
        ),
        Property::readable(
            PropertyIdentifier::ObjectName,
            PropertyType::Atomic(ApplicationTag::CharacterString),
        ),
        Property::readable(
            PropertyIdentifier::Description,
            PropertyType::Atomic(ApplicationTag::CharacterString),
        )
        .with_default(Value::CharacterString("".into())),
        Property::optional(
            PropertyIdentifier::ProfileName,
            PropertyType::Atomic(ApplicationTag::CharacterString),
        ),
        Property::readable(
            PropertyIdentifier::PropertyList,
            PropertyType::array_of(PropertyType::Atomic(ApplicationTag::Enumerated)),
        ),
    ]
}

/// The device object schema.
pub fn device_schema() -> SchemaBuilder {
    SchemaBuilder::new(ObjectType::Device)
        .layer(common_properties())
        .layer(vec![
            Property::readable(
                PropertyIdentifier::SystemStatus,
                PropertyType::Atomic(ApplicationTag::Enumerated),
            )
            .with_default(Value::Enumerated(0)),
            Property::readable(
                PropertyIdentifier::VendorName,
                PropertyType::Atomic(ApplicationTag::CharacterString),
            ),
            Property::readable(
                PropertyIdentifier::VendorIdentifier,
                PropertyType::Atomic(ApplicationTag::Unsigned),
            ),
            Property::readable(
                PropertyIdentifier::ModelName,
                PropertyType::Atomic(ApplicationTag::CharacterString),
            ),
            Property::readable(
                PropertyIdentifier::FirmwareRevision,
                PropertyType::Atomic(ApplicationTag::CharacterString),
            ),
            Property::readable(
                PropertyIdentifier::ApplicationSoftwareVersion,
                PropertyType::Atomic(ApplicationTag::CharacterString),
            ),
            Property::readable(
                PropertyIdentifier::ProtocolVersion,
                PropertyType::Atomic(ApplicationTag::Unsigned),
            )
            .with_default(Value::Unsigned(crate::BACNET_PROTOCOL_VERSION as u32)),
            Property::readable(
                PropertyIdentifier::ProtocolRevision,
                PropertyType::Atomic(ApplicationTag::Unsigned),
            ),
            Property::readable(
                PropertyIdentifier::ObjectList,
                PropertyType::array_of(PropertyType::Atomic(ApplicationTag::ObjectIdentifier)),
            ),
            Property::readable(
                PropertyIdentifier::MaxApduLengthAccepted,
                PropertyType::Atomic(ApplicationTag::Unsigned),
            )
            .with_default(Value::Unsigned(crate::BACNET_MAX_APDU as u32)),
            Property::readable(
                PropertyIdentifier::SegmentationSupported,
                PropertyType::Atomic(ApplicationTag::Enumerated),
            ),
            Property::optional(
                PropertyIdentifier::LocalDate,
                PropertyType::Atomic(ApplicationTag::Date),
            ),
            Property::optional(
                PropertyIdentifier::LocalTime,
                PropertyType::Atomic(ApplicationTag::Time),
            ),
            Property::optional(
                PropertyIdentifier::UtcOffset,
                PropertyType::Atomic(ApplicationTag::Integer),
            ),
            Property::optional(
                PropertyIdentifier::ApduTimeout,
                PropertyType::Atomic(ApplicationTag::Unsigned),
            ),
            Property::optional(
                PropertyIdentifier::NumberOfApduRetries,
                PropertyType::Atomic(ApplicationTag::Unsigned),
            ),
            Property::readable(
                PropertyIdentifier::DatabaseRevision,
                PropertyType::Atomic(ApplicationTag::Unsigned),
            )
            .with_default(Value::Unsigned(1)),
            Property::optional(
                PropertyIdentifier::DeviceAddressBinding,
                PropertyType::list_of(PropertyType::Any),
            ),
        ])
}

/// Properties shared by the analog point types.
fn analog_point_properties() -> Vec<Property> {
    vec![
        Property::readable(
            PropertyIdentifier::StatusFlags,
            PropertyType::Atomic(ApplicationTag::BitString),
        ),
        Property::readable(
            PropertyIdentifier::EventState,
            PropertyType::Atomic(ApplicationTag::Enumerated),
        )
        .with_default(Value::Enumerated(0)),
        Property::readable(
            PropertyIdentifier::OutOfService,
            PropertyType::Atomic(ApplicationTag::Boolean),
        )
        .with_default(Value::Boolean(false)),
        Property::readable(
            PropertyIdentifier::Units,
            PropertyType::Atomic(ApplicationTag::Enumerated),
        ),
        Property::optional(
            PropertyIdentifier::Reliability,
            PropertyType::Atomic(ApplicationTag::Enumerated),
        ),
        Property::optional(
            PropertyIdentifier::CovIncrement,
            PropertyType::Atomic(ApplicationTag::Real),
        ),
        Property::optional(
            PropertyIdentifier::MinPresValue,
            PropertyType::Atomic(ApplicationTag::Real),
        ),
        Property::optional(
            PropertyIdentifier::MaxPresValue,
            PropertyType::Atomic(ApplicationTag::Real),
        ),
        Property::optional(
            PropertyIdentifier::Resolution,
            PropertyType::Atomic(ApplicationTag::Real),
        ),
    ]
}

/// The analog input schema: a sensor value, read-only over the wire.
pub fn analog_input_schema() -> SchemaBuilder {
    SchemaBuilder::new(ObjectType::AnalogInput)
        .layer(common_properties())
        .layer(analog_point_properties())
        .layer(vec![Property::readable(
            PropertyIdentifier::PresentValue,
            PropertyType::Atomic(ApplicationTag::Real),
        )])
}

/// The analog value schema: a setpoint, writable over the wire.
pub fn analog_value_schema() -> SchemaBuilder {
    SchemaBuilder::new(ObjectType::AnalogValue)
        .layer(common_properties())
        .layer(analog_point_properties())
        .layer(vec![
            Property::writable(
                PropertyIdentifier::PresentValue,
                PropertyType::Atomic(ApplicationTag::Real),
            ),
            Property::optional(
                PropertyIdentifier::PriorityArray,
                PropertyType::array_of(PropertyType::Atomic(ApplicationTag::Real)),
            ),
            Property::optional(
                PropertyIdentifier::RelinquishDefault,
                PropertyType::Atomic(ApplicationTag::Real),
            ),
        ])
}

/// A registry populated with the standard schemas.
pub fn standard_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new();
    registry.register(0, device_schema().build());
    registry.register(0, analog_input_schema().build());
    registry.register(0, analog_value_schema().build());
    registry
}
