//! Object and Property Model
//!
//! Objects are maps of named, typed property values. Each concrete object
//! type has a flattened, immutable [`ObjectSchema`] - the full property
//! table composed at registration time from the type's descriptor layers,
//! most-derived layer winning on identifier collision. A [`GenericObject`]
//! owns the values and enforces the access rules its schema declares.
//!
//! # Overview
//!
//! - [`Property`]: descriptor with identifier, datatype, optional default,
//!   optionality and mutability.
//! - [`ObjectSchema`] / [`SchemaBuilder`]: one composed property table per
//!   concrete object type, stored beside the type, never re-derived.
//! - [`SchemaRegistry`]: schemas keyed by object type and vendor id, with
//!   fallback to the vendor-neutral definition.
//! - [`GenericObject`]: property values with read/write enforcement and
//!   array-indexed access; builds `PropertyList` from what was supplied or
//!   defaulted at construction.
//!
//! # Example
//!
//! ```rust
//! use bacstack::object::{schemas, PropertyIdentifier};
//! use bacstack::primitive::Value;
//!
//! let registry = schemas::standard_registry();
//! let schema = registry
//!     .get(bacstack::primitive::ObjectType::AnalogInput, 0)
//!     .unwrap();
//!
//! let object = bacstack::object::GenericObject::new(
//!     schema,
//!     vec![
//!         (PropertyIdentifier::ObjectIdentifier,
//!          Value::ObjectIdentifier(bacstack::primitive::ObjectIdentifier::new(
//!              bacstack::primitive::ObjectType::AnalogInput, 1))),
//!         (PropertyIdentifier::ObjectName,
//!          Value::CharacterString("Room Temperature".into())),
//!         (PropertyIdentifier::PresentValue, Value::Real(23.5)),
//!     ],
//! ).unwrap();
//!
//! let value = object.read_property(PropertyIdentifier::PresentValue, None).unwrap();
//! assert_eq!(value, Some(Value::Real(23.5)));
//! ```

#[cfg(feature = "std")]
use std::error::Error;

#[cfg(feature = "std")]
use std::fmt;

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, format, string::String, sync::Arc, vec, vec::Vec};

#[cfg(feature = "std")]
use std::sync::Arc;

#[cfg(not(feature = "std"))]
use alloc::collections::BTreeMap as HashMap;

#[cfg(feature = "std")]
use std::collections::HashMap;

use bitflags::bitflags;
use log::debug;

use crate::encoding::ApplicationTag;
use crate::extensible_enum;
use crate::primitive::{BitString, Enumeration, ObjectType, Value};

/// Result type for object operations
#[cfg(feature = "std")]
pub type Result<T> = std::result::Result<T, ObjectError>;

#[cfg(not(feature = "std"))]
pub type Result<T> = core::result::Result<T, ObjectError>;

/// Errors that can occur with object operations
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectError {
    /// The property name is not in the object's schema
    UnknownProperty(PropertyIdentifier),
    /// A required property was written without a value
    ValueRequired(PropertyIdentifier),
    /// Write to a non-mutable property
    WriteAccessDenied(PropertyIdentifier),
    /// Array-indexed access to a non-array property
    PropertyIsNotAnArray(PropertyIdentifier),
    /// Element write into an array that has no value yet
    UninitializedArray(PropertyIdentifier),
    /// Array index outside 0..=length
    InvalidArrayIndex(u32),
    /// The value cannot be coerced to the property's datatype
    InvalidValue(String),
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectError::UnknownProperty(id) => write!(f, "Unknown property {}", id),
            ObjectError::ValueRequired(id) => write!(f, "{} value required", id),
            ObjectError::WriteAccessDenied(id) => write!(f, "Write access denied for {}", id),
            ObjectError::PropertyIsNotAnArray(id) => write!(f, "{} is not an array", id),
            ObjectError::UninitializedArray(id) => write!(f, "{} uninitialized array", id),
            ObjectError::InvalidArrayIndex(index) => write!(f, "Invalid array index {}", index),
            ObjectError::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl Error for ObjectError {}

extensible_enum! {
    /// Standard property identifiers. Values 512..=4194303 are
    /// vendor-proprietary.
    PropertyIdentifier {
        ApduTimeout = 11,
        ApplicationSoftwareVersion = 12,
        CovIncrement = 22,
        DaylightSavingsStatus = 24,
        Description = 28,
        DeviceAddressBinding = 30,
        EventState = 36,
        FirmwareRevision = 44,
        LocalDate = 56,
        LocalTime = 57,
        MaxApduLengthAccepted = 62,
        MaxPresValue = 65,
        MinPresValue = 69,
        ModelName = 70,
        NumberOfApduRetries = 73,
        ObjectIdentifier = 75,
        ObjectList = 76,
        ObjectName = 77,
        ObjectType = 79,
        OutOfService = 81,
        PresentValue = 85,
        PriorityArray = 87,
        ProtocolVersion = 98,
        Reliability = 103,
        RelinquishDefault = 104,
        Resolution = 106,
        SegmentationSupported = 107,
        StatusFlags = 111,
        SystemStatus = 112,
        Units = 117,
        UtcOffset = 119,
        VendorIdentifier = 120,
        VendorName = 121,
        ProtocolRevision = 139,
        DatabaseRevision = 155,
        ProfileName = 168,
        PropertyList = 371,
    },
    512..=4194303
}

bitflags! {
    /// The four standard status flags, in bit-string order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct StatusFlags: u8 {
        const IN_ALARM = 1 << 0;
        const FAULT = 1 << 1;
        const OVERRIDDEN = 1 << 2;
        const OUT_OF_SERVICE = 1 << 3;
    }
}

impl StatusFlags {
    /// The four-bit wire form, in-alarm first.
    pub fn to_bit_string(self) -> BitString {
        BitString(vec![
            self.contains(StatusFlags::IN_ALARM),
            self.contains(StatusFlags::FAULT),
            self.contains(StatusFlags::OVERRIDDEN),
            self.contains(StatusFlags::OUT_OF_SERVICE),
        ])
    }

    pub fn from_bit_string(bits: &BitString) -> Self {
        let mut flags = StatusFlags::empty();
        for (flag, position) in [
            (StatusFlags::IN_ALARM, 0),
            (StatusFlags::FAULT, 1),
            (StatusFlags::OVERRIDDEN, 2),
            (StatusFlags::OUT_OF_SERVICE, 3),
        ] {
            if bits.0.get(position).copied().unwrap_or(false) {
                flags.insert(flag);
            }
        }
        flags
    }
}

/// The datatype a property holds, driving coercion and array access.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyType {
    /// A single primitive value with the given application tag
    Atomic(ApplicationTag),
    /// A fixed-order array of elements
    Array(Box<PropertyType>),
    /// An unordered list of elements
    List(Box<PropertyType>),
    /// Anything goes
    Any,
}

impl PropertyType {
    pub fn array_of(element: PropertyType) -> Self {
        PropertyType::Array(Box::new(element))
    }

    pub fn list_of(element: PropertyType) -> Self {
        PropertyType::List(Box::new(element))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, PropertyType::Array(_))
    }

    /// Coerce a whole-value write to this datatype. Atomic and `Any`
    /// datatypes accept the value as-is; arrays and lists accept either
    /// collection kind and fail on single values.
    fn coerce(&self, value: Value, identifier: PropertyIdentifier) -> Result<Value> {
        match self {
            PropertyType::Atomic(_) | PropertyType::Any => Ok(value),
            PropertyType::Array(_) => match value {
                Value::Array(items) | Value::List(items) => Ok(Value::Array(items)),
                other => Err(ObjectError::InvalidValue(format!(
                    "{} expects an array, got {}",
                    identifier, other
                ))),
            },
            PropertyType::List(_) => match value {
                Value::Array(items) | Value::List(items) => Ok(Value::List(items)),
                other => Err(ObjectError::InvalidValue(format!(
                    "{} expects a list, got {}",
                    identifier, other
                ))),
            },
        }
    }
}

/// A property descriptor: identifier, datatype, default value, optionality
/// and mutability.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub identifier: PropertyIdentifier,
    pub datatype: PropertyType,
    pub default: Option<Value>,
    pub optional: bool,
    pub mutable: bool,
}

impl Property {
    pub fn new(
        identifier: PropertyIdentifier,
        datatype: PropertyType,
        default: Option<Value>,
        optional: bool,
        mutable: bool,
    ) -> Self {
        Self {
            identifier,
            datatype,
            default,
            optional,
            mutable,
        }
    }

    /// Required to be present and readable.
    pub fn readable(identifier: PropertyIdentifier, datatype: PropertyType) -> Self {
        Self::new(identifier, datatype, None, false, false)
    }

    /// May be present; readable when it is.
    pub fn optional(identifier: PropertyIdentifier, datatype: PropertyType) -> Self {
        Self::new(identifier, datatype, None, true, false)
    }

    /// Required to be present, readable and writable.
    pub fn writable(identifier: PropertyIdentifier, datatype: PropertyType) -> Self {
        Self::new(identifier, datatype, None, false, true)
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Read the stored value, optionally indexing into an array property.
    ///
    /// Array index 0 reads the element count; 1..=N the elements.
    pub fn read(&self, obj: &GenericObject, array_index: Option<u32>) -> Result<Option<Value>> {
        let value = obj.slot(self.identifier)?;

        let Some(index) = array_index else {
            return Ok(value.clone());
        };

        if !self.datatype.is_array() {
            return Err(ObjectError::PropertyIsNotAnArray(self.identifier));
        }

        match value {
            None => Ok(None),
            Some(Value::Array(items)) => {
                if index == 0 {
                    return Ok(Some(Value::Unsigned(items.len() as u32)));
                }
                items
                    .get(index as usize - 1)
                    .cloned()
                    .map(Some)
                    .ok_or(ObjectError::InvalidArrayIndex(index))
            }
            Some(other) => Err(ObjectError::InvalidValue(format!(
                "{} holds a non-array value {}",
                self.identifier, other
            ))),
        }
    }

    /// Write a value, enforcing the access rules unless `direct`.
    ///
    /// Non-direct writes require a value for required properties and refuse
    /// non-mutable ones. An index forwards the element write into the
    /// existing array value.
    pub fn write(
        &self,
        obj: &mut GenericObject,
        value: Option<Value>,
        array_index: Option<u32>,
        direct: bool,
    ) -> Result<()> {
        if !direct {
            if !self.optional && value.is_none() {
                return Err(ObjectError::ValueRequired(self.identifier));
            }
            if !self.mutable {
                return Err(ObjectError::WriteAccessDenied(self.identifier));
            }
        }

        if let Some(index) = array_index {
            if !self.datatype.is_array() {
                return Err(ObjectError::PropertyIsNotAnArray(self.identifier));
            }
            let element = value.ok_or(ObjectError::ValueRequired(self.identifier))?;
            let slot = obj.slot_mut(self.identifier)?;
            let Some(Value::Array(items)) = slot else {
                return Err(ObjectError::UninitializedArray(self.identifier));
            };
            if index == 0 || index as usize > items.len() {
                return Err(ObjectError::InvalidArrayIndex(index));
            }
            items[index as usize - 1] = element;
            return Ok(());
        }

        let value = match value {
            Some(value) => Some(self.datatype.coerce(value, self.identifier)?),
            None => None,
        };
        *obj.slot_mut(self.identifier)? = value;
        Ok(())
    }
}

/// The flattened, immutable property table of a concrete object type.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    object_type: ObjectType,
    properties: Vec<Property>,
}

impl ObjectSchema {
    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, identifier: PropertyIdentifier) -> Option<&Property> {
        self.properties
            .iter()
            .find(|prop| prop.identifier == identifier)
    }

    fn index_of(&self, identifier: PropertyIdentifier) -> Option<usize> {
        self.properties
            .iter()
            .position(|prop| prop.identifier == identifier)
    }
}

/// Composes an [`ObjectSchema`] from descriptor layers, base first. A later
/// layer's descriptor replaces an earlier one with the same identifier, in
/// place, so the most-derived definition wins without reordering the table.
pub struct SchemaBuilder {
    object_type: ObjectType,
    properties: Vec<Property>,
}

impl SchemaBuilder {
    pub fn new(object_type: ObjectType) -> Self {
        Self {
            object_type,
            properties: Vec::new(),
        }
    }

    pub fn layer(mut self, layer: Vec<Property>) -> Self {
        for property in layer {
            match self
                .properties
                .iter_mut()
                .find(|existing| existing.identifier == property.identifier)
            {
                Some(existing) => *existing = property,
                None => self.properties.push(property),
            }
        }
        self
    }

    /// Finish the table. An `ObjectType` property is supplied automatically
    /// when no layer declared one, immutable and defaulted to the type.
    pub fn build(mut self) -> ObjectSchema {
        if !self
            .properties
            .iter()
            .any(|prop| prop.identifier == PropertyIdentifier::ObjectType)
        {
            self.properties.push(
                Property::readable(
                    PropertyIdentifier::ObjectType,
                    PropertyType::Atomic(ApplicationTag::Enumerated),
                )
                .with_default(Value::Enumerated(self.object_type.to_value())),
            );
        }

        ObjectSchema {
            object_type: self.object_type,
            properties: self.properties,
        }
    }
}

/// Schemas keyed by object type and vendor identifier.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<(u32, u16), Arc<ObjectSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema for a vendor (0 is the vendor-neutral standard).
    /// Re-registration replaces the previous schema.
    pub fn register(&mut self, vendor: u16, schema: ObjectSchema) -> Arc<ObjectSchema> {
        let key = (schema.object_type.to_value(), vendor);
        let schema = Arc::new(schema);
        self.schemas.insert(key, schema.clone());
        schema
    }

    /// Look up a schema, falling back to the vendor-neutral definition when
    /// no vendor-specific one is registered.
    pub fn get(&self, object_type: ObjectType, vendor: u16) -> Option<Arc<ObjectSchema>> {
        let type_value = object_type.to_value();
        if let Some(schema) = self.schemas.get(&(type_value, vendor)) {
            return Some(schema.clone());
        }
        if vendor != 0 {
            return self.schemas.get(&(type_value, 0)).cloned();
        }
        None
    }

    /// The datatype of a property for the given object type and vendor.
    pub fn datatype(
        &self,
        object_type: ObjectType,
        property: PropertyIdentifier,
        vendor: u16,
    ) -> Option<PropertyType> {
        self.get(object_type, vendor)?
            .property(property)
            .map(|prop| prop.datatype.clone())
    }
}

/// An object instance: its schema plus one value slot per property.
#[derive(Debug, Clone)]
pub struct GenericObject {
    schema: Arc<ObjectSchema>,
    values: Vec<Option<Value>>,
}

impl GenericObject {
    /// Create an object from named property values.
    ///
    /// Every name must be in the schema. Explicit values are applied
    /// directly (bypassing mutability), remaining properties take their
    /// declared default, and a required property with neither stays absent.
    /// `PropertyList` is built as the properties that were supplied or
    /// defaulted, unless the caller supplied it explicitly.
    pub fn new(
        schema: Arc<ObjectSchema>,
        initial: Vec<(PropertyIdentifier, Value)>,
    ) -> Result<Self> {
        for (identifier, _) in &initial {
            if schema.index_of(*identifier).is_none() {
                return Err(ObjectError::UnknownProperty(*identifier));
            }
        }

        let mut object = GenericObject {
            values: vec![None; schema.properties().len()],
            schema: schema.clone(),
        };

        let building_list = !initial
            .iter()
            .any(|(identifier, _)| *identifier == PropertyIdentifier::PropertyList);
        let mut property_list = Vec::new();

        for property in schema.properties() {
            let supplied = initial
                .iter()
                .find(|(identifier, _)| *identifier == property.identifier)
                .map(|(_, value)| value.clone());

            if let Some(value) = supplied {
                property.write(&mut object, Some(value), None, true)?;
                property_list.push(property.identifier);
            } else if let Some(default) = &property.default {
                // defaults bypass the property interface
                let index = schema.index_of(property.identifier).unwrap_or_default();
                object.values[index] = Some(default.clone());
                property_list.push(property.identifier);
            } else {
                if !property.optional {
                    debug!("{} value required", property.identifier);
                }
                // leave the slot absent
            }
        }

        if building_list {
            if let Some(index) = schema.index_of(PropertyIdentifier::PropertyList) {
                object.values[index] = Some(Value::Array(
                    property_list
                        .iter()
                        .map(|identifier| Value::Enumerated(identifier.to_value()))
                        .collect(),
                ));
            }
        }

        Ok(object)
    }

    pub fn schema(&self) -> &Arc<ObjectSchema> {
        &self.schema
    }

    /// The identifiers in the stored `PropertyList` value.
    pub fn property_list(&self) -> Vec<PropertyIdentifier> {
        let Ok(Some(Value::Array(items))) =
            self.read_property(PropertyIdentifier::PropertyList, None)
        else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|value| match value {
                Value::Enumerated(raw) => Some(PropertyIdentifier::from_value(*raw)),
                _ => None,
            })
            .collect()
    }

    /// Read a property through its descriptor.
    pub fn read_property(
        &self,
        identifier: PropertyIdentifier,
        array_index: Option<u32>,
    ) -> Result<Option<Value>> {
        let schema = self.schema.clone();
        let property = schema
            .property(identifier)
            .ok_or(ObjectError::UnknownProperty(identifier))?;
        property.read(self, array_index)
    }

    /// Write a property through its descriptor, enforcing access rules.
    pub fn write_property(
        &mut self,
        identifier: PropertyIdentifier,
        value: Option<Value>,
        array_index: Option<u32>,
    ) -> Result<()> {
        let schema = self.schema.clone();
        let property = schema
            .property(identifier)
            .ok_or(ObjectError::UnknownProperty(identifier))?;
        property.write(self, value, array_index, false)
    }

    /// Write a property bypassing the access rules - the local side of the
    /// object, as opposed to a write arriving over the wire.
    pub fn set_property(
        &mut self,
        identifier: PropertyIdentifier,
        value: Option<Value>,
    ) -> Result<()> {
        let schema = self.schema.clone();
        let property = schema
            .property(identifier)
            .ok_or(ObjectError::UnknownProperty(identifier))?;
        property.write(self, value, None, true)
    }

    /// The datatype of one of this object's properties.
    pub fn datatype(&self, identifier: PropertyIdentifier) -> Result<PropertyType> {
        self.schema
            .property(identifier)
            .map(|prop| prop.datatype.clone())
            .ok_or(ObjectError::UnknownProperty(identifier))
    }

    fn slot(&self, identifier: PropertyIdentifier) -> Result<&Option<Value>> {
        let index = self
            .schema
            .index_of(identifier)
            .ok_or(ObjectError::UnknownProperty(identifier))?;
        Ok(&self.values[index])
    }

    fn slot_mut(&mut self, identifier: PropertyIdentifier) -> Result<&mut Option<Value>> {
        let index = self
            .schema
            .index_of(identifier)
            .ok_or(ObjectError::UnknownProperty(identifier))?;
        Ok(&mut self.values[index])
    }
}

pub mod schemas;
