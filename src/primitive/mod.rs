//! Primitive Application Datatypes
//!
//! Typed wrappers for the thirteen primitive BACnet datatypes. Each type
//! encodes to and decodes from a single [`Tag`], failing with a tag-mismatch
//! error when handed a tag of the wrong class or number.
//!
//! # Overview
//!
//! - Numeric types use the big-endian minimum-octet canonical form;
//!   [`Integer`] trims with two's-complement sign awareness.
//! - [`CharacterString`] keeps its original character set octet and raw
//!   bytes so re-encoding is byte-identical, alongside a normalized UTF-8
//!   projection.
//! - Enumerations are open-ended: [`EnumValue`] carries either a table name
//!   or a raw number, so vendor-proprietary and future values survive a
//!   decode/encode round trip.
//! - [`Date`] and [`Time`] use 255 as the "don't care" wildcard in every
//!   field and can be populated from the system clock.
//! - [`Value`] is the unified runtime value used by the object model and
//!   the service layer.
//!
//! # Example
//!
//! ```rust
//! use bacstack::primitive::{Atomic, Unsigned};
//!
//! let tag = Unsigned(300).encode();
//! assert_eq!(tag.data, vec![0x01, 0x2C]);
//! assert_eq!(Unsigned::decode(&tag).unwrap(), Unsigned(300));
//! ```

#[cfg(feature = "std")]
use std::fmt;

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::{format, string::String, vec, vec::Vec};

use log::warn;

use crate::encoding::{ApplicationTag, EncodingError, Result, Tag, TagClass, TagList};
use crate::extensible_enum;
use crate::util::to_hex;

/// A primitive datatype that encodes into exactly one application tag.
pub trait Atomic: Sized {
    /// The application tag number for this datatype.
    const APP_TAG: ApplicationTag;

    /// Encode into an application tag.
    fn encode(&self) -> Tag;

    /// Decode from an application tag of the matching number.
    fn decode(tag: &Tag) -> Result<Self>;
}

/// Reduce a value to the smallest number of octets, big-endian.
fn unsigned_octets(value: u32) -> Vec<u8> {
    let raw = value.to_be_bytes();
    let mut start = 0;
    while start < 3 && raw[start] == 0 {
        start += 1;
    }
    raw[start..].to_vec()
}

fn unsigned_from_octets(data: &[u8]) -> Result<u32> {
    if data.is_empty() || data.len() > 4 {
        return Err(EncodingError::InvalidLength);
    }
    let mut value: u32 = 0;
    for &octet in data {
        value = (value << 8) | octet as u32;
    }
    Ok(value)
}

//
//  Null
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Null;

impl Atomic for Null {
    const APP_TAG: ApplicationTag = ApplicationTag::Null;

    fn encode(&self) -> Tag {
        Tag::application(ApplicationTag::Null, Vec::new())
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::Null, "null application")?;
        Ok(Null)
    }
}

impl fmt::Display for Null {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Null")
    }
}

//
//  Boolean
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Boolean(pub bool);

impl Atomic for Boolean {
    const APP_TAG: ApplicationTag = ApplicationTag::Boolean;

    fn encode(&self) -> Tag {
        Tag::boolean(self.0)
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::Boolean, "boolean application")?;
        Ok(Boolean(tag.lvt != 0))
    }
}

impl fmt::Display for Boolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Boolean({})", self.0)
    }
}

//
//  Unsigned
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Unsigned(pub u32);

impl Atomic for Unsigned {
    const APP_TAG: ApplicationTag = ApplicationTag::Unsigned;

    fn encode(&self) -> Tag {
        Tag::application(ApplicationTag::Unsigned, unsigned_octets(self.0))
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::Unsigned, "unsigned application")?;
        Ok(Unsigned(unsigned_from_octets(&tag.data)?))
    }
}

impl fmt::Display for Unsigned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsigned({})", self.0)
    }
}

//
//  Integer
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Integer(pub i32);

impl Atomic for Integer {
    const APP_TAG: ApplicationTag = ApplicationTag::Integer;

    fn encode(&self) -> Tag {
        // minimal two's-complement form: a leading octet is redundant when
        // it is all sign bits and the next octet repeats the sign
        let raw = self.0.to_be_bytes();
        let mut start = 0;
        while start < 3 {
            let lead = raw[start];
            let next_negative = raw[start + 1] & 0x80 != 0;
            if (lead == 0x00 && !next_negative) || (lead == 0xFF && next_negative) {
                start += 1;
            } else {
                break;
            }
        }
        Tag::application(ApplicationTag::Integer, raw[start..].to_vec())
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::Integer, "integer application")?;
        if tag.data.is_empty() || tag.data.len() > 4 {
            return Err(EncodingError::InvalidLength);
        }
        // sign-extend from the leading octet
        let mut value: u32 = if tag.data[0] & 0x80 != 0 { u32::MAX } else { 0 };
        for &octet in &tag.data {
            value = (value << 8) | octet as u32;
        }
        Ok(Integer(value as i32))
    }
}

impl fmt::Display for Integer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Integer({})", self.0)
    }
}

//
//  Real
//

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Real(pub f32);

impl Atomic for Real {
    const APP_TAG: ApplicationTag = ApplicationTag::Real;

    fn encode(&self) -> Tag {
        Tag::application(ApplicationTag::Real, self.0.to_be_bytes().to_vec())
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::Real, "real application")?;
        let data: [u8; 4] = tag
            .data
            .as_slice()
            .try_into()
            .map_err(|_| EncodingError::InvalidLength)?;
        Ok(Real(f32::from_be_bytes(data)))
    }
}

impl fmt::Display for Real {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Real({})", self.0)
    }
}

//
//  Double
//

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Double(pub f64);

impl Atomic for Double {
    const APP_TAG: ApplicationTag = ApplicationTag::Double;

    fn encode(&self) -> Tag {
        Tag::application(ApplicationTag::Double, self.0.to_be_bytes().to_vec())
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::Double, "double application")?;
        let data: [u8; 8] = tag
            .data
            .as_slice()
            .try_into()
            .map_err(|_| EncodingError::InvalidLength)?;
        Ok(Double(f64::from_be_bytes(data)))
    }
}

impl fmt::Display for Double {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Double({})", self.0)
    }
}

//
//  OctetString
//

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OctetString(pub Vec<u8>);

impl Atomic for OctetString {
    const APP_TAG: ApplicationTag = ApplicationTag::OctetString;

    fn encode(&self) -> Tag {
        Tag::application(ApplicationTag::OctetString, self.0.clone())
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::OctetString, "octet string application")?;
        Ok(OctetString(tag.data.clone()))
    }
}

impl fmt::Display for OctetString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OctetString(X'{}')", to_hex(&self.0))
    }
}

//
//  CharacterString
//

/// Character set octets defined by the standard.
pub mod character_set {
    pub const UTF8: u8 = 0;
    pub const UCS4: u8 = 3;
    pub const UCS2: u8 = 4;
    pub const LATIN1: u8 = 5;
}

/// A character string with its original wire form retained.
///
/// `encoding` and `raw` hold exactly what was decoded, so re-encoding is
/// byte-identical even for character sets this crate only reads. `string`
/// is the normalized UTF-8 projection used for display and comparison by
/// the rest of the stack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterString {
    pub encoding: u8,
    pub raw: Vec<u8>,
    pub string: String,
}

impl CharacterString {
    /// A UTF-8 encoded character string.
    pub fn new(text: &str) -> Self {
        Self {
            encoding: character_set::UTF8,
            raw: text.as_bytes().to_vec(),
            string: String::from(text),
        }
    }

    fn normalize(encoding: u8, raw: &[u8]) -> String {
        match encoding {
            character_set::UTF8 => String::from_utf8_lossy(raw).into_owned(),
            character_set::UCS4 => raw
                .chunks(4)
                .map(|chunk| {
                    let quad: [u8; 4] = chunk.try_into().unwrap_or([0, 0, 0xFF, 0xFD]);
                    char::from_u32(u32::from_be_bytes(quad)).unwrap_or('\u{FFFD}')
                })
                .collect(),
            character_set::UCS2 => {
                let (text, _, _) = encoding_rs::UTF_16BE.decode(raw);
                text.into_owned()
            }
            character_set::LATIN1 => raw.iter().map(|&b| b as char).collect(),
            other => {
                warn!("unsupported character set {}", other);
                format!("(unsupported character set {})", other)
            }
        }
    }
}

impl Atomic for CharacterString {
    const APP_TAG: ApplicationTag = ApplicationTag::CharacterString;

    fn encode(&self) -> Tag {
        let mut data = Vec::with_capacity(self.raw.len() + 1);
        data.push(self.encoding);
        data.extend_from_slice(&self.raw);
        Tag::application(ApplicationTag::CharacterString, data)
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::CharacterString, "character string application")?;
        let (&encoding, raw) = tag
            .data
            .split_first()
            .ok_or(EncodingError::InvalidLength)?;
        Ok(Self {
            encoding,
            raw: raw.to_vec(),
            string: Self::normalize(encoding, raw),
        })
    }
}

impl From<&str> for CharacterString {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl fmt::Display for CharacterString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CharacterString({},{:?})", self.encoding, self.string)
    }
}

//
//  BitString
//

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitString(pub Vec<bool>);

impl Atomic for BitString {
    const APP_TAG: ApplicationTag = ApplicationTag::BitString;

    fn encode(&self) -> Tag {
        let used = self.0.len() % 8;
        let unused = if used == 0 { 0 } else { 8 - used };

        let mut data = Vec::with_capacity(1 + self.0.len() / 8 + 1);
        data.push(unused as u8);

        let mut octet = 0u8;
        for (i, &bit) in self.0.iter().enumerate() {
            if bit {
                octet |= 1 << (7 - (i % 8));
            }
            if i % 8 == 7 {
                data.push(octet);
                octet = 0;
            }
        }
        if used != 0 {
            data.push(octet);
        }

        Tag::application(ApplicationTag::BitString, data)
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::BitString, "bit string application")?;
        let (&unused, packed) = tag
            .data
            .split_first()
            .ok_or(EncodingError::InvalidLength)?;
        if unused > 7 {
            return Err(EncodingError::InvalidFormat(String::from(
                "unused bit count out of range",
            )));
        }

        let mut bits = Vec::with_capacity(packed.len() * 8);
        for &octet in packed {
            for position in 0..8 {
                bits.push(octet & (1 << (7 - position)) != 0);
            }
        }
        bits.truncate(bits.len().saturating_sub(unused as usize));
        Ok(BitString(bits))
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitString(")?;
        for &bit in &self.0 {
            write!(f, "{}", u8::from(bit))?;
        }
        write!(f, ")")
    }
}

//
//  Enumerated
//

/// A concrete enumeration type: the bidirectional name/value table built by
/// [`extensible_enum!`](crate::extensible_enum).
///
/// Conversions are total in the numeric direction - every `u32` maps to a
/// variant (named, vendor or reserved) and back to the same `u32`.
pub trait Enumeration: Copy {
    fn to_value(self) -> u32;
    fn from_value(value: u32) -> Self;
    fn from_name(name: &str) -> Option<Self>;
    fn name(self) -> Option<&'static str>;
}

/// An enumerated value as either a table name or a raw number.
///
/// Decoding classifies a wire value through the type's table and falls back
/// to the raw number for vendor-proprietary or future values; encoding
/// accepts either form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumValue {
    Named(&'static str),
    Numeric(u32),
}

impl EnumValue {
    /// Translate a numeric value through the table of `E`, keeping the raw
    /// number when unmapped.
    pub fn classify<E: Enumeration>(value: u32) -> EnumValue {
        match E::from_value(value).name() {
            Some(name) => EnumValue::Named(name),
            None => EnumValue::Numeric(value),
        }
    }

    /// Translate back to the numeric value; a name unknown to the table of
    /// `E` is a format error.
    pub fn resolve<E: Enumeration>(&self) -> Result<u32> {
        match self {
            EnumValue::Numeric(value) => Ok(*value),
            EnumValue::Named(name) => E::from_name(name)
                .map(E::to_value)
                .ok_or_else(|| EncodingError::InvalidFormat(format!("undefined enumeration {:?}", name))),
        }
    }
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnumValue::Named(name) => write!(f, "{}", name),
            EnumValue::Numeric(value) => write!(f, "{}", value),
        }
    }
}

/// The raw enumerated primitive, before classification through a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Enumerated(pub u32);

impl Atomic for Enumerated {
    const APP_TAG: ApplicationTag = ApplicationTag::Enumerated;

    fn encode(&self) -> Tag {
        Tag::application(ApplicationTag::Enumerated, unsigned_octets(self.0))
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::Enumerated, "enumerated application")?;
        Ok(Enumerated(unsigned_from_octets(&tag.data)?))
    }
}

impl fmt::Display for Enumerated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Enumerated({})", self.0)
    }
}

/// Encode a typed enumeration value.
pub fn encode_enumerated<E: Enumeration>(value: E) -> Tag {
    Enumerated(value.to_value()).encode()
}

/// Decode a typed enumeration value; unmapped numbers land in the vendor or
/// reserved variant rather than failing.
pub fn decode_enumerated<E: Enumeration>(tag: &Tag) -> Result<E> {
    Ok(E::from_value(Enumerated::decode(tag)?.0))
}

//
//  Date
//

/// A date as the raw 4-octet wire form: year offset from 1900, month, day
/// and day-of-week (Monday = 1), each with 255 as the wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Date {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub weekday: u8,
}

impl Date {
    /// Wildcard octet matching any field value.
    pub const UNSPECIFIED: u8 = 255;

    pub fn new(year: u8, month: u8, day: u8, weekday: u8) -> Self {
        Self {
            year,
            month,
            day,
            weekday,
        }
    }

    /// Today's date from the system clock.
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        use chrono::{Datelike, Local};

        let today = Local::now().date_naive();
        Self {
            year: today.year().saturating_sub(1900).clamp(0, 254) as u8,
            month: today.month() as u8,
            day: today.day() as u8,
            weekday: today.weekday().number_from_monday() as u8,
        }
    }

    /// The calendar year, when specified.
    pub fn year_ad(&self) -> Option<u16> {
        (self.year != Self::UNSPECIFIED).then(|| 1900 + self.year as u16)
    }

    /// Fill in the day-of-week from year, month and day. Leaves the field
    /// untouched unless all three are concrete.
    pub fn compute_day_of_week(&mut self) {
        if self.year == Self::UNSPECIFIED
            || self.month == Self::UNSPECIFIED
            || self.day == Self::UNSPECIFIED
        {
            return;
        }
        use chrono::Datelike;
        if let Some(date) = chrono::NaiveDate::from_ymd_opt(
            1900 + self.year as i32,
            self.month as u32,
            self.day as u32,
        ) {
            self.weekday = date.weekday().number_from_monday() as u8;
        }
    }
}

impl Default for Date {
    fn default() -> Self {
        Self::new(
            Self::UNSPECIFIED,
            Self::UNSPECIFIED,
            Self::UNSPECIFIED,
            Self::UNSPECIFIED,
        )
    }
}

impl Atomic for Date {
    const APP_TAG: ApplicationTag = ApplicationTag::Date;

    fn encode(&self) -> Tag {
        Tag::application(
            ApplicationTag::Date,
            vec![self.year, self.month, self.day, self.weekday],
        )
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::Date, "date application")?;
        let data: [u8; 4] = tag
            .data
            .as_slice()
            .try_into()
            .map_err(|_| EncodingError::InvalidLength)?;
        Ok(Self::new(data[0], data[1], data[2], data[3]))
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

        match self.month {
            Self::UNSPECIFIED => write!(f, "*/")?,
            month => write!(f, "{}/", month)?,
        }
        match self.day {
            Self::UNSPECIFIED => write!(f, "*/")?,
            day => write!(f, "{}/", day)?,
        }
        match self.year_ad() {
            None => write!(f, "*")?,
            Some(year) => write!(f, "{}", year)?,
        }
        match self.weekday {
            Self::UNSPECIFIED => write!(f, " *"),
            day @ 1..=7 => write!(f, " {}", DAYS[day as usize - 1]),
            day => write!(f, " ?{}", day),
        }
    }
}

//
//  Time
//

/// A time of day as the raw 4-octet wire form, 255 wildcard per field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub hundredths: u8,
}

impl Time {
    /// Wildcard octet matching any field value.
    pub const UNSPECIFIED: u8 = 255;

    pub fn new(hour: u8, minute: u8, second: u8, hundredths: u8) -> Self {
        Self {
            hour,
            minute,
            second,
            hundredths,
        }
    }

    /// The current time of day from the system clock.
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        use chrono::{Local, Timelike};

        let now = Local::now();
        Self {
            hour: now.hour() as u8,
            minute: now.minute() as u8,
            second: now.second() as u8,
            hundredths: (now.nanosecond() / 10_000_000).min(99) as u8,
        }
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new(
            Self::UNSPECIFIED,
            Self::UNSPECIFIED,
            Self::UNSPECIFIED,
            Self::UNSPECIFIED,
        )
    }
}

impl Atomic for Time {
    const APP_TAG: ApplicationTag = ApplicationTag::Time;

    fn encode(&self) -> Tag {
        Tag::application(
            ApplicationTag::Time,
            vec![self.hour, self.minute, self.second, self.hundredths],
        )
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::Time, "time application")?;
        let data: [u8; 4] = tag
            .data
            .as_slice()
            .try_into()
            .map_err(|_| EncodingError::InvalidLength)?;
        Ok(Self::new(data[0], data[1], data[2], data[3]))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (value, sep) in [
            (self.hour, ":"),
            (self.minute, ":"),
            (self.second, "."),
            (self.hundredths, ""),
        ] {
            match value {
                Self::UNSPECIFIED => write!(f, "*{}", sep)?,
                value => write!(f, "{:02}{}", value, sep)?,
            }
        }
        Ok(())
    }
}

//
//  ObjectType
//

extensible_enum! {
    /// Standard object types. Values 128..=1023 are vendor-proprietary.
    ObjectType {
        AnalogInput = 0,
        AnalogOutput = 1,
        AnalogValue = 2,
        BinaryInput = 3,
        BinaryOutput = 4,
        BinaryValue = 5,
        Calendar = 6,
        Command = 7,
        Device = 8,
        EventEnrollment = 9,
        File = 10,
        Group = 11,
        Loop = 12,
        MultiStateInput = 13,
        MultiStateOutput = 14,
        NotificationClass = 15,
        Program = 16,
        Schedule = 17,
        Averaging = 18,
        MultiStateValue = 19,
        TrendLog = 20,
        LifeSafetyPoint = 21,
        LifeSafetyZone = 22,
        Accumulator = 23,
        PulseConverter = 24,
        EventLog = 25,
        GlobalGroup = 26,
        TrendLogMultiple = 27,
        LoadControl = 28,
        StructuredView = 29,
        AccessDoor = 30,
    },
    128..=1023
}

//
//  ObjectIdentifier
//

/// An object identifier: 10-bit object type plus 22-bit instance number,
/// packed into 32 bits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier {
    pub object_type: ObjectType,
    pub instance: u32,
}

impl ObjectIdentifier {
    pub fn new(object_type: ObjectType, instance: u32) -> Self {
        Self {
            object_type,
            instance,
        }
    }

    /// Check that both parts fit their bit fields.
    pub fn is_valid(&self) -> bool {
        u32::from(self.object_type) <= 0x3FF && self.instance <= 0x3FFFFF
    }
}

impl Default for ObjectIdentifier {
    fn default() -> Self {
        Self::new(ObjectType::AnalogInput, 0)
    }
}

impl From<u32> for ObjectIdentifier {
    /// Unpack from the 32-bit wire form.
    fn from(value: u32) -> Self {
        Self {
            object_type: ObjectType::from((value >> 22) & 0x3FF),
            instance: value & 0x3FFFFF,
        }
    }
}

impl From<ObjectIdentifier> for u32 {
    /// Pack into the 32-bit wire form.
    fn from(value: ObjectIdentifier) -> Self {
        ((u32::from(value.object_type) & 0x3FF) << 22) | (value.instance & 0x3FFFFF)
    }
}

impl Atomic for ObjectIdentifier {
    const APP_TAG: ApplicationTag = ApplicationTag::ObjectIdentifier;

    fn encode(&self) -> Tag {
        Tag::application(
            ApplicationTag::ObjectIdentifier,
            u32::from(*self).to_be_bytes().to_vec(),
        )
    }

    fn decode(tag: &Tag) -> Result<Self> {
        tag.expect_application(ApplicationTag::ObjectIdentifier, "object identifier application")?;
        let data: [u8; 4] = tag
            .data
            .as_slice()
            .try_into()
            .map_err(|_| EncodingError::InvalidLength)?;
        Ok(Self::from(u32::from_be_bytes(data)))
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use crate::primitive::Enumeration as _;

        match self.object_type {
            ObjectType::Vendor(value) => write!(f, "(Vendor {}, {})", value.value(), self.instance),
            ObjectType::Reserved(value) if value.value() > 0x3FF => {
                write!(f, "(Bad {}, {})", value.value(), self.instance)
            }
            ObjectType::Reserved(value) => {
                write!(f, "(Reserved {}, {})", value.value(), self.instance)
            }
            named => write!(
                f,
                "({}, {})",
                named.name().unwrap_or("?"),
                self.instance
            ),
        }
    }
}

//
//  Value
//

/// A decoded runtime value: any primitive, or an array/list of values.
///
/// Tags this crate has no datatype for are preserved as [`Value::Unknown`]
/// so a value can travel through the stack and be re-encoded untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Unsigned(u32),
    Integer(i32),
    Real(f32),
    Double(f64),
    OctetString(Vec<u8>),
    CharacterString(CharacterString),
    BitString(BitString),
    Enumerated(u32),
    Date(Date),
    Time(Time),
    ObjectIdentifier(ObjectIdentifier),
    Array(Vec<Value>),
    List(Vec<Value>),
    Unknown(Tag),
}

impl Value {
    /// Decode a single tag into a value, preserving unknown tags.
    pub fn decode(tag: &Tag) -> Result<Value> {
        if tag.class != TagClass::Application || tag.number > 15 {
            return Ok(Value::Unknown(tag.clone()));
        }

        let number = ApplicationTag::try_from(tag.number as u8)?;
        Ok(match number {
            ApplicationTag::Null => Value::Null,
            ApplicationTag::Boolean => Value::Boolean(Boolean::decode(tag)?.0),
            ApplicationTag::Unsigned => Value::Unsigned(Unsigned::decode(tag)?.0),
            ApplicationTag::Integer => Value::Integer(Integer::decode(tag)?.0),
            ApplicationTag::Real => Value::Real(Real::decode(tag)?.0),
            ApplicationTag::Double => Value::Double(Double::decode(tag)?.0),
            ApplicationTag::OctetString => Value::OctetString(OctetString::decode(tag)?.0),
            ApplicationTag::CharacterString => {
                Value::CharacterString(CharacterString::decode(tag)?)
            }
            ApplicationTag::BitString => Value::BitString(BitString::decode(tag)?),
            ApplicationTag::Enumerated => Value::Enumerated(Enumerated::decode(tag)?.0),
            ApplicationTag::Date => Value::Date(Date::decode(tag)?),
            ApplicationTag::Time => Value::Time(Time::decode(tag)?),
            ApplicationTag::ObjectIdentifier => {
                Value::ObjectIdentifier(ObjectIdentifier::decode(tag)?)
            }
            _ => Value::Unknown(tag.clone()),
        })
    }

    /// Decode a run of tags: one tag is the value itself, several become a
    /// list, a bracketed group becomes a nested list.
    pub fn decode_list(list: &TagList) -> Result<Value> {
        let tags: Vec<&Tag> = list.iter().collect();
        let mut values = Vec::new();
        let mut i = 0;

        while i < tags.len() {
            let tag = tags[i];
            match tag.class {
                TagClass::Opening => {
                    let mut group = TagList::new();
                    let mut level: i32 = 0;
                    i += 1;
                    while i < tags.len() {
                        let inner = tags[i];
                        match inner.class {
                            TagClass::Opening => level += 1,
                            TagClass::Closing => {
                                level -= 1;
                                if level < 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        group.push((*inner).clone());
                        i += 1;
                    }
                    if level >= 0 {
                        return Err(EncodingError::UnbalancedTags);
                    }
                    values.push(Value::decode_list(&group)?);
                }
                TagClass::Closing => return Err(EncodingError::UnbalancedTags),
                _ => values.push(Value::decode(tag)?),
            }
            i += 1;
        }

        Ok(match values.len() {
            0 => Value::Null,
            1 => values.remove(0),
            _ => Value::List(values),
        })
    }

    /// Encode into a run of tags.
    pub fn encode(&self, list: &mut TagList) {
        match self {
            Value::Null => list.push(Null.encode()),
            Value::Boolean(v) => list.push(Boolean(*v).encode()),
            Value::Unsigned(v) => list.push(Unsigned(*v).encode()),
            Value::Integer(v) => list.push(Integer(*v).encode()),
            Value::Real(v) => list.push(Real(*v).encode()),
            Value::Double(v) => list.push(Double(*v).encode()),
            Value::OctetString(v) => list.push(OctetString(v.clone()).encode()),
            Value::CharacterString(v) => list.push(v.encode()),
            Value::BitString(v) => list.push(v.encode()),
            Value::Enumerated(v) => list.push(Enumerated(*v).encode()),
            Value::Date(v) => list.push(v.encode()),
            Value::Time(v) => list.push(v.encode()),
            Value::ObjectIdentifier(v) => list.push(v.encode()),
            Value::Array(values) | Value::List(values) => {
                for value in values {
                    value.encode(list);
                }
            }
            Value::Unknown(tag) => list.push(tag.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Unsigned(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::OctetString(v) => write!(f, "X'{}'", to_hex(v)),
            Value::CharacterString(v) => write!(f, "{}", v.string),
            Value::BitString(v) => write!(f, "{}", v),
            Value::Enumerated(v) => write!(f, "Enumerated({})", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::ObjectIdentifier(v) => write!(f, "{}", v),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, "]")
            }
            Value::List(values) => {
                write!(f, "(")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, ")")
            }
            Value::Unknown(tag) => write!(f, "?{}", tag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unsigned_canonical_form() {
        // 300 encodes as application tag 2, two octets
        let tag = Unsigned(300).encode();
        assert!(tag.is_application(ApplicationTag::Unsigned));
        assert_eq!(tag.lvt, 2);
        assert_eq!(tag.data, vec![0x01, 0x2C]);
        assert_eq!(Unsigned::decode(&tag).unwrap(), Unsigned(300));
    }

    #[test]
    fn test_unsigned_boundaries() {
        let cases = [
            (0u32, 1usize),
            (255, 1),
            (256, 2),
            (65535, 2),
            (65536, 3),
            (16777215, 3),
            (16777216, 4),
            (u32::MAX, 4),
        ];
        for (value, octets) in cases {
            let tag = Unsigned(value).encode();
            assert_eq!(tag.data.len(), octets, "value {}", value);
            assert_eq!(Unsigned::decode(&tag).unwrap().0, value);
        }
    }

    #[test]
    fn test_integer_sign_aware_trim() {
        let cases = [
            (0i32, vec![0x00]),
            (1, vec![0x01]),
            (-1, vec![0xFF]),
            (127, vec![0x7F]),
            (128, vec![0x00, 0x80]),
            (-128, vec![0x80]),
            (-129, vec![0xFF, 0x7F]),
            (32767, vec![0x7F, 0xFF]),
            (-32768, vec![0x80, 0x00]),
            (i32::MAX, vec![0x7F, 0xFF, 0xFF, 0xFF]),
            (i32::MIN, vec![0x80, 0x00, 0x00, 0x00]),
        ];
        for (value, octets) in cases {
            let tag = Integer(value).encode();
            assert_eq!(tag.data, octets, "value {}", value);
            assert_eq!(Integer::decode(&tag).unwrap().0, value);
        }
    }

    #[test]
    fn test_integer_decode_sign_extends() {
        let tag = Tag::application(ApplicationTag::Integer, vec![0xFF, 0x7F]);
        assert_eq!(Integer::decode(&tag).unwrap().0, -129);

        let tag = Tag::application(ApplicationTag::Integer, vec![0x80]);
        assert_eq!(Integer::decode(&tag).unwrap().0, -128);
    }

    #[test]
    fn test_tag_mismatch_is_rejected() {
        let tag = Unsigned(1).encode();
        assert!(matches!(
            Integer::decode(&tag),
            Err(EncodingError::TagMismatch(_))
        ));
        assert!(matches!(
            Real::decode(&tag),
            Err(EncodingError::TagMismatch(_))
        ));

        let ctx = tag.app_to_context(0).unwrap();
        assert!(matches!(
            Unsigned::decode(&ctx),
            Err(EncodingError::TagMismatch(_))
        ));
    }

    #[test]
    fn test_boolean_roundtrip() {
        for value in [false, true] {
            let tag = Boolean(value).encode();
            assert!(tag.data.is_empty());
            assert_eq!(tag.lvt, u32::from(value));
            assert_eq!(Boolean::decode(&tag).unwrap().0, value);
        }
    }

    #[test]
    fn test_real_double_roundtrip() {
        for value in [0.0f32, 1.5, -273.15, f32::MAX, f32::MIN] {
            assert_eq!(Real::decode(&Real(value).encode()).unwrap().0, value);
        }
        for value in [0.0f64, 1.5, -273.15, f64::MAX, f64::MIN] {
            assert_eq!(Double::decode(&Double(value).encode()).unwrap().0, value);
        }
    }

    #[test]
    fn test_character_string_keeps_wire_form() {
        // latin-1 payload: "caf\xe9"
        let tag = Tag::application(
            ApplicationTag::CharacterString,
            vec![5, b'c', b'a', b'f', 0xE9],
        );
        let decoded = CharacterString::decode(&tag).unwrap();
        assert_eq!(decoded.encoding, character_set::LATIN1);
        assert_eq!(decoded.string, "café");
        // re-encode is byte-identical even though the projection is UTF-8
        assert_eq!(decoded.encode(), tag);
    }

    #[test]
    fn test_character_string_ucs2() {
        let tag = Tag::application(
            ApplicationTag::CharacterString,
            vec![4, 0x00, b'h', 0x00, b'i'],
        );
        let decoded = CharacterString::decode(&tag).unwrap();
        assert_eq!(decoded.string, "hi");
    }

    #[test]
    fn test_character_string_unknown_set() {
        let tag = Tag::application(ApplicationTag::CharacterString, vec![9, 0xAA]);
        let decoded = CharacterString::decode(&tag).unwrap();
        assert_eq!(decoded.string, "(unsupported character set 9)");
        assert_eq!(decoded.encode(), tag);
    }

    #[test]
    fn test_bit_string_roundtrip() {
        let bits = BitString(vec![true, false, true, true, false, false, true, false, true]);
        let tag = bits.encode();
        // one unused-count octet plus two packed octets, 7 unused bits
        assert_eq!(tag.data.len(), 3);
        assert_eq!(tag.data[0], 7);
        assert_eq!(BitString::decode(&tag).unwrap(), bits);

        let empty = BitString(Vec::new());
        let tag = empty.encode();
        assert_eq!(tag.data, vec![0]);
        assert_eq!(BitString::decode(&tag).unwrap(), empty);
    }

    #[test]
    fn test_enumerated_classification() {
        let tag = encode_enumerated(ObjectType::Device);
        assert_eq!(tag.data, vec![8]);

        let decoded: ObjectType = decode_enumerated(&tag).unwrap();
        assert_eq!(decoded, ObjectType::Device);

        // vendor-proprietary values survive unmapped
        let tag = Enumerated(300).encode();
        let decoded: ObjectType = decode_enumerated(&tag).unwrap();
        assert_eq!(u32::from(decoded), 300);
        assert_eq!(decoded.name(), None);

        assert_eq!(EnumValue::classify::<ObjectType>(8), EnumValue::Named("Device"));
        assert_eq!(EnumValue::classify::<ObjectType>(300), EnumValue::Numeric(300));
    }

    #[test]
    fn test_enum_value_resolution() {
        assert_eq!(EnumValue::Named("Device").resolve::<ObjectType>().unwrap(), 8);
        assert_eq!(EnumValue::Numeric(300).resolve::<ObjectType>().unwrap(), 300);
        assert!(EnumValue::Named("NoSuchThing")
            .resolve::<ObjectType>()
            .is_err());
    }

    #[test]
    fn test_date_roundtrip_and_wildcards() {
        let date = Date::new(124, 3, 15, 5);
        let tag = date.encode();
        assert_eq!(tag.data, vec![124, 3, 15, 5]);
        assert_eq!(Date::decode(&tag).unwrap(), date);
        assert_eq!(date.year_ad(), Some(2024));
        assert_eq!(date.to_string(), "3/15/2024 Fri");

        let any = Date::default();
        assert_eq!(any.to_string(), "*/*/* *");
        assert_eq!(any.year_ad(), None);
    }

    #[test]
    fn test_compute_day_of_week() {
        // 2024-03-15 was a Friday
        let mut date = Date::new(124, 3, 15, Date::UNSPECIFIED);
        date.compute_day_of_week();
        assert_eq!(date.weekday, 5);

        // wildcards leave the field alone
        let mut date = Date::new(Date::UNSPECIFIED, 3, 15, 2);
        date.compute_day_of_week();
        assert_eq!(date.weekday, 2);
    }

    #[test]
    fn test_time_roundtrip() {
        let time = Time::new(14, 30, 45, 50);
        let tag = time.encode();
        assert_eq!(tag.data, vec![14, 30, 45, 50]);
        assert_eq!(Time::decode(&tag).unwrap(), time);
        assert_eq!(time.to_string(), "14:30:45.50");

        let any = Time::default();
        assert_eq!(any.to_string(), "*:*:*.*");
    }

    #[test]
    fn test_object_identifier_packing() {
        let id = ObjectIdentifier::new(ObjectType::Device, 123);
        let packed = u32::from(id);
        assert_eq!(packed, (8 << 22) | 123);
        assert_eq!(ObjectIdentifier::from(packed), id);

        let tag = id.encode();
        assert_eq!(tag.data, vec![0x02, 0x00, 0x00, 0x7B]);
        assert_eq!(ObjectIdentifier::decode(&tag).unwrap(), id);
    }

    #[test]
    fn test_object_identifier_display() {
        let id = ObjectIdentifier::new(ObjectType::AnalogInput, 5);
        assert_eq!(id.to_string(), "(AnalogInput, 5)");

        let vendor = ObjectIdentifier::new(ObjectType::from(300u32), 1);
        assert_eq!(vendor.to_string(), "(Vendor 300, 1)");

        let bad = ObjectIdentifier::new(ObjectType::from(5000u32), 1);
        assert_eq!(bad.to_string(), "(Bad 5000, 1)");
        assert!(!bad.is_valid());
    }

    #[test]
    fn test_value_generic_decode() {
        let tag = Unsigned(300).encode();
        assert_eq!(Value::decode(&tag).unwrap(), Value::Unsigned(300));

        let tag = Tag::context(2, vec![0x01]);
        assert!(matches!(Value::decode(&tag).unwrap(), Value::Unknown(_)));
    }

    #[test]
    fn test_value_list_decode() {
        let mut list = TagList::new();
        list.push(Unsigned(1).encode());
        list.push(Unsigned(2).encode());
        list.push(Tag::opening(0));
        list.push(Boolean(true).encode());
        list.push(Tag::closing(0));

        let value = Value::decode_list(&list).unwrap();
        assert_eq!(
            value,
            Value::List(vec![
                Value::Unsigned(1),
                Value::Unsigned(2),
                Value::Boolean(true),
            ])
        );
    }

    #[test]
    fn test_value_encode() {
        let mut list = TagList::new();
        Value::Array(vec![Value::Unsigned(1), Value::Unsigned(2)]).encode(&mut list);
        assert_eq!(list.len(), 2);
        assert_eq!(Value::decode(list.peek().unwrap()).unwrap(), Value::Unsigned(1));
    }

    proptest! {
        #[test]
        fn prop_unsigned_roundtrip(value: u32) {
            let tag = Unsigned(value).encode();
            prop_assert_eq!(Unsigned::decode(&tag).unwrap().0, value);
            // canonical form never carries a redundant leading zero
            prop_assert!(tag.data.len() == 1 || tag.data[0] != 0);
        }

        #[test]
        fn prop_integer_roundtrip(value: i32) {
            let tag = Integer(value).encode();
            prop_assert_eq!(Integer::decode(&tag).unwrap().0, value);
            // minimal two's-complement form
            if tag.data.len() > 1 {
                let lead = tag.data[0];
                let next = tag.data[1];
                prop_assert!(!(lead == 0x00 && next & 0x80 == 0));
                prop_assert!(!(lead == 0xFF && next & 0x80 != 0));
            }
        }

        #[test]
        fn prop_real_roundtrip(value: f32) {
            let tag = Real(value).encode();
            let decoded = Real::decode(&tag).unwrap().0;
            prop_assert_eq!(decoded.to_bits(), value.to_bits());
        }

        #[test]
        fn prop_character_string_roundtrip(text in "\\PC*") {
            let original = CharacterString::new(&text);
            let decoded = CharacterString::decode(&original.encode()).unwrap();
            prop_assert_eq!(decoded, original);
        }

        #[test]
        fn prop_bit_string_roundtrip(bits in proptest::collection::vec(any::<bool>(), 0..64)) {
            let original = BitString(bits);
            let decoded = BitString::decode(&original.encode()).unwrap();
            prop_assert_eq!(decoded, original);
        }
    }
}
