//! BACnet Tag Encoding/Decoding Module
//!
//! This module implements the self-describing tag-length-value format that
//! underlies every encoded BACnet value. A tag carries its class
//! (application, context, opening, closing), a tag number, a
//! length/value/type field (LVT) and the raw payload octets.
//!
//! # Overview
//!
//! The tag codec is responsible for:
//! - Writing and reading the control octet (class bit, number nibble, LVT nibble)
//! - Extended tag numbers (numbers 15 and above use an escape byte)
//! - Extended lengths (LVT 5 and above use a 1-, 2- or 4-octet length field)
//! - The application-tagged boolean special case (value carried in the LVT,
//!   no payload octets)
//! - Opening/closing tags that bracket constructed values
//! - Conversion between application- and context-tagged encodings
//!
//! # Example
//!
//! ```rust
//! use bacstack::encoding::{ApplicationTag, Tag};
//! use bacstack::pdu::PduData;
//!
//! let mut buffer = PduData::new();
//! let tag = Tag::application(ApplicationTag::Unsigned, vec![0x01, 0x2C]);
//! tag.encode(&mut buffer).unwrap();
//! assert_eq!(buffer.as_slice(), &[0x22, 0x01, 0x2C]);
//!
//! let decoded = Tag::decode(&mut buffer).unwrap();
//! assert_eq!(decoded, tag);
//! ```

#[cfg(feature = "std")]
use std::error::Error;

#[cfg(feature = "std")]
use std::fmt;

#[cfg(not(feature = "std"))]
use core::fmt;

#[cfg(not(feature = "std"))]
use alloc::{collections::VecDeque, string::String, vec, vec::Vec};

#[cfg(feature = "std")]
use std::collections::VecDeque;

use log::trace;

use crate::pdu::PduData;
use crate::util::to_hex_string;

/// Result type for encoding operations
#[cfg(feature = "std")]
pub type Result<T> = std::result::Result<T, EncodingError>;

#[cfg(not(feature = "std"))]
pub type Result<T> = core::result::Result<T, EncodingError>;

/// Errors that can occur during encoding/decoding operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// Ran out of octets in the middle of a field
    UnexpectedEndOfData,
    /// Control octet does not describe a usable tag
    InvalidTag,
    /// The tag is not of the class/number the caller expected
    TagMismatch(&'static str),
    /// Length field inconsistent with the datatype
    InvalidLength,
    /// Opening/closing tags do not balance
    UnbalancedTags,
    /// Value cannot be represented in the encoding
    ValueOutOfRange,
    /// Invalid encoding format
    InvalidFormat(String),
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingError::UnexpectedEndOfData => write!(f, "Unexpected end of data"),
            EncodingError::InvalidTag => write!(f, "Invalid tag encountered"),
            EncodingError::TagMismatch(expected) => write!(f, "{} tag required", expected),
            EncodingError::InvalidLength => write!(f, "Invalid length value"),
            EncodingError::UnbalancedTags => write!(f, "Mismatched opening/closing tags"),
            EncodingError::ValueOutOfRange => write!(f, "Value out of valid range"),
            EncodingError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl Error for EncodingError {}

/// Tag classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagClass {
    /// Application-tagged value with a standard datatype number
    Application,
    /// Context-tagged value, number assigned by the enclosing production
    Context,
    /// Start of a constructed (nested) value
    Opening,
    /// End of a constructed (nested) value
    Closing,
}

/// BACnet application tag numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApplicationTag {
    Null = 0,
    Boolean = 1,
    Unsigned = 2,
    Integer = 3,
    Real = 4,
    Double = 5,
    OctetString = 6,
    CharacterString = 7,
    BitString = 8,
    Enumerated = 9,
    Date = 10,
    Time = 11,
    ObjectIdentifier = 12,
    Reserved13 = 13,
    Reserved14 = 14,
    Reserved15 = 15,
}

impl TryFrom<u8> for ApplicationTag {
    type Error = EncodingError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ApplicationTag::Null),
            1 => Ok(ApplicationTag::Boolean),
            2 => Ok(ApplicationTag::Unsigned),
            3 => Ok(ApplicationTag::Integer),
            4 => Ok(ApplicationTag::Real),
            5 => Ok(ApplicationTag::Double),
            6 => Ok(ApplicationTag::OctetString),
            7 => Ok(ApplicationTag::CharacterString),
            8 => Ok(ApplicationTag::BitString),
            9 => Ok(ApplicationTag::Enumerated),
            10 => Ok(ApplicationTag::Date),
            11 => Ok(ApplicationTag::Time),
            12 => Ok(ApplicationTag::ObjectIdentifier),
            13 => Ok(ApplicationTag::Reserved13),
            14 => Ok(ApplicationTag::Reserved14),
            15 => Ok(ApplicationTag::Reserved15),
            _ => Err(EncodingError::InvalidTag),
        }
    }
}

/// A single encoded tag: class, number, length/value/type field and payload.
///
/// For application-tagged booleans `lvt` carries the value itself (0 or 1)
/// and `data` stays empty. For every other tag `lvt` is the payload length.
/// Opening and closing tags carry neither length nor payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub class: TagClass,
    pub number: u32,
    pub lvt: u32,
    pub data: Vec<u8>,
}

impl Tag {
    /// Create a tag from explicit parts.
    pub fn new(class: TagClass, number: u32, lvt: u32, data: Vec<u8>) -> Self {
        Self {
            class,
            number,
            lvt,
            data,
        }
    }

    /// Create an application tag carrying the given payload.
    pub fn application(tag: ApplicationTag, data: Vec<u8>) -> Self {
        Self {
            class: TagClass::Application,
            number: tag as u32,
            lvt: data.len() as u32,
            data,
        }
    }

    /// Create the application boolean tag; the value lives in the LVT field.
    pub fn boolean(value: bool) -> Self {
        Self {
            class: TagClass::Application,
            number: ApplicationTag::Boolean as u32,
            lvt: u32::from(value),
            data: Vec::new(),
        }
    }

    /// Create a context tag carrying the given payload.
    pub fn context(number: u32, data: Vec<u8>) -> Self {
        Self {
            class: TagClass::Context,
            number,
            lvt: data.len() as u32,
            data,
        }
    }

    /// Create an opening tag for the given context number.
    pub fn opening(number: u32) -> Self {
        Self {
            class: TagClass::Opening,
            number,
            lvt: 0,
            data: Vec::new(),
        }
    }

    /// Create a closing tag for the given context number.
    pub fn closing(number: u32) -> Self {
        Self {
            class: TagClass::Closing,
            number,
            lvt: 0,
            data: Vec::new(),
        }
    }

    /// True when this is the application tag for the given datatype number.
    pub fn is_application(&self, tag: ApplicationTag) -> bool {
        self.class == TagClass::Application && self.number == tag as u32
    }

    /// True when this is a context tag with the given number.
    pub fn is_context(&self, number: u32) -> bool {
        self.class == TagClass::Context && self.number == number
    }

    /// Check the tag against an expected application datatype.
    pub fn expect_application(&self, tag: ApplicationTag, what: &'static str) -> Result<()> {
        if self.is_application(tag) {
            Ok(())
        } else {
            Err(EncodingError::TagMismatch(what))
        }
    }

    /// Encode the tag into a buffer.
    pub fn encode(&self, pdu: &mut PduData) -> Result<()> {
        // open and close tags are a single control octet
        if self.class == TagClass::Opening {
            pdu.put((((self.number & 0x0F) << 4) as u8) | 0x0E);
            return Ok(());
        }
        if self.class == TagClass::Closing {
            pdu.put((((self.number & 0x0F) << 4) as u8) | 0x0F);
            return Ok(());
        }

        if self.number > 254 {
            return Err(EncodingError::ValueOutOfRange);
        }

        let mut control: u8 = if self.class == TagClass::Context {
            0x08
        } else {
            0x00
        };

        // tag number part, 0xF escapes to the extended octet
        if self.number < 15 {
            control |= (self.number as u8) << 4;
        } else {
            control |= 0xF0;
        }

        // length/value/type part, 5 escapes to the extended field
        if self.lvt < 5 {
            control |= self.lvt as u8;
        } else {
            control |= 0x05;
        }

        pdu.put(control);
        if self.number >= 15 {
            pdu.put(self.number as u8);
        }

        if self.lvt >= 5 {
            if self.lvt <= 253 {
                pdu.put(self.lvt as u8);
            } else if self.lvt <= 65535 {
                pdu.put(254);
                pdu.put_short(self.lvt as u16);
            } else {
                pdu.put(255);
                pdu.put_long(self.lvt);
            }
        }

        pdu.put_data(&self.data);
        Ok(())
    }

    /// Decode one tag from a buffer.
    pub fn decode(pdu: &mut PduData) -> Result<Tag> {
        let control = pdu.get()?;

        let mut class = if (control >> 3) & 0x01 != 0 {
            TagClass::Context
        } else {
            TagClass::Application
        };

        let mut number = (control >> 4) as u32;
        if number == 0x0F {
            number = pdu.get()? as u32;
        }

        let mut lvt = (control & 0x07) as u32;
        match lvt {
            5 => {
                lvt = pdu.get()? as u32;
                if lvt == 254 {
                    lvt = pdu.get_short()? as u32;
                } else if lvt == 255 {
                    lvt = pdu.get_long()?;
                }
            }
            6 => {
                class = TagClass::Opening;
                lvt = 0;
            }
            7 => {
                class = TagClass::Closing;
                lvt = 0;
            }
            _ => {}
        }

        // application booleans carry the value in the LVT, no payload follows
        let data = if class == TagClass::Application
            && number == ApplicationTag::Boolean as u32
        {
            Vec::new()
        } else {
            pdu.get_data(lvt as usize)?
        };

        let tag = Tag {
            class,
            number,
            lvt,
            data,
        };
        trace!("decoded {}", tag);
        Ok(tag)
    }

    /// Re-encode an application tag as a context tag with the given number.
    ///
    /// The boolean value moves from the LVT into a one-octet payload.
    pub fn app_to_context(&self, context: u32) -> Result<Tag> {
        if self.class != TagClass::Application {
            return Err(EncodingError::TagMismatch("application"));
        }

        if self.number == ApplicationTag::Boolean as u32 {
            Ok(Tag::context(context, vec![self.lvt as u8]))
        } else {
            Ok(Tag::context(context, self.data.clone()))
        }
    }

    /// Re-encode a context tag as the application tag for `datatype`.
    ///
    /// The boolean value moves from the one-octet payload back into the LVT.
    pub fn context_to_app(&self, datatype: ApplicationTag) -> Result<Tag> {
        if self.class != TagClass::Context {
            return Err(EncodingError::TagMismatch("context"));
        }

        if datatype == ApplicationTag::Boolean {
            let value = *self.data.first().ok_or(EncodingError::InvalidLength)?;
            Ok(Tag::new(
                TagClass::Application,
                ApplicationTag::Boolean as u32,
                value as u32,
                Vec::new(),
            ))
        } else {
            Ok(Tag::application(datatype, self.data.clone()))
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            TagClass::Opening => write!(f, "open({})", self.number),
            TagClass::Closing => write!(f, "close({})", self.number),
            TagClass::Context => {
                write!(f, "context({}) {}", self.number, to_hex_string(&self.data, '.'))
            }
            TagClass::Application => write!(
                f,
                "application({}) lvt={} {}",
                self.number,
                self.lvt,
                to_hex_string(&self.data, '.')
            ),
        }
    }
}

/// A context-encoded item found by [`TagList::get_context`]: either a single
/// context tag or the contents of an opening/closing bracketed group.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextGroup {
    Atomic(Tag),
    Constructed(TagList),
}

/// An ordered run of tags, the decoded form of a service parameter stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagList {
    tags: VecDeque<Tag>,
}

impl TagList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Append a tag to the end of the list.
    pub fn push(&mut self, tag: Tag) {
        self.tags.push_back(tag);
    }

    /// Return the tag at the front of the list without removing it.
    pub fn peek(&self) -> Option<&Tag> {
        self.tags.front()
    }

    /// Remove and return the tag at the front of the list.
    pub fn pop(&mut self) -> Option<Tag> {
        self.tags.pop_front()
    }

    /// Return a tag to the front of the list.
    pub fn push_front(&mut self, tag: Tag) {
        self.tags.push_front(tag);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter()
    }

    /// Find the context-encoded item with the given context number.
    ///
    /// Application tags are skipped; a matching context tag is returned as
    /// [`ContextGroup::Atomic`], a matching opening/closing bracketed group
    /// as [`ContextGroup::Constructed`]. Groups must balance.
    pub fn get_context(&self, context: u32) -> Result<Option<ContextGroup>> {
        let tags: Vec<&Tag> = self.tags.iter().collect();
        let mut i = 0;

        while i < tags.len() {
            let tag = tags[i];
            match tag.class {
                TagClass::Application => {}
                TagClass::Context => {
                    if tag.number == context {
                        return Ok(Some(ContextGroup::Atomic((*tag).clone())));
                    }
                }
                TagClass::Opening => {
                    let keeper = tag.number == context;
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

                    if keeper {
                        return Ok(Some(ContextGroup::Constructed(group)));
                    }
                }
                TagClass::Closing => return Err(EncodingError::UnbalancedTags),
            }
            i += 1;
        }

        Ok(None)
    }

    /// Encode every tag in order.
    pub fn encode(&self, pdu: &mut PduData) -> Result<()> {
        for tag in &self.tags {
            tag.encode(pdu)?;
        }
        Ok(())
    }

    /// Decode tags until the buffer is exhausted, checking that opening and
    /// closing tags balance along the way.
    pub fn decode(pdu: &mut PduData) -> Result<TagList> {
        let mut list = TagList::new();
        let mut depth: i32 = 0;

        while pdu.remaining() > 0 {
            let tag = Tag::decode(pdu)?;
            match tag.class {
                TagClass::Opening => depth += 1,
                TagClass::Closing => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(EncodingError::UnbalancedTags);
                    }
                }
                _ => {}
            }
            list.push(tag);
        }

        if depth != 0 {
            return Err(EncodingError::UnbalancedTags);
        }
        Ok(list)
    }

    /// The deepest opening/closing nesting level in the list.
    pub fn nesting_depth(&self) -> usize {
        let mut depth: usize = 0;
        let mut max = 0;
        for tag in &self.tags {
            match tag.class {
                TagClass::Opening => {
                    depth += 1;
                    max = max.max(depth);
                }
                TagClass::Closing => depth = depth.saturating_sub(1),
                _ => {}
            }
        }
        max
    }
}

impl FromIterator<Tag> for TagList {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self {
            tags: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(tag: &Tag) -> Tag {
        let mut pdu = PduData::new();
        tag.encode(&mut pdu).unwrap();
        Tag::decode(&mut pdu).unwrap()
    }

    #[test]
    fn test_application_tag_roundtrip() {
        let tag = Tag::application(ApplicationTag::Unsigned, vec![0x01, 0x2C]);
        assert_eq!(roundtrip(&tag), tag);
    }

    #[test]
    fn test_control_octet_layout() {
        let mut pdu = PduData::new();
        Tag::application(ApplicationTag::Unsigned, vec![0x2A])
            .encode(&mut pdu)
            .unwrap();
        assert_eq!(pdu.as_slice(), &[0x21, 0x2A]);

        let mut pdu = PduData::new();
        Tag::context(2, vec![0x2A]).encode(&mut pdu).unwrap();
        assert_eq!(pdu.as_slice(), &[0x29, 0x2A]);
    }

    #[test]
    fn test_boolean_value_in_lvt() {
        let mut pdu = PduData::new();
        Tag::boolean(true).encode(&mut pdu).unwrap();
        assert_eq!(pdu.as_slice(), &[0x11]);

        let decoded = Tag::decode(&mut pdu).unwrap();
        assert_eq!(decoded.lvt, 1);
        assert!(decoded.data.is_empty());

        let mut pdu = PduData::new();
        Tag::boolean(false).encode(&mut pdu).unwrap();
        assert_eq!(pdu.as_slice(), &[0x10]);
    }

    #[test]
    fn test_extended_tag_number() {
        let tag = Tag::context(33, vec![0x01]);
        let mut pdu = PduData::new();
        tag.encode(&mut pdu).unwrap();
        assert_eq!(pdu.as_slice(), &[0xF9, 33, 0x01]);
        assert_eq!(Tag::decode(&mut pdu).unwrap(), tag);
    }

    #[test]
    fn test_length_escape_boundaries() {
        // (length, expected header octets after the control octet)
        let cases: [(usize, Vec<u8>); 6] = [
            (4, vec![]),
            (5, vec![5]),
            (253, vec![253]),
            (254, vec![254, 0x00, 0xFE]),
            (65535, vec![254, 0xFF, 0xFF]),
            (65536, vec![255, 0x00, 0x01, 0x00, 0x00]),
        ];

        for (length, header) in cases {
            let tag = Tag::application(ApplicationTag::OctetString, vec![0xAA; length]);
            let mut pdu = PduData::new();
            tag.encode(&mut pdu).unwrap();

            let bytes = pdu.as_slice();
            let expected_control = if length < 5 { 0x60 | length as u8 } else { 0x65 };
            assert_eq!(bytes[0], expected_control, "length {}", length);
            assert_eq!(&bytes[1..1 + header.len()], &header[..], "length {}", length);

            assert_eq!(Tag::decode(&mut pdu).unwrap(), tag);
        }
    }

    #[test]
    fn test_opening_closing_octets() {
        let mut pdu = PduData::new();
        Tag::opening(3).encode(&mut pdu).unwrap();
        Tag::closing(3).encode(&mut pdu).unwrap();
        assert_eq!(pdu.as_slice(), &[0x3E, 0x3F]);

        let open = Tag::decode(&mut pdu).unwrap();
        assert_eq!(open.class, TagClass::Opening);
        assert_eq!(open.number, 3);
        assert_eq!(open.lvt, 0);

        let close = Tag::decode(&mut pdu).unwrap();
        assert_eq!(close.class, TagClass::Closing);
        assert_eq!(close.number, 3);
    }

    #[test]
    fn test_truncated_tag_fails() {
        // extended length promised but missing
        let mut pdu = PduData::from_slice(&[0x65]);
        assert_eq!(
            Tag::decode(&mut pdu).unwrap_err(),
            EncodingError::UnexpectedEndOfData
        );

        // payload shorter than the LVT
        let mut pdu = PduData::from_slice(&[0x22, 0x01]);
        assert_eq!(
            Tag::decode(&mut pdu).unwrap_err(),
            EncodingError::UnexpectedEndOfData
        );
    }

    #[test]
    fn test_app_to_context_and_back() {
        let tag = Tag::application(ApplicationTag::Unsigned, vec![0x01, 0x2C]);
        let ctx = tag.app_to_context(4).unwrap();
        assert_eq!(ctx.class, TagClass::Context);
        assert_eq!(ctx.number, 4);
        assert_eq!(ctx.data, vec![0x01, 0x2C]);

        let back = ctx.context_to_app(ApplicationTag::Unsigned).unwrap();
        assert_eq!(back, tag);
    }

    #[test]
    fn test_boolean_context_conversion() {
        let tag = Tag::boolean(true);
        let ctx = tag.app_to_context(0).unwrap();
        assert_eq!(ctx.data, vec![1]);
        assert_eq!(ctx.lvt, 1);

        let back = ctx.context_to_app(ApplicationTag::Boolean).unwrap();
        assert_eq!(back.lvt, 1);
        assert!(back.data.is_empty());
    }

    #[test]
    fn test_conversion_requires_matching_class() {
        let ctx = Tag::context(1, vec![0x01]);
        assert!(matches!(
            ctx.app_to_context(2),
            Err(EncodingError::TagMismatch(_))
        ));

        let app = Tag::application(ApplicationTag::Unsigned, vec![0x01]);
        assert!(matches!(
            app.context_to_app(ApplicationTag::Unsigned),
            Err(EncodingError::TagMismatch(_))
        ));
    }

    #[test]
    fn test_tag_list_roundtrip_and_depth() {
        let mut list = TagList::new();
        list.push(Tag::context(0, vec![0x01]));
        list.push(Tag::opening(1));
        list.push(Tag::application(ApplicationTag::Unsigned, vec![0x2A]));
        list.push(Tag::opening(2));
        list.push(Tag::boolean(true));
        list.push(Tag::closing(2));
        list.push(Tag::closing(1));

        let mut pdu = PduData::new();
        list.encode(&mut pdu).unwrap();
        let decoded = TagList::decode(&mut pdu).unwrap();
        assert_eq!(decoded, list);
        assert_eq!(decoded.nesting_depth(), 2);
    }

    #[test]
    fn test_unmatched_closing_fails_decode() {
        let mut pdu = PduData::from_slice(&[0x3F]);
        assert_eq!(
            TagList::decode(&mut pdu).unwrap_err(),
            EncodingError::UnbalancedTags
        );

        // opening without a matching closing
        let mut pdu = PduData::from_slice(&[0x3E, 0x21, 0x01]);
        assert_eq!(
            TagList::decode(&mut pdu).unwrap_err(),
            EncodingError::UnbalancedTags
        );
    }

    #[test]
    fn test_get_context_atomic() {
        let mut list = TagList::new();
        list.push(Tag::application(ApplicationTag::Unsigned, vec![0x01]));
        list.push(Tag::context(2, vec![0xAB]));

        match list.get_context(2).unwrap() {
            Some(ContextGroup::Atomic(tag)) => assert_eq!(tag.data, vec![0xAB]),
            other => panic!("expected atomic context tag, got {:?}", other),
        }
        assert_eq!(list.get_context(7).unwrap(), None);
    }

    #[test]
    fn test_get_context_constructed() {
        let mut list = TagList::new();
        list.push(Tag::opening(3));
        list.push(Tag::application(ApplicationTag::Unsigned, vec![0x01]));
        list.push(Tag::application(ApplicationTag::Unsigned, vec![0x02]));
        list.push(Tag::closing(3));

        match list.get_context(3).unwrap() {
            Some(ContextGroup::Constructed(group)) => assert_eq!(group.len(), 2),
            other => panic!("expected constructed group, got {:?}", other),
        }
    }

    #[test]
    fn test_get_context_unbalanced_group() {
        let mut list = TagList::new();
        list.push(Tag::opening(3));
        list.push(Tag::application(ApplicationTag::Unsigned, vec![0x01]));

        assert_eq!(
            list.get_context(3).unwrap_err(),
            EncodingError::UnbalancedTags
        );
    }
}
