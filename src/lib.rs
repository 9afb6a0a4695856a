#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

pub mod comm;
pub mod encoding;
pub mod object;
pub mod pdu;
pub mod primitive;
pub mod service;
pub mod util;

// Re-export main types without glob imports to avoid conflicts
pub use comm::{bind, BindingRegistry, Client, CommError, Server};
pub use encoding::{ApplicationTag, EncodingError, Tag, TagList};
pub use object::{GenericObject, ObjectError, PropertyIdentifier, SchemaRegistry};
pub use pdu::{Address, AddressError, Pdu, PduData};
pub use primitive::{ObjectIdentifier, ObjectType, Value};
pub use service::{Confirmation, ConfirmedServiceChoice, ServiceError};

#[cfg(feature = "std")]
extern crate std;

#[cfg(not(feature = "std"))]
extern crate alloc;

pub const BACNET_PROTOCOL_VERSION: u8 = 1;
pub const BACNET_MAX_APDU: usize = 1476;
pub const BACNET_MAX_MPDU: usize = 1497;
