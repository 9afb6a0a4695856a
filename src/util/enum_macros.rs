/// Generates an extensible protocol enumeration with named values, a vendor
/// (proprietary) range, and reserved values outside that range.
///
/// BACnet enumerations are open-ended: the standard names a set of values,
/// vendors may allocate values inside a designated proprietary range, and
/// everything else is reserved for future revisions of the standard. The
/// generated enum keeps all three kinds representable so decoding never has
/// to reject an unknown value.
///
/// # Arguments
///
/// * `$name:ident` - The name of the enum to be generated.
/// * `$variant:ident = $value:expr` - A comma-separated list of named enum
///   variants and their corresponding integer values.
/// * `$vendor_range:expr` - An expression representing the vendor-proprietary
///   range (e.g. `128..=1023`). Values within this range that are not
///   explicitly named are represented by the `Vendor` variant; values outside
///   it fall into `Reserved`.
///
/// # Example
///
/// ```rust
/// use bacstack::extensible_enum;
/// use bacstack::primitive::Enumeration;
///
/// extensible_enum! {
///     MyEnum {
///         VariantA = 1,
///         VariantB = 2,
///         VariantC = 100,
///     },
///     1000..=2000
/// }
///
/// let a = MyEnum::VariantA;
/// let vendor_val = MyEnum::from(1500u32);
/// let reserved_val = MyEnum::from(3000u32);
///
/// assert_eq!(u32::from(a), 1);
/// assert_eq!(format!("{}", a), "VariantA");
/// assert_eq!(MyEnum::from(100u32), MyEnum::VariantC);
/// if let MyEnum::Vendor(value) = vendor_val {
///     assert_eq!(value.value(), 1500);
/// } else {
///     panic!("Expected MyEnum::Vendor");
/// }
/// if let MyEnum::Reserved(value) = reserved_val {
///     assert_eq!(value.value(), 3000);
/// } else {
///     panic!("Expected MyEnum::Reserved");
/// }
/// assert_eq!(MyEnum::from_name("VariantB"), Some(MyEnum::VariantB));
/// assert_eq!(a.name(), Some("VariantA"));
/// ```
///
/// # Generated Code Structure
///
/// The macro generates an enum with the following variants:
///
/// * `$(variant:ident),*` - The named variants provided by the user.
/// * `Vendor([<$name Value>])` - Values within the vendor range without a name.
/// * `Reserved([<$name Value>])` - Unnamed values outside the vendor range.
///
/// It also implements:
///
/// * `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash` for the enum.
/// * `core::fmt::Display` - named variants display their name, the open
///   variants display as `Vendor(value)` / `Reserved(value)`.
/// * `From<$name> for u32` and `From<u32> for $name` (total in both
///   directions, so decoding an unknown wire value cannot fail).
/// * [`Enumeration`](crate::primitive::Enumeration), the bidirectional
///   name/value table consulted by the enumerated tag codec.
#[macro_export]
macro_rules! extensible_enum {
    ($(#[$doc:meta])* $name:ident { $($variant:ident = $value:expr,)+ }, $vendor_range:expr) => {
        pastey::paste! {
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub enum $name {
                $($variant,)*
                Vendor( [<$name Value>] ),
                Reserved( [<$name Value>] ),
            }

            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct [<$name Value>] { value: u32 }

            impl [<$name Value>] {
                fn new(value: u32) -> Self {
                    Self { value }
                }

                pub fn value(&self) -> u32 {
                    self.value
                }
            }

            impl core::fmt::Display for $name {
                fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                    match self {
                        $($name::$variant => write!(f, "{}", stringify!($variant)),)*
                        $name::Vendor( value ) => write!(f, "Vendor({})", value.value()),
                        $name::Reserved( value ) => write!(f, "Reserved({})", value.value()),
                    }
                }
            }

            impl From<$name> for u32 {
                fn from(value: $name) -> Self {
                    match value {
                        $($name::$variant => $value,)*
                        $name::Vendor( value ) => value.value(),
                        $name::Reserved( value ) => value.value(),
                    }
                }
            }

            impl From<u32> for $name {
                fn from(value: u32) -> Self {
                    match value {
                        $($value => $name::$variant,)*
                        v if ($vendor_range).contains(&v) => {
                            $name::Vendor( [<$name Value>]::new(v) )
                        }
                        v => {
                            $name::Reserved( [<$name Value>]::new(v) )
                        }
                    }
                }
            }

            impl $crate::primitive::Enumeration for $name {
                fn to_value(self) -> u32 {
                    self.into()
                }

                fn from_value(value: u32) -> Self {
                    value.into()
                }

                fn from_name(name: &str) -> Option<Self> {
                    match name {
                        $(stringify!($variant) => Some($name::$variant),)*
                        _ => None,
                    }
                }

                fn name(self) -> Option<&'static str> {
                    match self {
                        $($name::$variant => Some(stringify!($variant)),)*
                        _ => None,
                    }
                }
            }
        }
    };
}
