//! Bit-field registers.
//!
//! A register is a 32 bit value made of named, non-overlapping bit ranges. Each
//! register type is generated by [`define_register!`] from a static field table; the
//! fields are associated constants of the register, so naming a field which does not
//! exist, or which belongs to another register, fails to compile.

use std::fmt;
use std::marker::PhantomData;

/// A contiguous range of bits inside the register `R`.
pub struct Field<R> {
    name: &'static str,
    offset: u8,
    width: u8,
    _register: PhantomData<fn() -> R>,
}

impl<R> Field<R> {
    pub const fn new(name: &'static str, offset: u8, width: u8) -> Self {
        Self {
            name,
            offset,
            width,
            _register: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn offset(&self) -> u8 {
        self.offset
    }

    pub const fn width(&self) -> u8 {
        self.width
    }

    /// The right aligned mask covering `width` bits.
    pub const fn mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    /// Extracts and right aligns the field from a raw register value.
    pub const fn extract(&self, raw: u32) -> u32 {
        (raw >> self.offset) & self.mask()
    }

    /// Replaces the field in `raw` with `value`, truncated to the field width.
    ///
    /// All bits outside the field are preserved.
    pub const fn insert(&self, raw: u32, value: u32) -> u32 {
        let mask = self.mask();
        (raw & !(mask << self.offset)) | ((value & mask) << self.offset)
    }
}

impl<R> Clone for Field<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Field<R> {}

impl<R> PartialEq for Field<R> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.width == other.width
    }
}

impl<R> Eq for Field<R> {}

impl<R> fmt::Debug for Field<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}:{}]",
            self.name,
            u32::from(self.offset) + u32::from(self.width) - 1,
            self.offset
        )
    }
}

/// Checks that every field is non-empty, fits into 32 bits and overlaps no other field.
///
/// Evaluated at compile time for every register generated by [`define_register!`].
pub const fn fields_valid<R>(fields: &[Field<R>]) -> bool {
    let mut used: u64 = 0;
    let mut i = 0;

    while i < fields.len() {
        let field = &fields[i];
        if field.width == 0 || field.offset as u32 + field.width as u32 > 32 {
            return false;
        }

        let bits = (field.mask() as u64) << field.offset;
        if used & bits != 0 {
            return false;
        }

        used |= bits;
        i += 1;
    }

    true
}

/// A value a field can be read as or written from.
pub trait FieldValue: Copy {
    /// Converts the right aligned field bits.
    fn from_bits(bits: u32) -> Self;

    fn into_bits(self) -> u32;
}

impl FieldValue for bool {
    fn from_bits(bits: u32) -> Self {
        bits != 0
    }

    fn into_bits(self) -> u32 {
        u32::from(self)
    }
}

impl FieldValue for u8 {
    fn from_bits(bits: u32) -> Self {
        bits as u8
    }

    fn into_bits(self) -> u32 {
        u32::from(self)
    }
}

impl FieldValue for u16 {
    fn from_bits(bits: u32) -> Self {
        bits as u16
    }

    fn into_bits(self) -> u32 {
        u32::from(self)
    }
}

impl FieldValue for u32 {
    fn from_bits(bits: u32) -> Self {
        bits
    }

    fn into_bits(self) -> u32 {
        self
    }
}

/// A fixed width register value with named fields.
pub trait BitRegister: Copy + Eq + fmt::Debug + Sized + 'static {
    const NAME: &'static str;

    /// The field layout, in declaration order.
    const FIELDS: &'static [Field<Self>];

    fn from_raw(raw: u32) -> Self;

    /// The raw value, as it is sent to or received from the target.
    fn raw(&self) -> u32;

    /// Reads a single field, right aligned.
    fn read(&self, field: Field<Self>) -> u32 {
        field.extract(self.raw())
    }

    /// Returns a copy with `field` replaced by `value`, truncated to the field width.
    fn with(self, field: Field<Self>, value: u32) -> Self {
        Self::from_raw(field.insert(self.raw(), value))
    }

    /// Builds a value from `base` with the given fields replaced.
    ///
    /// Bits not covered by an overridden field are taken from `base`. If a field is
    /// given more than once, the last value wins.
    fn derive(base: Self, overrides: &[(Field<Self>, u32)]) -> Self {
        overrides
            .iter()
            .fold(base, |register, &(field, value)| register.with(field, value))
    }
}

/// Defines a new bit-field register type.
///
/// Takes
/// - the name of the constructed type, optionally preceded by doc comments,
/// - a list of fields as `NAME: type = offset, width;`, where `type` implements
///   [`FieldValue`].
///
/// For every field the register gets an associated [`Field`] constant `NAME`, a getter
/// `name()` and a builder `with_name(value)`.
macro_rules! define_register {
    (
        $(#[$outer:meta])*
        $name:ident {
            $(
                $(#[$inner:meta])*
                $field:ident: $type:ty = $offset:literal, $width:literal;
            )*
        }
    ) => {
        $(#[$outer])*
        #[derive(Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(u32);

        paste::paste! {
            impl $name {
                $(
                    $(#[$inner])*
                    pub const $field: $crate::architecture::arm::Field<$name> =
                        $crate::architecture::arm::Field::new(stringify!($field), $offset, $width);
                )*

                $(
                    $(#[$inner])*
                    pub fn [<$field:lower>](&self) -> $type {
                        <$type as $crate::architecture::arm::FieldValue>::from_bits(
                            <Self as $crate::architecture::arm::BitRegister>::read(self, Self::$field),
                        )
                    }

                    #[doc = concat!("Returns a copy with `", stringify!($field), "` replaced by `value`.")]
                    pub fn [<with_ $field:lower>](self, value: $type) -> Self {
                        <Self as $crate::architecture::arm::BitRegister>::with(
                            self,
                            Self::$field,
                            $crate::architecture::arm::FieldValue::into_bits(value),
                        )
                    }
                )*
            }
        }

        impl $crate::architecture::arm::BitRegister for $name {
            const NAME: &'static str = stringify!($name);
            const FIELDS: &'static [$crate::architecture::arm::Field<Self>] = &[$(Self::$field),*];

            fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            fn raw(&self) -> u32 {
                self.0
            }
        }

        static_assertions::const_assert!(
            $crate::architecture::arm::register_generation::fields_valid(
                <$name as $crate::architecture::arm::BitRegister>::FIELDS
            )
        );

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u32 {
            fn from(register: $name) -> u32 {
                register.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let mut s = f.debug_struct(stringify!($name));
                s.field("raw", &format_args!("{:#010x}", self.0));
                for field in <Self as $crate::architecture::arm::BitRegister>::FIELDS {
                    s.field(
                        field.name(),
                        &format_args!("{:#x}", field.extract(self.0)),
                    );
                }
                s.finish()
            }
        }
    };
}
