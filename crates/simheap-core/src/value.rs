//! Fixed-size value types stored in heap fields and array elements.
//!
//! Every value type has a fixed little-endian byte encoding described by
//! the [`HeapValue`] trait. The encodings are part of the snapshot wire
//! format, so they must never change for an existing [`ValueType`].

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::field::ValueType;

/// A value that can live in a heap field or array element.
///
/// `store` and `load` operate on a slice of exactly
/// `Self::VALUE_TYPE.size()` bytes.
///
/// # Panics
///
/// Both methods panic if the slice is shorter than the encoded size.
/// The heap always hands them a correctly sized slice.
pub trait HeapValue: Copy + PartialEq + fmt::Debug {
    /// The semantic tag this Rust type corresponds to.
    const VALUE_TYPE: ValueType;

    /// Encode `self` into `out` (little-endian).
    fn store(&self, out: &mut [u8]);

    /// Decode a value from `bytes` (little-endian).
    fn load(bytes: &[u8]) -> Self;
}

#[inline]
fn take<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&bytes[at..at + N]);
    buf
}

#[inline]
fn load_i32(bytes: &[u8], at: usize) -> i32 {
    i32::from_le_bytes(take(bytes, at))
}

#[inline]
fn store_i32(out: &mut [u8], at: usize, v: i32) {
    out[at..at + 4].copy_from_slice(&v.to_le_bytes());
}

impl HeapValue for u8 {
    const VALUE_TYPE: ValueType = ValueType::Byte;

    fn store(&self, out: &mut [u8]) {
        out[0] = *self;
    }

    fn load(bytes: &[u8]) -> Self {
        bytes[0]
    }
}

impl HeapValue for i16 {
    const VALUE_TYPE: ValueType = ValueType::Short;

    fn store(&self, out: &mut [u8]) {
        out[..2].copy_from_slice(&self.to_le_bytes());
    }

    fn load(bytes: &[u8]) -> Self {
        i16::from_le_bytes(take(bytes, 0))
    }
}

impl HeapValue for i32 {
    const VALUE_TYPE: ValueType = ValueType::Int;

    fn store(&self, out: &mut [u8]) {
        store_i32(out, 0, *self);
    }

    fn load(bytes: &[u8]) -> Self {
        load_i32(bytes, 0)
    }
}

impl HeapValue for i64 {
    const VALUE_TYPE: ValueType = ValueType::Long;

    fn store(&self, out: &mut [u8]) {
        out[..8].copy_from_slice(&self.to_le_bytes());
    }

    fn load(bytes: &[u8]) -> Self {
        i64::from_le_bytes(take(bytes, 0))
    }
}

// ── Fixed-point number ──────────────────────────────────────────

/// Deterministic fixed-point number.
///
/// Stored as a signed 32-bit raw value with [`Num::FRACTION_BITS`]
/// fractional bits. All arithmetic is integer arithmetic, so results are
/// bit-identical on every machine in a lockstep session. Addition,
/// subtraction and negation wrap on overflow. Multiplication and division
/// compute in 64 bits and keep the low 32 bits of the result, so they
/// also wrap rather than saturate. Division by zero panics, like integer
/// division.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Num(i32);

impl Num {
    /// Number of fractional bits in the raw representation.
    pub const FRACTION_BITS: u32 = 10;

    /// Raw value of `1`.
    const ONE_RAW: i32 = 1 << Self::FRACTION_BITS;

    /// Zero.
    pub const ZERO: Num = Num(0);

    /// One.
    pub const ONE: Num = Num(Self::ONE_RAW);

    /// Build from a raw fixed-point value.
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// The raw fixed-point value.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Build from an integer.
    pub const fn from_int(v: i32) -> Self {
        Self(v.wrapping_mul(Self::ONE_RAW))
    }

    /// Round toward negative infinity.
    pub const fn floor(self) -> i32 {
        self.0 >> Self::FRACTION_BITS
    }

    /// Approximate value as `f64`, for display and diagnostics only.
    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / f64::from(Self::ONE_RAW)
    }
}

impl From<i32> for Num {
    fn from(v: i32) -> Self {
        Self::from_int(v)
    }
}

impl Add for Num {
    type Output = Num;

    fn add(self, rhs: Num) -> Num {
        Num(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for Num {
    type Output = Num;

    fn sub(self, rhs: Num) -> Num {
        Num(self.0.wrapping_sub(rhs.0))
    }
}

impl Neg for Num {
    type Output = Num;

    fn neg(self) -> Num {
        Num(self.0.wrapping_neg())
    }
}

impl Mul for Num {
    type Output = Num;

    fn mul(self, rhs: Num) -> Num {
        Num(((i64::from(self.0) * i64::from(rhs.0)) >> Self::FRACTION_BITS) as i32)
    }
}

impl Div for Num {
    type Output = Num;

    /// # Panics
    ///
    /// Panics on division by zero, like integer division.
    fn div(self, rhs: Num) -> Num {
        Num(((i64::from(self.0) << Self::FRACTION_BITS) / i64::from(rhs.0)) as i32)
    }
}

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}

impl HeapValue for Num {
    const VALUE_TYPE: ValueType = ValueType::Num;

    fn store(&self, out: &mut [u8]) {
        store_i32(out, 0, self.0);
    }

    fn load(bytes: &[u8]) -> Self {
        Num(load_i32(bytes, 0))
    }
}

// ── Vectors and rectangles ──────────────────────────────────────

/// Two-dimensional integer vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntVector {
    /// X component.
    pub x: i32,
    /// Y component.
    pub y: i32,
}

impl IntVector {
    /// Build a vector from its components.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl HeapValue for IntVector {
    const VALUE_TYPE: ValueType = ValueType::IntVector;

    fn store(&self, out: &mut [u8]) {
        store_i32(out, 0, self.x);
        store_i32(out, 4, self.y);
    }

    fn load(bytes: &[u8]) -> Self {
        Self::new(load_i32(bytes, 0), load_i32(bytes, 4))
    }
}

/// Two-dimensional fixed-point vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NumVector {
    /// X component.
    pub x: Num,
    /// Y component.
    pub y: Num,
}

impl NumVector {
    /// Build a vector from its components.
    pub const fn new(x: Num, y: Num) -> Self {
        Self { x, y }
    }
}

impl HeapValue for NumVector {
    const VALUE_TYPE: ValueType = ValueType::NumVector;

    fn store(&self, out: &mut [u8]) {
        store_i32(out, 0, self.x.raw());
        store_i32(out, 4, self.y.raw());
    }

    fn load(bytes: &[u8]) -> Self {
        Self::new(
            Num::from_raw(load_i32(bytes, 0)),
            Num::from_raw(load_i32(bytes, 4)),
        )
    }
}

/// Integer rectangle given by its top-left corner and size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: i32,
    /// Height.
    pub height: i32,
}

impl IntRect {
    /// Build a rectangle from its corner and size.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl HeapValue for IntRect {
    const VALUE_TYPE: ValueType = ValueType::IntRect;

    fn store(&self, out: &mut [u8]) {
        store_i32(out, 0, self.x);
        store_i32(out, 4, self.y);
        store_i32(out, 8, self.width);
        store_i32(out, 12, self.height);
    }

    fn load(bytes: &[u8]) -> Self {
        Self::new(
            load_i32(bytes, 0),
            load_i32(bytes, 4),
            load_i32(bytes, 8),
            load_i32(bytes, 12),
        )
    }
}

/// Fixed-point rectangle given by its top-left corner and size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NumRect {
    /// Left edge.
    pub x: Num,
    /// Top edge.
    pub y: Num,
    /// Width.
    pub width: Num,
    /// Height.
    pub height: Num,
}

impl NumRect {
    /// Build a rectangle from its corner and size.
    pub const fn new(x: Num, y: Num, width: Num, height: Num) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl HeapValue for NumRect {
    const VALUE_TYPE: ValueType = ValueType::NumRect;

    fn store(&self, out: &mut [u8]) {
        store_i32(out, 0, self.x.raw());
        store_i32(out, 4, self.y.raw());
        store_i32(out, 8, self.width.raw());
        store_i32(out, 12, self.height.raw());
    }

    fn load(bytes: &[u8]) -> Self {
        Self::new(
            Num::from_raw(load_i32(bytes, 0)),
            Num::from_raw(load_i32(bytes, 4)),
            Num::from_raw(load_i32(bytes, 8)),
            Num::from_raw(load_i32(bytes, 12)),
        )
    }
}
