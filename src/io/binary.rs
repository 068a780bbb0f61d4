//! Bounds-checked scalar and array I/O over flat byte buffers
//!
//! Every call follows the same truncation policy: when `offset + size`
//! exceeds the buffer length the call does nothing, leaving both the
//! value and the offset untouched. Values are copied in host byte order,
//! so both ends of an exchange must share endianness.

use std::ops::Range;

/// Fixed-width value that can be copied to and from raw bytes
pub trait Scalar: Copy {
    /// Encoded width in bytes
    const SIZE: usize;

    /// Decode from exactly `SIZE` bytes
    fn from_ne_slice(bytes: &[u8]) -> Self;

    /// Encode into exactly `SIZE` bytes
    fn write_ne_slice(self, out: &mut [u8]);
}

macro_rules! impl_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl Scalar for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                #[inline]
                fn from_ne_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(bytes);
                    <$t>::from_ne_bytes(raw)
                }

                #[inline]
                fn write_ne_slice(self, out: &mut [u8]) {
                    out.copy_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Scalar for bool {
    const SIZE: usize = 1;

    #[inline]
    fn from_ne_slice(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    #[inline]
    fn write_ne_slice(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }
}

/// Record with a fixed byte layout
///
/// Implementors check the whole record size up front so a short buffer
/// never yields a half-updated record.
pub trait BinaryRecord {
    /// Encoded size of the record in bytes
    fn total_data_size(&self) -> usize;

    /// Update the record from `data` starting at `offset`
    fn init_from_data(&mut self, data: &[u8], offset: &mut usize);

    /// Encode the record into `data` starting at `offset`
    fn write_to_data(&self, data: &mut [u8], offset: &mut usize);

    /// Encode the record into a freshly allocated buffer
    fn to_bytes(&self) -> Vec<u8> {
        let mut data = vec![0u8; self.total_data_size()];
        let mut offset = 0;
        self.write_to_data(&mut data, &mut offset);
        data
    }
}

#[inline]
fn span(offset: usize, len: usize, size: usize) -> Option<Range<usize>> {
    let end = offset.checked_add(len)?;
    (end <= size).then_some(offset..end)
}

/// Read one value, returns false if the buffer is too short
pub fn read<T: Scalar>(value: &mut T, data: &[u8], offset: &mut usize) -> bool {
    match span(*offset, T::SIZE, data.len()) {
        Some(range) => {
            *value = T::from_ne_slice(&data[range.clone()]);
            *offset = range.end;
            true
        }
        None => false,
    }
}

/// Read one value and clamp it into `[min, max]`
///
/// The clamp only applies when bytes were actually copied.
pub fn read_clamped<T: Scalar + PartialOrd>(
    value: &mut T,
    data: &[u8],
    offset: &mut usize,
    min: T,
    max: T,
) -> bool {
    if !read(value, data, offset) {
        return false;
    }
    if *value < min {
        *value = min;
    } else if *value > max {
        *value = max;
    }
    true
}

/// Read one value, falling back to `T::default()` on truncation
pub fn read_value<T: Scalar + Default>(data: &[u8], offset: &mut usize) -> T {
    let mut value = T::default();
    read(&mut value, data, offset);
    value
}

/// Fill `values` from `data`, all or nothing
pub fn read_array<T: Scalar>(values: &mut [T], data: &[u8], offset: &mut usize) -> bool {
    let Some(len) = T::SIZE.checked_mul(values.len()) else {
        return false;
    };
    let Some(range) = span(*offset, len, data.len()) else {
        return false;
    };
    for (value, chunk) in values.iter_mut().zip(data[range.clone()].chunks_exact(T::SIZE)) {
        *value = T::from_ne_slice(chunk);
    }
    *offset = range.end;
    true
}

/// Write one value, returns false if the buffer is too short
pub fn write<T: Scalar>(value: T, data: &mut [u8], offset: &mut usize) -> bool {
    match span(*offset, T::SIZE, data.len()) {
        Some(range) => {
            value.write_ne_slice(&mut data[range.clone()]);
            *offset = range.end;
            true
        }
        None => false,
    }
}

/// Write all of `values` into `data`, all or nothing
pub fn write_array<T: Scalar>(values: &[T], data: &mut [u8], offset: &mut usize) -> bool {
    let Some(len) = T::SIZE.checked_mul(values.len()) else {
        return false;
    };
    let Some(range) = span(*offset, len, data.len()) else {
        return false;
    };
    for (value, chunk) in values.iter().zip(data[range.clone()].chunks_exact_mut(T::SIZE)) {
        value.write_ne_slice(chunk);
    }
    *offset = range.end;
    true
}
