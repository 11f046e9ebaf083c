use crate::{Error, Result};

mod sealed {
    pub trait Sealed {}
}

/// Unsigned integers that can be decoded from big-endian (network order) bytes.
pub trait BigEndian: Copy + sealed::Sealed {
    /// Number of bytes making up a value.
    const SIZE: usize;

    /// Decode from exactly [Self::SIZE] bytes.
    fn from_be_slice(buf: &[u8]) -> Self;
}

macro_rules! impl_big_endian {
    ($($ty:ty),*) => {
        $(
            impl sealed::Sealed for $ty {}

            impl BigEndian for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_be_slice(buf: &[u8]) -> Self {
                    let mut arr = [0u8; std::mem::size_of::<$ty>()];
                    arr.copy_from_slice(buf);
                    <$ty>::from_be_bytes(arr)
                }
            }
        )*
    };
}

impl_big_endian!(u8, u16, u32, u64);

/// Read a big-endian `T` located at `offset` in `buf`.
///
/// # Errors
/// [Error::NotEnoughData] if `buf` does not contain `T::SIZE` bytes at `offset`.
pub fn read_be<T: BigEndian>(buf: &[u8], offset: usize) -> Result<T> {
    let end = offset.saturating_add(T::SIZE);
    match buf.get(offset..end) {
        Some(dat) => Ok(T::from_be_slice(dat)),
        None => Err(Error::NotEnoughData {
            actual: buf.len(),
            minimum: end,
        }),
    }
}

/// FieldReader reads a sequence of big-endian fields from a buffer, keeping track of
/// the position of the next field.
///
/// Nothing is copied; the reader only borrows the buffer.
///
/// # Example
/// ```
/// use ccsds_telemetry::bytes::FieldReader;
///
/// let dat: &[u8] = &[0x00, 0x01, 0x00, 0x05, 0x00, 0x05, 0x80];
/// let mut reader = FieldReader::new(dat).unwrap();
/// assert_eq!(reader.read::<u16>().unwrap(), 1);
/// assert_eq!(reader.read::<u32>().unwrap(), 0x0005_0005);
/// assert_eq!(reader.read::<u8>().unwrap(), 0x80);
/// assert_eq!(reader.current_offset(), 7);
/// ```
#[derive(Debug, Clone)]
pub struct FieldReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    /// # Errors
    /// [Error::InvalidArgument] if `buf` is empty.
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        if buf.is_empty() {
            return Err(Error::InvalidArgument(
                "the buffer containing the fields cannot be empty",
            ));
        }
        Ok(FieldReader { buf, offset: 0 })
    }

    /// Read the next field and advance past it.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if fewer than `T::SIZE` bytes remain. The position is not
    /// advanced in that case.
    pub fn read<T: BigEndian>(&mut self) -> Result<T> {
        let val = read_be::<T>(self.buf, self.offset)?;
        self.offset += T::SIZE;
        Ok(val)
    }

    /// Advance past `num` bytes without decoding them.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if fewer than `num` bytes remain.
    pub fn skip(&mut self, num: usize) -> Result<()> {
        let end = self.offset.saturating_add(num);
        if end > self.buf.len() {
            return Err(Error::NotEnoughData {
                actual: self.buf.len(),
                minimum: end,
            });
        }
        self.offset = end;
        Ok(())
    }

    /// Offset of the next field relative to the start of the buffer.
    #[must_use]
    pub fn current_offset(&self) -> usize {
        self.offset
    }

    /// Number of bytes not yet read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }
}
