use crate::error::{self, CodeError, MalformedCode};

/// A component of a `Code` attribute that can be read from and written to its byte form.
pub trait CodeItem {
    /// Read this item from a code stream.
    fn read_from_stream(s: &mut CodeStream<'_>) -> error::Result<Self>
    where
        Self: std::marker::Sized;

    /// Write this item to a code writer.
    fn write_to_stream(&self, w: &mut CodeWriter);
}

/// A big-endian cursor over a borrowed byte buffer.
///
/// Reads past the end fail with [`MalformedCode::Truncated`], reported at the
/// most recent [mark](CodeStream::mark) so callers see the offset of the item
/// being read rather than the byte that ran out.
#[derive(Debug, Clone)]
pub struct CodeStream<'a> {
    data: &'a [u8],
    position: usize,
    mark: usize,
}

impl<'a> CodeStream<'a> {
    /// Create a new stream at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            mark: 0,
        }
    }

    /// Create a stream positioned at `position`.
    pub fn at(data: &'a [u8], position: usize) -> Self {
        Self {
            data,
            position,
            mark: position,
        }
    }

    /// The current read position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether every byte has been consumed.
    pub fn ended(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Remember the current position as the offset reported by truncation errors.
    pub fn mark(&mut self) {
        self.mark = self.position;
    }

    /// The offset recorded by the last [mark](CodeStream::mark).
    pub fn marked(&self) -> usize {
        self.mark
    }

    /// Move the cursor to an absolute position.
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Read a sequence of `length` `T`s from this stream.
    pub fn read_sequence<T: CodeItem>(&mut self, length: usize) -> error::Result<Vec<T>> {
        let mut v = Vec::with_capacity(length.min(self.data.len()));
        for _ in 0..length {
            v.push(T::read_from_stream(self)?);
        }
        Ok(v)
    }

    /// Read an unsigned 4-byte integer from the stream.
    pub fn read_u4(&mut self) -> error::Result<u32> {
        Ok(u32::from_be_bytes(self.read::<4>()?))
    }

    /// Read an unsigned 2-byte integer from the stream.
    pub fn read_u2(&mut self) -> error::Result<u16> {
        Ok(u16::from_be_bytes(self.read::<2>()?))
    }

    /// Read an unsigned byte from the stream.
    pub fn read_u1(&mut self) -> error::Result<u8> {
        Ok(self.read::<1>()?[0])
    }

    pub fn read_i4(&mut self) -> error::Result<i32> {
        Ok(i32::from_be_bytes(self.read::<4>()?))
    }

    pub fn read_i2(&mut self) -> error::Result<i16> {
        Ok(i16::from_be_bytes(self.read::<2>()?))
    }

    pub fn read_i1(&mut self) -> error::Result<i8> {
        Ok(self.read_u1()? as i8)
    }

    /// Utility method to read `S` bytes from the stream.
    pub fn read<const S: usize>(&mut self) -> error::Result<[u8; S]> {
        let mut w = [0; S];
        w.copy_from_slice(self.take(S)?);
        Ok(w)
    }

    /// Utility method to read `l` bytes from the stream with runtime length.
    pub fn read_dynamic(&mut self, l: usize) -> error::Result<&'a [u8]> {
        self.take(l)
    }

    /// Skip `l` bytes.
    pub fn skip(&mut self, l: usize) -> error::Result<()> {
        self.take(l).map(|_| ())
    }

    fn take(&mut self, l: usize) -> error::Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(l)
            .filter(|end| *end <= self.data.len())
            .ok_or(CodeError::malformed(self.mark, MalformedCode::Truncated))?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }
}

/// A growable big-endian byte writer with back-patching of reserved slots.
#[derive(Debug, Clone, Default)]
pub struct CodeWriter {
    bytes: Vec<u8>,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The offset the next byte will be written at.
    pub fn position(&self) -> usize {
        self.bytes.len()
    }

    pub fn write_u1(&mut self, v: u8) {
        self.bytes.push(v);
    }

    pub fn write_u2(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u4(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i2(&mut self, v: i16) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i4(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_bytes(&mut self, b: &[u8]) {
        self.bytes.extend_from_slice(b);
    }

    /// Write every item of a sequence in order.
    pub fn write_sequence<T: CodeItem>(&mut self, items: &[T]) {
        for item in items {
            item.write_to_stream(self);
        }
    }

    /// Overwrite two bytes previously written at `at`.
    pub fn patch_u2(&mut self, at: usize, v: u16) {
        self.bytes[at..at + 2].copy_from_slice(&v.to_be_bytes());
    }

    /// Overwrite four bytes previously written at `at`.
    pub fn patch_u4(&mut self, at: usize, v: u32) {
        self.bytes[at..at + 4].copy_from_slice(&v.to_be_bytes());
    }

    /// Drop every byte written at or after `position`.
    pub fn truncate(&mut self, position: usize) {
        self.bytes.truncate(position);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl CodeItem for u8 {
    fn read_from_stream(s: &mut CodeStream<'_>) -> error::Result<Self> {
        s.read_u1()
    }

    fn write_to_stream(&self, w: &mut CodeWriter) {
        w.write_u1(*self)
    }
}

impl CodeItem for u16 {
    fn read_from_stream(s: &mut CodeStream<'_>) -> error::Result<Self> {
        s.read_u2()
    }

    fn write_to_stream(&self, w: &mut CodeWriter) {
        w.write_u2(*self)
    }
}

impl CodeItem for u32 {
    fn read_from_stream(s: &mut CodeStream<'_>) -> error::Result<Self> {
        s.read_u4()
    }

    fn write_to_stream(&self, w: &mut CodeWriter) {
        w.write_u4(*self)
    }
}
