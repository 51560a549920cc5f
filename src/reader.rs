//! Incremental, delimiter-aware reads from file descriptors.
//!
//! Every descriptor number gets one buffer that lives as long as the process.
//! The unconsumed window is `[pos, fill)`; bytes before `pos` were handed out
//! by an earlier field and are never delivered twice.

use std::fs::File;
use std::io::{self, ErrorKind, Read};

use crate::error::SqError;
use crate::marker::{DescriptorSpec, is_space};

/// Growth step of a descriptor buffer.
pub const BLOCK: usize = 8192;

/// Buffered state of one descriptor.
pub struct DescriptorBuffer {
    source: Box<dyn Read>,
    buf: Vec<u8>,
    pos: usize,
    fill: usize,
    inc: usize,
    eof: bool,
}

impl DescriptorBuffer {
    #[must_use]
    pub fn new(source: Box<dyn Read>) -> Self {
        Self {
            source,
            buf: Vec::new(),
            pos: 0,
            fill: 0,
            inc: 0,
            eof: false,
        }
    }

    /// Bytes read from the descriptor but not yet handed out.
    #[cfg(test)]
    fn pending(&self) -> &[u8] {
        &self.buf[self.pos..self.fill]
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.buf.len()
    }

    #[cfg(test)]
    fn at_eof(&self) -> bool {
        self.eof
    }

    /// Make room behind `fill`, compacting first and growing only when the
    /// whole allocation is unconsumed data.
    fn make_room(&mut self, fd: usize) -> Result<(), SqError> {
        if self.fill < self.buf.len() {
            return Ok(());
        }
        if self.pos > 0 {
            self.buf.copy_within(self.pos..self.fill, 0);
            self.fill -= self.pos;
            self.pos = 0;
            return Ok(());
        }

        let overrun =
            || SqError::ResourceExhausted(format!("internal counter overrun reading fd {fd}"));
        self.inc = self.inc.checked_add(BLOCK).ok_or_else(overrun)?;
        let len = self.buf.len().checked_add(self.inc).ok_or_else(overrun)?;
        self.buf
            .try_reserve_exact(len - self.buf.len())
            .map_err(|_| SqError::ResourceExhausted(format!("out of memory reading fd {fd}")))?;
        self.buf.resize(len, 0);
        Ok(())
    }

    /// Read once more from the source. Returns the number of new bytes,
    /// `0` meaning EOF.
    fn fill_more(&mut self, fd: usize) -> Result<usize, SqError> {
        self.make_room(fd)?;
        loop {
            match self.source.read(&mut self.buf[self.fill..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(0);
                }
                Ok(got) => {
                    self.fill += got;
                    return Ok(got);
                }
                Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {}
                Err(e) => return Err(SqError::io(format!("read error from fd {fd}"), e)),
            }
        }
    }

    /// Cut the next field out of the stream.
    ///
    /// `None` means nothing is left: EOF was hit with no byte and no
    /// terminator available for this field.
    ///
    /// # Errors
    ///
    /// Returns `SqError::Io` on a read failure and
    /// `SqError::ResourceExhausted` if the buffer cannot grow.
    pub fn read_field(&mut self, spec: &DescriptorSpec) -> Result<Option<&[u8]>, SqError> {
        // offset of the first byte not yet scanned, relative to `pos`
        let mut scanned = 0;
        let (start, end, consumed) = loop {
            let avail = self.fill - self.pos;
            let limit = if spec.max > 0 { avail.min(spec.max) } else { avail };

            let window = &self.buf[self.pos + scanned..self.pos + limit];
            if let Some(hit) = window.iter().position(|&b| spec.terminator.matches(b)) {
                let end = self.pos + scanned + hit;
                break (self.pos, end, end + 1);
            }
            scanned = limit;

            if spec.max > 0 && scanned == spec.max {
                let end = self.pos + spec.max;
                break (self.pos, end, end);
            }
            if self.eof || self.fill_more(spec.fd)? == 0 {
                if avail == 0 {
                    return Ok(None);
                }
                break (self.pos, self.fill, self.fill);
            }
        };

        self.pos = consumed;
        let field = &self.buf[start..end];
        Ok(Some(if spec.trim { trim(field) } else { field }))
    }
}

fn trim(mut field: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = field
        && is_space(*first)
    {
        field = rest;
    }
    while let [rest @ .., last] = field
        && is_space(*last)
    {
        field = rest;
    }
    field
}

/// All descriptors touched so far, indexed by number.
#[derive(Default)]
pub struct Descriptors {
    slots: Vec<Option<DescriptorBuffer>>,
}

impl Descriptors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `source` for descriptor `fd` instead of the process descriptor.
    pub fn attach(&mut self, fd: usize, source: Box<dyn Read>) {
        self.grow_to(fd);
        self.slots[fd] = Some(DescriptorBuffer::new(source));
    }

    #[cfg(test)]
    fn get(&self, fd: usize) -> Option<&DescriptorBuffer> {
        self.slots.get(fd).and_then(Option::as_ref)
    }

    fn grow_to(&mut self, fd: usize) {
        if self.slots.len() <= fd {
            self.slots.resize_with(fd + 1, || None);
        }
    }

    fn entry(&mut self, fd: usize) -> Result<&mut DescriptorBuffer, SqError> {
        self.grow_to(fd);
        let slot = &mut self.slots[fd];
        if slot.is_none() {
            *slot = Some(DescriptorBuffer::new(open_descriptor(fd)?));
        }
        slot.as_mut()
            .ok_or_else(|| SqError::Internal(format!("descriptor slot {fd} vanished")))
    }

    /// Read the next field described by `spec` from its descriptor.
    ///
    /// # Errors
    ///
    /// See [`DescriptorBuffer::read_field`]; additionally fails with
    /// `SqError::Io` if the descriptor cannot be opened.
    pub fn read_field(&mut self, spec: &DescriptorSpec) -> Result<Option<&[u8]>, SqError> {
        self.entry(spec.fd)?.read_field(spec)
    }
}

fn open_descriptor(fd: usize) -> Result<Box<dyn Read>, SqError> {
    if fd == 0 {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(format!("/dev/fd/{fd}"))
        .map_err(|e| SqError::io(format!("cannot open fd {fd}"), e))?;
    Ok(Box::new(file))
}
