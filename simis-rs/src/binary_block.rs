use crate::diagnostics::{Diagnostics, Location, Position};
use crate::error::SimisError;
use crate::token_id::TokenId;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Read};

/// Chunk size for draining skipped block bodies.
const SKIP_CHUNK: usize = 1024;

/// The shared byte stream of a binary-mode file: the raw file or the
/// decompressing filter, the diagnostics sink, the token-ID offset picked
/// by the opener, and a running byte offset for diagnostics.
pub(crate) struct BinaryStream {
    input: Box<dyn Read>,
    file: String,
    /// Bytes consumed so far, counted from just past the sub-header.
    position: u64,
    /// One-byte lookahead used by end-of-file checks.
    peeked: Option<u8>,
    token_offset: u16,
    sink: Box<dyn Diagnostics>,
}

impl BinaryStream {
    pub(crate) fn new(
        input: Box<dyn Read>,
        file: String,
        token_offset: u16,
        sink: Box<dyn Diagnostics>,
    ) -> Self {
        BinaryStream {
            input,
            file,
            position: 0,
            peeked: None,
            token_offset,
            sink,
        }
    }

    /// Releases the underlying stream. Subsequent reads see end of file.
    pub(crate) fn close(&mut self) {
        self.peeked = None;
        self.input = Box::new(io::empty());
    }

    /// Looks at the next byte without consuming it; `None` at end of file.
    pub(crate) fn peek_byte(&mut self) -> Option<u8> {
        if self.peeked.is_none() {
            let mut byte = [0u8; 1];
            self.peeked = match self.input.read(&mut byte) {
                Ok(1) => Some(byte[0]),
                _ => None,
            };
        }
        self.peeked
    }

    /// Reads until `buf` is full or the stream ends; returns the bytes
    /// actually read. I/O failures end the stream.
    pub(crate) fn read_full(&mut self, buf: &mut [u8]) -> usize {
        let mut filled = 0;
        if let Some(byte) = self.peeked.take() {
            if buf.is_empty() {
                self.peeked = Some(byte);
                return 0;
            }
            buf[0] = byte;
            filled = 1;
            self.position += 1;
        }
        while filled < buf.len() {
            match self.input.read(&mut buf[filled..]) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    filled += n;
                    self.position += n as u64;
                }
            }
        }
        filled
    }

    pub(crate) fn info(&mut self, message: &str) {
        let at = Location {
            file: &self.file,
            position: Position::Byte(self.position),
        };
        self.sink.info(&at, message);
    }

    pub(crate) fn warn(&mut self, message: &str) {
        let at = Location {
            file: &self.file,
            position: Position::Byte(self.position),
        };
        self.sink.warn(&at, message);
    }

    /// Fires the sink's fatal hook and builds the error that aborts this
    /// file's load.
    pub(crate) fn fatal(&mut self, message: &str) -> SimisError {
        let at = Location {
            file: &self.file,
            position: Position::Byte(self.position),
        };
        self.sink.fail(&at, message);
        SimisError::Fatal(format!("{message} in {at}"))
    }
}

/// `byteorder`'s typed reads go through this impl, which keeps the running
/// offset and the peek slot honest.
impl Read for BinaryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if let Some(byte) = self.peeked.take() {
            buf[0] = byte;
            self.position += 1;
            return Ok(1);
        }
        let n = self.input.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

/// One nested scope of a binary-mode content file.
///
/// `remaining` is the block's byte budget: every physical read against the
/// stream decrements it, and the block is closed exactly when it reaches
/// zero.
pub(crate) struct BinaryBlock<'s> {
    s: &'s mut BinaryStream,
    pub(crate) id: TokenId,
    pub(crate) label: Option<String>,
    pub(crate) flags: u16,
    remaining: u32,
}

/// Reads an 8-byte block header {token u16, flags u16, length u32} and the
/// label that follows it. `parent_remaining` is `None` only for the root,
/// which has no byte budget. The parent is charged for the header and the
/// child's whole declared length up front; the child's own budget then
/// tracks its physical reads.
pub(crate) fn read_sub_block<'a>(
    s: &'a mut BinaryStream,
    parent_remaining: Option<&mut u32>,
) -> BinaryBlock<'a> {
    let header = match (
        s.read_u16::<LittleEndian>(),
        s.read_u16::<LittleEndian>(),
        s.read_u32::<LittleEndian>(),
    ) {
        (Ok(token_number), Ok(flags), Ok(length)) => (token_number, flags, length),
        _ => {
            s.warn("Unexpected end of file");
            return BinaryBlock {
                s,
                id: TokenId::Comment,
                label: None,
                flags: 0,
                remaining: 0,
            };
        }
    };
    let (token_number, flags, mut length) = header;

    if let Some(parent_remaining) = parent_remaining {
        *parent_remaining = parent_remaining.saturating_sub(8);
        if length > *parent_remaining {
            s.warn(&format!(
                "Block claims {} bytes but only {} remain in its parent",
                length, *parent_remaining
            ));
            length = *parent_remaining;
        }
        *parent_remaining -= length;
    }

    let number = token_number.wrapping_add(s.token_offset);
    let id = match TokenId::from_number(number) {
        Some(id) => id,
        None => {
            s.warn(&format!("Skipped unknown token number {number}"));
            TokenId::Comment
        }
    };

    let mut block = BinaryBlock {
        s,
        id,
        label: None,
        flags,
        remaining: length,
    };
    block.read_label();
    block
}

impl<'s> BinaryBlock<'s> {
    /// The first data item of every block is a label length byte, usually 0.
    fn read_label(&mut self) {
        if self.remaining == 0 {
            return;
        }
        let label_length = match self.s.read_u8() {
            Ok(length) => {
                self.remaining -= 1;
                length as u32
            }
            Err(_) => {
                self.truncated();
                return;
            }
        };
        if label_length == 0 {
            return;
        }
        if self.remaining < label_length * 2 {
            self.s.warn("Unexpected end of block reading label");
            self.skip();
            return;
        }
        let mut bytes = vec![0u8; label_length as usize * 2];
        let read = self.s.read_full(&mut bytes);
        self.remaining -= read as u32;
        if read < bytes.len() {
            self.truncated();
            return;
        }
        self.label = Some(decode_utf16le(&bytes));
    }

    fn truncated(&mut self) {
        self.s.warn("Unexpected end of file");
        self.remaining = 0;
    }

    pub(crate) fn read_sub_block(&mut self) -> BinaryBlock<'_> {
        read_sub_block(self.s, Some(&mut self.remaining))
    }

    /// Drains the rest of this block's bytes from the stream.
    pub(crate) fn skip(&mut self) {
        let mut chunk = [0u8; SKIP_CHUNK];
        while self.remaining > 0 {
            let wanted = (self.remaining as usize).min(chunk.len());
            let read = self.s.read_full(&mut chunk[..wanted]);
            if read == 0 {
                self.truncated();
                return;
            }
            self.remaining -= read as u32;
        }
    }

    pub(crate) fn end_of_block(&self) -> bool {
        self.remaining == 0
    }

    pub(crate) fn verify_end_of_block(&mut self) {
        if !self.end_of_block() {
            self.s.warn(&format!(
                "Expected end of block {}; got more data",
                self.id.name()
            ));
            self.skip();
        }
    }

    /// Checks the block has budget for a fixed-width read. A read that
    /// would overrun the budget is a truncation: warn, drain, return false.
    fn check_budget(&mut self, needed: u32) -> bool {
        if self.remaining < needed {
            self.s.warn(&format!(
                "Unexpected end of block {}",
                self.id.name()
            ));
            self.skip();
            return false;
        }
        true
    }

    pub(crate) fn read_int(&mut self) -> i32 {
        if !self.check_budget(4) {
            return 0;
        }
        match self.s.read_i32::<LittleEndian>() {
            Ok(value) => {
                self.remaining -= 4;
                value
            }
            Err(_) => {
                self.truncated();
                0
            }
        }
    }

    pub(crate) fn read_uint(&mut self) -> u32 {
        if !self.check_budget(4) {
            return 0;
        }
        match self.s.read_u32::<LittleEndian>() {
            Ok(value) => {
                self.remaining -= 4;
                value
            }
            Err(_) => {
                self.truncated();
                0
            }
        }
    }

    pub(crate) fn read_float(&mut self) -> f32 {
        if !self.check_budget(4) {
            return 0.0;
        }
        match self.s.read_f32::<LittleEndian>() {
            Ok(value) => {
                self.remaining -= 4;
                value
            }
            Err(_) => {
                self.truncated();
                0.0
            }
        }
    }

    pub(crate) fn read_flags(&mut self) -> u32 {
        self.read_uint()
    }

    fn read_u16_value(&mut self) -> u16 {
        if !self.check_budget(2) {
            return 0;
        }
        match self.s.read_u16::<LittleEndian>() {
            Ok(value) => {
                self.remaining -= 2;
                value
            }
            Err(_) => {
                self.truncated();
                0
            }
        }
    }

    /// Strings are a 2-byte count of UTF-16 code units, then the units.
    pub(crate) fn read_string(&mut self) -> String {
        let count = self.read_u16_value() as u32;
        if count == 0 {
            return String::new();
        }
        if self.remaining < count * 2 {
            self.s.warn("Unexpected end of block reading string");
            self.skip();
            return String::new();
        }
        let mut bytes = vec![0u8; count as usize * 2];
        let read = self.s.read_full(&mut bytes);
        self.remaining -= read as u32;
        if read < bytes.len() {
            self.truncated();
            return String::new();
        }
        decode_utf16le(&bytes)
    }

    pub(crate) fn info(&mut self, message: &str) {
        self.s.info(message);
    }

    pub(crate) fn warn(&mut self, message: &str) {
        self.s.warn(message);
    }

    pub(crate) fn fatal(&mut self, message: &str) -> SimisError {
        self.s.fatal(message)
    }
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Root reader for a binary-mode file. The top-level block is read with no
/// byte budget; file-level skip and verify work against physical end of
/// file.
pub(crate) struct BinaryFile {
    s: BinaryStream,
    closed: bool,
}

impl BinaryFile {
    pub(crate) fn new(s: BinaryStream) -> Self {
        BinaryFile { s, closed: false }
    }

    pub(crate) fn read_sub_block(&mut self) -> BinaryBlock<'_> {
        read_sub_block(&mut self.s, None)
    }

    /// Drains the stream to physical end of file.
    pub(crate) fn skip(&mut self) {
        let mut chunk = [0u8; SKIP_CHUNK];
        while self.s.read_full(&mut chunk) > 0 {}
        self.closed = true;
    }

    pub(crate) fn end_of_file(&mut self) -> bool {
        self.closed || self.s.peek_byte().is_none()
    }

    pub(crate) fn verify_end_of_file(&mut self) {
        if self.closed {
            return;
        }
        if self.s.peek_byte().is_some() {
            self.s.warn("Expected end of file; got more data");
        }
        self.s.close();
        self.closed = true;
    }
}
