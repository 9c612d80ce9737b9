use crate::binary_block::{BinaryFile, BinaryStream};
use crate::block::Block;
use crate::diagnostics::{Diagnostics, Location, Position, StderrDiagnostics};
use crate::error::SimisError;
use crate::text_block::TextFile;
use crate::tokenizer::{TextEncoding, Tokenizer};
use flate2::read::ZlibDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Token numbers in world files are offset into the vocabulary by this
/// much, so one enumeration serves both content families.
const WORLD_TOKEN_OFFSET: u16 = 300;

/// An open content file: the root of the block hierarchy.
///
/// [`SimisFile::open`] inspects the leading signature bytes to select
/// decompression and encoding, then hands back one root reader regardless
/// of which of the four physical encodings the file uses. Drive the parse
/// by reading the top-level block and walking its children depth-first;
/// every block must be closed before its parent advances. Dropping the file
/// verifies its end.
///
/// ```no_run
/// use simis_rs::simis_file::SimisFile;
/// use simis_rs::token_id::TokenId;
///
/// let mut file = SimisFile::open("trains/boxcar.wag").unwrap();
/// let mut wagon = file.read_sub_block();
/// wagon.verify_id(TokenId::Wagon);
/// while !wagon.end_of_block() {
///     let mut child = wagon.read_sub_block();
///     match child.id() {
///         TokenId::Mass => println!("mass: {}", child.read_float()),
///         _ => child.skip(),
///     }
/// }
/// wagon.verify_end_of_block();
/// ```
pub struct SimisFile {
    inner: FileReader,
}

enum FileReader {
    Text(TextFile),
    Binary(BinaryFile),
}

impl SimisFile {
    /// Opens a content file with the default stderr diagnostics sink.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<SimisFile, SimisError> {
        Self::open_with_diagnostics(path, Box::new(StderrDiagnostics))
    }

    /// Opens a content file, reporting diagnostics through `sink`.
    pub fn open_with_diagnostics<P: AsRef<Path>>(
        path: P,
        sink: Box<dyn Diagnostics>,
    ) -> Result<SimisFile, SimisError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(file, &path.display().to_string(), sink)
    }

    /// Opens content whose bytes do not live in a file, eg inside an
    /// archive. `name` is used in diagnostics and errors.
    pub fn from_reader<R: Read + 'static>(
        reader: R,
        name: &str,
        mut sink: Box<dyn Diagnostics>,
    ) -> Result<SimisFile, SimisError> {
        let mut input: Box<dyn Read> = Box::new(reader);

        let mut start = [0u8; 2];
        input.read_exact(&mut start)?;
        let unicode = start == [0xFF, 0xFE];

        let header = read_signature(&mut input, unicode, Some(start))?;

        // SIMISA@F means compressed, SIMISA@@ means uncompressed.
        if header.starts_with("SIMISA@F") {
            input = Box::new(ZlibDecoder::new(input));
        } else if header.starts_with("\r\nSIMISA") {
            // ie us1rd2l1000r10d.s, we are going to allow this but warn.
            let at = Location {
                file: name,
                position: Position::Byte(0),
            };
            sink.warn(&at, "Improper header");
            let mut realign = [0u8; 4];
            input.read_exact(&mut realign)?;
        } else if !header.starts_with("SIMISA@@") {
            return Err(SimisError::UnrecognizedHeader {
                file: name.to_string(),
                header,
            });
        }

        // The sub-header is read through the decompressor when present.
        let sub_header = read_signature(&mut input, unicode, None)?;
        let sub_header_bytes = sub_header.as_bytes();

        // Position 7 selects text vs binary content.
        if sub_header_bytes.get(7) == Some(&b't') {
            let encoding = if unicode {
                TextEncoding::Utf16Le
            } else {
                TextEncoding::Ascii
            };
            let tokenizer = Tokenizer::new(input, encoding, name.to_string(), sink);
            return Ok(SimisFile {
                inner: FileReader::Text(TextFile::new(tokenizer)),
            });
        }
        if sub_header_bytes.get(7) != Some(&b'b') {
            return Err(SimisError::UnrecognizedSubHeader {
                file: name.to_string(),
                sub_header,
            });
        }

        // For binary content, position 5 selects where the file's tokens
        // sit in the vocabulary, ie world files.
        let token_offset = if sub_header_bytes.get(5) == Some(&b'w') {
            WORLD_TOKEN_OFFSET
        } else {
            0
        };
        let stream = BinaryStream::new(input, name.to_string(), token_offset, sink);
        Ok(SimisFile {
            inner: FileReader::Binary(BinaryFile::new(stream)),
        })
    }

    /// Opens the top-level block of the file.
    pub fn read_sub_block(&mut self) -> Block<'_> {
        match &mut self.inner {
            FileReader::Text(file) => Block::text(file.read_sub_block()),
            FileReader::Binary(file) => Block::binary(file.read_sub_block()),
        }
    }

    /// Skips the rest of the file.
    pub fn skip(&mut self) {
        match &mut self.inner {
            FileReader::Text(file) => file.skip(),
            FileReader::Binary(file) => file.skip(),
        }
    }

    /// True when nothing is left to read. Non-consuming and idempotent.
    pub fn end_of_file(&mut self) -> bool {
        match &mut self.inner {
            FileReader::Text(file) => file.end_of_file(),
            FileReader::Binary(file) => file.end_of_file(),
        }
    }

    /// Confirms nothing trails the top-level block, warning otherwise, and
    /// releases the stream.
    pub fn verify_end_of_file(&mut self) {
        match &mut self.inner {
            FileReader::Text(file) => file.verify_end_of_file(),
            FileReader::Binary(file) => file.verify_end_of_file(),
        }
    }
}

/// Dropping a file implies verifying its end.
impl Drop for SimisFile {
    fn drop(&mut self) {
        self.verify_end_of_file();
    }
}

/// Reads one 8-significant-character signature: 16 ASCII bytes or 32
/// UTF-16 bytes. `already_read` carries the two bytes consumed by the BOM
/// probe when they belong to an ASCII signature.
fn read_signature(
    input: &mut Box<dyn Read>,
    unicode: bool,
    already_read: Option<[u8; 2]>,
) -> Result<String, SimisError> {
    if unicode {
        let mut bytes = [0u8; 32];
        input.read_exact(&mut bytes)?;
        let units: Vec<u16> = bytes[..16]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(String::from_utf16_lossy(&units))
    } else {
        let mut bytes = [0u8; 16];
        let offset = match already_read {
            Some(start) => {
                bytes[..2].copy_from_slice(&start);
                2
            }
            None => 0,
        };
        input.read_exact(&mut bytes[offset..])?;
        Ok(bytes[..8].iter().map(|b| *b as char).collect())
    }
}
