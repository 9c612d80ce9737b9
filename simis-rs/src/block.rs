use crate::binary_block::BinaryBlock;
use crate::error::SimisError;
use crate::text_block::TextBlock;
use crate::token_id::TokenId;

/// Three floats, the way positions and sizes are stored in content files.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// One nested scope of a content file, in whichever encoding the file uses.
///
/// This is the single contract every loader programs against; the opener
/// picks the variant once and everything downstream is encoding-agnostic.
/// A block borrows its file's stream, so the parent it was read from cannot
/// be touched until this block is dropped or closed. Every block must be
/// closed with either [`skip`](Block::skip) or
/// [`verify_end_of_block`](Block::verify_end_of_block); dropping an open
/// block verifies it.
pub struct Block<'a> {
    inner: BlockInner<'a>,
}

enum BlockInner<'a> {
    Text(TextBlock<'a>),
    Binary(BinaryBlock<'a>),
}

impl<'a> Block<'a> {
    pub(crate) fn text(block: TextBlock<'a>) -> Self {
        Block {
            inner: BlockInner::Text(block),
        }
    }

    pub(crate) fn binary(block: BinaryBlock<'a>) -> Self {
        Block {
            inner: BlockInner::Binary(block),
        }
    }

    /// The token identifying this block's kind.
    pub fn id(&self) -> TokenId {
        match &self.inner {
            BlockInner::Text(block) => block.id,
            BlockInner::Binary(block) => block.id,
        }
    }

    /// The block's optional label, ie matrix MAIN ( ...
    pub fn label(&self) -> Option<&str> {
        match &self.inner {
            BlockInner::Text(block) => block.label.as_deref(),
            BlockInner::Binary(block) => block.label.as_deref(),
        }
    }

    /// The flag word from a binary block header; zero in text mode.
    pub fn flags(&self) -> u16 {
        match &self.inner {
            BlockInner::Text(_) => 0,
            BlockInner::Binary(block) => block.flags,
        }
    }

    /// Opens the next child scope of this block.
    pub fn read_sub_block(&mut self) -> Block<'_> {
        match &mut self.inner {
            BlockInner::Text(block) => Block::text(block.read_sub_block()),
            BlockInner::Binary(block) => Block::binary(block.read_sub_block()),
        }
    }

    /// Skips to the end of this block.
    pub fn skip(&mut self) {
        match &mut self.inner {
            BlockInner::Text(block) => block.skip(),
            BlockInner::Binary(block) => block.skip(),
        }
    }

    /// True at the end of the block. Non-consuming;
    /// [`verify_end_of_block`](Block::verify_end_of_block) still has to
    /// consume the end marker.
    pub fn end_of_block(&mut self) -> bool {
        match &mut self.inner {
            BlockInner::Text(block) => block.end_of_block(),
            BlockInner::Binary(block) => block.end_of_block(),
        }
    }

    /// Confirms the block has been fully consumed, warning otherwise, and
    /// closes it.
    pub fn verify_end_of_block(&mut self) {
        match &mut self.inner {
            BlockInner::Text(block) => block.verify_end_of_block(),
            BlockInner::Binary(block) => block.verify_end_of_block(),
        }
    }

    pub fn read_int(&mut self) -> i32 {
        match &mut self.inner {
            BlockInner::Text(block) => block.read_int(),
            BlockInner::Binary(block) => block.read_int(),
        }
    }

    pub fn read_uint(&mut self) -> u32 {
        match &mut self.inner {
            BlockInner::Text(block) => block.read_uint(),
            BlockInner::Binary(block) => block.read_uint(),
        }
    }

    pub fn read_float(&mut self) -> f32 {
        match &mut self.inner {
            BlockInner::Text(block) => block.read_float(),
            BlockInner::Binary(block) => block.read_float(),
        }
    }

    pub fn read_flags(&mut self) -> u32 {
        match &mut self.inner {
            BlockInner::Text(block) => block.read_flags(),
            BlockInner::Binary(block) => block.read_flags(),
        }
    }

    pub fn read_string(&mut self) -> String {
        match &mut self.inner {
            BlockInner::Text(block) => block.read_string(),
            BlockInner::Binary(block) => block.read_string(),
        }
    }

    /// Reads three consecutive floats.
    pub fn read_vector3(&mut self) -> Vector3 {
        Vector3 {
            x: self.read_float(),
            y: self.read_float(),
            z: self.read_float(),
        }
    }

    /// Logs an informational mismatch unless this block has the desired id.
    pub fn verify_id(&mut self, desired: TokenId) {
        if self.id() != desired {
            let message = format!(
                "Expected block {}; got {}",
                desired.name(),
                self.id().name()
            );
            self.info(&message);
        }
    }

    /// Verifies this is a comment block, then skips it either way.
    pub fn expect_comment(&mut self) {
        if self.id() != TokenId::Comment {
            let message = format!("Expected block comment; got {}", self.id().name());
            self.info(&message);
        }
        self.skip();
    }

    /// Reports an informational notice at the current position.
    pub fn info(&mut self, message: &str) {
        match &mut self.inner {
            BlockInner::Text(block) => block.info(message),
            BlockInner::Binary(block) => block.info(message),
        }
    }

    /// Reports a recoverable warning at the current position.
    pub fn warn(&mut self, message: &str) {
        match &mut self.inner {
            BlockInner::Text(block) => block.warn(message),
            BlockInner::Binary(block) => block.warn(message),
        }
    }

    /// Builds the fatal error a loader returns when it knows this block's
    /// content is semantically invalid. Aborts that file's load.
    pub fn error(&mut self, message: &str) -> SimisError {
        match &mut self.inner {
            BlockInner::Text(block) => block.fatal(message),
            BlockInner::Binary(block) => block.fatal(message),
        }
    }
}

/// Dropping a block implies verifying it, so a scope that returns early
/// still closes its block.
impl Drop for Block<'_> {
    fn drop(&mut self) {
        self.verify_end_of_block();
    }
}
