use crate::token_id::TokenId;
use crate::tokenizer::Tokenizer;

/// One nested scope of a text-mode content file.
///
/// The block borrows the file's [`Tokenizer`] mutably, so the parent it was
/// read from cannot be advanced until this block is dropped or closed.
pub(crate) struct TextBlock<'f> {
    f: &'f mut Tokenizer,
    pub(crate) id: TokenId,
    pub(crate) label: Option<String>,
    at_end: bool,
}

/// Reads the next sub-block header from the stream.
///
/// The files this format ships in are full of misformed brackets, so a
/// stray `)` and a missing `(` after a label are warnings, never fatal.
pub(crate) fn read_sub_block(f: &mut Tokenizer) -> TextBlock<'_> {
    let item = f.read_item();

    // A bare bracket opens an anonymous comment block, ie (#_fire temp, ...
    if item.is_open_bracket() {
        return TextBlock {
            f,
            id: TokenId::Comment,
            label: None,
            at_end: false,
        };
    }

    if item.is_close_bracket() {
        f.warn("Ignored extra close bracket");
        return closed_block(f, TokenId::Comment);
    }

    if item.is_empty() {
        f.warn("Unexpected end of file");
        return closed_block(f, TokenId::Comment);
    }

    let id = match TokenId::resolve(&item.text) {
        Some(id) => id,
        None => {
            f.warn(&format!("Skipped unknown token '{}'", item.text));
            TokenId::Comment
        }
    };

    // Now look for an optional label, ie matrix MAIN ( ...
    let next = f.read_item();
    if next.is_open_bracket() {
        return TextBlock {
            f,
            id,
            label: None,
            at_end: false,
        };
    }
    if next.is_empty() {
        f.warn("Unexpected end of file");
        return closed_block(f, id);
    }

    let label = Some(next.text);
    let open = f.read_item();
    if !open.is_open_bracket() {
        f.warn(&format!("Expected '('; got '{}'", open.text));
    }
    TextBlock {
        f,
        id,
        label,
        at_end: false,
    }
}

fn closed_block(f: &mut Tokenizer, id: TokenId) -> TextBlock<'_> {
    TextBlock {
        f,
        id,
        label: None,
        at_end: true,
    }
}

impl<'f> TextBlock<'f> {
    pub(crate) fn read_sub_block(&mut self) -> TextBlock<'_> {
        if self.at_end {
            self.f.warn("Read past end of block");
            return closed_block(self.f, TokenId::Comment);
        }
        read_sub_block(self.f)
    }

    /// Skips to the end of this block, balancing nested brackets.
    pub(crate) fn skip(&mut self) {
        if self.at_end {
            return;
        }
        // We are inside a pair of brackets; consume the entire hierarchy
        // through the matching close bracket.
        let mut depth = 1;
        while depth > 0 {
            let item = self.f.read_item();
            if item.is_empty() {
                self.f.warn("Unexpected end of file");
                self.at_end = true;
                return;
            }
            if item.is_open_bracket() {
                depth += 1;
            }
            if item.is_close_bracket() {
                depth -= 1;
            }
        }
        self.at_end = true;
    }

    /// True at the end of the block. Does not consume the close bracket;
    /// `verify_end_of_block` still has to.
    pub(crate) fn end_of_block(&mut self) -> bool {
        self.at_end || matches!(self.f.peek_past_whitespace(), Some(')') | None)
    }

    pub(crate) fn verify_end_of_block(&mut self) {
        if self.at_end {
            return;
        }
        let item = self.f.read_item();
        // Allow a comment at the end of the block, ie
        // MaxReleaseRate( 1.4074 #For train position 31-45 use (1.86 - ...) )
        if !item.quoted
            && (item.text.starts_with('#') || item.text.eq_ignore_ascii_case("comment"))
        {
            self.skip();
            return;
        }
        if !item.is_close_bracket() {
            self.f
                .warn(&format!("Expected end of block; got '{}'", item.text));
        }
        self.at_end = true;
    }

    fn guard_open(&mut self) -> bool {
        if self.at_end {
            self.f.warn("Read past end of block");
            return false;
        }
        true
    }

    pub(crate) fn read_string(&mut self) -> String {
        if !self.guard_open() {
            return String::new();
        }
        self.f.read_item().text
    }

    pub(crate) fn read_int(&mut self) -> i32 {
        if !self.guard_open() {
            return 0;
        }
        let item = self.f.read_item();
        let text = item.text.trim_end_matches(',');
        match text.parse::<i32>() {
            Ok(value) => value,
            Err(_) => {
                self.f
                    .warn(&format!("Cannot parse '{text}' as an integer"));
                0
            }
        }
    }

    pub(crate) fn read_uint(&mut self) -> u32 {
        if !self.guard_open() {
            return 0;
        }
        let item = self.f.read_item();
        let text = item.text.trim_end_matches(',');
        match text.parse::<u32>() {
            Ok(value) => value,
            Err(_) => {
                self.f
                    .warn(&format!("Cannot parse '{text}' as an unsigned integer"));
                0
            }
        }
    }

    pub(crate) fn read_float(&mut self) -> f32 {
        if !self.guard_open() {
            return 0.0;
        }
        let item = self.f.read_item();
        let text = item.text.trim_end_matches(',');
        match text.parse::<f32>() {
            Ok(value) => value,
            Err(_) => {
                self.f.warn(&format!("Cannot parse '{text}' as a number"));
                0.0
            }
        }
    }

    /// Reads a hexadecimal flag word, ie 00000002.
    pub(crate) fn read_flags(&mut self) -> u32 {
        if !self.guard_open() {
            return 0;
        }
        let item = self.f.read_item();
        let text = item.text.trim_end_matches(',');
        match u32::from_str_radix(text.trim_start_matches("0x"), 16) {
            Ok(value) => value,
            Err(_) => {
                self.f
                    .warn(&format!("Cannot parse '{text}' as hex flags"));
                0
            }
        }
    }

    pub(crate) fn info(&mut self, message: &str) {
        self.f.info(message);
    }

    pub(crate) fn warn(&mut self, message: &str) {
        self.f.warn(message);
    }

    pub(crate) fn fatal(&mut self, message: &str) -> crate::error::SimisError {
        self.f.fatal(message)
    }
}

/// Root reader for a text-mode file. Reading the top-level block goes
/// through the same header parsing as any nested block; file-level skip and
/// verify release the underlying stream.
pub(crate) struct TextFile {
    f: Tokenizer,
    closed: bool,
}

impl TextFile {
    pub(crate) fn new(f: Tokenizer) -> Self {
        TextFile { f, closed: false }
    }

    pub(crate) fn read_sub_block(&mut self) -> TextBlock<'_> {
        read_sub_block(&mut self.f)
    }

    /// Skips the rest of the file and releases the stream.
    pub(crate) fn skip(&mut self) {
        self.f.close();
        self.closed = true;
    }

    pub(crate) fn end_of_file(&mut self) -> bool {
        self.closed || self.f.peek_past_whitespace().is_none()
    }

    /// Verifies nothing but stray close brackets remains, then closes.
    /// Extra `)`s are ignored since the files are full of misformed
    /// brackets.
    pub(crate) fn verify_end_of_file(&mut self) {
        if self.closed {
            return;
        }
        loop {
            let item = self.f.read_item();
            if item.is_empty() {
                break;
            }
            if !item.is_close_bracket() {
                self.f
                    .warn(&format!("Expected end of file; got '{}'", item.text));
                break;
            }
        }
        self.f.close();
        self.closed = true;
    }
}
