use crate::diagnostics::{Diagnostics, Location, Position};
use crate::error::SimisError;
use std::io::{self, Read};

/// Character encoding of a text-mode content stream, selected by the opener
/// from the byte-order marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextEncoding {
    Ascii,
    Utf16Le,
}

/// One lexical item from a text-mode stream.
///
/// The `quoted` flag records whether the text came from a quoted string, so
/// a literal `")"` inside quotes is never mistaken for a closing bracket.
#[derive(Debug, Clone)]
pub(crate) struct Item {
    pub(crate) text: String,
    pub(crate) quoted: bool,
}

impl Item {
    fn empty() -> Self {
        Item {
            text: String::new(),
            quoted: false,
        }
    }

    /// The empty item marks end of file.
    pub(crate) fn is_empty(&self) -> bool {
        !self.quoted && self.text.is_empty()
    }

    pub(crate) fn is_open_bracket(&self) -> bool {
        !self.quoted && self.text == "("
    }

    pub(crate) fn is_close_bracket(&self) -> bool {
        !self.quoted && self.text == ")"
    }
}

/// Whitespace- and line-comment-skipping lexer over an ASCII or UTF-16
/// content stream. Tracks line and column for diagnostics and owns the
/// diagnostics sink shared by every block read from this file.
pub(crate) struct Tokenizer {
    input: Box<dyn Read>,
    encoding: TextEncoding,
    file: String,
    line: u32,
    column: u32,
    /// One-character lookahead, filled by `peek_char`.
    peeked: Option<char>,
    sink: Box<dyn Diagnostics>,
}

impl Tokenizer {
    pub(crate) fn new(
        input: Box<dyn Read>,
        encoding: TextEncoding,
        file: String,
        sink: Box<dyn Diagnostics>,
    ) -> Self {
        Tokenizer {
            input,
            encoding,
            file,
            line: 1,
            column: 1,
            peeked: None,
            sink,
        }
    }

    /// Releases the underlying stream. Subsequent reads see end of file.
    pub(crate) fn close(&mut self) {
        self.peeked = None;
        self.input = Box::new(io::empty());
    }

    fn location(&self) -> Location<'_> {
        Location {
            file: &self.file,
            position: Position::LineColumn {
                line: self.line,
                column: self.column,
            },
        }
    }

    pub(crate) fn info(&mut self, message: &str) {
        let at = Location {
            file: &self.file,
            position: Position::LineColumn {
                line: self.line,
                column: self.column,
            },
        };
        self.sink.info(&at, message);
    }

    pub(crate) fn warn(&mut self, message: &str) {
        let at = Location {
            file: &self.file,
            position: Position::LineColumn {
                line: self.line,
                column: self.column,
            },
        };
        self.sink.warn(&at, message);
    }

    /// Fires the sink's fatal hook and builds the error that aborts this
    /// file's load.
    pub(crate) fn fatal(&mut self, message: &str) -> SimisError {
        let formatted = format!("{} in {}", message, self.location());
        let at = Location {
            file: &self.file,
            position: Position::LineColumn {
                line: self.line,
                column: self.column,
            },
        };
        self.sink.fail(&at, message);
        SimisError::Fatal(formatted)
    }

    /// Decodes one character from the raw stream, or `None` at end of file.
    fn decode_char(&mut self) -> Option<char> {
        match self.encoding {
            TextEncoding::Ascii => {
                let mut byte = [0u8; 1];
                match self.input.read(&mut byte) {
                    Ok(0) | Err(_) => None,
                    Ok(_) => Some(byte[0] as char),
                }
            }
            TextEncoding::Utf16Le => {
                let mut pair = [0u8; 2];
                if read_full(&mut self.input, &mut pair) != 2 {
                    return None;
                }
                let unit = u16::from_le_bytes(pair);
                // Combine a surrogate pair; a lone surrogate decodes to the
                // replacement character.
                if (0xD800..0xDC00).contains(&unit) {
                    let mut low = [0u8; 2];
                    if read_full(&mut self.input, &mut low) != 2 {
                        return Some(char::REPLACEMENT_CHARACTER);
                    }
                    let low = u16::from_le_bytes(low);
                    char::decode_utf16([unit, low])
                        .next()
                        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                } else {
                    char::decode_utf16([unit])
                        .next()
                        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                }
            }
        }
    }

    /// Consumes and returns the next character, maintaining line/column.
    fn next_char(&mut self) -> Option<char> {
        let c = match self.peeked.take() {
            Some(c) => Some(c),
            None => self.decode_char(),
        };
        if let Some(c) = c {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }

    /// Looks at the next character without consuming it.
    fn peek_char(&mut self) -> Option<char> {
        if self.peeked.is_none() {
            self.peeked = self.decode_char();
        }
        self.peeked
    }

    /// Non-consuming look at the next non-whitespace character, or `None`
    /// at end of file. Never advances past that character, so repeated
    /// calls are side-effect-free.
    pub(crate) fn peek_past_whitespace(&mut self) -> Option<char> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.next_char();
                }
                other => return other,
            }
        }
    }

    /// Reads the next lexical item. Returns the empty item at end of file.
    pub(crate) fn read_item(&mut self) -> Item {
        loop {
            let c = match self.next_char() {
                Some(c) => c,
                None => return Item::empty(),
            };
            if c.is_whitespace() {
                continue;
            }
            if c == '/' && self.peek_char() == Some('/') {
                // Line comment, discard to end of line.
                while let Some(c) = self.next_char() {
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }
            return match c {
                '(' | ')' => Item {
                    text: c.to_string(),
                    quoted: false,
                },
                '"' => self.read_quoted(),
                first => self.read_word(first),
            };
        }
    }

    /// Reads a quoted string item, handling escapes and the `"a" + "b"`
    /// concatenation form.
    fn read_quoted(&mut self) -> Item {
        let mut text = String::new();
        loop {
            loop {
                match self.next_char() {
                    None => {
                        self.warn("Unexpected end of file inside quoted string");
                        return Item { text, quoted: true };
                    }
                    Some('"') => break,
                    Some('\\') => match self.next_char() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some(c) => text.push(c),
                        None => {
                            self.warn("Unexpected end of file inside quoted string");
                            return Item { text, quoted: true };
                        }
                    },
                    Some(c) => text.push(c),
                }
            }
            // A `+` after the closing quote joins the next quoted piece.
            if self.peek_past_whitespace() != Some('+') {
                return Item { text, quoted: true };
            }
            self.next_char();
            if self.peek_past_whitespace() != Some('"') {
                self.warn("Expected quoted string after '+'");
                return Item { text, quoted: true };
            }
            self.next_char();
        }
    }

    /// Reads an unquoted word, stopping before whitespace, brackets, or a
    /// quote.
    fn read_word(&mut self, first: char) -> Item {
        let mut text = String::new();
        text.push(first);
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() || c == '(' || c == ')' || c == '"' {
                break;
            }
            text.push(c);
            self.next_char();
        }
        Item {
            text,
            quoted: false,
        }
    }
}

/// Reads until `buf` is full or the stream ends; returns the bytes read.
fn read_full(input: &mut dyn Read, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) | Err(_) => break,
            Ok(n) => filled += n,
        }
    }
    filled
}
