use crate::error::*;
use super::{ByteStream, is_whitespace};

/// A lexer for literal PDF strings. Reads the escaped string body byte by byte from a stream,
/// tracking nested parentheses.
///
/// The stream should be positioned right after the opening `(`; after `read_all` it sits right
/// after the matching `)`.
pub struct StringLexer<'s, S: ?Sized> {
    stream: &'s mut S,
    nested: i32, // How far in () we are nested
}

impl<'s, S: ByteStream + ?Sized> StringLexer<'s, S> {
    pub fn new(stream: &'s mut S) -> Self {
        StringLexer {
            stream,
            nested: 0,
        }
    }

    pub fn read_all(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(b) = self.next_lexeme()? {
            out.push(b);
        }
        Ok(out)
    }

    /// Next decoded byte of the string, `None` once the closing parenthesis is consumed.
    pub fn next_lexeme(&mut self) -> Result<Option<u8>> {
        loop {
            let c = self.stream.next_byte()?;
            let out = match c {
                b'\\' => match self.stream.next_byte()? {
                    b'n' => b'\n',
                    b'r' => b'\r',
                    b't' => b'\t',
                    b'b' => b'\x08',
                    b'f' => b'\x0c',
                    b'\n' => {
                        // line continuation
                        if self.stream.peek_byte()? == Some(b'\r') {
                            self.stream.next_byte()?;
                        }
                        continue;
                    }
                    b'\r' => {
                        if self.stream.peek_byte()? == Some(b'\n') {
                            self.stream.next_byte()?;
                        }
                        continue;
                    }
                    c @ b'0' ..= b'7' => {
                        // 1-3 octal digits, overflow is ignored
                        let mut char_code = (c - b'0') as u16;
                        for _ in 0..2 {
                            match self.stream.peek_byte()? {
                                Some(d @ b'0' ..= b'7') => {
                                    self.stream.next_byte()?;
                                    char_code = char_code * 8 + (d - b'0') as u16;
                                }
                                _ => break,
                            }
                        }
                        char_code as u8
                    }
                    // `\(`, `\)`, `\\` and any unknown escape stand for the character itself
                    c => c,
                },
                b'(' => {
                    self.nested += 1;
                    b'('
                }
                b')' => {
                    self.nested -= 1;
                    if self.nested < 0 {
                        return Ok(None);
                    }
                    b')'
                }
                c => c,
            };
            return Ok(Some(out));
        }
    }
}

/// A lexer for hex strings. The stream should be positioned right after the `<` delimiter; after
/// `read_all` it sits right after the closing `>`.
pub struct HexStringLexer<'s, S: ?Sized> {
    stream: &'s mut S,
}

impl<'s, S: ByteStream + ?Sized> HexStringLexer<'s, S> {
    pub fn new(stream: &'s mut S) -> Self {
        HexStringLexer { stream }
    }

    pub fn read_all(mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(b) = self.next_hex_byte()? {
            out.push(b);
        }
        Ok(out)
    }

    fn next_non_whitespace_char(&mut self) -> Result<u8> {
        let mut byte = self.stream.next_byte()?;
        while is_whitespace(byte) {
            byte = self.stream.next_byte()?;
        }
        Ok(byte)
    }

    /// Next byte of the string, `None` once the closing `>` is consumed.
    /// A trailing odd digit is completed with an implicit `0`.
    pub fn next_hex_byte(&mut self) -> Result<Option<u8>> {
        let c1 = self.next_non_whitespace_char()?;
        let high_nibble = match decode_nibble(c1) {
            Some(n) => n,
            None if c1 == b'>' => return Ok(None),
            None => {
                let pos = self.stream.tell()? as usize;
                return Err(PdfError::HexDecode { pos, bytes: [c1, 0] });
            }
        };
        let c2 = self.next_non_whitespace_char()?;
        let low_nibble = match decode_nibble(c2) {
            Some(n) => n,
            None if c2 == b'>' => {
                self.stream.unread(1)?;
                0
            }
            None => {
                let pos = self.stream.tell()? as usize;
                return Err(PdfError::HexDecode { pos, bytes: [c1, c2] });
            }
        };
        Ok(Some((high_nibble << 4) | low_nibble))
    }
}

#[inline]
pub fn decode_nibble(c: u8) -> Option<u8> {
    match c {
        b'0' ..= b'9' => Some(c - b'0'),
        b'A' ..= b'F' => Some(c - b'A' + 0xA),
        b'a' ..= b'f' => Some(c - b'a' + 0xA),
        _ => None,
    }
}
