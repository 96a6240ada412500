/// Byte level access to a PDF source: the cursor protocol every reader in this crate is built on,
/// plus the character classes of the PDF grammar.

use std::io::{Read, Seek, SeekFrom};

use crate::error::*;

mod str;
pub use self::str::{StringLexer, HexStringLexer, decode_nibble};

/// Bytes the PDF grammar treats as white-space.
pub const WHITESPACE: &[u8] = b" \n\r\t\x0c\x00";

/// Bytes that end a regular token.
pub const DELIMITERS: &[u8] = b"()<>[]{}/%";

#[inline]
pub fn is_whitespace(b: u8) -> bool {
    WHITESPACE.contains(&b)
}

#[inline]
pub fn is_delimiter(b: u8) -> bool {
    DELIMITERS.contains(&b)
}

#[inline]
pub fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

/// A saved cursor position. Obtained from `ByteStream::mark` and handed back to
/// `ByteStream::reset` to undo a speculative read.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Mark(u64);

impl Mark {
    pub fn pos(&self) -> u64 {
        self.0
    }
}

/// The cursor protocol. Implemented for everything that is `Read + Seek`, so a file or an
/// in-memory `std::io::Cursor` can be parsed directly.
///
/// All reads block on the underlying source; nothing is buffered beyond what the source does itself.
pub trait ByteStream: Read + Seek {
    /// Read up to `n` bytes. Returns fewer only at the end of the source.
    fn read_n(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(n.min(1 << 16));
        Read::take(&mut *self, n as u64).read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Read one byte, `None` at the end of the source.
    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut b = [0];
        loop {
            match self.read(&mut b) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(b[0])),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read one byte; the end of the source is a truncation error.
    fn next_byte(&mut self) -> Result<u8> {
        self.read_byte()?.ok_or(PdfError::EOF)
    }

    /// Look at the next byte without consuming it.
    fn peek_byte(&mut self) -> Result<Option<u8>> {
        let b = self.read_byte()?;
        if b.is_some() {
            self.unread(1)?;
        }
        Ok(b)
    }

    /// Look at up to `n` bytes without consuming them.
    fn peek_n(&mut self, n: usize) -> Result<Vec<u8>> {
        let mark = self.mark()?;
        let buf = self.read_n(n)?;
        self.reset(mark)?;
        Ok(buf)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.stream_position()?)
    }

    fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    /// Move the cursor by `offset` bytes relative to the current position.
    fn step(&mut self, offset: i64) -> Result<()> {
        self.seek(SeekFrom::Current(offset))?;
        Ok(())
    }

    /// Push the last `n` bytes back.
    fn unread(&mut self, n: usize) -> Result<()> {
        self.step(-(n as i64))
    }

    fn mark(&mut self) -> Result<Mark> {
        Ok(Mark(self.tell()?))
    }

    fn reset(&mut self, mark: Mark) -> Result<()> {
        self.seek_to(mark.0)
    }

    /// Consume white-space and return the first other byte, which is consumed as well.
    /// `None` if the source ended first.
    fn read_non_whitespace(&mut self) -> Result<Option<u8>> {
        while let Some(b) = self.read_byte()? {
            if !is_whitespace(b) {
                return Ok(Some(b));
            }
        }
        Ok(None)
    }

    /// Consume white-space, leaving the cursor on the first other byte, which is returned.
    fn skip_whitespace(&mut self) -> Result<Option<u8>> {
        let b = self.read_non_whitespace()?;
        if b.is_some() {
            self.unread(1)?;
        }
        Ok(b)
    }

    /// Skip a `%` comment up to and including the end of line.
    fn skip_comment(&mut self) -> Result<()> {
        while let Some(b) = self.read_byte()? {
            if b == b'\n' || b == b'\r' {
                break;
            }
        }
        Ok(())
    }

    /// Skip white-space and comments, leaving the cursor on the next significant byte.
    fn skip_whitespace_and_comments(&mut self) -> Result<Option<u8>> {
        loop {
            match self.skip_whitespace()? {
                Some(b'%') => self.skip_comment()?,
                other => return Ok(other),
            }
        }
    }

    /// Read bytes as long as `accept` holds. Stops in front of the first rejected byte or at the end
    /// of the source.
    fn read_while(&mut self, accept: impl Fn(u8) -> bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(b) = self.read_byte()? {
            if !accept(b) {
                self.unread(1)?;
                break;
            }
            out.push(b);
        }
        Ok(out)
    }

    /// Read a regular token (no white-space, no delimiters).
    fn read_token(&mut self) -> Result<Vec<u8>> {
        self.read_while(is_regular)
    }

    /// Returns `Ok` if the next token matches `expected` - else `Err`.
    fn next_expect(&mut self, expected: &'static str) -> Result<()> {
        self.skip_whitespace_and_comments()?;
        let pos = self.tell()?;
        let word = self.read_token()?;
        if word == expected.as_bytes() {
            Ok(())
        } else if word.is_empty() && self.peek_byte()?.is_none() {
            Err(PdfError::EOF)
        } else {
            Err(PdfError::UnexpectedLexeme {
                pos,
                lexeme: String::from_utf8_lossy(&word).into(),
                expected,
            })
        }
    }
}

impl<T: Read + Seek + ?Sized> ByteStream for T {}
