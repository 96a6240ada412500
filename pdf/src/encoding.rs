//! Text encodings of PDF string objects: PDFDocEncoding and UTF-16BE.

use crate::error::{PdfError, Result};

/// How the bytes of a text string are to be read.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextEncoding {
    PdfDoc,
    Utf16Be,
}

// 0x18 ..= 0x1F
static ACCENTS: [char; 8] = ['˘', 'ˇ', 'ˆ', '˙', '˝', '˛', '˚', '˜'];

// 0x80 ..= 0x9E
static PUNCTUATION: [char; 31] = [
    '•', '†', '‡', '…', '—', '–', 'ƒ', '⁄', '‹', '›', '−', '‰', '„', '“', '”', '‘',
    '’', '‚', '™', 'ﬁ', 'ﬂ', 'Ł', 'Œ', 'Š', 'Ÿ', 'Ž', 'ı', 'ł', 'œ', 'š', 'ž',
];

/// The character a PDFDocEncoding byte stands for, `None` for the undefined codes.
pub fn pdfdoc_char(b: u8) -> Option<char> {
    match b {
        0x18 ..= 0x1f => Some(ACCENTS[(b - 0x18) as usize]),
        0x80 ..= 0x9e => Some(PUNCTUATION[(b - 0x80) as usize]),
        0xa0 => Some('€'),
        0x7f | 0x9f | 0xad => None,
        _ => Some(b as char),
    }
}

fn pdfdoc_byte(c: char) -> Option<u8> {
    let code = c as u32;
    if code <= 0xff && pdfdoc_char(code as u8) == Some(c) {
        return Some(code as u8);
    }
    if c == '€' {
        return Some(0xa0);
    }
    if let Some(i) = ACCENTS.iter().position(|&a| a == c) {
        return Some(0x18 + i as u8);
    }
    PUNCTUATION.iter().position(|&p| p == c).map(|i| 0x80 + i as u8)
}

/// Encode `text` in PDFDocEncoding. Fails on the first character without a code.
pub fn encode_pdfdocencoding(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|ch| pdfdoc_byte(ch).ok_or(PdfError::Encoding { encoding: "pdfdocencoding", ch }))
        .collect()
}

pub fn decode_pdfdocencoding(data: &[u8]) -> Result<String> {
    data.iter().enumerate()
        .map(|(pos, &b)| pdfdoc_char(b).ok_or(PdfError::Decoding { encoding: "pdfdocencoding", pos }))
        .collect()
}

/// Decode UTF-16BE data (without byte order mark).
pub fn utf16be_to_string(data: &[u8]) -> Result<String> {
    if data.len() % 2 != 0 {
        return Err(PdfError::Decoding { encoding: "utf-16be", pos: data.len() - 1 });
    }
    let units = data.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]]));
    let mut out = String::with_capacity(data.len() / 2);
    let mut pos = 0;
    for r in std::char::decode_utf16(units) {
        match r {
            Ok(c) => {
                out.push(c);
                pos += 2 * c.len_utf16();
            }
            Err(_) => return Err(PdfError::Decoding { encoding: "utf-16be", pos }),
        }
    }
    Ok(out)
}

/// Decode UTF-16BE data, replacing invalid sequences. A dangling odd byte is dropped.
pub fn utf16be_to_string_lossy(data: &[u8]) -> String {
    let units = data.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]]));
    std::char::decode_utf16(units)
        .map(|r| r.unwrap_or(std::char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdfdoc_table() {
        assert_eq!(pdfdoc_char(b'A'), Some('A'));
        assert_eq!(pdfdoc_char(0x18), Some('˘'));
        assert_eq!(pdfdoc_char(0x80), Some('•'));
        assert_eq!(pdfdoc_char(0x9e), Some('ž'));
        assert_eq!(pdfdoc_char(0xa0), Some('€'));
        assert_eq!(pdfdoc_char(0xe9), Some('é'));
        assert_eq!(pdfdoc_char(0x7f), None);
        assert_eq!(pdfdoc_char(0x9f), None);
        assert_eq!(pdfdoc_char(0xad), None);
    }

    #[test]
    fn pdfdoc_roundtrip() {
        for b in 0 ..= 255u8 {
            if let Some(c) = pdfdoc_char(b) {
                assert_eq!(pdfdoc_byte(c), Some(b), "byte {:#x}", b);
            }
        }
    }

    #[test]
    fn encode_error() {
        let err = encode_pdfdocencoding("abc😀").unwrap_err();
        assert!(matches!(err, PdfError::Encoding { encoding: "pdfdocencoding", ch: '😀' }));
        assert_eq!(encode_pdfdocencoding("fi: ﬁ €").unwrap(), b"fi: \x93 \xa0");
    }

    #[test]
    fn decode_error() {
        assert!(matches!(decode_pdfdocencoding(b"ab\x7f"), Err(PdfError::Decoding { pos: 2, .. })));
    }

    #[test]
    fn utf16() {
        assert_eq!(utf16be_to_string(&[0x00, 0x41, 0xd8, 0x3d, 0xde, 0x00]).unwrap(), "A😀");
        assert!(utf16be_to_string(&[0x00]).is_err());
        assert!(matches!(utf16be_to_string(&[0x00, 0x41, 0xd8, 0x34]), Err(PdfError::Decoding { pos: 2, .. })));
        assert_eq!(utf16be_to_string_lossy(&[0x00, 0x41, 0x00]), "A");
    }
}
