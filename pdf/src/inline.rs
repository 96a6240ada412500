//! Inline image data (`BI ... ID <data> EI`).
//!
//! Content streams don't say how long an inline image is, so the end has to be found by scanning.
//! Each filter has its own end-of-data marker; only when the filter is unknown does the scan fall
//! back to looking for the `EI` operator itself, which can be fooled by binary data.
//!
//! Every extractor starts right after the `ID` operator (and the white-space byte following it)
//! and stops with the cursor on the `E` of `EI`, which it leaves for the caller to consume.

use crate::error::*;
use crate::parser::lexer::{ByteStream, is_whitespace};
use crate::parser::find;
use crate::primitive::{Dictionary, Primitive};

pub const BUFFER_SIZE: usize = 8192;

/// Checks that `EI` comes next (after optional white-space), followed by white-space or the end of
/// the data. The cursor ends up on the `E`.
pub fn check_end_image_marker<S: ByteStream + ?Sized>(stream: &mut S) -> Result<()> {
    stream.skip_whitespace()?;
    let tok = stream.peek_n(3)?;
    if tok.starts_with(b"EI") && tok.get(2).map_or(true, |&b| is_whitespace(b)) {
        Ok(())
    } else {
        Err(PdfError::read("EI stream not found"))
    }
}

/// The next chunk: white-space is skipped, then up to `BUFFER_SIZE + 1` bytes are read.
fn read_chunk<S: ByteStream + ?Sized>(stream: &mut S) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(BUFFER_SIZE + 1);
    if let Some(b) = stream.read_non_whitespace()? {
        buf.push(b);
        buf.extend(stream.read_n(BUFFER_SIZE)?);
    }
    Ok(buf)
}

/// Move the cursor from the end of `buf` to `pos` within it.
fn rewind_into<S: ByteStream + ?Sized>(stream: &mut S, buf: &[u8], pos: usize) -> Result<()> {
    stream.step(pos as i64 - buf.len() as i64)
}

/// ASCIIHexDecode data ends with `>`. A bare `EI` is accepted as the end as well, in which case the
/// white-space in front of it is not part of the data.
pub fn extract_inline_ahx<S: ByteStream + ?Sized>(stream: &mut S) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    loop {
        let buf = read_chunk(stream)?;
        if buf.is_empty() {
            return Err(PdfError::UnexpectedEnd);
        }
        if let Some(i) = buf.iter().position(|&b| b == b'>') {
            data.extend_from_slice(&buf[..= i]);
            rewind_into(stream, &buf, i + 1)?;
            break;
        }
        if let Some(i) = find(&buf, b"EI") {
            let mut end = i;
            while end > 0 && is_whitespace(buf[end - 1]) {
                end -= 1;
            }
            data.extend_from_slice(&buf[.. end]);
            rewind_into(stream, &buf, i)?;
            break;
        }
        if buf.len() <= 2 {
            return Err(PdfError::UnexpectedEnd);
        }
        // keep the tail, `EI` may straddle the chunks
        data.extend_from_slice(&buf[.. buf.len() - 2]);
        stream.unread(2)?;
    }
    check_end_image_marker(stream)?;
    Ok(data)
}

/// ASCII85Decode data ends with `~>`, which is kept.
pub fn extract_inline_a85<S: ByteStream + ?Sized>(stream: &mut S) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    loop {
        let buf = read_chunk(stream)?;
        if buf.is_empty() {
            return Err(PdfError::UnexpectedEnd);
        }
        if let Some(i) = find(&buf, b"~>") {
            data.extend_from_slice(&buf[.. i + 2]);
            rewind_into(stream, &buf, i + 2)?;
            break;
        }
        if buf.len() <= 2 {
            return Err(PdfError::UnexpectedEnd);
        }
        data.extend_from_slice(&buf[.. buf.len() - 2]);
        stream.unread(2)?;
    }
    check_end_image_marker(stream)?;
    Ok(data)
}

/// RunLengthDecode data ends with the EOD byte `0x80`, which is kept.
pub fn extract_inline_rl<S: ByteStream + ?Sized>(stream: &mut S) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    loop {
        let buf = stream.read_n(BUFFER_SIZE)?;
        if buf.is_empty() {
            return Err(PdfError::UnexpectedEnd);
        }
        if let Some(i) = buf.iter().position(|&b| b == 0x80) {
            data.extend_from_slice(&buf[..= i]);
            rewind_into(stream, &buf, i + 1)?;
            break;
        }
        data.extend_from_slice(&buf);
    }
    check_end_image_marker(stream)?;
    Ok(data)
}

/// JPEG markers that are followed by a two byte segment length.
fn has_segment_length(marker: u8) -> bool {
    matches!(marker, 0xc0 ..= 0xc7 | 0xc9 ..= 0xcf | 0xda ..= 0xdf | 0xe0 ..= 0xef | 0xfe)
}

/// DCTDecode (JPEG) data ends with the EOI marker `FF D9`. Segments with a length are copied
/// without looking inside, so marker-like bytes in their payload don't end the image.
pub fn extract_inline_dct<S: ByteStream + ?Sized>(stream: &mut S) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    let mut started = false;
    loop {
        let c = stream.read_byte()?.ok_or(PdfError::UnexpectedEnd)?;
        if c != 0xff {
            // anything in front of the first marker is dropped
            if started {
                data.push(c);
            }
            continue;
        }
        started = true;
        data.push(c);
        let marker = stream.read_byte()?.ok_or(PdfError::UnexpectedEnd)?;
        match marker {
            // fill byte, the next one may start the marker
            0xff => stream.unread(1)?,
            // stuffed zero
            0x00 => data.push(marker),
            0xd9 => {
                data.push(marker);
                break;
            }
            m if has_segment_length(m) => {
                data.push(marker);
                let len = stream.read_n(2)?;
                if len.len() < 2 {
                    return Err(PdfError::UnexpectedEnd);
                }
                data.extend_from_slice(&len);
                let size = u16::from_be_bytes([len[0], len[1]]) as usize;
                let payload = stream.read_n(size.saturating_sub(2))?;
                if payload.len() < size.saturating_sub(2) {
                    return Err(PdfError::UnexpectedEnd);
                }
                data.extend(payload);
            }
            _ => data.push(marker),
        }
    }
    check_end_image_marker(stream)?;
    Ok(data)
}

/// Whether the bytes after a candidate `E` complete `<ws>EI<ws>` followed by `Q`, `E` or the end
/// of the data. `before` is the byte in front of the `E`.
fn is_end_image<S: ByteStream + ?Sized>(stream: &mut S, before: Option<u8>) -> Result<bool> {
    if !before.map_or(false, is_whitespace) {
        return Ok(false);
    }
    if stream.read_byte()? != Some(b'I') {
        return Ok(false);
    }
    if !stream.read_byte()?.map_or(false, is_whitespace) {
        return Ok(false);
    }
    Ok(matches!(stream.read_non_whitespace()?, None | Some(b'Q') | Some(b'E')))
}

/// The filter-agnostic scan, for images without a filter or with one not handled above.
///
/// Looks for `EI` with white-space on both sides, followed by `Q` or `E` (as in `EMC`) or the end
/// of the data. Binary image data containing exactly that sequence ends the image early; there is
/// no way around that without knowing the encoding. The white-space byte in front of `EI` stays
/// part of the data.
pub fn extract_inline_default<S: ByteStream + ?Sized>(stream: &mut S) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    loop {
        let buf = stream.read_n(BUFFER_SIZE)?;
        if buf.is_empty() {
            return Err(PdfError::UnexpectedEnd);
        }
        let loc = match buf.iter().position(|&b| b == b'E') {
            Some(loc) => loc,
            None => {
                data.extend(buf);
                continue;
            }
        };
        data.extend_from_slice(&buf[.. loc]);
        rewind_into(stream, &buf, loc + 1)?;
        let after_e = stream.mark()?;
        let found = is_end_image(stream, data.last().copied())?;
        stream.reset(after_e)?;
        if found {
            stream.unread(1)?;
            return Ok(data);
        }
        data.push(b'E');
    }
}

/// The filter of an inline image: `/F` or `/Filter`, the first one for a filter chain.
pub fn filter_name(dict: &Dictionary) -> Option<&str> {
    let filter = dict.get("F").or_else(|| dict.get("Filter"))?;
    match filter {
        Primitive::Name(name) => Some(name.as_str()),
        Primitive::Array(arr) => arr.first().and_then(|p| p.as_name().ok()),
        _ => None,
    }
}

fn dict_get<'a>(dict: &'a Dictionary, short: &str, long: &str) -> Option<&'a Primitive> {
    dict.get(short).or_else(|| dict.get(long))
}

/// Size of unfiltered image data, from width, height, color space and bits per component.
pub fn unfiltered_len(dict: &Dictionary) -> Option<usize> {
    let width = dict_get(dict, "W", "Width")?.as_usize().ok()?;
    let height = dict_get(dict, "H", "Height")?.as_usize().ok()?;
    let image_mask = matches!(dict_get(dict, "IM", "ImageMask"), Some(Primitive::Boolean(true)));
    let components = match dict_get(dict, "CS", "ColorSpace").and_then(|p| p.as_name().ok()) {
        Some(cs) if cs.contains("RGB") => 3,
        Some(cs) if cs.contains("CMYK") => 4,
        _ => 1,
    };
    let bpc = match dict_get(dict, "BPC", "BitsPerComponent") {
        _ if image_mask => 1,
        Some(p) => p.as_usize().ok()?,
        None => 8,
    };
    // sizes come straight from the file; one that overflows can't be right
    let row_bits = width.checked_mul(components)?.checked_mul(bpc)?;
    (row_bits.checked_add(7)? / 8).checked_mul(height)
}

/// Reads the data of an inline image whose dictionary is `dict`, picking the extractor by filter.
///
/// Data without a filter is read by its computed size; if `EI` doesn't follow, the size was wrong
/// and the data is scanned for again.
pub fn extract_image_data<S: ByteStream + ?Sized>(stream: &mut S, dict: &Dictionary) -> Result<Vec<u8>> {
    let start = stream.mark()?;
    let data = match filter_name(dict) {
        Some("AHx") | Some("ASCIIHexDecode") => extract_inline_ahx(stream)?,
        Some("A85") | Some("ASCII85Decode") => extract_inline_a85(stream)?,
        Some("RL") | Some("RunLengthDecode") => extract_inline_rl(stream)?,
        Some("DCT") | Some("DCTDecode") => extract_inline_dct(stream)?,
        Some(other) => {
            debug!("no extractor for inline image filter {}, scanning for EI", other);
            extract_inline_default(stream)?
        }
        None => match unfiltered_len(dict) {
            Some(len) => {
                let data = stream.read_n(len)?;
                if data.len() == len && check_end_image_marker(stream).is_ok() {
                    data
                } else {
                    warn!("inline image at byte {} is not {} bytes long, scanning for EI", start.pos(), len);
                    stream.reset(start)?;
                    extract_inline_default(stream)?
                }
            }
            None => extract_inline_default(stream)?,
        },
    };
    trace!("inline image: {} bytes", data.len());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn cursor(data: &[u8]) -> Cursor<&[u8]> {
        Cursor::new(data)
    }

    #[test]
    fn ahx() {
        let mut c = cursor(b"0011 22ff>\nEI Q");
        assert_eq!(extract_inline_ahx(&mut c).unwrap(), b"0011 22ff>");
        assert_eq!(c.tell().unwrap(), 11);
    }

    #[test]
    fn ahx_ei_as_terminator() {
        let mut c = cursor(b"0011 22ff \n EI Q");
        assert_eq!(extract_inline_ahx(&mut c).unwrap(), b"0011 22ff");
        assert_eq!(c.tell().unwrap(), 12);
    }

    #[test]
    fn ahx_large() {
        let mut input = vec![b'a'; 3 * BUFFER_SIZE];
        input.extend_from_slice(b">EI");
        let mut c = cursor(&input);
        let data = extract_inline_ahx(&mut c).unwrap();
        assert_eq!(data.len(), 3 * BUFFER_SIZE + 1);
        assert_eq!(c.tell().unwrap() as usize, input.len() - 2);
    }

    #[test]
    fn ahx_missing_ei() {
        let err = extract_inline_ahx(&mut cursor(b"0011>\nQ")).unwrap_err();
        assert_eq!(err.to_string(), "EI stream not found");
        let err = extract_inline_ahx(&mut cursor(b"0011>EIQ")).unwrap_err();
        assert_eq!(err.to_string(), "EI stream not found");
    }

    #[test]
    fn a85_ends_at_terminator() {
        let mut c = cursor(b"87cURD]i,\"Ebo80~>\nEI Q");
        assert_eq!(extract_inline_a85(&mut c).unwrap(), b"87cURD]i,\"Ebo80~>");
        assert_eq!(c.tell().unwrap(), 18);
    }

    #[test]
    fn a85_terminator_across_chunks() {
        let mut input = vec![b'!'; BUFFER_SIZE];
        input.extend_from_slice(b"~>EI");
        let mut c = cursor(&input);
        let data = extract_inline_a85(&mut c).unwrap();
        assert!(data.ends_with(b"~>"));
        assert_eq!(data.len(), BUFFER_SIZE + 2);
    }

    #[test]
    fn rl() {
        let mut c = cursor(b"\x02abc\xfez\x80 EI");
        assert_eq!(extract_inline_rl(&mut c).unwrap(), b"\x02abc\xfez\x80");
        assert_eq!(c.tell().unwrap(), 8);
    }

    #[test]
    fn dct_skips_segment_payload() {
        // SOI, APP0 segment whose payload contains FF D9, scan data, EOI
        let mut input = vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x06, 0xff, 0xd9, 0x12, 0x34];
        input.extend_from_slice(&[0x55, 0xff, 0x00, 0x66, 0xff, 0xff, 0xd9]);
        // fill bytes (FF FF) are kept as they are
        let expected = input.clone();
        input.extend_from_slice(b"\nEI Q");
        let mut c = cursor(&input);
        let data = extract_inline_dct(&mut c).unwrap();
        assert_eq!(data, expected);
        assert_eq!(c.tell().unwrap() as usize, input.len() - 4);
    }

    #[test]
    fn dct_drops_leading_garbage() {
        let mut c = cursor(b"xx\xff\xd8\xff\xd9 EI");
        assert_eq!(extract_inline_dct(&mut c).unwrap(), b"\xff\xd8\xff\xd9");
    }

    #[test]
    fn default_terminates_on_ws_ei_q() {
        let mut c = cursor(b"abc EI Q");
        assert_eq!(extract_inline_default(&mut c).unwrap(), b"abc ");
        assert_eq!(c.tell().unwrap(), 4);
        let mut c = cursor(b"abc\nEI\nEMC");
        assert_eq!(extract_inline_default(&mut c).unwrap(), b"abc\n");
        let mut c = cursor(b"abc EI ");
        assert_eq!(extract_inline_default(&mut c).unwrap(), b"abc ");
    }

    #[test]
    fn default_keeps_byte_before_ei() {
        let mut c = cursor(b"ab\x00EI Q");
        assert_eq!(extract_inline_default(&mut c).unwrap(), b"ab\x00");
        assert_eq!(c.tell().unwrap(), 3);
    }

    #[test]
    fn default_needs_whitespace_before_e() {
        let mut c = cursor(b"abcxEI Q def EI Q");
        assert_eq!(extract_inline_default(&mut c).unwrap(), b"abcxEI Q def ");
        assert_eq!(c.tell().unwrap(), 13);
        assert!(extract_inline_default(&mut cursor(b"abcxEI Q")).unwrap_err().is_eof());
    }

    #[test]
    fn default_needs_operator_after() {
        let mut c = cursor(b"a EI x b EI Q");
        assert_eq!(extract_inline_default(&mut c).unwrap(), b"a EI x b ");
        // `EI` without white-space after it
        let mut c = cursor(b"a EIQ b EI Q");
        assert_eq!(extract_inline_default(&mut c).unwrap(), b"a EIQ b ");
    }

    #[test]
    fn default_marker_across_chunks() {
        let mut input = vec![b'.'; BUFFER_SIZE - 1];
        input.extend_from_slice(b" EI Q");
        let mut c = cursor(&input);
        let data = extract_inline_default(&mut c).unwrap();
        assert_eq!(data.len(), BUFFER_SIZE);
        assert_eq!(data.last(), Some(&b' '));
    }

    #[test]
    fn missing_terminator_is_truncation() {
        type Extract = fn(&mut Cursor<&'static [u8]>) -> Result<Vec<u8>>;
        let extractors: [Extract; 5] = [
            extract_inline_ahx,
            extract_inline_a85,
            extract_inline_rl,
            extract_inline_dct,
            extract_inline_default,
        ];
        let payload: &'static [u8] = b"\x01\x02 abc \x7f 123";
        for extract in &extractors {
            let err = extract(&mut cursor(payload)).unwrap_err();
            assert!(matches!(err, PdfError::UnexpectedEnd), "{:?}", err);
            assert_eq!(err.to_string(), "Unexpected end of stream");
        }
    }

    fn dict(entries: &[(&str, Primitive)]) -> Dictionary {
        entries.iter().cloned().collect()
    }

    #[test]
    fn filter_selection() {
        let d = dict(&[("F", Primitive::Array(vec![Primitive::name("AHx"), Primitive::name("Fl")]))]);
        assert_eq!(filter_name(&d), Some("AHx"));
        let d = dict(&[("Filter", Primitive::name("DCTDecode"))]);
        assert_eq!(filter_name(&d), Some("DCTDecode"));
        assert_eq!(filter_name(&Dictionary::new()), None);

        let d = dict(&[("F", Primitive::name("A85"))]);
        let mut c = cursor(b"abc~> EI");
        assert_eq!(extract_image_data(&mut c, &d).unwrap(), b"abc~>");
    }

    #[test]
    fn unfiltered_size() {
        let d = dict(&[("W", 3.into()), ("H", 2.into()), ("CS", Primitive::name("RGB")), ("BPC", 8.into())]);
        assert_eq!(unfiltered_len(&d), Some(18));
        let d = dict(&[("W", 10.into()), ("H", 2.into()), ("IM", true.into())]);
        assert_eq!(unfiltered_len(&d), Some(4));
        let d = dict(&[("Width", 3.into()), ("Height", 1.into()), ("ColorSpace", Primitive::name("DeviceCMYK"))]);
        assert_eq!(unfiltered_len(&d), Some(12));
        assert_eq!(unfiltered_len(&dict(&[("W", 3.into())])), None);
    }

    #[test]
    fn unfiltered_size_overflow() {
        let d = dict(&[("W", i64::MAX.into()), ("H", 2.into()), ("CS", Primitive::name("RGB"))]);
        assert_eq!(unfiltered_len(&d), None);
        let d = dict(&[("W", 1.into()), ("H", i64::MAX.into()), ("BPC", 32.into())]);
        assert_eq!(unfiltered_len(&d), None);

        // the size is unusable, so the data is scanned for
        let d = dict(&[("W", i64::MAX.into()), ("H", 2.into()), ("CS", Primitive::name("RGB"))]);
        let mut c = cursor(b"abc EI Q");
        assert_eq!(extract_image_data(&mut c, &d).unwrap(), b"abc ");
    }

    #[test]
    fn unfiltered_data_may_contain_ei() {
        let d = dict(&[("W", 4.into()), ("H", 1.into()), ("CS", Primitive::name("G"))]);
        let mut c = cursor(b" EI \nEI Q");
        assert_eq!(extract_image_data(&mut c, &d).unwrap(), b" EI ");
        assert_eq!(c.tell().unwrap(), 5);
    }

    #[test]
    fn unfiltered_wrong_size_falls_back() {
        let d = dict(&[("W", 2.into()), ("H", 1.into())]);
        let mut c = cursor(b"abcd EI Q");
        assert_eq!(extract_image_data(&mut c, &d).unwrap(), b"abcd ");
        assert_eq!(c.tell().unwrap(), 5);
    }
}
