//! Basic functionality for parsing PDF objects from a byte stream.

pub mod lexer;
mod parse_object;

pub use self::lexer::*;
pub use self::parse_object::*;

use crate::error::*;
use crate::primitive::{Primitive, Dictionary, PdfStream, PdfString, Name, parse_or_default};
use crate::object::{ObjNr, GenNr, PlainRef, Resolve};
use crate::encoding::decode_pdfdocencoding;
use self::lexer::{HexStringLexer, StringLexer, decode_nibble};

use std::io::Cursor;

/// Parse one object from `data`. Indirect stream lengths are looked up through `r`.
pub fn parse(data: &[u8], r: &impl Resolve) -> Result<Primitive> {
    parse_object(&mut Cursor::new(data), r)
}

/// How deep arrays and dictionaries may nest inside one object.
pub const MAX_DEPTH: usize = 256;

/// Recursive. Parses the object starting at the next significant byte of `stream` and leaves the
/// cursor right after it.
pub fn parse_object<S: ByteStream + ?Sized>(stream: &mut S, r: &impl Resolve) -> Result<Primitive> {
    parse_nested(stream, r, MAX_DEPTH)
}

/// `depth` is the number of container levels still allowed below this object.
fn parse_nested<S: ByteStream + ?Sized>(stream: &mut S, r: &impl Resolve, depth: usize) -> Result<Primitive> {
    if depth == 0 {
        let pos = stream.tell()?;
        return Err(PdfError::read(format!("Objects nested deeper than {} levels @{}", MAX_DEPTH, pos)));
    }
    let first = match stream.skip_whitespace_and_comments()? {
        Some(b) => b,
        None => return Err(PdfError::EOF),
    };
    let obj = match first {
        b'/' => Primitive::Name(read_name(stream)?),
        b'<' => {
            if stream.peek_n(2)? == b"<<" {
                read_dictionary_nested(stream, r, depth - 1)?
            } else {
                Primitive::String(read_hex_string(stream)?)
            }
        }
        b'[' => Primitive::Array(read_array_nested(stream, r, depth - 1)?),
        b't' | b'f' => Primitive::Boolean(read_bool(stream)?),
        b'(' => Primitive::String(read_string(stream)?),
        b'n' => {
            read_null(stream)?;
            Primitive::Null
        }
        b'0' ..= b'9' if reference_ahead(stream)? => Primitive::Reference(read_reference(stream)?),
        b'0' ..= b'9' | b'+' | b'-' | b'.' => read_number(stream)?,
        b => {
            let pos = stream.tell()?;
            let peek = stream.peek_n(20)?;
            return Err(PdfError::read(format!(
                "Invalid Elementary Object starting with {:?} @{}: {:?}",
                b as char, pos, String::from_utf8_lossy(&peek)
            )));
        }
    };
    trace!("parsed {}", obj);
    Ok(obj)
}

pub fn read_bool<S: ByteStream + ?Sized>(stream: &mut S) -> Result<bool> {
    let word = stream.read_n(4)?;
    if word == b"true" {
        Ok(true)
    } else if word == b"fals" && stream.read_n(1)? == b"e" {
        Ok(false)
    } else {
        Err(PdfError::read("Could not read Boolean object"))
    }
}

pub fn read_null<S: ByteStream + ?Sized>(stream: &mut S) -> Result<()> {
    if stream.read_n(4)? == b"null" {
        Ok(())
    } else {
        Err(PdfError::read("Could not read Null object"))
    }
}

/// Reads an integer or a real. Reals are parsed leniently (see `parse_or_default`), and so are
/// integers made of sign characters only; integers too large for an `i64` are an `Overflow`.
pub fn read_number<S: ByteStream + ?Sized>(stream: &mut S) -> Result<Primitive> {
    let pos = stream.tell()?;
    let token = stream.read_while(|b| matches!(b, b'+' | b'-' | b'.' | b'0' ..= b'9'))?;
    if token.is_empty() {
        return Err(PdfError::read(format!("Could not read number at byte {}", pos)));
    }
    // only ASCII was accepted above
    let text = std::str::from_utf8(&token)?;
    if text.contains('.') {
        return Ok(Primitive::Number(parse_or_default(text)));
    }
    match text.parse::<i64>() {
        Ok(i) => Ok(Primitive::Integer(i)),
        Err(_) if text.bytes().any(|b| b.is_ascii_digit()) && text[1..].bytes().all(|b| b.is_ascii_digit()) => {
            Err(PdfError::Overflow { value: text.into() })
        }
        Err(_) => {
            warn!("invalid integer {:?} at byte {}, using 0", text, pos);
            Ok(Primitive::Integer(0))
        }
    }
}

/// Reads a `/Name`, decoding `#XX` escapes.
pub fn read_name<S: ByteStream + ?Sized>(stream: &mut S) -> Result<Name> {
    if stream.read_byte()? != Some(b'/') {
        return Err(PdfError::read("name read error"));
    }
    let raw = stream.read_token()?;
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            if let (Some(hi), Some(lo)) = (decode_nibble(raw[i + 1]), decode_nibble(raw[i + 2])) {
                bytes.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }
    let name = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            warn!("name {:?} is not UTF-8", String::from_utf8_lossy(&bytes));
            decode_pdfdocencoding(&bytes).unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into())
        }
    };
    Ok(Name::from(name))
}

/// Reads a literal string. The first byte is taken to be the opening parenthesis.
pub fn read_string<S: ByteStream + ?Sized>(stream: &mut S) -> Result<PdfString> {
    stream.next_byte()?;
    Ok(PdfString::new(StringLexer::new(stream).read_all()?))
}

/// Reads a hex string up to and including the closing `>`. The first byte is taken to be the
/// opening `<`.
pub fn read_hex_string<S: ByteStream + ?Sized>(stream: &mut S) -> Result<PdfString> {
    stream.next_byte()?;
    Ok(PdfString::new(HexStringLexer::new(stream).read_all()?))
}

pub fn read_array<S: ByteStream + ?Sized>(stream: &mut S, r: &impl Resolve) -> Result<Vec<Primitive>> {
    read_array_nested(stream, r, MAX_DEPTH)
}

fn read_array_nested<S: ByteStream + ?Sized>(stream: &mut S, r: &impl Resolve, depth: usize) -> Result<Vec<Primitive>> {
    if stream.read_byte()? != Some(b'[') {
        return Err(PdfError::read("Could not read array"));
    }
    let mut arr = Vec::new();
    loop {
        match stream.skip_whitespace_and_comments()? {
            None => return Err(PdfError::read("Could not read array")),
            Some(b']') => {
                stream.next_byte()?;
                return Ok(arr);
            }
            Some(_) => arr.push(parse_nested(stream, r, depth)?),
        }
    }
}

/// Reads `N G R`. Each number ends at the first white-space byte; running out of input on the way
/// is a truncation error.
pub fn read_reference<S: ByteStream + ?Sized>(stream: &mut S) -> Result<PlainRef> {
    let mut id = Vec::new();
    loop {
        let b = stream.next_byte()?;
        if is_whitespace(b) {
            break;
        }
        id.push(b);
    }
    let mut gen = Vec::new();
    loop {
        let b = stream.next_byte()?;
        if is_whitespace(b) {
            if gen.is_empty() {
                continue;
            }
            break;
        }
        gen.push(b);
    }
    if stream.read_non_whitespace()? != Some(b'R') {
        let pos = stream.tell()?;
        return Err(PdfError::read(format!("Error reading indirect object reference at byte {:#x}", pos)));
    }
    Ok(PlainRef {
        id: std::str::from_utf8(&id)?.parse::<ObjNr>()?,
        gen: std::str::from_utf8(&gen)?.parse::<GenNr>()?,
    })
}

/// Whether the stream continues with `<digits> <ws> <digits> <ws> R`, the `R` not being the
/// start of a longer word. Leaves the cursor where it was.
fn reference_ahead<S: ByteStream + ?Sized>(stream: &mut S) -> Result<bool> {
    let mark = stream.mark()?;
    let found = scan_reference(stream);
    stream.reset(mark)?;
    found
}

fn scan_reference<S: ByteStream + ?Sized>(stream: &mut S) -> Result<bool> {
    for _ in 0 .. 2 {
        if stream.read_while(|b| b.is_ascii_digit())?.is_empty() {
            return Ok(false);
        }
        if stream.read_while(is_whitespace)?.is_empty() {
            return Ok(false);
        }
    }
    if stream.read_byte()? != Some(b'R') {
        return Ok(false);
    }
    Ok(!matches!(stream.read_byte()?, Some(b) if b.is_ascii_alphabetic()))
}

/// Reads `<< ... >>`, and the stream data if the `stream` keyword follows.
pub fn read_dictionary<S: ByteStream + ?Sized>(stream: &mut S, r: &impl Resolve) -> Result<Primitive> {
    read_dictionary_nested(stream, r, MAX_DEPTH)
}

fn read_dictionary_nested<S: ByteStream + ?Sized>(stream: &mut S, r: &impl Resolve, depth: usize) -> Result<Primitive> {
    let start = stream.tell()?;
    if stream.read_n(2)? != b"<<" {
        return Err(PdfError::read(format!(
            "Dictionary read error at byte {:#x}: stream must begin with '<<'", start
        )));
    }
    let mut dict = Dictionary::new();
    loop {
        match stream.skip_whitespace_and_comments()? {
            None => return Err(PdfError::EOF),
            Some(b'>') => {
                if stream.read_n(2)? != b">>" {
                    let pos = stream.tell()?;
                    return Err(PdfError::read(format!("Dictionary read error at byte {:#x}", pos)));
                }
                break;
            }
            Some(_) => {}
        }
        let key_pos = stream.tell()?;
        let key = match parse_nested(stream, r, depth)? {
            Primitive::Name(name) => name,
            p => return Err(PdfError::read(format!(
                "Expecting a name as dictionary key at byte {:#x}, found {}", key_pos, p.get_debug_name()
            ))),
        };
        let value = parse_nested(stream, r, depth)?;
        if dict.contains_key(&key) {
            if r.strict() {
                return Err(PdfError::read(format!(
                    "Multiple definitions in dictionary at byte {:#x} for key {}", key_pos, key
                )));
            }
            warn!("Multiple definitions in dictionary at byte {:#x} for key {}", key_pos, key);
        } else {
            dict.insert(key, value);
        }
    }

    // It might just be the dictionary in front of a stream.
    let after = stream.mark()?;
    stream.skip_whitespace()?;
    if stream.peek_n(6)? != b"stream" {
        stream.reset(after)?;
        return Ok(Primitive::Dictionary(dict));
    }
    stream.read_n(6)?;
    read_stream_eol(stream)?;

    let data_start = stream.tell()?;
    let length = match dict.get("Length") {
        Some(&Primitive::Integer(n)) => Some(n),
        Some(&Primitive::Reference(id)) => {
            let mark = stream.mark()?;
            let length = r.resolve(id)?.as_integer()?;
            stream.reset(mark)?;
            Some(length)
        }
        _ => None,
    };

    if let Some(length) = length.filter(|&n| n >= 0) {
        let data = stream.read_n(length as usize)?;
        let mark = stream.mark()?;
        stream.skip_whitespace()?;
        if data.len() == length as usize && stream.peek_n(9)? == b"endstream" {
            stream.read_n(9)?;
            return Ok(Primitive::Stream(PdfStream::new(dict, data)));
        }
        stream.reset(mark)?;
        warn!("stream at byte {} does not end after /Length {}, looking for endstream", data_start, length);
    }

    stream.seek_to(data_start)?;
    match read_until_endstream(stream)? {
        Some(data) => Ok(Primitive::Stream(PdfStream::new(dict, data))),
        None => {
            stream.seek_to(data_start)?;
            Err(PdfError::read(format!(
                "Unable to find 'endstream' marker after stream at byte {:#x}", data_start
            )))
        }
    }
}

/// After the `stream` keyword: skip spaces, then a single `\n`, `\r\n` or `\r`.
fn read_stream_eol<S: ByteStream + ?Sized>(stream: &mut S) -> Result<()> {
    let mut eol = stream.next_byte()?;
    while eol == b' ' {
        eol = stream.next_byte()?;
    }
    match eol {
        b'\n' => {}
        b'\r' => {
            if stream.peek_byte()? == Some(b'\n') {
                stream.next_byte()?;
            }
        }
        _ => {
            warn!("stream keyword not followed by a newline");
            stream.unread(1)?;
        }
    }
    Ok(())
}

const ENDSTREAM: &[u8] = b"endstream";

/// Scan for `endstream`. Returns the data in front of it (minus the end-of-line that precedes
/// the keyword) and leaves the cursor after the keyword, or `None` if there is no marker.
fn read_until_endstream<S: ByteStream + ?Sized>(stream: &mut S) -> Result<Option<Vec<u8>>> {
    let mut data = Vec::new();
    loop {
        let chunk = stream.read_n(8192)?;
        if chunk.is_empty() {
            return Ok(None);
        }
        let searched_from = data.len().saturating_sub(ENDSTREAM.len() - 1);
        data.extend_from_slice(&chunk);
        if let Some(i) = find(&data[searched_from..], ENDSTREAM) {
            let end = searched_from + i;
            // step back to just after the marker
            let past = (data.len() - end - ENDSTREAM.len()) as i64;
            stream.step(-past)?;
            data.truncate(end);
            if data.ends_with(b"\r\n") {
                data.truncate(end - 2);
            } else if data.ends_with(b"\n") || data.ends_with(b"\r") {
                data.truncate(end - 1);
            }
            return Ok(Some(data));
        }
    }
}

/// Position of the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{NoResolve, ObjectTable};

    fn cursor(data: &[u8]) -> Cursor<&[u8]> {
        Cursor::new(data)
    }

    #[test]
    fn bool_roundtrip() {
        for &text in &[&b"true"[..], b"false"] {
            let p = parse(text, &NoResolve).unwrap();
            assert_eq!(p.to_bytes().unwrap(), text);
        }
    }

    #[test]
    fn bool_error() {
        let err = read_bool(&mut cursor(b"False")).unwrap_err();
        assert_eq!(err.to_string(), "Could not read Boolean object");
        assert!(read_bool(&mut cursor(b"fal")).is_err());
    }

    #[test]
    fn null() {
        assert_eq!(parse(b"null", &NoResolve).unwrap(), Primitive::Null);
        let err = read_null(&mut cursor(b"nul")).unwrap_err();
        assert_eq!(err.to_string(), "Could not read Null object");
    }

    #[test]
    fn numbers() {
        assert_eq!(parse(b"42", &NoResolve).unwrap(), Primitive::Integer(42));
        assert_eq!(parse(b"-17 ", &NoResolve).unwrap(), Primitive::Integer(-17));
        assert_eq!(parse(b"+3", &NoResolve).unwrap(), Primitive::Integer(3));
        assert_eq!(parse(b"3.25", &NoResolve).unwrap(), Primitive::Number(3.25));
        assert_eq!(parse(b"-.5", &NoResolve).unwrap(), Primitive::Number(-0.5));
        assert_eq!(parse(b"1.2.3", &NoResolve).unwrap(), Primitive::Number(0.0));
        assert_eq!(parse(b"--", &NoResolve).unwrap(), Primitive::Integer(0));
    }

    #[test]
    fn integer_overflow() {
        let err = parse(b"99999999999999999999999", &NoResolve).unwrap_err();
        assert!(matches!(err, PdfError::Overflow { .. }));
        let err = parse(b"-99999999999999999999999", &NoResolve).unwrap_err();
        assert!(matches!(err, PdfError::Overflow { .. }));
    }

    #[test]
    fn name() {
        let mut c = cursor(b"/Type/Page");
        assert_eq!(read_name(&mut c).unwrap(), *"Type");
        assert_eq!(c.tell().unwrap(), 5);
        assert_eq!(read_name(&mut cursor(b"/A#20B#23")).unwrap(), *"A B#");
        // incomplete escapes stay as they are
        assert_eq!(read_name(&mut cursor(b"/A#2")).unwrap(), *"A#2");
        let err = read_name(&mut cursor(b"Name")).unwrap_err();
        assert_eq!(err.to_string(), "name read error");
    }

    #[test]
    fn name_serialize_roundtrip() {
        let p = Primitive::name("odd name/(#)");
        let bytes = p.to_bytes().unwrap();
        assert_eq!(parse(&bytes, &NoResolve).unwrap(), p);
    }

    #[test]
    fn literal_string() {
        let p = parse(b"(Hello (World)\\n)", &NoResolve).unwrap();
        assert_eq!(p.as_string().unwrap().as_bytes(), b"Hello (World)\n");
        assert!(read_string(&mut cursor(b"x")).unwrap_err().is_eof());
    }

    #[test]
    fn hex_string() {
        let mut c = cursor(b"a1>");
        assert_eq!(read_hex_string(&mut c).unwrap().as_bytes(), b"\x10");
        assert_eq!(c.tell().unwrap(), 3);
        let p = parse(b"<48 65 6C6C 6f>", &NoResolve).unwrap();
        assert_eq!(p.as_string().unwrap().as_bytes(), b"Hello");
        assert!(read_hex_string(&mut cursor(b"<4142")).unwrap_err().is_eof());
    }

    #[test]
    fn array() {
        let p = parse(b"[1 2.5 /N (s) [true] <<>> 3 0 R null]", &NoResolve).unwrap();
        let arr = p.as_array().unwrap();
        assert_eq!(arr.len(), 8);
        assert_eq!(arr[0], Primitive::Integer(1));
        assert_eq!(arr[1], Primitive::Number(2.5));
        assert_eq!(arr[4], Primitive::Array(vec![Primitive::Boolean(true)]));
        assert_eq!(arr[5], Primitive::Dictionary(Dictionary::new()));
        assert_eq!(arr[6], Primitive::Reference(PlainRef { id: 3, gen: 0 }));
        assert_eq!(arr[7], Primitive::Null);
        assert_eq!(parse(b"[]", &NoResolve).unwrap(), Primitive::Array(vec![]));
    }

    #[test]
    fn array_errors() {
        let err = read_array(&mut cursor(b"(1 2)"), &NoResolve).unwrap_err();
        assert_eq!(err.to_string(), "Could not read array");
        let err = read_array(&mut cursor(b"[1 2 "), &NoResolve).unwrap_err();
        assert_eq!(err.to_string(), "Could not read array");
    }

    #[test]
    fn numbers_are_not_references() {
        let p = parse(b"[0 0 612 792]", &NoResolve).unwrap();
        assert_eq!(p.as_array().unwrap().len(), 4);
        // `R` starting a longer word
        let p = parse(b"[1 0 RG]", &NoResolve);
        assert!(p.is_err());
        let p = parse(b"12 0 R", &NoResolve).unwrap();
        assert_eq!(p, Primitive::Reference(PlainRef { id: 12, gen: 0 }));
    }

    #[test]
    fn reference_truncated() {
        for &data in &[&b""[..], b"False", b"foo ", b"foo  ", b"foo bar"] {
            let err = read_reference(&mut cursor(data)).unwrap_err();
            assert!(err.is_eof(), "{:?}", data);
            assert_eq!(err.to_string(), STREAM_TRUNCATED_PREMATURELY);
        }
        let err = read_reference(&mut cursor(b"1 0 X")).unwrap_err();
        assert!(matches!(err, PdfError::Read { .. }));
    }

    #[test]
    fn comments_are_skipped() {
        let p = parse(b"% comment\n<< /A % another\n 1 >>", &NoResolve).unwrap();
        assert_eq!(p.as_dictionary().unwrap()["A"], Primitive::Integer(1));
    }

    #[test]
    fn dictionary_roundtrip_keeps_order() {
        let mut d = Dictionary::new();
        d.insert("Zeta", Primitive::Integer(1));
        d.insert("Alpha", Primitive::name("X"));
        d.insert("Mid", Primitive::Array(vec![Primitive::Number(1.5), Primitive::Null]));
        d.insert("Str", Primitive::String(PdfString::new(&b"a)b"[..])));
        let mut inner = Dictionary::new();
        inner.insert("Ref", PlainRef { id: 4, gen: 1 });
        d.insert("Inner", inner);
        let p = Primitive::Dictionary(d);

        let parsed = parse(&p.to_bytes().unwrap(), &NoResolve).unwrap();
        let keys: Vec<&str> = parsed.as_dictionary().unwrap().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["Zeta", "Alpha", "Mid", "Str", "Inner"]);
        assert_eq!(parsed, p);
    }

    #[test]
    fn dictionary_key_must_be_name() {
        let err = parse(b"<< 1 2 >>", &NoResolve).unwrap_err();
        assert!(matches!(err, PdfError::Read { .. }));
    }

    #[test]
    fn dictionary_duplicate_keys() {
        let p = parse(b"<< /A 1 /A 2 >>", &NoResolve).unwrap();
        assert_eq!(p.as_dictionary().unwrap()["A"], Primitive::Integer(1));
        assert!(parse(b"<< /A 1 /A 2 >>", &ObjectTable::new_strict()).is_err());
    }

    #[test]
    fn dictionary_followed_by_other_token() {
        let mut c = cursor(b"<< /A 1 >> endobj");
        let p = parse_object(&mut c, &NoResolve).unwrap();
        assert!(matches!(p, Primitive::Dictionary(_)));
        assert_eq!(c.tell().unwrap(), 10);
    }

    #[test]
    fn stream_with_length() {
        let mut c = cursor(b"<< /Length 5 >>\nstream\r\nhello\nendstream endobj");
        let s = parse_object(&mut c, &NoResolve).unwrap().into_stream().unwrap();
        assert_eq!(s.data, b"hello");
        assert_eq!(c.tell().unwrap(), 39);
    }

    #[test]
    fn stream_with_wrong_length() {
        let s = parse(b"<< /Length 2 >> stream\nhello\nendstream", &NoResolve).unwrap().into_stream().unwrap();
        assert_eq!(s.data, b"hello");
        let s = parse(b"<< /Length 50 >> stream\nhello\r\nendstream", &NoResolve).unwrap().into_stream().unwrap();
        assert_eq!(s.data, b"hello");
        let s = parse(b"<< >> stream\nhi\nendstream", &NoResolve).unwrap().into_stream().unwrap();
        assert_eq!(s.data, b"hi");
    }

    #[test]
    fn stream_without_endstream() {
        let err = parse(b"<< /Length 2 >> stream\nhello", &NoResolve).unwrap_err();
        assert!(err.to_string().starts_with("Unable to find 'endstream' marker after stream at byte"));
    }

    #[test]
    fn stream_with_indirect_length() {
        let mut table = ObjectTable::new();
        table.insert(PlainRef { id: 7, gen: 0 }, Primitive::Integer(3));
        let mut c = cursor(b"<< /Length 7 0 R >>\nstream\nabc\nendstream");
        let s = parse_object(&mut c, &table).unwrap().into_stream().unwrap();
        assert_eq!(s.data, b"abc");
        assert_eq!(s.info["Length"], Primitive::Reference(PlainRef { id: 7, gen: 0 }));
    }

    #[test]
    fn deeply_nested() {
        let ok = [&b"[".repeat(200)[..], b"1", &b"]".repeat(200)[..]].concat();
        assert!(parse(&ok, &NoResolve).is_ok());

        let err = parse(&b"[".repeat(100_000), &NoResolve).unwrap_err();
        assert!(err.to_string().starts_with("Objects nested deeper than 256 levels"));
        let err = parse(&b"<< /A ".repeat(100_000), &NoResolve).unwrap_err();
        assert!(matches!(err, PdfError::Read { .. }));
    }

    #[test]
    fn invalid_start() {
        let err = parse(b")", &NoResolve).unwrap_err();
        assert!(err.to_string().starts_with("Invalid Elementary Object"));
        assert!(parse(b"   ", &NoResolve).unwrap_err().is_eof());
    }
}
