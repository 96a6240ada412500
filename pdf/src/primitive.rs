use crate::error::*;
use crate::object::{PlainRef, Resolve};
use crate::encoding::{decode_pdfdocencoding, encode_pdfdocencoding, utf16be_to_string, TextEncoding};
use crate::parser::lexer::is_delimiter;
use crate::crypt;

use std::{str, fmt, io};
use std::ops::{Index, Deref};
use std::convert::TryInto;
use std::borrow::Cow;
use indexmap::IndexMap;
use itertools::Itertools;
use istring::SmallString;

/// Largest magnitude a PDF integer may have here.
pub const MAX_INTEGER: f64 = 9_223_372_036_854_775_807.0;

/// The closed set of PDF object kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    Null,
    Integer (i64),
    Number (f32),
    Boolean (bool),
    String (PdfString),
    Stream (PdfStream),
    Dictionary (Dictionary),
    Array (Vec<Primitive>),
    Reference (PlainRef),
    Name (Name),
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Primitive::Null => write!(f, "null"),
            Primitive::Integer(i) => i.fmt(f),
            Primitive::Number(n) => n.fmt(f),
            Primitive::Boolean(b) => b.fmt(f),
            Primitive::String(ref s) => write!(f, "{:?}", s),
            Primitive::Stream(_) => write!(f, "stream"),
            Primitive::Dictionary(ref d) => d.fmt(f),
            Primitive::Array(ref arr) => write!(f, "[{}]", arr.iter().format(", ")),
            Primitive::Reference(r) => write!(f, "@{}", r.id),
            Primitive::Name(ref s) => s.fmt(f),
        }
    }
}
impl Primitive {
    /// Write the canonical byte form.
    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        self.write_to(out, None)
    }

    /// Write the canonical byte form. With an encryption key, string and stream payloads are
    /// RC4-transformed; all other kinds ignore the key.
    pub fn write_to(&self, out: &mut impl io::Write, key: Option<&[u8]>) -> Result<()> {
        match self {
            Primitive::Null => write!(out, "null")?,
            Primitive::Integer(i) => write!(out, "{}", i)?,
            Primitive::Number(n) => serialize_real(*n, out)?,
            Primitive::Boolean(b) => write!(out, "{}", b)?,
            Primitive::String(ref s) => s.write_to(out, key)?,
            Primitive::Stream(ref s) => s.write_to(out, key)?,
            Primitive::Dictionary(ref d) => d.write_to(out, key)?,
            Primitive::Array(ref arr) => serialize_list(arr, out, key)?,
            Primitive::Reference(r) => r.serialize(out)?,
            Primitive::Name(ref s) => serialize_name(s, out)?,
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.serialize(&mut buf)?;
        Ok(buf)
    }

    pub fn name(name: impl Into<Name>) -> Primitive {
        Primitive::Name(name.into())
    }

    /// An integer from an arbitrary number. Values that do not fit are rejected instead of wrapped.
    pub fn integer_from_f64(value: f64) -> Result<Primitive> {
        if !value.is_finite() || value.abs() >= MAX_INTEGER {
            return Err(PdfError::Overflow { value: value.to_string() });
        }
        Ok(Primitive::Integer(value.trunc() as i64))
    }

    /// A real number from its textual form, see `parse_or_default`.
    pub fn real(text: &str) -> Primitive {
        Primitive::Number(parse_or_default(text))
    }
}

/// Lenient real number parsing: text that is not a number yields `0`.
///
/// Producers write malformed reals often enough that rejecting them would make real files
/// unreadable, so this is policy rather than an error path.
pub fn parse_or_default(text: &str) -> f32 {
    match text.parse::<f32>() {
        Ok(f) if f.is_finite() => f,
        _ => {
            warn!("invalid real number {:?}, using 0", text);
            0.0
        }
    }
}

fn serialize_real(n: f32, out: &mut impl io::Write) -> Result<()> {
    if !n.is_finite() {
        bail!("can't write non-finite number {}", n);
    }
    write!(out, "{}", n)?;
    Ok(())
}

fn serialize_list(arr: &[Primitive], out: &mut impl io::Write, key: Option<&[u8]>) -> Result<()> {
    let mut parts = arr.iter();
    write!(out, "[")?;
    if let Some(first) = parts.next() {
        first.write_to(out, key)?;
    }
    for p in parts {
        write!(out, " ")?;
        p.write_to(out, key)?;
    }
    write!(out, "]")?;
    Ok(())
}

/// Writes `/Name`, escaping delimiters, white-space, `#` and non-printable bytes as `#XX`.
pub fn serialize_name(s: &str, out: &mut impl io::Write) -> Result<()> {
    write!(out, "/")?;
    for &b in s.as_bytes() {
        if b == b'#' || !(b'!' ..= b'~').contains(&b) || is_delimiter(b) {
            write!(out, "#{:02X}", b)?;
        } else {
            out.write_all(&[b])?;
        }
    }
    Ok(())
}

/// Primitive Dictionary type. Keys keep their insertion order.
#[derive(Default, Clone, PartialEq)]
pub struct Dictionary {
    dict: IndexMap<Name, Primitive>
}
impl Dictionary {
    pub fn new() -> Dictionary {
        Dictionary { dict: IndexMap::new()}
    }
    pub fn len(&self) -> usize {
        self.dict.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn get(&self, key: &str) -> Option<&Primitive> {
        self.dict.get(key)
    }
    pub fn contains_key(&self, key: &str) -> bool {
        self.dict.contains_key(key)
    }
    pub fn insert(&mut self, key: impl Into<Name>, val: impl Into<Primitive>) -> Option<Primitive> {
        self.dict.insert(key.into(), val.into())
    }
    pub fn iter(&self) -> impl Iterator<Item=(&Name, &Primitive)> {
        self.dict.iter()
    }
    pub fn keys(&self) -> impl Iterator<Item=&Name> {
        self.dict.keys()
    }
    pub fn remove(&mut self, key: &str) -> Option<Primitive> {
        self.dict.shift_remove(key)
    }
    /// like remove, but takes the name of the calling type and returns `PdfError::MissingEntry` if the entry is not found
    pub fn require(&mut self, typ: &'static str, key: &str) -> Result<Primitive> {
        self.remove(key).ok_or(
            PdfError::MissingEntry {
                typ,
                field: key.into()
            }
        )
    }

    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        self.write_to(out, None)
    }
    pub fn write_to(&self, out: &mut impl io::Write, key: Option<&[u8]>) -> Result<()> {
        writeln!(out, "<<")?;
        for (name, val) in self.iter() {
            serialize_name(name, out)?;
            write!(out, " ")?;
            val.write_to(out, key)?;
            writeln!(out)?;
        }
        write!(out, ">>")?;
        Ok(())
    }
}
impl Deref for Dictionary {
    type Target = IndexMap<Name, Primitive>;
    fn deref(&self) -> &IndexMap<Name, Primitive> {
        &self.dict
    }
}
impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{{")?;
        for (k, v) in self {
            writeln!(f, "{:>15}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}
impl fmt::Display for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{}>", self.iter().format_with(", ", |(k, v), f| f(&format_args!("{}={}", k, v))))
    }
}
impl<'a> Index<&'a str> for Dictionary {
    type Output = Primitive;
    fn index(&self, idx: &'a str) -> &Primitive {
        self.dict.index(idx)
    }
}
impl IntoIterator for Dictionary {
    type Item = (Name, Primitive);
    type IntoIter = indexmap::map::IntoIter<Name, Primitive>;
    fn into_iter(self) -> Self::IntoIter {
        self.dict.into_iter()
    }
}
impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a Name, &'a Primitive);
    type IntoIter = indexmap::map::Iter<'a, Name, Primitive>;
    fn into_iter(self) -> Self::IntoIter {
        self.dict.iter()
    }
}
impl<K: Into<Name>> FromIterator<(K, Primitive)> for Dictionary {
    fn from_iter<I: IntoIterator<Item=(K, Primitive)>>(iter: I) -> Self {
        Dictionary { dict: iter.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }
}

/// Primitive Stream (a dictionary followed by raw, still encoded, data)
#[derive(Clone, Debug, PartialEq)]
pub struct PdfStream {
    pub info: Dictionary,
    pub data: Vec<u8>,
}
impl PdfStream {
    pub fn new(info: Dictionary, data: Vec<u8>) -> PdfStream {
        PdfStream { info, data }
    }
    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        self.write_to(out, None)
    }
    /// `/Length` is rewritten to match the data actually written.
    pub fn write_to(&self, out: &mut impl io::Write, key: Option<&[u8]>) -> Result<()> {
        let data = match key {
            Some(key) => Cow::Owned(crypt::encrypt(&self.data, key)?),
            None => Cow::Borrowed(&self.data[..]),
        };
        let mut info = self.info.clone();
        info.insert("Length", Primitive::Integer(data.len() as i64));
        info.write_to(out, key)?;
        write!(out, "\nstream\n")?;
        out.write_all(&data)?;
        write!(out, "\nendstream")?;
        Ok(())
    }
}


macro_rules! unexpected_primitive {
    ($expected:ident, $found:expr) => (
        Err(PdfError::UnexpectedPrimitive {
            expected: stringify!($expected),
            found: $found
        })
    )
}

#[derive(Clone, PartialEq, Eq, Hash, Debug, Ord, PartialOrd)]
pub struct Name(pub SmallString);
impl Name {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Deref for Name {
    type Target = str;
    #[inline]
    fn deref(&self) -> &str {
        &self.0
    }
}
impl From<String> for Name {
    #[inline]
    fn from(s: String) -> Name {
        Name(s.into())
    }
}
impl From<SmallString> for Name {
    #[inline]
    fn from(s: SmallString) -> Name {
        Name(s)
    }
}
impl<'a> From<&'a str> for Name {
    #[inline]
    fn from(s: &'a str) -> Name {
        Name(s.into())
    }
}
impl PartialEq<str> for Name {
    #[inline]
    fn eq(&self, rhs: &str) -> bool {
        self.as_str() == rhs
    }
}
impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}
impl std::borrow::Borrow<str> for Name {
    #[inline]
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

/// Primitive String type. Holds the raw bytes; whether they are text, and in which encoding, is
/// derived from the bytes themselves (see `encoding`).
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct PdfString {
    pub data: Vec<u8>,
}
impl fmt::Debug for PdfString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\"")?;
        for &b in self.data.as_slice() {
            match b {
                b'"' => write!(f, "\\\"")?,
                b' ' ..= b'~' => write!(f, "{}", b as char)?,
                o @ 0 ..= 7  => write!(f, "\\{}", o)?,
                x => write!(f, "\\x{:02x}", x)?
            }
        }
        write!(f, "\"")
    }
}

impl PdfString {
    pub fn new(data: impl Into<Vec<u8>>) -> PdfString {
        PdfString {
            data: data.into()
        }
    }
    /// A text string: PDFDocEncoding when every character has a code there, UTF-16BE with a byte
    /// order mark otherwise.
    pub fn from_text(text: &str) -> PdfString {
        match encode_pdfdocencoding(text) {
            Ok(data) => PdfString { data },
            Err(_) => {
                let mut data = vec![0xfe, 0xff];
                for unit in text.encode_utf16() {
                    data.extend_from_slice(&unit.to_be_bytes());
                }
                PdfString { data }
            }
        }
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
    /// The text encoding of the bytes, `None` for binary strings.
    pub fn encoding(&self) -> Option<TextEncoding> {
        if self.data.starts_with(&[0xfe, 0xff]) {
            Some(TextEncoding::Utf16Be)
        } else if decode_pdfdocencoding(&self.data).is_ok() {
            Some(TextEncoding::PdfDoc)
        } else {
            None
        }
    }
    /// Decode as text, replacing what can't be decoded.
    pub fn to_string_lossy(&self) -> String {
        if self.data.starts_with(&[0xfe, 0xff]) {
            crate::encoding::utf16be_to_string_lossy(&self.data[2..])
        } else {
            match decode_pdfdocencoding(&self.data) {
                Ok(s) => s,
                Err(_) => String::from_utf8_lossy(&self.data).into()
            }
        }
    }
    /// Decode as text, failing on bytes that are not valid in the detected encoding.
    pub fn to_string(&self) -> Result<String> {
        if self.data.starts_with(&[0xfe, 0xff]) {
            utf16be_to_string(&self.data[2..])
        } else {
            decode_pdfdocencoding(&self.data)
        }
    }

    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        self.write_to(out, None)
    }
    /// Encrypted or non-ASCII strings are written in hex form, everything else as an escaped
    /// literal.
    pub fn write_to(&self, out: &mut impl io::Write, key: Option<&[u8]>) -> Result<()> {
        if let Some(key) = key {
            return write_hex(&crypt::encrypt(&self.data, key)?, out);
        }
        if self.data.iter().any(|&b| b >= 0x80) {
            return write_hex(&self.data, out);
        }
        write!(out, "(")?;
        for &b in self.data.as_slice() {
            match b {
                b'\\' | b'(' | b')' => out.write_all(&[b'\\', b])?,
                b'\n' => out.write_all(b"\\n")?,
                b'\r' => out.write_all(b"\\r")?,
                b'\t' => out.write_all(b"\\t")?,
                0x08 => out.write_all(b"\\b")?,
                0x0c => out.write_all(b"\\f")?,
                b if b < 0x20 || b == 0x7f => write!(out, "\\{:03o}", b)?,
                b => out.write_all(&[b])?,
            }
        }
        write!(out, ")")?;
        Ok(())
    }
}
fn write_hex(data: &[u8], out: &mut impl io::Write) -> Result<()> {
    write!(out, "<")?;
    for &b in data {
        write!(out, "{:02x}", b)?;
    }
    write!(out, ">")?;
    Ok(())
}
impl AsRef<[u8]> for PdfString {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
impl<'a> From<&'a str> for PdfString {
    fn from(value: &'a str) -> Self {
        PdfString::from_text(value)
    }
}
impl From<Vec<u8>> for PdfString {
    fn from(data: Vec<u8>) -> Self {
        PdfString { data }
    }
}

/// Build a string object from a dynamically typed value. Only strings and names qualify.
pub fn create_string_object(value: &Primitive) -> Result<PdfString> {
    match value {
        Primitive::String(s) => Ok(s.clone()),
        Primitive::Name(name) => Ok(PdfString::from_text(name)),
        _ => Err(PdfError::Type { msg: "create_string_object should have a string or name argument" }),
    }
}

impl Primitive {
    /// For debugging / error messages: get the name of the variant
    pub fn get_debug_name(&self) -> &'static str {
        match *self {
            Primitive::Null => "Null",
            Primitive::Integer (..) => "Integer",
            Primitive::Number (..) => "Number",
            Primitive::Boolean (..) => "Boolean",
            Primitive::String (..) => "String",
            Primitive::Stream (..) => "Stream",
            Primitive::Dictionary (..) => "Dictionary",
            Primitive::Array (..) => "Array",
            Primitive::Reference (..) => "Reference",
            Primitive::Name (..) => "Name",
        }
    }
    /// resolve the primitive if it is a reference, otherwise do nothing
    pub fn resolve(self, r: &impl Resolve) -> Result<Primitive> {
        match self {
            Primitive::Reference(id) => r.resolve(id),
            _ => Ok(self)
        }
    }
    pub fn as_integer(&self) -> Result<i64> {
        match *self {
            Primitive::Integer(n) => Ok(n),
            ref p => unexpected_primitive!(Integer, p.get_debug_name())
        }
    }
    pub fn as_usize(&self) -> Result<usize> {
        match *self {
            Primitive::Integer(n) if n >= 0 => Ok(n as usize),
            Primitive::Integer(_) => bail!("negative integer"),
            ref p => unexpected_primitive!(Integer, p.get_debug_name())
        }
    }
    pub fn as_number(&self) -> Result<f32> {
        match *self {
            Primitive::Integer(n) => Ok(n as f32),
            Primitive::Number(f) => Ok(f),
            ref p => unexpected_primitive!(Number, p.get_debug_name())
        }
    }
    pub fn as_bool(&self) -> Result<bool> {
        match *self {
            Primitive::Boolean (b) => Ok(b),
            ref p => unexpected_primitive!(Boolean, p.get_debug_name())
        }
    }
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Primitive::Name(ref name) => Ok(name.as_str()),
            p => unexpected_primitive!(Name, p.get_debug_name())
        }
    }
    pub fn as_string(&self) -> Result<&PdfString> {
        match self {
            Primitive::String(ref data) => Ok(data),
            p => unexpected_primitive!(String, p.get_debug_name())
        }
    }
    pub fn as_array(&self) -> Result<&[Primitive]> {
        match self {
            Primitive::Array(ref v) => Ok(v),
            p => unexpected_primitive!(Array, p.get_debug_name())
        }
    }
    pub fn as_dictionary(&self) -> Result<&Dictionary> {
        match self {
            Primitive::Dictionary(ref d) => Ok(d),
            Primitive::Stream(ref s) => Ok(&s.info),
            p => unexpected_primitive!(Dictionary, p.get_debug_name())
        }
    }
    pub fn into_reference(self) -> Result<PlainRef> {
        match self {
            Primitive::Reference(id) => Ok(id),
            p => unexpected_primitive!(Reference, p.get_debug_name())
        }
    }
    pub fn into_array(self) -> Result<Vec<Primitive>> {
        match self {
            Primitive::Array(v) => Ok(v),
            p => unexpected_primitive!(Array, p.get_debug_name())
        }
    }
    pub fn into_dictionary(self) -> Result<Dictionary> {
        match self {
            Primitive::Dictionary(dict) => Ok(dict),
            p => unexpected_primitive!(Dictionary, p.get_debug_name())
        }
    }
    pub fn into_name(self) -> Result<Name> {
        match self {
            Primitive::Name(name) => Ok(name),
            p => unexpected_primitive!(Name, p.get_debug_name())
        }
    }
    pub fn into_string(self) -> Result<PdfString> {
        match self {
            Primitive::String(data) => Ok(data),
            p => unexpected_primitive!(String, p.get_debug_name())
        }
    }
    pub fn into_stream(self) -> Result<PdfStream> {
        match self {
            Primitive::Stream (s) => Ok(s),
            p => unexpected_primitive!(Stream, p.get_debug_name())
        }
    }
    pub fn to_string_lossy(&self) -> Result<String> {
        let s = self.as_string()?;
        Ok(s.to_string_lossy())
    }
}

impl From<i64> for Primitive {
    fn from(x: i64) -> Primitive {
        Primitive::Integer(x)
    }
}
impl From<i32> for Primitive {
    fn from(x: i32) -> Primitive {
        Primitive::Integer(x as i64)
    }
}
impl From<f32> for Primitive {
    fn from(x: f32) -> Primitive {
        Primitive::Number(x)
    }
}
impl From<bool> for Primitive {
    fn from(x: bool) -> Primitive {
        Primitive::Boolean(x)
    }
}
impl From<Name> for Primitive {
    fn from(x: Name) -> Primitive {
        Primitive::Name(x)
    }
}
impl From<PdfString> for Primitive {
    fn from(x: PdfString) -> Primitive {
        Primitive::String (x)
    }
}
impl From<PdfStream> for Primitive {
    fn from(x: PdfStream) -> Primitive {
        Primitive::Stream (x)
    }
}
impl From<Dictionary> for Primitive {
    fn from(x: Dictionary) -> Primitive {
        Primitive::Dictionary (x)
    }
}
impl From<Vec<Primitive>> for Primitive {
    fn from(x: Vec<Primitive>) -> Primitive {
        Primitive::Array (x)
    }
}
impl From<PlainRef> for Primitive {
    fn from(x: PlainRef) -> Primitive {
        Primitive::Reference (x)
    }
}
impl<'a> TryInto<f32> for &'a Primitive {
    type Error = PdfError;
    fn try_into(self) -> Result<f32> {
        self.as_number()
    }
}
impl<'a> TryInto<i64> for &'a Primitive {
    type Error = PdfError;
    fn try_into(self) -> Result<i64> {
        self.as_integer()
    }
}
impl<'a> TryInto<Cow<'a, str>> for &'a Primitive {
    type Error = PdfError;
    fn try_into(self) -> Result<Cow<'a, str>> {
        match *self {
            Primitive::Name(ref s) => Ok(Cow::Borrowed(s.as_str())),
            Primitive::String(ref s) => Ok(Cow::Owned(s.to_string_lossy())),
            ref p => Err(PdfError::UnexpectedPrimitive {
                expected: "Name or String",
                found: p.get_debug_name()
            })
        }
    }
}
