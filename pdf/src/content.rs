/// PDF content streams.
use std::fmt::{self, Display, Formatter};
use std::mem::replace;
use std::io::{Cursor, Write};
use itertools::Itertools;

use crate::error::*;
use crate::object::*;
use crate::parser::{parse_object, ByteStream, is_regular, is_whitespace};
use crate::primitive::*;
use crate::enc::{self, StreamFilter};
use crate::inline::extract_image_data;

/// Operation in a PDF content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Op {
        operator: String,
        operands: Vec<Primitive>,
    },
    InlineImage(InlineImage),
}

impl Operation {
    pub fn new(operator: impl Into<String>, operands: Vec<Primitive>) -> Operation {
        Operation::Op {
            operator: operator.into(),
            operands,
        }
    }
    pub fn operator(&self) -> &str {
        match self {
            Operation::Op { operator, .. } => operator,
            Operation::InlineImage(_) => "BI",
        }
    }
    pub fn write_to(&self, out: &mut impl Write) -> Result<()> {
        match self {
            Operation::Op { operator, operands } => {
                for arg in operands {
                    arg.serialize(out)?;
                    out.write_all(b" ")?;
                }
                writeln!(out, "{}", operator)?;
            }
            Operation::InlineImage(image) => image.write_to(out)?,
        }
        Ok(())
    }
}

/// `BI <dict> ID <data> EI`. The dictionary may use the abbreviated keys and filter names.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub dict: Dictionary,
    /// As found in the content stream, still encoded.
    pub data: Vec<u8>,
}

impl InlineImage {
    fn entry(&self, short: &str, long: &str) -> Option<&Primitive> {
        self.dict.get(short).or_else(|| self.dict.get(long))
    }

    /// The image data with the declared filters undone.
    pub fn decoded(&self, resolve: &impl Resolve) -> Result<Vec<u8>> {
        let filters = StreamFilter::chain(self.entry("F", "Filter"), self.entry("DP", "DecodeParms"), resolve)?;
        enc::decode_all(&self.data, &filters)
    }

    pub fn write_to(&self, out: &mut impl Write) -> Result<()> {
        writeln!(out, "BI")?;
        for (key, val) in self.dict.iter() {
            serialize_name(key.as_str(), out)?;
            out.write_all(b" ")?;
            val.serialize(out)?;
            out.write_all(b"\n")?;
        }
        out.write_all(b"ID ")?;
        out.write_all(&self.data)?;
        if !self.data.last().map_or(false, |&b| is_whitespace(b)) {
            out.write_all(b"\n")?;
        }
        out.write_all(b"EI\n")?;
        Ok(())
    }
}

/// Represents a PDF content stream - a `Vec` of `Operation`s
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Content {
    pub operations: Vec<Operation>,
}

impl Content {
    pub fn new(operations: Vec<Operation>) -> Content {
        Content { operations }
    }

    /// Tokenize decoded content stream data.
    pub fn parse(data: &[u8], resolve: &impl Resolve) -> Result<Content> {
        let mut stream = Cursor::new(data);
        let mut content = Content::default();
        let mut buffer = Vec::new();

        while let Some(b) = stream.skip_whitespace_and_comments()? {
            if !is_regular(b) || matches!(b, b'0' ..= b'9' | b'+' | b'-' | b'.') {
                // Operand
                buffer.push(parse_object(&mut stream, resolve)?);
                continue;
            }
            let token = stream.read_token()?;
            match &token[..] {
                b"true" => buffer.push(Primitive::Boolean(true)),
                b"false" => buffer.push(Primitive::Boolean(false)),
                b"null" => buffer.push(Primitive::Null),
                b"BI" => {
                    if !buffer.is_empty() {
                        warn!("dropping {} operands in front of BI", buffer.len());
                        buffer.clear();
                    }
                    let image = read_inline_image(&mut stream, resolve)?;
                    content.operations.push(Operation::InlineImage(image));
                }
                _ => {
                    // It's not an object/operand - treat it as an operator.
                    let operator = String::from_utf8_lossy(&token).into_owned();
                    content.operations.push(Operation::new(operator, replace(&mut buffer, Vec::new())));
                }
            }
        }
        if !buffer.is_empty() {
            warn!("{} trailing operands without an operator", buffer.len());
        }
        Ok(content)
    }

    pub fn write_to(&self, out: &mut impl Write) -> Result<()> {
        for op in &self.operations {
            op.write_to(out)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.write_to(&mut data)?;
        Ok(data)
    }
}

/// Reads what follows `BI`: the image dictionary up to `ID`, the data and the closing `EI`.
fn read_inline_image(stream: &mut Cursor<&[u8]>, resolve: &impl Resolve) -> Result<InlineImage> {
    let mut dict = Dictionary::new();
    loop {
        match stream.skip_whitespace_and_comments()? {
            None => return Err(PdfError::EOF),
            Some(b'I') if stream.peek_n(2)? == b"ID" => {
                stream.step(2)?;
                break;
            }
            Some(_) => {
                let key = parse_object(stream, resolve)?.into_name()?;
                let val = parse_object(stream, resolve)?;
                dict.insert(key, val);
            }
        }
    }
    // a single white-space byte separates ID from the data
    match stream.read_byte()? {
        Some(b) if is_whitespace(b) => {}
        Some(_) => stream.unread(1)?,
        None => return Err(PdfError::EOF),
    }
    let data = extract_image_data(stream, &dict)?;
    stream.next_expect("EI")?;
    Ok(InlineImage { dict, data })
}

impl Object for Content {
    /// A content stream, or an array of them to be read as one.
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        match p.resolve(resolve)? {
            Primitive::Array(parts) => {
                let mut content_data = Vec::new();
                for p in parts {
                    let part = p.resolve(resolve)?.into_stream()?;
                    content_data.extend(enc::decode_stream(&part, resolve)?);
                    content_data.push(b'\n');
                }
                Content::parse(&content_data, resolve)
            }
            p => {
                let stream = p.into_stream()?;
                Content::parse(&enc::decode_stream(&stream, resolve)?, resolve)
            }
        }
    }
}
impl ObjectWrite for Content {
    fn to_primitive(&self) -> Result<Primitive> {
        Ok(Primitive::Stream(PdfStream::new(Dictionary::new(), self.to_bytes()?)))
    }
}

impl Display for Content {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(f, "Content:")?;
        for operation in &self.operations {
            writeln!(f, "  {}", operation)?;
        }
        Ok(())
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Operation::Op { operator, operands } => write!(f, "{} : {}", operator, operands.iter().format(", ")),
            Operation::InlineImage(image) => write!(f, "BI {} ({} bytes)", image.dict, image.data.len()),
        }
    }
}
