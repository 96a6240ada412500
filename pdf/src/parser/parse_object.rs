//! Indirect object envelopes: `N G obj <object> endobj`.

use crate::error::*;
use crate::object::*;
use crate::parser::lexer::*;
use crate::parser::parse_object;
use crate::primitive::Primitive;

/// Reads the `N G obj` header.
pub fn read_object_header<S: ByteStream + ?Sized>(stream: &mut S) -> Result<PlainRef> {
    stream.skip_whitespace_and_comments()?;
    let id = stream.read_token()?;
    stream.skip_whitespace()?;
    let gen = stream.read_token()?;
    if id.is_empty() || gen.is_empty() {
        return Err(PdfError::EOF);
    }
    stream.next_expect("obj")?;
    Ok(PlainRef {
        id: std::str::from_utf8(&id)?.parse::<ObjNr>()?,
        gen: std::str::from_utf8(&gen)?.parse::<GenNr>()?,
    })
}

/// Parses an indirect object starting at the current position of `stream`. A missing `endobj` is
/// tolerated unless `r` is strict.
pub fn parse_indirect_object<S: ByteStream + ?Sized>(
    stream: &mut S,
    r: &impl Resolve,
) -> Result<(PlainRef, Primitive)> {
    let id = read_object_header(stream)?;
    let obj = parse_object(stream, r)?;

    let mark = stream.mark()?;
    if let Err(e) = stream.next_expect("endobj") {
        if r.strict() {
            return Err(e);
        }
        warn!("object {} {}: {}", id.id, id.gen, e);
        stream.reset(mark)?;
    }

    Ok((id, obj))
}
