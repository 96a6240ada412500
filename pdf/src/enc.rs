//! Stream filters.

use itertools::Itertools;
use deflate::deflate_bytes_zlib;

use crate::error::*;
use crate::object::{Object, Resolve};
use crate::primitive::{Primitive, Dictionary, PdfStream};
use crate::parser::lexer::decode_nibble;
use std::convert::TryInto;
use std::io::Read;


#[derive(Debug, Clone, PartialEq)]
pub struct FlateParams {
    pub predictor: i64,
    pub n_components: usize,
    pub bits_per_component: usize,
    pub columns: usize,
    /// LZW only: whether the code width grows one code early.
    pub early_change: i64,
}
impl Default for FlateParams {
    fn default() -> FlateParams {
        FlateParams {
            predictor: 1,
            n_components: 1,
            bits_per_component: 8,
            columns: 1,
            early_change: 1,
        }
    }
}
impl Object for FlateParams {
    fn from_primitive(p: Primitive, r: &impl Resolve) -> Result<Self> {
        let dict = match p.resolve(r)? {
            Primitive::Null => return Ok(FlateParams::default()),
            p => p.into_dictionary()?,
        };
        let get = |key: &str, default: i64| -> Result<i64> {
            match dict.get(key) {
                Some(p) => i64::from_primitive(p.clone(), r),
                None => Ok(default),
            }
        };
        let positive = |key: &str, default: i64| -> Result<usize> {
            match get(key, default)? {
                n if n > 0 => Ok(n as usize),
                n => bail!("/{} must be positive, found {}", key, n),
            }
        };
        Ok(FlateParams {
            predictor: get("Predictor", 1)?,
            n_components: positive("Colors", 1)?,
            bits_per_component: positive("BitsPerComponent", 8)?,
            columns: positive("Columns", 1)?,
            early_change: get("EarlyChange", 1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamFilter {
    ASCIIHexDecode,
    ASCII85Decode,
    RunLengthDecode,
    FlateDecode (FlateParams),
    LZWDecode (FlateParams),
    /// Image codecs. Their data is passed on as it is.
    DCTDecode,
    JPXDecode,
    CCITTFaxDecode,
    JBIG2Decode,
}
impl StreamFilter {
    /// `kind` may be the full filter name or the abbreviation used in inline images.
    pub fn from_kind_and_params(kind: &str, params: Primitive, r: &impl Resolve) -> Result<StreamFilter> {
        Ok(
        match kind {
            "ASCIIHexDecode" | "AHx" => StreamFilter::ASCIIHexDecode,
            "ASCII85Decode" | "A85" => StreamFilter::ASCII85Decode,
            "RunLengthDecode" | "RL" => StreamFilter::RunLengthDecode,
            "FlateDecode" | "Fl" => StreamFilter::FlateDecode (FlateParams::from_primitive(params, r)?),
            "LZWDecode" | "LZW" => StreamFilter::LZWDecode (FlateParams::from_primitive(params, r)?),
            "DCTDecode" | "DCT" => StreamFilter::DCTDecode,
            "JPXDecode" => StreamFilter::JPXDecode,
            "CCITTFaxDecode" | "CCF" => StreamFilter::CCITTFaxDecode,
            "JBIG2Decode" => StreamFilter::JBIG2Decode,
            ty => return Err(PdfError::UnknownFilter { name: ty.into() }),
        }
        )
    }

    /// The filter chain declared by a filter entry (a name or an array of names) and its parameter
    /// entry (a dictionary, or an array with one entry per filter).
    pub fn chain(filter: Option<&Primitive>, params: Option<&Primitive>, r: &impl Resolve) -> Result<Vec<StreamFilter>> {
        let names = match filter {
            None | Some(Primitive::Null) => return Ok(vec![]),
            Some(Primitive::Array(arr)) => arr.iter().map(|p| p.as_name()).collect::<Result<Vec<_>>>()?,
            Some(p) => vec![p.as_name()?],
        };
        let params = match params {
            Some(Primitive::Array(arr)) => arr.clone(),
            Some(p) => vec![p.clone()],
            None => vec![],
        };
        names.into_iter().enumerate()
            .map(|(i, name)| StreamFilter::from_kind_and_params(name, params.get(i).cloned().unwrap_or(Primitive::Null), r))
            .collect()
    }
}

#[inline]
fn encode_nibble(c: u8) -> u8 {
    match c {
        0 ..= 9 => b'0' + c,
        _ => b'a' + c - 10,
    }
}

/// ASCIIHexDecode. White-space is ignored, the data must end with `>`; an odd last digit counts as
/// followed by `0`.
pub fn decode_hex(data: &[u8]) -> Result<Vec<u8>> {
    let end = data.iter().position(|&b| b == b'>').ok_or(PdfError::HexEod)?;
    let digits: Vec<u8> = data[.. end].iter().cloned()
        .filter(|&b| !crate::parser::is_whitespace(b))
        .collect();
    let mut out = Vec::with_capacity(digits.len() / 2 + 1);
    for (i, chunk) in digits.chunks(2).enumerate() {
        let high = chunk[0];
        let low = chunk.get(1).copied().unwrap_or(b'0');
        if let (Some(high), Some(low)) = (decode_nibble(high), decode_nibble(low)) {
            out.push(high << 4 | low);
        } else {
            return Err(PdfError::HexDecode { pos: i * 2, bytes: [chunk[0], low] })
        }
    }
    Ok(out)
}
pub fn encode_hex(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() * 2 + 1);
    for &b in data {
        buf.push(encode_nibble(b >> 4));
        buf.push(encode_nibble(b & 0xf));
    }
    buf.push(b'>');
    buf
}

#[inline]
fn sym_85(byte: u8) -> Option<u8> {
    match byte {
        b @ 0x21 ..= 0x75 => Some(b - 0x21),
        _ => None
    }
}

fn word_85([a, b, c, d, e]: [u8; 5]) -> Option<[u8; 4]> {
    fn s(b: u8) -> Option<u32> { sym_85(b).map(|n| n as u32) }
    let (a, b, c, d, e) = (s(a)?, s(b)?, s(c)?, s(d)?, s(e)?);
    let q = (((a.checked_mul(85)? + b) * 85 + c) * 85 + d).checked_mul(85)?.checked_add(e)?;
    Some(q.to_be_bytes())
}

pub fn decode_85(data: &[u8]) -> Result<Vec<u8>> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let mut out = Vec::with_capacity((data.len() + 4) / 5 * 4);

    let mut stream = data.iter().cloned()
        .filter(|&b| !crate::parser::is_whitespace(b));

    let mut symbols = stream.by_ref()
        .take_while(|&b| b != b'~');

    let (tail_len, tail) = loop {
        match symbols.next() {
            Some(b'z') => out.extend_from_slice(&[0; 4]),
            Some(a) => {
                let (b, c, d, e) = match (symbols.next(), symbols.next(), symbols.next(), symbols.next()) {
                    (Some(b), Some(c), Some(d), Some(e)) => (b, c, d, e),
                    (None, _, _, _) => break (1, [a, b'u', b'u', b'u', b'u']),
                    (Some(b), None, _, _) => break (2, [a, b, b'u', b'u', b'u']),
                    (Some(b), Some(c), None, _) => break (3, [a, b, c, b'u', b'u']),
                    (Some(b), Some(c), Some(d), None) => break (4, [a, b, c, d, b'u']),
                };
                out.extend_from_slice(&word_85([a, b, c, d, e]).ok_or(PdfError::Ascii85TailError)?);
            }
            None => break (0, [b'u'; 5])
        }
    };

    if tail_len > 0 {
        let last = word_85(tail).ok_or(PdfError::Ascii85TailError)?;
        out.extend_from_slice(&last[.. tail_len-1]);
    }

    match (stream.next(), stream.next()) {
        (Some(b'>'), None) => Ok(out),
        _ => Err(PdfError::Ascii85TailError)
    }
}

#[inline]
fn divmod(n: u32, m: u32) -> (u32, u32) {
    (n / m, n % m)
}

#[inline]
fn a85(n: u32) -> u8 {
    n as u8 + 0x21
}

#[inline]
fn base85_chunk(c: [u8; 4]) -> [u8; 5] {
    let n = u32::from_be_bytes(c);
    let (n, e) = divmod(n, 85);
    let (n, d) = divmod(n, 85);
    let (n, c) = divmod(n, 85);
    let (a, b) = divmod(n, 85);

    [a85(a), a85(b), a85(c), a85(d), a85(e)]
}

pub fn encode_85(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity((data.len() / 4) * 5 + 10);
    let mut chunks = data.chunks_exact(4);
    for chunk in chunks.by_ref() {
        let c: [u8; 4] = match chunk.try_into() {
            Ok(c) => c,
            Err(_) => continue,
        };
        if c == [0; 4] {
            buf.push(b'z');
        } else {
            buf.extend_from_slice(&base85_chunk(c));
        }
    }

    let r = chunks.remainder();
    if !r.is_empty() {
        let mut c = [0; 4];
        c[.. r.len()].copy_from_slice(r);
        let out = base85_chunk(c);
        buf.extend_from_slice(&out[.. r.len() + 1]);
    }
    buf.extend_from_slice(b"~>");
    buf
}

/// RunLengthDecode: a length byte `n` below 128 copies the next `n + 1` bytes, above 128 repeats
/// the next byte `257 - n` times, and 128 ends the data.
pub fn decode_run_length(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut bytes = data.iter().cloned();
    while let Some(n) = bytes.next() {
        match n {
            0x80 => return Ok(out),
            0 ..= 0x7f => {
                let run = bytes.by_ref().take(n as usize + 1).collect_vec();
                if run.len() != n as usize + 1 {
                    return Err(PdfError::UnexpectedEnd);
                }
                out.extend(run);
            }
            _ => {
                let b = bytes.next().ok_or(PdfError::UnexpectedEnd)?;
                out.extend(std::iter::repeat(b).take(257 - n as usize));
            }
        }
    }
    debug!("RunLengthDecode data without EOD");
    Ok(out)
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match libflate::zlib::Decoder::new(data) {
        Ok(mut decoder) => match decoder.read_to_end(&mut out) {
            Ok(_) => return Ok(out),
            Err(e) => info!("invalid zlib data ({}). trying without header", e),
        },
        Err(e) => info!("invalid zlib header ({}). trying without", e),
    }
    out.clear();
    libflate::deflate::Decoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

fn flate_decode(data: &[u8], params: &FlateParams) -> Result<Vec<u8>> {
    let decoded = inflate(data)?;
    unpredict(decoded, params)
}

fn lzw_decode(data: &[u8], params: &FlateParams) -> Result<Vec<u8>> {
    use weezl::{BitOrder, decode::Decoder};

    let mut decoder = if params.early_change != 0 {
        Decoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        Decoder::new(BitOrder::Msb, 8)
    };
    let mut out = Vec::new();
    let result = decoder.into_vec(&mut out).decode_all(data);
    match result.status {
        Ok(weezl::LzwStatus::Done) => {}
        Ok(_) => debug!("LZWDecode data without EOD"),
        Err(e) => bail!("LZW decode error: {}", e),
    }
    unpredict(out, params)
}

/// Undo the PNG predictors (10 to 15). Predictor 1 leaves the data alone.
fn unpredict(decoded: Vec<u8>, params: &FlateParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(decoded),
        10 ..= 15 if decoded.is_empty() => Ok(decoded),
        10 ..= 15 => {
            let bits = params.n_components.checked_mul(params.bits_per_component);
            let row_len = bits
                .and_then(|bits| bits.checked_mul(params.columns))
                .and_then(|row_bits| row_bits.checked_add(7))
                .map(|row_bits| row_bits / 8)
                .filter(|&row_len| row_len < decoded.len());
            let (bits, row_len) = match (bits, row_len) {
                (Some(bits), Some(row_len)) => (bits, row_len),
                _ => bail!("predictor rows of {} columns don't fit {} bytes of data", params.columns, decoded.len()),
            };
            let bpp = (bits.saturating_add(7) / 8).max(1);

            let mut out = Vec::with_capacity(decoded.len());
            let mut prev = vec![0; row_len];
            let mut row = vec![0; row_len];
            // every row is prefixed by its predictor; a truncated last row is dropped
            for chunk in decoded.chunks_exact(row_len + 1) {
                let predictor = PredictorType::from_u8(chunk[0])?;
                unfilter(predictor, bpp, &prev, &chunk[1..], &mut row);
                out.extend_from_slice(&row);
                std::mem::swap(&mut prev, &mut row);
            }
            Ok(out)
        }
        predictor => Err(PdfError::UnsupportedPredictor { predictor }),
    }
}
fn flate_encode(data: &[u8]) -> Vec<u8> {
    deflate_bytes_zlib(data)
}

pub fn decode(data: &[u8], filter: &StreamFilter) -> Result<Vec<u8>> {
    match *filter {
        StreamFilter::ASCIIHexDecode => decode_hex(data),
        StreamFilter::ASCII85Decode => decode_85(data),
        StreamFilter::RunLengthDecode => decode_run_length(data),
        StreamFilter::FlateDecode(ref params) => flate_decode(data, params),
        StreamFilter::LZWDecode(ref params) => lzw_decode(data, params),
        StreamFilter::DCTDecode | StreamFilter::JPXDecode
            | StreamFilter::CCITTFaxDecode | StreamFilter::JBIG2Decode => Ok(data.to_vec()),
    }
}

pub fn encode(data: &[u8], filter: &StreamFilter) -> Result<Vec<u8>> {
    match *filter {
        StreamFilter::ASCIIHexDecode => Ok(encode_hex(data)),
        StreamFilter::ASCII85Decode => Ok(encode_85(data)),
        StreamFilter::FlateDecode(FlateParams { predictor: 1, .. }) => Ok(flate_encode(data)),
        ref f => bail!("encoding with {:?} is not supported", f),
    }
}

/// Apply a filter chain in order.
pub fn decode_all(data: &[u8], filters: &[StreamFilter]) -> Result<Vec<u8>> {
    let mut data = data.to_vec();
    for filter in filters {
        data = decode(&data, filter)?;
    }
    Ok(data)
}

/// The decoded data of a stream, following its `/Filter` and `/DecodeParms`.
pub fn decode_stream(stream: &PdfStream, r: &impl Resolve) -> Result<Vec<u8>> {
    let filters = StreamFilter::chain(stream.info.get("Filter"), stream.info.get("DecodeParms"), r)?;
    decode_all(&stream.data, &filters)
}

/// A stream holding `data` encoded with `filter`, its dictionary updated to match.
pub fn encode_stream(mut info: Dictionary, data: &[u8], filter: &StreamFilter) -> Result<PdfStream> {
    let name = match filter {
        StreamFilter::ASCIIHexDecode => "ASCIIHexDecode",
        StreamFilter::ASCII85Decode => "ASCII85Decode",
        _ => "FlateDecode",
    };
    let encoded = encode(data, filter)?;
    info.insert("Filter", Primitive::name(name));
    info.remove("DecodeParms");
    info.insert("Length", Primitive::Integer(encoded.len() as i64));
    Ok(PdfStream::new(info, encoded))
}

/*
 * Predictor - copied and adapted from PNG crate..
 */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PredictorType {
    NoFilter = 0,
    Sub = 1,
    Up = 2,
    Avg = 3,
    Paeth = 4
}

impl PredictorType {
    pub fn from_u8(n: u8) -> Result<PredictorType> {
        match n {
            0 => Ok(PredictorType::NoFilter),
            1 => Ok(PredictorType::Sub),
            2 => Ok(PredictorType::Up),
            3 => Ok(PredictorType::Avg),
            4 => Ok(PredictorType::Paeth),
            n => Err(PdfError::IncorrectPredictorType {n})
        }
    }
}

fn filter_paeth(a: u8, b: u8, c: u8) -> u8 {
    let ia = a as i16;
    let ib = b as i16;
    let ic = c as i16;

    let p = ia + ib - ic;

    let pa = (p - ia).abs();
    let pb = (p - ib).abs();
    let pc = (p - ic).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// `prev`, `inp` and `out` are rows of the same length.
pub fn unfilter(filter: PredictorType, bpp: usize, prev: &[u8], inp: &[u8], out: &mut [u8]) {
    use self::PredictorType::*;
    let len = inp.len();
    let bpp = bpp.min(len);

    match filter {
        NoFilter => {
            out[..len].copy_from_slice(&inp[..len]);
        }
        Sub => {
            out[..bpp].copy_from_slice(&inp[..bpp]);
            for i in bpp..len {
                out[i] = inp[i].wrapping_add(out[i - bpp]);
            }
        }
        Up => {
            for i in 0..len {
                out[i] = inp[i].wrapping_add(prev[i]);
            }
        }
        Avg => {
            for i in 0..bpp {
                out[i] = inp[i].wrapping_add(prev[i] / 2);
            }

            for i in bpp..len {
                out[i] = inp[i].wrapping_add(
                    ((out[i - bpp] as i16 + prev[i] as i16) / 2) as u8
                );
            }
        }
        Paeth => {
            for i in 0..bpp {
                out[i] = inp[i].wrapping_add(
                    filter_paeth(0, prev[i], 0)
                );
            }

            for i in bpp..len {
                out[i] = inp[i].wrapping_add(
                    filter_paeth(out[i - bpp], prev[i], prev[i - bpp])
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::NoResolve;

    fn s(b: &[u8]) -> &str { std::str::from_utf8(b).unwrap() }

    #[test]
    fn base_85() {
        let case = &b"hello world!"[..];
        let encoded = encode_85(case);
        assert_eq!(s(&encoded), "BOu!rD]j7BEbo80~>");
        let decoded = decode_85(&encoded).unwrap();
        assert_eq!(case, &*decoded);

        assert_eq!(decode_85(b"<~z~>").unwrap(), [0; 4]);
        assert_eq!(decode_85(b"BOu!r D]j7\nBEbo80~>").unwrap(), case);
        assert!(matches!(decode_85(b"BOu!rD]j7BEbo80"), Err(PdfError::Ascii85TailError)));
    }

    #[test]
    fn hex() {
        assert_eq!(encode_hex(b"\x01\xab\xff"), b"01abff>");
        assert_eq!(decode_hex(b"01 AB\nff>").unwrap(), b"\x01\xab\xff");
        assert_eq!(decode_hex(b"a>").unwrap(), b"\xa0");
        assert!(matches!(decode_hex(b"0g>"), Err(PdfError::HexDecode { .. })));
        let err = decode_hex(b"0102").unwrap_err();
        assert_eq!(err.to_string(), "Unexpected EOD in ASCIIHexDecode");
    }

    #[test]
    fn run_length() {
        assert_eq!(decode_run_length(b"\x02abc\xfez\x80trailing").unwrap(), b"abczzz");
        assert!(decode_run_length(b"\x05ab").unwrap_err().is_eof());
    }

    #[test]
    fn flate_roundtrip() {
        let data = b"BT /F1 12 Tf 72 712 Td (A stream with some text) Tj ET".repeat(10);
        let encoded = encode(&data, &StreamFilter::FlateDecode(FlateParams::default())).unwrap();
        assert!(encoded.len() < data.len());
        assert_eq!(decode(&encoded, &StreamFilter::FlateDecode(FlateParams::default())).unwrap(), data);
    }

    #[test]
    fn png_up_predictor() {
        // two rows of three bytes, the second one encoded with the Up predictor
        let raw = [0, 1, 2, 3, 2, 1, 1, 1];
        let params = FlateParams { predictor: 12, columns: 3, ..FlateParams::default() };
        let decoded = flate_decode(&deflate_bytes_zlib(&raw), &params).unwrap();
        assert_eq!(decoded, [1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn predictor_rows_too_wide() {
        let params = FlateParams { predictor: 12, columns: usize::MAX / 2, ..FlateParams::default() };
        assert!(flate_decode(&deflate_bytes_zlib(b"abc"), &params).is_err());
        let params = FlateParams { predictor: 12, columns: 3, ..FlateParams::default() };
        assert!(flate_decode(&deflate_bytes_zlib(b"abc"), &params).is_err());
    }

    #[test]
    fn lzw() {
        // "-----A---B" with early change
        let data = [0x80, 0x0B, 0x60, 0x50, 0x22, 0x0C, 0x0C, 0x85, 0x01];
        let chain = StreamFilter::chain(Some(&Primitive::name("LZW")), None, &NoResolve).unwrap();
        assert_eq!(chain, [StreamFilter::LZWDecode(FlateParams::default())]);
        assert_eq!(decode_all(&data, &chain).unwrap(), b"-----A---B");
        assert!(encode(b"abc", &chain[0]).is_err());
    }

    #[test]
    fn unsupported_predictor() {
        let params = FlateParams { predictor: 2, ..FlateParams::default() };
        let err = flate_decode(&deflate_bytes_zlib(b"abc"), &params).unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedPredictor { predictor: 2 }));
    }

    #[test]
    fn filter_chain() {
        let filter = Primitive::Array(vec![Primitive::name("AHx"), Primitive::name("FlateDecode")]);
        let mut params = Dictionary::new();
        params.insert("Predictor", 12);
        params.insert("Columns", 4);
        let params = Primitive::Array(vec![Primitive::Null, params.into()]);
        let chain = StreamFilter::chain(Some(&filter), Some(&params), &NoResolve).unwrap();
        assert_eq!(chain[0], StreamFilter::ASCIIHexDecode);
        assert_eq!(chain[1], StreamFilter::FlateDecode(FlateParams { predictor: 12, columns: 4, ..FlateParams::default() }));

        let err = StreamFilter::chain(Some(&Primitive::name("Foo")), None, &NoResolve).unwrap_err();
        assert!(matches!(err, PdfError::UnknownFilter { .. }));
    }

    #[test]
    fn stream_roundtrip() {
        let data = b"0 0 m 100 100 l S";
        let stream = encode_stream(Dictionary::new(), data, &StreamFilter::ASCII85Decode).unwrap();
        assert_eq!(stream.info["Filter"], Primitive::name("ASCII85Decode"));
        assert_eq!(decode_stream(&stream, &NoResolve).unwrap(), data);
    }
}
