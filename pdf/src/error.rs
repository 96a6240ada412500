use crate::object::ObjNr;
use snafu::Snafu;
use std::io;
use std::error::Error;

pub const STREAM_TRUNCATED_PREMATURELY: &str = "Stream has ended unexpectedly";

#[derive(Debug, Snafu)]
pub enum PdfError {
    // Syntax / parsing
    #[snafu(display("Stream has ended unexpectedly"))]
    EOF,

    #[snafu(display("Unexpected end of stream"))]
    UnexpectedEnd,

    #[snafu(display("{}", msg))]
    Read { msg: String },

    #[snafu(display("Error parsing from string: {}", source))]
    Parse { source: Box<dyn Error + Send + Sync> },

    #[snafu(display("Invalid UTF-8: {}", source))]
    Utf8 { source: Box<dyn Error + Send + Sync> },

    #[snafu(display("Unexpected token '{}' at {} - expected '{}'", lexeme, pos, expected))]
    UnexpectedLexeme { pos: u64, lexeme: String, expected: &'static str },

    #[snafu(display("Number {} does not fit into a PDF integer", value))]
    Overflow { value: String },

    #[snafu(display("'{}' codec can't encode character {:?}", encoding, ch))]
    Encoding { encoding: &'static str, ch: char },

    #[snafu(display("'{}' codec can't decode input at position {}", encoding, pos))]
    Decoding { encoding: &'static str, pos: usize },

    #[snafu(display("{}", msg))]
    Type { msg: &'static str },

    //////////////////
    // Encode/decode
    #[snafu(display("Hex decode error. Position {}, bytes {:?}", pos, bytes))]
    HexDecode { pos: usize, bytes: [u8; 2] },

    #[snafu(display("Unexpected EOD in ASCIIHexDecode"))]
    HexEod,

    #[snafu(display("Ascii85 tail error"))]
    Ascii85TailError,

    #[snafu(display("Failed to convert '{}' into PredictorType", n))]
    IncorrectPredictorType { n: u8 },

    #[snafu(display("Unsupported flate predictor {}", predictor))]
    UnsupportedPredictor { predictor: i64 },

    #[snafu(display("Unrecognized filter type {}", name))]
    UnknownFilter { name: String },

    //////////////////
    // Dictionary
    #[snafu(display("Field /{} is missing in dictionary for type {}.", field, typ))]
    MissingEntry { typ: &'static str, field: String },

    //////////////////
    // Misc
    #[snafu(display("Tried to dereference non-existing object nr {}.", obj_nr))]
    NullRef { obj_nr: ObjNr },

    #[snafu(display("Expected primitive {}, found primitive {} instead.", expected, found))]
    UnexpectedPrimitive { expected: &'static str, found: &'static str },

    #[snafu(display("IO Error"))]
    Io { source: io::Error },

    #[snafu(display("{}", msg))]
    Other { msg: String },

    #[snafu(display("NoneError at {}:{}:{}", file, line, column))]
    NoneError { file: &'static str, line: u32, column: u32 },
}
impl PdfError {
    /// True for both flavours of premature end of input.
    pub fn is_eof(&self) -> bool {
        match self {
            PdfError::EOF | PdfError::UnexpectedEnd => true,
            PdfError::Io { source } => source.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
    pub fn read(msg: impl Into<String>) -> PdfError {
        PdfError::Read { msg: msg.into() }
    }
}

pub type Result<T, E=PdfError> = std::result::Result<T, E>;

impl From<io::Error> for PdfError {
    fn from(source: io::Error) -> PdfError {
        PdfError::Io { source }
    }
}
impl From<String> for PdfError {
    fn from(msg: String) -> PdfError {
        PdfError::Other { msg }
    }
}

#[macro_export]
macro_rules! try_opt {
    ($e:expr) => (
        match $e {
            Some(v) => v,
            None => return Err($crate::PdfError::NoneError {
                file: file!(),
                line: line!(),
                column: column!()
            })
        }
    )
}

macro_rules! err_from {
    ($($st:ty),* => $variant:ident) => (
        $(
            impl From<$st> for PdfError {
                fn from(e: $st) -> PdfError {
                    PdfError::$variant { source: e.into() }
                }
            }
        )*
    )
}
err_from!(std::str::Utf8Error, std::string::FromUtf8Error => Utf8);
err_from!(std::num::ParseIntError, std::num::ParseFloatError => Parse);

macro_rules! err {
    ($e: expr) => ({
        return Err($e);
    })
}
macro_rules! bail {
    ($($t:tt)*) => {
        err!($crate::PdfError::Other { msg: format!($($t)*) })
    }
}
