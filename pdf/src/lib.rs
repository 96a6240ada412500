//! A PDF object model: the primitive object kinds, their parsing from and serialization to PDF
//! bytes, an indirect object table, content streams with inline images, and the stream filters.

#[macro_use] extern crate log;

#[macro_use]
pub mod error;
pub mod object;
pub mod primitive;
pub mod parser;
pub mod encoding;
pub mod inline;
pub mod content;
pub mod enc;
pub mod crypt;

pub use crate::error::PdfError;
pub use crate::primitive::{Primitive, Dictionary, Name, PdfString, PdfStream};
pub use crate::object::{Object, ObjectWrite, ObjectTable, PlainRef, Resolve};
pub use crate::content::{Content, Operation, InlineImage};
