//! Models of PDF types built on the primitives: destinations and outline entries.

mod dest;
mod outline;

pub use self::dest::*;
pub use self::outline::*;

mod prelude {
    pub use crate::error::*;
    pub use crate::object::{Object, ObjectWrite, PlainRef, Resolve};
    pub use crate::primitive::{Dictionary, Name, PdfString, Primitive};
}
