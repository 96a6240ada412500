use super::prelude::*;
use super::dest::{Dest, Destination};

/// Style bits of an outline entry's `/F` field.
pub const ITALIC: i64 = 1;
pub const BOLD: i64 = 2;

/// An outline (bookmark) entry: a titled destination plus the viewer hints for drawing it.
///
/// Linking entries into the outline tree (`/Parent`, `/Prev`, `/Next`, ...) is left to the
/// document writer.
#[derive(Debug, Clone, PartialEq)]
pub struct Bookmark {
    pub destination: Destination,
    /// RGB, each component in 0..=1
    pub color: Option<[f32; 3]>,
    pub bold: bool,
    pub italic: bool,
}

impl Bookmark {
    pub fn new(destination: Destination) -> Bookmark {
        Bookmark {
            destination,
            color: None,
            bold: false,
            italic: false,
        }
    }
    pub fn title(&self) -> &str {
        &self.destination.title
    }
    pub fn flags(&self) -> i64 {
        let mut flags = 0;
        if self.italic {
            flags |= ITALIC;
        }
        if self.bold {
            flags |= BOLD;
        }
        flags
    }
}

impl ObjectWrite for Bookmark {
    fn to_primitive(&self) -> Result<Primitive> {
        let mut dict = Dictionary::new();
        dict.insert("Title", PdfString::from_text(self.title()));
        dict.insert("Dest", self.destination.dest_array()?);
        if let Some([r, g, b]) = self.color {
            dict.insert("C", Primitive::Array(vec![r.into(), g.into(), b.into()]));
        }
        let flags = self.flags();
        if flags != 0 {
            dict.insert("F", flags);
        }
        Ok(Primitive::Dictionary(dict))
    }
}

impl Object for Bookmark {
    /// Reads an outline item dictionary. The target comes from `/Dest`, or from a GoTo action in
    /// `/A`.
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        let mut dict = p.resolve(resolve)?.into_dictionary()?;
        let title = match dict.remove("Title") {
            Some(t) => t.resolve(resolve)?.into_string()?.to_string_lossy(),
            None => String::new(),
        };
        let dest = match dict.remove("Dest") {
            Some(d) => Dest::from_primitive(d, resolve)?,
            None => {
                let mut action = dict.require("Bookmark", "A")?.resolve(resolve)?.into_dictionary()?;
                match action.get("S") {
                    Some(Primitive::Name(s)) if s.as_str() == "GoTo" => {}
                    _ => bail!("outline action is not a GoTo action"),
                }
                Dest::from_primitive(action.require("Bookmark", "D")?, resolve)?
            }
        };
        let color = match dict.remove("C") {
            Some(c) => {
                let c = Vec::<f32>::from_primitive(c, resolve)?;
                match c[..] {
                    [r, g, b] => Some([r, g, b]),
                    _ => bail!("outline color needs 3 components, found {}", c.len()),
                }
            }
            None => None,
        };
        let flags = match dict.remove("F") {
            Some(f) => i64::from_primitive(f, resolve)?,
            None => 0,
        };
        Ok(Bookmark {
            destination: Destination { title, dest },
            color,
            bold: flags & BOLD != 0,
            italic: flags & ITALIC != 0,
        })
    }
}
