//! `Object` trait, along with some implementations. References and the object table.

mod types;
mod table;

pub use self::types::*;
pub use self::table::ObjectTable;

use crate::primitive::*;
use crate::error::*;

use std::io;

pub type ObjNr = u64;
pub type GenNr = u16;

/// The document side of indirect references: turns an object number and generation into the
/// object it names.
pub trait Resolve {
    fn resolve(&self, r: PlainRef) -> Result<Primitive>;

    /// Whether recoverable irregularities (duplicate dictionary keys, missing `endobj`) are
    /// errors rather than warnings.
    fn strict(&self) -> bool {
        false
    }
}

/// For parsing without a document. Every reference is dangling.
pub struct NoResolve;
impl Resolve for NoResolve {
    fn resolve(&self, r: PlainRef) -> Result<Primitive> {
        Err(PdfError::NullRef { obj_nr: r.id })
    }
}

/// A PDF Object
pub trait Object: Sized {
    /// Convert primitive to Self
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self>;

    fn from_dict(dict: Dictionary, resolve: &impl Resolve) -> Result<Self> {
        Self::from_primitive(Primitive::Dictionary(dict), resolve)
    }
}

pub trait ObjectWrite {
    fn to_primitive(&self) -> Result<Primitive>;

    fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        self.to_primitive()?.serialize(out)
    }
}

///////
// Refs
///////

/// An indirect reference. Only names its target; resolving it goes through `Resolve`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct PlainRef {
    pub id:     ObjNr,
    pub gen:    GenNr,
}
impl PlainRef {
    pub fn new(id: ObjNr, gen: GenNr) -> PlainRef {
        PlainRef { id, gen }
    }
    pub fn serialize(&self, out: &mut impl io::Write) -> Result<()> {
        write!(out, "{} {} R", self.id, self.gen)?;
        Ok(())
    }
}
impl Object for PlainRef {
    fn from_primitive(p: Primitive, _: &impl Resolve) -> Result<Self> {
        p.into_reference()
    }
}
impl ObjectWrite for PlainRef {
    fn to_primitive(&self) -> Result<Primitive> {
        Ok(Primitive::Reference(*self))
    }
}

//////////////////////////////////////
// Object for Primitives & other types
//////////////////////////////////////

impl Object for i64 {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Integer (n) => Ok(n),
            Primitive::Reference (r) => i64::from_primitive(resolve.resolve(r)?, resolve),
            p => Err(PdfError::UnexpectedPrimitive {expected: "Integer", found: p.get_debug_name()})
        }
    }
}
impl ObjectWrite for i64 {
    fn to_primitive(&self) -> Result<Primitive> {
        Ok(Primitive::Integer(*self))
    }
}
impl Object for f32 {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        p.resolve(resolve)?.as_number()
    }
}
impl ObjectWrite for f32 {
    fn to_primitive(&self) -> Result<Primitive> {
        Ok(Primitive::Number(*self))
    }
}
impl Object for bool {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        p.resolve(resolve)?.as_bool()
    }
}
impl ObjectWrite for bool {
    fn to_primitive(&self) -> Result<Primitive> {
        Ok(Primitive::Boolean(*self))
    }
}
impl Object for Name {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        p.resolve(resolve)?.into_name()
    }
}
impl ObjectWrite for Name {
    fn to_primitive(&self) -> Result<Primitive> {
        Ok(Primitive::Name(self.clone()))
    }
}
impl Object for PdfString {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        p.resolve(resolve)?.into_string()
    }
}
impl ObjectWrite for PdfString {
    fn to_primitive(&self) -> Result<Primitive> {
        Ok(Primitive::String(self.clone()))
    }
}
impl Object for Dictionary {
    fn from_primitive(p: Primitive, r: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Dictionary(dict) => Ok(dict),
            Primitive::Reference(id) => Dictionary::from_primitive(r.resolve(id)?, r),
            _ => Err(PdfError::UnexpectedPrimitive {expected: "Dictionary", found: p.get_debug_name()}),
        }
    }
}
impl ObjectWrite for Dictionary {
    fn to_primitive(&self) -> Result<Primitive> {
        Ok(Primitive::Dictionary(self.clone()))
    }
}
impl Object for Primitive {
    fn from_primitive(p: Primitive, _: &impl Resolve) -> Result<Self> {
        Ok(p)
    }
}
impl ObjectWrite for Primitive {
    fn to_primitive(&self) -> Result<Primitive> {
        Ok(self.clone())
    }
}

impl<T: Object> Object for Vec<T> {
    /// Will try to convert `p` to `T` first, then try to convert `p` to Vec<T>
    fn from_primitive(p: Primitive, r: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Array(arr) => arr.into_iter()
                .map(|p| T::from_primitive(p, r))
                .collect(),
            Primitive::Null => Ok(Vec::new()),
            Primitive::Reference(id) => Self::from_primitive(r.resolve(id)?, r),
            _ => Ok(vec![T::from_primitive(p, r)?])
        }
    }
}
impl<T: ObjectWrite> ObjectWrite for Vec<T> {
    fn to_primitive(&self) -> Result<Primitive> {
        self.iter().map(|t| t.to_primitive()).collect::<Result<Vec<_>>>().map(Primitive::Array)
    }
}

impl<T: Object> Object for Option<T> {
    fn from_primitive(p: Primitive, resolve: &impl Resolve) -> Result<Self> {
        match p {
            Primitive::Null => Ok(None),
            p => match T::from_primitive(p, resolve) {
                Ok(p) => Ok(Some(p)),
                // References to non-existing objects ought not to be an error
                Err(PdfError::NullRef {..}) => Ok(None),
                Err(e) => Err(e),
            }
        }
    }
}
impl<T: ObjectWrite> ObjectWrite for Option<T> {
    fn to_primitive(&self) -> Result<Primitive> {
        match self {
            None => Ok(Primitive::Null),
            Some(t) => t.to_primitive(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_resolve_is_dangling() {
        let err = NoResolve.resolve(PlainRef::new(5, 0)).unwrap_err();
        assert!(matches!(err, PdfError::NullRef { obj_nr: 5 }));
        assert!(!NoResolve.strict());
    }

    #[test]
    fn option_of_dangling_ref() {
        let p = Primitive::Reference(PlainRef::new(1, 0));
        assert_eq!(Option::<i64>::from_primitive(p, &NoResolve).unwrap(), None);
        assert_eq!(Option::<i64>::from_primitive(Primitive::Null, &NoResolve).unwrap(), None);
        assert!(Option::<i64>::from_primitive(Primitive::name("x"), &NoResolve).is_err());
    }

    #[test]
    fn vec_from_single_value() {
        let v = Vec::<f32>::from_primitive(Primitive::Integer(3), &NoResolve).unwrap();
        assert_eq!(v, [3.0]);
        let v = Vec::<f32>::from_primitive(Primitive::Array(vec![1.into(), 0.5f32.into()]), &NoResolve).unwrap();
        assert_eq!(v, [1.0, 0.5]);
        assert_eq!(v.to_primitive().unwrap().to_bytes().unwrap(), b"[1 0.5]");
    }

    #[test]
    fn plain_ref_serialize() {
        let mut out = Vec::new();
        PlainRef::new(3, 2).serialize(&mut out).unwrap();
        assert_eq!(out, b"3 2 R");
    }
}
