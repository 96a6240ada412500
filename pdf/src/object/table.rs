use crate::error::*;
use crate::object::{PlainRef, Resolve};
use crate::parser::{parse_indirect_object, read_object_header};
use crate::primitive::Primitive;

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;
use std::rc::Rc;

enum Slot {
    /// `N G obj ... endobj` bytes, not looked at yet
    Raw(Rc<[u8]>),
    /// being parsed right now
    Pending,
    Parsed(Rc<Primitive>),
}

/// An in-memory table of indirect objects.
///
/// Objects can be added already parsed or as the raw bytes of their `obj ... endobj` envelope. Raw
/// objects are parsed the first time they are resolved, each with a cursor of its own, and the
/// result is cached so every later resolution sees the same object.
#[derive(Default)]
pub struct ObjectTable {
    slots: RefCell<HashMap<PlainRef, Slot>>,
    strict: bool,
}

impl ObjectTable {
    pub fn new() -> ObjectTable {
        ObjectTable::default()
    }
    /// A table whose parsing treats recoverable irregularities as errors.
    pub fn new_strict() -> ObjectTable {
        ObjectTable { strict: true, ..ObjectTable::default() }
    }

    pub fn insert(&mut self, r: PlainRef, p: Primitive) {
        self.slots.get_mut().insert(r, Slot::Parsed(Rc::new(p)));
    }

    /// Add an object by its full `N G obj ... endobj` text. Only the header is read now.
    pub fn insert_raw(&mut self, data: impl Into<Vec<u8>>) -> Result<PlainRef> {
        let data: Rc<[u8]> = data.into().into();
        let r = read_object_header(&mut Cursor::new(&data[..]))?;
        self.slots.get_mut().insert(r, Slot::Raw(data));
        Ok(r)
    }

    /// Add an object under the next unused object number (generation 0).
    pub fn add(&mut self, p: Primitive) -> PlainRef {
        let id = self.slots.get_mut().keys().map(|r| r.id).max().map_or(1, |id| id + 1);
        let r = PlainRef { id, gen: 0 };
        self.insert(r, p);
        r
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn contains(&self, r: PlainRef) -> bool {
        self.slots.borrow().contains_key(&r)
    }

    /// The object `r` names, parsing it on first use.
    pub fn get(&self, r: PlainRef) -> Result<Rc<Primitive>> {
        let raw = {
            let mut slots = self.slots.borrow_mut();
            let slot = match slots.get_mut(&r) {
                Some(slot) => slot,
                None => return Err(PdfError::NullRef { obj_nr: r.id }),
            };
            match std::mem::replace(slot, Slot::Pending) {
                Slot::Parsed(p) => {
                    *slot = Slot::Parsed(p.clone());
                    return Ok(p);
                }
                Slot::Pending => bail!("object {} {} refers to itself while being parsed", r.id, r.gen),
                Slot::Raw(data) => data,
            }
        };

        // the borrow is released: parsing may resolve other objects
        debug!("parsing object {} {}", r.id, r.gen);
        let parsed = parse_indirect_object(&mut Cursor::new(&raw[..]), self)
            .and_then(|(found, p)| {
                if found == r {
                    Ok(p)
                } else {
                    Err(PdfError::read(format!(
                        "object header {} {} does not match reference {} {}", found.id, found.gen, r.id, r.gen
                    )))
                }
            });

        let mut slots = self.slots.borrow_mut();
        match parsed {
            Ok(p) => {
                let p = Rc::new(p);
                slots.insert(r, Slot::Parsed(p.clone()));
                Ok(p)
            }
            Err(e) => {
                slots.insert(r, Slot::Raw(raw));
                Err(e)
            }
        }
    }
}

impl Resolve for ObjectTable {
    fn resolve(&self, r: PlainRef) -> Result<Primitive> {
        self.get(r).map(|p| (*p).clone())
    }
    fn strict(&self) -> bool {
        self.strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_idempotent() {
        let mut table = ObjectTable::new();
        let r = table.insert_raw(&b"4 0 obj\n<< /Kids [5 0 R] /Count 1 >>\nendobj"[..]).unwrap();
        assert_eq!(r, PlainRef::new(4, 0));

        let a = table.get(r).unwrap();
        let b = table.get(r).unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(table.resolve(r).unwrap(), table.resolve(r).unwrap());
        assert_eq!(a.as_dictionary().unwrap()["Count"], Primitive::Integer(1));
    }

    #[test]
    fn lazy_stream_length() {
        let mut table = ObjectTable::new();
        table.insert_raw(&b"1 0 obj <</Length 2 0 R>> stream\nabcd\nendstream endobj"[..]).unwrap();
        table.insert_raw(&b"2 0 obj 4 endobj"[..]).unwrap();
        let s = table.resolve(PlainRef::new(1, 0)).unwrap().into_stream().unwrap();
        assert_eq!(s.data, b"abcd");
    }

    #[test]
    fn missing_object() {
        let table = ObjectTable::new();
        assert!(matches!(table.resolve(PlainRef::new(9, 0)), Err(PdfError::NullRef { obj_nr: 9 })));
    }

    #[test]
    fn self_reference_is_an_error() {
        let mut table = ObjectTable::new();
        table.insert_raw(&b"1 0 obj <</Length 1 0 R>> stream\nab\nendstream endobj"[..]).unwrap();
        assert!(table.get(PlainRef::new(1, 0)).is_err());
        // the raw bytes are kept
        assert!(table.get(PlainRef::new(1, 0)).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn add_picks_next_number() {
        let mut table = ObjectTable::new();
        assert_eq!(table.add(Primitive::Null), PlainRef::new(1, 0));
        table.insert(PlainRef::new(10, 0), Primitive::Integer(1));
        assert_eq!(table.add(Primitive::Null), PlainRef::new(11, 0));
        assert!(table.contains(PlainRef::new(10, 0)));
    }
}
