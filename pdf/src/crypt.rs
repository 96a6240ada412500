/// PDF "cryptography" – This is why you don't write your own crypto.
///
/// Only the write side of the RC4 security handler lives here: the cipher, and the derivation of
/// the per-object key from the document key.

use std::io;
use crate::object::PlainRef;
use crate::primitive::Primitive;
use crate::error::{PdfError, Result};

#[derive(Copy)]
pub struct Rc4 {
    i: u8,
    j: u8,
    state: [u8; 256]
}

impl Clone for Rc4 { fn clone(&self) -> Rc4 { *self } }

impl Rc4 {
    /// Keys are 1 to 256 bytes long.
    pub fn new(key: &[u8]) -> Result<Rc4> {
        if key.is_empty() || key.len() > 256 {
            bail!("invalid RC4 key length {}", key.len());
        }
        let mut rc4 = Rc4 { i: 0, j: 0, state: [0; 256] };
        for (i, x) in rc4.state.iter_mut().enumerate() {
            *x = i as u8;
        }
        let mut j: u8 = 0;
        for i in 0..256 {
            j = j.wrapping_add(rc4.state[i]).wrapping_add(key[i % key.len()]);
            rc4.state.swap(i, j as usize);
        }
        Ok(rc4)
    }
    fn next(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.state[self.i as usize]);
        self.state.swap(self.i as usize, self.j as usize);
        self.state[(self.state[self.i as usize].wrapping_add(self.state[self.j as usize])) as usize]
    }
    /// In place. Encryption and decryption are the same operation.
    pub fn apply(key: &[u8], data: &mut [u8]) -> Result<()> {
        let mut rc4 = Rc4::new(key)?;
        for b in data.iter_mut() {
            *b ^= rc4.next();
        }
        Ok(())
    }
}

/// The encryption transform applied to string and stream payloads on write.
pub fn encrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    let mut out = data.to_vec();
    Rc4::apply(key, &mut out)?;
    Ok(out)
}

/// The key for one indirect object (7.6.2, Algorithm 1): the document key, followed by the low three
/// bytes of the object number and the low two bytes of the generation, hashed with MD5 and cut
/// to `n + 5` bytes (at most 16).
pub fn object_key(file_key: &[u8], id: PlainRef) -> Result<Vec<u8>> {
    let n = file_key.len();
    if n == 0 || n > 16 {
        return Err(PdfError::Other { msg: format!("invalid document key length {}", n) });
    }
    let mut key = [0; 16 + 5];
    key[..n].copy_from_slice(file_key);
    key[n..n + 3].copy_from_slice(&id.id.to_le_bytes()[..3]);
    key[n + 3..n + 5].copy_from_slice(&id.gen.to_le_bytes()[..2]);

    let digest = *md5::compute(&key[..n + 5]);
    Ok(digest[..(n + 5).min(16)].to_vec())
}

/// Write the indirect object `id` with its strings and streams encrypted.
pub fn write_encrypted(p: &Primitive, id: PlainRef, file_key: &[u8], out: &mut impl io::Write) -> Result<()> {
    let key = object_key(file_key, id)?;
    p.write_to(out, Some(&key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::PdfString;

    fn hex(data: &[u8]) -> String {
        data.iter().map(|b| format!("{:02X}", b)).collect()
    }

    #[test]
    fn rc4_vectors() {
        assert_eq!(hex(&encrypt(b"Plaintext", b"Key").unwrap()), "BBF316E8D940AF0AD3");
        assert_eq!(hex(&encrypt(b"pedia", b"Wiki").unwrap()), "1021BF0420");
        assert_eq!(hex(&encrypt(b"Attack at dawn", b"Secret").unwrap()), "45A01F645FC35B383552544B9BF5");
    }

    #[test]
    fn rc4_is_symmetric() {
        let data = b"some stream data";
        assert_eq!(encrypt(&encrypt(data, b"k").unwrap(), b"k").unwrap(), data);
    }

    #[test]
    fn rc4_bad_key() {
        assert!(Rc4::new(b"").is_err());
        assert!(Rc4::new(&[0; 257]).is_err());
    }

    #[test]
    fn object_keys() {
        let file_key = [1, 2, 3, 4, 5];
        let key = object_key(&file_key, PlainRef::new(0x010203, 7)).unwrap();
        assert_eq!(key.len(), 10);
        let expected = md5::compute([1, 2, 3, 4, 5, 0x03, 0x02, 0x01, 7, 0]);
        assert_eq!(key, &expected[..10]);

        assert_ne!(key, object_key(&file_key, PlainRef::new(0x010204, 7)).unwrap());
        assert_eq!(object_key(&[9; 16], PlainRef::new(1, 0)).unwrap().len(), 16);
        assert!(object_key(&[], PlainRef::new(1, 0)).is_err());
    }

    #[test]
    fn encrypted_object() {
        let file_key = b"secret";
        let id = PlainRef::new(4, 0);
        let mut out = Vec::new();
        write_encrypted(&Primitive::String(PdfString::new(&b"abc"[..])), id, file_key, &mut out).unwrap();

        let key = object_key(file_key, id).unwrap();
        let expected = encrypt(b"abc", &key).unwrap();
        assert_eq!(out, format!("<{}>", hex(&expected).to_lowercase()).into_bytes());
    }
}
