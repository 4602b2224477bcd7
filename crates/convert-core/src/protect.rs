//! Password protection with the PDF Standard security handler
//!
//! Writes revision 3 encryption: RC4 with a 128-bit key, derived from the
//! user password with MD5 (PDF 1.7, 7.6.3 algorithms 2, 3 and 5). Every
//! string and stream in the body is encrypted with its per-object key.

use lopdf::{dictionary, Document, Object, ObjectId, StringFormat};
use md5::{Digest, Md5};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{ConvertError, Result};
use crate::pdf::{load_document, name_value, save_document};

/// Password padding string, algorithm 2 step a
const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

const KEY_LENGTH: usize = 16;

/// Every permission granted (bits 1 and 2 must be clear)
const PERMISSIONS: i32 = -4;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProtectOptions {
    /// Required to open the document
    pub user_password: Option<String>,
    /// Defaults to the user password
    pub owner_password: Option<String>,
}

impl ProtectOptions {
    pub fn new(user_password: impl Into<String>) -> Self {
        Self {
            user_password: Some(user_password.into()),
            owner_password: None,
        }
    }
}

/// Encrypt a PDF so it opens only with the user password
pub fn protect_pdf(bytes: &[u8], options: &ProtectOptions) -> Result<Vec<u8>> {
    let user = options
        .user_password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or(ConvertError::MissingOption("password"))?;
    let owner = options
        .owner_password
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(user);

    let mut doc = load_document(bytes)?;

    // Deflate first: encrypted bytes no longer compress
    doc.prune_objects();
    doc.delete_zero_length_streams();
    doc.compress();

    let file_id = new_file_id(bytes);
    encrypt_document(&mut doc, user.as_bytes(), owner.as_bytes(), &file_id);

    let output = save_document(&mut doc)?;
    info!("Protected document ({} -> {} bytes)", bytes.len(), output.len());
    Ok(output)
}

/// Encrypt `doc` in place and install the Encrypt dictionary and file ID
pub(crate) fn encrypt_document(doc: &mut Document, user: &[u8], owner: &[u8], file_id: &[u8]) {
    let owner_entry = compute_owner_entry(owner, user);
    let key = compute_file_key(user, &owner_entry, PERMISSIONS, file_id);
    let user_entry = compute_user_entry(&key, file_id);

    for (&id, object) in doc.objects.iter_mut() {
        if is_xref_stream(object) {
            continue;
        }
        encrypt_object(object, &object_key(&key, id));
    }

    // Added after the loop so the Encrypt dictionary itself stays in the clear
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 2,
        "R" => 3,
        "Length" => (KEY_LENGTH * 8) as i64,
        "O" => Object::String(owner_entry, StringFormat::Hexadecimal),
        "U" => Object::String(user_entry, StringFormat::Hexadecimal),
        "P" => PERMISSIONS as i64,
    });

    let id = Object::String(file_id.to_vec(), StringFormat::Hexadecimal);
    doc.trailer.set("Encrypt", encrypt_id);
    doc.trailer.set("ID", vec![id.clone(), id]);
}

fn new_file_id(bytes: &[u8]) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(Uuid::new_v4().as_bytes());
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.finalize().to_vec()
}

fn is_xref_stream(object: &Object) -> bool {
    match object {
        Object::Stream(stream) => stream
            .dict
            .get(b"Type")
            .ok()
            .and_then(name_value)
            .is_some_and(|t| t == b"XRef"),
        _ => false,
    }
}

fn encrypt_object(object: &mut Object, key: &[u8]) {
    match object {
        Object::String(bytes, format) => {
            *bytes = rc4_crypt(key, bytes);
            *format = StringFormat::Hexadecimal;
        }
        Object::Array(items) => items.iter_mut().for_each(|item| encrypt_object(item, key)),
        Object::Dictionary(dict) => dict
            .iter_mut()
            .for_each(|(_, value)| encrypt_object(value, key)),
        Object::Stream(stream) => {
            stream
                .dict
                .iter_mut()
                .for_each(|(_, value)| encrypt_object(value, key));
            let encrypted = rc4_crypt(key, &stream.content);
            stream.set_content(encrypted);
        }
        _ => {}
    }
}

/// Pad or truncate a password to 32 bytes
fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

fn md5(data: &[u8]) -> [u8; 16] {
    Md5::digest(data).into()
}

/// RC4 `data` with `key`, then 19 more passes with the key XOR-ed by 1..=19
fn rc4_twenty_rounds(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = rc4_crypt(key, data);
    for i in 1..=19u8 {
        let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
        out = rc4_crypt(&round_key, &out);
    }
    out
}

/// Algorithm 3: the O entry
fn compute_owner_entry(owner: &[u8], user: &[u8]) -> Vec<u8> {
    let mut hash = md5(&pad_password(owner));
    for _ in 0..50 {
        hash = md5(&hash);
    }
    rc4_twenty_rounds(&hash[..KEY_LENGTH], &pad_password(user))
}

/// Algorithm 2: the file encryption key
fn compute_file_key(user: &[u8], owner_entry: &[u8], permissions: i32, file_id: &[u8]) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(pad_password(user));
    hasher.update(owner_entry);
    hasher.update(permissions.to_le_bytes());
    hasher.update(file_id);
    let mut hash: [u8; 16] = hasher.finalize().into();

    for _ in 0..50 {
        hash = md5(&hash[..KEY_LENGTH]);
    }
    hash[..KEY_LENGTH].to_vec()
}

/// Algorithm 5: the U entry, 16 significant bytes padded to 32
fn compute_user_entry(key: &[u8], file_id: &[u8]) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(file_id);
    let hash: [u8; 16] = hasher.finalize().into();

    let mut entry = rc4_twenty_rounds(key, &hash);
    entry.extend_from_slice(&PADDING[..16]);
    entry
}

/// Algorithm 1: per-object key from object number and generation
fn object_key(key: &[u8], (num, gen): ObjectId) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(key);
    hasher.update(&num.to_le_bytes()[..3]);
    hasher.update(gen.to_le_bytes());
    let hash = hasher.finalize();
    hash[..(key.len() + 5).min(16)].to_vec()
}

struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    fn new(key: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (i, v) in s.iter_mut().enumerate() {
            *v = i as u8;
        }
        let mut j = 0u8;
        for i in 0..256 {
            j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
            s.swap(i, j as usize);
        }
        Self { s, i: 0, j: 0 }
    }

    fn apply(&mut self, data: &mut [u8]) {
        for byte in data {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[self.i as usize]);
            self.s.swap(self.i as usize, self.j as usize);
            let k = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
            *byte ^= self.s[k as usize];
        }
    }
}

/// RC4 is symmetric: the same call encrypts and decrypts
fn rc4_crypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    Rc4::new(key).apply(&mut out);
    out
}
