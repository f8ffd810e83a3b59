//! Canonical binary encoding of [`ContentDescriptor`]
//!
//! Layout: `b"VEIL"` magic, one format-version byte, then the postcard
//! encoding of the descriptor fields in declaration order. The descriptor
//! contains no maps, so equal values always produce identical bytes.
//!
//! [`decode`] accepts only what [`encode`] produces: structurally invalid
//! descriptors, trailing bytes and non-canonical encodings are rejected.

use crate::descriptor::ContentDescriptor;
use crate::error::{CodecError, CodecResult};

/// Magic prefix of an encoded descriptor
pub const MAGIC: &[u8; 4] = b"VEIL";

/// Current format version
pub const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1;

/// Encode a descriptor canonically
pub fn encode(descriptor: &ContentDescriptor) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + 64 + descriptor.piece_hashes.len() * 32);
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    // Growable Vec output and derive-only field types: postcard cannot fail here.
    postcard::to_extend(descriptor, out).expect("descriptor serialization into Vec is infallible")
}

/// Decode and validate a descriptor
pub fn decode(bytes: &[u8]) -> CodecResult<ContentDescriptor> {
    if bytes.len() < HEADER_LEN || &bytes[..MAGIC.len()] != MAGIC {
        return Err(CodecError::BadMagic);
    }

    let version = bytes[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let (descriptor, rest) = postcard::take_from_bytes::<ContentDescriptor>(&bytes[HEADER_LEN..])
        .map_err(|e| CodecError::Malformed(e.to_string()))?;

    if !rest.is_empty() {
        return Err(CodecError::TrailingBytes(rest.len()));
    }

    descriptor.validate()?;

    if encode(&descriptor) != bytes {
        return Err(CodecError::NonCanonical);
    }

    Ok(descriptor)
}
