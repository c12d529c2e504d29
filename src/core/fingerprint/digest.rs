//! Streaming SHA-256 content digest.

use sha2::{Digest, Sha256};
use std::io::{self, Read};

const CHUNK_SIZE: usize = 8192;

/// Digest a byte stream in fixed-size chunks and return lowercase hex.
pub fn cryptographic_digest<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_stream_has_known_digest() {
        let digest = cryptographic_digest(Cursor::new(Vec::new())).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn known_input_digest() {
        let digest = cryptographic_digest(Cursor::new(b"abc".to_vec())).unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn multi_chunk_stream_matches_single_shot() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let streamed = cryptographic_digest(Cursor::new(data.clone())).unwrap();
        let single = format!("{:x}", Sha256::digest(&data));
        assert_eq!(streamed, single);
    }
}
