// Hashing and byte helpers shared by every canonical encoding

use sha2::{Digest, Sha256};
use ripemd::Ripemd160;

/// Single SHA256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let hash = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&hash);
    result
}

/// SHA256 double hash
/// sha256d = SHA256(SHA256(data))
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Hex-encoded SHA256
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Plain RIPEMD160
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let hash = Ripemd160::digest(data);
    let mut result = [0u8; 20];
    result.copy_from_slice(&hash);
    result
}

/// RIPEMD160(SHA256(data)) - used for address generation and OP_HASH160
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// Big-endian 8 byte encoding used by every hashed integer field
pub fn int64_be(value: i64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Concatenate byte strings in order
pub fn concat_bytes<T: AsRef<[u8]>>(parts: &[T]) -> Vec<u8> {
    let len = parts.iter().map(|p| p.as_ref().len()).sum();
    let mut buf = Vec::with_capacity(len);
    for part in parts {
        buf.extend_from_slice(part.as_ref());
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex("你好".as_bytes()),
            "670d9743542cae3ea7ebe36af56bd53648b0a1126162e78d81a32934a711302e"
        );
    }

    #[test]
    fn test_ripemd160_known_vector() {
        assert_eq!(
            hex::encode(ripemd160(b"abc")),
            "8eb208f7e05d987a9b044a8e98c6b087f15a0bfc"
        );
    }

    #[test]
    fn test_hash160() {
        assert_eq!(
            hex::encode(hash160(&[5, 0, 2])),
            "d72c354f2dc38f12a84917349c9f6492f0db3d91"
        );
    }

    #[test]
    fn test_sha256d_differs_from_single() {
        let data = b"hello world";
        assert_ne!(sha256d(data), sha256(data));
        assert_eq!(sha256d(data), sha256(&sha256(data)));
    }

    #[test]
    fn test_int64_be() {
        assert_eq!(int64_be(1000), [0, 0, 0, 0, 0, 0, 3, 232]);
        assert_eq!(int64_be(257)[7], 1);
        assert_eq!(int64_be(257)[6], 1);
        assert_eq!(int64_be(0), [0u8; 8]);
    }

    #[test]
    fn test_concat_bytes() {
        let parts: [&[u8]; 3] = [&[1, 2, 3], &[], &[5, 6, 7]];
        assert_eq!(concat_bytes(&parts), vec![1, 2, 3, 5, 6, 7]);

        let nested: Vec<Vec<u8>> = vec![vec![1, 2, 3], vec![5, 6, 7]];
        assert_eq!(concat_bytes(&nested), vec![1, 2, 3, 5, 6, 7]);
    }
}
