use std::{
    fmt,
    fs::File,
    io,
    path::Path,
    str::FromStr,
};

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::error::{HashError, HashResult};

/// Content digest used for change detection of cached payloads.
///
/// Neither algorithm is relied upon for authenticity; the digest only tells
/// whether the bytes on disk are the bytes the manifest advertised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// MD5, the digest carried by the `md5` manifest field.
    #[default]
    Md5,
    /// BLAKE3, for servers that publish stronger digests.
    Blake3,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DigestAlgorithm::Md5 => write!(f, "md5"),
            DigestAlgorithm::Blake3 => write!(f, "blake3"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(DigestAlgorithm::Md5),
            "blake3" => Ok(DigestAlgorithm::Blake3),
            other => Err(format!("unsupported digest algorithm `{other}`")),
        }
    }
}

/// Computes the hex-encoded digest of an in-memory byte slice.
///
/// # Example
///
/// ```
/// use bundlesync_utils::hash::{digest_bytes, DigestAlgorithm};
///
/// assert_eq!(
///     digest_bytes(DigestAlgorithm::Md5, b""),
///     "d41d8cd98f00b204e9800998ecf8427e"
/// );
/// ```
pub fn digest_bytes(algorithm: DigestAlgorithm, bytes: &[u8]) -> String {
    match algorithm {
        DigestAlgorithm::Md5 => format!("{:x}", Md5::digest(bytes)),
        DigestAlgorithm::Blake3 => blake3::hash(bytes).to_hex().to_string(),
    }
}

/// Calculates the checksum of a file.
///
/// This method reads the contents of a file and computes a checksum, which is returned as a
/// lower-case hex-encoded string.
///
/// # Arguments
///
/// * `algorithm` - The digest algorithm to use.
/// * `file_path` - The path to the file to calculate the checksum for.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the file cannot be read.
///
/// # Example
///
/// ```no_run
/// use bundlesync_utils::error::HashResult;
/// use bundlesync_utils::hash::{calculate_checksum, DigestAlgorithm};
///
/// fn main() -> HashResult<()> {
///     let checksum = calculate_checksum(DigestAlgorithm::Md5, "/path/to/file")?;
///     println!("Checksum is {}", checksum);
///     Ok(())
/// }
/// ```
pub fn calculate_checksum<P: AsRef<Path>>(
    algorithm: DigestAlgorithm,
    file_path: P,
) -> HashResult<String> {
    let file_path = file_path.as_ref();
    let read_failed = |err| {
        HashError::ReadFailed {
            path: file_path.to_path_buf(),
            source: err,
        }
    };

    match algorithm {
        DigestAlgorithm::Md5 => {
            let mut file = File::open(file_path).map_err(read_failed)?;
            let mut hasher = Md5::new();
            io::copy(&mut file, &mut hasher).map_err(read_failed)?;

            Ok(format!("{:x}", hasher.finalize()))
        }
        DigestAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            hasher.update_mmap(file_path).map_err(read_failed)?;
            Ok(hasher.finalize().to_hex().to_string())
        }
    }
}

/// Verifies the checksum of a file against an expected value.
///
/// This method calculates the checksum of the given file and compares it case-insensitively
/// against the `expected` checksum string.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the file cannot be read.
pub fn verify_checksum<P: AsRef<Path>>(
    algorithm: DigestAlgorithm,
    file_path: P,
    expected: &str,
) -> HashResult<bool> {
    let actual = calculate_checksum(algorithm, file_path)?;
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}

/// Like [`verify_checksum`], but an unreadable file simply does not verify.
pub fn verify_file<P: AsRef<Path>>(algorithm: DigestAlgorithm, file_path: P, expected: &str) -> bool {
    verify_checksum(algorithm, file_path, expected).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const HELLO_MD5: &str = "6f5902ac237024bdd0c176cb93063dc4";
    const HELLO_BLAKE3: &str = "dc5a4edb8240b018124052c330270696f96771a63b45250a5c17d3000e823355";

    fn hello_file() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world\n").unwrap();
        file
    }

    #[test]
    fn test_digest_bytes() {
        assert_eq!(
            digest_bytes(DigestAlgorithm::Md5, b"hello world"),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(
            digest_bytes(DigestAlgorithm::Blake3, b"hello world\n"),
            HELLO_BLAKE3
        );
    }

    #[test]
    fn test_calculate_checksum() {
        let file = hello_file();
        assert_eq!(
            calculate_checksum(DigestAlgorithm::Md5, file.path()).unwrap(),
            HELLO_MD5
        );
        assert_eq!(
            calculate_checksum(DigestAlgorithm::Blake3, file.path()).unwrap(),
            HELLO_BLAKE3
        );
    }

    #[test]
    fn test_file_and_bytes_agree() {
        let file = hello_file();
        for algorithm in [DigestAlgorithm::Md5, DigestAlgorithm::Blake3] {
            assert_eq!(
                calculate_checksum(algorithm, file.path()).unwrap(),
                digest_bytes(algorithm, b"hello world\n")
            );
        }
    }

    #[test]
    fn test_large_file_matches_in_memory_digest() {
        let payload: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&payload).unwrap();

        assert_eq!(
            calculate_checksum(DigestAlgorithm::Md5, file.path()).unwrap(),
            digest_bytes(DigestAlgorithm::Md5, &payload)
        );
    }

    #[test]
    fn test_verify_checksum_is_case_insensitive() {
        let file = hello_file();
        assert!(verify_checksum(DigestAlgorithm::Md5, file.path(), HELLO_MD5).unwrap());
        assert!(verify_checksum(
            DigestAlgorithm::Md5,
            file.path(),
            &HELLO_MD5.to_uppercase()
        )
        .unwrap());
    }

    #[test]
    fn test_verify_checksum_invalid() {
        let file = hello_file();
        assert!(!verify_checksum(DigestAlgorithm::Md5, file.path(), "invalid-checksum").unwrap());
    }

    #[test]
    fn test_calculate_checksum_file_not_found() {
        let result = calculate_checksum(DigestAlgorithm::Md5, "/path/to/nonexistent/file");
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_file_never_errors() {
        assert!(!verify_file(
            DigestAlgorithm::Md5,
            "/path/to/nonexistent/file",
            HELLO_MD5
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(!verify_file(DigestAlgorithm::Blake3, dir.path(), HELLO_BLAKE3));

        let file = hello_file();
        assert!(verify_file(DigestAlgorithm::Md5, file.path(), HELLO_MD5));
    }

    #[test]
    fn test_algorithm_from_str() {
        assert_eq!("MD5".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Md5));
        assert_eq!(
            " blake3 ".parse::<DigestAlgorithm>(),
            Ok(DigestAlgorithm::Blake3)
        );
        assert!("sha1".parse::<DigestAlgorithm>().is_err());
        assert_eq!(DigestAlgorithm::default(), DigestAlgorithm::Md5);
    }
}
