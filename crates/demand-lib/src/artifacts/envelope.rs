//! On-disk envelope shared by every artifact file
//!
//! Each file is a bincode-encoded `{header, payload}`. The header pins the
//! format version, the artifact kind, the training run that produced it and
//! the SHA-256 of the payload bytes.

use super::ArtifactKind;
use crate::error::{LoadError, PersistError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Bumped whenever a persisted structure changes shape
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

const MAGIC: [u8; 4] = *b"BKDM";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactHeader {
    magic: [u8; 4],
    format_version: u32,
    kind: ArtifactKind,
    run_id: String,
    checksum: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    header: ArtifactHeader,
    payload: Vec<u8>,
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

pub(crate) fn encode<T: Serialize>(
    kind: ArtifactKind,
    run_id: &str,
    value: &T,
) -> Result<Vec<u8>, PersistError> {
    encode_with_version(kind, run_id, value, ARTIFACT_FORMAT_VERSION)
}

pub(crate) fn encode_with_version<T: Serialize>(
    kind: ArtifactKind,
    run_id: &str,
    value: &T,
    format_version: u32,
) -> Result<Vec<u8>, PersistError> {
    let payload =
        bincode::serialize(value).map_err(|source| PersistError::Encode { kind, source })?;
    let envelope = Envelope {
        header: ArtifactHeader {
            magic: MAGIC,
            format_version,
            kind,
            run_id: run_id.to_string(),
            checksum: compute_checksum(&payload),
        },
        payload,
    };
    bincode::serialize(&envelope).map_err(|source| PersistError::Encode { kind, source })
}

/// Decode an artifact, returning the run id it was written by
pub(crate) fn decode<T: DeserializeOwned>(
    kind: ArtifactKind,
    bytes: &[u8],
) -> Result<(String, T), LoadError> {
    let envelope: Envelope = bincode::deserialize(bytes)
        .map_err(|e| LoadError::incompatible(kind, format!("unreadable envelope: {}", e)))?;
    let header = envelope.header;

    if header.magic != MAGIC {
        return Err(LoadError::incompatible(kind, "not an artifact file"));
    }
    if header.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(LoadError::incompatible(
            kind,
            format!(
                "format version {} (expected {})",
                header.format_version, ARTIFACT_FORMAT_VERSION
            ),
        ));
    }
    if header.kind != kind {
        return Err(LoadError::incompatible(
            kind,
            format!("file holds a {} artifact", header.kind),
        ));
    }

    let checksum = compute_checksum(&envelope.payload);
    if checksum != header.checksum {
        return Err(LoadError::incompatible(
            kind,
            format!("checksum mismatch: expected {}, got {}", header.checksum, checksum),
        ));
    }

    let value = bincode::deserialize(&envelope.payload)
        .map_err(|e| LoadError::incompatible(kind, format!("unreadable payload: {}", e)))?;
    Ok((header.run_id, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum(b"model bytes");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, compute_checksum(b"model bytes"));
        assert_ne!(checksum, compute_checksum(b"model bytez"));
    }

    #[test]
    fn test_decode_returns_run_id() {
        let names = vec!["season".to_string(), "hr".to_string()];
        let bytes = encode(ArtifactKind::FeatureNames, "run-1", &names).unwrap();
        let (run_id, decoded): (String, Vec<String>) =
            decode(ArtifactKind::FeatureNames, &bytes).unwrap();
        assert_eq!(run_id, "run-1");
        assert_eq!(decoded, names);
    }

    #[test]
    fn test_kind_mismatch_is_incompatible() {
        let bytes = encode(ArtifactKind::FeatureNames, "run-1", &vec!["a".to_string()]).unwrap();
        let err = decode::<Vec<String>>(ArtifactKind::Model, &bytes).unwrap_err();
        assert!(matches!(err, LoadError::Incompatible { kind: ArtifactKind::Model, .. }));
    }

    #[test]
    fn test_old_format_version_is_incompatible() {
        let bytes =
            encode_with_version(ArtifactKind::FeatureNames, "run-1", &vec!["a".to_string()], 0)
                .unwrap();
        let err = decode::<Vec<String>>(ArtifactKind::FeatureNames, &bytes).unwrap_err();
        assert!(err.to_string().contains("format version 0"));
    }

    #[test]
    fn test_corrupted_payload_fails_checksum() {
        let names = vec!["abc".to_string()];
        let mut bytes = encode(ArtifactKind::FeatureNames, "run-1", &names).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = decode::<Vec<String>>(ArtifactKind::FeatureNames, &bytes).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_garbage_is_incompatible() {
        let err = decode::<Vec<String>>(ArtifactKind::TrainData, b"\x80\x04pickle").unwrap_err();
        assert!(matches!(err, LoadError::Incompatible { .. }));
    }

    #[test]
    fn test_structure_mismatch_is_incompatible() {
        // A payload written as a list of numbers cannot be read as a list of names
        let bytes = encode(ArtifactKind::FeatureNames, "run-1", &vec![1.5f64, 2.5]).unwrap();
        assert!(decode::<Vec<String>>(ArtifactKind::FeatureNames, &bytes).is_err());
    }
}
