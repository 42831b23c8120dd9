//! Evaluation audit log.
//!
//! Every completed evaluation can be appended to a JSON Lines file as a
//! hash-chained entry: each entry carries the SHA-256 of the previous one,
//! starting from `"genesis"`. [`verify_audit_log`] walks the file and
//! reports the first entry where the chain breaks.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::error::ProofError;
use crate::types::{OverallRisk, ProofStatus, VerificationRecord};

const GENESIS: &str = "genesis";

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the chain, starting at 1.
    pub sequence_number: u64,
    /// When the entry was written (RFC 3339).
    pub recorded_at: String,
    /// Canonical token identifier that was evaluated.
    pub token_id: String,
    /// Risk reported to the caller.
    pub overall_risk: OverallRisk,
    /// Existence, legality and collateral statuses.
    pub statuses: [ProofStatus; 3],
    /// SHA-256 of the full verification record JSON.
    pub record_digest: String,
    /// Hash of previous entry or "genesis".
    pub previous_hash: String,
    /// Hash of this entry.
    pub entry_hash: String,
}

impl AuditEntry {
    /// Compute the expected hash for this entry.
    ///
    /// Creates a canonical JSON representation and computes SHA-256.
    pub fn compute_hash(&self) -> String {
        let canonical = serde_json::json!({
            "sequence_number": self.sequence_number,
            "recorded_at": self.recorded_at,
            "token_id": self.token_id,
            "overall_risk": self.overall_risk,
            "statuses": self.statuses,
            "record_digest": self.record_digest,
            "previous_hash": self.previous_hash,
        });
        sha256_hex(canonical.to_string().as_bytes())
    }

    /// Verify this entry's hash is correct.
    pub fn verify_hash(&self) -> bool {
        self.compute_hash() == self.entry_hash
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Last entry written, which the next entry links to.
#[derive(Debug)]
struct ChainHead {
    sequence_number: u64,
    hash: String,
}

/// Append-only audit log.
///
/// Appends are serialized by a mutex; concurrent evaluations share one log.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    head: Mutex<ChainHead>,
}

impl AuditLog {
    /// Open (or create) a log, resuming the chain from its last entry.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::AuditError`] if an existing file cannot be read
    /// or its last line is not an audit entry.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ProofError> {
        let path = path.into();
        let head = match File::open(&path) {
            Ok(file) => {
                let last = BufReader::new(file)
                    .lines()
                    .map_while(Result::ok)
                    .filter(|line| !line.trim().is_empty())
                    .last();
                match last {
                    Some(line) => {
                        let entry: AuditEntry =
                            serde_json::from_str(&line).map_err(|e| ProofError::AuditError {
                                message: format!(
                                    "last entry of {} is unreadable: {e}",
                                    path.display()
                                ),
                            })?;
                        ChainHead {
                            sequence_number: entry.sequence_number,
                            hash: entry.entry_hash,
                        }
                    },
                    None => ChainHead {
                        sequence_number: 0,
                        hash: GENESIS.to_string(),
                    },
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ChainHead {
                sequence_number: 0,
                hash: GENESIS.to_string(),
            },
            Err(e) => {
                return Err(ProofError::AuditError {
                    message: format!("cannot open {}: {e}", path.display()),
                })
            },
        };

        debug!(
            path = %path.display(),
            sequence = head.sequence_number,
            "Audit log opened"
        );
        Ok(Self {
            path,
            head: Mutex::new(head),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`ProofError::AuditError`] if the record cannot be serialized
    /// or the file cannot be written. The chain head only advances after a
    /// successful write.
    #[instrument(skip_all, fields(token = %record.token_id))]
    pub fn append(&self, record: &VerificationRecord) -> Result<AuditEntry, ProofError> {
        let record_json = serde_json::to_vec(record).map_err(|e| ProofError::AuditError {
            message: format!("cannot serialize record: {e}"),
        })?;

        let mut head = self.head.lock().map_err(|_| ProofError::AuditError {
            message: "audit log lock poisoned".into(),
        })?;

        let mut entry = AuditEntry {
            sequence_number: head.sequence_number + 1,
            recorded_at: chrono::Utc::now().to_rfc3339(),
            token_id: record.token_id.canonical(),
            overall_risk: record.overall_risk,
            statuses: record.proofs.statuses(),
            record_digest: sha256_hex(&record_json),
            previous_hash: head.hash.clone(),
            entry_hash: String::new(),
        };
        entry.entry_hash = entry.compute_hash();

        let mut line = serde_json::to_string(&entry).map_err(|e| ProofError::AuditError {
            message: format!("cannot serialize entry: {e}"),
        })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ProofError::AuditError {
                message: format!("cannot open {}: {e}", self.path.display()),
            })?;
        file.write_all(line.as_bytes())
            .map_err(|e| ProofError::AuditError {
                message: format!("cannot write {}: {e}", self.path.display()),
            })?;

        head.sequence_number = entry.sequence_number;
        head.hash = entry.entry_hash.clone();
        debug!(sequence = entry.sequence_number, "Audit entry appended");
        Ok(entry)
    }
}

/// Result of audit log verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditVerificationResult {
    /// Whether the audit log is intact.
    pub valid: bool,
    /// Total entries in the audit log.
    pub total_entries: u64,
    /// Whether the hash chain is intact.
    pub hash_chain_valid: bool,
    /// Whether the first entry links to "genesis".
    pub genesis_valid: bool,
    /// First tampered sequence number (if any).
    pub first_tampered_sequence: Option<u64>,
    /// Hash of the last entry, the value the next append will link to.
    pub head_hash: Option<String>,
    /// List of errors found.
    pub errors: Vec<String>,
}

/// Check a sequence of entries, in file order.
#[instrument(skip(entries), fields(entry_count = entries.len()))]
pub fn verify_entries(entries: &[AuditEntry]) -> AuditVerificationResult {
    let mut errors = Vec::new();
    let mut first_tampered: Option<u64> = None;

    let genesis_valid = entries.first().map_or(true, |e| e.previous_hash == GENESIS);
    if let Some(first) = entries.first() {
        if !genesis_valid {
            errors.push(format!(
                "Invalid genesis: first entry has previous_hash='{}', expected '{GENESIS}'",
                first.previous_hash
            ));
            first_tampered.get_or_insert(first.sequence_number);
        }
    }

    let mut hash_chain_valid = true;
    let mut previous_hash = GENESIS.to_string();
    let mut expected_seq = entries.first().map_or(1, |e| e.sequence_number);

    for entry in entries {
        if entry.sequence_number != expected_seq {
            errors.push(format!(
                "Sequence gap: expected {expected_seq}, got {}",
                entry.sequence_number
            ));
            first_tampered.get_or_insert(entry.sequence_number);
        }

        if entry.previous_hash != previous_hash {
            errors.push(format!(
                "Hash chain break at sequence {}: expected previous_hash='{previous_hash}', got '{}'",
                entry.sequence_number, entry.previous_hash
            ));
            hash_chain_valid = false;
            first_tampered.get_or_insert(entry.sequence_number);
        }

        if !entry.verify_hash() {
            errors.push(format!(
                "Hash mismatch at sequence {}: computed='{}', stored='{}'",
                entry.sequence_number,
                entry.compute_hash(),
                entry.entry_hash
            ));
            hash_chain_valid = false;
            first_tampered.get_or_insert(entry.sequence_number);
        }

        previous_hash = entry.entry_hash.clone();
        expected_seq = entry.sequence_number + 1;
    }

    let total_entries = entries.len() as u64;
    let valid = hash_chain_valid && genesis_valid && errors.is_empty();
    if valid {
        info!(entries = total_entries, "Audit log verification passed");
    } else {
        warn!(
            entries = total_entries,
            errors = errors.len(),
            "Audit log verification FAILED"
        );
    }

    AuditVerificationResult {
        valid,
        total_entries,
        hash_chain_valid,
        genesis_valid,
        first_tampered_sequence: first_tampered,
        head_hash: entries.last().map(|e| e.entry_hash.clone()),
        errors,
    }
}

/// Verify an audit log file.
///
/// A line that is not an audit entry breaks the chain at that position.
///
/// # Errors
///
/// Returns [`ProofError::AuditError`] if the file cannot be read.
pub fn verify_audit_log(path: &Path) -> Result<AuditVerificationResult, ProofError> {
    let file = File::open(path).map_err(|e| ProofError::AuditError {
        message: format!("cannot open {}: {e}", path.display()),
    })?;

    let mut entries = Vec::new();
    let mut unreadable = None;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| ProofError::AuditError {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                unreadable = Some(format!("Unreadable entry on line {}: {e}", index + 1));
                break;
            },
        }
    }

    let mut result = verify_entries(&entries);
    if let Some(error) = unreadable {
        let position = entries.last().map_or(1, |e| e.sequence_number + 1);
        result.valid = false;
        result.hash_chain_valid = false;
        result.first_tampered_sequence.get_or_insert(position);
        result.errors.push(error);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::identifier::TokenIdentifier;
    use crate::types::{AssetMetadata, AssetType, ProofResult, ProofSet};

    fn record(local_id: &str) -> VerificationRecord {
        let proofs = ProofSet {
            existence: ProofResult::verified("Land Bank", "VC Signature"),
            legality: ProofResult::verified("FSC", "EIP-712 Signature"),
            collateral: ProofResult::verified("Aave", "On-chain Scan"),
        };
        VerificationRecord {
            token_id: TokenIdentifier::parse(&format!("asset:1/0xab/{local_id}")).unwrap(),
            metadata: AssetMetadata::new("Vault", AssetType::Commodity),
            overall_risk: OverallRisk::derive(proofs.statuses()),
            overall_message: OverallRisk::Safe.message().into(),
            proofs,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_empty_chain() {
        let result = verify_entries(&[]);
        assert!(result.valid);
        assert_eq!(result.total_entries, 0);
    }

    #[test]
    fn test_appended_chain_verifies_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let log = AuditLog::open(&path).unwrap();
        let first = log.append(&record("1")).unwrap();
        assert_eq!(first.previous_hash, "genesis");
        log.append(&record("2")).unwrap();
        drop(log);

        let log = AuditLog::open(&path).unwrap();
        let third = log.append(&record("3")).unwrap();
        assert_eq!(third.sequence_number, 3);

        let result = verify_audit_log(&path).unwrap();
        assert!(result.valid, "{:?}", result.errors);
        assert_eq!(result.total_entries, 3);
        assert_eq!(result.head_hash, Some(third.entry_hash));
    }

    #[test]
    fn test_tampered_line_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::open(&path).unwrap();
        for id in ["1", "2", "3"] {
            log.append(&record(id)).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let tampered: Vec<String> = content
            .lines()
            .enumerate()
            .map(|(i, line)| {
                if i == 1 {
                    line.replace("\"safe\"", "\"danger\"")
                } else {
                    line.to_string()
                }
            })
            .collect();
        std::fs::write(&path, tampered.join("\n")).unwrap();

        let result = verify_audit_log(&path).unwrap();
        assert!(!result.valid);
        assert_eq!(result.first_tampered_sequence, Some(2));
        assert!(result.errors.iter().any(|e| e.contains("Hash mismatch")));
    }

    #[test]
    fn test_broken_link_and_garbage_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::open(&path).unwrap();
        log.append(&record("1")).unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "not json").unwrap();

        let result = verify_audit_log(&path).unwrap();
        assert!(!result.valid);
        assert_eq!(result.total_entries, 1);
        assert_eq!(result.first_tampered_sequence, Some(2));

        // Reopening refuses to extend a chain whose head is unreadable
        assert!(matches!(
            AuditLog::open(&path),
            Err(ProofError::AuditError { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(verify_audit_log(&dir.path().join("absent.jsonl")).is_err());
    }
}
