//! # rwa-proof-core
//!
//! Verification-claim evaluation for real-world-asset (RWA) tokens: given
//! a token identifier, produce existence, legality and collateral proofs
//! and a worst-of-three risk classification.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ProofEngine                             │
//! │                                                              │
//! │  asset:<chainId>/0x<contract>/<tokenId>                      │
//! │                           │                                  │
//! │                           ▼                                  │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │   TokenIdentifier::parse  →  MetadataSource(s)   │      │
//! │  └──────────────────────────────────────────────────┘      │
//! │                           │                                  │
//! │          ┌────────────────┼────────────────┐                 │
//! │          ▼                ▼                ▼                 │
//! │  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐        │
//! │  │  Existence   │ │   Legality   │ │  Collateral  │        │
//! │  │ (custodians) │ │ (regulators) │ │ (lending)    │        │
//! │  └──────────────┘ └──────────────┘ └──────────────┘        │
//! │          │                │                │                 │
//! │          └────────────────┼────────────────┘                 │
//! │                           ▼                                  │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │   OverallRisk::derive (worst of three)  → audit  │      │
//! │  └──────────────────────────────────────────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Never silently verified**: a verifier whose sources are all
//!   unreachable reports `pending`
//! - **Bounded latency**: every verifier and every source request carries a
//!   timeout
//! - **Stateless evaluations**: concurrent evaluations share no writable
//!   state beyond the optional cache and audit log

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)] // Too strict for production code
#![allow(clippy::doc_markdown)] // Allow product names without backticks
#![allow(clippy::missing_errors_doc)] // Error documentation not required
#![allow(clippy::missing_panics_doc)] // Panic documentation not required
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

pub mod audit;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod https;
pub mod identifier;
pub mod sources;
pub mod types;
pub mod verifier;

pub use cache::{CachedSource, TtlCache};
pub use config::GatewayConfig;
pub use engine::ProofEngine;
pub use error::{CallerState, IdentifierSegment, ProofError, IDENTIFIER_GRAMMAR};
pub use https::HttpsClient;
pub use identifier::TokenIdentifier;
pub use sources::{
    CollateralPosition, ComplianceReport, CustodyRecord, CustodyRegistry, LendingProtocolScanner,
    MetadataSource, RegulatoryRegistry,
};
pub use types::{
    AssetMetadata, AssetType, OverallRisk, ProofCategory, ProofExtra, ProofResult, ProofSet,
    ProofStatus, VerificationRecord,
};
pub use verifier::{CollateralVerifier, ExistenceVerifier, LegalityVerifier, ProofVerifier};

// Audit trail
pub use audit::{verify_audit_log, AuditEntry, AuditLog, AuditVerificationResult};
