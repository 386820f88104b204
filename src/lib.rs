//! proofmark
//!
//! Rule-based proofreading of Word documents. Visible text is rewritten
//! (full-width/half-width forms, bracket styles, punctuation) while every run
//! keeps its formatting, and each changed span is highlighted for review.
//!
//! This library provides:
//! - `segment` / `assemble`: paragraph runs and their logical text
//! - `rules` / `matcher`: ordered rules and first-committed-wins resolution
//! - `reconcile`: splitting runs around resolved spans
//! - `engine`: the per-paragraph driver
//! - `audit`: the record stream of committed edits
//! - `container`: DOCX zip and folder I/O
//!
//! Binaries:
//! - `proofmark`: proofread a DOCX, unpack it, or pack a folder back

pub mod assemble;
pub mod audit;
pub mod container;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod reconcile;
pub mod rules;
pub mod segment;
pub mod style;
pub mod xml;

pub use assemble::{MergeConfig, WindowMode};
pub use audit::{AuditRecord, AuditSink, CsvAuditLog, MemoryAudit, TextAuditLog};
pub use engine::{Diagnostic, Engine, EngineBuilder, PartReport};
pub use error::ProofError;
pub use rules::{Guard, Precondition, Rewrite, Rule, RuleSet, Script};
pub use style::Highlight;
