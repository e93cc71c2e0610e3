//! Bulk CSV import pipeline.
//!
//! Each importable dataset implements [`ImportProtocol`]: it validates the
//! header shape up front, then reconciles data rows one at a time inside a
//! single transaction. Row outcomes are collected eagerly; the transaction
//! commits only if no storage error occurred, so a file either lands as a
//! whole or not at all. Per-row validation failures never abort the file -
//! they are reported back to the caller alongside the import counts.
//!
//! Duplicate checks observe transaction-visible state only. Two concurrent
//! imports into the same dataset can therefore both pass a duplicate check
//! and collide on a unique constraint at commit; the later-committing file
//! rolls back whole, surfaced as a storage fault.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

pub mod artigos;
pub mod condominios;
pub mod pessoas;

pub use artigos::ArtigoImport;
pub use condominios::CondominioImport;
pub use pessoas::PessoaImport;

/// Import failures that reject the request before or during reconciliation.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Request body carried no CSV payload.
    #[error("Conteúdo do CSV é obrigatório.")]
    MissingContent,
    /// Structurally unusable file (empty, bad header, no data rows).
    #[error("{0}")]
    Invalid(String),
    /// Storage failure; the surrounding transaction is rolled back.
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    /// Sensitive field could not be sealed; aborts the file like a
    /// storage failure.
    #[error(transparent)]
    Crypto(#[from] crate::crypto::CryptoError),
}

/// What happened to a single data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// Row was written to storage.
    Inserted,
    /// Row duplicates an existing record; carries an identifier for the report.
    Skipped(String),
    /// Row failed validation; carries the message shown to the caller.
    Errored(String),
    /// Row had no usable content and is not counted at all.
    Blank,
}

/// Aggregated result of a completed import run.
#[derive(Debug)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: Vec<String>,
    pub errors: Vec<String>,
    pub message: String,
}

impl ImportReport {
    /// A run with row errors and nothing imported is reported as a client
    /// error; any successfully imported row makes the run a success.
    pub fn is_failure(&self) -> bool {
        !self.errors.is_empty() && self.imported == 0
    }
}

/// Running tallies handed to [`ImportProtocol::summary`].
#[derive(Debug, Default)]
pub struct Tally {
    pub imported: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// A dataset that can be loaded from CSV.
///
/// Implementations own the header contract and the per-row reconciliation
/// against storage; the shared [`run_import`] driver owns line handling,
/// transaction scope and outcome bookkeeping.
#[async_trait]
pub trait ImportProtocol: Send + Sync {
    /// Parsed header state threaded into every row reconciliation.
    type Header: Send + Sync;

    /// Protocol name for logging.
    fn name(&self) -> &'static str;

    /// Validate file shape and extract the column layout.
    ///
    /// Receives all non-blank lines with the header first, so protocols can
    /// produce their own messages for empty and header-only files.
    fn parse_header(&self, lines: &[String]) -> Result<Self::Header, ImportError>;

    /// Reconcile one data row against storage.
    ///
    /// `line_number` is the 1-based position within the retained lines, with
    /// the header at line 1. Only storage and sealing errors abort the file;
    /// everything else is expressed as a [`RowOutcome`].
    async fn reconcile_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        header: &Self::Header,
        line_number: usize,
        line: &str,
    ) -> Result<RowOutcome, ImportError>;

    /// Human-readable summary for the response body.
    fn summary(&self, tally: &Tally) -> String;
}

/// Drive a full import: parse, reconcile every row in one transaction,
/// commit, and assemble the report.
pub async fn run_import<P: ImportProtocol>(
    pool: &PgPool,
    protocol: &P,
    content: Option<&str>,
) -> Result<ImportReport, ImportError> {
    // Whitespace-only content is not "missing": it falls through to the
    // protocol's own empty-file message.
    let content = match content {
        Some(text) if !text.is_empty() => text,
        _ => return Err(ImportError::MissingContent),
    };

    let lines = csv_lines(content);
    let header = protocol.parse_header(&lines)?;

    let mut tx = pool.begin().await?;
    let mut outcomes = Vec::with_capacity(lines.len().saturating_sub(1));
    for (index, line) in lines.iter().enumerate().skip(1) {
        let outcome = protocol
            .reconcile_row(&mut tx, &header, index + 1, line)
            .await?;
        outcomes.push(outcome);
    }
    tx.commit().await?;

    let mut report = ImportReport {
        imported: 0,
        skipped: Vec::new(),
        errors: Vec::new(),
        message: String::new(),
    };
    for outcome in outcomes {
        match outcome {
            RowOutcome::Inserted => report.imported += 1,
            RowOutcome::Skipped(who) => report.skipped.push(who),
            RowOutcome::Errored(message) => report.errors.push(message),
            RowOutcome::Blank => {}
        }
    }
    let tally = Tally {
        imported: report.imported,
        skipped: report.skipped.len(),
        errors: report.errors.len(),
    };
    report.message = protocol.summary(&tally);

    tracing::info!(
        protocol = protocol.name(),
        imported = tally.imported,
        skipped = tally.skipped,
        errors = tally.errors,
        "import finished"
    );

    Ok(report)
}

/// Split CSV content into trimmed, non-blank lines, tolerating a UTF-8 BOM
/// and any of the usual line-ending conventions.
pub(crate) fn csv_lines(content: &str) -> Vec<String> {
    content
        .strip_prefix('\u{feff}')
        .unwrap_or(content)
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Remove at most one leading and one trailing double quote.
pub(crate) fn strip_outer_quotes(value: &str) -> &str {
    let value = value.strip_prefix('"').unwrap_or(value);
    value.strip_suffix('"').unwrap_or(value)
}

/// Split one CSV row on commas, leaving commas inside double-quoted
/// segments alone. Quotes are kept in the output; callers strip them
/// per field.
pub(crate) fn split_csv_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push('"');
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}
