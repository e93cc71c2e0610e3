//! Single-column import of condominium names.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{strip_outer_quotes, ImportError, ImportProtocol, RowOutcome, Tally};

/// Loads `condominios` from a one-column CSV whose header must be `nome`.
/// Names that already exist are counted as skipped, never overwritten.
pub struct CondominioImport;

#[async_trait]
impl ImportProtocol for CondominioImport {
    type Header = ();

    fn name(&self) -> &'static str {
        "condominios"
    }

    fn parse_header(&self, lines: &[String]) -> Result<(), ImportError> {
        if lines.is_empty() {
            return Err(ImportError::Invalid(
                "O arquivo CSV está vazio ou não contém dados.".to_string(),
            ));
        }
        let header = lines[0].to_lowercase().replace('"', "");
        let header = header.trim();
        if header != "nome" {
            return Err(ImportError::Invalid(format!(
                "Formato de CSV inválido. A coluna do cabeçalho deve ser \"nome\", \
                 mas foi encontrado: \"{header}\"."
            )));
        }
        if lines.len() == 1 {
            return Err(ImportError::Invalid(
                "O arquivo CSV não contém dados para importar (apenas cabeçalho).".to_string(),
            ));
        }
        Ok(())
    }

    async fn reconcile_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        _header: &(),
        _line_number: usize,
        line: &str,
    ) -> Result<RowOutcome, ImportError> {
        let nome = strip_outer_quotes(line).trim();
        if nome.is_empty() {
            return Ok(RowOutcome::Blank);
        }

        let existing: Option<String> =
            sqlx::query_scalar("SELECT id FROM condominios WHERE nome = $1")
                .bind(nome)
                .fetch_optional(&mut **tx)
                .await?;
        if existing.is_some() {
            return Ok(RowOutcome::Skipped(nome.to_string()));
        }

        sqlx::query("INSERT INTO condominios (id, nome, created_at) VALUES ($1, $2, NOW())")
            .bind(Uuid::new_v4().to_string())
            .bind(nome)
            .execute(&mut **tx)
            .await?;
        Ok(RowOutcome::Inserted)
    }

    fn summary(&self, tally: &Tally) -> String {
        format!(
            "{} condomínios importados com sucesso. {} ignorados por já existirem.",
            tally.imported, tally.skipped
        )
    }
}
