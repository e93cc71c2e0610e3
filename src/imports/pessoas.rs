//! Multi-column import of person records with optional links to a
//! condominium and to article codes.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::crypto::{CryptoError, FieldCipher};

use super::{split_csv_row, strip_outer_quotes, ImportError, ImportProtocol, RowOutcome, Tally};

/// Loads `pessoas` from a CSV with a flexible column layout.
///
/// Only `nome` is mandatory in the header; every other recognized column is
/// optional and may appear in any order. `rg` is the dedup key when present.
/// `condominio_nome` and `artigos_numeros` are resolved by name or number to
/// existing records, and failures to resolve are per-row errors rather than
/// file-level ones. Sensitive fields are sealed before they reach storage.
pub struct PessoaImport {
    cipher: FieldCipher,
}

impl PessoaImport {
    pub fn new(cipher: FieldCipher) -> Self {
        Self { cipher }
    }

    fn seal_optional(&self, value: &str) -> Result<Option<String>, CryptoError> {
        if value.is_empty() {
            Ok(None)
        } else {
            Ok(Some(self.cipher.encrypt(value)?))
        }
    }
}

/// A data row keyed by the header layout, with unrecognized columns dropped.
#[derive(Debug, Default, PartialEq, Eq)]
struct PessoaRow {
    nome: String,
    rg: String,
    cpf: String,
    data_nascimento: String,
    nome_mae: String,
    nome_pai: String,
    observacao: String,
    residencial: String,
    condominio_nome: String,
    data_vinculo_condominio: String,
    artigos_numeros: String,
}

/// Parse one data line against the header layout. Returns the message for
/// the caller's error list when the row is unusable.
fn parse_row(headers: &[String], line: &str, line_number: usize) -> Result<PessoaRow, String> {
    let values = split_csv_row(line);
    if values.len() < headers.len() {
        return Err(format!(
            "Linha {}: Número incorreto de colunas. Esperado {}, encontrado {}.",
            line_number,
            headers.len(),
            values.len()
        ));
    }

    let mut row = PessoaRow::default();
    for (i, header) in headers.iter().enumerate() {
        let value = values
            .get(i)
            .map(|v| strip_outer_quotes(v).trim())
            .unwrap_or("");
        match header.as_str() {
            "nome" => row.nome = value.to_string(),
            "rg" => row.rg = value.to_string(),
            "cpf" => row.cpf = value.to_string(),
            "data_nascimento" => row.data_nascimento = value.to_string(),
            "nome_mae" => row.nome_mae = value.to_string(),
            "nome_pai" => row.nome_pai = value.to_string(),
            "observacao" => row.observacao = value.to_string(),
            "residencial" => row.residencial = value.to_string(),
            "condominio_nome" => row.condominio_nome = value.to_string(),
            "data_vinculo_condominio" => row.data_vinculo_condominio = value.to_string(),
            "artigos_numeros" => row.artigos_numeros = value.to_string(),
            _ => {}
        }
    }

    if row.nome.is_empty() {
        return Err(format!(
            "Linha {line_number}: A coluna 'nome' é obrigatória."
        ));
    }
    Ok(row)
}

/// Article numbers accept both comma and semicolon separators.
fn article_numbers(raw: &str) -> Vec<&str> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .collect()
}

#[async_trait]
impl ImportProtocol for PessoaImport {
    type Header = Vec<String>;

    fn name(&self) -> &'static str {
        "pessoas"
    }

    fn parse_header(&self, lines: &[String]) -> Result<Vec<String>, ImportError> {
        if lines.len() < 2 {
            return Err(ImportError::Invalid(
                "O arquivo CSV precisa ter um cabeçalho e pelo menos uma linha de dados."
                    .to_string(),
            ));
        }
        let header_line = lines[0].to_lowercase();
        let headers: Vec<String> = header_line
            .split(',')
            .map(|h| h.replace('"', "").trim().to_string())
            .collect();
        if !headers.iter().any(|h| h == "nome") {
            return Err(ImportError::Invalid(
                "Cabeçalho do CSV inválido. Colunas obrigatórias faltando: nome.".to_string(),
            ));
        }
        Ok(headers)
    }

    async fn reconcile_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        headers: &Vec<String>,
        line_number: usize,
        line: &str,
    ) -> Result<RowOutcome, ImportError> {
        let row = match parse_row(headers, line, line_number) {
            Ok(row) => row,
            Err(message) => return Ok(RowOutcome::Errored(message)),
        };

        // Dedup on RG, but only when the row carries one.
        if !row.rg.is_empty() {
            let existing: Option<String> =
                sqlx::query_scalar("SELECT id FROM pessoas WHERE rg = $1")
                    .bind(&row.rg)
                    .fetch_optional(&mut **tx)
                    .await?;
            if existing.is_some() {
                return Ok(RowOutcome::Skipped(format!("{} (RG: {})", row.nome, row.rg)));
            }
        }

        let condominio_id: Option<String> = if row.condominio_nome.is_empty() {
            None
        } else {
            let found: Option<String> =
                sqlx::query_scalar("SELECT id FROM condominios WHERE nome = $1")
                    .bind(&row.condominio_nome)
                    .fetch_optional(&mut **tx)
                    .await?;
            match found {
                Some(id) => Some(id),
                None => {
                    return Ok(RowOutcome::Errored(format!(
                        "Linha {}: Condomínio '{}' não encontrado.",
                        line_number, row.condominio_nome
                    )))
                }
            }
        };

        let mut artigo_ids = Vec::new();
        for numero in article_numbers(&row.artigos_numeros) {
            let found: Option<String> =
                sqlx::query_scalar("SELECT id FROM artigos WHERE numero = $1")
                    .bind(numero)
                    .fetch_optional(&mut **tx)
                    .await?;
            match found {
                Some(id) => artigo_ids.push(id),
                None => {
                    return Ok(RowOutcome::Errored(format!(
                        "Linha {line_number}: Artigo número '{numero}' não encontrado."
                    )))
                }
            }
        }

        let pessoa_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO pessoas \
             (id, nome, rg, cpf, data_nascimento, nome_mae, nome_pai, observacao, residencial, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())",
        )
        .bind(&pessoa_id)
        .bind(self.cipher.encrypt(&row.nome)?)
        .bind(non_empty(&row.rg))
        .bind(self.seal_optional(&row.cpf)?)
        .bind(non_empty(&row.data_nascimento))
        .bind(self.seal_optional(&row.nome_mae)?)
        .bind(self.seal_optional(&row.nome_pai)?)
        .bind(self.seal_optional(&row.observacao)?)
        .bind(non_empty(&row.residencial))
        .execute(&mut **tx)
        .await?;

        if let Some(condominio_id) = condominio_id {
            sqlx::query(
                "INSERT INTO pessoas_condominios \
                 (id, pessoa_id, condominio_id, data_vinculo, created_at, updated_at) \
                 VALUES ($1, $2, $3, COALESCE($4::timestamptz, NOW()), NOW(), NOW())",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&pessoa_id)
            .bind(condominio_id)
            .bind(non_empty(&row.data_vinculo_condominio))
            .execute(&mut **tx)
            .await?;
        }

        for artigo_id in artigo_ids {
            sqlx::query(
                "INSERT INTO pessoas_artigos (id, pessoa_id, artigo_id, created_at) \
                 VALUES ($1, $2, $3, NOW())",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&pessoa_id)
            .bind(artigo_id)
            .execute(&mut **tx)
            .await?;
        }

        Ok(RowOutcome::Inserted)
    }

    fn summary(&self, tally: &Tally) -> String {
        let mut message = format!("{} pessoas importadas com sucesso.", tally.imported);
        if tally.skipped > 0 {
            message.push_str(&format!(
                " {} ignoradas por já existirem (RG duplicado).",
                tally.skipped
            ));
        }
        if tally.errors > 0 {
            message.push_str(&format!(" {} linhas com erros.", tally.errors));
        }
        message
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn importer() -> PessoaImport {
        PessoaImport::new(FieldCipher::new(&[7u8; 32]))
    }

    fn headers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn header_requires_at_least_one_data_line() {
        let err = importer()
            .parse_header(&["nome,rg".to_string()])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "O arquivo CSV precisa ter um cabeçalho e pelo menos uma linha de dados."
        );
    }

    #[test]
    fn header_requires_nome_column() {
        let lines = vec!["rg,cpf".to_string(), "123,456".to_string()];
        let err = importer().parse_header(&lines).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cabeçalho do CSV inválido. Colunas obrigatórias faltando: nome."
        );
    }

    #[test]
    fn header_is_normalized_and_order_free() {
        let lines = vec!["\"RG\", Nome ,CPF".to_string(), "1,Maria,2".to_string()];
        let parsed = importer().parse_header(&lines).unwrap();
        assert_eq!(parsed, vec!["rg", "nome", "cpf"]);
    }

    #[test]
    fn parse_row_maps_values_by_header_position() {
        let row = parse_row(
            &headers(&["rg", "nome", "condominio_nome"]),
            "12345,\"Silva, Maria\",Residencial Sul",
            2,
        )
        .unwrap();
        assert_eq!(row.rg, "12345");
        assert_eq!(row.nome, "Silva, Maria");
        assert_eq!(row.condominio_nome, "Residencial Sul");
        assert_eq!(row.cpf, "");
    }

    #[test]
    fn parse_row_rejects_short_rows_with_counts() {
        let err = parse_row(&headers(&["nome", "rg", "cpf"]), "Maria,12", 4).unwrap_err();
        assert_eq!(
            err,
            "Linha 4: Número incorreto de colunas. Esperado 3, encontrado 2."
        );
    }

    #[test]
    fn parse_row_tolerates_extra_values() {
        let row = parse_row(&headers(&["nome"]), "Maria,excess,more", 2).unwrap();
        assert_eq!(row.nome, "Maria");
    }

    #[test]
    fn parse_row_requires_nome_value() {
        let err = parse_row(&headers(&["nome", "rg"]), ",123", 7).unwrap_err();
        assert_eq!(err, "Linha 7: A coluna 'nome' é obrigatória.");
    }

    #[test]
    fn parse_row_ignores_unknown_headers() {
        let row = parse_row(&headers(&["apelido", "nome"]), "Zé,José", 2).unwrap();
        assert_eq!(row.nome, "José");
    }

    #[test]
    fn article_numbers_accept_both_separators() {
        assert_eq!(article_numbers("155, 157;171"), vec!["155", "157", "171"]);
        assert_eq!(article_numbers(" ; , "), Vec::<&str>::new());
        assert_eq!(article_numbers(""), Vec::<&str>::new());
    }

    #[test]
    fn summary_appends_sections_only_when_present() {
        let protocol = importer();
        assert_eq!(
            protocol.summary(&Tally {
                imported: 5,
                skipped: 0,
                errors: 0
            }),
            "5 pessoas importadas com sucesso."
        );
        assert_eq!(
            protocol.summary(&Tally {
                imported: 5,
                skipped: 2,
                errors: 1
            }),
            "5 pessoas importadas com sucesso. 2 ignoradas por já existirem (RG duplicado). \
             1 linhas com erros."
        );
    }
}
