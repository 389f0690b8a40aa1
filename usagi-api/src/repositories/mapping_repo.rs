use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{types::Json, PgPool};

use super::repo_error::RepositoryError;
use crate::domain::models::{
    Concept, ConceptId, FilterOptions, MappingResult, SavedVocabulary, ScoredMatch, SourceCode,
    StandardConcept, UserId,
};

/// Persistence boundary for source codes, mapping results and vocabularies.
///
/// Different owners never share rows, so concurrent jobs of different users
/// need no coordination here.
#[async_trait]
pub trait MappingRepository: Send + Sync {
    /// Drop the owner's previous batch (source codes and results).
    async fn clear_mapping_session(&self, owner: UserId) -> Result<(), RepositoryError>;
    async fn save_source_codes(
        &self,
        owner: UserId,
        codes: &[SourceCode],
    ) -> Result<(), RepositoryError>;
    async fn load_source_codes(&self, owner: UserId) -> Result<Vec<SourceCode>, RepositoryError>;
    /// Insert or replace the result for one source code.
    async fn save_mapping_result(
        &self,
        owner: UserId,
        result: &MappingResult,
    ) -> Result<(), RepositoryError>;
    /// Results in the order they were first saved.
    async fn load_saved_mapping_results(
        &self,
        owner: UserId,
    ) -> Result<Vec<MappingResult>, RepositoryError>;
    /// Number of concepts in a vocabulary; `NotFound` when it has none.
    async fn count_vocabulary_concepts(
        &self,
        vocabulary_id: &str,
    ) -> Result<usize, RepositoryError>;
    /// At most `limit` concepts of a vocabulary with an id above `after`,
    /// ordered by concept id.
    async fn load_vocabulary_concepts(
        &self,
        vocabulary_id: &str,
        after: Option<ConceptId>,
        limit: usize,
    ) -> Result<Vec<Concept>, RepositoryError>;
    async fn save_vocabulary(
        &self,
        owner: UserId,
        vocabulary: &SavedVocabulary,
    ) -> Result<(), RepositoryError>;
    async fn load_vocabulary(
        &self,
        owner: UserId,
        name: &str,
    ) -> Result<SavedVocabulary, RepositoryError>;
    async fn load_filter_options(&self) -> Result<FilterOptions, RepositoryError>;
}

pub struct MappingRepositoryImpl {
    pool: PgPool,
}

impl MappingRepositoryImpl {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SourceCodeRow {
    id: i64,
    source_code: String,
    source_name: String,
    source_frequency: i64,
    additional_info: Json<BTreeMap<String, String>>,
}

impl From<SourceCodeRow> for SourceCode {
    fn from(row: SourceCodeRow) -> Self {
        Self {
            id: row.id,
            source_code: row.source_code,
            source_name: row.source_name,
            source_frequency: row.source_frequency,
            additional_info: row.additional_info.0,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MappingResultRow {
    source_code_id: i64,
    chosen_concept_id: Option<i64>,
    candidates: Json<Vec<ScoredMatch>>,
    auto_assigned: bool,
    failure: Option<String>,
}

impl From<MappingResultRow> for MappingResult {
    fn from(row: MappingResultRow) -> Self {
        Self {
            source_code_id: row.source_code_id,
            chosen_concept_id: row.chosen_concept_id.map(ConceptId::new),
            candidates: row.candidates.0,
            auto_assigned: row.auto_assigned,
            failure: row.failure,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ConceptRow {
    concept_id: i64,
    concept_name: String,
    concept_code: String,
    domain_id: String,
    vocabulary_id: String,
    concept_class_id: String,
    standard_concept: Option<String>,
    invalid_reason: Option<String>,
}

impl From<ConceptRow> for Concept {
    fn from(row: ConceptRow) -> Self {
        Self {
            concept_id: ConceptId::new(row.concept_id),
            concept_name: row.concept_name,
            concept_code: row.concept_code,
            domain_id: row.domain_id,
            vocabulary_id: row.vocabulary_id,
            concept_class_id: row.concept_class_id,
            standard_concept: StandardConcept::from_flag(row.standard_concept.as_deref()),
            invalid_reason: row.invalid_reason,
        }
    }
}

#[async_trait]
impl MappingRepository for MappingRepositoryImpl {
    async fn clear_mapping_session(&self, owner: UserId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM mapping_results WHERE owner_id = $1")
            .bind(owner.as_i32())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM source_codes WHERE owner_id = $1")
            .bind(owner.as_i32())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn save_source_codes(
        &self,
        owner: UserId,
        codes: &[SourceCode],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for code in codes {
            sqlx::query(
                r#"
                INSERT INTO source_codes (owner_id, id, source_code, source_name, source_frequency, additional_info)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (owner_id, id) DO UPDATE
                SET source_code = EXCLUDED.source_code,
                    source_name = EXCLUDED.source_name,
                    source_frequency = EXCLUDED.source_frequency,
                    additional_info = EXCLUDED.additional_info
                "#,
            )
            .bind(owner.as_i32())
            .bind(code.id)
            .bind(&code.source_code)
            .bind(&code.source_name)
            .bind(code.source_frequency)
            .bind(Json(&code.additional_info))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_source_codes(&self, owner: UserId) -> Result<Vec<SourceCode>, RepositoryError> {
        let rows = sqlx::query_as::<_, SourceCodeRow>(
            r#"
            SELECT id, source_code, source_name, source_frequency, additional_info
            FROM source_codes
            WHERE owner_id = $1
            ORDER BY id
            "#,
        )
        .bind(owner.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SourceCode::from).collect())
    }

    async fn save_mapping_result(
        &self,
        owner: UserId,
        result: &MappingResult,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO mapping_results (owner_id, source_code_id, chosen_concept_id, candidates, auto_assigned, failure)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (owner_id, source_code_id) DO UPDATE
            SET chosen_concept_id = EXCLUDED.chosen_concept_id,
                candidates = EXCLUDED.candidates,
                auto_assigned = EXCLUDED.auto_assigned,
                failure = EXCLUDED.failure
            "#,
        )
        .bind(owner.as_i32())
        .bind(result.source_code_id)
        .bind(result.chosen_concept_id.map(|id| id.as_i64()))
        .bind(Json(&result.candidates))
        .bind(result.auto_assigned)
        .bind(result.failure.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_saved_mapping_results(
        &self,
        owner: UserId,
    ) -> Result<Vec<MappingResult>, RepositoryError> {
        let rows = sqlx::query_as::<_, MappingResultRow>(
            r#"
            SELECT source_code_id, chosen_concept_id, candidates, auto_assigned, failure
            FROM mapping_results
            WHERE owner_id = $1
            ORDER BY seq
            "#,
        )
        .bind(owner.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MappingResult::from).collect())
    }

    async fn count_vocabulary_concepts(
        &self,
        vocabulary_id: &str,
    ) -> Result<usize, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM concept WHERE vocabulary_id = $1",
        )
        .bind(vocabulary_id)
        .fetch_one(&self.pool)
        .await?;

        if count == 0 {
            return Err(RepositoryError::NotFound(format!(
                "vocabulary '{}'",
                vocabulary_id
            )));
        }

        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn load_vocabulary_concepts(
        &self,
        vocabulary_id: &str,
        after: Option<ConceptId>,
        limit: usize,
    ) -> Result<Vec<Concept>, RepositoryError> {
        // The CDM declares concept_id as INTEGER; widen it so ConceptId stays i64.
        let rows = sqlx::query_as::<_, ConceptRow>(
            r#"
            SELECT concept_id::BIGINT AS concept_id, concept_name, concept_code, domain_id,
                   vocabulary_id, concept_class_id, standard_concept, invalid_reason
            FROM concept
            WHERE vocabulary_id = $1
              AND ($2::BIGINT IS NULL OR concept.concept_id > $2)
            ORDER BY concept.concept_id
            LIMIT $3
            "#,
        )
        .bind(vocabulary_id)
        .bind(after.map(|id| id.as_i64()))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Concept::from).collect())
    }

    async fn save_vocabulary(
        &self,
        owner: UserId,
        vocabulary: &SavedVocabulary,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO saved_vocabularies (owner_id, name, payload)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id, name) DO UPDATE
            SET payload = EXCLUDED.payload, updated_at = now()
            "#,
        )
        .bind(owner.as_i32())
        .bind(&vocabulary.name)
        .bind(Json(vocabulary))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_vocabulary(
        &self,
        owner: UserId,
        name: &str,
    ) -> Result<SavedVocabulary, RepositoryError> {
        let payload = sqlx::query_scalar::<_, Json<SavedVocabulary>>(
            "SELECT payload FROM saved_vocabularies WHERE owner_id = $1 AND name = $2",
        )
        .bind(owner.as_i32())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        payload
            .map(|Json(vocabulary)| vocabulary)
            .ok_or_else(|| RepositoryError::NotFound(format!("saved vocabulary '{}'", name)))
    }

    async fn load_filter_options(&self) -> Result<FilterOptions, RepositoryError> {
        let domain_ids = distinct(&self.pool, "SELECT DISTINCT domain_id FROM concept ORDER BY 1").await?;
        let vocabulary_ids =
            distinct(&self.pool, "SELECT DISTINCT vocabulary_id FROM concept ORDER BY 1").await?;
        let concept_class_ids =
            distinct(&self.pool, "SELECT DISTINCT concept_class_id FROM concept ORDER BY 1")
                .await?;

        Ok(FilterOptions {
            domain_ids,
            vocabulary_ids,
            concept_class_ids,
        })
    }
}

async fn distinct(pool: &PgPool, sql: &'static str) -> Result<Vec<String>, RepositoryError> {
    let values = sqlx::query_scalar::<_, String>(sql).fetch_all(pool).await?;
    Ok(values)
}
