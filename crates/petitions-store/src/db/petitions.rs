//! Petition persistence operations.
//!
//! `update` runs in a transaction: the row is locked with
//! `SELECT … FOR UPDATE`, the operation runs on the decoded petition, and
//! the result is written back with one `UPDATE` unless nothing changed. If
//! the rejection changed it is upserted (or deleted) in the same
//! transaction. `anonymize` also scrubs the signatures inside that
//! transaction. Any error drops the transaction, which rolls it back.
//!
//! Candidate queries over-approximate deadlines in SQL; the lifecycle
//! operation decides exactly.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::query::Query;
use sqlx::{PgConnection, Postgres};
use uuid::Uuid;

use petitions_core::{ModeratorId, PetitionId, SiteSettings, Timestamp};
use petitions_state::{
    CreatorContact, Petition, PetitionError, PetitionTransitionRecord, Rejection, RejectionCode,
};

use crate::error::StoreError;
use crate::store::PetitionStore;

/// PostgreSQL-backed petition store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const SELECT_PETITION: &str = "SELECT p.*, r.code AS rejection_code, r.details AS rejection_details
     FROM petitions p LEFT JOIN rejections r ON r.petition_id = p.id
     WHERE p.id = $1";

const INSERT_PETITION: &str = "INSERT INTO petitions (
        id, action, background, creator, state, signature_count, last_signed_at,
        open_at, closed_at, stopped_at, rejected_at, removed_at, anonymized_at,
        moderation_threshold_reached_at, response_threshold_reached_at,
        debate_threshold_reached_at, response_state, government_response_at,
        debate_state, scheduled_debate_date, debate_outcome_at, deadline_extension,
        do_not_anonymize, locked_by, locked_at, transitions, created_at, updated_at
     ) VALUES (
        $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
        $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28
     )";

const UPDATE_PETITION: &str = "UPDATE petitions SET
        action = $2, background = $3, creator = $4, state = $5, signature_count = $6,
        last_signed_at = $7, open_at = $8, closed_at = $9, stopped_at = $10,
        rejected_at = $11, removed_at = $12, anonymized_at = $13,
        moderation_threshold_reached_at = $14, response_threshold_reached_at = $15,
        debate_threshold_reached_at = $16, response_state = $17,
        government_response_at = $18, debate_state = $19, scheduled_debate_date = $20,
        debate_outcome_at = $21, deadline_extension = $22, do_not_anonymize = $23,
        locked_by = $24, locked_at = $25, transitions = $26, created_at = $27,
        updated_at = $28
     WHERE id = $1";

/// Column values of one petition row, converted for binding.
struct PetitionColumns {
    id: Uuid,
    action: String,
    background: String,
    creator: Option<serde_json::Value>,
    state: &'static str,
    signature_count: i64,
    last_signed_at: Option<DateTime<Utc>>,
    open_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    removed_at: Option<DateTime<Utc>>,
    anonymized_at: Option<DateTime<Utc>>,
    moderation_threshold_reached_at: Option<DateTime<Utc>>,
    response_threshold_reached_at: Option<DateTime<Utc>>,
    debate_threshold_reached_at: Option<DateTime<Utc>>,
    response_state: &'static str,
    government_response_at: Option<DateTime<Utc>>,
    debate_state: &'static str,
    scheduled_debate_date: Option<NaiveDate>,
    debate_outcome_at: Option<DateTime<Utc>>,
    deadline_extension: i64,
    do_not_anonymize: bool,
    locked_by: Option<Uuid>,
    locked_at: Option<DateTime<Utc>>,
    transitions: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn utc(t: Option<Timestamp>) -> Option<DateTime<Utc>> {
    t.map(|t| *t.as_datetime())
}

impl PetitionColumns {
    fn from_petition(p: &Petition) -> Result<Self, StoreError> {
        Ok(Self {
            id: *p.id.as_uuid(),
            action: p.action.clone(),
            background: p.background.clone(),
            creator: p.creator.as_ref().map(serde_json::to_value).transpose()?,
            state: p.state.as_str(),
            signature_count: i64::from(p.signature_count),
            last_signed_at: utc(p.last_signed_at),
            open_at: utc(p.open_at),
            closed_at: utc(p.closed_at),
            stopped_at: utc(p.stopped_at),
            rejected_at: utc(p.rejected_at),
            removed_at: utc(p.removed_at),
            anonymized_at: utc(p.anonymized_at),
            moderation_threshold_reached_at: utc(p.moderation_threshold_reached_at),
            response_threshold_reached_at: utc(p.response_threshold_reached_at),
            debate_threshold_reached_at: utc(p.debate_threshold_reached_at),
            response_state: p.response_state.as_str(),
            government_response_at: utc(p.government_response_at),
            debate_state: p.debate_state.as_str(),
            scheduled_debate_date: p.scheduled_debate_date,
            debate_outcome_at: utc(p.debate_outcome_at),
            deadline_extension: i64::from(p.deadline_extension),
            do_not_anonymize: p.do_not_anonymize,
            locked_by: p.locked_by.map(|m| *m.as_uuid()),
            locked_at: utc(p.locked_at),
            transitions: serde_json::to_value(&p.transitions)?,
            created_at: *p.created_at.as_datetime(),
            updated_at: *p.updated_at.as_datetime(),
        })
    }

    /// Bind `$1..$28` in column order.
    fn bind<'q>(&'q self, query: Query<'q, Postgres, PgArguments>) -> Query<'q, Postgres, PgArguments> {
        query
            .bind(self.id)
            .bind(&self.action)
            .bind(&self.background)
            .bind(&self.creator)
            .bind(self.state)
            .bind(self.signature_count)
            .bind(self.last_signed_at)
            .bind(self.open_at)
            .bind(self.closed_at)
            .bind(self.stopped_at)
            .bind(self.rejected_at)
            .bind(self.removed_at)
            .bind(self.anonymized_at)
            .bind(self.moderation_threshold_reached_at)
            .bind(self.response_threshold_reached_at)
            .bind(self.debate_threshold_reached_at)
            .bind(self.response_state)
            .bind(self.government_response_at)
            .bind(self.debate_state)
            .bind(self.scheduled_debate_date)
            .bind(self.debate_outcome_at)
            .bind(self.deadline_extension)
            .bind(self.do_not_anonymize)
            .bind(self.locked_by)
            .bind(self.locked_at)
            .bind(&self.transitions)
            .bind(self.created_at)
            .bind(self.updated_at)
    }
}

/// Write the rejection row to match `rejection`.
async fn sync_rejection(
    conn: &mut PgConnection,
    id: Uuid,
    rejection: Option<&Rejection>,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    match rejection {
        Some(rejection) => {
            sqlx::query(
                "INSERT INTO rejections (petition_id, code, details, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $4)
                 ON CONFLICT (petition_id) DO UPDATE
                 SET code = EXCLUDED.code, details = EXCLUDED.details,
                     updated_at = EXCLUDED.updated_at",
            )
            .bind(id)
            .bind(rejection.code.as_str())
            .bind(&rejection.details)
            .bind(now)
            .execute(conn)
            .await?;
        }
        None => {
            sqlx::query("DELETE FROM rejections WHERE petition_id = $1")
                .bind(id)
                .execute(conn)
                .await?;
        }
    }
    Ok(())
}

/// Lock one petition row for the rest of the transaction.
async fn lock_petition(conn: &mut PgConnection, id: PetitionId) -> Result<Petition, StoreError> {
    let locked = format!("{SELECT_PETITION} FOR UPDATE OF p");
    sqlx::query_as::<_, PetitionRow>(&locked)
        .bind(*id.as_uuid())
        .fetch_optional(conn)
        .await?
        .ok_or(StoreError::NotFound(id))?
        .into_petition()
}

/// Write `petition` over the locked row if it differs from `previous`.
async fn write_petition(
    conn: &mut PgConnection,
    petition: &Petition,
    previous: &Petition,
) -> Result<(), StoreError> {
    if petition == previous {
        return Ok(());
    }
    let columns = PetitionColumns::from_petition(petition)?;
    columns.bind(sqlx::query(UPDATE_PETITION)).execute(&mut *conn).await?;
    if petition.rejection != previous.rejection {
        sync_rejection(conn, columns.id, petition.rejection.as_ref(), columns.updated_at).await?;
    }
    Ok(())
}

/// Null the personal details of every signature not yet scrubbed.
async fn scrub_signatures(
    conn: &mut PgConnection,
    id: PetitionId,
    now: Timestamp,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE signatures
         SET name = NULL, email = NULL, postcode = NULL, anonymized_at = $2
         WHERE petition_id = $1 AND anonymized_at IS NULL",
    )
    .bind(*id.as_uuid())
    .bind(*now.as_datetime())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

fn bind_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn months(settings: &SiteSettings) -> i32 {
    i32::try_from(settings.petition_duration_months).unwrap_or(i32::MAX)
}

fn ids(rows: Vec<(Uuid,)>) -> Vec<PetitionId> {
    rows.into_iter().map(|(id,)| PetitionId(id)).collect()
}

impl PetitionStore for PgStore {
    async fn insert(&self, petition: &Petition) -> Result<(), StoreError> {
        let columns = PetitionColumns::from_petition(petition)?;
        let mut tx = self.pool.begin().await?;
        columns.bind(sqlx::query(INSERT_PETITION)).execute(&mut *tx).await?;
        if let Some(rejection) = &petition.rejection {
            sync_rejection(&mut *tx, columns.id, Some(rejection), columns.updated_at).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: PetitionId) -> Result<Option<Petition>, StoreError> {
        let row = sqlx::query_as::<_, PetitionRow>(SELECT_PETITION)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(PetitionRow::into_petition).transpose()
    }

    async fn update<T, F>(&self, id: PetitionId, operation: F) -> Result<(Petition, T), StoreError>
    where
        T: Send,
        F: FnOnce(&mut Petition) -> Result<T, PetitionError> + Send,
    {
        let mut tx = self.pool.begin().await?;
        let previous = lock_petition(&mut *tx, id).await?;
        let mut petition = previous.clone();

        let output = operation(&mut petition)?;

        write_petition(&mut *tx, &petition, &previous).await?;
        tx.commit().await?;

        Ok((petition, output))
    }

    async fn petitions_in_need_of_closing(
        &self,
        settings: &SiteSettings,
        now: Timestamp,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM petitions
             WHERE state = 'open'
               AND (closed_at <= $2
                    OR (closed_at IS NULL AND open_at IS NOT NULL
                        AND open_at + make_interval(months => $1, days => deadline_extension::int) <= $2))
             ORDER BY open_at, id
             LIMIT $3",
        )
        .bind(months(settings))
        .bind(*now.as_datetime())
        .bind(bind_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids(rows))
    }

    async fn petitions_in_need_of_marking_as_debated(
        &self,
        today: NaiveDate,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM petitions
             WHERE state IN ('open', 'closed')
               AND debate_state = 'scheduled'
               AND scheduled_debate_date <= $1
             ORDER BY scheduled_debate_date, id
             LIMIT $2",
        )
        .bind(today)
        .bind(bind_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids(rows))
    }

    async fn petitions_in_need_of_anonymizing(
        &self,
        cutoff: Timestamp,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM petitions
             WHERE anonymized_at IS NULL
               AND NOT do_not_anonymize
               AND ((state = 'closed' AND closed_at <= $1)
                    OR (state IN ('rejected', 'hidden') AND rejected_at <= $1)
                    OR (state = 'stopped' AND stopped_at <= $1)
                    OR (state = 'removed' AND removed_at <= $1))
             ORDER BY updated_at, id
             LIMIT $2",
        )
        .bind(*cutoff.as_datetime())
        .bind(bind_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids(rows))
    }

    async fn petitions_closing_after(
        &self,
        settings: &SiteSettings,
        dissolution_at: Timestamp,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM petitions
             WHERE state = 'open'
               AND open_at <= $2
               AND (closed_at > $2
                    OR (closed_at IS NULL AND open_at IS NOT NULL
                        AND open_at + make_interval(months => $1, days => deadline_extension::int + 1) > $2))
             ORDER BY open_at, id
             LIMIT $3",
        )
        .bind(months(settings))
        .bind(*dissolution_at.as_datetime())
        .bind(bind_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids(rows))
    }

    async fn petitions_awaiting_moderation(
        &self,
        created_by: Timestamp,
        limit: usize,
    ) -> Result<Vec<PetitionId>, StoreError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM petitions
             WHERE state IN ('pending', 'validated', 'sponsored', 'flagged', 'dormant')
               AND created_at <= $1
             ORDER BY created_at, id
             LIMIT $2",
        )
        .bind(*created_by.as_datetime())
        .bind(bind_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids(rows))
    }

    async fn anonymize(
        &self,
        id: PetitionId,
        now: Timestamp,
    ) -> Result<(Petition, Option<u64>), StoreError> {
        let mut tx = self.pool.begin().await?;
        let previous = lock_petition(&mut *tx, id).await?;
        let mut petition = previous.clone();
        if !petition.anonymize(now)? {
            return Ok((petition, None));
        }

        write_petition(&mut *tx, &petition, &previous).await?;
        let scrubbed = scrub_signatures(&mut *tx, id, now).await?;
        tx.commit().await?;

        Ok((petition, Some(scrubbed)))
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct PetitionRow {
    id: Uuid,
    action: String,
    background: String,
    creator: Option<serde_json::Value>,
    state: String,
    signature_count: i64,
    last_signed_at: Option<DateTime<Utc>>,
    open_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
    rejected_at: Option<DateTime<Utc>>,
    removed_at: Option<DateTime<Utc>>,
    anonymized_at: Option<DateTime<Utc>>,
    moderation_threshold_reached_at: Option<DateTime<Utc>>,
    response_threshold_reached_at: Option<DateTime<Utc>>,
    debate_threshold_reached_at: Option<DateTime<Utc>>,
    response_state: String,
    government_response_at: Option<DateTime<Utc>>,
    debate_state: String,
    scheduled_debate_date: Option<NaiveDate>,
    debate_outcome_at: Option<DateTime<Utc>>,
    deadline_extension: i64,
    do_not_anonymize: bool,
    locked_by: Option<Uuid>,
    locked_at: Option<DateTime<Utc>>,
    transitions: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    rejection_code: Option<String>,
    rejection_details: Option<String>,
}

impl PetitionRow {
    fn into_petition(self) -> Result<Petition, StoreError> {
        let id = self.id;
        let corrupt = |reason: String| {
            tracing::warn!(%id, %reason, "failed to map petition row");
            StoreError::Corrupt { id, reason }
        };

        let state = self
            .state
            .parse()
            .map_err(|e: PetitionError| corrupt(e.to_string()))?;
        let response_state = self
            .response_state
            .parse()
            .map_err(|e: PetitionError| corrupt(e.to_string()))?;
        let debate_state = self
            .debate_state
            .parse()
            .map_err(|e: PetitionError| corrupt(e.to_string()))?;
        let signature_count = u32::try_from(self.signature_count)
            .map_err(|_| corrupt(format!("signature_count {} out of range", self.signature_count)))?;
        let deadline_extension = u32::try_from(self.deadline_extension).map_err(|_| {
            corrupt(format!(
                "deadline_extension {} out of range",
                self.deadline_extension
            ))
        })?;
        let creator: Option<CreatorContact> = self
            .creator
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| corrupt(format!("creator: {e}")))?;
        let transitions: Vec<PetitionTransitionRecord> =
            serde_json::from_value(self.transitions)
                .map_err(|e| corrupt(format!("transitions: {e}")))?;
        let rejection = match self.rejection_code {
            Some(code) => Some(Rejection {
                code: code
                    .parse::<RejectionCode>()
                    .map_err(|e| corrupt(e.to_string()))?,
                details: self.rejection_details,
            }),
            None => None,
        };

        let ts = |t: Option<DateTime<Utc>>| t.map(Timestamp::from_utc);

        Ok(Petition {
            id: PetitionId(id),
            action: self.action,
            background: self.background,
            creator,
            state,
            signature_count,
            last_signed_at: ts(self.last_signed_at),
            open_at: ts(self.open_at),
            closed_at: ts(self.closed_at),
            stopped_at: ts(self.stopped_at),
            rejected_at: ts(self.rejected_at),
            removed_at: ts(self.removed_at),
            anonymized_at: ts(self.anonymized_at),
            moderation_threshold_reached_at: ts(self.moderation_threshold_reached_at),
            response_threshold_reached_at: ts(self.response_threshold_reached_at),
            debate_threshold_reached_at: ts(self.debate_threshold_reached_at),
            response_state,
            government_response_at: ts(self.government_response_at),
            debate_state,
            scheduled_debate_date: self.scheduled_debate_date,
            debate_outcome_at: ts(self.debate_outcome_at),
            deadline_extension,
            do_not_anonymize: self.do_not_anonymize,
            locked_by: self.locked_by.map(ModeratorId),
            locked_at: ts(self.locked_at),
            rejection,
            created_at: Timestamp::from_utc(self.created_at),
            updated_at: Timestamp::from_utc(self.updated_at),
            transitions,
        })
    }
}
