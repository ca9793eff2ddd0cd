// Postgres-backed CampaignStore.
//
// Multi-row writes run in one transaction. Week rows are locked with
// SELECT ... FOR UPDATE and compared against the caller's version before
// they are rewritten.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use campaign_analytics::InsightSnapshot;
use campaign_common::{
    validate_week_sequence, Campaign, CampaignError, CampaignOverview, CampaignParams,
    CampaignResult, CampaignStatus, HistoryQuery, Post, RegenerationHistoryEntry,
    StrategySource, Week, WeekStatus,
};

use super::{weeks_from_plan, CampaignStore, EvolutionCommit, StrategyWrite};
use crate::evolver::{EvolutionRecord, WeekChange};

fn storage(e: sqlx::Error) -> CampaignError {
    CampaignError::Storage(e.to_string())
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct CampaignRow {
    id: Uuid,
    client_ref: String,
    name: String,
    total_weeks: i32,
    start_date: NaiveDate,
    status: String,
    params: Json<CampaignParams>,
    overview: Option<Json<CampaignOverview>>,
    strategy_source: Option<String>,
    degraded: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CampaignRow> for Campaign {
    type Error = CampaignError;

    fn try_from(row: CampaignRow) -> CampaignResult<Self> {
        let status = CampaignStatus::parse(&row.status).ok_or_else(|| {
            CampaignError::Storage(format!("unknown campaign status '{}'", row.status))
        })?;
        let strategy_source = match row.strategy_source.as_deref() {
            None => None,
            Some(s) => Some(StrategySource::parse(s).ok_or_else(|| {
                CampaignError::Storage(format!("unknown strategy source '{s}'"))
            })?),
        };
        Ok(Campaign {
            id: row.id,
            client_ref: row.client_ref,
            name: row.name,
            total_weeks: row.total_weeks as u32,
            start_date: row.start_date,
            status,
            params: row.params.0,
            overview: row.overview.map(|o| o.0),
            strategy_source,
            degraded: row.degraded,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WeekRow {
    campaign_id: Uuid,
    week_number: i32,
    theme: String,
    objectives: Json<Vec<String>>,
    key_messages: Json<Vec<String>>,
    status: String,
    performance_score: Option<f64>,
    posts: Json<Vec<Post>>,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WeekRow> for Week {
    type Error = CampaignError;

    fn try_from(row: WeekRow) -> CampaignResult<Self> {
        let status = WeekStatus::parse(&row.status).ok_or_else(|| {
            CampaignError::Storage(format!("unknown week status '{}'", row.status))
        })?;
        Ok(Week {
            campaign_id: row.campaign_id,
            week_number: row.week_number as u32,
            theme: row.theme,
            objectives: row.objectives.0,
            key_messages: row.key_messages.0,
            status,
            performance_score: row.performance_score,
            posts: row.posts.0,
            version: row.version,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    campaign_id: Uuid,
    week_number: i32,
    previous_week: Json<Week>,
    new_week: Json<Week>,
    reason: String,
    created_at: DateTime<Utc>,
}

impl From<HistoryRow> for RegenerationHistoryEntry {
    fn from(row: HistoryRow) -> Self {
        RegenerationHistoryEntry {
            id: row.id,
            campaign_id: row.campaign_id,
            week_number: row.week_number as u32,
            previous_week: row.previous_week.0,
            new_week: row.new_week.0,
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

const WEEK_COLUMNS: &str = "campaign_id, week_number, theme, objectives, key_messages, status, \
                            performance_score, posts, version, updated_at";

const HISTORY_COLUMNS: &str =
    "id, campaign_id, week_number, previous_week, new_week, reason, created_at";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct PostgresCampaignStore {
    pool: PgPool,
}

impl PostgresCampaignStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> CampaignResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(storage)?;
        info!("Connected to Postgres");
        Ok(Self::new(pool))
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> CampaignResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CampaignError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_campaign(&self, campaign_id: Uuid) -> CampaignResult<()> {
        ensure_campaign(&mut *self.pool.acquire().await.map_err(storage)?, campaign_id).await
    }
}

async fn ensure_campaign(conn: &mut PgConnection, campaign_id: Uuid) -> CampaignResult<()> {
    let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM campaigns WHERE id = $1)")
        .bind(campaign_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(storage)?;
    if exists {
        Ok(())
    } else {
        Err(CampaignError::not_found("campaign", campaign_id))
    }
}

async fn insert_campaign(conn: &mut PgConnection, campaign: &Campaign) -> CampaignResult<()> {
    sqlx::query(
        r#"
        INSERT INTO campaigns
            (id, client_ref, name, total_weeks, start_date, status, params,
             overview, strategy_source, degraded, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(campaign.id)
    .bind(&campaign.client_ref)
    .bind(&campaign.name)
    .bind(campaign.total_weeks as i32)
    .bind(campaign.start_date)
    .bind(campaign.status.as_str())
    .bind(Json(&campaign.params))
    .bind(campaign.overview.as_ref().map(Json))
    .bind(campaign.strategy_source.map(|s| s.as_str()))
    .bind(campaign.degraded)
    .bind(campaign.created_at)
    .bind(campaign.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(storage)?;
    Ok(())
}

/// Lock the week row and compare its version.
async fn check_version(conn: &mut PgConnection, week: &Week, expected: i64) -> CampaignResult<()> {
    let current = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT version FROM campaign_weeks
        WHERE campaign_id = $1 AND week_number = $2
        FOR UPDATE
        "#,
    )
    .bind(week.campaign_id)
    .bind(week.week_number as i32)
    .fetch_optional(&mut *conn)
    .await
    .map_err(storage)?;

    match current {
        None => Err(CampaignError::not_found(
            "week",
            format!("{}/{}", week.campaign_id, week.week_number),
        )),
        Some(v) if v != expected => Err(CampaignError::Conflict(format!(
            "week {} of campaign {} is at version {v}, expected {expected}",
            week.week_number, week.campaign_id
        ))),
        Some(_) => Ok(()),
    }
}

async fn insert_week(conn: &mut PgConnection, week: &Week) -> CampaignResult<()> {
    sqlx::query(
        r#"
        INSERT INTO campaign_weeks
            (campaign_id, week_number, theme, objectives, key_messages, status,
             performance_score, posts, version, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(week.campaign_id)
    .bind(week.week_number as i32)
    .bind(&week.theme)
    .bind(Json(&week.objectives))
    .bind(Json(&week.key_messages))
    .bind(week.status.as_str())
    .bind(week.performance_score)
    .bind(Json(&week.posts))
    .bind(week.version)
    .bind(week.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(storage)?;
    Ok(())
}

async fn update_week(conn: &mut PgConnection, week: &Week) -> CampaignResult<()> {
    sqlx::query(
        r#"
        UPDATE campaign_weeks
        SET theme = $3, objectives = $4, key_messages = $5, status = $6,
            performance_score = $7, posts = $8, version = $9, updated_at = $10
        WHERE campaign_id = $1 AND week_number = $2
        "#,
    )
    .bind(week.campaign_id)
    .bind(week.week_number as i32)
    .bind(&week.theme)
    .bind(Json(&week.objectives))
    .bind(Json(&week.key_messages))
    .bind(week.status.as_str())
    .bind(week.performance_score)
    .bind(Json(&week.posts))
    .bind(week.version)
    .bind(week.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(storage)?;
    Ok(())
}

async fn insert_history(conn: &mut PgConnection, entry: &RegenerationHistoryEntry) -> CampaignResult<()> {
    sqlx::query(
        r#"
        INSERT INTO regeneration_history
            (id, campaign_id, week_number, previous_week, new_week, reason, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id)
    .bind(entry.campaign_id)
    .bind(entry.week_number as i32)
    .bind(Json(&entry.previous_week))
    .bind(Json(&entry.new_week))
    .bind(&entry.reason)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await
    .map_err(storage)?;
    Ok(())
}

async fn insert_snapshot(
    conn: &mut PgConnection,
    campaign_id: Uuid,
    snapshot: &InsightSnapshot,
) -> CampaignResult<()> {
    sqlx::query(
        r#"
        INSERT INTO insight_snapshots (id, campaign_id, snapshot, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(snapshot.id())
    .bind(campaign_id)
    .bind(Json(snapshot))
    .bind(snapshot.created_at())
    .execute(&mut *conn)
    .await
    .map_err(storage)?;
    Ok(())
}

#[async_trait]
impl CampaignStore for PostgresCampaignStore {
    async fn create_campaign(&self, campaign: &Campaign) -> CampaignResult<Uuid> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        insert_campaign(&mut conn, campaign).await?;
        debug!(campaign_id = %campaign.id, "Campaign created");
        Ok(campaign.id)
    }

    async fn get_campaign(&self, campaign_id: Uuid) -> CampaignResult<Campaign> {
        let row = sqlx::query_as::<_, CampaignRow>(
            r#"
            SELECT id, client_ref, name, total_weeks, start_date, status, params,
                   overview, strategy_source, degraded, created_at, updated_at
            FROM campaigns
            WHERE id = $1
            "#,
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?
        .ok_or_else(|| CampaignError::not_found("campaign", campaign_id))?;

        row.try_into()
    }

    async fn update_campaign_status(
        &self,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> CampaignResult<()> {
        let result = sqlx::query("UPDATE campaigns SET status = $2, updated_at = now() WHERE id = $1")
            .bind(campaign_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(CampaignError::not_found("campaign", campaign_id));
        }
        Ok(())
    }

    async fn write_strategy(
        &self,
        campaign: &Campaign,
        strategy: &StrategyWrite,
    ) -> CampaignResult<()> {
        let campaign_id = campaign.id;
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let stored_weeks = sqlx::query_scalar::<_, i32>(
            "SELECT total_weeks FROM campaigns WHERE id = $1 FOR UPDATE",
        )
        .bind(campaign_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?;
        let total_weeks = match stored_weeks {
            Some(n) => n,
            None => {
                insert_campaign(&mut tx, campaign).await?;
                campaign.total_weeks as i32
            }
        };

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM campaign_weeks WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;
        if existing > 0 {
            return Err(CampaignError::Conflict(format!(
                "campaign {campaign_id} already has a strategy"
            )));
        }
        validate_week_sequence(
            strategy.weeks.iter().map(|w| w.week_number),
            total_weeks as u32,
        )?;

        let now = Utc::now();
        for week in weeks_from_plan(campaign_id, &strategy.weeks, now) {
            insert_week(&mut tx, &week).await?;
        }

        sqlx::query(
            r#"
            UPDATE campaigns
            SET overview = $2, strategy_source = $3, degraded = $4, status = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(campaign_id)
        .bind(Json(&strategy.overview))
        .bind(strategy.source.as_str())
        .bind(strategy.source.is_degraded())
        .bind(CampaignStatus::Active.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        info!(
            campaign_id = %campaign_id,
            weeks = strategy.weeks.len(),
            source = strategy.source.as_str(),
            "Strategy written"
        );
        Ok(())
    }

    async fn list_weeks(&self, campaign_id: Uuid) -> CampaignResult<Vec<Week>> {
        self.ensure_campaign(campaign_id).await?;
        let rows = sqlx::query_as::<_, WeekRow>(&format!(
            "SELECT {WEEK_COLUMNS} FROM campaign_weeks WHERE campaign_id = $1 ORDER BY week_number"
        ))
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(Week::try_from).collect()
    }

    async fn get_week(&self, campaign_id: Uuid, week_number: u32) -> CampaignResult<Week> {
        self.ensure_campaign(campaign_id).await?;
        sqlx::query_as::<_, WeekRow>(&format!(
            "SELECT {WEEK_COLUMNS} FROM campaign_weeks WHERE campaign_id = $1 AND week_number = $2"
        ))
        .bind(campaign_id)
        .bind(week_number as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?
        .ok_or_else(|| CampaignError::not_found("week", format!("{campaign_id}/{week_number}")))?
        .try_into()
    }

    async fn replace_week(&self, week: &Week, expected_version: i64) -> CampaignResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        check_version(&mut tx, week, expected_version).await?;
        update_week(&mut tx, week).await?;
        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn append_history(&self, entry: &RegenerationHistoryEntry) -> CampaignResult<()> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        ensure_campaign(&mut conn, entry.campaign_id).await?;
        insert_history(&mut conn, entry).await
    }

    async fn commit_regeneration(
        &self,
        week: &Week,
        expected_version: i64,
        entry: &RegenerationHistoryEntry,
    ) -> CampaignResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        check_version(&mut tx, week, expected_version).await?;
        update_week(&mut tx, week).await?;
        insert_history(&mut tx, entry).await?;
        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn list_history(
        &self,
        campaign_id: Uuid,
        query: &HistoryQuery,
    ) -> CampaignResult<Vec<RegenerationHistoryEntry>> {
        self.ensure_campaign(campaign_id).await?;
        let rows = sqlx::query_as::<_, HistoryRow>(&format!(
            r#"
            SELECT {HISTORY_COLUMNS}
            FROM regeneration_history
            WHERE campaign_id = $1
              AND ($2::int IS NULL OR week_number = $2)
              AND ($3::timestamptz IS NULL OR created_at >= $3)
              AND ($4::timestamptz IS NULL OR created_at < $4)
            ORDER BY created_at, seq
            "#
        ))
        .bind(campaign_id)
        .bind(query.week_number.map(|n| n as i32))
        .bind(query.since)
        .bind(query.until)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_history_entry(
        &self,
        campaign_id: Uuid,
        entry_id: Uuid,
    ) -> CampaignResult<RegenerationHistoryEntry> {
        let row = sqlx::query_as::<_, HistoryRow>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM regeneration_history WHERE campaign_id = $1 AND id = $2"
        ))
        .bind(campaign_id)
        .bind(entry_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?
        .ok_or_else(|| CampaignError::not_found("history entry", entry_id))?;

        Ok(row.into())
    }

    async fn latest_insight_snapshot(
        &self,
        campaign_id: Uuid,
    ) -> CampaignResult<Option<InsightSnapshot>> {
        self.ensure_campaign(campaign_id).await?;
        let row = sqlx::query_scalar::<_, Json<InsightSnapshot>>(
            r#"
            SELECT snapshot FROM insight_snapshots
            WHERE campaign_id = $1
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(campaign_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(|json| json.0))
    }

    async fn append_insight_snapshot(
        &self,
        campaign_id: Uuid,
        snapshot: &InsightSnapshot,
    ) -> CampaignResult<()> {
        let mut conn = self.pool.acquire().await.map_err(storage)?;
        ensure_campaign(&mut conn, campaign_id).await?;
        insert_snapshot(&mut conn, campaign_id, snapshot).await
    }

    async fn commit_evolution(&self, commit: &EvolutionCommit) -> CampaignResult<()> {
        let campaign_id = commit.record.campaign_id;
        let mut tx = self.pool.begin().await.map_err(storage)?;
        ensure_campaign(&mut tx, campaign_id).await?;

        for update in &commit.week_updates {
            check_version(&mut tx, &update.week, update.expected_version).await?;
        }
        insert_snapshot(&mut tx, campaign_id, &commit.snapshot).await?;
        for update in &commit.week_updates {
            update_week(&mut tx, &update.week).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO evolution_records (id, campaign_id, snapshot_id, record, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(commit.record.id)
        .bind(campaign_id)
        .bind(commit.record.snapshot_id)
        .bind(Json(&commit.record))
        .bind(commit.record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        for change in &commit.record.applied_changes {
            sqlx::query(
                r#"
                INSERT INTO week_changes
                    (id, campaign_id, evolution_id, week_number, recommendation_id, change, applied_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(change.id)
            .bind(campaign_id)
            .bind(commit.record.id)
            .bind(change.week_number as i32)
            .bind(change.recommendation_id)
            .bind(Json(change))
            .bind(change.applied_at)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        info!(
            campaign_id = %campaign_id,
            evolution_id = %commit.record.id,
            weeks_updated = commit.week_updates.len(),
            changes = commit.record.applied_changes.len(),
            "Evolution committed"
        );
        Ok(())
    }

    async fn list_evolutions(&self, campaign_id: Uuid) -> CampaignResult<Vec<EvolutionRecord>> {
        self.ensure_campaign(campaign_id).await?;
        let rows = sqlx::query_scalar::<_, Json<EvolutionRecord>>(
            "SELECT record FROM evolution_records WHERE campaign_id = $1 ORDER BY seq",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(|json| json.0).collect())
    }

    async fn list_week_changes(
        &self,
        campaign_id: Uuid,
        week_number: Option<u32>,
    ) -> CampaignResult<Vec<WeekChange>> {
        self.ensure_campaign(campaign_id).await?;
        let rows = sqlx::query_scalar::<_, Json<WeekChange>>(
            r#"
            SELECT change FROM week_changes
            WHERE campaign_id = $1 AND ($2::int IS NULL OR week_number = $2)
            ORDER BY seq
            "#,
        )
        .bind(campaign_id)
        .bind(week_number.map(|n| n as i32))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows.into_iter().map(|json| json.0).collect())
    }
}
