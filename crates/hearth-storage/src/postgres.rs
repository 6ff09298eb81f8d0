//! Operational store backed by Postgres.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use hearth_core::{
    ApplicationRow, CompareOp, EventRow, FilterValue, HouseRow, OpFilter, OperationalRecord,
    ParticipationRecord, RoomRow, Sort, SortDirection, UnknownVariant, UserRow,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::debug;

use crate::{OperationalTable, ParticipationStore, StoreResult};

#[derive(Debug, Clone)]
pub struct PgConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

/// A table row type with a fixed select list and decoder.
pub trait PgRecord: OperationalRecord {
    const TABLE: &'static str;
    const COLUMNS: &'static str;

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error>;
}

fn parse_text<T>(row: &PgRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|err| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(err),
    })
}

impl PgRecord for HouseRow {
    const TABLE: &'static str = "houses";
    const COLUMNS: &'static str =
        "id, content_ref, name, status, city, capacity, occupancy, monthly_rent_cents, created_at";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(HouseRow {
            id: row.try_get("id")?,
            content_ref: row.try_get("content_ref")?,
            name: row.try_get("name")?,
            status: parse_text(row, "status")?,
            city: row.try_get("city")?,
            capacity: row.try_get("capacity")?,
            occupancy: row.try_get("occupancy")?,
            monthly_rent_cents: row.try_get("monthly_rent_cents")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl PgRecord for RoomRow {
    const TABLE: &'static str = "rooms";
    const COLUMNS: &'static str = "id, content_ref, house_id, name, room_type, status, capacity, occupied, monthly_price_cents, available_from";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(RoomRow {
            id: row.try_get("id")?,
            content_ref: row.try_get("content_ref")?,
            house_id: row.try_get("house_id")?,
            name: row.try_get("name")?,
            room_type: parse_text(row, "room_type")?,
            status: parse_text(row, "status")?,
            capacity: row.try_get("capacity")?,
            occupied: row.try_get("occupied")?,
            monthly_price_cents: row.try_get("monthly_price_cents")?,
            available_from: row.try_get("available_from")?,
        })
    }
}

impl PgRecord for EventRow {
    const TABLE: &'static str = "events";
    const COLUMNS: &'static str = "id, content_ref, house_id, title, status, starts_at, ends_at, location, capacity, participant_count";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(EventRow {
            id: row.try_get("id")?,
            content_ref: row.try_get("content_ref")?,
            house_id: row.try_get("house_id")?,
            title: row.try_get("title")?,
            status: parse_text(row, "status")?,
            starts_at: row.try_get("starts_at")?,
            ends_at: row.try_get("ends_at")?,
            location: row.try_get("location")?,
            capacity: row.try_get("capacity")?,
            participant_count: row.try_get("participant_count")?,
        })
    }
}

impl PgRecord for UserRow {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static str = "id, content_ref, email, display_name, role, house_id, joined_at";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            content_ref: row.try_get("content_ref")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            role: parse_text(row, "role")?,
            house_id: row.try_get("house_id")?,
            joined_at: row.try_get("joined_at")?,
        })
    }
}

impl PgRecord for ApplicationRow {
    const TABLE: &'static str = "applications";
    const COLUMNS: &'static str =
        "id, content_ref, user_id, house_id, status, submitted_at, reviewed_at, move_in_date";

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(ApplicationRow {
            id: row.try_get("id")?,
            content_ref: row.try_get("content_ref")?,
            user_id: row.try_get("user_id")?,
            house_id: row.try_get("house_id")?,
            status: parse_text(row, "status")?,
            submitted_at: row.try_get("submitted_at")?,
            reviewed_at: row.try_get("reviewed_at")?,
            move_in_date: row.try_get("move_in_date")?,
        })
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: &FilterValue) {
    match value {
        FilterValue::Text(s) => {
            builder.push_bind(s.clone());
        }
        FilterValue::Int(i) => {
            builder.push_bind(*i);
        }
        FilterValue::Bool(b) => {
            builder.push_bind(*b);
        }
        FilterValue::Time(t) => {
            builder.push_bind(*t);
        }
        FilterValue::Date(d) => {
            builder.push_bind(*d);
        }
        FilterValue::List(items) => {
            builder.push_bind(items.clone());
        }
    }
}

/// Append ` WHERE ...` for `filter`. Column names are static identifiers.
pub fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &OpFilter) {
    builder.push(" WHERE TRUE");
    for condition in &filter.conditions {
        builder.push(" AND ");
        builder.push(condition.column);
        let operator = match condition.op {
            CompareOp::IsNull => {
                builder.push(" IS NULL");
                continue;
            }
            CompareOp::NotNull => {
                builder.push(" IS NOT NULL");
                continue;
            }
            CompareOp::Eq => " = ",
            CompareOp::Ne => " <> ",
            CompareOp::Gte => " >= ",
            CompareOp::Lte => " <= ",
            CompareOp::In => " = ANY(",
        };
        builder.push(operator);
        match &condition.value {
            Some(value) => push_value(builder, value),
            None => {
                builder.push("NULL");
            }
        }
        if condition.op == CompareOp::In {
            builder.push(")");
        }
    }
}

fn push_order(builder: &mut QueryBuilder<'_, Postgres>, sort: Sort) {
    let dir = match sort.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    builder.push(" ORDER BY ");
    builder.push(sort.column);
    builder.push(format!(" {dir} NULLS LAST, id ASC"));
}

#[derive(Debug, Clone)]
pub struct PgOperationalStore {
    pool: PgPool,
}

impl PgOperationalStore {
    pub async fn connect(config: &PgConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl<R: PgRecord> OperationalTable<R> for PgOperationalStore {
    async fn query(
        &self,
        filter: &OpFilter,
        sort: Sort,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<R>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM {}",
            R::COLUMNS,
            R::TABLE
        ));
        push_filter(&mut builder, filter);
        push_order(&mut builder, sort);
        builder.push(" LIMIT ");
        builder.push_bind(limit as i64);
        builder.push(" OFFSET ");
        builder.push_bind(offset as i64);

        debug!(table = R::TABLE, sql = builder.sql(), "operational query");
        let rows = builder.build().fetch_all(&self.pool).await?;
        let records = rows.iter().map(R::from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    async fn get(&self, id: &str) -> StoreResult<Option<R>> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", R::COLUMNS, R::TABLE);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(R::from_row).transpose()?)
    }

    async fn batch_get(&self, ids: &[String]) -> StoreResult<HashMap<String, R>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE id = ANY($1)",
            R::COLUMNS,
            R::TABLE
        );
        let rows = sqlx::query(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        let mut out = HashMap::with_capacity(rows.len());
        for row in &rows {
            let record = R::from_row(row)?;
            out.insert(record.id().to_string(), record);
        }
        Ok(out)
    }
}

#[async_trait]
impl ParticipationStore for PgOperationalStore {
    async fn get_for_user(&self, user_id: &str) -> StoreResult<Vec<ParticipationRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, event_id, status, updated_at
              FROM participations
             WHERE user_id = $1
             ORDER BY event_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(participation_from_row(row)?);
        }
        Ok(out)
    }

    async fn upsert(&self, record: ParticipationRecord) -> StoreResult<ParticipationRecord> {
        let row = sqlx::query(
            r#"
            INSERT INTO participations (user_id, event_id, status, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, event_id)
            DO UPDATE SET status = EXCLUDED.status,
                          updated_at = EXCLUDED.updated_at
            RETURNING user_id, event_id, status, updated_at
            "#,
        )
        .bind(&record.user_id)
        .bind(&record.event_id)
        .bind(record.status.as_str())
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(participation_from_row(&row)?)
    }
}

fn participation_from_row(row: &PgRow) -> Result<ParticipationRecord, sqlx::Error> {
    Ok(ParticipationRecord {
        user_id: row.try_get("user_id")?,
        event_id: row.try_get("event_id")?,
        status: parse_text(row, "status")?,
        updated_at: row.try_get("updated_at")?,
    })
}
