use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, Transaction};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::CatalogResult;
use crate::models::{Seat, Section, SectionWithVenue, Venue, VenueFields, VenueRef};
use crate::store::{StoreTx, VenueStore};
use crate::StartupError;

const VENUE_COLUMNS: &str = "id, name, address, city, country, created_at, updated_at";
const SECTION_COLUMNS: &str = "id, venue_id, name, capacity, created_at, updated_at";

/// PostgreSQL-backed store. Row locks are `SELECT ... FOR UPDATE`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Opens the pool and brings the catalog schema up to date.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StartupError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;
        info!("Catalog database connected, pool size {}", config.pool_size);

        sqlx::migrate!("./src/migrations").run(&pool).await?;
        info!("Catalog schema migrated");

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct SectionVenueRow {
    id: i64,
    venue_id: i64,
    name: String,
    capacity: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    venue_name: String,
}

impl From<SectionVenueRow> for SectionWithVenue {
    fn from(row: SectionVenueRow) -> Self {
        SectionWithVenue {
            venue: VenueRef {
                id: row.venue_id,
                name: row.venue_name,
            },
            section: Section {
                id: row.id,
                venue_id: row.venue_id,
                name: row.name,
                capacity: row.capacity,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}

#[async_trait]
impl VenueStore for PgStore {
    async fn begin(&self) -> CatalogResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn list_venues(&self, limit: i64, offset: i64) -> CatalogResult<Vec<Venue>> {
        let venues = sqlx::query_as::<_, Venue>(&format!(
            "SELECT {VENUE_COLUMNS} FROM venues
             ORDER BY created_at DESC, id DESC
             LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(venues)
    }

    async fn count_venues(&self) -> CatalogResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM venues")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn sections_of_venues(&self, venue_ids: &[i64]) -> CatalogResult<Vec<Section>> {
        if venue_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sections = sqlx::query_as::<_, Section>(&format!(
            "SELECT {SECTION_COLUMNS} FROM venue_sections
             WHERE venue_id = ANY($1)
             ORDER BY name, id"
        ))
        .bind(venue_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(sections)
    }

    async fn find_venue(&self, venue_id: i64) -> CatalogResult<Option<Venue>> {
        let venue = sqlx::query_as::<_, Venue>(&format!(
            "SELECT {VENUE_COLUMNS} FROM venues WHERE id = $1"
        ))
        .bind(venue_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(venue)
    }

    async fn sections_with_venue(&self, venue_id: i64) -> CatalogResult<Vec<SectionWithVenue>> {
        let rows = sqlx::query_as::<_, SectionVenueRow>(
            r#"
            SELECT vs.id, vs.venue_id, vs.name, vs.capacity, vs.created_at, vs.updated_at,
                   v.name AS venue_name
            FROM venue_sections vs
            JOIN venues v ON v.id = vs.venue_id
            WHERE vs.venue_id = $1
            ORDER BY vs.name, vs.id
            "#,
        )
        .bind(venue_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SectionWithVenue::from).collect())
    }

    async fn find_section(
        &self,
        venue_id: i64,
        section_id: i64,
    ) -> CatalogResult<Option<Section>> {
        let section = sqlx::query_as::<_, Section>(&format!(
            "SELECT {SECTION_COLUMNS} FROM venue_sections WHERE id = $1 AND venue_id = $2"
        ))
        .bind(section_id)
        .bind(venue_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(section)
    }

    async fn seat_preview(&self, venue_id: i64, per_section: i64) -> CatalogResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(
            r#"
            SELECT id, section_id, seat_number
            FROM (
                SELECT s.id, s.section_id, s.seat_number,
                       ROW_NUMBER() OVER (PARTITION BY s.section_id ORDER BY s.seat_number) AS rn
                FROM seats s
                JOIN venue_sections vs ON vs.id = s.section_id
                WHERE vs.venue_id = $1
            ) ranked
            WHERE rn <= $2
            ORDER BY section_id, seat_number
            "#,
        )
        .bind(venue_id)
        .bind(per_section)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }

    async fn list_seats(&self, section_id: i64) -> CatalogResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT id, section_id, seat_number FROM seats
             WHERE section_id = $1
             ORDER BY seat_number",
        )
        .bind(section_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn lock_venue(&mut self, venue_id: i64) -> CatalogResult<Option<Venue>> {
        let venue = sqlx::query_as::<_, Venue>(&format!(
            "SELECT {VENUE_COLUMNS} FROM venues WHERE id = $1 FOR UPDATE"
        ))
        .bind(venue_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(venue)
    }

    async fn lock_section(
        &mut self,
        venue_id: i64,
        section_id: i64,
    ) -> CatalogResult<Option<Section>> {
        let section = sqlx::query_as::<_, Section>(&format!(
            "SELECT {SECTION_COLUMNS} FROM venue_sections
             WHERE id = $1 AND venue_id = $2
             FOR UPDATE"
        ))
        .bind(section_id)
        .bind(venue_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(section)
    }

    async fn section_name_taken(
        &mut self,
        venue_id: i64,
        name: &str,
        exclude_section: Option<i64>,
    ) -> CatalogResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
              SELECT 1 FROM venue_sections
              WHERE venue_id = $1 AND name = $2 AND ($3::BIGINT IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(venue_id)
        .bind(name)
        .bind(exclude_section)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(taken)
    }

    async fn insert_venue(&mut self, fields: &VenueFields) -> CatalogResult<Venue> {
        let venue = sqlx::query_as::<_, Venue>(&format!(
            "INSERT INTO venues (name, address, city, country)
             VALUES ($1, $2, $3, $4)
             RETURNING {VENUE_COLUMNS}"
        ))
        .bind(&fields.name)
        .bind(&fields.address)
        .bind(&fields.city)
        .bind(&fields.country)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(venue)
    }

    async fn update_venue(&mut self, venue_id: i64, fields: &VenueFields) -> CatalogResult<Venue> {
        let venue = sqlx::query_as::<_, Venue>(&format!(
            "UPDATE venues
             SET name = $2, address = $3, city = $4, country = $5, updated_at = NOW()
             WHERE id = $1
             RETURNING {VENUE_COLUMNS}"
        ))
        .bind(venue_id)
        .bind(&fields.name)
        .bind(&fields.address)
        .bind(&fields.city)
        .bind(&fields.country)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(venue)
    }

    async fn delete_venue(&mut self, venue_id: i64) -> CatalogResult<u64> {
        let result = sqlx::query("DELETE FROM venues WHERE id = $1")
            .bind(venue_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_section(
        &mut self,
        venue_id: i64,
        name: &str,
        capacity: i32,
    ) -> CatalogResult<Section> {
        let section = sqlx::query_as::<_, Section>(&format!(
            "INSERT INTO venue_sections (venue_id, name, capacity)
             VALUES ($1, $2, $3)
             RETURNING {SECTION_COLUMNS}"
        ))
        .bind(venue_id)
        .bind(name)
        .bind(capacity)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(section)
    }

    async fn update_section(
        &mut self,
        section_id: i64,
        name: &str,
        capacity: i32,
    ) -> CatalogResult<Section> {
        let section = sqlx::query_as::<_, Section>(&format!(
            "UPDATE venue_sections
             SET name = $2, capacity = $3, updated_at = NOW()
             WHERE id = $1
             RETURNING {SECTION_COLUMNS}"
        ))
        .bind(section_id)
        .bind(name)
        .bind(capacity)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(section)
    }

    async fn delete_section(&mut self, section_id: i64) -> CatalogResult<u64> {
        let result = sqlx::query("DELETE FROM venue_sections WHERE id = $1")
            .bind(section_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_sections_of_venue(&mut self, venue_id: i64) -> CatalogResult<u64> {
        let result = sqlx::query("DELETE FROM venue_sections WHERE venue_id = $1")
            .bind(venue_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_seat_range(
        &mut self,
        section_id: i64,
        first: i32,
        last: i32,
    ) -> CatalogResult<u64> {
        // One set-based statement regardless of range size
        let result = sqlx::query(
            "INSERT INTO seats (section_id, seat_number)
             SELECT $1, n FROM generate_series($2::INT, $3::INT) AS n",
        )
        .bind(section_id)
        .bind(first)
        .bind(last)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_seats_above(&mut self, section_id: i64, keep: i32) -> CatalogResult<u64> {
        let result = sqlx::query("DELETE FROM seats WHERE section_id = $1 AND seat_number > $2")
            .bind(section_id)
            .bind(keep)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_seats_of_section(&mut self, section_id: i64) -> CatalogResult<u64> {
        let result = sqlx::query("DELETE FROM seats WHERE section_id = $1")
            .bind(section_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_seats_of_venue(&mut self, venue_id: i64) -> CatalogResult<u64> {
        let result = sqlx::query(
            "DELETE FROM seats
             WHERE section_id IN (SELECT id FROM venue_sections WHERE venue_id = $1)",
        )
        .bind(venue_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_seats(&mut self, section_id: i64) -> CatalogResult<Vec<Seat>> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT id, section_id, seat_number FROM seats
             WHERE section_id = $1
             ORDER BY seat_number",
        )
        .bind(section_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(seats)
    }

    async fn commit(self: Box<Self>) -> CatalogResult<()> {
        let PgTx { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> CatalogResult<()> {
        let PgTx { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
