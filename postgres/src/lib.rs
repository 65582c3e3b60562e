//! `PostgreSQL` fleet store for fleetops.
//!
//! Implements [`FleetStore`] from `fleetops-core` on top of sqlx:
//!
//! - Every read is filtered by tenant and hides soft-deleted cargo
//! - Transactions lock cargo and truck rows with `SELECT ... FOR UPDATE`
//! - Tracking sequences are advanced with an upsert inside the creating transaction
//! - Cargo rows and their ledger entries commit together, so a partial commit
//!   cannot happen here
//!
//! # Example
//!
//! ```ignore
//! use fleetops_postgres::PostgresFleetStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresFleetStore::new("postgres://localhost/fleetops").await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod rows;

use chrono::{DateTime, Utc};
use fleetops_core::cargo::Cargo;
use fleetops_core::ledger::{CargoEvent, NewCargoEvent};
use fleetops_core::store::{FleetStore, FleetTransaction, StoreError, StoreFuture};
use fleetops_core::truck::Truck;
use fleetops_core::{CargoId, TenantId, TruckId};
use rows::{decode_all, CargoRow, EventRow, TruckRow, CARGO_COLUMNS, EVENT_COLUMNS, TRUCK_COLUMNS};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use std::time::Duration;

/// Sort key putting `urgent` first and `low` last.
const PRIORITY_RANK: &str = "CASE priority \
    WHEN 'urgent' THEN 4 WHEN 'high' THEN 3 WHEN 'medium' THEN 2 WHEN 'low' THEN 1 ELSE 0 END";

#[allow(clippy::needless_pass_by_value)]
fn db(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// `PostgreSQL`-backed fleet store.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct PostgresFleetStore {
    pool: PgPool,
}

impl PostgresFleetStore {
    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection cannot be established.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await.map_err(db)?;
        Ok(Self { pool })
    }

    /// Connect with an explicit pool size and connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection cannot be established.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(db)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        tracing::info!("Fleet store migrations applied");
        Ok(())
    }

    /// Insert a truck and return it with its allocated id.
    ///
    /// Trucks are provisioned outside the cargo workflow; this is the seam for
    /// that provisioning and for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    pub async fn insert_truck(&self, truck: &Truck) -> Result<Truck, StoreError> {
        let sql = format!(
            "INSERT INTO trucks (tenant_id, license_plate, model, status, driver_id, is_approved, \
                last_latitude, last_longitude, last_speed, last_heading, last_location_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {TRUCK_COLUMNS}"
        );
        let location = truck.last_location;
        let row: TruckRow = sqlx::query_as(&sql)
            .bind(truck.tenant_id.get())
            .bind(&truck.license_plate)
            .bind(&truck.model)
            .bind(truck.status.as_str())
            .bind(truck.driver_id.map(fleetops_core::UserId::get))
            .bind(truck.is_approved)
            .bind(location.map(|l| l.latitude))
            .bind(location.map(|l| l.longitude))
            .bind(location.map(|l| l.speed))
            .bind(location.map(|l| l.heading))
            .bind(location.map(|l| l.recorded_at))
            .fetch_one(&self.pool)
            .await
            .map_err(db)?;
        Truck::try_from(row)
    }
}

impl FleetStore for PostgresFleetStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(db)?;
            Ok(())
        })
    }

    fn begin(&self, tenant_id: TenantId) -> StoreFuture<'_, Box<dyn FleetTransaction>> {
        Box::pin(async move {
            let tx = self.pool.begin().await.map_err(db)?;
            let tx: Box<dyn FleetTransaction> = Box::new(PostgresTransaction { tenant_id, tx });
            Ok(tx)
        })
    }

    fn cargo(&self, tenant_id: TenantId, cargo_id: CargoId) -> StoreFuture<'_, Option<Cargo>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {CARGO_COLUMNS} FROM cargo \
                 WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
            );
            let row: Option<CargoRow> = sqlx::query_as(&sql)
                .bind(tenant_id.get())
                .bind(cargo_id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(db)?;
            row.map(Cargo::try_from).transpose()
        })
    }

    fn cargo_by_tracking_code<'a>(
        &'a self,
        tenant_id: TenantId,
        tracking_code: &'a str,
    ) -> StoreFuture<'a, Option<Cargo>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {CARGO_COLUMNS} FROM cargo \
                 WHERE tenant_id = $1 AND tracking_code = $2 AND deleted_at IS NULL"
            );
            let row: Option<CargoRow> = sqlx::query_as(&sql)
                .bind(tenant_id.get())
                .bind(tracking_code)
                .fetch_optional(&self.pool)
                .await
                .map_err(db)?;
            row.map(Cargo::try_from).transpose()
        })
    }

    fn truck(&self, tenant_id: TenantId, truck_id: TruckId) -> StoreFuture<'_, Option<Truck>> {
        Box::pin(async move {
            let sql = format!("SELECT {TRUCK_COLUMNS} FROM trucks WHERE tenant_id = $1 AND id = $2");
            let row: Option<TruckRow> = sqlx::query_as(&sql)
                .bind(tenant_id.get())
                .bind(truck_id.get())
                .fetch_optional(&self.pool)
                .await
                .map_err(db)?;
            row.map(Truck::try_from).transpose()
        })
    }

    fn cargo_for_truck(&self, tenant_id: TenantId, truck_id: TruckId) -> StoreFuture<'_, Vec<Cargo>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {CARGO_COLUMNS} FROM cargo \
                 WHERE tenant_id = $1 AND truck_id = $2 AND deleted_at IS NULL \
                 ORDER BY created_at DESC, id DESC"
            );
            let rows: Vec<CargoRow> = sqlx::query_as(&sql)
                .bind(tenant_id.get())
                .bind(truck_id.get())
                .fetch_all(&self.pool)
                .await
                .map_err(db)?;
            decode_all(rows)
        })
    }

    fn unassigned_cargo(&self, tenant_id: TenantId) -> StoreFuture<'_, Vec<Cargo>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {CARGO_COLUMNS} FROM cargo \
                 WHERE tenant_id = $1 AND status = 'pending' AND truck_id IS NULL \
                   AND deleted_at IS NULL \
                 ORDER BY {PRIORITY_RANK} DESC, created_at ASC, id ASC"
            );
            let rows: Vec<CargoRow> = sqlx::query_as(&sql)
                .bind(tenant_id.get())
                .fetch_all(&self.pool)
                .await
                .map_err(db)?;
            decode_all(rows)
        })
    }

    fn ledger(&self, tenant_id: TenantId, cargo_id: CargoId) -> StoreFuture<'_, Vec<CargoEvent>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {EVENT_COLUMNS} FROM cargo_events \
                 WHERE tenant_id = $1 AND cargo_id = $2 \
                 ORDER BY recorded_at DESC, id DESC"
            );
            let rows: Vec<EventRow> = sqlx::query_as(&sql)
                .bind(tenant_id.get())
                .bind(cargo_id.get())
                .fetch_all(&self.pool)
                .await
                .map_err(db)?;
            Ok(rows.into_iter().map(CargoEvent::from).collect())
        })
    }
}

/// A database transaction bound to one tenant.
struct PostgresTransaction {
    tenant_id: TenantId,
    tx: sqlx::Transaction<'static, Postgres>,
}

impl FleetTransaction for PostgresTransaction {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    fn next_tracking_sequence(&mut self) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let (value,): (i64,) = sqlx::query_as(
                r"
                INSERT INTO tracking_sequences (tenant_id, last_value) VALUES ($1, 1)
                ON CONFLICT (tenant_id)
                DO UPDATE SET last_value = tracking_sequences.last_value + 1
                RETURNING last_value
                ",
            )
            .bind(self.tenant_id.get())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db)?;
            u64::try_from(value).map_err(|e| StoreError::Serialization(e.to_string()))
        })
    }

    fn insert_cargo(&mut self, cargo: Cargo) -> StoreFuture<'_, Cargo> {
        Box::pin(async move {
            if cargo.tenant_id != self.tenant_id {
                return Err(StoreError::Database(
                    "cargo tenant does not match transaction".to_string(),
                ));
            }
            let sql = format!(
                "INSERT INTO cargo (tenant_id, tracking_code, title, description, cargo_type, \
                    priority, status, truck_id, weight, volume, value, currency, \
                    origin_address, origin_latitude, origin_longitude, origin_contact, origin_phone, \
                    destination_address, destination_latitude, destination_longitude, \
                    destination_contact, destination_phone, \
                    pickup_time, delivery_time, estimated_delivery, instructions, special_handling, \
                    created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                    $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29) \
                 RETURNING {CARGO_COLUMNS}"
            );
            let origin = cargo.origin.coordinates;
            let destination = cargo.destination.coordinates;
            let row: CargoRow = sqlx::query_as(&sql)
                .bind(cargo.tenant_id.get())
                .bind(&cargo.tracking_code)
                .bind(&cargo.title)
                .bind(&cargo.description)
                .bind(cargo.cargo_type.as_str())
                .bind(cargo.priority.as_str())
                .bind(cargo.status.as_str())
                .bind(cargo.truck_id.map(TruckId::get))
                .bind(cargo.weight)
                .bind(cargo.volume)
                .bind(cargo.value)
                .bind(&cargo.currency)
                .bind(&cargo.origin.address)
                .bind(origin.map(|c| c.latitude))
                .bind(origin.map(|c| c.longitude))
                .bind(&cargo.origin.contact)
                .bind(&cargo.origin.phone)
                .bind(&cargo.destination.address)
                .bind(destination.map(|c| c.latitude))
                .bind(destination.map(|c| c.longitude))
                .bind(&cargo.destination.contact)
                .bind(&cargo.destination.phone)
                .bind(cargo.pickup_time)
                .bind(cargo.delivery_time)
                .bind(cargo.estimated_delivery)
                .bind(&cargo.instructions)
                .bind(cargo.special_handling)
                .bind(cargo.created_at)
                .bind(cargo.updated_at)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(db)?;
            Cargo::try_from(row)
        })
    }

    fn lock_cargo(&mut self, cargo_id: CargoId) -> StoreFuture<'_, Option<Cargo>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {CARGO_COLUMNS} FROM cargo \
                 WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL \
                 FOR UPDATE"
            );
            let row: Option<CargoRow> = sqlx::query_as(&sql)
                .bind(self.tenant_id.get())
                .bind(cargo_id.get())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db)?;
            row.map(Cargo::try_from).transpose()
        })
    }

    fn lock_truck(&mut self, truck_id: TruckId) -> StoreFuture<'_, Option<Truck>> {
        Box::pin(async move {
            let sql = format!(
                "SELECT {TRUCK_COLUMNS} FROM trucks WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
            );
            let row: Option<TruckRow> = sqlx::query_as(&sql)
                .bind(self.tenant_id.get())
                .bind(truck_id.get())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db)?;
            row.map(Truck::try_from).transpose()
        })
    }

    fn count_cargo_on_truck(
        &mut self,
        truck_id: TruckId,
        excluding: CargoId,
    ) -> StoreFuture<'_, usize> {
        Box::pin(async move {
            let (count,): (i64,) = sqlx::query_as(
                r"
                SELECT COUNT(*) FROM cargo
                WHERE tenant_id = $1 AND truck_id = $2 AND id <> $3 AND deleted_at IS NULL
                ",
            )
            .bind(self.tenant_id.get())
            .bind(truck_id.get())
            .bind(excluding.get())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db)?;
            usize::try_from(count).map_err(|e| StoreError::Serialization(e.to_string()))
        })
    }

    fn update_cargo<'a>(&'a mut self, cargo: &'a Cargo) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let origin = cargo.origin.coordinates;
            let destination = cargo.destination.coordinates;
            let position = cargo.current_position;
            let result = sqlx::query(
                r"
                UPDATE cargo SET
                    title = $3, description = $4, cargo_type = $5, priority = $6, status = $7,
                    truck_id = $8, weight = $9, volume = $10, value = $11, currency = $12,
                    origin_address = $13, origin_latitude = $14, origin_longitude = $15,
                    origin_contact = $16, origin_phone = $17,
                    destination_address = $18, destination_latitude = $19,
                    destination_longitude = $20, destination_contact = $21, destination_phone = $22,
                    pickup_time = $23, delivery_time = $24, estimated_delivery = $25,
                    actual_pickup = $26, actual_delivery = $27, assigned_by = $28, assigned_at = $29,
                    instructions = $30, special_handling = $31,
                    current_latitude = $32, current_longitude = $33, current_location = $34,
                    last_updated = $35, updated_at = $36
                WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
                ",
            )
            .bind(self.tenant_id.get())
            .bind(cargo.id.get())
            .bind(&cargo.title)
            .bind(&cargo.description)
            .bind(cargo.cargo_type.as_str())
            .bind(cargo.priority.as_str())
            .bind(cargo.status.as_str())
            .bind(cargo.truck_id.map(TruckId::get))
            .bind(cargo.weight)
            .bind(cargo.volume)
            .bind(cargo.value)
            .bind(&cargo.currency)
            .bind(&cargo.origin.address)
            .bind(origin.map(|c| c.latitude))
            .bind(origin.map(|c| c.longitude))
            .bind(&cargo.origin.contact)
            .bind(&cargo.origin.phone)
            .bind(&cargo.destination.address)
            .bind(destination.map(|c| c.latitude))
            .bind(destination.map(|c| c.longitude))
            .bind(&cargo.destination.contact)
            .bind(&cargo.destination.phone)
            .bind(cargo.pickup_time)
            .bind(cargo.delivery_time)
            .bind(cargo.estimated_delivery)
            .bind(cargo.actual_pickup)
            .bind(cargo.actual_delivery)
            .bind(cargo.assigned_by.map(fleetops_core::UserId::get))
            .bind(cargo.assigned_at)
            .bind(&cargo.instructions)
            .bind(cargo.special_handling)
            .bind(position.map(|c| c.latitude))
            .bind(position.map(|c| c.longitude))
            .bind(&cargo.current_location)
            .bind(cargo.last_updated)
            .bind(cargo.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Database(format!("cargo {} is not live", cargo.id)));
            }
            Ok(())
        })
    }

    fn update_truck<'a>(&'a mut self, truck: &'a Truck) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let location = truck.last_location;
            let result = sqlx::query(
                r"
                UPDATE trucks SET
                    status = $3, last_latitude = $4, last_longitude = $5, last_speed = $6,
                    last_heading = $7, last_location_at = $8, updated_at = now()
                WHERE tenant_id = $1 AND id = $2
                ",
            )
            .bind(self.tenant_id.get())
            .bind(truck.id.get())
            .bind(truck.status.as_str())
            .bind(location.map(|l| l.latitude))
            .bind(location.map(|l| l.longitude))
            .bind(location.map(|l| l.speed))
            .bind(location.map(|l| l.heading))
            .bind(location.map(|l| l.recorded_at))
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Database(format!("truck {} not found", truck.id)));
            }
            Ok(())
        })
    }

    fn soft_delete_cargo(&mut self, cargo_id: CargoId, at: DateTime<Utc>) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE cargo SET deleted_at = $3, updated_at = $3
                WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
                ",
            )
            .bind(self.tenant_id.get())
            .bind(cargo_id.get())
            .bind(at)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn append_event(
        &mut self,
        cargo_id: CargoId,
        event: NewCargoEvent,
    ) -> StoreFuture<'_, CargoEvent> {
        Box::pin(async move {
            let sql = format!(
                "INSERT INTO cargo_events (cargo_id, tenant_id, event_type, description, location, \
                    latitude, longitude, user_id, recorded_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 RETURNING {EVENT_COLUMNS}"
            );
            let row: EventRow = sqlx::query_as(&sql)
                .bind(cargo_id.get())
                .bind(self.tenant_id.get())
                .bind(event.kind.as_str())
                .bind(&event.description)
                .bind(&event.location)
                .bind(event.coordinates.map(|c| c.latitude))
                .bind(event.coordinates.map(|c| c.longitude))
                .bind(event.actor.get())
                .bind(event.recorded_at)
                .fetch_one(&mut *self.tx)
                .await
                .map_err(db)?;
            Ok(CargoEvent::from(row))
        })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            let Self { tenant_id, tx } = *self;
            tx.commit().await.map_err(db)?;
            metrics::counter!("fleet_store_commits_total").increment(1);
            tracing::trace!(tenant_id = %tenant_id, "Fleet transaction committed");
            Ok(())
        })
    }
}
