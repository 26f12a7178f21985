//! Connection and schema bootstrap
//!
//! Opens the configured SQL backend and creates the counter and team tables.

use crate::seq::allocator::SequenceAllocator;
use crate::seq::config::{Config, DatabaseConfig, DatabaseType};
use crate::seq::entities::{SequenceCounter, Team, team};
use crate::seq::error::SeqError;
use sea_orm::*;
use sea_query::Index;
use tracing::{error, info};

/// Create database connection
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, SeqError> {
    match &config.db_config {
        DatabaseType::Sqlite { url } => {
            info!("Connecting to SQLite: {}", url);
            let mut opts = ConnectOptions::new(url.clone());
            // Every pooled connection to an in-memory database sees its own
            // empty database, so keep exactly one alive.
            if is_in_memory(url) {
                opts.max_connections(1).min_connections(1);
            }
            opts.sqlx_logging(false);
            Ok(Database::connect(opts).await?)
        }
        DatabaseType::Postgres { url } => {
            info!("Connecting to PostgreSQL: {}", url);
            let mut opts = ConnectOptions::new(url.clone());
            opts.sqlx_logging(false);
            Ok(Database::connect(opts).await?)
        }
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Initialize database schema
pub async fn init_schema(db: &DatabaseConnection) -> Result<(), SeqError> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let stmts = [
        schema
            .create_table_from_entity(SequenceCounter)
            .if_not_exists()
            .to_owned(),
        schema
            .create_table_from_entity(Team)
            .if_not_exists()
            .to_owned(),
    ];

    for (i, stmt) in stmts.iter().enumerate() {
        let sql = builder.build(stmt);
        db.execute(sql).await.map_err(|e| {
            error!("Failed to execute schema statement {}: {}", i + 1, e);
            SeqError::from(e)
        })?;
    }

    let index_stmt = Index::create()
        .if_not_exists()
        .name("idx_teams_series_seq")
        .table(Team)
        .col(team::Column::SeriesId)
        .col(team::Column::Seq)
        .to_owned();

    let index_sql = builder.build(&index_stmt);
    db.execute(index_sql).await.map_err(|e| {
        error!("Failed to create index idx_teams_series_seq: {}", e);
        SeqError::from(e)
    })?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Connect, create the schema and make sure every configured series has a
/// counter row.
pub async fn open_allocator(config: &Config) -> Result<SequenceAllocator, SeqError> {
    info!("Database type: {}", config.database.db_type_str());

    let db = connect(&config.database).await?;
    init_schema(&db).await?;

    let allocator = SequenceAllocator::new(db, config.retry.policy());
    for series in &config.series {
        allocator.ensure_series(&series.id).await?;
    }
    Ok(allocator)
}

/// Convenience function to open an allocator from a database URL
pub async fn open_allocator_from_url(url: &str) -> Result<SequenceAllocator, SeqError> {
    let config = Config::from_url(url).map_err(|e| SeqError::Config(e.to_string()))?;
    open_allocator(&config).await
}
