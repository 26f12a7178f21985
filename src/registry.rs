//! Team registration on top of the sequence allocator.
//!
//! A registration first allocates a value from the team series and then
//! inserts the team row. The two steps commit separately: if the insert fails,
//! the registration fails cleanly and the allocated value stays unused.

use crate::seq::config::Config;
use crate::seq::entities::{RegistrationStatus, Team, TeamModel, team};
use crate::seq::error::SeqError;
use crate::seq::factory::open_allocator;
use crate::seq::identifier::{AllocatedIdentifier, IdentifierFormat};
use crate::seq::{SequenceAllocator, TEAM_SERIES, now_millis};
use sea_orm::*;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Sequence(#[from] SeqError),

    #[error("team already registered: {0}")]
    DuplicateTeam(String),

    #[error("team not found: {0}")]
    TeamNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Registration payload. Validation happens before it reaches the registry.
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub name: String,
    pub captain_email: String,
}

impl NewTeam {
    pub fn new(name: impl Into<String>, captain_email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            captain_email: captain_email.into(),
        }
    }
}

#[derive(Clone)]
pub struct TeamRegistry {
    allocator: SequenceAllocator,
    series_id: String,
    format: IdentifierFormat,
}

impl TeamRegistry {
    /// Open the datastore and bring every configured counter up to date with
    /// the teams already persisted.
    pub async fn open(config: &Config) -> Result<Self, RegistryError> {
        let allocator = open_allocator(config).await?;

        for series in &config.series {
            let value = allocator.resynchronize(&series.id).await?;
            info!(series_id = %series.id, value = value, "sequence counter ready");
        }

        let series = config
            .series(TEAM_SERIES)
            .ok_or_else(|| SeqError::Config(format!("series {TEAM_SERIES} is not configured")))?;

        Ok(Self {
            allocator,
            series_id: series.id.clone(),
            format: series.format(),
        })
    }

    pub async fn open_url(url: &str) -> Result<Self, RegistryError> {
        let config = Config::from_url(url).map_err(|e| SeqError::Config(e.to_string()))?;
        Self::open(&config).await
    }

    pub fn allocator(&self) -> &SequenceAllocator {
        &self.allocator
    }

    pub fn series_id(&self) -> &str {
        &self.series_id
    }

    pub fn format(&self) -> &IdentifierFormat {
        &self.format
    }

    fn db(&self) -> &DatabaseConnection {
        self.allocator.connection()
    }

    /// Register a team under the next identifier of the team series.
    pub async fn register(&self, team: NewTeam) -> Result<TeamModel, RegistryError> {
        let id = self
            .allocator
            .allocate_identifier(&self.series_id, &self.format)
            .await?;

        let name = team.name.clone();
        match self.insert(&id, team).await {
            Ok(model) => {
                info!(team_code = %id, name = %model.name, "team registered");
                Ok(model)
            }
            Err(e) => {
                warn!(
                    team_code = %id,
                    error = %e,
                    "team insert failed after allocation, identifier left unused"
                );
                Err(Self::insert_error(e, name))
            }
        }
    }

    /// Insert a team under an explicit identifier, bypassing the allocator.
    ///
    /// Used for data imports. The counter is not touched; run
    /// [`SequenceAllocator::resynchronize`] afterwards to catch it up.
    pub async fn import(&self, code: &str, team: NewTeam) -> Result<TeamModel, RegistryError> {
        let id = self.format.parse(code)?;
        let label = id.to_string();

        let model = self
            .insert(&id, team)
            .await
            .map_err(|e| Self::insert_error(e, label))?;
        info!(team_code = %model.team_code, "team imported");
        Ok(model)
    }

    async fn insert(&self, id: &AllocatedIdentifier, team: NewTeam) -> Result<TeamModel, DbErr> {
        let now = now_millis();
        let row = team::ActiveModel {
            series_id: Set(self.series_id.clone()),
            seq: Set(id.value()),
            team_code: Set(id.to_string()),
            name: Set(team.name),
            captain_email: Set(team.captain_email),
            status: Set(RegistrationStatus::Pending),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        row.insert(self.db()).await
    }

    fn insert_error(err: DbErr, label: String) -> RegistryError {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => RegistryError::DuplicateTeam(label),
            _ => RegistryError::Database(err),
        }
    }

    pub async fn find(&self, code: &str) -> Result<Option<TeamModel>, RegistryError> {
        let id = self.format.parse(code)?;
        Ok(Team::find()
            .filter(team::Column::TeamCode.eq(id.to_string()))
            .one(self.db())
            .await?)
    }

    /// Teams of this series ordered by identifier.
    pub async fn list(
        &self,
        status: Option<RegistrationStatus>,
    ) -> Result<Vec<TeamModel>, RegistryError> {
        let mut query = Team::find().filter(team::Column::SeriesId.eq(self.series_id.as_str()));
        if let Some(status) = status {
            query = query.filter(team::Column::Status.eq(status));
        }
        Ok(query.order_by_asc(team::Column::Seq).all(self.db()).await?)
    }

    /// Record an admin decision on a registration.
    pub async fn review(
        &self,
        code: &str,
        decision: RegistrationStatus,
    ) -> Result<TeamModel, RegistryError> {
        let existing = self
            .find(code)
            .await?
            .ok_or_else(|| RegistryError::TeamNotFound(code.to_string()))?;

        let mut active: team::ActiveModel = existing.into();
        active.status = Set(decision);
        active.updated_at = Set(now_millis());
        let model = active.update(self.db()).await?;

        info!(team_code = %model.team_code, status = %decision, "registration reviewed");
        Ok(model)
    }
}
