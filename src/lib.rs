//! Library crate for the ICCT registry: sequence allocation plus the team
//! registration path that consumes it.

pub mod registry;
pub mod seq;

pub use crate::registry::{NewTeam, RegistryError, TeamRegistry};
pub use crate::seq::config::{Config, ConfigError, DatabaseConfig, DatabaseType, SeriesConfig};
pub use crate::seq::entities::{RegistrationStatus, TeamModel};
pub use crate::seq::factory::{open_allocator, open_allocator_from_url};
pub use crate::seq::{
    AllocatedIdentifier, IdentifierFormat, RetryPolicy, SeqError, SequenceAllocator, TEAM_SERIES,
};
