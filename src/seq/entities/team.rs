use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Admin review state of a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum RegistrationStatus {
    #[sea_orm(num_value = 0)]
    Pending,

    #[sea_orm(num_value = 1)]
    Approved,

    #[sea_orm(num_value = 2)]
    Rejected,
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(RegistrationStatus::Pending),
            "approved" | "approve" => Ok(RegistrationStatus::Approved),
            "rejected" | "reject" => Ok(RegistrationStatus::Rejected),
            other => Err(format!("unknown registration status: {other}")),
        }
    }
}

/// A registered team, tagged with an identifier from its series.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "teams")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub series_id: String,

    /// Numeric suffix of `team_code`
    pub seq: i64,

    #[sea_orm(unique)]
    pub team_code: String,

    #[sea_orm(unique)]
    pub name: String,

    pub captain_email: String,

    pub status: RegistrationStatus,

    /// Unix epoch in milliseconds
    pub created_at: i64,

    /// Unix epoch in milliseconds
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
