use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Enum representing the fixed set of roles a user can hold.
///
/// Identity (email, name) comes from the external identity provider; the
/// role is assigned here as metadata and drives route access.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// CEO/top administrator with full management rights.
    #[sea_orm(string_value = "PDG")]
    Pdg,
    /// Deputy general director, same operational rights as PDG.
    #[sea_orm(string_value = "DGA")]
    Dga,
    /// Sales representative earning commission on validated orders.
    #[sea_orm(string_value = "REPRESENTANT")]
    Representant,
    /// Content designer authoring submitted works pending validation.
    #[sea_orm(string_value = "CONCEPTEUR")]
    Concepteur,
    #[sea_orm(string_value = "AUTEUR")]
    Auteur,
    /// Partner organization (bookstore/distributor) placing bulk orders.
    #[sea_orm(string_value = "PARTENAIRE")]
    Partenaire,
    #[sea_orm(string_value = "CLIENT")]
    Client,
}

impl UserRole {
    /// Management roles that may operate on any order or ledger record.
    pub fn is_management(&self) -> bool {
        matches!(self, UserRole::Pdg | UserRole::Dga)
    }

    /// Roles that can own works and receive royalties.
    pub fn is_creator(&self) -> bool {
        matches!(self, UserRole::Auteur | UserRole::Concepteur)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    #[sea_orm(has_one = "super::partner::Entity")]
    Partner,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::partner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!(UserRole::Pdg.to_string(), "PDG");
        assert_eq!(UserRole::Representant.to_string(), "REPRESENTANT");
        assert_eq!(UserRole::from_str("PARTENAIRE").unwrap(), UserRole::Partenaire);
    }

    #[test]
    fn management_and_creator_groups() {
        assert!(UserRole::Pdg.is_management());
        assert!(UserRole::Dga.is_management());
        assert!(!UserRole::Client.is_management());
        assert!(UserRole::Auteur.is_creator());
        assert!(UserRole::Concepteur.is_creator());
        assert!(!UserRole::Partenaire.is_creator());
    }
}
