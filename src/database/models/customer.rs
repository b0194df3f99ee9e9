//! `SeaORM` Entity for customers owning rental orders

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "customer")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::rental_order::Entity")]
    RentalOrder,
}

impl Related<super::rental_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RentalOrder.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Email address to notify, if the customer has a usable one on file.
    #[must_use]
    pub fn contact_email(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}
