use sea_orm::entity::prelude::*;

/// A user account.
///
/// `password_hash` holds an argon2 PHC string and must never leave the
/// service boundary; API responses are built from a separate DTO.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    /// Admin principal flag.
    pub is_staff: bool,
    pub is_superuser: bool,
    /// Inactive accounts cannot authenticate.
    pub is_active: bool,
    pub date_joined: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
