use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,

    /// One of: user, moderator, admin. All privilege checks go through
    /// `policy::Role`; no other code interprets this value.
    pub role: String,
    pub is_superuser: bool,
    /// False for self-registered accounts until the first token exchange.
    pub is_active: bool,

    #[sea_orm(has_many)]
    pub reviews: HasMany<super::review::Entity>,

    #[sea_orm(has_many)]
    pub comments: HasMany<super::comment::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
