//! `SeaORM` Entity for the subscriptions table (price-drop alerts).
//!
//! The table is owned and migrated by the site's HTTP process; this job
//! only reads matching rows and stamps `last_notified_at`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub product_key: String,
    pub email: String,
    pub threshold_pct: f64,
    pub active: bool,
    #[sea_orm(unique)]
    pub unsubscribe_token: String,
    pub created_at: Option<DateTime>,
    pub last_notified_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
