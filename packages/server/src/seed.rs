use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::*;
use tracing::info;

use crate::config::AppConfig;
use crate::entity::{comment, review, user};
use crate::policy::Role;

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite indexes, so we create
/// them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Unique index backing the one-review-per-author-per-title rule. The
    // handlers' existence pre-check is only cosmetic; this constraint is
    // what rejects concurrent duplicates, so failing to create it is fatal.
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_review_author_title")
        .table(review::Entity)
        .col(review::Column::AuthorId)
        .col(review::Column::TitleId)
        .unique()
        .to_string(PostgresQueryBuilder);

    db.execute_unprepared(&stmt).await?;
    info!("Ensured unique index idx_review_author_title exists");

    // Composite index for comment listing:
    // SELECT * FROM comment WHERE review_id = ? ORDER BY pub_date
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_comment_review_pub_date")
        .table(comment::Entity)
        .col(comment::Column::ReviewId)
        .col(comment::Column::PubDate)
        .to_string(PostgresQueryBuilder);

    match db.execute_unprepared(&stmt).await {
        Ok(_) => {
            info!("Ensured index idx_comment_review_pub_date exists");
        }
        Err(e) => {
            tracing::warn!("Failed to create index idx_comment_review_pub_date: {}", e);
        }
    }

    Ok(())
}

/// Create the bootstrap administrator from config, if one is configured and
/// the username is still free.
pub async fn seed_admin(db: &DatabaseConnection, config: &AppConfig) -> Result<(), DbErr> {
    let Some(ref admin) = config.admin else {
        return Ok(());
    };

    let model = user::ActiveModel {
        username: Set(admin.username.clone()),
        email: Set(admin.email.clone()),
        role: Set(Role::Admin.as_str().to_string()),
        is_superuser: Set(true),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let result = user::Entity::insert(model)
        .on_conflict(
            sea_orm::sea_query::OnConflict::column(user::Column::Username)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await;

    match result {
        Ok(_) => {
            info!(username = %admin.username, "Seeded bootstrap admin account");
            Ok(())
        }
        Err(DbErr::RecordNotInserted) => Ok(()),
        Err(e) => Err(e),
    }
}
