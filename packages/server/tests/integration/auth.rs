use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

use laurel_server::entity::user;
use laurel_server::mailer::{MailError, Mailer};
use laurel_server::utils::confirmation;

use crate::common::{TEST_SECRET, TestApp, routes};

mod signup {
    use super::*;

    #[tokio::test]
    async fn new_user_receives_echo_and_is_stored_inactive() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({"username": "alice", "email": "alice@example.com"}),
            )
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["username"], "alice");
        assert_eq!(res.body["email"], "alice@example.com");
        // The code travels by email only.
        assert!(res.body["confirmation_code"].is_null());

        let stored = app.find_user("alice").await;
        assert_eq!(stored.role, "user");
        assert!(!stored.is_active);
        assert!(!stored.is_superuser);
    }

    #[tokio::test]
    async fn reserved_username_is_rejected_in_any_casing() {
        let app = TestApp::spawn().await;

        for name in ["me", "ME", "Me", "mE"] {
            let res = app
                .post_without_token(
                    routes::SIGNUP,
                    &json!({"username": name, "email": "me@example.com"}),
                )
                .await;

            assert_eq!(res.status, 400, "'{name}' should be rejected");
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn invalid_usernames_and_emails_are_rejected() {
        let app = TestApp::spawn().await;

        let cases = [
            json!({"username": "has space", "email": "a@x.com"}),
            json!({"username": "", "email": "a@x.com"}),
            json!({"username": "a".repeat(151), "email": "a@x.com"}),
            json!({"username": "alice", "email": "not-an-email"}),
            json!({"username": "alice", "email": "a@nodot"}),
            json!({"username": "alice", "email": ""}),
        ];
        for body in cases {
            let res = app.post_without_token(routes::SIGNUP, &body).await;
            assert_eq!(res.status, 400, "{body} should be rejected: {}", res.text);
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn repeating_signup_with_the_same_pair_is_idempotent() {
        let app = TestApp::spawn().await;
        let body = json!({"username": "alice", "email": "alice@example.com"});

        let first = app.post_without_token(routes::SIGNUP, &body).await;
        assert_eq!(first.status, 200, "First signup failed: {}", first.text);

        let second = app.post_without_token(routes::SIGNUP, &body).await;
        assert_eq!(second.status, 200, "Repeat signup failed: {}", second.text);

        let count = user::Entity::find()
            .filter(user::Column::Username.eq("alice"))
            .count(&app.db)
            .await
            .unwrap();
        assert_eq!(count, 1);

        // The re-issued code still verifies, so a lost mail is recoverable.
        let token = app.obtain_token("alice").await;
        assert!(!token.is_empty());
    }

    #[tokio::test]
    async fn email_belonging_to_another_user_is_a_conflict() {
        let app = TestApp::spawn().await;

        let first = app
            .post_without_token(
                routes::SIGNUP,
                &json!({"username": "alice", "email": "alice@example.com"}),
            )
            .await;
        assert_eq!(first.status, 200);

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({"username": "someone_else", "email": "alice@example.com"}),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn username_belonging_to_another_user_is_a_conflict() {
        let app = TestApp::spawn().await;

        let first = app
            .post_without_token(
                routes::SIGNUP,
                &json!({"username": "alice", "email": "alice@example.com"}),
            )
            .await;
        assert_eq!(first.status, 200);

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({"username": "alice", "email": "other@example.com"}),
            )
            .await;

        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
            Err(MailError::Transport("smtp unreachable".into()))
        }
    }

    #[tokio::test]
    async fn mail_failure_reports_a_warning_but_keeps_the_registration() {
        let app = TestApp::spawn_with_mailer(Arc::new(FailingMailer)).await;

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({"username": "alice", "email": "alice@example.com"}),
            )
            .await;

        assert_eq!(res.status, 200, "Signup should not abort: {}", res.text);
        assert!(res.body["warning"].is_string(), "expected a warning field");

        // The user row was committed before dispatch was attempted; the
        // account remains usable through a re-derived code.
        let token = app.obtain_token("alice").await;
        assert!(!token.is_empty());
    }
}

mod token {
    use super::*;

    #[tokio::test]
    async fn unknown_username_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::TOKEN,
                &json!({"username": "ghost", "confirmation_code": "1-abc"}),
            )
            .await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn wrong_code_is_rejected() {
        let app = TestApp::spawn().await;
        app.post_without_token(
            routes::SIGNUP,
            &json!({"username": "alice", "email": "alice@example.com"}),
        )
        .await;

        let res = app
            .post_without_token(
                routes::TOKEN,
                &json!({"username": "alice", "confirmation_code": "1-deadbeef"}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_CONFIRMATION_CODE");
    }

    #[tokio::test]
    async fn valid_code_yields_a_token_and_activates_the_account() {
        let app = TestApp::spawn().await;
        app.post_without_token(
            routes::SIGNUP,
            &json!({"username": "alice", "email": "alice@example.com"}),
        )
        .await;
        assert!(!app.find_user("alice").await.is_active);

        let code = app.issue_code("alice").await;
        let res = app
            .post_without_token(
                routes::TOKEN,
                &json!({"username": "alice", "confirmation_code": code}),
            )
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["username"], "alice");
        assert!(res.body["token"].is_string());
        assert!(app.find_user("alice").await.is_active);
    }

    #[tokio::test]
    async fn exchanging_a_code_invalidates_it_for_reuse() {
        let app = TestApp::spawn().await;
        app.post_without_token(
            routes::SIGNUP,
            &json!({"username": "alice", "email": "alice@example.com"}),
        )
        .await;

        let code = app.issue_code("alice").await;
        let body = json!({"username": "alice", "confirmation_code": code});

        let first = app.post_without_token(routes::TOKEN, &body).await;
        assert_eq!(first.status, 200);

        // Activation rewrote the row, so the fingerprint no longer matches.
        let second = app.post_without_token(routes::TOKEN, &body).await;
        assert_eq!(second.status, 400);
        assert_eq!(second.body["code"], "INVALID_CONFIRMATION_CODE");
    }

    #[tokio::test]
    async fn profile_mutation_invalidates_previously_issued_codes() {
        let app = TestApp::spawn().await;
        let token = app
            .create_authenticated_user("alice", "alice@example.com")
            .await;

        let stale_code = app.issue_code("alice").await;

        let res = app
            .patch_with_token(routes::ME, &json!({"bio": "now different"}), &token)
            .await;
        assert_eq!(res.status, 200);

        let res = app
            .post_without_token(
                routes::TOKEN,
                &json!({"username": "alice", "confirmation_code": stale_code}),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_CONFIRMATION_CODE");

        // A freshly derived code works against the new state.
        let fresh = app.obtain_token("alice").await;
        assert!(!fresh.is_empty());
    }

    #[tokio::test]
    async fn expired_code_is_rejected() {
        let app = TestApp::spawn().await;
        app.post_without_token(
            routes::SIGNUP,
            &json!({"username": "alice", "email": "alice@example.com"}),
        )
        .await;

        let db_user = app.find_user("alice").await;
        let old = chrono::Utc::now() - chrono::Duration::hours(25);
        let code = confirmation::issue(&db_user, TEST_SECRET, old);

        let res = app
            .post_without_token(
                routes::TOKEN,
                &json!({"username": "alice", "confirmation_code": code}),
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "INVALID_CONFIRMATION_CODE");
    }
}

mod end_to_end {
    use super::*;

    #[tokio::test]
    async fn signup_token_review_duplicate_flow() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;
        let title_id = app.create_title(&admin, "The Master and Margarita").await;

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({"username": "alice", "email": "a@x.com"}),
            )
            .await;
        assert_eq!(res.status, 200);

        let token = app.obtain_token("alice").await;

        let res = app
            .post_with_token(
                &routes::reviews(title_id),
                &json!({"text": "Superb.", "score": 10}),
                &token,
            )
            .await;
        assert_eq!(res.status, 201);

        let res = app
            .post_with_token(
                &routes::reviews(title_id),
                &json!({"text": "Changed my mind.", "score": 3}),
                &token,
            )
            .await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }
}
