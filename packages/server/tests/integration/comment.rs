use serde_json::json;

use crate::common::{TestApp, routes};

async fn reviewed_title(app: &TestApp) -> (i32, i32) {
    let admin = app
        .create_user_with_role("admin", "admin@example.com", "admin")
        .await;
    let alice = app
        .create_authenticated_user("alice", "alice@example.com")
        .await;
    let title_id = app.create_title(&admin, "Solaris").await;
    let review_id = app.create_review(title_id, &alice, 8).await;
    (title_id, review_id)
}

mod creation {
    use super::*;

    #[tokio::test]
    async fn authenticated_user_comments_on_a_review() {
        let app = TestApp::spawn().await;
        let (title_id, review_id) = reviewed_title(&app).await;
        let bob = app.create_authenticated_user("bob", "bob@example.com").await;

        let res = app
            .post_with_token(
                &routes::comments(title_id, review_id),
                &json!({"text": "Couldn't agree more."}),
                &bob,
            )
            .await;

        assert_eq!(res.status, 201);
        assert_eq!(res.body["author"], "bob");
        assert_eq!(res.body["text"], "Couldn't agree more.");
    }

    #[tokio::test]
    async fn requires_authentication_and_a_nonblank_text() {
        let app = TestApp::spawn().await;
        let (title_id, review_id) = reviewed_title(&app).await;

        let res = app
            .post_without_token(
                &routes::comments(title_id, review_id),
                &json!({"text": "Anonymous."}),
            )
            .await;
        assert_eq!(res.status, 401);

        let bob = app.create_authenticated_user("bob", "bob@example.com").await;
        let res = app
            .post_with_token(
                &routes::comments(title_id, review_id),
                &json!({"text": "   "}),
                &bob,
            )
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn no_uniqueness_rule_applies() {
        let app = TestApp::spawn().await;
        let (title_id, review_id) = reviewed_title(&app).await;
        let bob = app.create_authenticated_user("bob", "bob@example.com").await;

        app.create_comment(title_id, review_id, &bob).await;
        app.create_comment(title_id, review_id, &bob).await;

        let res = app
            .get_without_token(&routes::comments(title_id, review_id))
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["pagination"]["total"], 2);
    }
}

mod permissions {
    use super::*;

    #[tokio::test]
    async fn stranger_cannot_modify_anothers_comment() {
        let app = TestApp::spawn().await;
        let (title_id, review_id) = reviewed_title(&app).await;
        let bob = app.create_authenticated_user("bob", "bob@example.com").await;
        let comment_id = app.create_comment(title_id, review_id, &bob).await;
        let stranger = app
            .create_authenticated_user("eve", "eve@example.com")
            .await;

        let res = app
            .patch_with_token(
                &routes::comment(title_id, review_id, comment_id),
                &json!({"text": "Hijacked."}),
                &stranger,
            )
            .await;
        assert_eq!(res.status, 403);

        let res = app
            .delete_with_token(&routes::comment(title_id, review_id, comment_id), &stranger)
            .await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn author_moderator_and_admin_can_modify() {
        let app = TestApp::spawn().await;
        let (title_id, review_id) = reviewed_title(&app).await;
        let bob = app.create_authenticated_user("bob", "bob@example.com").await;
        let comment_id = app.create_comment(title_id, review_id, &bob).await;

        let res = app
            .patch_with_token(
                &routes::comment(title_id, review_id, comment_id),
                &json!({"text": "Edited by its author."}),
                &bob,
            )
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["text"], "Edited by its author.");

        let moderator = app
            .create_user_with_role("mod", "mod@example.com", "moderator")
            .await;
        let res = app
            .patch_with_token(
                &routes::comment(title_id, review_id, comment_id),
                &json!({"text": "Moderated."}),
                &moderator,
            )
            .await;
        assert_eq!(res.status, 200);

        let admin = app.obtain_token("admin").await;
        let res = app
            .delete_with_token(&routes::comment(title_id, review_id, comment_id), &admin)
            .await;
        assert_eq!(res.status, 204);

        let res = app
            .get_without_token(&routes::comment(title_id, review_id, comment_id))
            .await;
        assert_eq!(res.status, 404);
    }
}

mod nesting {
    use super::*;

    #[tokio::test]
    async fn comments_list_in_publication_order() {
        let app = TestApp::spawn().await;
        let (title_id, review_id) = reviewed_title(&app).await;
        let bob = app.create_authenticated_user("bob", "bob@example.com").await;
        let carol = app
            .create_authenticated_user("carol", "carol@example.com")
            .await;

        app.create_comment(title_id, review_id, &bob).await;
        app.create_comment(title_id, review_id, &carol).await;

        let res = app
            .get_without_token(&routes::comments(title_id, review_id))
            .await;
        assert_eq!(res.status, 200);

        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data[0]["author"], "bob");
        assert_eq!(data[1]["author"], "carol");
    }

    #[tokio::test]
    async fn lookups_are_scoped_to_the_nesting_chain() {
        let app = TestApp::spawn().await;
        let (title_id, review_id) = reviewed_title(&app).await;
        let bob = app.create_authenticated_user("bob", "bob@example.com").await;
        let comment_id = app.create_comment(title_id, review_id, &bob).await;

        let admin = app.obtain_token("admin").await;
        let other_title = app.create_title(&admin, "Stalker").await;
        let other_review = app.create_review(other_title, &bob, 6).await;

        // Right comment, wrong review in the path.
        let res = app
            .get_without_token(&routes::comment(other_title, other_review, comment_id))
            .await;
        assert_eq!(res.status, 404);

        // Right review, wrong title in the path.
        let res = app
            .get_without_token(&routes::comments(other_title, review_id))
            .await;
        assert_eq!(res.status, 404);
    }
}
