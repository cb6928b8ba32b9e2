use serde_json::json;

use crate::common::{TestApp, routes};

mod own_profile {
    use super::*;

    #[tokio::test]
    async fn requires_a_token() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::ME).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");

        let res = app.get_with_token(routes::ME, "not-a-jwt").await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn returns_the_callers_profile() {
        let app = TestApp::spawn().await;
        let token = app
            .create_authenticated_user("alice", "alice@example.com")
            .await;

        let res = app.get_with_token(routes::ME, &token).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["username"], "alice");
        assert_eq!(res.body["email"], "alice@example.com");
        assert_eq!(res.body["role"], "user");
    }

    #[tokio::test]
    async fn patch_updates_profile_fields() {
        let app = TestApp::spawn().await;
        let token = app
            .create_authenticated_user("alice", "alice@example.com")
            .await;

        let res = app
            .patch_with_token(
                routes::ME,
                &json!({"first_name": "Alice", "bio": "Reader of satire."}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["first_name"], "Alice");
        assert_eq!(res.body["bio"], "Reader of satire.");
        // Untouched fields stay as they were.
        assert_eq!(res.body["username"], "alice");
    }

    #[tokio::test]
    async fn client_supplied_role_is_silently_ignored() {
        let app = TestApp::spawn().await;
        let token = app
            .create_authenticated_user("alice", "alice@example.com")
            .await;

        let res = app
            .patch_with_token(
                routes::ME,
                &json!({"role": "admin", "bio": "still just me"}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["role"], "user");
        assert_eq!(app.find_user("alice").await.role, "user");

        // And the ignored field grants nothing: catalog writes stay closed.
        let res = app
            .post_with_token(
                routes::CATEGORIES,
                &json!({"name": "Movies", "slug": "movies"}),
                &token,
            )
            .await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn username_change_must_not_collide() {
        let app = TestApp::spawn().await;
        app.create_authenticated_user("bob", "bob@example.com")
            .await;
        let token = app
            .create_authenticated_user("alice", "alice@example.com")
            .await;

        let res = app
            .patch_with_token(routes::ME, &json!({"username": "bob"}), &token)
            .await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");

        let res = app
            .patch_with_token(routes::ME, &json!({"username": "me"}), &token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod directory {
    use super::*;

    #[tokio::test]
    async fn only_admins_may_even_look() {
        let app = TestApp::spawn().await;
        let user = app
            .create_authenticated_user("alice", "alice@example.com")
            .await;
        let moderator = app
            .create_user_with_role("mod", "mod@example.com", "moderator")
            .await;

        let res = app.get_without_token(routes::USERS).await;
        assert_eq!(res.status, 401);

        for token in [&user, &moderator] {
            let res = app.get_with_token(routes::USERS, token).await;
            assert_eq!(res.status, 403);
            assert_eq!(res.body["code"], "PERMISSION_DENIED");

            // Existence of a username is not probeable either.
            let res = app.get_with_token(&routes::user("alice"), token).await;
            assert_eq!(res.status, 403);
        }
    }

    #[tokio::test]
    async fn superuser_flag_grants_admin_privilege() {
        use laurel_server::entity::user;
        use sea_orm::{EntityTrait, Set};

        let app = TestApp::spawn().await;
        app.create_authenticated_user("root", "root@example.com")
            .await;

        let db_user = app.find_user("root").await;
        let mut active: user::ActiveModel = db_user.into();
        active.is_superuser = Set(true);
        user::Entity::update(active)
            .exec(&app.db)
            .await
            .expect("Failed to set superuser flag");
        let token = app.obtain_token("root").await;

        let res = app.get_with_token(routes::USERS, &token).await;
        assert_eq!(res.status, 200, "{}", res.text);
    }

    #[tokio::test]
    async fn admin_lists_users_with_search_and_pagination() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;
        app.create_authenticated_user("alice", "alice@example.com")
            .await;
        app.create_authenticated_user("bob", "bob@example.com")
            .await;

        let res = app.get_with_token(routes::USERS, &admin).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["pagination"]["total"], 3);

        let res = app
            .get_with_token(&format!("{}?search=ALI", routes::USERS), &admin)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["pagination"]["total"], 1);
        assert_eq!(res.body["data"][0]["username"], "alice");

        let res = app
            .get_with_token(&format!("{}?page=2&per_page=2", routes::USERS), &admin)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["data"].as_array().unwrap().len(), 1);
        assert_eq!(res.body["pagination"]["total_pages"], 2);
    }

    #[tokio::test]
    async fn admin_creates_an_active_user_with_a_role() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;

        let res = app
            .post_with_token(
                routes::USERS,
                &json!({"username": "mod", "email": "mod@example.com", "role": "moderator"}),
                &admin,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["role"], "moderator");

        let stored = app.find_user("mod").await;
        assert!(stored.is_active, "admin-created accounts skip confirmation");

        // Duplicates are conflicts, same as signup.
        let res = app
            .post_with_token(
                routes::USERS,
                &json!({"username": "mod", "email": "other@example.com"}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 409);
    }

    #[tokio::test]
    async fn admin_promotes_a_user_and_it_takes_effect_immediately() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;
        let alice = app
            .create_authenticated_user("alice", "alice@example.com")
            .await;

        let res = app
            .patch_with_token(&routes::user("alice"), &json!({"role": "admin"}), &admin)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["role"], "admin");

        // The old bearer token picks up the new role on the next request;
        // identity is resolved per request.
        let res = app
            .post_with_token(
                routes::CATEGORIES,
                &json!({"name": "Movies", "slug": "movies"}),
                &alice,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
    }

    #[tokio::test]
    async fn admin_gets_and_deletes_users_by_username() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;
        app.create_authenticated_user("alice", "alice@example.com")
            .await;

        let res = app.get_with_token(&routes::user("alice"), &admin).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["email"], "alice@example.com");

        let res = app.get_with_token(&routes::user("ghost"), &admin).await;
        assert_eq!(res.status, 404);

        let res = app.delete_with_token(&routes::user("alice"), &admin).await;
        assert_eq!(res.status, 204);

        let res = app.get_with_token(&routes::user("alice"), &admin).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn deleting_a_user_removes_their_contributions() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;
        let alice = app
            .create_authenticated_user("alice", "alice@example.com")
            .await;
        let title_id = app.create_title(&admin, "Solaris").await;
        let review_id = app.create_review(title_id, &alice, 8).await;
        app.create_comment(title_id, review_id, &alice).await;

        let res = app.delete_with_token(&routes::user("alice"), &admin).await;
        assert_eq!(res.status, 204);

        let res = app
            .get_without_token(&routes::review(title_id, review_id))
            .await;
        assert_eq!(res.status, 404);

        // With the only review gone the rating is back to null.
        let res = app.get_without_token(&routes::title(title_id)).await;
        assert_eq!(res.status, 200);
        assert!(res.body["rating"].is_null());
    }
}
