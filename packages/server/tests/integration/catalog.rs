use serde_json::json;

use crate::common::{TestApp, routes};

mod categories {
    use super::*;

    #[tokio::test]
    async fn reads_are_open_writes_are_admin_only() {
        let app = TestApp::spawn().await;
        let user = app
            .create_authenticated_user("alice", "alice@example.com")
            .await;
        let moderator = app
            .create_user_with_role("mod", "mod@example.com", "moderator")
            .await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;

        let res = app.get_without_token(routes::CATEGORIES).await;
        assert_eq!(res.status, 200);

        let body = json!({"name": "Movies", "slug": "movies"});
        let res = app.post_without_token(routes::CATEGORIES, &body).await;
        assert_eq!(res.status, 401);
        let res = app.post_with_token(routes::CATEGORIES, &body, &user).await;
        assert_eq!(res.status, 403);
        let res = app
            .post_with_token(routes::CATEGORIES, &body, &moderator)
            .await;
        assert_eq!(res.status, 403);

        let res = app.post_with_token(routes::CATEGORIES, &body, &admin).await;
        assert_eq!(res.status, 201);
        assert_eq!(res.body["slug"], "movies");
    }

    #[tokio::test]
    async fn slug_is_validated_and_unique() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;

        for slug in ["", "With Space", "UPPER", &"a".repeat(51)] {
            let res = app
                .post_with_token(
                    routes::CATEGORIES,
                    &json!({"name": "Movies", "slug": slug}),
                    &admin,
                )
                .await;
            assert_eq!(res.status, 400, "'{slug}' should be rejected");
        }

        app.create_category(&admin, "Movies", "movies").await;
        let res = app
            .post_with_token(
                routes::CATEGORIES,
                &json!({"name": "Films", "slug": "movies"}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn item_routes_resolve_by_slug() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;
        app.create_category(&admin, "Movies", "movies").await;

        let res = app.get_without_token(&routes::category("movies")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["name"], "Movies");

        let res = app.get_without_token(&routes::category("ghost")).await;
        assert_eq!(res.status, 404);

        let res = app
            .patch_with_token(
                &routes::category("movies"),
                &json!({"name": "Cinema"}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["name"], "Cinema");
        assert_eq!(res.body["slug"], "movies");
    }

    #[tokio::test]
    async fn list_searches_by_name() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;
        app.create_category(&admin, "Movies", "movies").await;
        app.create_category(&admin, "Books", "books").await;

        let res = app
            .get_without_token(&format!("{}?search=boo", routes::CATEGORIES))
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["pagination"]["total"], 1);
        assert_eq!(res.body["data"][0]["slug"], "books");
    }

    #[tokio::test]
    async fn deleting_a_category_uncategorizes_its_titles() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;
        app.create_category(&admin, "Books", "books").await;

        let res = app
            .post_with_token(
                routes::TITLES,
                &json!({"name": "Solaris", "year": 1961, "category": "books"}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 201);
        let title_id = res.id();
        assert_eq!(res.body["category"]["slug"], "books");

        let res = app
            .delete_with_token(&routes::category("books"), &admin)
            .await;
        assert_eq!(res.status, 204);

        let res = app.get_without_token(&routes::title(title_id)).await;
        assert_eq!(res.status, 200);
        assert!(res.body["category"].is_null());
    }
}

mod genres {
    use super::*;

    #[tokio::test]
    async fn crud_round_trip() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;

        app.create_genre(&admin, "Drama", "drama").await;

        let res = app.get_without_token(&routes::genre("drama")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["name"], "Drama");

        let res = app
            .post_with_token(
                routes::GENRES,
                &json!({"name": "Drama again", "slug": "drama"}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 409);

        let res = app
            .delete_with_token(&routes::genre("drama"), &admin)
            .await;
        assert_eq!(res.status, 204);
        let res = app.get_without_token(&routes::genre("drama")).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn writes_require_admin() {
        let app = TestApp::spawn().await;
        let user = app
            .create_authenticated_user("alice", "alice@example.com")
            .await;

        let res = app
            .post_with_token(
                routes::GENRES,
                &json!({"name": "Drama", "slug": "drama"}),
                &user,
            )
            .await;
        assert_eq!(res.status, 403);

        let res = app.delete_without_token(&routes::genre("drama")).await;
        assert_eq!(res.status, 401);
    }

    #[tokio::test]
    async fn deleting_a_genre_detaches_it_from_titles() {
        let app = TestApp::spawn().await;
        let admin = app
            .create_user_with_role("admin", "admin@example.com", "admin")
            .await;
        app.create_genre(&admin, "Satire", "satire").await;

        let res = app
            .post_with_token(
                routes::TITLES,
                &json!({"name": "Dead Souls", "year": 1842, "genre": ["satire"]}),
                &admin,
            )
            .await;
        assert_eq!(res.status, 201);
        let title_id = res.id();
        assert_eq!(res.body["genre"][0]["slug"], "satire");

        let res = app
            .delete_with_token(&routes::genre("satire"), &admin)
            .await;
        assert_eq!(res.status, 204);

        let res = app.get_without_token(&routes::title(title_id)).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["genre"].as_array().unwrap().len(), 0);
    }
}
