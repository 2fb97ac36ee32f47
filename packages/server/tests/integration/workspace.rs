use std::collections::HashSet;

use serde_json::json;

use crate::common::{TestApp, routes};

mod hierarchy {
    use super::*;

    #[tokio::test]
    async fn root_workspace_starts_at_level_zero_with_zero_counters() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;

        let ws = app.create_workspace(&token, "Drive").await;

        assert_eq!(ws["level"], 0);
        assert_eq!(ws["parent_id"], 0);
        assert_eq!(ws["num_chd"], 0);
        assert_eq!(ws["num_channels"], 0);
        assert_eq!(ws["num_views"], 0);
        assert_eq!(ws["status"], "active");
        assert_eq!(ws["uuid"].as_str().map(str::len), Some(36));
    }

    #[tokio::test]
    async fn child_creation_links_and_counts() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let root = app.create_workspace(&token, "Drive").await;
        let root_id = root["id"].as_i64().unwrap();

        let res = app
            .post_with_token(
                routes::WORKSPACE_CHILD_CREATE,
                &json!({"parent_id": root["uuid"], "name": "Floppy", "desc": "Floppy"}),
                &token,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        let child = &res.body["workspace"];
        assert_eq!(child["level"], 1);
        assert_eq!(child["parent_id"], root_id);
        assert_eq!(res.body["parent"]["num_chd"], 1);
        // Child, edge and parent counter share one timestamp tuple.
        assert_eq!(child["created_at"], res.body["parent"]["updated_at"]);

        let children = app
            .get_with_token(&routes::workspace_children(root_id), &token)
            .await;
        assert_eq!(children.status, 200, "{}", children.text);
        let ids: Vec<i64> = children
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![child["id"].as_i64().unwrap()]);

        let parent = app
            .get_with_token(
                &routes::workspace_parent(child["id"].as_i64().unwrap()),
                &token,
            )
            .await;
        assert_eq!(parent.status, 200, "{}", parent.text);
        assert_eq!(parent.body["id"], root_id);

        let top = app.get_with_token(routes::TOP_WORKSPACES, &token).await;
        let top_ids: Vec<i64> = top
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|w| w["id"].as_i64().unwrap())
            .collect();
        assert_eq!(top_ids, vec![root_id]);
    }

    #[tokio::test]
    async fn root_has_no_parent() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let root = app.create_workspace(&token, "Drive").await;

        let res = app
            .get_with_token(
                &routes::workspace_parent(root["id"].as_i64().unwrap()),
                &token,
            )
            .await;

        res.assert_error(404, "1005");
    }

    #[tokio::test]
    async fn child_of_a_deleted_parent_is_not_created() {
        let app = TestApp::spawn().await;
        let admin = app.create_user_with_role("root@example.com", "admin").await;
        let root = app.create_workspace(&admin, "Drive").await;
        let root_id = root["id"].as_i64().unwrap();
        let res = app.delete_with_token(&routes::workspace(root_id), &admin).await;
        assert_eq!(res.status, 204, "{}", res.text);

        let res = app
            .post_with_token(
                routes::WORKSPACE_CHILD_CREATE,
                &json!({"parent_id": root_id, "name": "Floppy", "desc": "Floppy"}),
                &admin,
            )
            .await;

        res.assert_error(404, "1005");
    }

    #[tokio::test]
    async fn recount_restores_the_child_count() {
        let app = TestApp::spawn().await;
        let admin = app.create_user_with_role("root@example.com", "admin").await;
        let root = app.create_workspace(&admin, "Drive").await;
        let root_id = root["id"].as_i64().unwrap();
        for name in ["Floppy", "Zip"] {
            let res = app
                .post_with_token(
                    routes::WORKSPACE_CHILD_CREATE,
                    &json!({"parent_id": root_id, "name": name, "desc": name}),
                    &admin,
                )
                .await;
            assert_eq!(res.status, 201, "{}", res.text);
        }

        let res = app
            .post_with_token(&routes::workspace_recount(root_id), &json!({}), &admin)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["num_chd"], 2);
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn name_length_boundaries() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;

        let ok = app
            .post_with_token(
                routes::WORKSPACES,
                &json!({"name": "a".repeat(50), "desc": "d"}),
                &token,
            )
            .await;
        assert_eq!(ok.status, 201, "{}", ok.text);

        for name in ["".to_string(), "a".repeat(51)] {
            let res = app
                .post_with_token(
                    routes::WORKSPACES,
                    &json!({"name": name, "desc": "d"}),
                    &token,
                )
                .await;
            res.assert_error(402, "1003");
        }
    }

    #[tokio::test]
    async fn create_requires_a_token() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(routes::WORKSPACES, &json!({"name": "Drive", "desc": "Drive"}))
            .await;

        res.assert_error(401, "1001");
    }

    #[tokio::test]
    async fn malformed_external_id_is_bad_input() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;

        let res = app
            .get_with_token(&routes::workspace("not-a-uuid"), &token)
            .await;

        res.assert_error(402, "1003");
    }
}

mod lookup {
    use super::*;

    #[tokio::test]
    async fn get_by_internal_and_external_id() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let ws = app.create_workspace(&token, "Drive").await;

        let by_id = app
            .get_with_token(&routes::workspace(ws["id"].as_i64().unwrap()), &token)
            .await;
        let by_uuid = app
            .get_with_token(&routes::workspace(ws["uuid"].as_str().unwrap()), &token)
            .await;

        assert_eq!(by_id.status, 200, "{}", by_id.text);
        assert_eq!(by_uuid.status, 200, "{}", by_uuid.text);
        assert_eq!(by_id.body, by_uuid.body);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;

        let res = app
            .get_with_token(
                &routes::workspace("67e55044-10b1-426f-9247-bb680e5fe0c8"),
                &token,
            )
            .await;

        res.assert_error(404, "1005");
    }

    #[tokio::test]
    async fn anonymous_reads_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let ws = app.create_workspace(&token, "Drive").await;
        let ws_id = ws["id"].as_i64().unwrap();

        for path in [
            routes::workspace(ws_id),
            routes::workspace_children(ws_id),
            routes::workspace_channels(ws_id),
            routes::WORKSPACES.to_string(),
            routes::TOP_WORKSPACES.to_string(),
        ] {
            app.get_without_token(&path)
                .await
                .assert_error(401, "1001");
        }
    }

    #[tokio::test]
    async fn channels_are_listed_with_the_workspace() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let ws = app.create_workspace(&token, "Drive").await;
        let ws_id = ws["id"].as_i64().unwrap();

        let empty = app
            .get_with_token(&routes::workspace_channels(ws_id), &token)
            .await;
        assert_eq!(empty.status, 200, "{}", empty.text);
        assert_eq!(empty.body["channels"], json!([]));

        app.create_channel(&token, ws_id, "Floptical Question").await;
        let res = app
            .get_with_token(&routes::workspace_channels(ws_id), &token)
            .await;
        assert_eq!(res.body["channels"].as_array().unwrap().len(), 1);
        assert_eq!(res.body["workspace"]["num_channels"], 1);
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn cursor_walk_covers_every_row_once() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let mut created = HashSet::new();
        for i in 0..5 {
            let ws = app.create_workspace(&token, &format!("ws{i}")).await;
            created.insert(ws["id"].as_i64().unwrap());
        }

        let mut seen = Vec::new();
        let mut cursor = String::new();
        loop {
            let res = app
                .get_with_token(
                    &format!("{}?limit=2&cursor={cursor}", routes::WORKSPACES),
                    &token,
                )
                .await;
            assert_eq!(res.status, 200, "{}", res.text);
            seen.extend(
                res.body["items"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|w| w["id"].as_i64().unwrap()),
            );
            cursor = res.body["next_cursor"].as_str().unwrap().to_string();
            if cursor == "0" {
                break;
            }
            assert!(seen.len() <= created.len(), "cursor walk did not terminate");
        }

        let mut sorted = seen.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(seen, sorted, "pages must be newest first");
        assert_eq!(seen.iter().copied().collect::<HashSet<_>>(), created);
        assert_eq!(seen.len(), created.len());
    }

    #[tokio::test]
    async fn malformed_cursor_is_bad_input() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;

        let res = app
            .get_with_token(&format!("{}?cursor=%25%25", routes::WORKSPACES), &token)
            .await;

        res.assert_error(402, "1003");
    }
}

mod ownership {
    use super::*;

    #[tokio::test]
    async fn only_the_owner_or_staff_may_update() {
        let app = TestApp::spawn().await;
        let owner = app.create_authenticated_user("ann@example.com").await;
        let other = app.create_authenticated_user("bob@example.com").await;
        let moderator = app
            .create_user_with_role("mod@example.com", "moderator")
            .await;
        let ws = app.create_workspace(&owner, "Drive").await;
        let path = routes::workspace(ws["id"].as_i64().unwrap());
        let body = json!({"name": "Drives", "desc": "All drives"});

        app.put_with_token(&path, &body, &other)
            .await
            .assert_error(403, "1004");

        let res = app.put_with_token(&path, &body, &owner).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["name"], "Drives");

        let res = app.put_with_token(&path, &body, &moderator).await;
        assert_eq!(res.status, 200, "{}", res.text);
    }

    #[tokio::test]
    async fn members_cannot_delete_and_deleted_rows_disappear() {
        let app = TestApp::spawn().await;
        let member = app.create_authenticated_user("ann@example.com").await;
        let admin = app.create_user_with_role("root@example.com", "admin").await;
        let ws = app.create_workspace(&member, "Drive").await;
        let path = routes::workspace(ws["id"].as_i64().unwrap());

        app.delete_with_token(&path, &member)
            .await
            .assert_error(403, "1004");

        let res = app.delete_with_token(&path, &admin).await;
        assert_eq!(res.status, 204, "{}", res.text);

        app.get_with_token(&path, &member)
            .await
            .assert_error(404, "1005");
        app.delete_with_token(&path, &admin)
            .await
            .assert_error(404, "1005");
    }
}
