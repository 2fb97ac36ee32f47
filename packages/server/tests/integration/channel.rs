use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use server::entity::{channel, channels_user, message, message_text};

use crate::common::{TestApp, routes};

mod create {
    use super::*;

    #[tokio::test]
    async fn initial_message_is_posted_with_the_channel() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let ws = app.create_workspace(&token, "Drive").await;
        let ws_id = ws["id"].as_i64().unwrap();

        let channel = app.create_channel(&token, ws_id, "Floptical Question").await;

        assert_eq!(channel["num_messages"], 1);
        assert_eq!(channel["workspace_id"], ws_id);
        assert_eq!(channel["num_tags"], 0);
        assert_eq!(channel["tags"], json!([]));

        let ws = app.get_with_token(&routes::workspace(ws_id), &token).await;
        assert_eq!(ws.body["num_channels"], 1);

        let shown = app
            .get_with_token(&routes::channel(channel["id"].as_i64().unwrap()), &token)
            .await;
        let messages = shown.body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0]["body"],
            "Hi. I am looking into buying a floptical drive."
        );
    }

    #[tokio::test]
    async fn channel_without_initial_message_starts_empty() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let ws = app.create_workspace(&token, "Drive").await;

        let res = app
            .post_with_token(
                routes::CHANNELS,
                &json!({
                    "workspace": ws["uuid"],
                    "name": "Quiet",
                    "desc": "Nothing yet",
                    "tags": [" drives ", "floptical"],
                }),
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["num_messages"], 0);
        assert_eq!(res.body["num_tags"], 2);
        assert_eq!(res.body["tags"], json!(["drives", "floptical"]));
    }

    #[tokio::test]
    async fn too_many_tags_is_bad_input() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let ws = app.create_workspace(&token, "Drive").await;
        let tags: Vec<String> = (0..11).map(|i| format!("t{i}")).collect();

        let res = app
            .post_with_token(
                routes::CHANNELS,
                &json!({"workspace": ws["id"], "name": "Tagged", "desc": "d", "tags": tags}),
                &token,
            )
            .await;

        res.assert_error(402, "1003");
    }

    #[tokio::test]
    async fn missing_workspace_leaves_nothing_behind() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;

        let res = app
            .post_with_token(
                routes::CHANNELS,
                &json!({"workspace": 424242, "name": "Orphan", "desc": "d", "body": "Hi."}),
                &token,
            )
            .await;
        res.assert_error(404, "1005");

        let listed = app.get_with_token(routes::CHANNELS, &token).await;
        assert_eq!(listed.status, 200, "{}", listed.text);
        assert_eq!(listed.body["items"], json!([]));
        assert_eq!(listed.body["next_cursor"], "0");
        let messages = app.get_with_token(routes::MESSAGES, &token).await;
        assert_eq!(messages.body["items"], json!([]));
    }

    #[tokio::test]
    async fn failure_in_the_initial_message_rolls_back_the_channel() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let ws = app.create_workspace(&token, "Drive").await;
        let ws_id = ws["id"].as_i64().unwrap();
        // Channel, workspace counter, message and text all land before the
        // reply row of the opening message.
        app.fail_inserts_into("user_reply").await;

        let res = app
            .post_with_token(
                routes::CHANNELS,
                &json!({"workspace": ws_id, "name": "Doomed", "desc": "d", "body": "Hi."}),
                &token,
            )
            .await;
        res.assert_error(500, "1007");

        assert_eq!(channel::Entity::find().count(&app.db).await.unwrap(), 0);
        assert_eq!(channels_user::Entity::find().count(&app.db).await.unwrap(), 0);
        assert_eq!(message::Entity::find().count(&app.db).await.unwrap(), 0);
        assert_eq!(message_text::Entity::find().count(&app.db).await.unwrap(), 0);
        let ws = app.get_with_token(&routes::workspace(ws_id), &token).await;
        assert_eq!(ws.body["num_channels"], 0);
    }

    #[tokio::test]
    async fn anonymous_create_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::CHANNELS,
                &json!({"workspace": 1, "name": "Nope", "desc": "d"}),
            )
            .await;

        res.assert_error(401, "1001");
    }
}

mod show {
    use super::*;

    #[tokio::test]
    async fn repeated_views_update_the_read_state() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let ws = app.create_workspace(&token, "Drive").await;
        let channel = app
            .create_channel(&token, ws["id"].as_i64().unwrap(), "Floptical Question")
            .await;
        let path = routes::channel(channel["id"].as_i64().unwrap());

        let first = app.get_with_token(&path, &token).await;
        assert_eq!(first.status, 200, "{}", first.text);
        assert_eq!(first.body["read_state"]["num_views"], 1);
        assert_eq!(first.body["read_state"]["num_messages"], 1);

        let second = app.get_with_token(&path, &token).await;
        assert_eq!(second.body["read_state"]["num_views"], 2);
        assert_eq!(second.body["read_state"]["num_messages"], 1);
    }

    #[tokio::test]
    async fn read_state_tracks_new_messages() {
        let app = TestApp::spawn().await;
        let ann = app.create_authenticated_user("ann@example.com").await;
        let bob = app.create_authenticated_user("bob@example.com").await;
        let ws = app.create_workspace(&ann, "Drive").await;
        let channel = app
            .create_channel(&ann, ws["id"].as_i64().unwrap(), "Floptical Question")
            .await;
        let channel_id = channel["id"].as_i64().unwrap();
        let path = routes::channel(channel_id);

        app.get_with_token(&path, &bob).await;
        app.create_message(&ann, channel_id, "Anyone?").await;
        let res = app.get_with_token(&path, &bob).await;

        assert_eq!(res.body["read_state"]["num_views"], 2);
        assert_eq!(res.body["read_state"]["num_messages"], 2);
        assert_eq!(res.body["messages"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn anonymous_reads_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let ws = app.create_workspace(&token, "Drive").await;
        let ws_id = ws["id"].as_i64().unwrap();
        let channel = app.create_channel(&token, ws_id, "Floptical Question").await;
        let channel_id = channel["id"].as_i64().unwrap();

        for path in [
            routes::channel(channel["uuid"].as_str().unwrap()),
            routes::channel_messages(channel_id),
            routes::channel_by_name(ws_id, "Floptical Question"),
            routes::CHANNELS.to_string(),
        ] {
            let res = app.get_without_token(&path).await;
            res.assert_error(401, "1001");
            assert!(res.body.get("read_state").is_none(), "{path}");
        }
    }

    #[tokio::test]
    async fn unknown_channel_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;

        app.get_with_token(&routes::channel(424242), &token)
            .await
            .assert_error(404, "1005");
    }
}

mod lookup {
    use super::*;

    #[tokio::test]
    async fn channel_is_found_by_name_within_its_workspace() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let drive = app.create_workspace(&token, "Drive").await;
        let other = app.create_workspace(&token, "Other").await;
        let channel = app
            .create_channel(&token, drive["id"].as_i64().unwrap(), "floptical")
            .await;

        let res = app
            .get_with_token(
                &routes::channel_by_name(drive["id"].as_i64().unwrap(), "floptical"),
                &token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["id"], channel["id"]);

        app.get_with_token(
            &routes::channel_by_name(other["id"].as_i64().unwrap(), "floptical"),
            &token,
        )
        .await
        .assert_error(404, "1005");
    }

    #[tokio::test]
    async fn messages_of_a_channel_are_listed_newest_first() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;
        let ws = app.create_workspace(&token, "Drive").await;
        let ws_id = ws["id"].as_i64().unwrap();
        let channel = app.create_channel(&token, ws_id, "Floptical Question").await;
        let channel_id = channel["id"].as_i64().unwrap();
        let noise = app.create_channel(&token, ws_id, "Noise").await;
        let reply = app.create_message(&token, channel_id, "Anyone?").await;
        app.create_message(&token, noise["id"].as_i64().unwrap(), "Elsewhere")
            .await;

        let res = app
            .get_with_token(&routes::channel_messages(channel_id), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        let items = res.body["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], reply["id"]);
        assert!(items.iter().all(|m| m["channel_id"] == channel_id));
    }
}

mod ownership {
    use super::*;

    #[tokio::test]
    async fn update_replaces_tags_for_the_owner_only() {
        let app = TestApp::spawn().await;
        let owner = app.create_authenticated_user("ann@example.com").await;
        let other = app.create_authenticated_user("bob@example.com").await;
        let ws = app.create_workspace(&owner, "Drive").await;
        let channel = app
            .create_channel(&owner, ws["id"].as_i64().unwrap(), "Floptical Question")
            .await;
        let path = routes::channel(channel["id"].as_i64().unwrap());
        let body = json!({"name": "Floptical", "desc": "Drives", "tags": ["hw"]});

        app.put_with_token(&path, &body, &other)
            .await
            .assert_error(403, "1004");

        let res = app.put_with_token(&path, &body, &owner).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["name"], "Floptical");
        assert_eq!(res.body["tags"], json!(["hw"]));
        assert_eq!(res.body["num_tags"], 1);
    }

    #[tokio::test]
    async fn deleted_channel_disappears() {
        let app = TestApp::spawn().await;
        let member = app.create_authenticated_user("ann@example.com").await;
        let moderator = app
            .create_user_with_role("mod@example.com", "moderator")
            .await;
        let ws = app.create_workspace(&member, "Drive").await;
        let channel = app
            .create_channel(&member, ws["id"].as_i64().unwrap(), "Floptical Question")
            .await;
        let path = routes::channel(channel["id"].as_i64().unwrap());

        app.delete_with_token(&path, &member)
            .await
            .assert_error(403, "1004");
        let res = app.delete_with_token(&path, &moderator).await;
        assert_eq!(res.status, 204, "{}", res.text);

        app.get_with_token(&path, &member)
            .await
            .assert_error(404, "1005");
        // Soft delete leaves the workspace counter alone.
        let ws = app
            .get_with_token(&routes::workspace(ws["id"].as_i64().unwrap()), &member)
            .await;
        assert_eq!(ws.body["num_channels"], 1);
    }
}
