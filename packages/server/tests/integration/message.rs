use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::{Value, json};
use server::entity::{message, message_attachment, message_text, user_reply};

use crate::common::{TestApp, routes};

/// A user token and a channel with its opening message.
async fn channel_fixture(app: &TestApp) -> (String, i64) {
    let token = app.create_authenticated_user("ann@example.com").await;
    let ws = app.create_workspace(&token, "Drive").await;
    let channel = app
        .create_channel(&token, ws["id"].as_i64().unwrap(), "Floptical Question")
        .await;
    (token, channel["id"].as_i64().unwrap())
}

async fn num_messages(app: &TestApp, token: &str, channel_id: i64) -> Value {
    let res = app.get_with_token(&routes::channel(channel_id), token).await;
    assert_eq!(res.status, 200, "{}", res.text);
    res.body["num_messages"].clone()
}

/// Row counts of every table a reply writes to.
async fn reply_rows(app: &TestApp) -> [u64; 4] {
    [
        message::Entity::find().count(&app.db).await.unwrap(),
        message_text::Entity::find().count(&app.db).await.unwrap(),
        user_reply::Entity::find().count(&app.db).await.unwrap(),
        message_attachment::Entity::find().count(&app.db).await.unwrap(),
    ]
}

mod create {
    use super::*;

    #[tokio::test]
    async fn reply_bumps_the_channel_count() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;

        let msg = app.create_message(&token, channel_id, "Anyone?").await;

        assert_eq!(msg["body"], "Anyone?");
        assert_eq!(msg["channel_id"], channel_id);
        assert_eq!(msg["num_likes"], 0);
        assert_eq!(msg["texts"].as_array().unwrap().len(), 1);
        assert_eq!(msg["attachments"], json!([]));
        assert_eq!(num_messages(&app, &token, channel_id).await, 2);
    }

    #[tokio::test]
    async fn attachment_is_stored_with_the_message() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;

        let res = app
            .post_with_token(
                routes::MESSAGES,
                &json!({
                    "channel": channel_id,
                    "body": "Spec sheet attached",
                    "attachment": "s3://agora/floptical.pdf",
                }),
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        let attachments = res.body["attachments"].as_array().unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0]["attachment"], "s3://agora/floptical.pdf");
    }

    #[tokio::test]
    async fn missing_channel_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("ann@example.com").await;

        let res = app
            .post_with_token(
                routes::MESSAGES,
                &json!({"channel": 424242, "body": "Hello?"}),
                &token,
            )
            .await;

        res.assert_error(404, "1005");
        let listed = app.get_with_token(routes::MESSAGES, &token).await;
        assert_eq!(listed.body["items"], json!([]));
    }

    #[tokio::test]
    async fn failure_after_earlier_inserts_rolls_back_the_reply() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;
        let before = reply_rows(&app).await;
        // Message, text, attachment and channel counter are all written
        // before the reply row.
        app.fail_inserts_into("user_reply").await;

        let res = app
            .post_with_token(
                routes::MESSAGES,
                &json!({"channel": channel_id, "body": "Anyone?", "attachment": "a.pdf"}),
                &token,
            )
            .await;

        res.assert_error(500, "1007");
        assert_eq!(reply_rows(&app).await, before);
        assert_eq!(num_messages(&app, &token, channel_id).await, 1);
    }

    #[tokio::test]
    async fn blank_body_is_bad_input() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;

        let res = app
            .post_with_token(
                routes::MESSAGES,
                &json!({"channel": channel_id, "body": "   "}),
                &token,
            )
            .await;

        res.assert_error(402, "1003");
        assert_eq!(num_messages(&app, &token, channel_id).await, 1);
    }

    #[tokio::test]
    async fn concurrent_replies_keep_the_count_consistent() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;

        let posts = (0..8).map(|i| {
            let body = json!({"channel": channel_id, "body": format!("reply {i}")});
            let app = &app;
            let token = &token;
            async move { app.post_with_token(routes::MESSAGES, &body, token).await }
        });
        let results = futures::future::join_all(posts).await;

        let created = results.iter().filter(|r| r.status == 201).count() as i64;
        for res in results.iter().filter(|r| r.status != 201) {
            // Serialization failures surface as retryable conflicts.
            res.assert_error(409, "1006");
        }
        assert!(created > 0);
        assert_eq!(num_messages(&app, &token, channel_id).await, created + 1);

        let listed = app
            .get_with_token(
                &format!("{}?limit=100", routes::channel_messages(channel_id)),
                &token,
            )
            .await;
        assert_eq!(
            listed.body["items"].as_array().unwrap().len() as i64,
            created + 1
        );
    }
}

mod edit {
    use super::*;

    #[tokio::test]
    async fn new_body_is_appended_as_a_version() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;
        let msg = app.create_message(&token, channel_id, "Anyone?").await;
        let path = routes::message(msg["id"].as_i64().unwrap());

        let res = app
            .put_with_token(&path, &json!({"body": "Anyone at all?"}), &token)
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["body"], "Anyone at all?");
        let texts: Vec<&str> = res.body["texts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["body"].as_str().unwrap())
            .collect();
        assert_eq!(texts, vec!["Anyone?", "Anyone at all?"]);

        let fetched = app.get_with_token(&path, &token).await;
        assert_eq!(fetched.body["body"], "Anyone at all?");
    }

    #[tokio::test]
    async fn new_attachment_replaces_the_old_one() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;
        let res = app
            .post_with_token(
                routes::MESSAGES,
                &json!({"channel": channel_id, "body": "See file", "attachment": "old.pdf"}),
                &token,
            )
            .await;
        let path = routes::message(res.id());

        let res = app
            .put_with_token(&path, &json!({"attachment": "new.pdf"}), &token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        let attachments = res.body["attachments"].as_array().unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0]["attachment"], "new.pdf");
        assert_eq!(res.body["body"], "See file");

        let res = app
            .put_with_token(&path, &json!({"attachment": ""}), &token)
            .await;
        assert_eq!(res.body["attachments"], json!([]));
    }

    #[tokio::test]
    async fn empty_edit_is_bad_input() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;
        let msg = app.create_message(&token, channel_id, "Anyone?").await;

        app.put_with_token(&routes::message(msg["id"].as_i64().unwrap()), &json!({}), &token)
            .await
            .assert_error(402, "1003");
    }

    #[tokio::test]
    async fn only_the_author_or_staff_may_edit() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;
        let other = app.create_authenticated_user("bob@example.com").await;
        let admin = app.create_user_with_role("root@example.com", "admin").await;
        let msg = app.create_message(&token, channel_id, "Anyone?").await;
        let path = routes::message(msg["id"].as_i64().unwrap());

        app.put_with_token(&path, &json!({"body": "Hijacked"}), &other)
            .await
            .assert_error(403, "1004");

        let res = app
            .put_with_token(&path, &json!({"body": "Moderated"}), &admin)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["body"], "Moderated");
    }
}

mod reactions {
    use super::*;

    #[tokio::test]
    async fn a_user_likes_a_message_once() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;
        let bob = app.create_authenticated_user("bob@example.com").await;
        let msg = app.create_message(&token, channel_id, "Anyone?").await;
        let path = routes::message_like(msg["id"].as_i64().unwrap());

        let res = app.post_with_token(&path, &json!({}), &bob).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["num_likes"], 1);

        app.post_with_token(&path, &json!({}), &bob)
            .await
            .assert_error(409, "1006");

        let res = app.post_with_token(&path, &json!({}), &token).await;
        assert_eq!(res.body["num_likes"], 2);
    }

    #[tokio::test]
    async fn votes_count_by_direction() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;
        let bob = app.create_authenticated_user("bob@example.com").await;
        let msg = app.create_message(&token, channel_id, "Anyone?").await;
        let path = routes::message_vote(msg["id"].as_i64().unwrap());

        let res = app
            .post_with_token(&path, &json!({"vote": "up"}), &token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        let res = app
            .post_with_token(&path, &json!({"vote": "down"}), &bob)
            .await;
        assert_eq!(res.body["num_upvotes"], 1);
        assert_eq!(res.body["num_downvotes"], 1);

        app.post_with_token(&path, &json!({"vote": "up"}), &bob)
            .await
            .assert_error(409, "1006");
        app.post_with_token(&path, &json!({"vote": "sideways"}), &bob)
            .await
            .assert_error(402, "1003");
    }

    #[tokio::test]
    async fn anonymous_get_is_rejected() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;
        let msg = app.create_message(&token, channel_id, "Anyone?").await;

        app.get_without_token(&routes::message(msg["id"].as_i64().unwrap()))
            .await
            .assert_error(401, "1001");
        app.get_without_token(routes::MESSAGES)
            .await
            .assert_error(401, "1001");
    }

    #[tokio::test]
    async fn anonymous_like_is_rejected() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;
        let msg = app.create_message(&token, channel_id, "Anyone?").await;

        app.post_without_token(
            &routes::message_like(msg["id"].as_i64().unwrap()),
            &json!({}),
        )
        .await
        .assert_error(401, "1001");
    }
}

mod removal {
    use super::*;

    #[tokio::test]
    async fn deleted_message_is_hidden_and_the_count_stays() {
        let app = TestApp::spawn().await;
        let (token, channel_id) = channel_fixture(&app).await;
        let moderator = app
            .create_user_with_role("mod@example.com", "moderator")
            .await;
        let msg = app.create_message(&token, channel_id, "Anyone?").await;
        let path = routes::message(msg["id"].as_i64().unwrap());

        app.delete_with_token(&path, &token)
            .await
            .assert_error(403, "1004");
        let res = app.delete_with_token(&path, &moderator).await;
        assert_eq!(res.status, 204, "{}", res.text);

        app.get_with_token(&path, &token)
            .await
            .assert_error(404, "1005");
        app.post_with_token(&routes::message_like(msg["id"].as_i64().unwrap()), &json!({}), &token)
            .await
            .assert_error(404, "1005");
        assert_eq!(num_messages(&app, &token, channel_id).await, 2);

        let shown = app.get_with_token(&routes::channel(channel_id), &token).await;
        assert_eq!(shown.body["messages"].as_array().unwrap().len(), 1);
    }
}
