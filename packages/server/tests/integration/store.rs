use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use server::error::AppError;
use server::store::{self, StoreResultExt, guard};
use tokio_util::sync::CancellationToken;

use crate::common::TestApp;

async fn marker_table(db: &DatabaseConnection) {
    db.execute_unprepared("CREATE TABLE finish_marker (id INTEGER PRIMARY KEY)")
        .await
        .expect("Failed to create finish_marker");
}

async fn marker_present(db: &DatabaseConnection, id: i32) -> bool {
    let row = db
        .query_one_raw(Statement::from_string(
            DbBackend::Postgres,
            format!("SELECT count(*) AS n FROM finish_marker WHERE id = {id}"),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "n").unwrap() == 1
}

/// Insert marker `id` in a transaction and hand it to `finish`.
async fn write_marker(
    db: &DatabaseConnection,
    cancel: &CancellationToken,
    id: i32,
) -> Result<i32, AppError> {
    let txn = store::begin(db, cancel).await.at(9000)?;
    let insert = format!("INSERT INTO finish_marker (id) VALUES ({id})");
    guard(cancel, txn.execute_unprepared(&insert))
        .await
        .at(9000)?;
    store::finish(txn, cancel, 9001, Ok(id)).await
}

#[tokio::test]
async fn finish_commits_the_transaction() {
    let app = TestApp::spawn().await;
    marker_table(&app.db).await;

    let res = write_marker(&app.db, &CancellationToken::new(), 1).await;

    assert_eq!(res.unwrap(), 1);
    assert!(marker_present(&app.db, 1).await);
}

#[tokio::test]
async fn cancellation_before_commit_rolls_back() {
    let app = TestApp::spawn().await;
    marker_table(&app.db).await;
    let cancel = CancellationToken::new();
    let txn = store::begin(&app.db, &cancel).await.unwrap();
    txn.execute_unprepared("INSERT INTO finish_marker (id) VALUES (1)")
        .await
        .unwrap();

    cancel.cancel();
    let err = store::finish(txn, &cancel, 9002, Ok(())).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(!marker_present(&app.db, 1).await);
}

#[tokio::test]
async fn reported_outcome_matches_what_was_committed() {
    let app = TestApp::spawn().await;
    marker_table(&app.db).await;

    // Cancellation races the commit; a landed commit must never be
    // reported as cancelled, and a cancelled one must leave no row.
    for id in 0..20 {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            trigger.cancel();
        });

        match write_marker(&app.db, &cancel, id).await {
            Ok(_) => assert!(marker_present(&app.db, id).await, "marker {id}"),
            Err(err) => {
                assert!(err.is_cancelled(), "{err:?}");
                assert!(!marker_present(&app.db, id).await, "marker {id}");
            }
        }
    }
}
