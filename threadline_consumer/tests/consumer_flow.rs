use bytes::Bytes;
use rusqlite::Connection;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use threadline_consumer::config::MutationConfig;
use threadline_consumer::database::{Database, Repositories};
use threadline_consumer::mutations::MutationService;
use threadline_consumer::queue::consumer::state_channel;
use threadline_consumer::queue::{run_consume_loop, ChannelSource, ConsumerState, ConsumerStats};
use threadline_consumer::router::{Disposition, Router};
use tokio_util::sync::CancellationToken;

struct TestStore {
    dir: TempDir,
    database: Database,
}

impl TestStore {
    fn open(timeout: Duration) -> Self {
        let dir = tempdir().expect("tempdir");
        let database =
            Database::connect(&dir.path().join("threadline.db"), timeout).expect("open store");
        database.ensure_migrations().expect("migrations");
        Self { dir, database }
    }

    fn router(&self) -> Router {
        Router::new(MutationService::new(
            Arc::new(self.database.clone()),
            MutationConfig::default(),
        ))
    }

    fn repos(&self) -> Repositories<'_> {
        Repositories::new(&self.database)
    }
}

async fn source_with(payloads: &[&str]) -> ChannelSource {
    let (tx, source) = ChannelSource::channel(payloads.len().max(1));
    for payload in payloads {
        tx.send(Bytes::copy_from_slice(payload.as_bytes()))
            .await
            .expect("queue payload");
    }
    source
}

const MAX_DELIVERIES: u32 = 5;

async fn drain(router: Router, source: ChannelSource) -> ConsumerStats {
    let (state_tx, state_rx) = state_channel();
    let stats = run_consume_loop(source, router, MAX_DELIVERIES, CancellationToken::new(), state_tx)
        .await
        .expect("consumer loop");
    assert_eq!(*state_rx.borrow(), ConsumerState::Stopped);
    stats
}

#[tokio::test]
async fn social_flow_is_applied_end_to_end() {
    let store = TestStore::open(Duration::from_secs(5));
    let source = source_with(&[
        r#"{"action":"userRegister","Id":"alice","time":10}"#,
        r#"{"action":"userRegister","Id":"bob","time":11}"#,
        r#"{"action":"friendAdd","user":"alice","friend_list":["bob"]}"#,
        r#"{"action":"friendAdd","user":"bob","friend_list":["alice"]}"#,
        r#"{"action":"newThread","author":"alice","is_public":"true","content":"hello","time":20}"#,
        r#"{"action":"threadLike","thread_id":"1","user":"bob"}"#,
        r#"{"action":"threadLike","thread_id":"1","user":"bob"}"#,
        r#"{"action":"commentAdd","thread_id":"1","author":"bob","content":"hi back"}"#,
        r#"{"action":"commentLike","comment_id":"1","user":"alice"}"#,
        r#"{"action":"threadPin","thread_id":"1"}"#,
        r#"not json at all"#,
        r#"{"action":"threadLike","thread_id":"404","user":"bob"}"#,
    ])
    .await;
    let log = source.ack_log();
    let stats = drain(store.router(), source).await;

    assert_eq!(stats.received, 12);
    assert_eq!(stats.applied, 9);
    assert_eq!(stats.unknown, 1);
    assert_eq!(stats.rejected, 2);
    assert_eq!(stats.acked, 12);
    assert_eq!(stats.requeued, 0);
    assert_eq!(log.count(Disposition::Ack), 12);

    let repos = store.repos();
    let alice = repos.users().get("alice").unwrap().unwrap();
    let bob = repos.users().get("bob").unwrap().unwrap();
    assert_eq!(alice.friends, vec!["bob".to_string()]);
    assert_eq!(bob.friends, vec!["alice".to_string()]);
    assert_eq!(alice.written_threads, vec!["1".to_string()]);
    assert_eq!(bob.unread_threads, vec!["1".to_string()]);
    assert_eq!(bob.liked_threads, vec!["1".to_string()]);
    assert_eq!(bob.written_comments, vec!["1".to_string()]);
    assert_eq!(alice.liked_comments, vec!["1".to_string()]);

    let thread = repos.threads().get("1").unwrap().unwrap();
    assert_eq!(thread.author, "alice");
    assert_eq!(thread.pub_date, 20);
    assert_eq!(thread.likers, vec!["bob".to_string()]);
    assert_eq!(thread.comments, vec!["1".to_string()]);

    let comment = repos.comments().get("1").unwrap().unwrap();
    assert_eq!(comment.thread_id, "1");
    assert_eq!(comment.likers, vec!["alice".to_string()]);
}

#[tokio::test]
async fn documents_survive_reopening_the_store() {
    let store = TestStore::open(Duration::from_secs(5));
    let source = source_with(&[
        r#"{"action":"userRegister","Id":"carol"}"#,
        r#"{"action":"newThread","author":"carol","content":"persisted"}"#,
    ])
    .await;
    drain(store.router(), source).await;

    let reopened = Database::connect(&store.dir.path().join("threadline.db"), Duration::from_secs(1))
        .expect("reopen store");
    let repos = Repositories::new(&reopened);
    let thread = repos.threads().get("1").unwrap().expect("thread persisted");
    assert_eq!(thread.content, "persisted");
    assert!(thread.is_public);
    assert_eq!(repos.threads().next_id().unwrap(), "2");
}

#[tokio::test]
async fn locked_store_stops_the_consumer_without_losing_the_message() {
    let store = TestStore::open(Duration::from_millis(50));
    let blocker = Connection::open(store.dir.path().join("threadline.db")).expect("second connection");
    blocker.execute_batch("BEGIN IMMEDIATE;").expect("take write lock");

    let source = source_with(&[r#"{"action":"userRegister","Id":"dave"}"#]).await;
    let log = source.ack_log();
    let pending = source.redeliveries();
    let (state_tx, state_rx) = state_channel();
    let err = run_consume_loop(source, store.router(), 2, CancellationToken::new(), state_tx)
        .await
        .expect_err("exhausted deliveries are fatal");

    assert!(err.to_string().contains("2 deliveries"));
    assert_eq!(*state_rx.borrow(), ConsumerState::Stopped);
    assert_eq!(log.count(Disposition::Requeue), 2);
    assert_eq!(log.count(Disposition::Ack), 0);
    assert_eq!(pending.payloads().len(), 1);
    assert!(store.repos().users().get("dave").unwrap().is_none());

    // Once the lock is gone the same message applies on the next run.
    blocker.execute_batch("ROLLBACK;").expect("release write lock");
    let (tx, source) = ChannelSource::channel(1);
    for payload in pending.payloads() {
        tx.send(payload).await.expect("queue payload");
    }
    drop(tx);
    let stats = drain(store.router(), source).await;
    assert_eq!(stats.applied, 1);
    assert!(store.repos().users().get("dave").unwrap().is_some());
}

#[tokio::test]
async fn shutdown_is_observable_through_state_changes() {
    let store = TestStore::open(Duration::from_secs(5));
    let (tx, source) = ChannelSource::channel(4);
    let shutdown = CancellationToken::new();
    let (state_tx, mut state_rx) = state_channel();
    assert_eq!(*state_rx.borrow(), ConsumerState::Starting);

    let consumer = tokio::spawn(run_consume_loop(
        source,
        store.router(),
        MAX_DELIVERIES,
        shutdown.clone(),
        state_tx,
    ));
    tx.send(Bytes::from_static(br#"{"action":"userRegister","Id":"erin"}"#))
        .await
        .unwrap();
    state_rx
        .wait_for(|state| *state == ConsumerState::Running)
        .await
        .unwrap();

    // Let the queued message be handled before asking the loop to stop.
    for _ in 0..100 {
        if store.repos().users().get("erin").unwrap().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    shutdown.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(5), consumer)
        .await
        .expect("consumer stopped in time")
        .unwrap()
        .unwrap();
    assert_eq!(stats.applied, 1);
    assert_eq!(*state_rx.borrow(), ConsumerState::Stopped);
    drop(tx);
}
