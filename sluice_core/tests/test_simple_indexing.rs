use std::{sync::Arc, time::Duration};

use common::{ScriptedBackend, create_indexer, record};
use sluice_core::{ErrorKind, IndexerError, IndexerOptions, Record, Result, SubmitAck};

mod common;

fn default_options() -> IndexerOptions {
    IndexerOptions::default()
        .with_batch_size(2)
        .with_inactivity_timeout(Duration::from_secs(1))
}

#[tokio::test]
async fn test_size_and_inactivity_flush() -> Result<()> {
    tokio::time::pause();

    let backend = Arc::new(ScriptedBackend::new());
    let (task, client, observer, ct) = create_indexer(default_options(), backend.clone());
    let _ct_guard = ct.drop_guard();

    for id in ["1", "2", "3"] {
        let ack = client.submit(record(id)).await?;
        assert!(ack.is_accepted());
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.request_ids(), vec![vec!["1", "2"]]);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(backend.request_ids(), vec![vec!["1", "2"], vec!["3"]]);

    let stats = client.drain().await?;
    assert_eq!(stats.written, 3);
    assert_eq!(stats.indexed, 3);
    assert_eq!(stats.errored, 0);
    assert_eq!(stats.retries, 0);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.active_requests, 0);
    assert_eq!(stats.intake_ok, 3);

    assert!(observer.errors().is_empty());
    // One snapshot after each dispatch and one after each response.
    assert_eq!(observer.stats().len(), 4);

    drop(client);
    let final_stats = task.await.expect("indexer terminated");
    assert_eq!(final_stats, stats);

    Ok(())
}

#[tokio::test]
async fn test_submissions_restart_inactivity_timer() -> Result<()> {
    tokio::time::pause();

    let backend = Arc::new(ScriptedBackend::new());
    let options = default_options().with_batch_size(10);
    let (task, client, _observer, ct) = create_indexer(options, backend.clone());
    let _ct_guard = ct.drop_guard();

    client.submit(record("1")).await?;
    tokio::time::sleep(Duration::from_millis(900)).await;
    client.submit(record("2")).await?;

    // A second past the first record, but not past the second.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(backend.requests().is_empty());

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(backend.request_ids(), vec![vec!["1", "2"]]);

    drop(client);
    task.await.expect("indexer terminated");

    Ok(())
}

#[tokio::test]
async fn test_command_pair_mirrors_record() -> Result<()> {
    tokio::time::pause();

    let backend = Arc::new(ScriptedBackend::new());
    let (task, client, _observer, ct) = create_indexer(default_options(), backend.clone());
    let _ct_guard = ct.drop_guard();

    let record = Record::new(
        "books",
        "book",
        "dune",
        serde_json::json!({ "title": "Dune", "year": 1965 }),
    );
    client.submit(record.clone()).await?;
    client.drain().await?;

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let command = &requests[0][0];
    assert_eq!(command.action.index, "books");
    assert_eq!(command.action.doc_type, "book");
    assert_eq!(command.action.id, "dune");
    assert_eq!(command.document, record.data);

    drop(client);
    task.await.expect("indexer terminated");

    Ok(())
}

#[tokio::test]
async fn test_json_submissions() -> Result<()> {
    tokio::time::pause();

    let backend = Arc::new(ScriptedBackend::new());
    let (task, client, _observer, ct) = create_indexer(default_options(), backend.clone());
    let _ct_guard = ct.drop_guard();

    let ack = client
        .submit(r#"{"index":"books","type":"book","id":1,"data":{"title":"Dune"}}"#)
        .await?;
    assert!(ack.is_accepted());

    let stats = client.drain().await?;
    assert_eq!(stats.indexed, 1);
    assert_eq!(backend.request_ids(), vec![vec!["1"]]);

    drop(client);
    task.await.expect("indexer terminated");

    Ok(())
}

#[tokio::test]
async fn test_invalid_records_are_dropped() -> Result<()> {
    tokio::time::pause();

    let backend = Arc::new(ScriptedBackend::new());
    let (task, client, observer, ct) = create_indexer(default_options(), backend.clone());
    let _ct_guard = ct.drop_guard();

    let mut missing_index = record("1");
    missing_index.index = None;
    let mut missing_type = record("2");
    missing_type.doc_type = Some(String::new());
    let mut missing_id = record("3");
    missing_id.id = None;

    for record in [missing_index, missing_type, missing_id] {
        let ack = client.submit(record).await?;
        assert!(matches!(ack, SubmitAck::Rejected(_)));
    }

    let ack = client.submit("not json").await?;
    assert!(matches!(ack, SubmitAck::Rejected(IndexerError::Parse { .. })));

    let ack = client.submit(record("4")).await?;
    assert!(ack.is_accepted());

    let stats = client.drain().await?;
    assert_eq!(stats.written, 1);
    assert_eq!(stats.indexed, 1);
    assert_eq!(stats.intake_ok, 1);
    assert_eq!(stats.intake_error, 4);
    assert_eq!(backend.request_ids(), vec![vec!["4"]]);

    let errors = observer.errors();
    assert_eq!(errors.len(), 4);
    assert!(errors.iter().all(|e| e.kind() == ErrorKind::Input));
    assert!(matches!(errors[0], IndexerError::MissingIndexName { .. }));
    assert!(matches!(errors[1], IndexerError::MissingTypeName { .. }));
    assert!(matches!(errors[2], IndexerError::MissingDocumentId { .. }));

    drop(client);
    task.await.expect("indexer terminated");

    Ok(())
}

#[tokio::test]
async fn test_dropping_clients_drains() -> Result<()> {
    tokio::time::pause();

    let backend = Arc::new(ScriptedBackend::new());
    let options = default_options().with_inactivity_timeout(Duration::from_secs(3600));
    let (task, client, _observer, ct) = create_indexer(options, backend.clone());
    let _ct_guard = ct.drop_guard();

    for id in ["1", "2", "3", "4", "5"] {
        client.submit(record(id)).await?;
    }
    drop(client);

    let stats = task.await.expect("indexer terminated");
    assert_eq!(stats.written, 5);
    assert_eq!(stats.indexed, 5);
    assert_eq!(
        backend.request_ids(),
        vec![vec!["1", "2"], vec!["3", "4"], vec!["5"]]
    );

    Ok(())
}

#[tokio::test]
async fn test_cancellation_stops_indexer() -> Result<()> {
    tokio::time::pause();

    let backend = Arc::new(ScriptedBackend::new());
    let options = default_options().with_inactivity_timeout(Duration::from_secs(3600));
    let (task, client, _observer, ct) = create_indexer(options, backend.clone());

    client.submit(record("1")).await?;
    ct.cancel();

    let stats = task.await.expect("indexer terminated");
    assert_eq!(stats.written, 0);
    assert_eq!(stats.buffered, 1);
    assert!(backend.requests().is_empty());

    let err = client.submit(record("2")).await.unwrap_err();
    assert!(matches!(err, IndexerError::ChannelClosed));

    Ok(())
}
