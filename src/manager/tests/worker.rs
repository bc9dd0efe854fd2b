use super::*;

#[tokio::test]
async fn test_all_files_succeed_gives_done() {
    let fetcher = StubFetcher::new();
    let (manager, _temp_dir) = create_test_manager(fetcher.clone()).await;

    let id = manager
        .submit(["http://x/a", "http://x/b", "http://x/c"])
        .await
        .unwrap();

    let report = wait_for_terminal(&manager, &id).await;
    assert_eq!(report.status, TaskStatus::Done);
    assert!(report.files.values().all(|s| *s == FileStatus::Done));

    let task = manager.get_task(&id).await.unwrap();
    assert_eq!(task.files[2].filename, format!("{id}-2-stub.bin"));
    assert_eq!(fetcher.calls().len(), 3);
}

#[tokio::test]
async fn test_mixed_outcome_gives_partial_done() {
    let (manager, _temp_dir) = create_test_manager(StubFetcher::new()).await;

    let id = manager.submit(["http://x/a", "http://x/fail"]).await.unwrap();

    let report = wait_for_terminal(&manager, &id).await;
    assert_eq!(report.status, TaskStatus::PartialDone);

    let task = manager.get_task(&id).await.unwrap();
    assert_eq!(task.files[0].status, FileStatus::Done);
    assert!(!task.files[0].filename.is_empty());
    assert_eq!(task.files[1].status, FileStatus::Failed);
    assert!(task.files[1].filename.is_empty());
    assert!(task.files[1].error.contains("HTTP 500"));
}

#[tokio::test]
async fn test_all_files_fail_gives_failed() {
    let (manager, _temp_dir) = create_test_manager(StubFetcher::new()).await;

    let id = manager
        .submit(["http://x/fail-1", "http://x/fail-2"])
        .await
        .unwrap();

    let report = wait_for_terminal(&manager, &id).await;
    assert_eq!(report.status, TaskStatus::Failed);
}

#[tokio::test]
async fn test_file_concurrency_is_bounded_per_task() {
    let fetcher = StubFetcher::with_delay(Duration::from_millis(50));
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.worker_count = 1;
    config.max_concurrent_files = 2;
    let manager = TaskManager::with_fetcher(config, fetcher.clone())
        .await
        .unwrap();

    let urls: Vec<String> = (0..6).map(|i| format!("http://x/{i}.bin")).collect();
    let id = manager.submit(urls).await.unwrap();

    let report = wait_for_terminal(&manager, &id).await;
    assert_eq!(report.status, TaskStatus::Done);
    assert_eq!(fetcher.calls().len(), 6);
    assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_task_is_in_progress_while_files_download() {
    let (fetcher, gate) = StubFetcher::gated();
    let (manager, _temp_dir) = create_test_manager(fetcher).await;

    let id = manager.submit(["http://x/a", "http://x/b"]).await.unwrap();

    let task = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let task = manager.get_task(&id).await.unwrap();
            if task.files.iter().all(|f| f.status == FileStatus::Downloading) {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("files were never marked as downloading");

    assert_eq!(task.status, TaskStatus::InProgress);
    assert!(task.is_consistent());

    gate.add_permits(2);
    let report = wait_for_terminal(&manager, &id).await;
    assert_eq!(report.status, TaskStatus::Done);
}

#[tokio::test]
async fn test_process_task_restarts_interrupted_files_only() {
    let fetcher = StubFetcher::new();
    let (manager, _temp_dir) = create_test_manager(fetcher.clone()).await;

    let mut task = TaskModel::new(
        TaskId::from_ordinal(7),
        &[
            "http://x/a".to_string(),
            "http://x/b".to_string(),
            "http://x/fail".to_string(),
        ],
    );
    task.status = TaskStatus::InProgress;
    task.files[0].mark_done("7-0-a");
    task.files[1].status = FileStatus::Downloading;
    manager.db.save_task(&task).await.unwrap();

    manager.process_task(task).await;

    let stored = manager.db.load_task(&TaskId::from_ordinal(7)).await.unwrap();
    assert_eq!(stored.status, TaskStatus::PartialDone);
    assert_eq!(stored.files[0].filename, "7-0-a", "done file must not be refetched");
    assert_eq!(stored.files[1].status, FileStatus::Done);
    assert_eq!(stored.files[2].status, FileStatus::Failed);

    let fetched: Vec<FileId> = fetcher.calls().into_iter().map(|(_, f)| f).collect();
    assert_eq!(fetched.len(), 2);
    assert!(!fetched.contains(&FileId::from("0")));
}

#[tokio::test]
async fn test_persist_failure_does_not_stop_the_worker() {
    let fetcher = StubFetcher::new();
    let (manager, _temp_dir) = create_test_manager(fetcher.clone()).await;

    sqlx::query("DROP TABLE tasks")
        .execute(manager.db.pool())
        .await
        .unwrap();

    let task = TaskModel::new(TaskId::from_ordinal(1), &["http://x/a".to_string()]);
    // Every save fails; the files are still processed
    manager.process_task(task).await;

    assert_eq!(fetcher.calls().len(), 1);
}

#[tokio::test]
async fn test_persist_retries_until_the_store_recovers() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.persist_retry = crate::config::RetryConfig {
        max_attempts: 50,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 1.0,
        jitter: false,
        max_elapsed: None,
    };
    let (fetcher, gate) = StubFetcher::gated();
    let manager = TaskManager::with_fetcher(config, fetcher.clone())
        .await
        .unwrap();

    let task = TaskModel::new(TaskId::from_ordinal(1), &["http://x/a".to_string()]);
    let id = task.id.clone();
    let worker = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.process_task(task).await })
    };

    // The Downloading write lands before the fetch starts
    tokio::time::timeout(Duration::from_secs(5), async {
        while fetcher.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    sqlx::query("DROP TABLE tasks")
        .execute(manager.db.pool())
        .await
        .unwrap();
    gate.add_permits(1);

    // The write after the file settles fails until the table is back
    tokio::time::sleep(Duration::from_millis(80)).await;
    sqlx::query("CREATE TABLE tasks (id TEXT PRIMARY KEY, data TEXT NOT NULL)")
        .execute(manager.db.pool())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .unwrap()
        .unwrap();

    let stored = manager.get_task(&id).await.unwrap();
    assert_eq!(stored.status, TaskStatus::Done);
    assert_eq!(stored.files[0].status, FileStatus::Done);
    assert_eq!(stored.files[0].filename, format!("{id}-0-stub.bin"));
    assert_eq!(fetcher.calls().len(), 1);
}
