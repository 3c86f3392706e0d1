use putlink_core::bucket::{Bucket, Partitions};
use putlink_core::contract::{MockSession, Params};
use putlink_core::error::{PutlinkError, RemoteFault};
use putlink_core::job::JobStatus;
use putlink_core::locator::{classify, Locator, LocatorKind, LocatorRecord};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn analysis(items: Value, disk_avail: u64, bw_avail: u64) -> Value {
    json!({ "items": items, "disk_avail": disk_avail, "bw_avail": bw_avail })
}

fn error_locator(url: &str) -> Locator {
    classify(LocatorRecord {
        kind: Some("error".into()),
        url: url.into(),
        error: Some("not reachable".into()),
        ..Default::default()
    })
}

fn links_of(params: &Params) -> Vec<String> {
    params
        .get("links")
        .and_then(|v| v.as_array())
        .expect("links param present")
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect()
}

/// A session that expects no calls at all; any invoke fails the test.
fn silent_session() -> Arc<MockSession> {
    let mut session = MockSession::new();
    session.expect_invoke().times(0);
    Arc::new(session)
}

#[tokio::test]
async fn test_add_raw_urls_lands_in_single_in_order_without_dedup() {
    let mut bucket = Bucket::new(silent_session());

    bucket.add("http://a/1");
    bucket.add(vec!["http://a/2", "http://a/1"]);
    bucket.add(String::from("http://a/3"));

    let single: Vec<&str> = bucket
        .partitions()
        .single
        .iter()
        .map(|l| l.source_url())
        .collect();
    assert_eq!(single, vec!["http://a/1", "http://a/2", "http://a/1", "http://a/3"]);
    assert!(bucket.partitions().single.iter().all(|l| l.kind() == LocatorKind::Single));
    assert!(bucket.partitions().torrent.is_empty());
    assert!(bucket.partitions().error.is_empty());
}

#[tokio::test]
async fn test_add_classified_locators_goes_to_matching_partition() {
    let mut bucket = Bucket::new(silent_session());
    let torrent = classify(LocatorRecord {
        kind: Some("torrent".into()),
        url: "http://t/x.torrent".into(),
        ..Default::default()
    });

    bucket.add(torrent.clone());
    bucket.add(Partitions {
        error: vec![error_locator("http://dead")],
        ..Default::default()
    });

    assert_eq!(bucket.partitions().torrent, vec![torrent]);
    assert_eq!(bucket.partitions().error.len(), 1);
}

#[tokio::test]
async fn test_add_value_rejects_non_string_input() {
    let mut bucket = Bucket::new(silent_session());

    for bad in [json!(42), json!({"url": "http://x"}), json!(["http://ok", 7]), json!(null)] {
        let err = bucket.add_value(bad.clone()).err().expect("should reject");
        assert!(
            matches!(err, PutlinkError::InvalidInput(_)),
            "expected InvalidInput for {bad}, got {err:?}"
        );
    }
    assert!(bucket.partitions().is_empty(), "rejected input must not be staged");

    bucket
        .add_value(json!(["http://a", "http://b"]))
        .expect("sequence of strings accepted");
    bucket.add_value(json!("http://c")).expect("string accepted");
    assert_eq!(bucket.partitions().single.len(), 3);
}

#[tokio::test]
async fn test_fresh_bucket_report_has_no_quota_and_seeded_partitions() {
    let seed_single = vec![Locator::from_url("http://s/1")];
    let seed_torrent = vec![Locator::from_url("http://s/2.torrent")];
    let bucket = Bucket::seeded(silent_session(), seed_single.clone(), seed_torrent.clone(), vec![]);

    let report = bucket.report();
    assert_eq!(report.required_space_bytes, None);
    assert_eq!(report.paid_bandwidth_bytes, None);
    assert_eq!(report.disk_available_bytes, None);
    assert_eq!(report.bandwidth_available_bytes, None);
    assert_eq!(report.partitions.single, seed_single);
    assert_eq!(report.partitions.torrent, seed_torrent);
    assert!(report.partitions.multipart.is_empty());
    assert!(report.partitions.error.is_empty());
}

#[tokio::test]
async fn test_analyze_sums_non_error_sizes_and_bandwidth() {
    let submitted: Arc<Mutex<Vec<Params>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = submitted.clone();

    let mut session = MockSession::new();
    session
        .expect_invoke()
        .withf(|resource, operation, _| resource == "urls" && operation == "analyze")
        .times(1)
        .returning(move |_, _, params| {
            seen.lock().unwrap().push(params);
            Ok(vec![analysis(
                json!({
                    "singleurl": [
                        {"url": "http://a/1", "name": "one.iso", "size": 100, "paid_bw": 10},
                        {"url": "http://a/2", "name": "two.iso", "size": "200", "paid_bw": "20"}
                    ],
                    "torrent": [
                        {"url": "http://a/3.torrent", "name": "three", "size": 1000, "paid_bw": 0}
                    ],
                    "multiparturl": [
                        [
                            {"url": "http://a/4.part1.rar", "size": 50, "paid_bw": 5, "need_pass": 1},
                            {"url": "http://a/4.part2.rar", "size": 50, "paid_bw": 5, "need_pass": 1}
                        ]
                    ],
                    "error": [
                        {"url": "http://a/5", "size": 9999, "paid_bw": 9999, "error": "dead link"}
                    ]
                }),
                5_000_000,
                7_000_000,
            )])
        });

    let mut bucket = Bucket::new(Arc::new(session));
    bucket.add(vec!["http://a/1", "http://a/2"]);
    bucket.add(error_locator("http://stale-error"));

    bucket
        .analyze(Some(vec![
            "http://a/3.torrent".into(),
            "http://a/4.part1.rar".into(),
            "http://a/5".into(),
        ]))
        .await
        .expect("analyze should succeed");

    let calls = submitted.lock().unwrap();
    assert_eq!(
        links_of(&calls[0]),
        vec!["http://a/1", "http://a/2", "http://a/3.torrent", "http://a/4.part1.rar", "http://a/5"],
        "staged non-error links first, then candidates; error partition never resubmitted"
    );

    let report = bucket.report();
    assert_eq!(report.required_space_bytes, Some(100 + 200 + 1000 + 50 + 50));
    assert_eq!(report.paid_bandwidth_bytes, Some(10 + 20 + 0 + 5 + 5));
    assert_eq!(report.disk_available_bytes, Some(5_000_000));
    assert_eq!(report.bandwidth_available_bytes, Some(7_000_000));

    assert_eq!(report.partitions.single.len(), 2);
    assert_eq!(report.partitions.torrent.len(), 1);
    assert_eq!(report.partitions.multipart.len(), 2);
    assert!(report.partitions.multipart.iter().all(|l| l.requires_password()));
    assert_eq!(report.partitions.error.len(), 1);
    assert_eq!(report.partitions.error[0].fault_detail(), Some("dead link"));
    assert!(
        !report
            .partitions
            .error
            .iter()
            .any(|l| l.source_url() == "http://stale-error"),
        "pre-analysis error locators are discarded"
    );
}

#[tokio::test]
async fn test_second_analyze_replaces_first_classification() {
    let submitted: Arc<Mutex<Vec<Params>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = submitted.clone();

    let mut session = MockSession::new();
    session
        .expect_invoke()
        .withf(|resource, operation, _| resource == "urls" && operation == "analyze")
        .times(2)
        .returning(move |_, _, params| {
            let mut calls = seen.lock().unwrap();
            calls.push(params);
            let response = if calls.len() == 1 {
                analysis(json!({"torrent": [{"url": "a.torrent", "size": 10}]}), 100, 100)
            } else {
                analysis(json!({"torrent": [{"url": "b.torrent", "size": 20}]}), 90, 80)
            };
            Ok(vec![response])
        });

    let mut bucket = Bucket::new(Arc::new(session));
    bucket.analyze(Some(vec!["a.torrent".into()])).await.unwrap();
    bucket.analyze(Some(vec!["b.torrent".into()])).await.unwrap();

    let report = bucket.report();
    let torrents: Vec<&str> = report.partitions.torrent.iter().map(|l| l.source_url()).collect();
    assert_eq!(torrents, vec!["b.torrent"]);
    assert_eq!(report.required_space_bytes, Some(20));
    assert_eq!(report.disk_available_bytes, Some(90));
    assert_eq!(report.bandwidth_available_bytes, Some(80));

    let calls = submitted.lock().unwrap();
    assert_eq!(links_of(&calls[1]), vec!["a.torrent", "b.torrent"]);
}

#[tokio::test]
async fn test_add_after_analyze_leaves_aggregates_stale() {
    let mut session = MockSession::new();
    session.expect_invoke().times(1).returning(|_, _, _| {
        Ok(vec![analysis(json!({"singleurl": [{"url": "http://x", "size": 42, "paid_bw": 1}]}), 1, 2)])
    });

    let mut bucket = Bucket::new(Arc::new(session));
    bucket.analyze(Some(vec!["http://x".into()])).await.unwrap();
    let before = bucket.report();

    bucket.add("http://later");
    let after = bucket.report();

    assert_eq!(after.required_space_bytes, before.required_space_bytes);
    assert_eq!(after.paid_bandwidth_bytes, before.paid_bandwidth_bytes);
    assert_eq!(after.partitions.single.len(), 2);
}

#[tokio::test]
async fn test_analyze_value_rejects_non_sequence_before_network() {
    let mut bucket = Bucket::new(silent_session());
    bucket.add("http://staged");

    let err = bucket
        .analyze_value(Some(json!("http://not-a-list")))
        .await
        .err()
        .expect("should reject");
    assert!(matches!(err, PutlinkError::InvalidInput(_)), "got {err:?}");
    assert_eq!(bucket.partitions().single.len(), 1);
}

#[tokio::test]
async fn test_analyze_remote_fault_leaves_bucket_untouched() {
    let mut session = MockSession::new();
    session.expect_invoke().times(1).returning(|resource, operation, params| {
        Err(RemoteFault::new(resource, operation, params, "quota service unavailable"))
    });

    let mut bucket = Bucket::new(Arc::new(session));
    bucket.add("http://a");
    let before = bucket.report();

    let err = bucket.analyze(None).await.err().expect("should fail");
    match err {
        PutlinkError::RemoteFault(fault) => {
            assert_eq!(fault.resource, "urls");
            assert_eq!(fault.operation, "analyze");
            assert_eq!(links_of(&fault.params), vec!["http://a"]);
        }
        other => panic!("expected RemoteFault, got {other:?}"),
    }
    assert_eq!(bucket.report(), before);
}

#[tokio::test]
async fn test_analyze_rejects_malformed_response() {
    let mut session = MockSession::new();
    session
        .expect_invoke()
        .times(1)
        .returning(|_, _, _| Ok(vec![json!({"items": {"singleurl": "not-a-list"}})]));

    let mut bucket = Bucket::new(Arc::new(session));
    let err = bucket.analyze(Some(vec!["http://a".into()])).await.err().unwrap();
    assert!(matches!(err, PutlinkError::Decode { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_analyze_saturates_oversized_totals() {
    let mut session = MockSession::new();
    session.expect_invoke().times(1).returning(|_, _, _| {
        Ok(vec![analysis(
            json!({"singleurl": [
                {"url": "http://a", "size": u64::MAX, "paid_bw": u64::MAX},
                {"url": "http://b", "size": 1, "paid_bw": 1e30},
            ]}),
            0,
            0,
        )])
    });

    let mut bucket = Bucket::new(Arc::new(session));
    bucket
        .analyze(Some(vec!["http://a".into(), "http://b".into()]))
        .await
        .expect("huge sizes must not fail the analysis");

    let report = bucket.report();
    assert_eq!(report.required_space_bytes, Some(u64::MAX));
    assert_eq!(report.paid_bandwidth_bytes, Some(u64::MAX));
    assert_eq!(report.partitions.single.len(), 2);
}

#[tokio::test]
async fn test_analysis_groups_keep_response_order() {
    let mut session = MockSession::new();
    session.expect_invoke().times(1).returning(|_, _, _| {
        Ok(vec![analysis(
            json!({
                "zeta": [{"type": "singleurl", "url": "http://z"}],
                "alpha": [{"type": "singleurl", "url": "http://a"}],
            }),
            0,
            0,
        )])
    });

    let mut bucket = Bucket::new(Arc::new(session));
    bucket.analyze(None).await.unwrap();

    let single: Vec<&str> = bucket
        .partitions()
        .single
        .iter()
        .map(|l| l.source_url())
        .collect();
    assert_eq!(single, vec!["http://z", "http://a"]);
}

#[tokio::test]
async fn test_unknown_analysis_group_becomes_error_locator() {
    let mut session = MockSession::new();
    session.expect_invoke().times(1).returning(|_, _, _| {
        Ok(vec![analysis(json!({"magnet": [{"url": "magnet:?xt=1", "size": 5}]}), 0, 0)])
    });

    let mut bucket = Bucket::new(Arc::new(session));
    bucket.analyze(Some(vec!["magnet:?xt=1".into()])).await.unwrap();

    let report = bucket.report();
    assert_eq!(report.partitions.error.len(), 1);
    assert!(report.partitions.error[0].fault_detail().unwrap().contains("magnet"));
    assert_eq!(report.required_space_bytes, Some(0));
}

#[tokio::test]
async fn test_fetch_dispatches_in_partition_order_and_maps_jobs() {
    let submitted: Arc<Mutex<Vec<Params>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = submitted.clone();

    let mut session = MockSession::new();
    session
        .expect_invoke()
        .withf(|resource, operation, _| resource == "transfers" && operation == "add")
        .times(1)
        .returning(move |_, _, params| {
            seen.lock().unwrap().push(params);
            Ok(vec![
                json!({"id": 1, "name": "one", "status": "WAITING", "percent_done": 0}),
                json!({"id": "2", "name": "two", "status": "ERROR", "percent_done": 0}),
                json!({"id": 3, "name": "three", "status": "SEEDING", "percent_done": "100"}),
            ])
        });

    let multipart = classify(LocatorRecord {
        kind: Some("multiparturl".into()),
        url: "http://m/part1.rar".into(),
        ..Default::default()
    });
    let torrent = classify(LocatorRecord {
        kind: Some("torrent".into()),
        url: "http://t/x.torrent".into(),
        ..Default::default()
    });

    let mut bucket = Bucket::new(Arc::new(session));
    bucket.add(multipart);
    bucket.add(torrent);
    bucket.add("http://s/1");
    bucket.add(error_locator("http://dead"));

    let jobs = bucket.fetch().await.expect("fetch should succeed despite a failed job");

    let calls = submitted.lock().unwrap();
    assert_eq!(
        links_of(&calls[0]),
        vec!["http://s/1", "http://t/x.torrent", "http://m/part1.rar"]
    );

    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[0].status(), &JobStatus::Waiting);
    assert_eq!(jobs[1].id(), Some(2));
    assert!(jobs[1].status().is_failure());
    assert_eq!(jobs[2].status(), &JobStatus::Other("SEEDING".into()));
    assert_eq!(jobs[2].percent_complete(), 100);
    assert_eq!(jobs[2].display_name(), "three");
}

#[tokio::test]
async fn test_fetch_error_only_bucket_dispatches_empty_batch() {
    let submitted: Arc<Mutex<Vec<Params>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = submitted.clone();

    let mut session = MockSession::new();
    session.expect_invoke().times(1).returning(move |_, _, params| {
        seen.lock().unwrap().push(params);
        Ok(vec![])
    });

    let mut bucket = Bucket::new(Arc::new(session));
    bucket.add(error_locator("http://dead/1"));
    bucket.add(error_locator("http://dead/2"));

    let jobs = bucket.fetch().await.expect("empty batch is not an error");
    assert!(jobs.is_empty());
    assert!(links_of(&submitted.lock().unwrap()[0]).is_empty());
}

#[tokio::test]
async fn test_fetch_does_not_touch_aggregates() {
    let mut session = MockSession::new();
    session
        .expect_invoke()
        .withf(|_, operation, _| operation == "analyze")
        .times(1)
        .returning(|_, _, _| {
            Ok(vec![analysis(json!({"singleurl": [{"url": "http://x", "size": 7, "paid_bw": 3}]}), 11, 12)])
        });
    session
        .expect_invoke()
        .withf(|_, operation, _| operation == "add")
        .times(1)
        .returning(|_, _, _| Ok(vec![json!({"id": 9, "name": "x", "status": "WAITING"})]));

    let mut bucket = Bucket::new(Arc::new(session));
    bucket.analyze(Some(vec!["http://x".into()])).await.unwrap();
    let before = bucket.report();
    let jobs = bucket.fetch().await.unwrap();

    assert_eq!(jobs.len(), 1);
    assert_eq!(bucket.report(), before);
}

#[tokio::test]
async fn test_extract_stages_links_found_in_text() {
    let mut session = MockSession::new();
    session
        .expect_invoke()
        .withf(|resource, operation, params| {
            resource == "urls"
                && operation == "extracturls"
                && params.get("txt").and_then(|v| v.as_str()) == Some("see http://a and http://b")
        })
        .times(1)
        .returning(|_, _, _| Ok(vec![json!("http://a"), json!({"url": "http://b"})]));

    let mut bucket = Bucket::new(Arc::new(session));
    let added = bucket.extract("see http://a and http://b").await.unwrap();

    assert_eq!(added, 2);
    let single: Vec<&str> = bucket.partitions().single.iter().map(|l| l.source_url()).collect();
    assert_eq!(single, vec!["http://a", "http://b"]);
}
