//! End-to-end behaviour of the stores, the ingest service and the scheduler
//! against an on-disk database.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use growbox::ingest::StaticClassifier;
use growbox::{
    AnalysisScores, CaptureRef, GrowboxConfig, GrowboxDatabase, ImageStore, IngestService,
    MaintenanceScheduler, MeasurementValue, Measurements, SensorInput, StoreErrorKind, Table,
    TimerState,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn open() -> (TempDir, GrowboxDatabase) {
    let dir = TempDir::new().unwrap();
    let db = GrowboxDatabase::open_in_dir(dir.path()).unwrap();
    (dir, db)
}

fn count(db: &GrowboxDatabase, table: Table) -> u64 {
    db.provider().acquire().unwrap().table_count(table).unwrap()
}

fn execute(db: &GrowboxDatabase, sql: &str) {
    db.provider().acquire().unwrap().conn.execute_batch(sql).unwrap();
}

fn scores(ripeness: f64, flowers: u32) -> AnalysisScores {
    AnalysisScores {
        ripeness_score: Some(ripeness),
        ripeness_text: Some("ripening".to_string()),
        flower_count: Some(flowers),
        flower_text: Some("flowering".to_string()),
    }
}

#[test]
fn reading_round_trips_exactly() {
    let (_dir, db) = open();
    let readings = db.readings();

    let cases = [
        Measurements {
            soil_moisture: Some(0.1 + 0.2),
            air_temperature: Some(-40.0),
            air_humidity: Some(1e-300),
            light_intensity: Some(123_456_789.123_456_79),
            water_level: Some(f64::MAX),
        },
        Measurements {
            air_temperature: Some(21.7),
            ..Default::default()
        },
        Measurements::default(),
    ];

    for m in cases {
        readings.append(&m.into()).unwrap();
        let latest = readings.latest().unwrap().unwrap();
        assert_eq!(latest.measurements, m);
    }
}

#[test]
fn non_numeric_measurements_insert_nothing() {
    let (_dir, db) = open();
    let readings = db.readings();
    readings.append(&Measurements::default().into()).unwrap();

    for bad in ["abc", "12,5", "NaN", "inf", "1.0.0"] {
        let input = SensorInput {
            water_level: Some(MeasurementValue::from(bad)),
            soil_moisture: Some(MeasurementValue::from(40.0)),
            ..Default::default()
        };
        let err = readings.append(&input).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::InvalidArgument, "value {:?}", bad);
        assert_eq!(err.field(), Some("water_level"));
    }
    assert_eq!(readings.count().unwrap(), 1);
}

#[test]
fn json_payload_accepts_numbers_and_numeric_strings() {
    let (_dir, db) = open();
    let input: SensorInput =
        serde_json::from_str(r#"{"soil_moisture": 41.5, "air_humidity": " 63 ", "water_level": ""}"#)
            .unwrap();

    db.readings().append(&input).unwrap();
    let latest = db.readings().latest().unwrap().unwrap();
    assert_eq!(latest.measurements.soil_moisture, Some(41.5));
    assert_eq!(latest.measurements.air_humidity, Some(63.0));
    assert_eq!(latest.measurements.water_level, None);
    assert_eq!(latest.measurements.air_temperature, None);
}

#[test]
fn recent_returns_newest_first() {
    let (_dir, db) = open();
    let readings = db.readings();

    let ids: Vec<i64> = (1..=3)
        .map(|i| {
            readings
                .append(
                    &Measurements {
                        soil_moisture: Some(i as f64),
                        ..Default::default()
                    }
                    .into(),
                )
                .unwrap()
        })
        .collect();

    let recent = readings.recent(2).unwrap();
    let got: Vec<i64> = recent.iter().map(|r| r.id).collect();
    assert_eq!(got, vec![ids[2], ids[1]]);
    assert!(recent[0].timestamp >= recent[1].timestamp);
}

#[test]
fn combined_write_leaves_no_orphan_on_failure() {
    let (_dir, db) = open();
    execute(
        &db,
        "CREATE TRIGGER reject_results BEFORE INSERT ON ai_result
         BEGIN SELECT RAISE(ABORT, 'classifier rows disabled'); END;",
    );

    let err = db
        .captures()
        .record_capture_with_analysis("/tmp/orphan.jpg", &scores(0.5, 1))
        .unwrap_err();
    assert_eq!(err.kind, StoreErrorKind::StorageUnavailable);

    assert_eq!(count(&db, Table::ImageCapture), 0);
    assert_eq!(count(&db, Table::AnalysisResult), 0);
    assert_eq!(db.captures().find_capture_id_by_path("/tmp/orphan.jpg").unwrap(), None);
}

#[test]
fn sweep_is_idempotent() {
    let (_dir, db) = open();
    for _ in 0..3 {
        db.readings().append(&Measurements::default().into()).unwrap();
    }
    execute(
        &db,
        "UPDATE sensor_data SET timestamp = strftime('%Y-%m-%d %H:%M:%f', 'now', '-45 days')
         WHERE id IN (1, 2)",
    );

    let sweeper = db.retention();
    assert_eq!(sweeper.sweep(Table::SensorData, 30).unwrap(), 2);
    assert_eq!(sweeper.sweep(Table::SensorData, 30).unwrap(), 0);
    assert_eq!(db.readings().count().unwrap(), 1);

    let err = sweeper.sweep_named("sqlite_master", 30).unwrap_err();
    assert_eq!(err.kind, StoreErrorKind::UnknownTable);
}

#[test]
fn duplicate_capture_resolves_by_path() {
    let (_dir, db) = open();
    let captures = db.captures();

    let first = captures.record_capture("/tmp/a.jpg").unwrap();
    let err = captures.record_capture("/tmp/a.jpg").unwrap_err();
    assert_eq!(err.kind, StoreErrorKind::DuplicateCapture);
    assert_eq!(captures.find_capture_id_by_path("/tmp/a.jpg").unwrap(), Some(first));
    assert_eq!(count(&db, Table::ImageCapture), 1);
}

#[test]
fn analysis_for_missing_capture_is_rejected() {
    let (_dir, db) = open();
    let err = db.captures().record_analysis(999, &scores(0.2, 0)).unwrap_err();
    assert_eq!(err.kind, StoreErrorKind::UnknownCapture);
    assert_eq!(count(&db, Table::AnalysisResult), 0);
}

#[test]
fn deleting_capture_removes_its_results() {
    let (_dir, db) = open();
    let captures = db.captures();
    let id = captures.record_capture("/tmp/cascade.jpg").unwrap();
    captures.record_analysis(id, &scores(0.1, 0)).unwrap();
    captures.record_analysis(id, &scores(0.9, 3)).unwrap();
    let other = captures
        .record_capture_with_analysis("/tmp/keep.jpg", &scores(0.4, 1))
        .unwrap();

    execute(&db, &format!("DELETE FROM image_capture WHERE id = {}", id));

    assert!(captures.analyses_for_capture(id).unwrap().is_empty());
    assert_eq!(count(&db, Table::AnalysisResult), 1);
    assert_eq!(captures.analyses_for_capture(other.capture_id).unwrap().len(), 1);
}

#[test]
fn ingest_with_classifier_stores_file_capture_and_result() {
    let (dir, db) = open();
    let images = ImageStore::new(dir.path().join("images")).unwrap();
    let service = IngestService::new(db.clone(), images)
        .with_classifier(Arc::new(StaticClassifier::new(scores(0.87, 2))));

    let outcome = service.ingest_and_analyze(b"\xFF\xD8jpeg-bytes\xFF\xD9").unwrap();
    assert!(outcome.image.path().is_absolute());
    assert!(outcome.image.path().starts_with(service.images().dir()));
    assert_eq!(std::fs::read(outcome.image.path()).unwrap().len(), outcome.image.size_bytes);

    let result_id = outcome.result_id.unwrap();
    let recent = db.captures().recent_analyses(5).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].capture.id, outcome.capture_id);
    assert_eq!(recent[0].result.id, result_id);
    assert_eq!(recent[0].result.scores.flower_count, Some(2));

    // the same file reported again resolves to the recorded capture
    let again = service.register_capture(&outcome.image.file_path).unwrap();
    assert_eq!(again, outcome.capture_id);

    let second = service
        .attach_analysis(
            &CaptureRef::Path(outcome.image.file_path.clone()),
            &scores(0.95, 2),
        )
        .unwrap();
    assert_ne!(second, result_id);
    assert_eq!(db.captures().analyses_for_capture(outcome.capture_id).unwrap().len(), 2);
}

#[test]
fn ingest_without_classifier_defers_analysis() {
    let (dir, db) = open();
    let images = ImageStore::new(dir.path().join("images")).unwrap();
    let service = IngestService::new(db.clone(), images);

    let outcome = service.ingest_and_analyze(b"frame").unwrap();
    assert_eq!(outcome.result_id, None);
    assert!(db.captures().recent_analyses(5).unwrap().is_empty());

    let capture: CaptureRef = outcome.capture_id.to_string().parse().unwrap();
    service.attach_analysis(&capture, &scores(0.3, 0)).unwrap();
    assert_eq!(db.captures().recent_analyses(5).unwrap().len(), 1);

    let err = service
        .attach_analysis(&CaptureRef::Path("/nowhere/missing.jpg".into()), &scores(0.3, 0))
        .unwrap_err();
    assert_eq!(err.kind, StoreErrorKind::UnknownCapture);
}

#[test]
fn concurrent_writers_share_one_database() {
    const WRITERS: usize = 8;
    const ROUNDS: usize = 25;

    let (_dir, db) = open();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let workers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let db = db.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                for i in 0..ROUNDS {
                    db.readings()
                        .append(
                            &Measurements {
                                soil_moisture: Some((w * ROUNDS + i) as f64),
                                ..Default::default()
                            }
                            .into(),
                        )
                        .unwrap();
                    db.captures()
                        .record_capture_with_analysis(
                            &format!("/tmp/writer{}_{}.jpg", w, i),
                            &scores(0.5, i as u32),
                        )
                        .unwrap();
                }

                barrier.wait();
                db.captures().record_capture("/tmp/race.jpg")
            })
        })
        .collect();

    let outcomes: Vec<_> = workers.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<i64> = outcomes.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(winners.len(), 1, "outcomes: {:?}", outcomes);
    for outcome in &outcomes {
        if let Err(e) = outcome {
            assert_eq!(e.kind, StoreErrorKind::DuplicateCapture, "{}", e);
        }
    }
    assert_eq!(
        db.captures().find_capture_id_by_path("/tmp/race.jpg").unwrap(),
        Some(winners[0])
    );

    let total = (WRITERS * ROUNDS) as u64;
    assert_eq!(db.readings().count().unwrap(), total);
    assert_eq!(count(&db, Table::ImageCapture), total + 1);
    assert_eq!(count(&db, Table::AnalysisResult), total);
}

#[tokio::test(start_paused = true)]
async fn scheduled_retention_waits_a_full_interval() {
    let dir = TempDir::new().unwrap();
    let config = GrowboxConfig::with_data_dir(dir.path().to_string_lossy().to_string());
    assert!(!config.run_on_startup);
    assert!(config.capture_url.is_none());

    let db = GrowboxDatabase::open(&config.database_path).unwrap();
    let service = IngestService::new(db.clone(), ImageStore::new(&config.image_dir).unwrap());
    db.readings().append(&Measurements::default().into()).unwrap();
    db.readings().append(&Measurements::default().into()).unwrap();
    execute(
        &db,
        "UPDATE sensor_data SET timestamp = strftime('%Y-%m-%d %H:%M:%f', 'now', '-60 days')
         WHERE id = 1",
    );

    let scheduler = MaintenanceScheduler::from_config(&config, &service).unwrap();
    assert_eq!(scheduler.job_names(), vec!["retention"]);

    let started = tokio::time::Instant::now();
    let handle = scheduler.start(CancellationToken::new());
    let mut rx = handle.subscribe("retention").unwrap();
    assert_eq!(rx.borrow().state, TimerState::Waiting);

    tokio::time::advance(Duration::from_secs(60)).await;
    tokio::task::yield_now().await;
    assert_eq!(rx.borrow().total_runs(), 0);
    assert_eq!(db.readings().count().unwrap(), 2);

    rx.wait_for(|s| s.completed_runs == 1).await.unwrap();
    assert!(started.elapsed() >= config.retention_interval);
    assert_eq!(db.readings().count().unwrap(), 1);

    handle.shutdown().await;
}
