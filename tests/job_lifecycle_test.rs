//! Job lifecycle integration tests
//!
//! Drive the conversion service end to end with shell-script converters:
//! queue serialization and ordering, cooldown spacing, timeout escalation
//! and staging cleanup on every exit path.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::{service_with_fetcher, test_service, CountingFetcher};
use docpress::convert::{ConvertError, Outcome};

#[tokio::test]
async fn successful_conversion_returns_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(
        dir.path(),
        "cp {input} {outdir}/result.pdf",
        Duration::from_millis(50),
        None,
    );

    let (_job_id, outcome) = service.convert("https://example.com/doc.txt", None).await;

    assert_matches!(
        outcome,
        Outcome::Completed { artifact, size_bytes }
            if artifact == b"stub document" && size_bytes == 13
    );
}

#[tokio::test]
async fn jobs_execute_serially_in_arrival_order() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("sequence.log");

    // Each job logs a start line, holds the slot briefly, then logs an end
    // line. Overlapping executions would interleave start/end pairs.
    let script = format!(
        "printf 'start %s\\n' \"$(cat {{input}})\" >> {log}; \
         sleep 0.1; \
         printf 'end %s\\n' \"$(cat {{input}})\" >> {log}; \
         cp {{input}} {{outdir}}/out.pdf",
        log = log.display()
    );

    let staging_root = dir.path().join("staging");
    let service = service_with_fetcher(
        &staging_root,
        &script,
        Duration::from_millis(20),
        None,
        Arc::new(CountingFetcher::default()),
    );

    let mut handles = Vec::new();
    for _ in 0..3 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.convert("https://example.com/doc.txt", None).await
        }));
        // Distinct arrival instants so the expected order is unambiguous.
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    for handle in handles {
        let (_job_id, outcome) = handle.await.unwrap();
        assert_matches!(outcome, Outcome::Completed { .. });
    }

    let lines: Vec<String> = std::fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(
        lines,
        vec![
            "start doc-1",
            "end doc-1",
            "start doc-2",
            "end doc-2",
            "start doc-3",
            "end doc-3",
        ],
        "jobs overlapped or ran out of order"
    );
}

#[tokio::test]
async fn dispatches_are_separated_by_cooldown() {
    let dir = tempfile::tempdir().unwrap();
    let cooldown = Duration::from_millis(400);
    let service = test_service(dir.path(), "cp {input} {outdir}/out.pdf", cooldown, None);

    let first = {
        let service = service.clone();
        tokio::spawn(async move {
            let outcome = service.convert("https://example.com/a.txt", None).await;
            (tokio::time::Instant::now(), outcome)
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = {
        let service = service.clone();
        tokio::spawn(async move {
            let outcome = service.convert("https://example.com/b.txt", None).await;
            (tokio::time::Instant::now(), outcome)
        })
    };

    let (first_done, first_outcome) = first.await.unwrap();
    let (second_done, second_outcome) = second.await.unwrap();
    assert_matches!(first_outcome.1, Outcome::Completed { .. });
    assert_matches!(second_outcome.1, Outcome::Completed { .. });

    // The second dispatch cannot start before the first resolution plus
    // the cooldown, so the resolutions are at least that far apart.
    let gap = second_done.duration_since(first_done);
    assert!(
        gap >= Duration::from_millis(350),
        "dispatch gap {gap:?} shorter than cooldown"
    );
}

#[tokio::test]
async fn deadline_expiry_reports_timeout_and_leaves_no_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(dir.path(), "sleep 5", Duration::from_millis(20), None);

    let started = std::time::Instant::now();
    let (_job_id, outcome) = service
        .convert("https://example.com/slow.txt", Some(100))
        .await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_matches!(
        outcome,
        Outcome::Failed {
            error: ConvertError::Timeout { .. },
            duration_ms,
        } if (100..5100).contains(&duration_ms)
    );

    // No staged input and no output directory survive the kill.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "staging root not empty: {leftovers:?}");
}

#[tokio::test]
async fn clean_exit_without_output_is_output_missing() {
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(dir.path(), "exit 0", Duration::from_millis(20), None);

    let (_job_id, outcome) = service.convert("https://example.com/doc.txt", None).await;

    assert_matches!(
        outcome,
        Outcome::Failed {
            error: ConvertError::OutputMissing { .. },
            ..
        }
    );
}

#[tokio::test]
async fn staging_is_released_after_success() {
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(
        dir.path(),
        "cp {input} {outdir}/out.pdf",
        Duration::from_millis(20),
        None,
    );

    let (_job_id, outcome) = service.convert("https://example.com/doc.txt", None).await;
    assert_matches!(outcome, Outcome::Completed { .. });

    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "staging root not empty: {leftovers:?}");
}

#[tokio::test]
async fn every_enqueued_job_resolves_even_when_some_fail() {
    let dir = tempfile::tempdir().unwrap();

    // The second job's input is doc-2; fail it and let the rest succeed.
    let service = service_with_fetcher(
        dir.path(),
        "grep -q doc-2 {input} && exit 9; cp {input} {outdir}/out.pdf",
        Duration::from_millis(20),
        None,
        Arc::new(CountingFetcher::default()),
    );

    let mut handles = Vec::new();
    for _ in 0..3 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.convert("https://example.com/doc.txt", None).await
        }));
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().1);
    }

    assert_eq!(outcomes.len(), 3);
    assert_matches!(outcomes[0], Outcome::Completed { .. });
    assert_matches!(
        outcomes[1],
        Outcome::Failed {
            error: ConvertError::ProcessExit { code: Some(9), .. },
            ..
        }
    );
    assert_matches!(outcomes[2], Outcome::Completed { .. });
}

#[tokio::test]
async fn unusable_input_fails_fast_with_download_error() {
    let dir = tempfile::tempdir().unwrap();
    let service = test_service(
        dir.path(),
        "cp {input} {outdir}/out.pdf",
        Duration::from_millis(20),
        None,
    );

    let (_job_id, outcome) = service.convert("file:///etc/passwd", None).await;

    assert_matches!(
        outcome,
        Outcome::Failed {
            error: ConvertError::Download { .. },
            ..
        }
    );
    // Nothing was staged for input that never became bytes.
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty());
}
