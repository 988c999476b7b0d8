mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{HANG, MockRunner, PANIC, SPAWN_ERROR, case, leftovers, limits, request, sh_config};
use goj_core::domain::{Judge, JudgeFailure, JudgeRequest, SourceCode, SubmissionId, SubmissionStatus};
use goj_judge::aggregator::{MSG_ACCEPTED, MSG_INVALID_CODE, MSG_NO_CASES, MSG_WATCHDOG};
use goj_judge::{BuildOutcome, JudgeConfig, JudgeEngine, JudgeEvent, ToolchainConfig};

const SUM: &str = "read a b\necho $((a + b))\n";

fn sh_engine(root: &std::path::Path) -> JudgeEngine {
    JudgeEngine::new(sh_config(root)).expect("engine should initialize")
}

fn mock_engine(root: &std::path::Path, runner: &MockRunner, parallelism: usize) -> JudgeEngine {
    let config = JudgeConfig {
        max_parallelism: parallelism,
        ..sh_config(root)
    };
    JudgeEngine::new(config)
        .expect("engine should initialize")
        .with_runner(Arc::new(runner.clone()))
}

#[tokio::test]
async fn scenario_a_correct_sum_is_accepted() {
    let root = tempfile::tempdir().expect("temp root");
    let engine = sh_engine(root.path());

    let report = engine
        .judge(request(SUM, vec![case("23 11\n", "34\n")], limits(2000, 65536)))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::Accepted);
    assert_eq!(report.message, MSG_ACCEPTED);
    assert_eq!(report.cases.len(), 1);
    assert_eq!(leftovers(root.path()), 0);
}

#[tokio::test]
async fn scenario_b_disallowed_import_is_invalid_code() {
    let root = tempfile::tempdir().expect("temp root");
    let runner = MockRunner::new(Duration::ZERO);
    let engine = mock_engine(root.path(), &runner, 4);
    let source = "package main\n\nimport \"os\"\n\nfunc main() { os.Exit(0) }\n";

    for cases in [vec![], vec![case("1", "1")], vec![case("1", "2"); 3]] {
        let report = engine
            .judge(request(source, cases, limits(1000, 65536)))
            .await
            .expect("judging should succeed");

        assert_eq!(report.status, SubmissionStatus::InvalidCode);
        assert_eq!(report.message, MSG_INVALID_CODE);
    }
    assert_eq!(runner.runs(), 0);
}

#[tokio::test]
async fn scenario_c_sleeping_program_times_out() {
    let root = tempfile::tempdir().expect("temp root");
    let engine = sh_engine(root.path());
    let started = Instant::now();

    let report = engine
        .judge(request("sleep 5\n", vec![case("", "")], limits(1000, 65536)))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::TimeLimitExceeded);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(leftovers(root.path()), 0);
}

#[tokio::test]
async fn scenario_d_wrong_output_is_wrong_answer() {
    let root = tempfile::tempdir().expect("temp root");
    let engine = sh_engine(root.path());

    let report = engine
        .judge(request("echo 35\n", vec![case("23 11\n", "34\n")], limits(2000, 65536)))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::WrongAnswer);
}

#[tokio::test]
async fn scenario_e_no_test_cases_is_a_vacuous_pass() {
    let root = tempfile::tempdir().expect("temp root");
    let engine = sh_engine(root.path());

    let report = engine
        .judge(request("exit 1\n", vec![], limits(1000, 65536)))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::Accepted);
    assert_eq!(report.message, MSG_NO_CASES);
}

#[tokio::test]
async fn one_failing_case_among_many_fails_the_submission() {
    let root = tempfile::tempdir().expect("temp root");
    let engine = sh_engine(root.path());
    let cases = vec![
        case("1 2\n", "3\n"),
        case("5 5\n", "10\n"),
        case("2 2\n", "5\n"),
        case("0 0\n", "0\n"),
    ];

    let report = engine
        .judge(request(SUM, cases, limits(2000, 65536)))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::WrongAnswer);
    assert_eq!(report.cases[2].status, SubmissionStatus::WrongAnswer);
    assert_eq!(report.cases[0].status, SubmissionStatus::Accepted);
}

#[tokio::test]
async fn never_terminating_program_is_bounded() {
    let root = tempfile::tempdir().expect("temp root");
    let engine = sh_engine(root.path());
    let started = Instant::now();

    let report = engine
        .judge(request(
            "while :; do :; done\n",
            vec![case("", ""), case("", "")],
            limits(300, 65536),
        ))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::TimeLimitExceeded);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn nonzero_exit_is_wrong_answer_with_diagnostic() {
    let root = tempfile::tempdir().expect("temp root");
    let engine = sh_engine(root.path());

    let report = engine
        .judge(request(
            "echo boom >&2\nexit 3\n",
            vec![case("", "")],
            limits(2000, 65536),
        ))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::WrongAnswer);
    assert_eq!(report.cases[0].detail.as_deref(), Some("boom\n"));
}

#[tokio::test]
async fn build_failure_exit_code_is_a_compile_error() {
    let root = tempfile::tempdir().expect("temp root");
    let mut config = sh_config(root.path());
    config.toolchain.build_failure_exit_code = Some(2);
    let engine = JudgeEngine::new(config).expect("engine should initialize");

    let report = engine
        .judge(request(
            "echo './main.go:3:1: syntax error' >&2\nexit 2\n",
            vec![case("", "")],
            limits(2000, 65536),
        ))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::CompileError);
    assert!(report.message.contains("syntax error"));
}

#[tokio::test]
async fn failed_build_step_stops_before_any_case_runs() {
    let root = tempfile::tempdir().expect("temp root");
    let mut config = sh_config(root.path());
    config.toolchain.build = Some(vec![
        "sh".to_string(),
        "-c".to_string(),
        "echo 'undefined: x' >&2; exit 1".to_string(),
    ]);
    let engine = JudgeEngine::new(config).expect("engine should initialize");

    let report = engine
        .judge(request(SUM, vec![case("1 1\n", "2\n")], limits(2000, 65536)))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::CompileError);
    assert!(report.message.contains("undefined: x"));
    assert!(report.cases.is_empty());
    assert_eq!(leftovers(root.path()), 0);
}

#[tokio::test]
async fn build_timeout_is_a_compile_error() {
    let root = tempfile::tempdir().expect("temp root");
    let runner = MockRunner::new(Duration::ZERO).with_build(BuildOutcome::TimedOut);
    let engine = mock_engine(root.path(), &runner, 2);

    let report = engine
        .judge(request("x", vec![case("1", "1")], limits(1000, 0)))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::CompileError);
    assert_eq!(runner.runs(), 0);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn process_group_memory_over_limit() {
    let root = tempfile::tempdir().expect("temp root");
    let engine = sh_engine(root.path());

    let report = engine
        .judge(request(
            "sleep 0.3\necho ok\n",
            vec![case("", "ok\n")],
            limits(2000, 1),
        ))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::MemoryLimitExceeded);
    assert!(report.memory_kb.unwrap_or(0) > 1);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn unmetered_processes_are_not_charged() {
    let root = tempfile::tempdir().expect("temp root");
    let mut config = sh_config(root.path());
    config.toolchain.unmetered_processes = vec!["sh".to_string(), "sleep".to_string()];
    let engine = JudgeEngine::new(config).expect("engine should initialize");

    let report = engine
        .judge(request(
            "sleep 0.3\necho ok\n",
            vec![case("", "ok\n")],
            limits(2000, 1),
        ))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::Accepted);
    assert!(report.memory_kb.unwrap_or(0) <= 1);
}

#[tokio::test]
async fn large_input_is_echoed_back_in_full() {
    let root = tempfile::tempdir().expect("temp root");
    let engine = sh_engine(root.path());
    let input = "0123456789abcdef\n".repeat(1 << 16);

    let report = engine
        .judge(request("cat\n", vec![case(&input, &input)], limits(5000, 0)))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::Accepted);
    assert_eq!(leftovers(root.path()), 0);
}

#[tokio::test]
async fn concurrency_never_exceeds_the_bound() {
    let root = tempfile::tempdir().expect("temp root");
    let runner = MockRunner::new(Duration::from_millis(30));
    let engine = mock_engine(root.path(), &runner, 2);
    let cases: Vec<_> = (0..9).map(|i| case(&i.to_string(), &i.to_string())).collect();

    let report = engine
        .judge(request("x", cases, limits(1000, 0)))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::Accepted);
    assert_eq!(runner.runs(), 9);
    assert!(runner.peak() <= 2, "peak concurrency was {}", runner.peak());
    assert_eq!(runner.active(), 0);
}

#[tokio::test]
async fn fewer_cases_than_parallelism_run_together() {
    let root = tempfile::tempdir().expect("temp root");
    let runner = MockRunner::new(Duration::from_millis(100));
    let engine = mock_engine(root.path(), &runner, 8);
    let cases = vec![case("a", "a"), case("b", "b"), case("c", "c")];

    engine
        .judge(request("x", cases, limits(1000, 0)))
        .await
        .expect("judging should succeed");

    assert!(runner.peak() <= 3);
}

#[tokio::test]
async fn watchdog_resolves_when_results_never_arrive() {
    let root = tempfile::tempdir().expect("temp root");
    let runner = MockRunner::new(Duration::ZERO);
    let engine = mock_engine(root.path(), &runner, 2);
    let started = Instant::now();

    let report = engine
        .judge(request("x", vec![case("1", "1"), case(HANG, "")], limits(100, 0)))
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::TimeLimitExceeded);
    assert_eq!(report.message, MSG_WATCHDOG);
    assert_eq!(report.cases[0].status, SubmissionStatus::Accepted);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(runner.active(), 0);
    assert_eq!(leftovers(root.path()), 0);
}

#[tokio::test]
async fn panicking_case_is_an_infrastructure_failure() {
    let root = tempfile::tempdir().expect("temp root");
    let runner = MockRunner::new(Duration::ZERO);
    let engine = mock_engine(root.path(), &runner, 2);

    let err = engine
        .judge(request("x", vec![case("1", "1"), case(PANIC, "")], limits(1000, 0)))
        .await
        .expect_err("a panic must not become a verdict");

    assert!(matches!(err, JudgeFailure::Infrastructure(_)));
    assert_eq!(leftovers(root.path()), 0);
}

#[tokio::test]
async fn runner_error_is_an_infrastructure_failure() {
    let root = tempfile::tempdir().expect("temp root");
    let runner = MockRunner::new(Duration::ZERO);
    let engine = mock_engine(root.path(), &runner, 1);

    let err = engine
        .judge(request("x", vec![case(SPAWN_ERROR, "")], limits(1000, 0)))
        .await
        .expect_err("spawn failure must not become a verdict");

    assert!(matches!(err, JudgeFailure::Infrastructure(_)));
}

#[tokio::test]
async fn missing_executable_is_an_infrastructure_failure() {
    let root = tempfile::tempdir().expect("temp root");
    let mut config = sh_config(root.path());
    config.toolchain.run = vec!["/nonexistent/goj-runner".to_string()];
    let engine = JudgeEngine::new(config).expect("engine should initialize");

    let err = engine
        .judge(request("x", vec![case("", "")], limits(1000, 0)))
        .await
        .expect_err("spawn failure must not become a verdict");

    match err {
        JudgeFailure::Infrastructure(message) => assert!(message.contains("goj-runner")),
        other => panic!("expected Infrastructure, got: {other:?}"),
    }
    assert_eq!(leftovers(root.path()), 0);
}

#[tokio::test]
async fn unreadable_source_path_is_not_a_verdict() {
    let root = tempfile::tempdir().expect("temp root");
    let engine = sh_engine(root.path());

    let err = engine
        .judge(JudgeRequest {
            submission_id: SubmissionId::new(),
            source: SourceCode::Path(root.path().join("missing").join("main.go")),
            test_cases: vec![case("", "")],
            limits: limits(1000, 0),
        })
        .await
        .expect_err("missing source must fail");

    assert!(matches!(err, JudgeFailure::SourceUnreadable(_)));
}

#[tokio::test]
async fn source_is_read_from_the_saved_path() {
    let root = tempfile::tempdir().expect("temp root");
    let saved = tempfile::tempdir().expect("saved sources");
    let path = saved.path().join("main.sh");
    std::fs::write(&path, SUM).expect("write source");
    let engine = sh_engine(root.path());

    let report = engine
        .judge(JudgeRequest {
            submission_id: SubmissionId::new(),
            source: SourceCode::Path(path.clone()),
            test_cases: vec![case("23 11", "34\n")],
            limits: limits(2000, 65536),
        })
        .await
        .expect("judging should succeed");

    assert_eq!(report.status, SubmissionStatus::Accepted);
    assert!(path.exists(), "the caller's copy is left alone");
}

#[tokio::test]
async fn events_follow_the_job_lifecycle() {
    let root = tempfile::tempdir().expect("temp root");
    let runner = MockRunner::new(Duration::ZERO);
    let engine = mock_engine(root.path(), &runner, 2);
    let mut events = engine.subscribe_events();
    let judged = request("x", vec![case("1", "1"), case("2", "3")], limits(1000, 0));
    let submission_id = judged.submission_id;

    engine.judge(judged).await.expect("judging should succeed");

    let started = events.recv().await.expect("job started");
    assert!(matches!(
        started,
        JudgeEvent::JobStarted { cases: 2, parallelism: 2, .. }
    ));
    for _ in 0..2 {
        let finished = events.recv().await.expect("case finished");
        assert!(matches!(finished, JudgeEvent::CaseFinished { .. }));
    }
    match events.recv().await.expect("verdict") {
        JudgeEvent::VerdictReached {
            submission_id: id,
            status,
            ..
        } => {
            assert_eq!(id, submission_id);
            assert_eq!(status, SubmissionStatus::WrongAnswer);
        }
        other => panic!("expected VerdictReached, got: {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_submissions_are_judged_independently() {
    let root = tempfile::tempdir().expect("temp root");
    let engine = Arc::new(sh_engine(root.path()));

    let accepted = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .judge(request(SUM, vec![case("2 2\n", "4\n")], limits(2000, 65536)))
                .await
        })
    };
    let wrong = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .judge(request("echo 0\n", vec![case("2 2\n", "4\n")], limits(2000, 65536)))
                .await
        })
    };

    let accepted = accepted.await.expect("task").expect("judging should succeed");
    let wrong = wrong.await.expect("task").expect("judging should succeed");
    assert_eq!(accepted.status, SubmissionStatus::Accepted);
    assert_eq!(wrong.status, SubmissionStatus::WrongAnswer);
    assert_eq!(leftovers(root.path()), 0);
}

#[tokio::test]
#[ignore = "requires local Go toolchain"]
async fn go_program_end_to_end() {
    let root = tempfile::tempdir().expect("temp root");
    let config = JudgeConfig {
        scratch_root: root.path().to_path_buf(),
        toolchain: ToolchainConfig::go_build(),
        ..JudgeConfig::default()
    };
    let engine = JudgeEngine::new(config).expect("engine should initialize");
    let source = r#"package main

import "fmt"

func main() {
	var a, b int
	fmt.Scan(&a, &b)
	fmt.Println(a + b)
}
"#;

    let report = engine
        .judge(request(source, vec![case("23 11\n", "34\n")], limits(2000, 65536)))
        .await
        .expect("judging should succeed");
    assert_eq!(report.status, SubmissionStatus::Accepted);

    let report = engine
        .judge(request(
            "package main\n\nimport \"fmt\"\n\nfunc main() { fmt.Println(x) }\n",
            vec![case("", "")],
            limits(2000, 65536),
        ))
        .await
        .expect("judging should succeed");
    assert_eq!(report.status, SubmissionStatus::CompileError);
}
