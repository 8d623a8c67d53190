//! End-to-end behaviour of the invocation facade.
//!
//! Every test drives [`PythonRunner`] with `bash` standing in for the Python
//! interpreter against scripts written into a temporary working directory.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use common::{args, bash_runner, write_script, OVERRIDE_DIR, SCRIPTS_DIR};
use pyrunner_core::scripting::outcome::ExecutionOutcome;
use pyrunner_core::scripting::request::ExecutionRequest;
use pyrunner_core::scripting::result::{ScriptData, ScriptResult};
use serde_json::json;

// ---------------------------------------------------------------------------
// Successful runs
// ---------------------------------------------------------------------------

/// A script printing a JSON document yields that document as `data`.
#[tokio::test]
async fn structured_output_is_decoded() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write_script(
        dir.path(),
        SCRIPTS_DIR,
        "users.py",
        r#"echo '{"users": [{"email": "a@example.com", "admin": true}], "total": 1}'"#,
    );

    let result: ScriptResult = bash_runner(dir.path()).run_script("users.py", &[], None).await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.error.is_none());
    assert_eq!(
        result.data,
        Some(ScriptData::Structured(json!({
            "users": [{"email": "a@example.com", "admin": true}],
            "total": 1
        })))
    );
}

/// Plain text output is returned trimmed, verbatim, as a success.
#[tokio::test]
async fn plain_text_output_is_returned_verbatim() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write_script(
        dir.path(),
        SCRIPTS_DIR,
        "hello.py",
        "echo\necho '  Seeded 3 users: {ok}  '\necho\n",
    );

    let result: ScriptResult = bash_runner(dir.path()).run_script("hello.py", &[], None).await;

    assert!(result.success);
    assert_eq!(
        result.data,
        Some(ScriptData::Text("Seeded 3 users: {ok}".into()))
    );
}

/// Exit 0 with no output is a success without data.
#[tokio::test]
async fn empty_output_is_success_without_data() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write_script(dir.path(), SCRIPTS_DIR, "quiet.py", "echo 'log line' >&2\nexit 0\n");

    let result: ScriptResult = bash_runner(dir.path()).run_script("quiet.py", &[], None).await;

    assert!(result.success);
    assert!(result.data.is_none());
    assert!(result.error.is_none());

    let wire = serde_json::to_value(&result).expect("serialize");
    assert!(wire.get("data").is_none());
    assert!(wire["executionTimeMs"].is_u64());
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// A non-zero exit reports stderr when there is any.
#[tokio::test]
async fn nonzero_exit_reports_stderr() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write_script(
        dir.path(),
        SCRIPTS_DIR,
        "broken.py",
        "echo '{\"partial\": true}'\necho 'KeyError: SUPABASE_URL' >&2\nexit 1\n",
    );

    let result: ScriptResult = bash_runner(dir.path()).run_script("broken.py", &[], None).await;

    assert!(!result.success);
    assert!(result.data.is_none());
    assert_eq!(result.error.as_deref(), Some("KeyError: SUPABASE_URL\n"));
}

/// A non-zero exit without stderr names the exit code.
#[tokio::test]
async fn nonzero_exit_without_stderr_names_code() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let runner = bash_runner(dir.path());

    for code in [1, 2, 7, 255] {
        let result: ScriptResult = runner
            .run_code(&format!("exit {code}"), &[], None)
            .await;
        assert!(!result.success);
        assert_eq!(
            result.error,
            Some(format!("process exited with code {code}"))
        );
    }
}

/// A run past its budget is killed and reported as timed out, within a small
/// margin of the budget.
#[tokio::test]
async fn timeout_kills_and_reports() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let pid_file = dir.path().join("child.pid");
    write_script(
        dir.path(),
        SCRIPTS_DIR,
        "hang.py",
        &format!("echo $$ > {}\necho working\nsleep 60\n", pid_file.display()),
    );
    let budget = Duration::from_millis(500);

    let start = Instant::now();
    let result: ScriptResult = bash_runner(dir.path())
        .run_script("hang.py", &[], Some(budget))
        .await;
    let wall = start.elapsed();

    assert!(!result.success);
    assert!(result.data.is_none(), "partial output must not leak into data");
    assert_eq!(result.error.as_deref(), Some("execution timed out"));
    assert!(result.execution_time_ms >= 500, "{}", result.execution_time_ms);
    assert!(result.execution_time_ms < 3_500, "{}", result.execution_time_ms);
    assert!(wall < Duration::from_millis(3_500));

    #[cfg(unix)]
    {
        let pid: i32 = std::fs::read_to_string(&pid_file)
            .expect("read pid file")
            .trim()
            .parse()
            .expect("pid");
        assert!(
            !common::process_exists(pid),
            "timed-out interpreter {pid} is still around"
        );
    }
}

/// An identifier found in neither root fails without spawning anything.
#[tokio::test]
async fn unresolvable_identifier_is_spawn_failure() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let runner = bash_runner(dir.path());

    let outcome = runner
        .execute(&ExecutionRequest::script("nowhere.py", vec![]))
        .await;
    let expected = dir.path().join(SCRIPTS_DIR).join("nowhere.py");
    assert_matches!(
        outcome,
        ExecutionOutcome::SpawnFailed { ref reason }
            if reason == &format!("script not found: {}", expected.display())
    );

    let result: ScriptResult = runner.run_script("nowhere.py", &[], None).await;
    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("script not found:")));
}

/// A missing interpreter surfaces the OS error.
#[tokio::test]
async fn missing_interpreter_is_spawn_failure() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write_script(dir.path(), SCRIPTS_DIR, "ok.py", "echo 1\n");
    let runner = pyrunner_core::scripting::runner::PythonRunner::new(
        pyrunner_core::config::RunnerConfig::new("/definitely/not/python", dir.path())
            .with_scripts_dir(SCRIPTS_DIR),
    );

    let result: ScriptResult = runner.run_script("ok.py", &[], None).await;

    assert!(!result.success);
    let error = result.error.expect("error message");
    assert!(error.starts_with("failed to spawn /definitely/not/python"), "{error}");
}

// ---------------------------------------------------------------------------
// Resolution, determinism, concurrency
// ---------------------------------------------------------------------------

/// The override root's copy of a script runs instead of the default one.
#[tokio::test]
async fn override_root_takes_precedence() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write_script(dir.path(), SCRIPTS_DIR, "chat/reply.py", "echo '{\"marker\": \"default\"}'\n");
    write_script(dir.path(), OVERRIDE_DIR, "chat/reply.py", "echo '{\"marker\": \"override\"}'\n");
    let runner = bash_runner(dir.path());

    let result: ScriptResult = runner.run_script("chat/reply.py", &[], None).await;
    assert_eq!(
        result.data,
        Some(ScriptData::Structured(json!({"marker": "override"})))
    );

    std::fs::remove_file(dir.path().join(OVERRIDE_DIR).join("chat/reply.py")).expect("remove");
    let result: ScriptResult = runner.run_script("chat/reply.py", &[], None).await;
    assert_eq!(
        result.data,
        Some(ScriptData::Structured(json!({"marker": "default"})))
    );
}

/// Two runs of a deterministic script agree on everything but timing.
#[tokio::test]
async fn repeated_runs_are_identical() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write_script(
        dir.path(),
        SCRIPTS_DIR,
        "sum.py",
        "echo \"{\\\"sum\\\": $(( $1 + $2 ))}\"\n",
    );
    let runner = bash_runner(dir.path());
    let argv = args(&["20", "22"]);

    let first: ScriptResult = runner.run_script("sum.py", &argv, None).await;
    let second: ScriptResult = runner.run_script("sum.py", &argv, None).await;

    assert_eq!(first.success, second.success);
    assert_eq!(first.data, second.data);
    assert_eq!(first.error, second.error);
    assert_eq!(first.data, Some(ScriptData::Structured(json!({"sum": 42}))));
}

/// Concurrent slow runs each get back their own argument.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_do_not_cross_talk() {
    let dir = tempfile::tempdir().expect("create temp dir");
    write_script(
        dir.path(),
        SCRIPTS_DIR,
        "echo_later.py",
        "sleep 0.3\necho \"{\\\"id\\\": \\\"$1\\\"}\"\necho \"stderr-$1\" >&2\n",
    );
    let runner = Arc::new(bash_runner(dir.path()));

    let runs = (0..8).map(|i| {
        let runner = Arc::clone(&runner);
        async move {
            let id = format!("job-{i}");
            let result: ScriptResult = runner
                .run_script("echo_later.py", &[id.clone()], Some(Duration::from_secs(10)))
                .await;
            (id, result)
        }
    });

    let results = futures::future::join_all(runs).await;
    assert_eq!(results.len(), 8);
    for (id, result) in results {
        assert!(result.success, "{id}: {:?}", result.error);
        assert_eq!(result.data, Some(ScriptData::Structured(json!({"id": id}))));
    }
}

/// Runs spawned onto separate tasks share one runner safely.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runner_can_be_used_from_spawned_tasks() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let runner = bash_runner(dir.path());

    let handles: Vec<_> = ["x", "y", "z"]
        .into_iter()
        .map(|tag| {
            let runner = runner.clone();
            tokio::spawn(async move {
                let result: ScriptResult = runner
                    .run_code("sleep 0.1; echo \"$0\"", &[tag.to_string()], None)
                    .await;
                (tag, result)
            })
        })
        .collect();

    for handle in handles {
        let (tag, result) = handle.await.expect("task");
        assert_eq!(result.data, Some(ScriptData::Text(tag.to_string())));
    }
}
