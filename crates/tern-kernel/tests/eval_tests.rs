//! End-to-end tests through the kernel: parse, analyze, evaluate.

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use tern_kernel::interpreter::NoOpShell;
use tern_kernel::{BufferConsole, CommandTable, Kernel, KernelConfig, KernelError, Value};

fn kernel() -> (Kernel, Arc<BufferConsole>) {
    kernel_with_input("")
}

fn kernel_with_input(input: &str) -> (Kernel, Arc<BufferConsole>) {
    let console = Arc::new(BufferConsole::with_input(input));
    let kernel =
        Kernel::with_parts(KernelConfig::transient(), console.clone(), Arc::new(NoOpShell)).unwrap();
    (kernel, console)
}

async fn eval(source: &str) -> Result<Value, KernelError> {
    kernel().0.execute(source).await
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[tokio::test]
async fn declare_then_assign() {
    let (kernel, _) = kernel();
    kernel.execute("var a = 5").await.unwrap();
    kernel.execute("a = 6").await.unwrap();
    assert_eq!(kernel.execute("a").await.unwrap(), Value::Integer(6));
}

#[tokio::test]
async fn function_call_and_parameter_mismatch() {
    let (kernel, _) = kernel();
    kernel
        .execute("func add(x int, y int) int { return x + y }")
        .await
        .unwrap();
    assert_eq!(kernel.execute("add(2, 3)").await.unwrap(), Value::Integer(5));

    let err = kernel.execute("add(2, \"x\")").await.unwrap_err();
    let KernelError::Analysis(errors) = err else {
        panic!("expected analysis error, got {err:?}");
    };
    assert_eq!(
        errors[0].to_string(),
        "argument 2 has type string, expected int in call to add"
    );
}

#[tokio::test]
async fn buffered_channel_round_trip() {
    let (kernel, _) = kernel();
    kernel.execute("c := make(chan int, 1)").await.unwrap();
    kernel.execute("c <- 5").await.unwrap();
    assert_eq!(kernel.execute("<- c").await.unwrap(), Value::Integer(5));
}

#[tokio::test]
async fn receive_on_empty_unbuffered_channel_blocks() {
    let (kernel, _) = kernel();
    kernel.execute("c := make(chan int)").await.unwrap();
    let pending = tokio::time::timeout(Duration::from_millis(200), kernel.execute("<- c")).await;
    assert!(pending.is_err(), "receive returned {pending:?}");
}

#[tokio::test]
async fn string_concat_and_mismatch() {
    assert_eq!(eval("\"a\" + \"b\"").await.unwrap(), Value::Str("ab".into()));

    let err = eval("1 + \"b\"").await.unwrap_err();
    assert!(matches!(err, KernelError::Analysis(_)));
    assert_eq!(err.to_string(), "analysis failed: type mismatch: int + string");
}

#[tokio::test]
async fn file_test_reports_missing_paths() {
    let dir = tempfile::tempdir().unwrap();
    let existing = dir.path().join("present.txt");
    std::fs::write(&existing, "x").unwrap();

    assert_eq!(eval("-f \"/nonexistent\"").await.unwrap(), Value::Boolean(true));
    assert_eq!(
        eval(&format!("-f \"{}\"", existing.display())).await.unwrap(),
        Value::Boolean(false)
    );
}

// =============================================================================
// CONTROL FLOW
// =============================================================================

#[rstest]
#[case::break_inner("n := 0\nfor { n = n + 1\n if n == 3 { break } }\nn", Value::Integer(3))]
#[case::loop_condition("i := 0\nfor i < 10 { i = i + 2 }\ni", Value::Integer(10))]
#[case::else_if("x := 5\nr := \"\"\nif x < 3 { r = \"low\" } else if x < 7 { r = \"mid\" } else { r = \"high\" }\nr", Value::Str("mid".into()))]
#[case::closure_counter("func mk() func() int { n := 0\n return func() int { n = n + 1\n return n } }\nc := mk()\nc()\nc()", Value::Integer(2))]
#[tokio::test]
async fn control_flow(#[case] source: &str, #[case] expected: Value) {
    assert_eq!(eval(source).await.unwrap(), expected);
}

// =============================================================================
// TASKS, CHANNELS, REFERENCES
// =============================================================================

#[tokio::test]
async fn go_tasks_communicate_with_spawner() {
    let (kernel, _) = kernel();
    let source = "results := make(chan int, 3)\n\
                  func square(n int) { results <- n * n }\n\
                  go square(2)\n\
                  go square(3)\n\
                  go square(4)\n\
                  (<- results) + (<- results) + (<- results)";
    assert_eq!(kernel.execute(source).await.unwrap(), Value::Integer(29));
}

#[tokio::test]
async fn go_returns_immediately() {
    let (kernel, _) = kernel();
    let source = "gate := make(chan int)\ngo func() { gate <- 1 }()";
    let result = tokio::time::timeout(Duration::from_secs(5), kernel.execute(source))
        .await
        .unwrap();
    assert_eq!(result.unwrap(), Value::Nil);
    assert_eq!(kernel.execute("<- gate").await.unwrap(), Value::Integer(1));
}

#[tokio::test]
async fn read_updates_referent() {
    let (kernel, _) = kernel_with_input("17 hello");
    kernel
        .execute("var x int\nvar s string\nread(&x)\nread(&s)")
        .await
        .unwrap();
    assert_eq!(kernel.get_var("x"), Some(Value::Integer(17)));
    assert_eq!(kernel.get_var("s"), Some(Value::Str("hello".into())));
}

#[tokio::test]
async fn references_share_slots_across_functions() {
    let source = "func fill(p *int) { read(p) }\n\
                  n := 1\n\
                  fill(&n)\n\
                  n";
    let (kernel, _) = kernel_with_input("41");
    assert_eq!(kernel.execute(source).await.unwrap(), Value::Integer(41));
}

// =============================================================================
// ERRORS
// =============================================================================

#[tokio::test]
async fn parse_errors_stop_before_analysis() {
    let (kernel, console) = kernel();
    let err = kernel.execute("print(1)\nvar x = (1 +").await.unwrap_err();
    assert!(matches!(err, KernelError::Parse(_)), "{err:?}");
    assert_eq!(console.output(), "");
}

#[tokio::test]
async fn analysis_reports_every_broken_statement() {
    let err = eval("x := 1 + true\ny := !5\nz := 3").await.unwrap_err();
    let KernelError::Analysis(errors) = err else {
        panic!("expected analysis errors, got {err:?}");
    };
    assert_eq!(errors.len(), 2);
}

#[tokio::test]
async fn failed_var_does_not_cascade() {
    let err = eval("var x int = \"s\"\ny := x + 1").await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "analysis failed: cannot use string as int in declaration of x"
    );
}

#[tokio::test]
async fn runtime_error_keeps_earlier_bindings() {
    let (kernel, _) = kernel();
    let err = kernel.execute("a := 1\nb := a / 0\nc := 2").await.unwrap_err();
    assert!(matches!(err, KernelError::Runtime(_)));
    assert_eq!(kernel.get_var("a"), Some(Value::Integer(1)));
    assert_eq!(kernel.get_var("c"), None);
}

// =============================================================================
// SHELL
// =============================================================================

#[tokio::test]
async fn implicit_commands_run_through_the_shell() {
    let config = KernelConfig::transient().with_commands(CommandTable::from_names(["echo"]));
    let console = Arc::new(BufferConsole::new());
    let kernel = Kernel::with_console(config, console).unwrap();

    assert_eq!(
        kernel.execute("echo hello there").await.unwrap(),
        Value::Str("hello there".into())
    );
    assert_eq!(
        kernel.execute("word := \"tern\"\n$(echo $word)").await.unwrap(),
        Value::Str("tern".into())
    );
}

#[tokio::test]
async fn failing_commands_are_runtime_errors() {
    let console = Arc::new(BufferConsole::new());
    let kernel = Kernel::with_console(KernelConfig::transient(), console).unwrap();
    let err = kernel.execute("$(exit 4)").await.unwrap_err();
    assert!(matches!(err, KernelError::Runtime(_)), "{err:?}");
    assert!(err.to_string().contains("exited with status 4"));
}

#[tokio::test]
async fn positional_arguments_come_from_config() {
    let config = KernelConfig::transient()
        .with_script_name("job.tn")
        .with_args(vec!["alpha".into()]);
    let kernel =
        Kernel::with_parts(config, Arc::new(BufferConsole::new()), Arc::new(NoOpShell)).unwrap();
    assert_eq!(kernel.execute("$0 + \":\" + $1").await.unwrap(), Value::Str("job.tn:alpha".into()));
}
