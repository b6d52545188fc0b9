use std::process::Command;

const WORKER: &str = env!("CARGO_BIN_EXE_splitcalc-worker");

fn run(args: &[&str]) -> (Option<i32>, String) {
    let output = Command::new(WORKER).args(args).output().unwrap();
    (
        output.status.code(),
        String::from_utf8(output.stdout).unwrap(),
    )
}

#[test]
fn test_writes_serialized_value_without_newline() {
    assert_eq!(run(&["int", "f", "0"]), (Some(0), "2".to_string()));
    assert_eq!(run(&["int", "g", "0"]), (Some(0), "3".to_string()));
    assert_eq!(run(&["or", "f", "0"]), (Some(0), "true".to_string()));
    assert_eq!(run(&["and", "g", "4"]), (Some(0), "false".to_string()));
}

#[test]
fn test_negative_values() {
    assert_eq!(run(&["int", "f", "3"]), (Some(0), "-7".to_string()));
}

#[test]
fn test_index_outside_table() {
    assert_eq!(run(&["or", "f", "6"]), (Some(64), String::new()));
}

#[test]
fn test_rejects_unknown_arguments() {
    let (code, stdout) = run(&["xor", "f", "0"]);
    assert_ne!(code, Some(0));
    assert!(stdout.is_empty());

    let (code, _) = run(&["int", "h", "0"]);
    assert_ne!(code, Some(0));

    let (code, _) = run(&["int", "f", "-1"]);
    assert_ne!(code, Some(0));
}
