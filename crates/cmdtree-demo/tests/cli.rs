//! End-to-end tests for the `manage` binary.

use assert_cmd::Command;
use predicates::prelude::*;

#[allow(deprecated)]
fn manage() -> Command {
    let mut cmd = Command::cargo_bin("manage").unwrap();
    cmd.env_remove(cmdtree_demo::PLUGINS_ENV);
    cmd.env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Listing and dispatch
// ============================================================================

#[test]
fn test_no_arguments_lists_commands() {
    manage()
        .assert()
        .success()
        .stdout(predicate::str::contains("[demo]"))
        .stdout(predicate::str::contains("    hierarchy"))
        .stdout(predicate::str::contains("    greet"));
}

#[test]
fn test_unknown_command() {
    manage()
        .arg("nope")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown command: 'nope'"));
}

#[test]
fn test_help_for_subcommand_path() {
    manage()
        .args(["help", "hierarchy", "math", "divide"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--floor"));
}

// ============================================================================
// Command trees
// ============================================================================

#[test]
fn test_simple_command_arguments() {
    manage()
        .args(["basic", "a1", "2", "--arg4", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"arg1":"a1","arg2":2,"arg3":0.5,"arg4":3}"#));
}

#[test]
fn test_multiple_values_and_flag() {
    manage()
        .args(["multi", "cmd1", "a.txt", "b.txt", "--flag1"])
        .assert()
        .success()
        .stdout(concat!(r#"{"files":["a.txt","b.txt"],"flag1":true}"#, "\n"));
}

#[test]
fn test_group_option_reaches_subcommand() {
    manage()
        .args(["hierarchy", "math", "--precision", "4", "multiply", "3", "7"])
        .assert()
        .success()
        .stdout("21.0000\n");
    manage()
        .args(["hierarchy", "math", "--precision", "4", "divide", "3", "7"])
        .assert()
        .success()
        .stdout("0.4286\n");
}

#[test]
fn test_usage_error_shows_specific_help() {
    manage()
        .args(["hierarchy", "math", "divide", "3"])
        .assert()
        .code(2)
        .stderr(predicate::str::is_match("(?i)denominator").unwrap())
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_handler_failure_is_command_error() {
    manage()
        .args(["hierarchy", "math", "divide", "3", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("CommandError: cannot divide by zero"));
}

#[test]
fn test_empty_command_fails() {
    manage()
        .arg("noimpl")
        .assert()
        .failure()
        .stderr(predicate::str::contains("noimpl"));
}

#[test]
fn test_chained_pipeline() {
    manage()
        .args(["pipeline", "--sep", "-", "upper", "ab", "reverse", "cd"])
        .assert()
        .success()
        .stdout("AB-dc\n");
}

#[test]
fn test_interspersed_group_option() {
    manage()
        .args(["interspersed", "report", "count", "x", "y", "z", "--label", "items"])
        .assert()
        .success()
        .stdout("items: 3\n");
}

#[test]
fn test_deprecated_command_warns() {
    manage()
        .args(["multi", "total", "1", "2"])
        .assert()
        .success()
        .stdout("3.0\n")
        .stderr(predicate::str::contains("DeprecationWarning"));
}

#[test]
fn test_prompted_value_given_on_command_line() {
    manage()
        .args(["prompted", "--name", "ada"])
        .assert()
        .success()
        .stdout("hello ada\n");
}

#[test]
fn test_legacy_command() {
    manage()
        .args(["greet", "ada", "--shout"])
        .assert()
        .success()
        .stdout("HELLO ADA\n");
}

// ============================================================================
// Extension modules
// ============================================================================

#[test]
fn test_extension_commands_absent_by_default() {
    manage()
        .args(["upstream", "grp1", "plugin1"])
        .assert()
        .code(2);
    manage()
        .args(["upstream", "cmd1"])
        .assert()
        .success()
        .stdout("upstream:cmd1\n");
}

#[test]
fn test_extension_commands_installed_from_env() {
    manage()
        .env(cmdtree_demo::PLUGINS_ENV, "plugin_one,plugin_two")
        .args(["upstream", "grp1", "plugin1", "--count", "2"])
        .assert()
        .success()
        .stdout("plugin_one:2\n");
    manage()
        .env(cmdtree_demo::PLUGINS_ENV, "plugin_one,plugin_two")
        .args(["upstream", "grp1", "plugin2"])
        .assert()
        .success()
        .stdout("plugin_two:upstream\n");
    manage()
        .env(cmdtree_demo::PLUGINS_ENV, "plugin_one,plugin_two")
        .args(["upstream", "grp1", "sub1", "kept"])
        .assert()
        .success()
        .stdout("upstream:sub1 kept\n");
}
