//! The `duck` binary end to end against local git repositories.

use assert_cmd::Command;
use predicates::prelude::*;

use crate::common::{FileAssert, TestGit, TestProject, object_count};

/// Project whose template repository holds `path` with `content`.
fn project_with_template(path: &str, content: &str) -> (TestProject, TestGit) {
    let project = TestProject::new().unwrap();
    let repo = project.create_template_repo("templates").unwrap();
    repo.commit_file(path, content, "Add template").unwrap();
    (project, repo)
}

fn duck(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("duck").unwrap();
    cmd.current_dir(project.project_path())
        .env_remove("DUCK_CACHE_DIR")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_sync_renders_and_links() {
    let (project, repo) = project_with_template("make/Makefile.tpl", "name={{ NAME }}\n");
    project
        .write_config(&format!(
            r"
default:
  binary: make
  fileFlag: -f
  template: {{ repo: '{}', path: make/Makefile.tpl }}
  variables:
    NAME: demo
",
            repo.file_url()
        ))
        .unwrap();

    project.run_duck(&["sync"]).unwrap().assert_success().assert_stdout_contains("rendered");

    let link = project.cache_path().join("default/Makefile");
    FileAssert::equals(&link, "name=demo\n");
    assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
    assert_eq!(object_count(&project.cache_path()), 1);

    project.run_duck(&["sync"]).unwrap().assert_success().assert_stdout_contains("up to date");
    assert_eq!(object_count(&project.cache_path()), 1);
}

#[test]
fn test_default_target_runs_binary_with_rendered_file() {
    let (project, repo) = project_with_template("greeting.txt.tpl", "hello {{ WHO }}\n");
    project
        .write_config(&format!(
            r"
default:
  binary: cat
  template: {{ repo: '{}', path: greeting.txt.tpl }}
  variables:
    WHO: !env DUCK_TEST_WHO
",
            repo.file_url()
        ))
        .unwrap();

    duck(&project)
        .env("DUCK_TEST_WHO", "world")
        .assert()
        .success()
        .stdout("hello world\n");
}

#[test]
fn test_passthrough_arguments_reach_binary() {
    let (project, repo) = project_with_template("run.sh.tpl", "echo \"{{ PREFIX }}: $*\"\n");
    project
        .write_config(&format!(
            r"
default:
  binary: sh
  args: [fixed]
  template: {{ repo: '{}', path: run.sh.tpl }}
  variables: {{ PREFIX: args }}
",
            repo.file_url()
        ))
        .unwrap();

    project
        .run_duck(&["one", "--two", "three"])
        .unwrap()
        .assert_success()
        .assert_stdout_contains("args: fixed one --two three");
}

#[test]
fn test_child_exit_code_is_returned() {
    let (project, repo) = project_with_template("exit.sh.tpl", "exit {{ CODE }}\n");
    project
        .write_config(&format!(
            r"
default:
  binary: sh
  template: {{ repo: '{}', path: exit.sh.tpl }}
  variables: {{ CODE: 7 }}
",
            repo.file_url()
        ))
        .unwrap();

    let output = project.run_duck(&[]).unwrap();
    output.assert_code(7);
    assert!(!output.stderr.contains("error"), "unexpected stderr: {}", output.stderr);
}

#[test]
fn test_named_target_and_pinned_ref() {
    let project = TestProject::new().unwrap();
    let repo = project.create_template_repo("templates").unwrap();
    repo.commit_file("lint.yml.tpl", "version: one\n", "First").unwrap();
    repo.tag("v1").unwrap();
    repo.commit_file("lint.yml.tpl", "version: two\n", "Second").unwrap();
    project
        .write_config(&format!(
            r"
default:
  binary: cat
  template: {{ repo: '{url}', path: lint.yml.tpl }}
targets:
  lint:
    binary: cat
    template: {{ repo: '{url}', ref: v1, path: lint.yml.tpl }}
",
            url = repo.file_url()
        ))
        .unwrap();

    duck(&project).arg("lint").assert().success().stdout("version: one\n");
    duck(&project).assert().success().stdout("version: two\n");
    FileAssert::exists(project.cache_path().join("lint/lint.yml"));
    FileAssert::exists(project.cache_path().join("default/lint.yml"));
}

#[test]
fn test_missing_config_fails() {
    let project = TestProject::new().unwrap();
    project
        .run_duck(&["sync"])
        .unwrap()
        .assert_code(1)
        .assert_stderr_contains("No config file found");
}

#[test]
fn test_unknown_ref_fails_without_objects() {
    let (project, repo) = project_with_template("x.tpl", "x\n");
    project
        .write_config(&format!(
            r"
default:
  binary: cat
  template: {{ repo: '{}', ref: does-not-exist, path: x.tpl }}
",
            repo.file_url()
        ))
        .unwrap();

    duck(&project).arg("sync").assert().code(1).stderr(predicate::str::contains("error"));
    assert_eq!(object_count(&project.cache_path()), 0);
}

#[test]
fn test_missing_variable_reports_suggestion() {
    let (project, repo) = project_with_template("x.tpl", "line one\n{{ .NAEM }}\n");
    project
        .write_config(&format!(
            r"
default:
  binary: cat
  template: {{ repo: '{}', path: x.tpl }}
  variables: {{ NAME: duck }}
",
            repo.file_url()
        ))
        .unwrap();

    duck(&project)
        .arg("sync")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("NAEM").and(predicate::str::contains("NAME")));
    assert_eq!(object_count(&project.cache_path()), 0);
}

#[test]
fn test_list_shows_exec_line() {
    let project = TestProject::new().unwrap();
    project
        .write_config(
            r"
default:
  binary: make
  fileFlag: -f
  args: [-j4]
  description: build things
  template: { repo: https://example.com/t.git, path: make/Makefile.tpl }
targets:
  lint:
    binary: golangci-lint
    fileFlag: --config
    template: { repo: https://example.com/t.git, path: lint.yml.tpl }
",
        )
        .unwrap();

    duck(&project)
        .args(["list", "-e"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("build things")
                .and(predicate::str::contains("exec: make -f .duck/default/Makefile -j4"))
                .and(predicate::str::contains("exec: golangci-lint --config .duck/lint/lint.yml")),
        );
}

#[test]
fn test_clean_removes_cache_root() {
    let (project, repo) = project_with_template("x.tpl", "x\n");
    project
        .write_config(&format!(
            r"
default:
  binary: cat
  template: {{ repo: '{}', path: x.tpl }}
",
            repo.file_url()
        ))
        .unwrap();

    project.run_duck(&["sync"]).unwrap().assert_success();
    FileAssert::exists(project.cache_path());

    project.run_duck(&["clean"]).unwrap().assert_success().assert_stdout_contains("Removed");
    FileAssert::not_exists(project.cache_path());

    project.run_duck(&["clean"]).unwrap().assert_success().assert_stdout_contains("Nothing to clean");
}

#[test]
fn test_cache_dir_override() {
    let (project, repo) = project_with_template("x.tpl", "{{ V }}");
    project
        .write_config(&format!(
            r"
default:
  binary: cat
  template: {{ repo: '{}', path: x.tpl }}
  variables: {{ V: custom }}
",
            repo.file_url()
        ))
        .unwrap();

    project
        .run_duck_with_env(&["sync"], &[("DUCK_CACHE_DIR", "state")])
        .unwrap()
        .assert_success();
    FileAssert::equals(project.project_path().join("state/default/x"), "custom");
    FileAssert::not_exists(project.cache_path());
}
