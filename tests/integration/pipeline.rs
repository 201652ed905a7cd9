//! Pipeline behavior through the library API.

use std::path::Path;
use std::sync::Arc;

use duckfile::cache::{Cache, link};
use duckfile::config::DuckConfig;
use duckfile::core::DuckError;
use duckfile::run::Runner;
use duckfile::source::SourceFetcher;
use duckfile::templating::{RenderError, TemplateRenderer};
use duckfile::test_utils::{FakeFetcher, init_test_logging};
use duckfile::variables::{MapEnvironment, VariableResolver};

use crate::common::object_count;

fn runner<F: SourceFetcher>(root: &Path, env: MapEnvironment, fetcher: F) -> Runner<F> {
    init_test_logging(None);
    let env = Arc::new(env);
    Runner::new(
        Cache::new(root),
        fetcher,
        VariableResolver::new(env.clone()),
        TemplateRenderer::new(env),
    )
}

fn config(yaml: &str) -> DuckConfig {
    DuckConfig::from_yaml_str(yaml, "duck.yaml").unwrap()
}

#[tokio::test]
async fn test_literal_template_is_copied_verbatim() {
    let temp = tempfile::tempdir().unwrap();
    let template = "all:\n\t@echo $(CC) {not a tag}\n";
    let fetcher = FakeFetcher::new().with_file("Makefile.tpl", template);
    let runner = runner(&temp.path().join(".duck"), MapEnvironment::default(), fetcher);
    let cfg = config(
        r"
default:
  binary: 'true'
  fileFlag: -f
  template: { repo: https://example.com/t.git, path: Makefile.tpl }
",
    );
    let (name, target) = cfg.target("").unwrap();

    runner.exec(target, name, &[]).await.unwrap();

    let link_path = runner.cache().link_path(name, target);
    assert_eq!(std::fs::read_to_string(&link_path).unwrap(), template);
    assert!(link::current_target(&link_path).is_some());
    assert_eq!(runner.fetcher().requests(), vec![("https://example.com/t.git".into(), "HEAD".into())]);
}

#[tokio::test]
async fn test_env_variable_is_rendered() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new().with_file("t/config.tpl", "value={{.ENV1}}");
    let env = MapEnvironment::from_pairs([("ENV1", "hello")]);
    let runner = runner(temp.path(), env, fetcher);
    let cfg = config(
        r"
default:
  binary: 'true'
  template: { repo: r, ref: v1, path: t/config.tpl }
  variables:
    ENV1: !env ENV1
",
    );
    let (name, target) = cfg.target("").unwrap();

    let report = runner.sync(target, name, false).await.unwrap();
    assert_eq!(std::fs::read_to_string(&report.link_path).unwrap(), "value=hello");
    assert!(report.link_path.ends_with("default/config"));
}

#[tokio::test]
async fn test_changed_value_supersedes_object() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join(".duck");
    let yaml = r"
default:
  binary: 'true'
  template: { repo: r, path: greeting.tpl }
  variables:
    WORD: !env WORD
";
    let cfg = config(yaml);
    let (name, target) = cfg.target("").unwrap();

    let fetcher = || FakeFetcher::new().with_file("greeting.tpl", "{{ WORD }}");
    let first = runner(&root, MapEnvironment::from_pairs([("WORD", "hello")]), fetcher())
        .sync(target, name, false)
        .await
        .unwrap();
    let second = runner(&root, MapEnvironment::from_pairs([("WORD", "world")]), fetcher())
        .sync(target, name, false)
        .await
        .unwrap();

    assert_ne!(first.key, second.key);
    assert_eq!(second.superseded.as_ref(), Some(&first.key));
    assert_eq!(object_count(&root), 1);
    assert_eq!(std::fs::read_to_string(&second.link_path).unwrap(), "world");
}

#[tokio::test]
async fn test_failing_command_aborts_before_fetch() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join(".duck");
    let runner = runner(&root, MapEnvironment::default(), FakeFetcher::new());
    let cfg = config(
        r"
default:
  binary: 'true'
  template: { repo: r, path: x.tpl }
  variables:
    REV: !cmd exit 1
",
    );
    let (name, target) = cfg.target("").unwrap();

    let err = runner.exec(target, name, &[]).await.unwrap_err();
    match err.downcast_ref::<DuckError>() {
        Some(DuckError::VariableResolution { name, .. }) => assert_eq!(name, "REV"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(runner.fetcher().calls(), 0);
    assert_eq!(object_count(&root), 0);
}

#[tokio::test]
async fn test_declaration_order_does_not_change_key() {
    let temp = tempfile::tempdir().unwrap();
    let a = config(
        r"
default:
  binary: 'true'
  template: { repo: r, path: x.tpl }
  variables: { A: '1', B: two, C: 3 }
",
    );
    let b = config(
        r"
default:
  binary: 'true'
  template: { repo: r, path: x.tpl }
  variables: { C: 3, A: '1', B: two }
",
    );
    let fetcher = FakeFetcher::new().with_file("x.tpl", "{{ A }}{{ B }}{{ C }}");
    let runner = runner(temp.path(), MapEnvironment::default(), fetcher);

    let first = runner.sync(a.target("").unwrap().1, "default", false).await.unwrap();
    let second = runner.sync(b.target("").unwrap().1, "default", false).await.unwrap();
    assert_eq!(first.key, second.key);
    assert!(!second.rendered);
    assert_eq!(runner.fetcher().calls(), 1);
}

#[tokio::test]
async fn test_missing_key_modes() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new().with_file("x.tpl", "[{{ .NAME }}][{{ .UNSET }}]");
    let runner = runner(temp.path(), MapEnvironment::default(), fetcher);

    let strict = config(
        r"
targets:
  strict:
    binary: 'true'
    template: { repo: r, path: x.tpl }
    variables: { NAME: duck }
  zero:
    binary: 'true'
    template: { repo: r, path: x.tpl, missingKey: zero }
    variables: { NAME: duck }
",
    );

    let (name, target) = strict.target("strict").unwrap();
    let err = runner.sync(target, name, false).await.unwrap_err();
    match err.downcast_ref::<DuckError>() {
        Some(DuckError::Render(RenderError::MissingVariable { variable, .. })) => {
            assert_eq!(variable, "UNSET");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let (name, target) = strict.target("zero").unwrap();
    let report = runner.sync(target, name, false).await.unwrap();
    assert_eq!(std::fs::read_to_string(report.link_path).unwrap(), "[duck][]");
}

#[tokio::test]
async fn test_custom_delimiters_and_rendered_name() {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = FakeFetcher::new().with_file(
        "task/Taskfile.yml.tpl",
        "tasks:\n  hi:\n    cmd: echo {{.CLI_ARGS}} [[ .GREETING ]]\n",
    );
    let runner = runner(temp.path(), MapEnvironment::default(), fetcher);
    let cfg = config(
        r#"
default:
  binary: task
  template:
    repo: r
    path: task/Taskfile.yml.tpl
    delims: { left: "[[", right: "]]" }
  renderedName: Taskfile.yaml
  variables: { GREETING: hello }
"#,
    );
    let (name, target) = cfg.target("").unwrap();

    let report = runner.sync(target, name, false).await.unwrap();
    assert!(report.link_path.ends_with("default/Taskfile.yaml"));
    assert_eq!(
        std::fs::read_to_string(&report.link_path).unwrap(),
        "tasks:\n  hi:\n    cmd: echo {{.CLI_ARGS}} hello\n"
    );
}
