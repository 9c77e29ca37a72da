use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use git2::{IndexAddOption, Repository, Signature};
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn stencil_cmd(home: &Path, repo: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("stencil"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env_remove("RUST_LOG")
        .arg("-C")
        .arg(repo);
    cmd
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

/// Local template directory rendered in place.
fn template_dir() -> TempDir {
    let dir = TempDir::new().expect("template");
    write(
        &dir.path().join("stencil.json"),
        r#"{"project_slug": "service", "owner": "nobody"}"#,
    );
    let top = dir.path().join("{{ stencil.project_slug }}");
    write(&top.join("README.md"), "# {{ stencil.project_slug }}\nowned by {{ stencil.owner }}\n");
    write(&top.join(".stencil.json"), "{{ stencil | json_encode(pretty=true) | safe }}\n");
    dir
}

struct Fixture {
    home: TempDir,
    template: TempDir,
    work: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            home: TempDir::new().expect("home"),
            template: template_dir(),
            work: TempDir::new().expect("work"),
        }
    }

    fn repo_path(&self) -> PathBuf {
        self.work.path().join("project")
    }

    fn template_locator(&self) -> String {
        self.template.path().to_string_lossy().into_owned()
    }

    fn cmd(&self) -> Command {
        stencil_cmd(self.home.path(), &self.repo_path())
    }

    fn install(&self, extra: &[&str]) -> assert_cmd::assert::Assert {
        self.cmd()
            .args(["install", &self.template_locator(), "--no-input"])
            .args(["--initial-branch", "main"])
            .args(extra)
            .assert()
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.repo_path().join(rel)).expect(rel)
    }
}

fn commit_all(path: &Path, message: &str) {
    let repo = Repository::open(path).expect("open");
    let mut index = repo.index().expect("index");
    index
        .add_all(["*"], IndexAddOption::DEFAULT, None)
        .expect("add");
    index.write().expect("write index");
    let tree = repo.find_tree(index.write_tree().expect("tree")).expect("find tree");
    let sig = Signature::now("tester", "tester@example.com").expect("sig");
    let head = repo.head().expect("head").peel_to_commit().expect("head commit");
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&head])
        .expect("commit");
}

#[test]
fn install_initializes_repository_and_merges_template() {
    let fx = Fixture::new();

    fx.install(&[])
        .success()
        .stdout(contains("Installed template"));

    assert_eq!(fx.read("README.md"), "# service\nowned by nobody\n");
    let repo = Repository::open(fx.repo_path()).expect("repo");
    assert_eq!(repo.head().expect("head").shorthand(), Some("main"));
    assert!(repo.find_branch("template", git2::BranchType::Local).is_ok());
    let merged = repo.head().expect("head").peel_to_commit().expect("commit");
    assert_eq!(merged.parent_count(), 2);
    assert_eq!(
        merged.message(),
        Some(format!("Installed template '{}'", fx.template_locator()).as_str())
    );
}

#[test]
fn install_twice_fails() {
    let fx = Fixture::new();
    fx.install(&[]).success();

    fx.install(&[])
        .failure()
        .stderr(contains("template already installed"));
}

#[test]
fn install_rejects_malformed_config_before_touching_the_directory() {
    let fx = Fixture::new();
    let repo = fx.repo_path();
    write(&repo.join(".stencil.yaml"), "identity: [not, a, mapping\n");

    fx.install(&[])
        .failure()
        .stderr(contains("failed to load config"));

    assert!(!repo.join(".git").exists());
}

#[test]
fn context_flags_override_template_defaults() {
    let fx = Fixture::new();

    fx.install(&["--context", "owner=platform"]).success();

    assert_eq!(fx.read("README.md"), "# service\nowned by platform\n");
}

#[test]
fn show_json_reports_installed_template() {
    let fx = Fixture::new();
    fx.install(&["--context", "owner=platform"]).success();

    let assert = fx.cmd().args(["show", "--json"]).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let payload: Value = serde_json::from_str(&stdout).expect("json");

    assert_eq!(payload["template"], Value::String(fx.template_locator()));
    assert_eq!(payload["checkout"], Value::Null);
    assert_eq!(payload["installed"], Value::Bool(true));
    assert_eq!(payload["context"]["owner"], Value::String("platform".to_string()));
}

#[test]
fn show_table_lists_public_variables() {
    let fx = Fixture::new();
    fx.install(&[]).success();

    fx.cmd()
        .arg("show")
        .assert()
        .success()
        .stdout(contains("project_slug"))
        .stdout(contains("nobody"));
}

#[test]
fn upgrade_without_install_fails() {
    let fx = Fixture::new();
    let repo = fx.repo_path();
    fs::create_dir_all(&repo).expect("mkdir");
    let git = Repository::init(&repo).expect("init");
    write(&repo.join("app.txt"), "app\n");
    {
        let mut index = git.index().expect("index");
        index.add_path(Path::new("app.txt")).expect("add");
        index.write().expect("write");
        let tree = git.find_tree(index.write_tree().expect("tree")).expect("tree");
        let sig = Signature::now("tester", "tester@example.com").expect("sig");
        git.commit(Some("HEAD"), &sig, &sig, "app", &tree, &[]).expect("commit");
    }

    fx.cmd()
        .args(["upgrade", "--no-input"])
        .assert()
        .failure()
        .stderr(contains("template could not be found"));
}

#[test]
fn upgrade_merges_template_changes() {
    let fx = Fixture::new();
    fx.install(&[]).success();
    write(&fx.repo_path().join("notes.md"), "local notes\n");
    commit_all(&fx.repo_path(), "Add notes");
    write(
        &fx.template.path().join("{{ stencil.project_slug }}/CHANGELOG.md"),
        "# {{ stencil.project_slug }} changelog\n",
    );

    fx.cmd()
        .args(["upgrade", "--no-input"])
        .assert()
        .success()
        .stdout(contains("Upgraded template"));

    assert_eq!(fx.read("CHANGELOG.md"), "# service changelog\n");
    assert_eq!(fx.read("notes.md"), "local notes\n");
}

#[test]
fn conflicting_upgrade_exits_with_guidance() {
    let fx = Fixture::new();
    fx.install(&[]).success();
    write(&fx.repo_path().join("README.md"), "# hand written\n");
    commit_all(&fx.repo_path(), "Rewrite README");
    write(
        &fx.template.path().join("{{ stencil.project_slug }}/README.md"),
        "# {{ stencil.project_slug }} v2\n",
    );

    fx.cmd()
        .args(["upgrade", "--no-input"])
        .assert()
        .code(1)
        .stderr(contains(
            "Cannot merge upgrade automatically, please manually resolve the conflicts",
        ));

    let repo = Repository::open(fx.repo_path()).expect("repo");
    assert_eq!(repo.state(), git2::RepositoryState::Merge);
}

#[test]
fn merge_after_install_is_up_to_date() {
    let fx = Fixture::new();
    fx.install(&[]).success();

    fx.cmd()
        .arg("merge")
        .assert()
        .success()
        .stdout(contains("already up to date"));
}
