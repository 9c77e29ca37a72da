use std::fs;
use std::path::Path;

use git2::{Repository, Signature};
use rstest::rstest;
use serde_json::Value;
use stencil_core::Context;
use stencil_renderer::{RenderError, RenderRequest, TemplateRenderer, TeraRenderer};
use tempfile::TempDir;

const TOP: &str = "{{ stencil.project_slug }}";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

fn commit_all(repo: &Repository, message: &str, parents: &[git2::Oid]) -> git2::Oid {
    let mut index = repo.index().expect("index");
    index
        .add_all(["*"], git2::IndexAddOption::DEFAULT, None)
        .expect("add_all");
    index.write().expect("write index");
    let tree = repo.find_tree(index.write_tree().expect("tree")).expect("find tree");
    let sig = Signature::now("tester", "tester@example.com").expect("sig");
    let parents: Vec<_> = parents
        .iter()
        .map(|oid| repo.find_commit(*oid).expect("parent"))
        .collect();
    let parent_refs: Vec<_> = parents.iter().collect();
    repo.commit(None, &sig, &sig, message, &tree, &parent_refs)
        .expect("commit")
}

/// Template repository with `main` (v1 README) and `upgrade` (v2 README).
fn template_repo() -> TempDir {
    let dir = TempDir::new().expect("template dir");
    let repo = Repository::init(dir.path()).expect("init");

    write(dir.path(), "stencil.json", r#"{"project_slug": "demo", "owner": "ops"}"#);
    write(dir.path(), &format!("{TOP}/README.md"), "v1 for {{ stencil.owner }}\n");
    write(
        dir.path(),
        &format!("{TOP}/.stencil.json"),
        "{{ stencil | json_encode(pretty=true) | safe }}\n",
    );
    let main = commit_all(&repo, "v1", &[]);
    repo.branch("main", &repo.find_commit(main).expect("main"), true)
        .expect("main branch");
    repo.set_head("refs/heads/main").expect("head");

    write(dir.path(), &format!("{TOP}/README.md"), "v2 for {{ stencil.owner }}\n");
    let upgrade = commit_all(&repo, "v2", &[main]);
    repo.branch("upgrade", &repo.find_commit(upgrade).expect("upgrade"), true)
        .expect("upgrade branch");

    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.force();
    repo.checkout_head(Some(&mut checkout)).expect("checkout main");
    dir
}

fn render(
    template: &TempDir,
    checkout: Option<&str>,
    context: &Context,
) -> Result<TempDir, RenderError> {
    let out = TempDir::new().expect("out");
    let locator = template.path().to_string_lossy().into_owned();
    let request = RenderRequest {
        source: &locator,
        checkout,
        context,
        no_input: true,
    };
    TeraRenderer::new().render(&request, out.path())?;
    Ok(out)
}

#[rstest]
#[case::working_tree(None, "v1 for ops\n")]
#[case::main_branch(Some("main"), "v1 for ops\n")]
#[case::upgrade_branch(Some("upgrade"), "v2 for ops\n")]
fn renders_requested_revision(#[case] checkout: Option<&str>, #[case] expected: &str) {
    let template = template_repo();
    let out = render(&template, checkout, &Context::new()).expect("render");
    let readme = fs::read_to_string(out.path().join("demo/README.md")).expect("readme");
    assert_eq!(readme, expected);
}

#[test]
fn rendered_context_document_records_source_and_checkout() {
    let template = template_repo();
    let mut overrides = Context::new();
    overrides.insert("owner", "platform");
    let out = render(&template, Some("upgrade"), &overrides).expect("render");

    let raw = fs::read_to_string(out.path().join("demo/.stencil.json")).expect("context doc");
    let doc: Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(doc["_template"], Value::String(template.path().to_string_lossy().into_owned()));
    assert_eq!(doc["_checkout"], Value::String("upgrade".to_string()));
    assert_eq!(doc["owner"], Value::String("platform".to_string()));
}

#[test]
fn output_holds_exactly_one_top_level_directory() {
    let template = template_repo();
    let out = render(&template, Some("main"), &Context::new()).expect("render");
    let entries: Vec<_> = fs::read_dir(out.path())
        .expect("read out")
        .map(|e| e.expect("entry").file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("demo")]);
}

#[test]
fn unknown_revision_is_reported() {
    let template = template_repo();
    let err = render(&template, Some("does-not-exist"), &Context::new()).unwrap_err();
    match err {
        RenderError::RevisionNotFound { revision, .. } => assert_eq!(revision, "does-not-exist"),
        other => panic!("expected RevisionNotFound, got {other:?}"),
    }
}
