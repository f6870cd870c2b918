//! End-to-end candidate resolution over real directory trees.

use import_prompter_core::{Config, ImportPrompter, NoWatcher, StaticHost};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};
use tokio::runtime::Handle;

const FIXTURE: &str = r#"{
  "name": "fixture",
  "version": "1.0.0",
  "dependencies": { "lodash": "^4.17.21" },
  "devDependencies": { "vitest": "^1.0.0" },
  "peerDependencies": { "react": "^18.0.0" }
}"#;

/// Project with `src/index.ts` and the given root manifest.
fn project(manifest: &str) -> TempDir {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(dir.path().join("src/index.ts"), "// test file").unwrap();
    fs::write(dir.path().join("package.json"), manifest).unwrap();
    dir
}

fn prompter(root: &Path, file: &Path, config: Config) -> ImportPrompter<StaticHost> {
    ImportPrompter::new(
        StaticHost::new(file, root),
        config,
        Arc::new(NoWatcher),
        Handle::current(),
    )
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

#[tokio::test]
async fn test_returns_deps_dev_deps_and_peers_when_enabled() {
    let dir = project(FIXTURE);
    let p = prompter(dir.path(), &dir.path().join("src/index.ts"), Config::default());

    assert_eq!(p.get_scripts(), Some(strings(&["lodash", "react", "vitest"])));
}

#[tokio::test]
async fn test_excludes_peers_when_disabled() {
    let dir = project(FIXTURE);
    let config = Config::default().with_peer_dependencies(false);
    let p = prompter(dir.path(), &dir.path().join("src/index.ts"), config);

    assert_eq!(p.get_scripts(), Some(strings(&["lodash", "vitest"])));
}

#[tokio::test]
async fn test_includes_pnpm_workspace_members() {
    let dir = project(r#"{"name": "monorepo"}"#);
    fs::write(
        dir.path().join("pnpm-workspace.yaml"),
        "packages:\n  - packages/*\n",
    )
    .unwrap();
    let pkg_a = dir.path().join("packages/pkg-a");
    fs::create_dir_all(&pkg_a).unwrap();
    fs::write(pkg_a.join("package.json"), r#"{"name": "workspace-pkg-a"}"#).unwrap();

    let p = prompter(dir.path(), &dir.path().join("src/index.ts"), Config::default());
    let names = p.get_scripts().unwrap();

    assert!(names.contains(&"workspace-pkg-a".to_string()));
}

#[tokio::test]
async fn test_merges_member_project_with_workspace_root() {
    let dir = project(r#"{"devDependencies": {"typescript": "^5", "vitest": "^1"}}"#);
    fs::write(
        dir.path().join("pnpm-workspace.yaml"),
        "packages:\n  - 'apps/*'\n  - 'packages/*'\n",
    )
    .unwrap();
    let web = dir.path().join("apps/web");
    fs::create_dir_all(web.join("src")).unwrap();
    fs::write(
        web.join("package.json"),
        r#"{"name": "web", "dependencies": {"react": "^18", "@acme/ui": "workspace:*"}}"#,
    )
    .unwrap();
    let ui = dir.path().join("packages/ui");
    fs::create_dir_all(&ui).unwrap();
    fs::write(ui.join("package.json"), r#"{"name": "@acme/ui"}"#).unwrap();

    let p = prompter(dir.path(), &web.join("src/App.tsx"), Config::default());

    assert_eq!(
        p.get_scripts(),
        Some(strings(&["@acme/ui", "react", "typescript", "vitest", "web"]))
    );
}

#[tokio::test]
async fn test_clearing_caches_rereads_manifests() {
    let dir = project(FIXTURE);
    let p = prompter(dir.path(), &dir.path().join("src/index.ts"), Config::default());

    p.get_scripts();
    p.get_scripts();
    let before = p.stats().manifest_reads;
    assert_eq!(before, 1);

    p.clear_all_caches();
    fs::write(
        dir.path().join("package.json"),
        r#"{"dependencies": {"zod": "^3"}}"#,
    )
    .unwrap();

    assert_eq!(p.get_scripts(), Some(strings(&["zod"])));
    assert_eq!(p.stats().manifest_reads, before + 1);
}

#[tokio::test]
async fn test_invalid_manifest_degrades_to_empty() {
    let dir = project("{ this is not json");
    let p = prompter(dir.path(), &dir.path().join("src/index.ts"), Config::default());

    assert_eq!(p.get_scripts(), Some(Vec::new()));
}
