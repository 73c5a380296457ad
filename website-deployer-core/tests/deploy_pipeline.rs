use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tempfile::{tempdir, TempDir};
use website_deployer_core::config::{CdnConfig, DeployConfig};
use website_deployer_core::contract::{
    Distribution, MockCdn, MockObjectStore, MockSiteBuilder, PutObject, RemoteObject, RenderedSite,
};
use website_deployer_core::deploy::{deploy, DeployOptions};
use website_deployer_core::invalidate::InvalidationOutcome;
use website_deployer_core::site::md5_hex;
use website_deployer_core::sync::SyncAction;
use website_deployer_core::DeployError;

const DOMAIN: &str = "www.example.com";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn rendered_site(files: &[(&str, &str)]) -> TempDir {
    let dir = tempdir().unwrap();
    for (rel, content) in files {
        write(dir.path(), rel, content);
    }
    dir
}

fn builder_for(root: &Path) -> MockSiteBuilder {
    let root = root.to_path_buf();
    let mut builder = MockSiteBuilder::new();
    builder.expect_build().times(1).returning(move || {
        Ok(RenderedSite {
            root: root.clone(),
        })
    });
    builder
}

fn config(work_dir: &Path) -> DeployConfig {
    let mut config = DeployConfig::default();
    config.site.work_dir = work_dir.to_path_buf();
    config.cdn = CdnConfig {
        wait: false,
        ..CdnConfig::default()
    };
    config
}

fn options(force: bool, dry_run: bool) -> DeployOptions {
    DeployOptions {
        domain: DOMAIN.to_string(),
        force,
        dry_run,
    }
}

fn remote(key: &str, etag: &str) -> RemoteObject {
    RemoteObject {
        key: key.to_string(),
        etag: format!("\"{etag}\""),
        content_type: Some("text/html;charset=utf-8".into()),
        cache_control: None,
    }
}

fn cdn_expecting(paths: Vec<String>) -> MockCdn {
    let mut cdn = MockCdn::new();
    cdn.expect_list_distributions().times(1).returning(|| {
        Ok(vec![Distribution {
            id: "E1".into(),
            aliases: vec![DOMAIN.into()],
        }])
    });
    cdn.expect_create_invalidation()
        .withf(move |dist: &str, got: &[String], _| dist == "E1" && got.to_vec() == paths)
        .times(1)
        .returning(|_, _, _| Ok("INV".to_string()));
    cdn
}

#[tokio::test]
async fn deploy_publishes_changes_and_invalidates_them() {
    let site = rendered_site(&[
        ("index.html", "<h1>home</h1>"),
        ("404.html", "<h1>404</h1>"),
        ("blog/index.html", "<h1>blog v2</h1>"),
    ]);
    let work_dir = tempdir().unwrap();
    write(work_dir.path(), "redirects.json", r#"{"legacy.html": "/blog/"}"#);

    let mut store = MockObjectStore::new();
    store.expect_list_objects().times(1).returning(|| {
        Ok(vec![
            remote("index.html", &md5_hex(b"<h1>home</h1>")),
            remote("blog/index.html", "stale"),
            remote("old.html", "gone"),
        ])
    });
    let puts = Arc::new(Mutex::new(Vec::<PutObject>::new()));
    let recorded = puts.clone();
    store.expect_put_object().returning(move |req| {
        recorded.lock().unwrap().push(req);
        Ok(())
    });
    store
        .expect_delete_object()
        .withf(|key: &str| key == "old.html")
        .times(1)
        .returning(|_| Ok(()));

    let cdn = cdn_expecting(vec![
        "/blog/index.html".into(),
        "/blog/".into(),
        "/old.html".into(),
        "/404.html".into(),
        "/legacy.html".into(),
    ]);

    let report = deploy(
        &config(work_dir.path()),
        &options(false, false),
        &builder_for(site.path()),
        &store,
        &cdn,
    )
    .await
    .expect("deploy should succeed");

    assert_eq!(report.sync.unchanged, 1);
    assert_eq!(report.sync.updated, 1);
    assert_eq!(report.sync.uploaded, 1);
    assert_eq!(report.sync.deleted, 1);
    assert_eq!(report.sync.redirected, 1);
    assert!(matches!(
        report.invalidation,
        Some(InvalidationOutcome::Pending { ref invalidation_id, .. }) if invalidation_id == "INV"
    ));

    let puts = puts.lock().unwrap();
    let keys: Vec<&str> = puts.iter().map(|p| p.key.as_str()).collect();
    assert_eq!(keys, vec!["blog/index.html", "404.html", "legacy.html"]);
}

#[tokio::test]
async fn dry_run_plans_without_mutating() {
    let site = rendered_site(&[("index.html", "home"), ("about.html", "about")]);
    let work_dir = tempdir().unwrap();

    let mut store = MockObjectStore::new();
    store
        .expect_list_objects()
        .returning(|| Ok(vec![remote("old.html", "x")]));
    // No put/delete expectations and an empty CDN mock: any mutation panics.
    let cdn = MockCdn::new();

    let report = deploy(
        &config(work_dir.path()),
        &options(false, true),
        &builder_for(site.path()),
        &store,
        &cdn,
    )
    .await
    .expect("dry run should succeed");

    assert!(report.invalidation.is_none());
    assert_eq!(report.sync.deleted, 1);
    assert_eq!(report.sync.uploaded, 2);
    assert!(report
        .planned
        .iter()
        .any(|a| matches!(a, SyncAction::Delete { key } if key == "old.html")));
}

#[tokio::test]
async fn render_without_home_page_publishes_nothing() {
    let site = rendered_site(&[("404.html", "not found")]);
    let work_dir = tempdir().unwrap();
    let store = MockObjectStore::new();
    let cdn = MockCdn::new();

    let err = deploy(
        &config(work_dir.path()),
        &options(true, false),
        &builder_for(site.path()),
        &store,
        &cdn,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DeployError::NoHomePage { file_count: 1, .. }));
}

#[tokio::test]
async fn crawl_failure_aborts_before_sync() {
    let mut builder = MockSiteBuilder::new();
    builder.expect_build().returning(|| {
        Err(DeployError::CrawlAborted {
            log: "ERROR 500: Internal Server Error".into(),
        })
    });
    let work_dir = tempdir().unwrap();

    let err = deploy(
        &config(work_dir.path()),
        &options(false, false),
        &builder,
        &MockObjectStore::new(),
        &MockCdn::new(),
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("ERROR 500"));
}

#[tokio::test]
async fn forced_deploy_reuploads_and_invalidates_everything() {
    let site = rendered_site(&[("index.html", "home")]);
    let work_dir = tempdir().unwrap();

    let mut store = MockObjectStore::new();
    store
        .expect_list_objects()
        .returning(|| Ok(vec![remote("index.html", &md5_hex(b"home"))]));
    store
        .expect_put_object()
        .withf(|req: &PutObject| req.key == "index.html")
        .times(1)
        .returning(|_| Ok(()));
    let cdn = cdn_expecting(vec!["/*".into()]);

    let report = deploy(
        &config(work_dir.path()),
        &options(true, false),
        &builder_for(site.path()),
        &store,
        &cdn,
    )
    .await
    .expect("forced deploy should succeed");

    assert_eq!(report.sync.updated, 1);
}

#[tokio::test]
async fn invalid_redirects_file_fails_the_deploy() {
    let site = rendered_site(&[("index.html", "home")]);
    let work_dir = tempdir().unwrap();
    write(work_dir.path(), "redirects.json", "[\"not\", \"a\", \"map\"]");

    let err = deploy(
        &config(work_dir.path()),
        &options(false, false),
        &builder_for(site.path()),
        &MockObjectStore::new(),
        &MockCdn::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DeployError::Redirects { .. }));
}
