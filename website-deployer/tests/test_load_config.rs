use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::{tempdir, NamedTempFile};
use website_deployer::load_config::{load_config, LOCALHOST_ENV};
use website_deployer_core::config::DEFAULT_CACHE_CONTROL;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

#[test]
#[serial]
fn loads_every_section() {
    env::remove_var(LOCALHOST_ENV);
    let file = config_file(
        r#"
site:
  work_dir: ./site
  static_dir: assets
  index_file: home.html
  redirects_file: config/redirects.json
server:
  host: 0.0.0.0
  program: bundle
  args: ["exec", "rackup", "-p", "{port}"]
  settle_ms: 250
crawl:
  fatal_patterns: ["ERROR 50[0-9]"]
upload:
  cache_control: "no-cache"
cdn:
  wait: false
  max_polls: 3
  retry:
    max_attempts: 2
"#,
    );

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.site.work_dir, PathBuf::from("./site"));
    assert_eq!(config.site.static_dir, Some(PathBuf::from("assets")));
    assert_eq!(config.site.index_file, "home.html");
    assert_eq!(config.site.redirects_file, PathBuf::from("config/redirects.json"));
    assert_eq!(config.site.not_found_file, "404.html");
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.program, "bundle");
    assert_eq!(config.server.args, vec!["exec", "rackup", "-p", "{port}"]);
    assert_eq!(config.server.settle_ms, 250);
    assert_eq!(config.crawl.program, "wget");
    assert_eq!(config.crawl.fatal_patterns, vec!["ERROR 50[0-9]"]);
    assert_eq!(config.upload.cache_control, "no-cache");
    assert!(!config.cdn.wait);
    assert_eq!(config.cdn.max_polls, 3);
    assert_eq!(config.cdn.retry.max_attempts, 2);
    assert_eq!(config.cdn.retry.initial_backoff_ms, 1000);
}

#[test]
#[serial]
fn missing_file_means_defaults() {
    env::remove_var(LOCALHOST_ENV);
    let dir = tempdir().unwrap();

    let config = load_config(dir.path().join("deploy.yaml")).expect("Defaults should load");

    assert_eq!(config.server.host, "localhost");
    assert_eq!(config.server.program, "ruby");
    assert_eq!(config.crawl.program, "wget");
    assert_eq!(config.site.index_file, "index.html");
    assert_eq!(config.upload.cache_control, DEFAULT_CACHE_CONTROL);
    assert!(config.cdn.wait);
}

#[test]
#[serial]
fn empty_file_means_defaults() {
    env::remove_var(LOCALHOST_ENV);
    let file = config_file("\n");

    let config = load_config(file.path()).expect("Empty config should load");
    assert_eq!(config.site.seeds_file, PathBuf::from("Files"));
}

#[test]
#[serial]
fn localhost_env_overrides_server_host() {
    let file = config_file("server:\n  host: example.local\n");
    env::set_var(LOCALHOST_ENV, "127.0.0.1");

    let config = load_config(file.path()).expect("Config should load");
    env::remove_var(LOCALHOST_ENV);

    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
#[serial]
fn blank_localhost_env_is_ignored() {
    let file = config_file("server:\n  host: example.local\n");
    env::set_var(LOCALHOST_ENV, "   ");

    let config = load_config(file.path()).expect("Config should load");
    env::remove_var(LOCALHOST_ENV);

    assert_eq!(config.server.host, "example.local");
}

#[test]
#[serial]
fn invalid_yaml_is_an_error() {
    let file = config_file("cdn:\n  wait: [not, a, bool]\n");

    let err = load_config(file.path()).unwrap_err();
    assert!(
        format!("{err:#}").contains("Failed to parse config YAML"),
        "unexpected error: {err:#}"
    );
}
