//! Integration tests for artifact-cache

mod cache_tests {
    use artifact_cache::loader::ArtifactLoader;
    use artifact_cache::resolver::{ArtifactId, Resolver, VersionStamp};
    use artifact_cache::{ArtifactCache, CacheError, CacheResult};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Resolver for artifacts "a" and "b" sharing one movable build time
    struct Upstream {
        finished_at: Mutex<DateTime<Utc>>,
    }

    impl Upstream {
        fn new(finished_at: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self {
                finished_at: Mutex::new(finished_at),
            })
        }

        fn finish_build(&self, at: DateTime<Utc>) {
            *self.finished_at.lock().unwrap() = at;
        }
    }

    #[async_trait]
    impl Resolver for Upstream {
        async fn resolve_identity(&self, name: &str) -> CacheResult<ArtifactId> {
            match name {
                "a" => Ok(ArtifactId(1)),
                "b" => Ok(ArtifactId(2)),
                _ => Err(CacheError::NameNotFound(name.to_string())),
            }
        }

        async fn latest_version(&self, _id: ArtifactId) -> CacheResult<VersionStamp> {
            Ok(VersionStamp(*self.finished_at.lock().unwrap()))
        }
    }

    /// Loader returning "<name>-<n>" for the n-th call
    struct Downloader {
        calls: AtomicUsize,
        in_flight: AtomicBool,
        delay: Duration,
        fail: AtomicBool,
    }

    impl Downloader {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                in_flight: AtomicBool::new(false),
                delay,
                fail: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArtifactLoader<String> for Downloader {
        async fn load(&self, name: &str) -> CacheResult<String> {
            if name == "a" {
                assert!(
                    !self.in_flight.swap(true, Ordering::SeqCst),
                    "second concurrent download of {name}"
                );
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if name == "a" {
                self.in_flight.store(false, Ordering::SeqCst);
            }

            if self.fail.load(Ordering::SeqCst) {
                return Err(CacheError::load(name, "object store unavailable"));
            }
            Ok(format!("{name}-{n}"))
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn serves_cached_copy_until_a_newer_build_completes() {
        let upstream = Upstream::new(t0());
        let downloader = Downloader::new(Duration::ZERO);
        let cache = ArtifactCache::new(upstream.clone(), downloader.clone());

        // Initial request downloads
        let x = cache.get("a").await.unwrap();
        assert_eq!(*x, "a-1");
        assert_eq!(downloader.calls(), 1);

        // Same build: served from cache
        let again = cache.get("a").await.unwrap();
        assert!(Arc::ptr_eq(&x, &again));
        assert_eq!(downloader.calls(), 1);

        // Newer build completed: downloads once more
        upstream.finish_build(t0() + ChronoDuration::hours(1));
        let y = cache.get("a").await.unwrap();
        assert_eq!(*y, "a-2");
        assert_eq!(downloader.calls(), 2);

        let after = cache.get("a").await.unwrap();
        assert!(Arc::ptr_eq(&y, &after));
        assert_eq!(downloader.calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_download_once() {
        let upstream = Upstream::new(t0());
        let downloader = Downloader::new(Duration::from_millis(500));
        let cache = ArtifactCache::new(upstream, downloader.clone());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get("a").await })
            })
            .collect();

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(downloader.calls(), 1);
        assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_a_failed_download() {
        let upstream = Upstream::new(t0());
        let downloader = Downloader::new(Duration::from_millis(300));
        downloader.fail.store(true, Ordering::SeqCst);
        let cache = ArtifactCache::new(upstream, downloader.clone());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get("a").await })
            })
            .collect();

        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(err.is_transient());
            assert!(err.to_string().contains("object store unavailable"));
        }
        assert_eq!(downloader.calls(), 1);

        // Not cached: the next request downloads again
        downloader.fail.store(false, Ordering::SeqCst);
        assert_eq!(*cache.get("a").await.unwrap(), "a-2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn different_artifacts_load_in_parallel() {
        let upstream = Upstream::new(t0());
        let downloader = Downloader::new(Duration::from_millis(400));
        let cache = ArtifactCache::new(upstream, downloader.clone());

        let started = std::time::Instant::now();
        let (a, b) = tokio::join!(cache.get("a"), cache.get("b"));

        // Call numbers depend on which download starts first
        assert!(a.unwrap().starts_with("a-"));
        assert!(b.unwrap().starts_with("b-"));
        assert!(started.elapsed() < Duration::from_millis(750));
        assert_eq!(downloader.calls(), 2);
    }

    #[tokio::test]
    async fn unknown_name_is_not_found_and_not_cached() {
        let upstream = Upstream::new(t0());
        let downloader = Downloader::new(Duration::ZERO);
        let cache = ArtifactCache::new(upstream, downloader.clone());

        let err = cache.get("missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(err, CacheError::NameNotFound(ref n) if n == "missing"));
        assert_eq!(downloader.calls(), 0);
        assert_eq!(cache.stats().misses, 0);
    }
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn artifact_cache() -> Command {
        cargo_bin_cmd!("artifact-cache")
    }

    /// Write a config, catalog and artifact directory into `dir`
    fn fixture(dir: &Path) -> std::path::PathBuf {
        let artifacts = dir.join("artifacts");
        fs::create_dir_all(&artifacts).unwrap();
        fs::write(artifacts.join("github.com_acme_api"), b"hello").unwrap();

        let catalog = dir.join("catalog.json");
        fs::write(
            &catalog,
            r#"{
                "artifacts": [
                    {"id": 1, "name": "github.com/acme/api"},
                    {"id": 2, "name": "github.com/acme/web"}
                ],
                "builds": [
                    {"artifact_id": 1, "state": "completed", "finished_at": "2026-05-04T12:00:00Z"},
                    {"artifact_id": 2, "state": "queued"}
                ]
            }"#,
        )
        .unwrap();

        let config = dir.join("config.toml");
        fs::write(
            &config,
            format!(
                "[catalog]\npath = {:?}\n\n[loader]\nartifact_dir = {:?}\n",
                catalog.display().to_string(),
                artifacts.display().to_string()
            ),
        )
        .unwrap();
        config
    }

    #[test]
    fn help_displays() {
        artifact_cache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Versioned single-flight cache for expensive precomputed artifacts",
            ));
    }

    #[test]
    fn version_displays() {
        artifact_cache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("artifact-cache"));
    }

    #[test]
    fn config_path_honors_flag() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("custom.toml");
        artifact_cache()
            .args(["config", "path", "--config"])
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        artifact_cache()
            .args(["config", "show", "--config"])
            .arg(dir.path().join("absent.toml"))
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"));
    }

    #[test]
    fn get_serves_second_round_from_cache() {
        let dir = TempDir::new().unwrap();
        let config = fixture(dir.path());

        artifact_cache()
            .args(["get", "github.com/acme/api", "--rounds", "2", "--format", "json"])
            .arg("--config")
            .arg(&config)
            .assert()
            .success()
            .stdout(
                predicate::str::contains(
                    "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
                )
                .and(predicate::str::contains("\"cached\": true"))
                .and(predicate::str::contains("\"misses\": 1")),
            );
    }

    #[test]
    fn get_unknown_name_fails() {
        let dir = TempDir::new().unwrap();
        let config = fixture(dir.path());

        artifact_cache()
            .args(["get", "github.com/acme/missing", "--config"])
            .arg(&config)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Artifact not found"));
    }

    #[test]
    fn get_unbuilt_artifact_fails_with_hint() {
        let dir = TempDir::new().unwrap();
        let config = fixture(dir.path());

        artifact_cache()
            .args(["get", "github.com/acme/web", "--config"])
            .arg(&config)
            .assert()
            .failure()
            .stderr(
                predicate::str::contains("no completed build")
                    .and(predicate::str::contains("Hint:")),
            );
    }
}
