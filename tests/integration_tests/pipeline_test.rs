//! End-to-end pipeline integration tests
//!
//! Tests the complete workflow:
//! 1. Seeding from board/thread operands
//! 2. HTTP fetch (mocked)
//! 3. Post extraction and dedup
//! 4. Archive and image persistence
//! 5. Cache dump and reload

use chandere::crawler::{ScrapeSession, SessionReport};
use chandere::models::Mode;
use chandere::storage::CacheStore;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::{
    board_page, op_post, options, paged_registry, protocol_relative, reply_post, serve,
    single_page_registry, test_config, thread_page, Attachment, POST_DATE, POST_TIME,
};

/// One single-page board run over `/g/` with a one-cycle drain
async fn run_board(dir: &Path, server: &MockServer, archive: &Path) -> SessionReport {
    let (_shutdown, shutdown_rx) = watch::channel(false);
    ScrapeSession::new(test_config(dir), options(Mode::Archive, "g", server, archive))
        .with_registry(single_page_registry(Mode::Archive))
        .with_max_cycles(1)
        .run(shutdown_rx)
        .await
        .unwrap()
}

fn sample_thread() -> String {
    thread_page(
        "g",
        &[
            op_post("10000001", None, "Best .cbr reader for android?"),
            reply_post("10000002", None, "Perfect Viewer"),
            reply_post("10000003", None, "ComicScreen<br>it&#039;s free"),
        ],
    )
}

#[tokio::test]
async fn test_archive_thread_session() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/g/thread/10000001", sample_thread()).await;

    let archive = temp_dir.path().join("archive.txt");
    let (_shutdown, shutdown_rx) = watch::channel(false);
    let report = ScrapeSession::new(
        test_config(temp_dir.path()),
        options(Mode::Archive, "/g/10000001", &mock_server, &archive),
    )
    .with_max_cycles(1)
    .run(shutdown_rx)
    .await
    .unwrap();

    assert_eq!(report.cycles, 1);
    assert_eq!(report.stats.pages_fetched, 1);
    assert_eq!(report.stats.records_emitted, 3);
    assert_eq!(report.stats.records_persisted, 3);

    let content = std::fs::read_to_string(&archive).unwrap();
    let expected_op = format!(
        "\n********************\nPost ID: 10000001\nFile: [No File]\n\
         Anonymous posted this on {POST_DATE} at {POST_TIME}\n\
         Best .cbr reader for android?\n********************"
    );
    assert!(content.starts_with(&expected_op), "archive was:\n{content}");
    assert!(content.contains("Post ID: 10000002\nFile: [No File]\nReply to: 10000001\n"));
    assert!(content.contains("ComicScreen\nit's free\n"));
    assert_eq!(content.matches("Reply to: 10000001").count(), 2);

    // Seeds are dropped, every post is kept
    let dumped = report.dumped.unwrap();
    let cache = CacheStore::new(Some(dumped)).load(Mode::Archive);
    assert_eq!(cache.len(), 3);
    assert!(cache.iter().all(|entry| !entry.is_board_level()));
}

#[tokio::test]
async fn test_board_refresh_follows_threads() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    serve(
        &mock_server,
        "/g/",
        board_page("g", &[op_post("10000001", None, "Best .cbr reader for android?")]),
    )
    .await;
    serve(&mock_server, "/g/thread/10000001", sample_thread()).await;

    let archive = temp_dir.path().join("archive.txt");
    let (_shutdown, shutdown_rx) = watch::channel(false);
    let report = ScrapeSession::new(
        test_config(temp_dir.path()),
        options(Mode::Archive, "g", &mock_server, &archive),
    )
    .with_registry(single_page_registry(Mode::Archive))
    .with_max_cycles(2)
    .run(shutdown_rx)
    .await
    .unwrap();

    // The op comes from the board page, the replies from the thread
    // permalink enqueued on the second cycle
    assert_eq!(report.cycles, 2);
    assert_eq!(report.stats.records_persisted, 3);

    let content = std::fs::read_to_string(&archive).unwrap();
    assert_eq!(content.matches("Post ID: 10000001\n").count(), 1);
    assert_eq!(content.matches("Reply to: 10000001").count(), 2);
}

#[tokio::test]
async fn test_restart_skips_known_posts() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    serve(
        &mock_server,
        "/g/",
        board_page("g", &[op_post("10000001", None, "first")]),
    )
    .await;
    serve(&mock_server, "/g/thread/10000001", sample_thread()).await;

    let archive = temp_dir.path().join("archive.txt");

    let first = run_board(temp_dir.path(), &mock_server, &archive).await;
    assert_eq!(first.stats.records_persisted, 1);

    // The dumped thread permalink is fetched first on the next run, so its
    // replies are new but the op is not
    let second = run_board(temp_dir.path(), &mock_server, &archive).await;
    assert_eq!(second.stats.records_persisted, 2);

    let third = run_board(temp_dir.path(), &mock_server, &archive).await;
    assert_eq!(third.stats.records_emitted, 0);

    let content = std::fs::read_to_string(&archive).unwrap();
    assert_eq!(content.matches("Post ID: ").count(), 3);
}

/// Board run over `/g/` followed by a thread run over `/g/20000001`
async fn board_then_thread(dir: &Path, server: &MockServer, merge: bool) -> Vec<String> {
    serve(
        server,
        "/g/",
        board_page("g", &[op_post("10000001", None, "first")]),
    )
    .await;
    serve(
        server,
        "/g/thread/20000001",
        thread_page("g", &[op_post("20000001", None, "other thread")]),
    )
    .await;

    let archive = dir.join("archive.txt");
    run_board(dir, server, &archive).await;

    let mut config = test_config(dir);
    config.cache.merge_thread_runs = merge;
    let (_shutdown, shutdown_rx) = watch::channel(false);
    let report = ScrapeSession::new(
        config,
        options(Mode::Archive, "/g/20000001", server, &archive),
    )
    .with_max_cycles(1)
    .run(shutdown_rx)
    .await
    .unwrap();
    assert_eq!(report.stats.records_persisted, 1);

    CacheStore::new(report.dumped)
        .load(Mode::Archive)
        .iter()
        .filter_map(|e| e.post_id.clone())
        .collect()
}

#[tokio::test]
async fn test_thread_run_dumps_only_its_own_entries() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    let ids = board_then_thread(temp_dir.path(), &mock_server, false).await;

    assert_eq!(ids, vec!["20000001".to_string()]);
}

#[tokio::test]
async fn test_thread_run_merges_board_cache_when_enabled() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    let ids = board_then_thread(temp_dir.path(), &mock_server, true).await;

    assert_eq!(ids.len(), 2);
    assert!(ids.iter().any(|id| id == "10000001"));
    assert!(ids.iter().any(|id| id == "20000001"));
}

#[tokio::test]
async fn test_image_session_downloads_files() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    let host = protocol_relative(&mock_server.uri());

    let op_href = format!("{host}/images/1465635673193.jpg");
    let reply_href = format!("{host}/images/1465636093120.png");
    let missing_href = format!("{host}/images/gone.gif");
    serve(
        &mock_server,
        "/g/thread/10000001",
        thread_page(
            "g",
            &[
                op_post(
                    "10000001",
                    Some(Attachment {
                        href: &op_href,
                        filename: "back.jpg",
                    }),
                    "op",
                ),
                reply_post("10000002", None, "no file"),
                reply_post(
                    "10000003",
                    Some(Attachment {
                        href: &reply_href,
                        filename: "screen.png",
                    }),
                    "reply",
                ),
                reply_post(
                    "10000004",
                    Some(Attachment {
                        href: &missing_href,
                        filename: "gone.gif",
                    }),
                    "missing",
                ),
            ],
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/images/1465635673193.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/images/1465636093120.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png-bytes".to_vec()))
        .mount(&mock_server)
        .await;

    let images = temp_dir.path().join("images");
    std::fs::create_dir(&images).unwrap();
    std::fs::write(images.join("back.jpg"), b"older").unwrap();

    let (_shutdown, shutdown_rx) = watch::channel(false);
    let report = ScrapeSession::new(
        test_config(temp_dir.path()),
        options(Mode::ImageDownload, "/g/10000001", &mock_server, &images),
    )
    .with_max_cycles(1)
    .run(shutdown_rx)
    .await
    .unwrap();

    assert_eq!(report.stats.records_emitted, 3);
    assert_eq!(report.stats.records_persisted, 2);
    // One post without a file, one failed download
    assert_eq!(report.stats.posts_skipped, 2);

    assert_eq!(std::fs::read(images.join("back.jpg")).unwrap(), b"older");
    assert_eq!(std::fs::read(images.join("(copy)back.jpg")).unwrap(), b"jpeg-bytes");
    assert_eq!(std::fs::read(images.join("screen.png")).unwrap(), b"png-bytes");
    assert!(!images.join("gone.gif").exists());
}

#[tokio::test]
async fn test_image_directory_created() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/g/thread/10000001", sample_thread()).await;

    let images = temp_dir.path().join("fresh");
    let (_shutdown, shutdown_rx) = watch::channel(false);
    ScrapeSession::new(
        test_config(temp_dir.path()),
        options(Mode::ImageDownload, "/g/10000001", &mock_server, &images),
    )
    .with_max_cycles(1)
    .run(shutdown_rx)
    .await
    .unwrap();

    assert!(images.is_dir());
}

#[tokio::test]
async fn test_shutdown_signal_dumps_cache() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/g/thread/10000001", sample_thread()).await;

    let mut config = test_config(temp_dir.path());
    config.scrape.refresh_secs = 3600;
    let session = ScrapeSession::new(
        config,
        options(
            Mode::Archive,
            "/g/10000001",
            &mock_server,
            &temp_dir.path().join("archive.txt"),
        ),
    );
    let stats = session.stats();

    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(session.run(shutdown_rx));

    // Wait for the first cycle to land before interrupting
    for _ in 0..50 {
        if stats.snapshot().records_persisted == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    shutdown.send(true).unwrap();

    let report = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("session did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(report.cycles, 1);
    let cache = CacheStore::new(report.dumped).load(Mode::Archive);
    assert_eq!(cache.len(), 3);
}

#[tokio::test]
async fn test_shutdown_interrupts_blocked_enqueue() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/g/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(board_page("g", &[]))
                .set_delay(Duration::from_secs(1)),
        )
        .mount(&mock_server)
        .await;

    // One page in flight, one queued, the rest wait on a full channel
    let mut config = test_config(temp_dir.path());
    config.crawler.channel_buffer_size = 1;
    config.scrape.refresh_secs = 3600;

    let session = ScrapeSession::new(
        config,
        options(
            Mode::Archive,
            "g",
            &mock_server,
            &temp_dir.path().join("archive.txt"),
        ),
    )
    .with_registry(paged_registry(Mode::Archive, 8));

    let (shutdown, shutdown_rx) = watch::channel(false);
    let start = Instant::now();
    let handle = tokio::spawn(session.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.send(true).unwrap();

    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("session did not stop")
        .unwrap()
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(report.cycles, 1);
    assert!(report.dumped.is_some());
}

#[tokio::test]
async fn test_no_dump_leaves_cache_file_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/g/thread/10000001", sample_thread()).await;

    let mut config = test_config(temp_dir.path());
    config.cache.dump = false;

    let (_shutdown, shutdown_rx) = watch::channel(false);
    let report = ScrapeSession::new(
        config,
        options(
            Mode::Archive,
            "/g/10000001",
            &mock_server,
            &temp_dir.path().join("archive.txt"),
        ),
    )
    .with_max_cycles(1)
    .run(shutdown_rx)
    .await
    .unwrap();

    assert!(report.dumped.is_none());
    assert!(!temp_dir.path().join(".chandere").exists());
}

#[tokio::test]
async fn test_records_reach_sink_in_page_order() {
    // Extraction emits op before replies; a single persist worker keeps it
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/g/thread/10000001", sample_thread()).await;

    let archive = temp_dir.path().join("archive.txt");
    let (_shutdown, shutdown_rx) = watch::channel(false);
    ScrapeSession::new(
        test_config(temp_dir.path()),
        options(Mode::Archive, "/g/10000001", &mock_server, &archive),
    )
    .with_max_cycles(1)
    .run(shutdown_rx)
    .await
    .unwrap();

    let content = std::fs::read_to_string(&archive).unwrap();
    let positions: Vec<usize> = ["10000001", "10000002", "10000003"]
        .iter()
        .map(|id| content.find(&format!("Post ID: {id}\n")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}
