//! Test fixtures for integration tests
//!
//! Builds 4chan-style board and thread pages around a mock server. Every
//! post container sits on one line, as on the live site.

use chandere::config::Config;
use chandere::crawler::{parse_targets, SessionOptions};
use chandere::models::Mode;
use chandere::parser::{RuleRegistry, RuleSet};
use std::path::Path;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Posting date and time shared by generated posts
pub const POST_DATE: &str = "06/11/16(Sat)";
pub const POST_TIME: &str = "05:01:13";

/// Page served for deleted threads
pub const NOT_FOUND_PAGE: &str =
    "<html><head><title>4chan - 404 Not Found</title></head><body></body></html>";

/// Attachment of a generated post
pub struct Attachment<'a> {
    /// Protocol-relative link, e.g. `//127.0.0.1:4000/g/1.jpg`
    pub href: &'a str,
    pub filename: &'a str,
}

/// Protocol-relative form of a mock server URL
pub fn protocol_relative(uri: &str) -> String {
    uri.trim_start_matches("http:").to_string()
}

fn post(kind: &str, id: &str, file: Option<Attachment<'_>>, body: &str) -> String {
    let file = file
        .map(|file| {
            format!(
                r#"<div class="file" id="f{id}"><div class="fileText" id="fT{id}">File: <a href="{}" target="_blank">{}</a> (12 KB, 100x100)</div></div>"#,
                file.href, file.filename
            )
        })
        .unwrap_or_default();

    format!(
        r##"<div class="postContainer" id="pc{id}"><div id="p{id}" class="post {kind}">{file}<div class="postInfo desktop" id="pi{id}"><span class="subject"></span> <span class="nameBlock"><span class="name">Anonymous</span></span> <span class="dateTime">{POST_DATE}{POST_TIME}</span> <span class="postNum desktop"><a href="#p{id}" title="Link to this post">No.</a></span></div><blockquote class="postMessage" id="m{id}">{body}</blockquote></div></div>"##
    )
}

/// Origin post; `id` should have eight digits so its body is found
pub fn op_post(id: &str, file: Option<Attachment<'_>>, body: &str) -> String {
    post("op", id, file, body)
}

pub fn reply_post(id: &str, file: Option<Attachment<'_>>, body: &str) -> String {
    post("reply", id, file, body)
}

fn page(board: &str, thread: bool, posts: &[String]) -> String {
    let nav = if thread {
        format!(r#"[<a href="/{board}/" accesskey="a">Return</a>]"#)
    } else {
        format!(r#"[<a href="/{board}/catalog">Catalog</a>]"#)
    };

    format!(
        "<!DOCTYPE html>\n<html><head><title>/{board}/ - Technology - 4chan</title></head>\n<body>\n\
         <div class=\"boardBanner\"><div class=\"boardTitle\">/{board}/ - Technology</div></div>\n\
         <div class=\"navLinks\">{nav}</div>\n{}\n</body></html>",
        posts.join("\n")
    )
}

/// Board index page; only op posts are considered on it
pub fn board_page(board: &str, posts: &[String]) -> String {
    page(board, false, posts)
}

/// Single-thread page carrying the thread marker
pub fn thread_page(board: &str, posts: &[String]) -> String {
    page(board, true, posts)
}

// ============================================================================
// Session helpers
// ============================================================================

/// Fast-refreshing config whose cache file lives in `dir`
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.request_timeout_secs = 5;
    config.crawler.channel_buffer_size = 16;
    config.scrape.refresh_secs = 1;
    config.cache.dump_file = Some(dir.join(".chandere"));
    config
}

/// Built-in rules with 4chan narrowed to a single board page
pub fn single_page_registry(mode: Mode) -> RuleRegistry {
    paged_registry(mode, 1)
}

/// Builtin rules with 4chan boards cut to `pages` pages
pub fn paged_registry(mode: Mode, pages: u32) -> RuleRegistry {
    let mut registry = RuleRegistry::builtin();
    let mut rules: RuleSet = (*registry.lookup(mode, "4chan")).clone();
    rules.pagination.max_page = Some(pages);
    registry.register(mode, "4chan", rules);
    registry
}

/// Forced 4chan session against `server`
pub fn options(mode: Mode, operand: &str, server: &MockServer, output: &Path) -> SessionOptions {
    SessionOptions {
        output: output.to_path_buf(),
        force: true,
        origin: Some(server.uri()),
        ..SessionOptions::new(mode, "4chan", parse_targets(&[operand]))
    }
}

pub async fn serve(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}
