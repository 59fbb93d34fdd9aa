//! wiremock responder that serves a byte payload and honors `Range: bytes=N-`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Range headers seen by a [`RangedFile`], one entry per GET (`None` = no Range).
#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<Option<String>>>>);

#[allow(dead_code)]
impl RequestLog {
    pub fn ranges(&self) -> Vec<Option<String>> {
        self.0.lock().unwrap().clone()
    }

    fn record(&self, range: Option<String>) {
        self.0.lock().unwrap().push(range);
    }
}

/// Serves `content`, answering the first `fail_first` GETs with 503.
struct RangedFile {
    content: Vec<u8>,
    content_type: &'static str,
    fail_first: AtomicUsize,
    log: RequestLog,
}

impl Respond for RangedFile {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let range = request
            .headers
            .get("range")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        self.log.record(range.clone());

        let remaining_failures = self.fail_first.load(Ordering::SeqCst);
        if remaining_failures > 0 {
            self.fail_first
                .store(remaining_failures - 1, Ordering::SeqCst);
            return ResponseTemplate::new(503);
        }

        let len = self.content.len();
        let start = range
            .as_deref()
            .and_then(|value| value.strip_prefix("bytes="))
            .and_then(|value| value.strip_suffix('-'))
            .and_then(|value| value.parse::<usize>().ok());

        match start {
            None => ResponseTemplate::new(200)
                .insert_header("Content-Type", self.content_type)
                .set_body_bytes(self.content.clone()),
            Some(start) if start >= len => {
                ResponseTemplate::new(416).insert_header("Content-Range", format!("bytes */{len}"))
            }
            Some(start) => ResponseTemplate::new(206)
                .insert_header("Content-Type", self.content_type)
                .insert_header(
                    "Content-Range",
                    format!("bytes {start}-{}/{len}", len - 1),
                )
                .set_body_bytes(self.content[start..].to_vec()),
        }
    }
}

/// Mounts HEAD (with `Content-Length`) and a range-aware GET for `route`.
#[allow(dead_code)]
pub async fn mount_ranged_file(
    server: &MockServer,
    route: &str,
    content: &[u8],
    content_type: &'static str,
    fail_first: usize,
) -> RequestLog {
    let log = RequestLog::default();

    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Length", content.len().to_string())
                .insert_header("Content-Type", content_type)
                .insert_header("Accept-Ranges", "bytes"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(RangedFile {
            content: content.to_vec(),
            content_type,
            fail_first: AtomicUsize::new(fail_first),
            log: log.clone(),
        })
        .mount(server)
        .await;

    log
}
