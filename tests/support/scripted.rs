//! Scripted [`Transport`] that reproduces mid-stream failures deterministically.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use rangeload_core::download::{
    BodyStream, ContentRange, DownloadError, RangeResponse, ResponseHead, Transport,
};
use url::Url;

const DEFAULT_CHUNK: usize = 16;

/// What the next GET does.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Serve the rest of the payload from the requested offset.
    Serve,
    /// Serve `n` bytes, then fail with a timeout.
    FailAfter(usize),
    /// Serve `n` bytes, then end the body cleanly.
    EndAfter(usize),
    /// Reply with a bare status and no body.
    Status(u16),
    /// Reply 200 with the whole payload regardless of Range.
    IgnoreRange,
    /// Serve the rest, but claim a different total in `Content-Range`.
    ClaimTotal(u64),
    /// Reply 416 with `Content-Range: bytes */<payload length>`.
    Unsatisfiable,
}

/// Transport replaying a fixed list of [`Step`]s over an in-memory payload.
pub struct ScriptedTransport {
    content: Vec<u8>,
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<Option<u64>>>,
    heads: Mutex<usize>,
    announce_length: bool,
    chunk_size: usize,
    chunk_delay: Option<Duration>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new(content: Vec<u8>, steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            content,
            steps: Mutex::new(steps.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            heads: Mutex::new(0),
            announce_length: true,
            chunk_size: DEFAULT_CHUNK,
            chunk_delay: None,
        }
    }

    /// Bodies are split into chunks of `size` bytes, each delayed by `delay`.
    pub fn with_pacing(mut self, size: usize, delay: Duration) -> Self {
        self.chunk_size = size;
        self.chunk_delay = Some(delay);
        self
    }

    /// HEAD responses omit `Content-Length`.
    pub fn without_length(mut self) -> Self {
        self.announce_length = false;
        self
    }

    /// Range starts of every GET issued, in order.
    pub fn requests(&self) -> Vec<Option<u64>> {
        self.requests.lock().unwrap().clone()
    }

    pub fn head_count(&self) -> usize {
        *self.heads.lock().unwrap()
    }

    fn total(&self) -> Option<u64> {
        self.announce_length.then_some(self.content.len() as u64)
    }

    fn body(
        &self,
        url: &Url,
        from: usize,
        take: Option<usize>,
        fail: bool,
    ) -> BodyStream {
        let end = take.map_or(self.content.len(), |n| (from + n).min(self.content.len()));
        let mut items: Vec<Result<Bytes, DownloadError>> = self.content[from..end]
            .chunks(self.chunk_size)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        if fail {
            items.push(Err(DownloadError::timeout(url.as_str())));
        }
        let stream = futures_util::stream::iter(items);
        let body: BodyStream = match self.chunk_delay {
            Some(delay) => Box::pin(stream.then(move |item| async move {
                tokio::time::sleep(delay).await;
                item
            })),
            None => Box::pin(stream),
        };
        body
    }

    fn partial_head(&self, start: usize, total: Option<u64>) -> ResponseHead {
        let len = self.content.len() as u64;
        ResponseHead {
            status: 206,
            content_length: None,
            content_type: Some("application/octet-stream".to_string()),
            content_range: Some(ContentRange {
                start: start as u64,
                end: len.saturating_sub(1),
                total,
            }),
            unsatisfied_total: None,
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn head(&self, _url: &Url) -> Result<ResponseHead, DownloadError> {
        *self.heads.lock().unwrap() += 1;
        Ok(ResponseHead {
            status: 200,
            content_length: self.total().map(|n| n.to_string()),
            content_type: Some("application/octet-stream".to_string()),
            content_range: None,
            unsatisfied_total: None,
        })
    }

    async fn get(
        &self,
        url: &Url,
        range_start: Option<u64>,
    ) -> Result<RangeResponse, DownloadError> {
        self.requests.lock().unwrap().push(range_start);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted transport ran out of steps");
        let from = range_start.map_or(0, |n| n as usize);

        let head = match (step, range_start) {
            (Step::Status(status), _) => {
                return Ok(RangeResponse {
                    head: ResponseHead {
                        status,
                        ..ResponseHead::default()
                    },
                    body: Box::pin(futures_util::stream::empty::<Result<Bytes, DownloadError>>()),
                });
            }
            (Step::Unsatisfiable, _) => {
                return Ok(RangeResponse {
                    head: ResponseHead {
                        status: 416,
                        unsatisfied_total: Some(self.content.len() as u64),
                        ..ResponseHead::default()
                    },
                    body: Box::pin(futures_util::stream::empty::<Result<Bytes, DownloadError>>()),
                });
            }
            (Step::IgnoreRange, _) => {
                return Ok(RangeResponse {
                    head: ResponseHead {
                        status: 200,
                        ..ResponseHead::default()
                    },
                    body: self.body(url, 0, None, false),
                });
            }
            (Step::ClaimTotal(total), Some(_)) => self.partial_head(from, Some(total)),
            (_, Some(_)) => self.partial_head(from, self.total()),
            (_, None) => ResponseHead {
                status: 200,
                content_length: self.total().map(|n| n.to_string()),
                ..ResponseHead::default()
            },
        };

        let body = match step {
            Step::FailAfter(n) => self.body(url, from, Some(n), true),
            Step::EndAfter(n) => self.body(url, from, Some(n), false),
            _ => self.body(url, from, None, false),
        };
        Ok(RangeResponse { head, body })
    }
}
