//! Common test utilities for dirpager-connector-ldap integration tests.
//!
//! [`MockDirectory`] is an in-memory directory server answering sorted VLV
//! searches. It reads the request controls the client really sent and
//! replies with encoded response controls, and can be told to misbehave the
//! way real servers do.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use ldap3::controls::RawControl;
use ldap3::SearchEntry;

use dirpager_connector::error::{ConnectorError, ConnectorResult};
use dirpager_connector::search::{SearchFlow, SearchResultsHandler};
use dirpager_connector_ldap::controls::{
    SortRequest, SortResponse, VlvRequest, VlvResponse, SORT_REQUEST_OID, VLV_REQUEST_OID,
    VLV_RESPONSE_OID,
};
use dirpager_connector_ldap::{DirectoryContext, DirectorySession, SearchPage, SearchRequest};

static INIT: Once = Once::new();

/// Initialize test logging when `RUST_LOG` is set.
pub fn init_test_logging() {
    INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

/// DN of the `index`-th (1-based) person under `base_dn`.
pub fn person_dn(base_dn: &str, index: usize) -> String {
    format!("uid=user{index:04},{base_dn}")
}

/// Sorted DNs of `count` people under `base_dn`.
pub fn people(base_dn: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| person_dn(base_dn, i)).collect()
}

/// Ways the mock server departs from the protocol.
#[derive(Debug, Clone, Default)]
pub struct Defects {
    /// Report this content count instead of the real list size.
    pub reported_count: Option<u32>,
    /// Start every page after the first one entry early (offset rounding).
    pub overlap: bool,
    /// Send an undecodable VLV response from this request number on (1-based).
    pub malformed_vlv_from: Option<usize>,
    /// Leave out the VLV response control altogether.
    pub omit_vlv_response: bool,
    /// Sort result code to report.
    pub sort_result: u32,
    /// VLV result code to report.
    pub vlv_result: u32,
    /// LDAP result code of the search operation.
    pub ldap_result: u32,
    /// Fail with a transport error on this request number (1-based).
    pub fail_on_request: Option<usize>,
    /// Fail when a session is closed.
    pub fail_close: bool,
}

/// A request as the server decoded it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub base_dn: String,
    pub filter: String,
    pub sort: SortRequest,
    pub vlv: VlvRequest,
}

/// Everything the mock server knows and saw.
#[derive(Debug, Default)]
pub struct MockState {
    pub entries: HashMap<String, Vec<String>>,
    pub defects: Defects,
    pub requests: Vec<RecordedRequest>,
    pub sessions_opened: u32,
    pub sessions_closed: u32,
}

impl MockState {
    /// Offsets of all page requests for `base_dn`, in order.
    pub fn offsets(&self, base_dn: &str) -> Vec<u32> {
        self.requests
            .iter()
            .filter(|r| r.base_dn == base_dn)
            .map(|r| r.vlv.offset)
            .collect()
    }

    /// Number of page requests for `base_dn`.
    pub fn request_count(&self, base_dn: &str) -> usize {
        self.requests.iter().filter(|r| r.base_dn == base_dn).count()
    }
}

/// In-memory VLV directory.
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    state: Arc<Mutex<MockState>>,
}

impl MockDirectory {
    pub fn new() -> Self {
        init_test_logging();
        Self::default()
    }

    /// Add `count` people under `base_dn`.
    pub fn with_people(self, base_dn: &str, count: usize) -> Self {
        self.state
            .lock()
            .unwrap()
            .entries
            .insert(base_dn.to_string(), people(base_dn, count));
        self
    }

    pub fn with_defects(self, defects: Defects) -> Self {
        self.state.lock().unwrap().defects = defects;
        self
    }

    /// Inspect the server state.
    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl DirectoryContext for MockDirectory {
    type Session = MockSession;

    async fn new_instance(&self) -> ConnectorResult<MockSession> {
        self.state.lock().unwrap().sessions_opened += 1;
        Ok(MockSession {
            state: Arc::clone(&self.state),
            closed: false,
        })
    }
}

/// Session on a [`MockDirectory`].
#[derive(Debug)]
pub struct MockSession {
    state: Arc<Mutex<MockState>>,
    closed: bool,
}

fn find_control<'a>(controls: &'a [RawControl], oid: &str) -> ConnectorResult<&'a RawControl> {
    controls
        .iter()
        .find(|c| c.ctype == oid)
        .ok_or_else(|| ConnectorError::internal(format!("missing control {oid}")))
}

fn entry(dn: &str) -> SearchEntry {
    let uid = dn
        .split(',')
        .next()
        .and_then(|rdn| rdn.strip_prefix("uid="))
        .unwrap_or_default()
        .to_string();
    SearchEntry {
        dn: dn.to_string(),
        attrs: HashMap::from([("uid".to_string(), vec![uid])]),
        bin_attrs: HashMap::new(),
    }
}

#[async_trait]
impl DirectorySession for MockSession {
    async fn search(
        &mut self,
        base_dn: &str,
        request: &SearchRequest,
        controls: Vec<RawControl>,
    ) -> ConnectorResult<SearchPage> {
        assert!(!self.closed, "search on a closed session");

        let sort = SortRequest::from_control(find_control(&controls, SORT_REQUEST_OID)?)
            .map_err(|e| ConnectorError::internal(e.to_string()))?;
        let vlv = VlvRequest::from_control(find_control(&controls, VLV_REQUEST_OID)?)
            .map_err(|e| ConnectorError::internal(e.to_string()))?;

        let mut state = self.state.lock().unwrap();
        state.requests.push(RecordedRequest {
            base_dn: base_dn.to_string(),
            filter: request.filter.clone(),
            sort,
            vlv: vlv.clone(),
        });
        let request_number = state.requests.len();
        let defects = state.defects.clone();

        if defects.fail_on_request == Some(request_number) {
            return Err(ConnectorError::network(format!(
                "connection reset during request {request_number}"
            )));
        }

        let list = state.entries.get(base_dn).cloned().unwrap_or_default();

        let mut start = vlv.offset.max(1) as usize;
        if defects.overlap && start > 1 {
            start -= 1;
        }
        let first = (start - 1).saturating_sub(vlv.before_count as usize);
        let last = (start + vlv.after_count as usize).min(list.len());
        let entries: Vec<SearchEntry> = if first < last {
            list[first..last].iter().map(|dn| entry(dn)).collect()
        } else {
            Vec::new()
        };

        let sort_response = SortResponse {
            result: defects.sort_result,
            attribute: None,
        }
        .to_control()?;

        let mut response_controls = vec![sort_response];
        if !defects.omit_vlv_response {
            let malformed = defects
                .malformed_vlv_from
                .is_some_and(|from| request_number >= from);
            if malformed {
                response_controls.push(RawControl {
                    ctype: VLV_RESPONSE_OID.to_string(),
                    crit: false,
                    val: Some(vec![0x30, 0x0d, 0x02, 0x01, 0x0b]),
                });
            } else {
                let content_count = defects.reported_count.unwrap_or(list.len() as u32);
                response_controls.push(
                    VlvResponse {
                        target_position: vlv.offset,
                        content_count,
                        result: defects.vlv_result,
                        context_id: Some(format!("ctx-{request_number}").into_bytes()),
                    }
                    .to_control()?,
                );
            }
        }

        Ok(SearchPage::new(entries, response_controls)
            .with_result(defects.ldap_result, "mock result"))
    }

    async fn close(&mut self) -> ConnectorResult<()> {
        self.closed = true;
        let mut state = self.state.lock().unwrap();
        state.sessions_closed += 1;
        if state.defects.fail_close {
            return Err(ConnectorError::network("close failed"));
        }
        Ok(())
    }
}

/// Handler recording every delivered entry, stopping after `stop_after`.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub received: Vec<(String, String)>,
    pub stop_after: Option<usize>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stopping_after(count: usize) -> Self {
        Self {
            received: Vec::new(),
            stop_after: Some(count),
        }
    }

    pub fn dns(&self) -> Vec<String> {
        self.received.iter().map(|(_, dn)| dn.clone()).collect()
    }
}

impl SearchResultsHandler<SearchEntry> for RecordingHandler {
    fn handle(&mut self, base_dn: &str, entry: SearchEntry) -> SearchFlow {
        self.received.push((base_dn.to_string(), entry.dn));
        match self.stop_after {
            Some(limit) if self.received.len() >= limit => SearchFlow::Stop,
            _ => SearchFlow::Continue,
        }
    }
}
