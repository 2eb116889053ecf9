//! Per-base-DN paging cursor
//!
//! [`PageState`] tracks where the next VLV page starts, what the server last
//! said about the list, and which entry ended the previous page. It builds
//! the request controls of each page, absorbs the response controls, and
//! drops the boundary duplicate some servers send at the start of a page.

use ldap3::controls::RawControl;
use ldap3::SearchEntry;
use tracing::{debug, error, warn};

use dirpager_connector::error::{ConnectorError, ConnectorResult};

use crate::controls::{
    result_code_name, SortRequest, SortResponse, VlvRequest, VlvResponse, SORT_RESPONSE_OID,
    VLV_RESPONSE_OID,
};

/// Mutable cursor of one base DN's VLV iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    next_position: u32,
    last_content_count: u32,
    cookie: Vec<u8>,
    last_entry_key: Option<String>,
}

impl Default for PageState {
    fn default() -> Self {
        Self::new()
    }
}

impl PageState {
    /// Cursor positioned on the first entry of an unknown-size list.
    pub fn new() -> Self {
        Self {
            next_position: 1,
            last_content_count: 0,
            cookie: Vec::new(),
            last_entry_key: None,
        }
    }

    /// 1-based position of the first entry of the next page.
    pub fn next_position(&self) -> u32 {
        self.next_position
    }

    /// Size of the list as last reported by the server; zero when unknown.
    pub fn last_content_count(&self) -> u32 {
        self.last_content_count
    }

    /// Continuation cookie echoed with the next request.
    pub fn cookie(&self) -> &[u8] {
        &self.cookie
    }

    /// DN of the last entry delivered from the previous page.
    pub fn last_entry_key(&self) -> Option<&str> {
        self.last_entry_key.as_deref()
    }

    /// Sort and VLV request controls for the next page of `after_count + 1`
    /// entries.
    pub fn request_controls(
        &self,
        sort_attribute: &str,
        after_count: u32,
    ) -> ConnectorResult<Vec<RawControl>> {
        let sort = SortRequest::on_attribute(sort_attribute).to_control()?;
        let vlv = VlvRequest::by_offset(
            self.next_position,
            self.last_content_count,
            after_count,
            &self.cookie,
        )
        .to_control()?;
        Ok(vec![sort, vlv])
    }

    /// Drop the first entry of `entries` if it repeats the last entry of the
    /// previous page.
    ///
    /// Compares only once per page: the remembered key is cleared whether or
    /// not it matched. Returns whether an entry was removed.
    pub fn remove_overlap(&mut self, entries: &mut Vec<SearchEntry>) -> bool {
        let Some(last_key) = self.last_entry_key.take() else {
            return false;
        };

        let repeated = entries.first().is_some_and(|first| first.dn == last_key);
        if !repeated {
            return false;
        }

        warn!(
            position = self.next_position,
            dn = %last_key,
            "Working around rounding error overlap"
        );
        entries.remove(0);
        true
    }

    /// Record that one more entry has been delivered.
    pub fn advance(&mut self) {
        self.next_position = self.next_position.saturating_add(1);
    }

    /// Remember the DN of the last entry delivered from this page.
    pub fn set_last_entry_key(&mut self, key: Option<String>) {
        self.last_entry_key = key;
    }

    /// Whether every entry the server announced has been delivered.
    pub fn is_exhausted(&self) -> bool {
        self.next_position > self.last_content_count
    }

    /// Update the cursor from the response controls of a page.
    ///
    /// A sort response that is undecodable or reports anything but success
    /// is a protocol violation, as is a VLV response with a non-zero result.
    /// An undecodable VLV response is logged and leaves the cursor as it
    /// was. Other controls are ignored.
    pub fn apply_response_controls(&mut self, controls: &[RawControl]) -> ConnectorResult<()> {
        for control in controls {
            if control.ctype == SORT_RESPONSE_OID {
                check_sort_response(control)?;
            } else if control.ctype.eq_ignore_ascii_case(VLV_RESPONSE_OID) {
                self.apply_vlv_response(control)?;
            }
        }
        Ok(())
    }

    fn apply_vlv_response(&mut self, control: &RawControl) -> ConnectorResult<()> {
        let val = match control.val.as_deref() {
            Some(val) if !val.is_empty() => val,
            _ => return Ok(()),
        };

        let response = match VlvResponse::decode(val) {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Can't decode VLV response control");
                return Ok(());
            }
        };

        self.last_content_count = response.content_count;
        if let Some(cookie) = response.context_id {
            self.cookie = cookie;
        }

        debug!(
            target_position = response.target_position,
            content_count = response.content_count,
            "VLV response control"
        );

        if response.result != 0 {
            return Err(ConnectorError::protocol_violation(
                "virtual list view",
                format!(
                    "the view operation has failed on the LDAP server: {} ({})",
                    result_code_name(response.result),
                    response.result
                ),
            ));
        }

        Ok(())
    }
}

fn check_sort_response(control: &RawControl) -> ConnectorResult<()> {
    let response = control
        .val
        .as_deref()
        .ok_or_else(|| ConnectorError::protocol_violation("sort", "sort response has no value"))
        .and_then(|val| {
            SortResponse::decode(val)
                .map_err(|e| ConnectorError::protocol_violation("sort", e.to_string()))
        })?;

    if !response.is_sorted() {
        let attribute = response
            .attribute
            .map(|a| format!(" on attribute '{a}'"))
            .unwrap_or_default();
        return Err(ConnectorError::protocol_violation(
            "sort",
            format!(
                "results were not sorted{attribute}: {} ({})",
                result_code_name(response.result),
                response.result
            ),
        ));
    }

    Ok(())
}
