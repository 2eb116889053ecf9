//! VLV index search strategy
//!
//! Pages through the results of every base DN using a server-side sort
//! combined with the virtual list view control, in offset mode:
//!
//! 1. each page asks for `block_size` entries starting at the next position,
//!    echoing the last content count and cookie the server sent;
//! 2. the whole page is buffered before anything reaches the consumer, so a
//!    protocol failure found in the response controls aborts the page cleanly;
//! 3. a boundary duplicate at the start of a page is dropped;
//! 4. iteration ends once the position passes the content count, or at the
//!    first empty page (some servers report a content count that can never
//!    be reached).
//!
//! Base DNs are searched one after another through a single session.

use ldap3::SearchEntry;
use tracing::{debug, info, instrument, warn};

use dirpager_connector::config::ConnectorConfig;
use dirpager_connector::error::{ConnectorError, ConnectorResult};
use dirpager_connector::search::{
    SearchFlow, SearchOutcome, SearchResultsHandler, SearchSummary,
};

use crate::config::VlvSearchConfig;
use crate::context::{DirectoryContext, DirectorySession, SearchPage};
use crate::page::PageState;
use crate::request::SearchRequest;

/// How the iteration of one base DN ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseDnOutcome {
    /// The position passed the content count reported by the server.
    Exhausted,
    /// A page came back empty before the content count was reached.
    EmptyPage,
    /// The consumer asked to stop.
    Stopped,
}

/// Paged search over a VLV index.
#[derive(Debug, Clone)]
pub struct VlvIndexSearch {
    sort_attribute: String,
    block_size: u32,
    after_count: u32,
}

impl VlvIndexSearch {
    /// Create the strategy from a validated configuration.
    pub fn new(config: &VlvSearchConfig) -> ConnectorResult<Self> {
        config.validate()?;

        Ok(Self {
            sort_attribute: config.effective_sort_attribute().to_string(),
            block_size: config.block_size,
            after_count: config.after_count(),
        })
    }

    /// Attribute the sort request is issued on.
    pub fn sort_attribute(&self) -> &str {
        &self.sort_attribute
    }

    /// Entries requested per page.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Search every base DN in order, delivering entries to `handler`.
    ///
    /// One session is taken from `context` for the whole search and closed
    /// on every exit path. Stops at the first base DN whose iteration the
    /// handler cancels; an error aborts the remaining base DNs.
    #[instrument(skip(self, context, handler), fields(request = %request))]
    pub async fn do_search<C, H>(
        &self,
        context: &C,
        base_dns: &[String],
        request: &SearchRequest,
        handler: &mut H,
    ) -> ConnectorResult<SearchSummary>
    where
        C: DirectoryContext,
        H: SearchResultsHandler<SearchEntry> + Send,
    {
        if base_dns.is_empty() {
            return Err(ConnectorError::invalid_configuration(
                "at least one base DN is required",
            ));
        }

        debug!(base_dns = ?base_dns, "Searching");

        let mut session = context.new_instance().await?;
        let mut summary = SearchSummary::default();

        let result = self
            .search_base_dns(&mut session, base_dns, request, handler, &mut summary)
            .await;
        let closed = session.close().await;

        match (result, closed) {
            (Ok(()), Ok(())) => {
                info!(
                    outcome = %summary.outcome,
                    base_dns = summary.base_dns_searched,
                    pages = summary.pages_requested,
                    entries = summary.entries_delivered,
                    overlaps = summary.overlaps_removed,
                    "VLV search finished"
                );
                Ok(summary)
            }
            (Ok(()), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "Failed to close session after search error");
                Err(e)
            }
        }
    }

    async fn search_base_dns<S, H>(
        &self,
        session: &mut S,
        base_dns: &[String],
        request: &SearchRequest,
        handler: &mut H,
        summary: &mut SearchSummary,
    ) -> ConnectorResult<()>
    where
        S: DirectorySession,
        H: SearchResultsHandler<SearchEntry> + Send,
    {
        for base_dn in base_dns {
            summary.base_dns_searched += 1;
            let outcome = self
                .search_base_dn(session, base_dn, request, handler, summary)
                .await?;
            if outcome == BaseDnOutcome::Stopped {
                summary.outcome = SearchOutcome::Stopped;
                break;
            }
        }
        Ok(())
    }

    /// Page through one base DN with a fresh cursor.
    pub async fn search_base_dn<S, H>(
        &self,
        session: &mut S,
        base_dn: &str,
        request: &SearchRequest,
        handler: &mut H,
        summary: &mut SearchSummary,
    ) -> ConnectorResult<BaseDnOutcome>
    where
        S: DirectorySession,
        H: SearchResultsHandler<SearchEntry> + Send,
    {
        debug!(base_dn = %base_dn, "Searching base DN");

        let mut state = PageState::new();

        loop {
            let controls = state.request_controls(&self.sort_attribute, self.after_count)?;

            debug!(
                base_dn = %base_dn,
                target = state.next_position(),
                after_count = self.after_count,
                content_count = state.last_content_count(),
                "New VLV page request"
            );

            let mut page = session.search(base_dn, request, controls).await?;
            summary.pages_requested += 1;

            if state.remove_overlap(&mut page.entries) {
                summary.overlaps_removed += 1;
            }

            state.apply_response_controls(&page.controls)?;
            check_result(base_dn, &page)?;

            let entries = page.entries;
            let page_was_empty = entries.is_empty();
            let last_key = entries.last().map(|entry| entry.dn.clone());

            for entry in entries {
                state.advance();
                summary.entries_delivered += 1;
                if handler.handle(base_dn, entry) == SearchFlow::Stop {
                    debug!(base_dn = %base_dn, "Search stopped by consumer");
                    return Ok(BaseDnOutcome::Stopped);
                }
            }
            state.set_last_entry_key(last_key);

            if state.is_exhausted() {
                debug!(
                    base_dn = %base_dn,
                    delivered = state.next_position() - 1,
                    "Reached end of VLV list"
                );
                return Ok(BaseDnOutcome::Exhausted);
            }

            if page_was_empty {
                warn!(
                    base_dn = %base_dn,
                    position = state.next_position(),
                    content_count = state.last_content_count(),
                    "Ending search because received no results"
                );
                return Ok(BaseDnOutcome::EmptyPage);
            }
        }
    }
}

fn check_result(base_dn: &str, page: &SearchPage) -> ConnectorResult<()> {
    if page.is_success() {
        return Ok(());
    }
    let message = format!(
        "search in {base_dn} returned result code {}: {}",
        page.result_code, page.message
    );
    match page.result_code {
        // busy, unavailable
        51 | 52 => Err(ConnectorError::TargetUnavailable { message }),
        _ => Err(ConnectorError::operation_failed(message)),
    }
}
