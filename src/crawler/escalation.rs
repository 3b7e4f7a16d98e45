//! Retry/escalation controller
//!
//! Every product URL goes through
//! `Unfetched -> FetchedPlain -> {Complete | PendingRender} -> FetchedRendered -> Complete`.
//! The only way to issue a rendered fetch is through a [`PendingRender`] value, which is
//! produced once by [`plain_step`] and consumed by value when the rendered attempt
//! finishes. A URL therefore reaches the renderer at most once and is extracted at most
//! twice.

use crate::crawler::{Fetch, FetchRequest, PageContent};
use crate::extract::{extract_fields, PartialRecord, StrategyTrace};
use crate::page::Page;
use crate::retailer::Retailer;
use crate::state::FetchState;
use crate::Result;
use tracing::{debug, warn};
use url::Url;

/// One fetch-and-extract pass over a URL
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionAttempt {
    pub url: Url,
    pub rendered: bool,
    /// Every strategy run, in order, with its outcome
    pub strategies_tried: Vec<StrategyTrace>,
    pub result: PartialRecord,
}

impl ExtractionAttempt {
    fn price_found(&self) -> bool {
        self.result.price.is_some()
    }
}

/// Final result of the controller for one URL
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationOutcome {
    pub url: Url,
    pub record: PartialRecord,
    /// One entry per fetch issued, plain first
    pub attempts: Vec<ExtractionAttempt>,
    pub final_state: FetchState,
}

impl EscalationOutcome {
    pub fn fetch_count(&self) -> usize {
        self.attempts.len()
    }

    pub fn was_escalated(&self) -> bool {
        self.attempts.iter().any(|a| a.rendered)
    }
}

/// Result of the plain step
#[derive(Debug)]
pub enum PlainStep {
    /// Price found; no escalation
    Complete(EscalationOutcome),
    /// Price missing; exactly one rendered fetch may follow
    NeedsRender(PendingRender),
}

/// A URL whose plain extraction found no price and which has not been rendered yet
#[derive(Debug)]
pub struct PendingRender {
    url: Url,
    plain: ExtractionAttempt,
    state: FetchState,
}

/// Parses fetched content and extracts a record; the DOM never outlives this call
fn extract_attempt(retailer: &Retailer, url: &Url, content: PageContent) -> ExtractionAttempt {
    let rendered = content.rendered;
    let page = Page::parse(content.final_url, content.body, rendered);
    let extraction = extract_fields(retailer, &page);

    ExtractionAttempt {
        url: url.clone(),
        rendered,
        strategies_tried: extraction.trace,
        result: extraction.record,
    }
}

/// Runs extraction over a plain fetch and decides whether to escalate
pub fn plain_step(retailer: &Retailer, url: &Url, content: PageContent) -> Result<PlainStep> {
    let state = FetchState::Unfetched.transition(FetchState::FetchedPlain)?;
    let attempt = extract_attempt(retailer, url, content);

    if attempt.price_found() {
        let final_state = state.transition(FetchState::Complete)?;
        return Ok(PlainStep::Complete(EscalationOutcome {
            url: url.clone(),
            record: attempt.result.clone(),
            attempts: vec![attempt],
            final_state,
        }));
    }

    let state = state.transition(FetchState::PendingRender)?;
    debug!(url = %url, "No price in plain content, escalating to rendered fetch");

    Ok(PlainStep::NeedsRender(PendingRender {
        url: url.clone(),
        plain: attempt,
        state,
    }))
}

impl PendingRender {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The rendered request, waiting for the retailer's price element
    pub fn request(&self, retailer: &Retailer) -> FetchRequest {
        FetchRequest::rendered(
            self.url.clone(),
            retailer.config().render_wait_selector.clone(),
        )
    }

    /// Accepts the rendered extraction whether or not it found a price
    pub fn finish_rendered(
        self,
        retailer: &Retailer,
        content: PageContent,
    ) -> Result<EscalationOutcome> {
        let state = self.state.transition(FetchState::FetchedRendered)?;
        let rendered = extract_attempt(retailer, &self.url, content);
        let final_state = state.transition(FetchState::Complete)?;

        if !rendered.price_found() {
            debug!(url = %self.url, "Rendered content has no price either; accepting null price");
        }

        Ok(EscalationOutcome {
            url: self.url,
            record: rendered.result.clone(),
            attempts: vec![self.plain, rendered],
            final_state,
        })
    }

    /// Accepts the plain extraction when the rendered fetch could not be made
    pub fn finish_without_render(self) -> Result<EscalationOutcome> {
        let final_state = self.state.transition(FetchState::Complete)?;

        Ok(EscalationOutcome {
            url: self.url,
            record: self.plain.result.clone(),
            attempts: vec![self.plain],
            final_state,
        })
    }
}

/// Fetches, extracts and escalates one product URL
///
/// # Returns
///
/// * `Ok(EscalationOutcome)` - Extraction finished, with or without a price
/// * `Err(TrackerError::Fetch)` - The plain fetch failed; the URL is abandoned
pub async fn run_escalation(
    fetcher: &dyn Fetch,
    retailer: &Retailer,
    url: &Url,
) -> Result<EscalationOutcome> {
    let content = fetcher.fetch(&FetchRequest::plain(url.clone())).await?;

    let pending = match plain_step(retailer, url, content)? {
        PlainStep::Complete(outcome) => return Ok(outcome),
        PlainStep::NeedsRender(pending) => pending,
    };

    match fetcher.fetch(&pending.request(retailer)).await {
        Ok(content) => pending.finish_rendered(retailer, content),
        Err(e) => {
            warn!(url = %url, "Rendered re-fetch failed, keeping plain result: {}", e);
            pending.finish_without_render()
        }
    }
}
