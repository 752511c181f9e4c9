//! The two passes of a scribe run.
//!
//! `fetch` pulls new listings from the job board into storage and queues
//! them; `process` drafts a cover letter for every queued listing.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::board::{JobBoardClient, VacancySummary};
use crate::error::ScribeError;
use crate::llm::transport::Transport;
use crate::llm::{LlmError, RateLimitedCaller};
use crate::storage::{PendingVacancy, VacancyStore};
use crate::text::{split_reasoning, strip_html_tags};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub queries: usize,
    pub failed_queries: usize,
    pub pages: u32,
    pub listings: usize,
    pub stored: usize,
    /// Stored earlier but missing from the queue; queued this run.
    pub requeued: usize,
    pub already_stored: usize,
    pub failed_listings: usize,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub pending: usize,
    pub enriched: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Receives per-listing progress from [`process`].
pub trait ProcessObserver {
    fn started(&self, total: usize);
    fn finished(&self, listing: &PendingVacancy, result: Result<(), &ScribeError>);
}

impl ProcessObserver for () {
    fn started(&self, _total: usize) {}
    fn finished(&self, _listing: &PendingVacancy, _result: Result<(), &ScribeError>) {}
}

/// Query terms with blanks and repeats removed, first occurrence kept.
pub fn unique_queries(queries: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    queries
        .iter()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty() && seen.insert(*q))
        .collect()
}

/// Walk every result page of every query and store listings not seen before.
///
/// Failures of a single page or listing are logged and skipped.
pub async fn fetch<S: VacancyStore>(
    board: &JobBoardClient,
    store: &S,
    queries: &[String],
    per_page: u32,
    shutdown: &CancellationToken,
) -> FetchReport {
    let mut report = FetchReport::default();

    for query in unique_queries(queries) {
        if shutdown.is_cancelled() {
            report.interrupted = true;
            break;
        }
        report.queries += 1;

        let first = match board.search(query, 0, per_page).await {
            Ok(page) => page,
            Err(err) => {
                warn!(query, error = %err, "search failed, skipping query");
                report.failed_queries += 1;
                continue;
            }
        };
        info!(query, found = first.found, pages = first.pages, "search results");
        report.pages += 1;
        ingest_page(board, store, &first.items, &mut report).await;

        for page in 1..first.pages {
            if shutdown.is_cancelled() {
                report.interrupted = true;
                return report;
            }
            match board.search(query, page, per_page).await {
                Ok(results) => {
                    report.pages += 1;
                    ingest_page(board, store, &results.items, &mut report).await;
                }
                Err(err) => warn!(query, page, error = %err, "search page failed, skipping"),
            }
        }
    }

    report
}

async fn ingest_page<S: VacancyStore>(
    board: &JobBoardClient,
    store: &S,
    items: &[VacancySummary],
    report: &mut FetchReport,
) {
    for summary in items {
        report.listings += 1;
        match ingest(board, store, summary).await {
            Ok(Ingested::New) => report.stored += 1,
            Ok(Ingested::Requeued) => report.requeued += 1,
            Ok(Ingested::Known) => report.already_stored += 1,
            Err(err) => {
                warn!(id = %summary.id, error = %err, "failed to store listing");
                report.failed_listings += 1;
            }
        }
    }
}

enum Ingested {
    New,
    Requeued,
    Known,
}

/// A listing counts as known only once it is both stored and queued, so a
/// run that stored a row but failed to queue it is repaired by the next one.
async fn ingest<S: VacancyStore>(
    board: &JobBoardClient,
    store: &S,
    summary: &VacancySummary,
) -> Result<Ingested, ScribeError> {
    if store.exists(&summary.id).await? {
        if store.is_queued(&summary.id).await? {
            debug!(id = %summary.id, "listing already stored");
            return Ok(Ingested::Known);
        }
        store.mark_pending(&summary.id).await?;
        debug!(id = %summary.id, "stored listing queued");
        return Ok(Ingested::Requeued);
    }

    let mut vacancy = board.vacancy(summary).await?;
    vacancy.description = strip_html_tags(&vacancy.description);
    store.insert_vacancy(&vacancy).await?;
    store.mark_pending(&vacancy.id).await?;
    debug!(id = %vacancy.id, name = %vacancy.name, "listing stored");
    Ok(Ingested::New)
}

/// Draft a cover letter for every pending listing.
///
/// A listing that fails stays pending for the next run. Cancelling
/// `shutdown` ends the pass after the in-flight call is abandoned.
pub async fn process<S, T>(
    caller: &RateLimitedCaller<T>,
    store: &S,
    model: &str,
    system_prompt: &str,
    shutdown: &CancellationToken,
    observer: &impl ProcessObserver,
) -> Result<ProcessReport, ScribeError>
where
    S: VacancyStore,
    T: Transport,
{
    let pending = store.load_pending().await?;
    let mut report = ProcessReport {
        pending: pending.len(),
        ..Default::default()
    };
    info!(
        pending = report.pending,
        max_attempts = caller.policy().max_attempts,
        "processing pending listings"
    );
    observer.started(pending.len());

    for listing in &pending {
        if shutdown.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let result = enrich(caller, store, model, system_prompt, listing, shutdown).await;
        observer.finished(listing, result.as_ref().copied());
        match result {
            Ok(()) => report.enriched += 1,
            Err(ScribeError::Llm(LlmError::Cancelled)) => {
                report.cancelled = true;
                break;
            }
            Err(err) => {
                warn!(id = %listing.id, error = %err, "listing left pending");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn enrich<S: VacancyStore, T: Transport>(
    caller: &RateLimitedCaller<T>,
    store: &S,
    model: &str,
    system_prompt: &str,
    listing: &PendingVacancy,
    shutdown: &CancellationToken,
) -> Result<(), ScribeError> {
    let reply = caller
        .complete(model, system_prompt, &listing.description, shutdown)
        .await?;
    let enrichment = split_reasoning(&reply)?;
    store.save_enrichment(&listing.id, &enrichment).await?;
    debug!(id = %listing.id, "cover letter saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::board::Vacancy;
    use crate::state_machine::RetryPolicy;
    use crate::storage::memory::MemoryStore;
    use crate::text::Enrichment;

    fn board(server: &MockServer) -> JobBoardClient {
        JobBoardClient::new(
            format!("{}/vacancies", server.uri()),
            "board-key".into(),
            vec!["noExperience".into()],
        )
        .unwrap()
    }

    fn caller(server: &MockServer) -> RateLimitedCaller {
        RateLimitedCaller::new(
            format!("{}/v1/chat/completions", server.uri()),
            "llm-key".into(),
            RetryPolicy::default(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn page(server: &MockServer, ids: &[&str], page: u32, pages: u32) -> serde_json::Value {
        let items: Vec<_> = ids
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "name": format!("Listing {id}"),
                    "url": format!("{}/vacancies/{id}", server.uri()),
                })
            })
            .collect();
        json!({"items": items, "found": ids.len(), "page": page, "pages": pages, "per_page": 100})
    }

    fn letter(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    #[derive(Default)]
    struct Recorder {
        total: RefCell<Option<usize>>,
        outcomes: RefCell<Vec<(String, bool)>>,
    }

    impl ProcessObserver for Recorder {
        fn started(&self, total: usize) {
            *self.total.borrow_mut() = Some(total);
        }

        fn finished(&self, listing: &PendingVacancy, result: Result<(), &ScribeError>) {
            self.outcomes
                .borrow_mut()
                .push((listing.id.clone(), result.is_ok()));
        }
    }

    #[test]
    fn unique_queries_keeps_first_occurrence() {
        let queries: Vec<String> = ["ML", " Data science ", "ML", "", "Data science"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(unique_queries(&queries), vec!["ML", "Data science"]);
    }

    #[tokio::test]
    async fn fetch_walks_pages_and_skips_known_listings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .and(query_param("text", "ML"))
            .and(query_param("page", "0"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page(&server, &["1", "2"], 0, 2)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .and(query_param("text", "ML"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(page(&server, &["2", "3"], 1, 2)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .and(query_param("text", "Data"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/vacancies/1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        for id in ["2", "3"] {
            Mock::given(method("GET"))
                .and(path(format!("/vacancies/{id}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "id": id,
                    "name": format!("Listing {id}"),
                    "description": "<p>Build <b>models</b></p>",
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let store = MemoryStore::with_pending(&[("1", "already here")]);
        let queries: Vec<String> = vec!["ML".into(), "ML".into(), "Data".into()];
        let report = fetch(&board(&server), &store, &queries, 100, &CancellationToken::new()).await;

        assert_eq!(
            report,
            FetchReport {
                queries: 2,
                failed_queries: 1,
                pages: 2,
                listings: 4,
                stored: 2,
                requeued: 0,
                already_stored: 2,
                failed_listings: 0,
                interrupted: false,
            }
        );
        let stored = store.row("3").unwrap();
        assert!(stored.queued);
        assert_eq!(stored.vacancy.unwrap().description, "Build models");
        assert_eq!(store.row("1").unwrap().vacancy.unwrap().description, "already here");
    }

    #[tokio::test]
    async fn fetch_counts_failed_detail_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&server, &["9"], 0, 1)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/vacancies/9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = MemoryStore::default();
        let report = fetch(
            &board(&server),
            &store,
            &["ML".to_string()],
            100,
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(report.failed_listings, 1);
        assert_eq!(report.stored, 0);
        assert!(store.row("9").is_none());
    }

    /// Fails the first `mark_pending` and delegates everything else.
    struct FlakyQueue {
        inner: MemoryStore,
        failed: AtomicBool,
    }

    impl VacancyStore for FlakyQueue {
        async fn exists(&self, id: &str) -> Result<bool, ScribeError> {
            self.inner.exists(id).await
        }

        async fn insert_vacancy(&self, vacancy: &Vacancy) -> Result<(), ScribeError> {
            self.inner.insert_vacancy(vacancy).await
        }

        async fn is_queued(&self, id: &str) -> Result<bool, ScribeError> {
            self.inner.is_queued(id).await
        }

        async fn mark_pending(&self, id: &str) -> Result<(), ScribeError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(ScribeError::DatabaseTimeout);
            }
            self.inner.mark_pending(id).await
        }

        async fn load_pending(&self) -> Result<Vec<PendingVacancy>, ScribeError> {
            self.inner.load_pending().await
        }

        async fn save_enrichment(
            &self,
            id: &str,
            enrichment: &Enrichment,
        ) -> Result<(), ScribeError> {
            self.inner.save_enrichment(id, enrichment).await
        }
    }

    #[tokio::test]
    async fn listing_stored_but_not_queued_is_queued_next_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&server, &["7"], 0, 1)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/vacancies/7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "7",
                "name": "Listing 7",
                "description": "Rust and Postgres",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = FlakyQueue {
            inner: MemoryStore::default(),
            failed: AtomicBool::new(false),
        };
        let queries = ["ML".to_string()];
        let board = board(&server);

        let first = fetch(&board, &store, &queries, 100, &CancellationToken::new()).await;
        assert_eq!(first.failed_listings, 1);
        assert!(!store.is_queued("7").await.unwrap());

        let second = fetch(&board, &store, &queries, 100, &CancellationToken::new()).await;
        assert_eq!(second.requeued, 1);
        assert_eq!(second.already_stored, 0);

        let pending = store.load_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "7");

        let third = fetch(&board, &store, &queries, 100, &CancellationToken::new()).await;
        assert_eq!(third.already_stored, 1);
    }

    #[tokio::test]
    async fn fetch_stops_when_shut_down() {
        let server = MockServer::start().await;
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let store = MemoryStore::default();
        let report = fetch(&board(&server), &store, &["ML".to_string()], 100, &shutdown).await;

        assert!(report.interrupted);
        assert_eq!(report.queries, 0);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn process_saves_letters_and_keeps_failures_pending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("desc A"))
            .respond_with(letter("<think>They want PyTorch.</think>\n\nDear hiring manager, A"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("desc B"))
            .respond_with(letter("Dear hiring manager, no reasoning"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("desc C"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .expect(3)
            .mount(&server)
            .await;

        let store = MemoryStore::with_pending(&[("a", "desc A"), ("b", "desc B"), ("c", "desc C")]);
        let recorder = Recorder::default();
        let report = process(
            &caller(&server),
            &store,
            "deepseek-r1-distill-llama-70b",
            "Write a cover letter.",
            &CancellationToken::new(),
            &recorder,
        )
        .await
        .unwrap();

        assert_eq!(
            report,
            ProcessReport {
                pending: 3,
                enriched: 1,
                failed: 2,
                cancelled: false,
            }
        );
        let saved = store.row("a").unwrap().enrichment.unwrap();
        assert_eq!(saved.thinking, "They want PyTorch.");
        assert_eq!(saved.cover_letter, "Dear hiring manager, A");
        assert!(store.row("b").unwrap().enrichment.is_none());

        let remaining: Vec<_> = store
            .load_pending()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(remaining, vec!["b", "c"]);

        assert_eq!(*recorder.total.borrow(), Some(3));
        assert_eq!(
            *recorder.outcomes.borrow(),
            vec![("a".to_string(), true), ("b".to_string(), false), ("c".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn process_sends_model_and_system_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("\"model\":\"m-1\""))
            .and(body_string_contains("Be brief."))
            .respond_with(letter("<think>ok</think>Letter"))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryStore::with_pending(&[("x", "Rust role")]);
        let shutdown = CancellationToken::new();
        let report = process(&caller(&server), &store, "m-1", "Be brief.", &shutdown, &())
            .await
            .unwrap();
        assert_eq!(report.enriched, 1);
    }

    #[tokio::test]
    async fn process_stops_when_shut_down() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(letter("<think>t</think>unused"))
            .expect(0)
            .mount(&server)
            .await;

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let store = MemoryStore::with_pending(&[("a", "desc A")]);
        let report = process(&caller(&server), &store, "m", "p", &shutdown, &())
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.enriched, 0);
        assert_eq!(store.load_pending().await.unwrap().len(), 1);
    }
}
