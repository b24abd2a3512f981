use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

use crate::checkpoint::{CheckpointPolicy, CheckpointWriter};
use crate::config::AppConfig;
use crate::content::{AboutRequest, ContentGenerator};
use crate::errors::AppResult;
use crate::places::{LookupOutcome, LookupQuery, PlacesService};
use crate::record::{BusinessRecord, ProcessingStatus, RecordSet};
use crate::sanitize_error_copy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub record_delay: Duration,
    pub checkpoint: CheckpointPolicy,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            record_delay: config.record_delay(),
            checkpoint: CheckpointPolicy::new(config.checkpoint_every),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunProgress {
    pub index: usize,
    pub total: usize,
    pub business_name: String,
    pub status: ProcessingStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total_records: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    pub not_processed: usize,
    /// Finalized-record count at each successful checkpoint write.
    pub checkpoints: Vec<usize>,
    pub checkpoint_failures: usize,
    pub final_checkpoint_written: bool,
    pub cancelled: bool,
}

impl RunSummary {
    fn tally(&mut self, status: ProcessingStatus) {
        self.processed += 1;
        match status {
            ProcessingStatus::Success => self.succeeded += 1,
            ProcessingStatus::PartialNoMapsData => self.partial += 1,
            ProcessingStatus::Failed => self.failed += 1,
        }
    }
}

pub type ProgressObserver = Arc<dyn Fn(RunProgress) + Send + Sync>;

pub struct EnrichmentPipeline {
    places: PlacesService,
    generator: ContentGenerator,
    writer: CheckpointWriter,
    checkpoint: CheckpointPolicy,
    pacer: RecordPacer,
    guard: Arc<AsyncMutex<()>>,
}

impl EnrichmentPipeline {
    /// Fails before any record is touched when either credential is missing.
    pub fn new(config: &AppConfig, output: impl Into<PathBuf>) -> AppResult<Self> {
        let (maps_key, gemini_key) = config.require_credentials()?;
        let places = PlacesService::new(config, maps_key)?;
        let generator = ContentGenerator::new(config, gemini_key)?;
        Ok(Self::from_parts(
            places,
            generator,
            CheckpointWriter::new(output),
            PipelineSettings::from_config(config),
        ))
    }

    pub fn from_parts(
        places: PlacesService,
        generator: ContentGenerator,
        writer: CheckpointWriter,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            places,
            generator,
            writer,
            checkpoint: settings.checkpoint,
            pacer: RecordPacer::new(settings.record_delay),
            guard: Arc::new(AsyncMutex::new(())),
        }
    }

    pub fn output_path(&self) -> &std::path::Path {
        self.writer.path()
    }

    /// Processes the first `limit` records (all when `None`) strictly in order.
    ///
    /// Rows past the limit, or left behind by cancellation, are still written
    /// to every checkpoint in their input state.
    pub async fn run(
        &self,
        records: &mut RecordSet,
        limit: Option<usize>,
        observer: Option<ProgressObserver>,
        cancel_flag: Option<Arc<AtomicBool>>,
    ) -> RunSummary {
        let _lock = self.guard.lock().await;
        let total = limit
            .map(|limit| limit.min(records.len()))
            .unwrap_or(records.len());
        let mut summary = RunSummary {
            total_records: records.len(),
            ..RunSummary::default()
        };
        let mut last_attempt: Option<(usize, bool)> = None;

        let previously_finalized = records
            .records()
            .iter()
            .filter(|record| record.is_finalized())
            .count();
        info!(
            total,
            records = records.len(),
            previously_finalized,
            models = ?self.generator.models(),
            checkpoint_every = self.checkpoint.every(),
            output = %self.writer.path().display(),
            "starting enrichment run"
        );

        for idx in 0..total {
            if is_cancelled(&cancel_flag) {
                warn!(processed = summary.processed, "run cancelled between records");
                summary.cancelled = true;
                break;
            }

            self.pacer.wait().await;
            // The flag may have been raised while pacing.
            if is_cancelled(&cancel_flag) {
                warn!(processed = summary.processed, "run cancelled while waiting for the next record");
                summary.cancelled = true;
                break;
            }
            let record = &mut records.records_mut()[idx];
            info!(
                index = idx + 1,
                total,
                name = %record.business_name,
                "processing business"
            );
            let status = self.process_record(record).await;
            summary.tally(status);
            if let Some(callback) = &observer {
                callback(RunProgress {
                    index: idx + 1,
                    total,
                    business_name: record.business_name.clone(),
                    status,
                });
            }

            let finalized = summary.processed;
            if self.checkpoint.is_due(finalized) || finalized == total {
                let written = self.write_checkpoint(records, finalized, &mut summary);
                last_attempt = Some((finalized, written));
            }
        }

        summary.final_checkpoint_written = match last_attempt {
            Some((finalized, written)) if finalized == summary.processed => written,
            _ => self.write_checkpoint(records, summary.processed, &mut summary),
        };
        summary.not_processed = summary.total_records - summary.processed;

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            partial = summary.partial,
            failed = summary.failed,
            not_processed = summary.not_processed,
            checkpoint_failures = summary.checkpoint_failures,
            "enrichment run finished"
        );
        summary
    }

    async fn process_record(&self, record: &mut BusinessRecord) -> ProcessingStatus {
        if record.business_name.is_empty() {
            warn!(row = record.row_number, "skipping lookup for row without a business name");
            record.maps_url = None;
            record.review_score = None;
            record.mark_failed("missing business name");
            return ProcessingStatus::Failed;
        }

        let query = LookupQuery {
            name: &record.business_name,
            address: &record.address,
        };
        let place = match self.places.resolve(&query).await {
            Ok(LookupOutcome::Found(place)) => Some(place),
            Ok(LookupOutcome::NotFound) => None,
            Err(err) => {
                warn!(?err, name = %record.business_name, "maps lookup failed");
                record.maps_url = None;
                record.review_score = None;
                record.mark_failed(sanitize_error_copy(&format!("maps lookup failed: {err}")));
                return ProcessingStatus::Failed;
            }
        };

        let generated = {
            let request = AboutRequest {
                name: &record.business_name,
                address: &record.address,
                telephone: record.telephone.as_deref(),
                maps_url: place.as_ref().map(|place| place.maps_url.as_str()),
                review_score: place.as_ref().and_then(|place| place.review_score),
            };
            self.generator.about_section(&request).await
        };

        match (place, generated) {
            (Some(place), Ok(about)) => {
                info!(
                    name = %record.business_name,
                    strategy = place.strategy.as_str(),
                    query = %place.query,
                    model = %about.model,
                    "business enriched"
                );
                record.mark_success(place.maps_url, place.review_score, about.text);
                ProcessingStatus::Success
            }
            (None, Ok(about)) => {
                info!(
                    name = %record.business_name,
                    model = %about.model,
                    "no maps listing found; generated about section only"
                );
                record.mark_partial(about.text);
                ProcessingStatus::PartialNoMapsData
            }
            (place, Err(err)) => {
                warn!(?err, name = %record.business_name, "about section generation failed");
                record.maps_url = place.as_ref().map(|place| place.maps_url.clone());
                record.review_score = place.as_ref().and_then(|place| place.review_score);
                record.mark_failed(sanitize_error_copy(&format!(
                    "about section generation failed: {err}"
                )));
                ProcessingStatus::Failed
            }
        }
    }

    fn write_checkpoint(
        &self,
        records: &RecordSet,
        finalized: usize,
        summary: &mut RunSummary,
    ) -> bool {
        match self.writer.write(records) {
            Ok(()) => {
                info!(finalized, path = %self.writer.path().display(), "checkpoint saved");
                summary.checkpoints.push(finalized);
                true
            }
            Err(err) => {
                error!(
                    ?err,
                    finalized,
                    path = %self.writer.path().display(),
                    "failed to write checkpoint; results since the last checkpoint are not saved"
                );
                summary.checkpoint_failures += 1;
                false
            }
        }
    }
}

fn is_cancelled(flag: &Option<Arc<AtomicBool>>) -> bool {
    flag.as_ref()
        .map(|flag| flag.load(Ordering::SeqCst))
        .unwrap_or(false)
}

/// Spaces the start of consecutive records by at least `min_interval`.
struct RecordPacer {
    min_interval: Duration,
    last_tick: AsyncMutex<Option<Instant>>,
}

impl RecordPacer {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_tick: AsyncMutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut guard = self.last_tick.lock().await;
        if let Some(prev) = *guard {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::content::TextGeneration;
    use crate::errors::AppError;
    use crate::ingestion::parse_records;
    use crate::places::{PlaceCandidate, PlaceListing, PlaceLookup};

    type SearchFn = dyn Fn(&str) -> AppResult<Vec<PlaceCandidate>> + Send + Sync;
    type GenerateFn = dyn Fn(&str) -> AppResult<String> + Send + Sync;

    struct MockPlaces {
        respond: Box<SearchFn>,
        searches: Mutex<Vec<String>>,
        search_times: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl PlaceLookup for MockPlaces {
        async fn search(&self, query: &str) -> AppResult<Vec<PlaceCandidate>> {
            self.searches.lock().push(query.to_string());
            self.search_times.lock().push(Instant::now());
            (self.respond)(query)
        }

        async fn listing(&self, _place_id: &str) -> AppResult<Option<PlaceListing>> {
            Ok(None)
        }
    }

    struct MockGeneration {
        respond: Box<GenerateFn>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGeneration for MockGeneration {
        async fn generate(&self, _model: &str, prompt: &str) -> AppResult<String> {
            self.prompts.lock().push(prompt.to_string());
            (self.respond)(prompt)
        }
    }

    struct Harness {
        pipeline: EnrichmentPipeline,
        places: Arc<MockPlaces>,
        generation: Arc<MockGeneration>,
        output: PathBuf,
        _dir: TempDir,
    }

    fn harness<S, G>(every: usize, search: S, generate: G) -> Harness
    where
        S: Fn(&str) -> AppResult<Vec<PlaceCandidate>> + Send + Sync + 'static,
        G: Fn(&str) -> AppResult<String> + Send + Sync + 'static,
    {
        paced_harness(every, Duration::ZERO, search, generate)
    }

    fn paced_harness<S, G>(every: usize, delay: Duration, search: S, generate: G) -> Harness
    where
        S: Fn(&str) -> AppResult<Vec<PlaceCandidate>> + Send + Sync + 'static,
        G: Fn(&str) -> AppResult<String> + Send + Sync + 'static,
    {
        let dir = tempdir().unwrap();
        let output = dir.path().join("processed.csv");
        harness_at(output, dir, every, delay, search, generate)
    }

    fn harness_at<S, G>(
        output: PathBuf,
        dir: TempDir,
        every: usize,
        delay: Duration,
        search: S,
        generate: G,
    ) -> Harness
    where
        S: Fn(&str) -> AppResult<Vec<PlaceCandidate>> + Send + Sync + 'static,
        G: Fn(&str) -> AppResult<String> + Send + Sync + 'static,
    {
        let places = Arc::new(MockPlaces {
            respond: Box::new(search),
            searches: Mutex::new(Vec::new()),
            search_times: Mutex::new(Vec::new()),
        });
        let generation = Arc::new(MockGeneration {
            respond: Box::new(generate),
            prompts: Mutex::new(Vec::new()),
        });
        let generator =
            ContentGenerator::from_generation(generation.clone(), vec!["test-model".into()])
                .unwrap();
        let pipeline = EnrichmentPipeline::from_parts(
            PlacesService::from_lookup(places.clone()),
            generator,
            CheckpointWriter::new(&output),
            PipelineSettings {
                record_delay: delay,
                checkpoint: CheckpointPolicy::new(every),
            },
        );
        Harness {
            pipeline,
            places,
            generation,
            output,
            _dir: dir,
        }
    }

    fn listing(url: &str, rating: Option<f64>) -> Vec<PlaceCandidate> {
        vec![PlaceCandidate {
            place_id: "place".into(),
            name: None,
            formatted_address: None,
            rating,
            maps_url: Some(url.into()),
        }]
    }

    fn two_hundred_words(_prompt: &str) -> AppResult<String> {
        Ok(vec!["welcome"; 200].join(" "))
    }

    fn abc_cafe() -> RecordSet {
        parse_records(
            "Business Name,Address,Telephone\nABC Cafe,\"123 Main St, Anytown, CA\",555-123-4567\n"
                .as_bytes(),
        )
        .unwrap()
    }

    fn numbered(count: usize) -> RecordSet {
        let mut csv = String::from("Business Name,Address,Telephone\n");
        for n in 1..=count {
            csv.push_str(&format!("Business {n},\"{n} Main St, Anytown, CA\",555-000-{n:04}\n"));
        }
        parse_records(csv.as_bytes()).unwrap()
    }

    fn read_output(path: &PathBuf) -> Vec<csv::StringRecord> {
        csv::Reader::from_path(path)
            .unwrap()
            .records()
            .map(|row| row.unwrap())
            .collect()
    }

    #[tokio::test]
    async fn lookup_hit_on_second_strategy_is_success() {
        let h = harness(
            5,
            |query| {
                if query == "ABC Cafe Anytown, CA" {
                    Ok(listing("https://maps.google.com/?cid=42", Some(4.7)))
                } else {
                    Ok(Vec::new())
                }
            },
            two_hundred_words,
        );
        let mut records = abc_cafe();

        let summary = h.pipeline.run(&mut records, None, None, None).await;

        assert_eq!(summary.succeeded, 1);
        assert_eq!(h.places.searches.lock().len(), 2);
        let record = &records.records()[0];
        assert_eq!(record.status, Some(ProcessingStatus::Success));
        assert_eq!(record.maps_url.as_deref(), Some("https://maps.google.com/?cid=42"));
        assert_eq!(record.review_score, Some(4.7));
        assert!(record.error_message.is_none());
        let about = record.about_section.as_deref().unwrap();
        let words = about.split_whitespace().count();
        assert!((150..=220).contains(&words));
        assert!(!about.contains('{') && !about.contains('['));
        assert!(h.generation.prompts.lock()[0].contains("https://maps.google.com/?cid=42"));

        let rows = read_output(&h.output);
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][3], "https://maps.google.com/?cid=42");
        assert_eq!(&rows[0][6], "Success");
        assert_eq!(&rows[0][7], "");
    }

    #[tokio::test]
    async fn lookup_miss_still_generates_content() {
        let h = harness(5, |_| Ok(Vec::new()), two_hundred_words);
        let mut records = abc_cafe();

        let summary = h.pipeline.run(&mut records, None, None, None).await;

        assert_eq!(summary.partial, 1);
        let record = &records.records()[0];
        assert_eq!(record.status, Some(ProcessingStatus::PartialNoMapsData));
        assert!(record.maps_url.is_none());
        assert!(record.about_section.is_some());
        assert!(record.error_message.is_none());
        assert_eq!(h.generation.prompts.lock().len(), 1);
    }

    #[tokio::test]
    async fn lookup_error_fails_record_without_generation() {
        let h = harness(
            5,
            |_| {
                Err(AppError::Places {
                    status: "REQUEST_DENIED".into(),
                    message: "connection refused by upstream".into(),
                })
            },
            two_hundred_words,
        );
        let mut records = abc_cafe();

        let summary = h.pipeline.run(&mut records, None, None, None).await;

        assert_eq!(summary.failed, 1);
        let record = &records.records()[0];
        assert_eq!(record.status, Some(ProcessingStatus::Failed));
        assert!(record
            .error_message
            .as_deref()
            .unwrap()
            .contains("connection refused by upstream"));
        assert!(h.generation.prompts.lock().is_empty());
        assert_eq!(h.places.searches.lock().len(), 1);
    }

    #[tokio::test]
    async fn generation_error_after_lookup_keeps_map_data() {
        let h = harness(
            5,
            |_| Ok(listing("https://maps.google.com/?cid=7", Some(3.9))),
            |_| Err(AppError::Generation("HTTP 500: internal".into())),
        );
        let mut records = abc_cafe();

        h.pipeline.run(&mut records, None, None, None).await;

        let record = &records.records()[0];
        assert_eq!(record.status, Some(ProcessingStatus::Failed));
        assert_eq!(record.maps_url.as_deref(), Some("https://maps.google.com/?cid=7"));
        assert!(record.about_section.is_none());
        assert!(record.error_message.as_deref().unwrap().contains("internal"));
    }

    #[tokio::test]
    async fn checkpoints_after_every_fifth_record_and_at_the_end() {
        let h = harness(5, |_| Ok(Vec::new()), two_hundred_words);
        let mut records = numbered(12);

        let summary = h.pipeline.run(&mut records, None, None, None).await;

        assert_eq!(summary.checkpoints, vec![5, 10, 12]);
        assert!(summary.final_checkpoint_written);
        assert_eq!(summary.processed, 12);
        assert_eq!(read_output(&h.output).len(), 12);
    }

    #[tokio::test]
    async fn final_record_on_a_multiple_writes_once() {
        let h = harness(5, |_| Ok(Vec::new()), two_hundred_words);
        let mut records = numbered(10);

        let summary = h.pipeline.run(&mut records, None, None, None).await;

        assert_eq!(summary.checkpoints, vec![5, 10]);
        assert!(summary.final_checkpoint_written);
    }

    #[tokio::test]
    async fn checkpoint_reflects_contiguous_prefix() {
        let h = harness(2, |_| Ok(Vec::new()), two_hundred_words);
        let mut records = numbered(3);
        let output = h.output.clone();
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let seen = snapshots.clone();
        let observer: ProgressObserver = Arc::new(move |progress: RunProgress| {
            if progress.index == 3 {
                let statuses: Vec<String> =
                    read_output(&output).iter().map(|row| row[6].to_string()).collect();
                seen.lock().push(statuses);
            }
        });

        h.pipeline.run(&mut records, None, Some(observer), None).await;

        let snapshots = snapshots.lock();
        assert_eq!(
            snapshots[0],
            vec!["PartialNoMapsData", "PartialNoMapsData", ""]
        );
    }

    #[tokio::test]
    async fn limit_leaves_later_rows_untouched() {
        let h = harness(5, |_| Ok(Vec::new()), two_hundred_words);
        let mut records = numbered(4);

        let summary = h.pipeline.run(&mut records, Some(2), None, None).await;

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.not_processed, 2);
        assert_eq!(summary.checkpoints, vec![2]);
        let rows = read_output(&h.output);
        assert_eq!(rows.len(), 4);
        let names: Vec<&str> = rows.iter().map(|row| &row[0]).collect();
        assert_eq!(names, vec!["Business 1", "Business 2", "Business 3", "Business 4"]);
        assert_eq!(&rows[1][6], "PartialNoMapsData");
        assert_eq!(&rows[2][6], "");
        assert_eq!(&rows[3][5], "");
    }

    #[tokio::test]
    async fn cancellation_stops_between_records_and_saves() {
        let h = harness(5, |_| Ok(Vec::new()), two_hundred_words);
        let mut records = numbered(6);
        let flag = Arc::new(AtomicBool::new(false));
        let trigger = flag.clone();
        let observer: ProgressObserver = Arc::new(move |progress: RunProgress| {
            if progress.index == 2 {
                trigger.store(true, Ordering::SeqCst);
            }
        });

        let summary = h
            .pipeline
            .run(&mut records, None, Some(observer), Some(flag))
            .await;

        assert!(summary.cancelled);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.not_processed, 4);
        assert_eq!(summary.checkpoints, vec![2]);
        assert_eq!(read_output(&h.output).len(), 6);
    }

    #[tokio::test]
    async fn checkpoint_failures_do_not_stop_the_run() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"file, not a directory").unwrap();
        let h = harness_at(
            blocker.join("processed.csv"),
            dir,
            2,
            Duration::ZERO,
            |_| Ok(Vec::new()),
            two_hundred_words,
        );
        let mut records = numbered(5);

        let summary = h.pipeline.run(&mut records, None, None, None).await;

        assert_eq!(summary.processed, 5);
        assert_eq!(summary.checkpoint_failures, 3);
        assert!(summary.checkpoints.is_empty());
        assert!(!summary.final_checkpoint_written);
    }

    #[tokio::test]
    async fn blank_business_name_fails_without_service_calls() {
        let h = harness(5, |_| Ok(Vec::new()), two_hundred_words);
        let mut records = parse_records(
            "Business Name,Address,Telephone\n,\"1 Main St, Anytown\",555\n".as_bytes(),
        )
        .unwrap();

        h.pipeline.run(&mut records, None, None, None).await;

        let record = &records.records()[0];
        assert_eq!(record.status, Some(ProcessingStatus::Failed));
        assert_eq!(record.error_message.as_deref(), Some("missing business name"));
        assert!(h.places.searches.lock().is_empty());
        assert!(h.generation.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn statuses_satisfy_row_invariants() {
        let h = harness(
            3,
            |query| {
                if query.contains("Business 1 ") {
                    Ok(listing("https://maps.google.com/?cid=1", Some(4.2)))
                } else if query.contains("Business 2") {
                    Err(AppError::Places {
                        status: "OVER_QUERY_LIMIT".into(),
                        message: "quota".into(),
                    })
                } else {
                    Ok(Vec::new())
                }
            },
            |prompt| {
                if prompt.contains("Business 4") {
                    Err(AppError::Generation("HTTP 503: unavailable".into()))
                } else {
                    two_hundred_words(prompt)
                }
            },
        );
        let mut records = numbered(5);

        h.pipeline.run(&mut records, None, None, None).await;

        let rows = read_output(&h.output);
        assert_eq!(rows.len(), 5);
        let statuses: Vec<&str> = rows.iter().map(|row| &row[6]).collect();
        assert_eq!(
            statuses,
            vec!["Success", "Failed", "PartialNoMapsData", "Failed", "PartialNoMapsData"]
        );
        for row in &rows {
            let status = ProcessingStatus::parse(&row[6]).unwrap();
            assert_eq!(status == ProcessingStatus::Failed, !row[7].is_empty());
            match status {
                ProcessingStatus::Success => assert!(!row[3].is_empty() && !row[5].is_empty()),
                ProcessingStatus::PartialNoMapsData => {
                    assert!(row[3].is_empty() && !row[5].is_empty())
                }
                ProcessingStatus::Failed => {}
            }
        }
    }

    #[tokio::test]
    async fn deterministic_services_give_identical_output() {
        let search = |query: &str| -> AppResult<Vec<PlaceCandidate>> {
            if query.starts_with("Business 2") {
                Ok(listing("https://maps.google.com/?cid=2", Some(4.0)))
            } else {
                Ok(Vec::new())
            }
        };
        let first = harness(2, search, two_hundred_words);
        let second = harness(2, search, two_hundred_words);

        let mut a = numbered(4);
        let mut b = numbered(4);
        first.pipeline.run(&mut a, None, None, None).await;
        second.pipeline.run(&mut b, None, None, None).await;

        assert_eq!(
            fs::read(&first.output).unwrap(),
            fs::read(&second.output).unwrap()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn records_are_spaced_by_the_configured_delay() {
        let h = paced_harness(5, Duration::from_secs(2), |_| Ok(Vec::new()), two_hundred_words);
        let mut records = numbered(3);

        let started = Instant::now();
        let summary = h.pipeline.run(&mut records, None, None, None).await;

        assert_eq!(summary.processed, 3);
        assert!(started.elapsed() >= Duration::from_secs(4));
        let times = h.places.search_times.lock();
        assert_eq!(times[0], started);
    }

    #[tokio::test(start_paused = true)]
    async fn strategies_within_a_record_are_not_delayed() {
        let h = paced_harness(5, Duration::from_secs(2), |_| Ok(Vec::new()), two_hundred_words);
        let mut records = abc_cafe();

        h.pipeline.run(&mut records, None, None, None).await;

        let times = h.places.search_times.lock();
        assert_eq!(times.len(), 5);
        assert!(times.iter().all(|at| *at == times[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_pacing_skips_the_next_record() {
        let h = paced_harness(5, Duration::from_secs(2), |_| Ok(Vec::new()), two_hundred_words);
        let mut records = numbered(3);
        let flag = Arc::new(AtomicBool::new(false));
        let trigger = flag.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            trigger.store(true, Ordering::SeqCst);
        });

        let summary = h.pipeline.run(&mut records, None, None, Some(flag)).await;

        assert!(summary.cancelled);
        assert_eq!(summary.processed, 1);
        assert_eq!(h.generation.prompts.lock().len(), 1);
        assert_eq!(summary.checkpoints, vec![1]);
    }
}
