use enrichment::{BatchDriver, EnrichmentEngine, RunSummary};
use sentiment_engine::testing::KeywordClassifier;
use sentiment_engine::SentimentClassifier;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use stocksent_core::{CoreError, ModelError, Probabilities, Table};
use tempfile::TempDir;

const APPLE_RAW: &str = "\
id,title,text,author
1,Earnings,Record profits this quarter,alice
2,Recall,Massive recall announced,bob
3,Question,,carol
";

struct Dirs {
    _root: TempDir,
    raw: std::path::PathBuf,
    results: std::path::PathBuf,
}

fn dirs() -> Dirs {
    let root = tempfile::tempdir().unwrap();
    let raw = root.path().join("data");
    let results = root.path().join("results");
    fs::create_dir_all(&raw).unwrap();
    Dirs {
        raw,
        results,
        _root: root,
    }
}

fn run(classifier: &dyn SentimentClassifier, dirs: &Dirs) -> Result<RunSummary, CoreError> {
    BatchDriver::new(
        EnrichmentEngine::new(classifier),
        dirs.raw.clone(),
        dirs.results.clone(),
    )
    .run()
}

fn read(path: &Path) -> Table {
    Table::read(path).unwrap()
}

#[test]
fn test_first_run_then_idempotent_rerun() {
    let dirs = dirs();
    fs::write(dirs.raw.join("apple_reddit.csv"), APPLE_RAW).unwrap();
    let classifier = KeywordClassifier::new();

    let summary = run(&classifier, &dirs).unwrap();
    assert_eq!(
        summary,
        RunSummary {
            processed: 1,
            failed: 0,
            new_records: 3
        }
    );

    let result_path = dirs.results.join("apple_sentiment_reddit.csv");
    let out = read(&result_path);
    assert_eq!(out.len(), 3);
    assert_eq!(
        out.column("sentiment").unwrap(),
        vec!["positive", "negative", "neutral"]
    );
    assert_eq!(
        out.column("sentiment_score").unwrap(),
        vec!["1.0", "0.0", "0.5"]
    );
    assert_eq!(out.column("author").unwrap(), vec!["alice", "bob", "carol"]);

    let first_bytes = fs::read(&result_path).unwrap();
    let scored_before = classifier.texts_scored();

    let summary = run(&classifier, &dirs).unwrap();
    assert_eq!(summary.new_records, 0);
    assert_eq!(summary.processed, 1);
    assert_eq!(classifier.texts_scored(), scored_before);
    assert_eq!(fs::read(&result_path).unwrap(), first_bytes);
}

/// Log sink shared with a test subscriber.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_rerun_logs_new_and_total_counts() {
    let dirs = dirs();
    fs::write(dirs.raw.join("apple_reddit.csv"), APPLE_RAW).unwrap();
    let classifier = KeywordClassifier::new();

    let captured = Captured::default();
    let sink = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || sink.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        run(&classifier, &dirs).unwrap();
        run(&classifier, &dirs).unwrap();
    });

    let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
    assert!(logs.contains("apple: 3 new posts, 3 total"), "{}", logs);
    assert!(logs.contains("apple: 0 new posts, 3 total"), "{}", logs);
}

#[test]
fn test_new_post_is_appended() {
    let dirs = dirs();
    let raw_path = dirs.raw.join("apple_reddit.csv");
    fs::write(&raw_path, APPLE_RAW).unwrap();
    let classifier = KeywordClassifier::new();
    run(&classifier, &dirs).unwrap();

    let mut raw = APPLE_RAW.to_string();
    raw.push_str("4,Downgrade,Analysts turn bearish,dave\n");
    fs::write(&raw_path, raw).unwrap();

    let summary = run(&classifier, &dirs).unwrap();
    assert_eq!(summary.new_records, 1);

    let out = read(&dirs.results.join("apple_sentiment_reddit.csv"));
    assert_eq!(out.column("id").unwrap(), vec!["1", "2", "3", "4"]);
    assert_eq!(out.column("sentiment").unwrap()[3], "negative");
}

#[test]
fn test_entities_fail_independently() {
    let dirs = dirs();
    // Second data row has more fields than the header.
    fs::write(
        dirs.raw.join("broken_reddit.csv"),
        "id,text\n1,fine\n2,too,many,fields\n",
    )
    .unwrap();
    fs::write(dirs.raw.join("nobody_reddit.csv"), "id,body\n1,profits\n").unwrap();
    fs::write(dirs.raw.join("tesla_reddit.csv"), "id,text\n1,shares crash\n").unwrap();
    let classifier = KeywordClassifier::new();

    let summary = run(&classifier, &dirs).unwrap();
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.entities(), 3);

    assert!(dirs.results.join("tesla_sentiment_reddit.csv").exists());
    assert!(!dirs.results.join("broken_sentiment_reddit.csv").exists());
    assert!(!dirs.results.join("nobody_sentiment_reddit.csv").exists());
}

#[test]
fn test_entity_names_are_kept_verbatim() {
    let dirs = dirs();
    fs::write(dirs.raw.join("Big Corp_reddit.csv"), "id,title\n1,profits\n").unwrap();
    fs::write(dirs.raw.join("notes.txt"), "not a raw file").unwrap();
    let classifier = KeywordClassifier::new();

    let summary = run(&classifier, &dirs).unwrap();
    assert_eq!(summary.processed, 1);
    assert!(dirs.results.join("Big Corp_sentiment_reddit.csv").exists());
}

#[test]
fn test_missing_raw_dir_is_an_error() {
    let dirs = dirs();
    fs::remove_dir_all(&dirs.raw).unwrap();
    let classifier = KeywordClassifier::new();

    assert!(matches!(run(&classifier, &dirs), Err(CoreError::Io(_))));
}

#[test]
fn test_empty_raw_dir_creates_results_dir() {
    let dirs = dirs();
    let classifier = KeywordClassifier::new();

    let summary = run(&classifier, &dirs).unwrap();
    assert_eq!(summary, RunSummary::default());
    assert!(dirs.results.is_dir());
}

/// Loses the device once scoring starts.
struct LostDevice;

impl SentimentClassifier for LostDevice {
    fn classify_chunk(&self, _texts: &[&str]) -> Result<Vec<Probabilities>, ModelError> {
        Err(ModelError::HardwareIncompatible {
            details: "device lost".to_string(),
        })
    }
}

#[test]
fn test_fatal_error_aborts_run() {
    let dirs = dirs();
    fs::write(dirs.raw.join("apple_reddit.csv"), APPLE_RAW).unwrap();
    fs::write(dirs.raw.join("tesla_reddit.csv"), "id,text\n1,crash\n").unwrap();

    let err = run(&LostDevice, &dirs).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Model(ModelError::HardwareIncompatible { .. })
    ));
    assert!(!dirs.results.join("tesla_sentiment_reddit.csv").exists());
}

#[test]
fn test_model_failure_leaves_entity_for_next_run() {
    let dirs = dirs();
    fs::write(dirs.raw.join("apple_reddit.csv"), "id,text\n1,record profits\n").unwrap();

    let summary = run(&KeywordClassifier::failing(), &dirs).unwrap();
    assert_eq!(summary.failed, 1);
    let result_path = dirs.results.join("apple_sentiment_reddit.csv");
    assert!(!result_path.exists());

    let summary = run(&KeywordClassifier::new(), &dirs).unwrap();
    assert_eq!(summary.new_records, 1);
    assert_eq!(read(&result_path).column("sentiment").unwrap(), vec!["positive"]);
}

struct Panicky;

impl SentimentClassifier for Panicky {
    fn classify_chunk(&self, texts: &[&str]) -> Result<Vec<Probabilities>, ModelError> {
        if texts.iter().any(|t| t.contains("explode")) {
            panic!("tensor shape mismatch");
        }
        Ok(texts.iter().map(|_| Probabilities::neutral_fallback()).collect())
    }
}

#[test]
fn test_panic_is_contained_to_entity() {
    let dirs = dirs();
    fs::write(dirs.raw.join("apple_reddit.csv"), "id,text\n1,explode\n").unwrap();
    fs::write(dirs.raw.join("tesla_reddit.csv"), "id,text\n1,calm\n").unwrap();

    let summary = run(&Panicky, &dirs).unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.processed, 1);
    assert!(dirs.results.join("tesla_sentiment_reddit.csv").exists());
}
