use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use focusdigest_core::prompts;
use focusdigest_core::{
    CachePolicy, Concurrent, DigestError, Document, FocusCache, FocusSource, GenerationRequest,
    Orchestrator, PipelineConfig, ProgressEvent, Result, RunStatus, Sequential, Template,
    TextGenerator,
};
use parking_lot::Mutex;
use tempfile::tempdir;

const FOCUS_REPLY: &str =
    r#"{"emphasis": "dates and injuries", "instructions": ["Open with a timeline", "List injuries by date"]}"#;

type Recorded = Arc<Mutex<Vec<GenerationRequest>>>;

fn recording<F>(reply: F) -> (Arc<dyn TextGenerator>, Recorded)
where
    F: Fn(&GenerationRequest) -> Result<String> + Send + Sync + 'static,
{
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let log = recorded.clone();
    let generator = move |req: &GenerationRequest| -> Result<String> {
        log.lock().push(req.clone());
        reply(req)
    };
    (Arc::new(generator), recorded)
}

fn first_word_of_text(prompt: &str) -> String {
    let start = prompt.rfind("TEXT:\n").map(|i| i + "TEXT:\n".len()).unwrap_or(0);
    prompt[start..]
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

fn document_name(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Document: "))
        .unwrap_or_default()
        .to_string()
}

fn scripted(req: &GenerationRequest) -> Result<String> {
    match req.system.as_deref() {
        Some(prompts::FOCUS_SYSTEM_PROMPT) => Ok(FOCUS_REPLY.to_string()),
        Some(prompts::CHUNK_SYSTEM_PROMPT) => Ok(format!("notes on {}", first_word_of_text(&req.prompt))),
        Some(prompts::DOCUMENT_SYSTEM_PROMPT) => Ok(format!("digest of {}", document_name(&req.prompt))),
        Some(prompts::META_SYSTEM_PROMPT) => Ok("overall meta summary".to_string()),
        _ => Err(DigestError::GenerationService("unexpected prompt".into())),
    }
}

fn calls_with(recorded: &Recorded, system: &str) -> Vec<GenerationRequest> {
    recorded
        .lock()
        .iter()
        .filter(|req| req.system.as_deref() == Some(system))
        .cloned()
        .collect()
}

fn words(prefix: &str, count: usize) -> String {
    (0..count)
        .map(|i| format!("{prefix}{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn config() -> PipelineConfig {
    PipelineConfig {
        chunk_words: 10,
        ..PipelineConfig::default()
    }
}

fn template() -> Template {
    Template::new(
        "injury-timeline",
        "Build a chronology of injuries.\n- Open with a timeline\n- List injuries by date\n",
    )
}

#[test]
fn two_documents_of_three_chunks_each() {
    let (generator, recorded) = recording(scripted);
    let orchestrator = Orchestrator::new(generator, Arc::new(FocusCache::default()), config())
        .with_model_id("llama3");
    let documents = vec![
        Document::new("doc-001", "first.txt", words("alpha", 30)),
        Document::new("doc-002", "second.txt", words("beta", 30)),
    ];

    let result = orchestrator.run(&documents, &template()).unwrap();

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.focus.emphasis, "dates and injuries");
    assert_eq!(result.chunk_summaries.len(), 6);
    let layout: Vec<(&str, usize)> = result
        .chunk_summaries
        .iter()
        .map(|s| (s.document_id.as_str(), s.index))
        .collect();
    assert_eq!(
        layout,
        vec![
            ("doc-001", 0),
            ("doc-001", 1),
            ("doc-001", 2),
            ("doc-002", 0),
            ("doc-002", 1),
            ("doc-002", 2),
        ]
    );
    let first: Vec<_> = result.chunks_for("doc-001").collect();
    assert_eq!(first[0].previous_summary, "");
    assert_eq!(first[1].previous_summary, "notes on alpha0");
    assert_eq!(first[2].previous_summary, "notes on alpha10");

    assert_eq!(result.documents.len(), 2);
    assert_eq!(result.documents[0].text, "digest of first.txt");
    assert_eq!(result.documents[1].text, "digest of second.txt");
    assert_eq!(result.meta_summary.as_deref(), Some("overall meta summary"));

    for chunk_call in calls_with(&recorded, prompts::CHUNK_SYSTEM_PROMPT) {
        assert!(chunk_call.prompt.starts_with("Focus: dates and injuries\n"));
    }
    let meta_calls = calls_with(&recorded, prompts::META_SYSTEM_PROMPT);
    assert_eq!(meta_calls.len(), 1);
    let meta_prompt = &meta_calls[0].prompt;
    let a = meta_prompt.find("### Document 1: first.txt").unwrap();
    let b = meta_prompt.find("### Document 2: second.txt").unwrap();
    assert!(a < b);
    assert!(meta_prompt.contains("1. Open with a timeline\n2. List injuries by date\n"));

    // focus + 6 chunks + 2 documents + meta
    assert_eq!(result.generation_calls, 10);
    assert_eq!(recorded.lock().len(), 10);
}

#[test]
fn always_failing_document_is_excluded_but_others_proceed() {
    let (generator, recorded) = recording(|req: &GenerationRequest| -> Result<String> {
        if req.system.as_deref() == Some(prompts::CHUNK_SYSTEM_PROMPT)
            && first_word_of_text(&req.prompt).starts_with("beta")
        {
            return Err(DigestError::GenerationTimeout {
                timeout: Duration::from_secs(300),
            });
        }
        scripted(req)
    });
    let orchestrator = Orchestrator::new(generator, Arc::new(FocusCache::default()), config());
    let documents = vec![
        Document::new("doc-001", "first.txt", words("alpha", 30)),
        Document::new("doc-002", "second.txt", words("beta", 30)),
        Document::new("doc-003", "third.txt", words("gamma", 12)),
    ];

    let result = orchestrator.run(&documents, &template()).unwrap();

    assert_eq!(result.status, RunStatus::Partial { excluded: 1 });
    assert_eq!(result.documents.len(), 3);
    assert!(result.documents[0].is_ok());
    assert!(!result.documents[1].is_ok());
    assert!(result.documents[2].is_ok());
    assert_eq!(result.excluded.len(), 1);
    assert_eq!(result.excluded[0].document_name, "second.txt");
    assert_eq!(result.excluded[0].reason, "all 3 chunk summaries failed");
    assert!(result
        .chunks_for("doc-002")
        .all(|chunk| !chunk.status.is_ok()));

    let meta_calls = calls_with(&recorded, prompts::META_SYSTEM_PROMPT);
    assert_eq!(meta_calls.len(), 1);
    assert!(!meta_calls[0].prompt.contains("second.txt"));
    assert!(meta_calls[0].prompt.contains("### Document 2: third.txt"));
    assert!(result.meta_summary.is_some());
    assert!(result.into_result().is_ok());
}

#[test]
fn every_document_failing_is_a_failed_run() {
    let (generator, recorded) = recording(|req: &GenerationRequest| -> Result<String> {
        match req.system.as_deref() {
            Some(prompts::FOCUS_SYSTEM_PROMPT) => Ok(FOCUS_REPLY.to_string()),
            _ => Err(DigestError::GenerationService("connection refused".into())),
        }
    });
    let orchestrator = Orchestrator::new(generator, Arc::new(FocusCache::default()), config());
    let documents = vec![
        Document::new("doc-001", "first.txt", words("alpha", 15)),
        Document::new("doc-002", "second.txt", words("beta", 15)),
    ];

    let result = orchestrator.run(&documents, &template()).unwrap();

    assert!(result.is_failed());
    assert!(result.meta_summary.is_none());
    assert_eq!(result.excluded.len(), 2);
    assert!(calls_with(&recorded, prompts::META_SYSTEM_PROMPT).is_empty());
    assert!(matches!(
        result.into_result(),
        Err(DigestError::AllDocumentsFailed { failed: 2 })
    ));
}

#[test]
fn concurrent_completion_order_does_not_reach_the_reduce_phase() {
    let (generator, recorded) = recording(|req: &GenerationRequest| -> Result<String> {
        if req.system.as_deref() == Some(prompts::CHUNK_SYSTEM_PROMPT) {
            let delay = match first_word_of_text(&req.prompt).chars().next() {
                Some('a') => 150,
                Some('b') => 300,
                _ => 0,
            };
            sleep(Duration::from_millis(delay));
        }
        scripted(req)
    });
    let finished = Arc::new(Mutex::new(Vec::new()));
    let sink = finished.clone();
    let orchestrator = Orchestrator::new(generator, Arc::new(FocusCache::default()), config())
        .with_strategy(Box::new(Concurrent::new(3)))
        .with_progress(Arc::new(move |event: &ProgressEvent| {
            if let ProgressEvent::DocumentDone { document_id, .. } = event {
                sink.lock().push(document_id.clone());
            }
        }));
    let documents = vec![
        Document::new("A", "a.txt", words("a", 5)),
        Document::new("B", "b.txt", words("b", 5)),
        Document::new("C", "c.txt", words("c", 5)),
    ];

    let result = orchestrator.run(&documents, &template()).unwrap();

    assert_eq!(*finished.lock(), vec!["C", "A", "B"]);
    let ids: Vec<_> = result.documents.iter().map(|d| d.document_id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B", "C"]);
    let meta_prompt = calls_with(&recorded, prompts::META_SYSTEM_PROMPT)[0].prompt.clone();
    let positions: Vec<usize> = ["### Document 1: a.txt", "### Document 2: b.txt", "### Document 3: c.txt"]
        .iter()
        .map(|heading| meta_prompt.find(heading).unwrap())
        .collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn focus_is_resolved_once_and_reused_across_runs() {
    let (generator, recorded) = recording(scripted);
    let cache = Arc::new(FocusCache::default());
    let sources = Arc::new(Mutex::new(Vec::new()));
    let sink = sources.clone();
    let orchestrator = Orchestrator::new(generator, cache.clone(), config())
        .with_strategy(Box::new(Sequential))
        .with_progress(Arc::new(move |event: &ProgressEvent| {
            if let ProgressEvent::FocusResolved { source, .. } = event {
                sink.lock().push(*source);
            }
        }));
    let documents = vec![Document::new("doc-001", "first.txt", words("alpha", 5))];

    let first = orchestrator.run(&documents, &template()).unwrap();
    let second = orchestrator.run(&documents, &template()).unwrap();
    assert_eq!(first.focus, second.focus);
    assert_eq!(calls_with(&recorded, prompts::FOCUS_SYSTEM_PROMPT).len(), 1);

    let mut edited = template();
    edited.content.push_str("- Note every hospital visit\n");
    let third = orchestrator.run(&documents, &edited).unwrap();
    assert_ne!(third.focus.source_hash, first.focus.source_hash);
    assert_eq!(calls_with(&recorded, prompts::FOCUS_SYSTEM_PROMPT).len(), 2);

    assert_eq!(
        *sources.lock(),
        vec![FocusSource::Generated, FocusSource::FastCache, FocusSource::Generated]
    );
    let stats = cache.stats();
    assert_eq!(stats.len, 2);
    assert_eq!(stats.fast_hits, 1);
    assert_eq!(stats.stale_hints, 1);
}

#[test]
fn persisted_focus_survives_a_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("focus-cache.json");
    let documents = vec![Document::new("doc-001", "first.txt", words("alpha", 5))];

    let (generator, recorded) = recording(scripted);
    let cache = Arc::new(FocusCache::load(&path, CachePolicy::Unbounded).unwrap());
    Orchestrator::new(generator, cache.clone(), config())
        .run(&documents, &template())
        .unwrap();
    cache.flush().unwrap();
    assert_eq!(calls_with(&recorded, prompts::FOCUS_SYSTEM_PROMPT).len(), 1);

    let (generator, recorded) = recording(scripted);
    let reloaded = Arc::new(FocusCache::load(&path, CachePolicy::Unbounded).unwrap());
    assert_eq!(reloaded.len(), 1);
    let result = Orchestrator::new(generator, reloaded.clone(), config())
        .run(&documents, &template())
        .unwrap();
    assert!(calls_with(&recorded, prompts::FOCUS_SYSTEM_PROMPT).is_empty());
    assert_eq!(result.focus.emphasis, "dates and injuries");
    assert_eq!(reloaded.stats().durable_hits, 1);
}

#[test]
fn empty_template_means_neutral_focus_without_a_call() {
    let (generator, recorded) = recording(scripted);
    let orchestrator = Orchestrator::new(generator, Arc::new(FocusCache::default()), config());
    let documents = vec![Document::new("doc-001", "first.txt", words("alpha", 5))];

    let result = orchestrator
        .run(&documents, &Template::new("blank", "  \n"))
        .unwrap();

    assert!(result.focus.is_neutral());
    assert!(calls_with(&recorded, prompts::FOCUS_SYSTEM_PROMPT).is_empty());
    assert_eq!(result.status, RunStatus::Succeeded);
}

#[test]
fn no_documents_is_an_error() {
    let (generator, recorded) = recording(scripted);
    let orchestrator = Orchestrator::new(generator, Arc::new(FocusCache::default()), config());
    let err = orchestrator.run(&[], &template()).unwrap_err();
    assert!(matches!(err, DigestError::NoDocumentsSupplied));
    assert!(recorded.lock().is_empty());
}
