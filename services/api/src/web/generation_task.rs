//! services/api/src/web/generation_task.rs
//!
//! This module contains the background "worker" that derives a document's
//! summary, quiz and flashcards after upload. The upload handler hands the
//! document off and returns immediately; the three steps then run as
//! separate tasks and each one persists its own result.

use crate::generation::GenerationEngine;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use study_genie_core::domain::{FlashcardSet, Quiz};
use study_genie_core::ports::DatabaseService;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

/// What happened to one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The result was written to the record store.
    Persisted,
    /// Generation produced nothing worth storing.
    Skipped,
    /// The store write failed or the step aborted.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub document_id: Uuid,
    pub summary: StepOutcome,
    pub quiz: StepOutcome,
    pub flashcards: StepOutcome,
}

type InFlight = Arc<Mutex<HashSet<Uuid>>>;

/// Removes a document from the in-flight set when its pipeline ends, even on panic.
struct InFlightGuard {
    in_flight: InFlight,
    document_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.document_id);
    }
}

/// Launches and supervises per-document generation pipelines.
pub struct GenerationPipeline {
    db: Arc<dyn DatabaseService>,
    engine: GenerationEngine,
    tracker: TaskTracker,
    in_flight: InFlight,
}

impl GenerationPipeline {
    pub fn new(db: Arc<dyn DatabaseService>, engine: GenerationEngine) -> Self {
        Self {
            db,
            engine,
            tracker: TaskTracker::new(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Starts the pipeline for a stored document without waiting for it.
    ///
    /// Returns `None` when a pipeline for the same document is already running.
    /// Callers may drop the handle; the work runs to completion regardless.
    pub fn launch(&self, document_id: Uuid, text: String) -> Option<JoinHandle<PipelineReport>> {
        {
            let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if !set.insert(document_id) {
                warn!("Pipeline for document {} is already running; not relaunching", document_id);
                return None;
            }
        }
        let guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
            document_id,
        };

        let db = self.db.clone();
        let engine = self.engine.clone();
        info!("Spawning generation pipeline for document {}", document_id);
        Some(self.tracker.spawn(async move {
            let _guard = guard;
            let report = run_pipeline(db, engine, document_id, Arc::from(text)).await;
            info!(
                "Generated content for document {} (summary: {:?}, quiz: {:?}, flashcards: {:?})",
                document_id, report.summary, report.quiz, report.flashcards
            );
            report
        }))
    }

    #[cfg(test)]
    fn is_running(&self, document_id: Uuid) -> bool {
        let set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        set.contains(&document_id)
    }

    /// Stops accepting new pipelines and waits for the running ones.
    pub async fn shutdown(&self) {
        self.tracker.close();
        info!("Waiting for {} generation pipeline(s) to finish", self.tracker.len());
        self.tracker.wait().await;
    }
}

/// Runs the three steps as independent tasks and joins them.
async fn run_pipeline(
    db: Arc<dyn DatabaseService>,
    engine: GenerationEngine,
    document_id: Uuid,
    text: Arc<str>,
) -> PipelineReport {
    let summary = tokio::spawn(summary_step(db.clone(), engine.clone(), document_id, text.clone()));
    let quiz = tokio::spawn(quiz_step(db.clone(), engine.clone(), document_id, text.clone()));
    let flashcards = tokio::spawn(flashcard_step(db, engine, document_id, text));

    let (summary, quiz, flashcards) = tokio::join!(summary, quiz, flashcards);
    PipelineReport {
        document_id,
        summary: settle("summary", document_id, summary),
        quiz: settle("quiz", document_id, quiz),
        flashcards: settle("flashcards", document_id, flashcards),
    }
}

fn settle(
    step: &str,
    document_id: Uuid,
    joined: Result<StepOutcome, tokio::task::JoinError>,
) -> StepOutcome {
    joined.unwrap_or_else(|e| {
        error!("The {} step for document {} aborted: {}", step, document_id, e);
        StepOutcome::Failed(e.to_string())
    })
}

async fn summary_step(
    db: Arc<dyn DatabaseService>,
    engine: GenerationEngine,
    document_id: Uuid,
    text: Arc<str>,
) -> StepOutcome {
    let summary = engine.generate_summary(&text).await;
    match db.set_document_summary(document_id, &summary, Utc::now()).await {
        Ok(()) => {
            info!("Saved summary for document {}", document_id);
            StepOutcome::Persisted
        }
        Err(e) => {
            error!("Failed to save summary for document {}: {}", document_id, e);
            StepOutcome::Failed(e.to_string())
        }
    }
}

async fn quiz_step(
    db: Arc<dyn DatabaseService>,
    engine: GenerationEngine,
    document_id: Uuid,
    text: Arc<str>,
) -> StepOutcome {
    let questions = engine.generate_quiz(&text).await;
    if questions.is_empty() {
        return StepOutcome::Skipped;
    }
    let quiz = Quiz {
        id: Uuid::new_v4(),
        document_id,
        questions,
        created_at: Utc::now(),
    };
    match db.save_quiz(quiz).await {
        Ok(()) => StepOutcome::Persisted,
        Err(e) => {
            error!("Failed to save quiz for document {}: {}", document_id, e);
            StepOutcome::Failed(e.to_string())
        }
    }
}

async fn flashcard_step(
    db: Arc<dyn DatabaseService>,
    engine: GenerationEngine,
    document_id: Uuid,
    text: Arc<str>,
) -> StepOutcome {
    let cards = engine.generate_flashcards(&text).await;
    if cards.is_empty() {
        info!("No flashcards produced for document {}", document_id);
        return StepOutcome::Skipped;
    }
    let set = FlashcardSet {
        id: Uuid::new_v4(),
        document_id,
        cards,
        created_at: Utc::now(),
    };
    match db.save_flashcard_set(set).await {
        Ok(()) => StepOutcome::Persisted,
        Err(e) => {
            error!("Failed to save flashcards for document {}: {}", document_id, e);
            StepOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDb;
    use crate::generation::parse::fallback_quiz;
    use crate::generation::SUMMARY_FALLBACK;
    use crate::test_support::ScriptedBackend;
    use study_genie_core::domain::Document;

    const QUIZ_JSON: &str = r#"[{"question": "What do plants make?", "options": ["A) Sugar", "B) Salt", "C) Iron", "D) Gold"], "correct_answer": "A", "explanation": "Photosynthesis."}]"#;
    const CARDS_JSON: &str = r#"[{"term": "Chlorophyll", "definition": "Green pigment"}]"#;

    async fn stored_document(db: &InMemoryDb) -> Document {
        let now = Utc::now();
        db.create_document(Document {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            filename: "plants.pdf".to_string(),
            file_type: "application/pdf".to_string(),
            content: "Plants make sugar from light.".to_string(),
            summary: None,
            uploaded_at: now,
            processed_at: None,
        })
        .await
        .unwrap()
    }

    fn pipeline(db: &Arc<InMemoryDb>, backend: ScriptedBackend) -> GenerationPipeline {
        GenerationPipeline::new(db.clone(), GenerationEngine::new(Arc::new(backend)))
    }

    #[tokio::test]
    async fn all_three_steps_persist() {
        let db = Arc::new(InMemoryDb::new());
        let doc = stored_document(&db).await;
        let backend = ScriptedBackend::by_system(vec![
            ("summaries", "Plants turn light into sugar."),
            ("quiz", QUIZ_JSON),
            ("flashcards", CARDS_JSON),
        ]);
        let pipeline = pipeline(&db, backend);

        let report = pipeline.launch(doc.id, doc.content.clone()).unwrap().await.unwrap();

        assert_eq!(report.summary, StepOutcome::Persisted);
        assert_eq!(report.quiz, StepOutcome::Persisted);
        assert_eq!(report.flashcards, StepOutcome::Persisted);

        let stored = db.get_document_for_owner(doc.id, doc.user_id).await.unwrap();
        assert_eq!(stored.summary.as_deref(), Some("Plants turn light into sugar."));
        assert!(stored.processed_at.is_some());
        assert_eq!(db.get_quiz_for_document(doc.id).await.unwrap().questions.len(), 1);
        assert_eq!(db.get_flashcard_set_for_document(doc.id).await.unwrap().cards.len(), 1);
    }

    #[tokio::test]
    async fn malformed_flashcards_create_no_set() {
        let db = Arc::new(InMemoryDb::new());
        let doc = stored_document(&db).await;
        let backend = ScriptedBackend::by_system(vec![
            ("summaries", "Summary."),
            ("quiz", QUIZ_JSON),
            ("flashcards", "{ not an array"),
        ]);

        let report = pipeline(&db, backend)
            .launch(doc.id, doc.content.clone())
            .unwrap()
            .await
            .unwrap();

        assert_eq!(report.flashcards, StepOutcome::Skipped);
        assert_eq!(report.quiz, StepOutcome::Persisted);
        assert_eq!(db.flashcard_set_count(doc.id).await, 0);
    }

    #[tokio::test]
    async fn backend_outage_degrades_to_fallback_content() {
        let db = Arc::new(InMemoryDb::new());
        let doc = stored_document(&db).await;

        let report = pipeline(&db, ScriptedBackend::failing())
            .launch(doc.id, doc.content.clone())
            .unwrap()
            .await
            .unwrap();

        assert_eq!(report.summary, StepOutcome::Persisted);
        assert_eq!(report.quiz, StepOutcome::Persisted);
        assert_eq!(report.flashcards, StepOutcome::Skipped);

        let stored = db.get_document_for_owner(doc.id, doc.user_id).await.unwrap();
        assert_eq!(stored.summary.as_deref(), Some(SUMMARY_FALLBACK));
        assert!(stored.processed_at.is_some());
        assert_eq!(db.get_quiz_for_document(doc.id).await.unwrap().questions, fallback_quiz());
    }

    #[tokio::test]
    async fn missing_document_fails_only_the_summary_step() {
        let db = Arc::new(InMemoryDb::new());
        let ghost = Uuid::new_v4();
        let backend = ScriptedBackend::by_system(vec![
            ("summaries", "Summary."),
            ("quiz", QUIZ_JSON),
            ("flashcards", CARDS_JSON),
        ]);

        let report = pipeline(&db, backend)
            .launch(ghost, "text".to_string())
            .unwrap()
            .await
            .unwrap();

        assert!(matches!(report.summary, StepOutcome::Failed(_)));
        assert_eq!(report.quiz, StepOutcome::Persisted);
        assert_eq!(report.flashcards, StepOutcome::Persisted);
    }

    #[tokio::test]
    async fn second_launch_for_running_document_is_refused() {
        let db = Arc::new(InMemoryDb::new());
        let doc = stored_document(&db).await;
        let pipeline = pipeline(&db, ScriptedBackend::always("[]"));

        let first = pipeline.launch(doc.id, doc.content.clone()).unwrap();
        assert!(pipeline.launch(doc.id, doc.content.clone()).is_none());

        first.await.unwrap();
        assert!(!pipeline.is_running(doc.id));
        assert!(pipeline.launch(doc.id, doc.content.clone()).is_some());
        pipeline.shutdown().await;
        assert_eq!(db.quiz_count(doc.id).await, 2);
    }
}
