//! Ingest a small corpus, then retrieve and answer over it

use pitwall_common::config::AppConfig;
use pitwall_common::db::models::{DocumentType, NewDocument};
use pitwall_common::db::{MemoryRepository, Repository};
use pitwall_common::embeddings::MockEmbedder;
use pitwall_common::llm::{MockGenerator, TextGenerator};
use pitwall_common::retry::RetryPolicy;
use pitwall_ingestion::IngestionProcessor;
use pitwall_search::{
    AnswerSynthesizer, HybridRetriever, RetrievalMode, Retriever, StageStatus, SynthesisOptions,
};
use std::sync::Arc;
use uuid::Uuid;

const UNDERCUT: &str = "The undercut means pitting a lap before a rival \
    to gain time on fresh tyres. \
    It works best when the out-lap is fast and the pit stop is clean. \
    The overcut is the opposite idea, staying out longer when tyres are still strong.";

const DRS: &str = "DRS opens a flap in the rear wing to cut drag on designated straights. \
    A driver may use it only when within one second of the car ahead at the detection point.";

const COST_CAP: &str = "The cost cap limits how much a team may spend in a season. \
    Breaches are reviewed by the FIA and can lead to fines or sporting penalties.";

struct Corpus {
    config: AppConfig,
    repository: Arc<dyn Repository>,
    embedder: Arc<MockEmbedder>,
    undercut_id: Uuid,
}

async fn corpus() -> Corpus {
    let mut config = AppConfig::default();
    config.retry.base_delay_ms = 0;

    let repository: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let embedder = Arc::new(MockEmbedder::new(128));
    let processor = IngestionProcessor::from_config(repository.clone(), embedder.clone(), &config);

    let undercut = processor
        .ingest(NewDocument::new("The undercut explained", UNDERCUT, DocumentType::Analysis))
        .await
        .unwrap();
    processor
        .ingest(NewDocument::new("How DRS works", DRS, DocumentType::Rules))
        .await
        .unwrap();
    processor
        .ingest(
            NewDocument::new("Cost cap basics", COST_CAP, DocumentType::Rules).with_source("FIA"),
        )
        .await
        .unwrap();

    Corpus {
        config,
        repository,
        embedder,
        undercut_id: undercut.document.id,
    }
}

fn retriever(corpus: &Corpus, generator: Arc<dyn TextGenerator>) -> HybridRetriever {
    HybridRetriever::from_config(
        corpus.repository.clone(),
        corpus.embedder.clone(),
        generator,
        &corpus.config,
    )
}

#[tokio::test]
async fn test_hybrid_retrieval_with_expansion() {
    let corpus = corpus().await;
    let generator = Arc::new(
        MockGenerator::new("unused")
            .with_text(r#"["undercut pit strategy", "pitting before a rival on fresh tyres"]"#),
    );
    let retriever = retriever(&corpus, generator);

    let report = retriever.retrieve_with_report("undercut pit stop", 2).await.unwrap();

    assert_eq!(report.mode, RetrievalMode::Hybrid);
    assert_eq!(report.expansion, StageStatus::Succeeded);
    assert_eq!(report.vector, StageStatus::Succeeded);
    assert_eq!(report.query_variants.len(), 3);
    assert_eq!(report.query_variants[0], "undercut pit stop");

    assert!(!report.chunks.is_empty() && report.chunks.len() <= 2);
    assert_eq!(report.chunks[0].document_id, corpus.undercut_id);
    assert!(report.chunks[0].bm25_score > 0.0);
    for pair in report.chunks.windows(2) {
        assert!(pair[0].combined_score >= pair[1].combined_score);
    }
    for chunk in &report.chunks {
        assert!((0.0..=1.0).contains(&chunk.combined_score));
        assert!((0.0..=1.0).contains(&chunk.vector_score));
    }
}

#[tokio::test]
async fn test_expansion_disabled() {
    let mut corpus = corpus().await;
    corpus.config.retrieval.expansion_enabled = false;
    let generator = Arc::new(MockGenerator::default());
    let retriever = retriever(&corpus, generator.clone());

    let report = retriever.retrieve_with_report("DRS detection point", 5).await.unwrap();

    assert!(matches!(report.expansion, StageStatus::Skipped { .. }));
    assert_eq!(report.query_variants, vec!["DRS detection point"]);
    assert!(generator.calls().is_empty());
    assert_eq!(report.chunks[0].metadata.document_title, "How DRS works");
}

#[tokio::test]
async fn test_answer_cites_retrieved_passages() {
    let corpus = corpus().await;
    let generator = Arc::new(MockGenerator::new(
        "Pit a lap before your rival and use the fresh tyres on the out-lap [1].",
    ));
    let retriever = Arc::new(retriever(&corpus, generator.clone()));
    let synthesizer = AnswerSynthesizer::new(
        retriever,
        generator.clone(),
        RetryPolicy::from_config(&corpus.config.retry),
        SynthesisOptions::from_config(&corpus.config),
    );

    let answer = synthesizer.answer("How does the undercut work?", &[]).await.unwrap();

    assert_eq!(answer.cited, vec![1]);
    assert_eq!(answer.mode, RetrievalMode::Hybrid);
    assert_eq!(answer.sources[0].document_id, corpus.undercut_id);
    assert_eq!(answer.sources[0].title, "The undercut explained");

    // Expansion call first, then the answer
    let calls = generator.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].system_prompt.contains("[1] The undercut explained"));
}
