use std::sync::Arc;
use std::time::Duration;

use binfp::{Pipeline, PipelineConfig};
use retrieval::{
    ABSTRACT_NOT_FOUND, MetadataConfig, RetrievalConfig, RetrievalError, Retriever,
    TITLE_NOT_FOUND, UpstreamError,
};
use rusqlite::Connection;
use serde_json::json;
use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn pubmed_db() -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    let conn = Connection::open(file.path()).unwrap();
    conn.execute_batch(
        "CREATE TABLE articles (
             id INTEGER PRIMARY KEY,
             title TEXT,
             authors TEXT,
             abstract TEXT,
             publication_year INTEGER
         );
         INSERT INTO articles VALUES
             (123, 'The biology of TEAD transcription factors', 'Smith A; Lee B',
              'TEAD proteins are the DNA-binding partners of YAP and TAZ.', 2019);",
    )
    .unwrap();
    file
}

fn config(server: &MockServer, db: &NamedTempFile) -> RetrievalConfig {
    RetrievalConfig {
        search_url: server.uri(),
        metadata: MetadataConfig::Sqlite {
            path: db.path().to_path_buf(),
            table: "articles".into(),
        },
        ..Default::default()
    }
}

#[tokio::test]
async fn text_query_is_embedded_searched_and_hydrated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/find_matches"))
        .respond_with(|req: &Request| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
            // 512-dim embedding packed to 64 bytes.
            assert_eq!(body["query"].as_array().unwrap().len(), 64);
            assert_eq!(body["k"], 20);
            ResponseTemplate::new(200).set_body_json(json!([
                {"id": 123, "distance": 0.1},
                {"id": 456, "distance": 0.3}
            ]))
        })
        .expect(1)
        .mount(&server)
        .await;

    let db = pubmed_db();
    let pipeline = Arc::new(Pipeline::from_config(&PipelineConfig::default()).unwrap());
    let retriever = Retriever::from_config(config(&server, &db), Some(pipeline)).unwrap();

    let records = retriever
        .retrieve_default("What are the biologies of TEAD?".into())
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, 123);
    assert_eq!(records[0].title, "The biology of TEAD transcription factors");
    assert_eq!(records[0].publication_year, Some(2019));
    assert_eq!(records[1].id, 456);
    assert_eq!(records[1].distance, 0.3);
    assert_eq!(records[1].title, TITLE_NOT_FOUND);
    assert_eq!(records[1].abstract_text, ABSTRACT_NOT_FOUND);
    assert_eq!(records[1].publication_year, None);
}

#[tokio::test]
async fn remote_embedding_endpoint_is_used_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"binary_embedding": [vec![7u8; 64]]})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/find_matches"))
        .respond_with(|req: &Request| {
            let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
            assert_eq!(body["query"], json!(vec![7u8; 64]));
            ResponseTemplate::new(200).set_body_json(json!([{"pmid": 123, "distance": 2}]))
        })
        .expect(1)
        .mount(&server)
        .await;

    let db = pubmed_db();
    let cfg = RetrievalConfig {
        embed_url: Some(format!("{}/embed", server.uri())),
        ..config(&server, &db)
    };
    let retriever = Retriever::from_config(cfg, None).unwrap();

    let records = retriever
        .retrieve("TEAD".into(), 5, Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].authors, "Smith A; Lee B");
}

#[tokio::test]
async fn remote_embedding_of_wrong_width_never_reaches_search() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"binary_embedding": [1, 2, 3]})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/find_matches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let db = pubmed_db();
    let cfg = RetrievalConfig {
        embed_url: Some(format!("{}/embed", server.uri())),
        ..config(&server, &db)
    };
    let retriever = Retriever::from_config(cfg, None).unwrap();

    let err = retriever.retrieve_default("TEAD".into()).await.unwrap_err();
    assert!(matches!(
        err,
        RetrievalError::Embedding(UpstreamError::Malformed(_))
    ));
}

#[test]
fn pipeline_width_must_match_expected_fingerprint_len() {
    let pipeline = Arc::new(Pipeline::from_config(&PipelineConfig::default()).unwrap());
    let cfg = RetrievalConfig {
        expected_fingerprint_len: 32,
        ..Default::default()
    };
    let err = Retriever::from_config(cfg, Some(pipeline)).unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidConfig(_)));
}

#[tokio::test]
async fn search_outage_surfaces_status_and_stage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/find_matches"))
        .respond_with(ResponseTemplate::new(500).set_body_string("julia process crashed"))
        .mount(&server)
        .await;

    let db = pubmed_db();
    let pipeline = Arc::new(Pipeline::from_config(&PipelineConfig::default()).unwrap());
    let retriever = Retriever::from_config(config(&server, &db), Some(pipeline)).unwrap();

    let err = retriever.retrieve_default("TEAD".into()).await.unwrap_err();
    assert_eq!(
        err,
        RetrievalError::SearchService(UpstreamError::Status {
            status: 500,
            message: "julia process crashed".into()
        })
    );
    assert_eq!(err.stage(), "search");
}

#[test]
fn missing_database_fails_at_startup() {
    let cfg = RetrievalConfig {
        metadata: MetadataConfig::Sqlite {
            path: "/definitely/not/here.db".into(),
            table: "articles".into(),
        },
        ..Default::default()
    };
    let err = Retriever::from_config(cfg, None).unwrap_err();
    assert_eq!(err.stage(), "metadata");
}
