use std::sync::Arc;
use std::time::Duration;

use cadastro_core::{
    AppConfig, FormSchema, FormStore, SearchController, SearchMode, SearchPhase, log_submission,
};
use cadastro_lookup::{PessoasSource, QueryFilter};
use mockito::{Matcher, Server};

fn config_for(base_url: String, mode: SearchMode) -> AppConfig {
    let mut config = AppConfig::default();
    config.lookup.base_url = base_url;
    config.search.mode = mode;
    config.search.debounce_ms = Some(30);
    config.search.lookup_timeout_ms = 5_000;
    config
}

#[tokio::test]
async fn typing_then_selecting_fills_the_form() {
    let mut server = Server::new_async().await;
    let ana = server
        .mock("GET", "/pessoas")
        .match_query(Matcher::UrlEncoded("nome_like".into(), "Ana".into()))
        .with_status(200)
        .with_body(r#"[{"id": 1, "nome": "Ana"}, {"id": 2, "nome": "Anabela"}]"#)
        .expect(1)
        .create_async()
        .await;
    let partial = server
        .mock("GET", "/pessoas")
        .match_query(Matcher::UrlEncoded("nome_like".into(), "An".into()))
        .expect(0)
        .create_async()
        .await;

    let config = config_for(server.url(), SearchMode::Text);
    let source = PessoasSource::from_config(&config, QueryFilter::ServerSide).unwrap();
    let store = FormStore::new();
    let search = SearchController::builder(Arc::new(source), store.clone())
        .policy(config.search_policy())
        .lookup_timeout(config.search.lookup_timeout())
        .build()
        .unwrap();

    search.on_text_change("An");
    search.on_text_change("Ana");
    let snapshot = search.settled().await;

    assert_eq!(snapshot.phase, SearchPhase::Idle);
    assert_eq!(snapshot.candidates.len(), 2);
    ana.assert_async().await;
    partial.assert_async().await;

    search.on_select(Some(&snapshot.candidates[1]));
    store.set_telefone("11987654321");
    store.set_email("anabela@example.com");

    let submission = store.submit(&FormSchema::standard(), log_submission).unwrap();
    assert_eq!(submission.pessoa, Some(2));
}

#[tokio::test]
async fn service_error_degrades_to_no_candidates() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/pessoas")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;

    let config = config_for(server.url(), SearchMode::Open);
    let source = PessoasSource::from_config(&config, QueryFilter::ServerSide).unwrap();
    let search = SearchController::builder(Arc::new(source), FormStore::new())
        .policy(config.search_policy())
        .build()
        .unwrap();

    search.on_open();
    search.on_text_change("Ana");
    let snapshot = tokio::time::timeout(Duration::from_secs(5), search.settled())
        .await
        .unwrap();

    assert!(!snapshot.loading);
    assert!(snapshot.candidates.is_empty());
}

#[tokio::test]
async fn eager_mode_fetches_unfiltered_list_on_start() {
    let mut server = Server::new_async().await;
    let all = server
        .mock("GET", "/pessoas")
        .match_query(Matcher::Missing)
        .with_status(200)
        .with_body(r#"[{"id": 1, "nome": "Ana"}, {"id": 3, "nome": "Bruno"}]"#)
        .expect(1)
        .create_async()
        .await;

    let config = config_for(server.url(), SearchMode::Eager);
    let source = PessoasSource::from_config(&config, QueryFilter::Unfiltered).unwrap();
    let search = SearchController::builder(Arc::new(source), FormStore::new())
        .policy(config.search_policy())
        .build()
        .unwrap();

    let snapshot = search.settled().await;
    search.on_text_change("Bru");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(snapshot.candidates.len(), 2);
    all.assert_async().await;
}
