use ofertas_http::{HttpClient, HttpError, RequestOpts};
use reqwest::StatusCode;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> HttpClient {
    HttpClient::new("ofertas-test/0.1").unwrap()
}

#[tokio::test]
async fn sends_browser_headers_and_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/empleo"))
        .and(header("user-agent", "ofertas-test/0.1"))
        .and(header("accept-language", "es-ES,es;q=0.9,en;q=0.8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Técnico</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let body = client()
        .get_text(&format!("{}/empleo", server.uri()), RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(body, "<p>Técnico</p>");
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ofertas"))
        .respond_with(ResponseTemplate::new(503).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ofertas"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let body = client()
        .get_text(&format!("{}/ofertas", server.uri()), RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn rate_limit_exhausts_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .expect(2)
        .mount(&server)
        .await;

    let opts = RequestOpts {
        retries: Some(1),
        ..Default::default()
    };
    let err = client()
        .get_text(&format!("{}/busy", server.uri()), opts)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no existe"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client()
        .get_text(&format!("{}/gone", server.uri()), RequestOpts::default())
        .await
        .unwrap_err();
    match err {
        HttpError::Status {
            status,
            body_snippet,
            ..
        } => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body_snippet, "no existe");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn relative_urls_are_rejected() {
    let err = client()
        .get_text("/convocatorias", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Url(_)));
}
