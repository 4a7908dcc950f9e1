use chrono::NaiveDate;
use ofertas_config::OfertasConfigLoader;
use ofertas_core::offer::normalize_batch_on;
use ofertas_http::HttpClient;
use ofertas_sites::build_source;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http() -> HttpClient {
    HttpClient::new("ofertas-test").unwrap().with_retries(0)
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

#[tokio::test]
async fn detail_links_follow_listing_and_skip_broken_pages() {
    let server = MockServer::start().await;
    let listing = r#"<html><body>
<a href="/convocatorias/ref-12_2025/">REF 12/2025 Técnico de laboratorio</a>
<a href="/convocatorias/ref-13_2025/">REF 13/2025 Data manager</a>
<a href="/convocatorias/ref-14_2025/">REF 14/2025 Enfermera</a>
</body></html>"#;
    Mock::given(method("GET"))
        .and(path("/convocatorias-de-empleo/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/convocatorias/ref-12_2025/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<h1>REF 12/2025 Técnico de laboratorio</h1>\
             <p>Publicada el 01/03/2025. Plazo hasta el 25 de marzo de 2025.</p>",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/convocatorias/ref-13_2025/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/convocatorias/ref-14_2025/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<h1>REF 14/2025 Enfermera</h1><p>Convocatoria finalizada el 01/02/2025</p>",
        ))
        .mount(&server)
        .await;

    let yaml = format!(
        r#"
institutes:
  - id: IBSAL
    url: {}/convocatorias-de-empleo/
    province: Salamanca
    policy:
      dates: start_and_deadline
      lone_date: both
    kind: detail_links
    layout:
      link_contains: /convocatorias/ref-
"#,
        server.uri()
    );
    let cfg = OfertasConfigLoader::new().with_yaml_str(&yaml).load().unwrap();
    let spec = &cfg.institutes[0];

    let source = build_source(spec, http()).unwrap();
    let raws = source.collect().await.unwrap();
    assert_eq!(raws.len(), 2);

    let outcome = normalize_batch_on(raws, &spec.policy(), today());
    assert_eq!(outcome.offers.len(), 1);
    let offer = &outcome.offers[0];
    assert_eq!(offer.title, "REF 12/2025 Técnico de laboratorio");
    assert_eq!(offer.start_date.as_deref(), Some("01/03/2025"));
    assert_eq!(offer.deadline.as_deref(), Some("25/03/2025"));
    assert_eq!(offer.province.as_deref(), Some("Salamanca"));
    assert_eq!(
        offer.link.as_deref(),
        Some(format!("{}/convocatorias/ref-12_2025/", server.uri()).as_str())
    );
}

#[tokio::test]
async fn failing_listing_is_a_source_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let yaml = format!(
        r#"
institutes:
  - id: Biobizkaia
    url: {}/OFBIO
    kind: table
    layout:
      title: 0
"#,
        server.uri()
    );
    let cfg = OfertasConfigLoader::new().with_yaml_str(&yaml).load().unwrap();
    let source = build_source(&cfg.institutes[0], http()).unwrap();

    let err = source.collect().await.unwrap_err();
    assert!(err.to_string().starts_with("Source error (Biobizkaia):"));
}

#[test]
fn bad_layout_fails_before_fetching() {
    let cfg = OfertasConfigLoader::new()
        .with_yaml_str(
            r#"
institutes:
  - id: IISGM
    url: https://www.iisgm.com/ofertas-de-empleo/
    kind: status_list
    layout:
      status_selector: "p[["
"#,
        )
        .load()
        .unwrap();
    assert!(build_source(&cfg.institutes[0], http()).is_err());
}

fn la_fe_page(n: usize, links: &str) -> String {
    format!(
        r#"<html><body>
<div class="empleo-item">
  <a href="/es/talento/empleo/oferta-{n}/">Contratación de personal técnico, lote {n}</a>
  <span class="status status--open">Abierta</span>
  <p>Fecha límite: 30/04/2025</p>
</div>
<ul class="pagination">{links}</ul>
</body></html>"#
    )
}

#[tokio::test]
async fn status_list_reads_numbered_pages_up_to_the_limit() {
    let server = MockServer::start().await;
    let pager = r#"<li><a href="?page=2">2</a></li><li><a href="?page=3">3</a></li><li><a href="?page=4">4</a></li>"#;
    Mock::given(method("GET"))
        .and(path("/es/talento/empleo/"))
        .and(query_param_is_missing("page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(la_fe_page(1, pager)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/es/talento/empleo/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(la_fe_page(2, pager)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/es/talento/empleo/"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("page", "4"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let yaml = format!(
        r#"
institutes:
  - id: IIS_La_Fe
    url: {}/es/talento/empleo/
    kind: status_list
    layout:
      container: div.empleo-item
      status_selector: span.status--open
      link_contains: /es/talento/empleo/
      link_text_keywords: [contratación, técnico]
      pagination:
        max_pages: 3
"#,
        server.uri()
    );
    let cfg = OfertasConfigLoader::new().with_yaml_str(&yaml).load().unwrap();
    let source = build_source(&cfg.institutes[0], http()).unwrap();

    let raws = source.collect().await.unwrap();
    let titles: Vec<&str> = raws.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        [
            "Contratación de personal técnico, lote 1",
            "Contratación de personal técnico, lote 2"
        ]
    );
}

#[test]
fn every_shipped_institute_builds() {
    let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("ofertas.yaml");
    let cfg = OfertasConfigLoader::new().with_file(path).load().unwrap();
    for spec in &cfg.institutes {
        let source = build_source(spec, http()).unwrap();
        assert_eq!(source.institute(), spec.id);
    }
}
