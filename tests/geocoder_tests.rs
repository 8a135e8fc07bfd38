/// Nominatim client tests against a mocked provider
use crime_report_api::circuit_breaker::create_geocoder_circuit_breaker;
use crime_report_api::config::GeocoderSettings;
use crime_report_api::errors::AppError;
use crime_report_api::geocoder::{Geocoder, NominatimGeocoder};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> GeocoderSettings {
    GeocoderSettings {
        base_url: format!("{}/search", server.uri()),
        country_codes: "ph".to_string(),
        user_agent: "crime-report-api-tests".to_string(),
    }
}

fn geocoder(server: &MockServer) -> impl Geocoder {
    NominatimGeocoder::with_breaker(&settings(server), create_geocoder_circuit_breaker()).unwrap()
}

#[tokio::test]
async fn resolves_first_match() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "456 Oak Ave, Marikina, Philippines"))
        .and(query_param("countrycodes", "ph"))
        .and(query_param("format", "jsonv2"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "lat": "14.6331", "lon": "121.0993", "display_name": "Oak Ave, Marikina" }
        ])))
        .mount(&mock_server)
        .await;

    let coords = geocoder(&mock_server)
        .geocode("456 Oak Ave,   Marikina, Philippines")
        .await
        .unwrap();

    assert!((coords.latitude - 14.6331).abs() < 1e-9);
    assert!((coords.longitude - 121.0993).abs() < 1e-9);
}

#[tokio::test]
async fn repeated_lookups_are_served_from_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{ "lat": 14.5, "lon": 121.0 }])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let geocoder = geocoder(&mock_server);
    let first = geocoder.geocode("123 Main St, Marikina").await.unwrap();
    let second = geocoder.geocode("  123 MAIN ST,  marikina ").await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn no_match_is_a_geocode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;

    match geocoder(&mock_server).geocode("Nowhere Lane").await {
        Err(AppError::Geocode(msg)) => {
            assert_eq!(msg, "No coordinates found for address 'Nowhere Lane'")
        }
        other => panic!("expected geocode error, got {:?}", other),
    }
}

#[tokio::test]
async fn provider_errors_are_geocode_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Busy Street"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "Broken Street"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&mock_server)
        .await;

    let geocoder = geocoder(&mock_server);

    match geocoder.geocode("Busy Street").await {
        Err(AppError::Geocode(msg)) => assert!(msg.contains("rate limit"), "{}", msg),
        other => panic!("expected geocode error, got {:?}", other),
    }
    match geocoder.geocode("Broken Street").await {
        Err(AppError::Geocode(msg)) => assert!(msg.contains("500"), "{}", msg),
        other => panic!("expected geocode error, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_address_is_rejected_without_a_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    assert!(matches!(
        geocoder(&mock_server).geocode("   ").await,
        Err(AppError::Geocode(_))
    ));
}

#[tokio::test]
async fn breaker_opens_after_repeated_failures() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&mock_server)
        .await;

    let geocoder = geocoder(&mock_server);
    for i in 0..5 {
        let result = geocoder.geocode(&format!("{} Failing Road", i)).await;
        assert!(matches!(result, Err(AppError::Geocode(_))));
    }

    match geocoder.geocode("6 Failing Road").await {
        Err(AppError::Geocode(msg)) => {
            assert_eq!(msg, "Geocoding service temporarily unavailable")
        }
        other => panic!("expected open breaker, got {:?}", other),
    }
}
