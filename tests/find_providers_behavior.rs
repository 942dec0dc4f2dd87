//! Behaviour tests for provider lookups.
//!
//! These tests verify how the client reacts to each kind of lookup response:
//! missing content, batch and streamed bodies, protocol errors and
//! cancellation. Every test also checks the single measurement the call emits.

mod support;

use std::sync::Arc;

use delroute_core::{
    read_all, CancellationToken, Client, ClientError, ClientErrorKind, HttpError, Iter, IterError,
    ProviderIter, ProviderRecord, RecordingMeasurementSink,
};
use support::{cid, response, PendingHttpClient, ScriptedHttpClient};

const KEY: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

fn client_with(http: Arc<ScriptedHttpClient>, sink: Arc<RecordingMeasurementSink>) -> Client {
    Client::builder("http://127.0.0.1:8080")
        .with_http_client(http)
        .with_measurement_sink(sink)
        .build()
        .expect("client")
}

// =============================================================================
// Lookup: Successful Responses
// =============================================================================

#[tokio::test]
async fn when_router_knows_no_providers_lookup_is_empty_not_an_error() {
    // Given: A router answering 404
    let (not_found, tracker) = response(404, "text/plain", &["not found"]);
    let http = Arc::new(ScriptedHttpClient::new().with_response(not_found));
    let sink = Arc::new(RecordingMeasurementSink::new());
    let client = client_with(http, sink.clone());

    // When: Providers are requested
    let mut iter = client
        .find_providers(&cid(KEY), CancellationToken::new())
        .await
        .expect("404 is not an error");

    // Then: The iterator is empty and the body was released
    assert_eq!(iter.known_len(), Some(0));
    assert!(iter.next().await.is_none());
    assert_eq!(tracker.closes(), 1);

    let measurements = sink.measurements();
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0].operation, "FindProviders");
    assert_eq!(measurements[0].host, "127.0.0.1:8080");
    assert_eq!(measurements[0].status_code, Some(404));
    assert_eq!(measurements[0].error_tag(), "None");
    assert_eq!(measurements[0].length, None, "no record count without a body");
}

#[tokio::test]
async fn when_router_answers_with_batch_json_records_are_decoded_and_body_closed() {
    // Given: A batch body with one bitswap record and one unknown record
    let (batch, tracker) = response(
        200,
        "application/json; charset=utf-8",
        &[
            "{\"Providers\":[{\"Schema\":\"bitswap/transport\",\"Protocol\":\"transport-bitswap\",",
            "\"Addrs\":[\"/ip4/127.0.0.1/tcp/4001\"]},{\"Schema\":\"unknown\",\"Extra\":1}]}",
        ],
    );
    let http = Arc::new(ScriptedHttpClient::new().with_response(batch));
    let sink = Arc::new(RecordingMeasurementSink::new());
    let client = client_with(http, sink.clone());

    // When: Providers are requested
    let mut iter = client
        .find_providers(&cid(KEY), CancellationToken::new())
        .await
        .expect("lookup");

    // Then: The whole body was consumed and closed before returning
    assert!(matches!(iter, ProviderIter::Batch(_)));
    assert_eq!(iter.known_len(), Some(2));
    assert_eq!(tracker.closes(), 1);

    let records = read_all(&mut iter).await.expect("batch never fails");
    match &records[0] {
        ProviderRecord::Bitswap(record) => {
            assert_eq!(record.addrs.len(), 1);
            assert_eq!(record.addrs[0].to_string(), "/ip4/127.0.0.1/tcp/4001");
        }
        other => panic!("expected bitswap record, got {other:?}"),
    }
    assert_eq!(records[1].schema(), "unknown");
    assert_eq!(sink.measurements()[0].length, Some(2));
}

#[tokio::test]
async fn when_router_streams_ndjson_records_are_decoded_lazily() {
    // Given: A streamed body
    let (stream, tracker) = response(
        200,
        "application/x-ndjson",
        &[
            "{\"Schema\":\"bitswap/transport\",\"Protocol\":\"transport-bitswap\"}\n",
            "{\"Schema\":\"bitswap/transport\",\"Protocol\":\"transport-bitswap\"}\n",
        ],
    );
    let http = Arc::new(ScriptedHttpClient::new().with_response(stream));
    let sink = Arc::new(RecordingMeasurementSink::new());
    let client = client_with(http, sink.clone());

    // When: Providers are requested
    let mut iter = client
        .find_providers(&cid(KEY), CancellationToken::new())
        .await
        .expect("lookup");

    // Then: Nothing has been read yet and the count is unknown
    assert_eq!(iter.known_len(), None);
    assert_eq!(tracker.reads(), 0);
    assert_eq!(tracker.closes(), 0);
    assert_eq!(sink.measurements()[0].length, None);

    // And: Draining yields both records and closes the stream once
    let records = read_all(&mut iter).await.expect("stream");
    assert_eq!(records.len(), 2);
    assert_eq!(tracker.closes(), 1);
}

#[tokio::test]
async fn when_lookup_is_batch_only_accept_header_requests_json() {
    let (batch, _) = response(200, "application/json", &["{\"Providers\":null}"]);
    let http = Arc::new(ScriptedHttpClient::new().with_response(batch));
    let client = Client::builder("http://127.0.0.1:8080/")
        .with_http_client(http.clone())
        .with_batch_results_only()
        .build()
        .expect("client");

    let iter = client
        .find_providers(&cid(KEY), CancellationToken::new())
        .await
        .expect("lookup");

    assert_eq!(iter.known_len(), Some(0));
    let requests = http.requests();
    assert_eq!(
        requests[0].url,
        format!("http://127.0.0.1:8080/routing/v1/providers/{KEY}")
    );
    assert_eq!(
        requests[0].headers.get("accept").map(String::as_str),
        Some("application/json")
    );
}

// =============================================================================
// Lookup: Protocol Errors
// =============================================================================

#[tokio::test]
async fn when_router_fails_error_carries_status_and_body() {
    let (failure, tracker) = response(500, "text/plain", &["database is on fire"]);
    let http = Arc::new(ScriptedHttpClient::new().with_response(failure));
    let sink = Arc::new(RecordingMeasurementSink::new());
    let client = client_with(http, sink.clone());

    let error = client
        .find_providers(&cid(KEY), CancellationToken::new())
        .await
        .expect_err("500 is an error");

    assert_eq!(error.kind(), ClientErrorKind::Protocol);
    assert_eq!(error.status(), Some(500));
    assert_eq!(
        error.to_string(),
        "HTTP error with StatusCode=500: database is on fire"
    );
    assert_eq!(tracker.closes(), 1);

    let measurement = &sink.measurements()[0];
    assert_eq!(measurement.status_code, Some(500));
    assert_eq!(measurement.error_tag(), "Other");
    assert_eq!(measurement.length, None);
}

#[tokio::test]
async fn when_content_type_is_unknown_lookup_fails_and_body_is_closed() {
    let (html, tracker) = response(200, "text/html", &["<html></html>"]);
    let http = Arc::new(ScriptedHttpClient::new().with_response(html));
    let client = client_with(http, Arc::new(RecordingMeasurementSink::new()));

    let error = client
        .find_providers(&cid(KEY), CancellationToken::new())
        .await
        .expect_err("unknown media type");

    assert!(matches!(error, ClientError::UnknownContentType(ref media) if media == "text/html"));
    assert_eq!(tracker.reads(), 0);
    assert_eq!(tracker.closes(), 1);
}

#[tokio::test]
async fn when_content_type_is_missing_lookup_fails() {
    let (body, tracker) = support::tracked_body(&["{}"]);
    let http = Arc::new(
        ScriptedHttpClient::new().with_response(delroute_core::HttpResponse::new(200, body)),
    );
    let client = client_with(http, Arc::new(RecordingMeasurementSink::new()));

    let error = client
        .find_providers(&cid(KEY), CancellationToken::new())
        .await
        .expect_err("no content type");

    assert!(matches!(error, ClientError::ContentType(_)));
    assert_eq!(error.to_string(), "parsing Content-Type: mime: no media type");
    assert_eq!(tracker.closes(), 1);
}

#[tokio::test]
async fn when_batch_json_is_malformed_lookup_reports_decode_error() {
    let (batch, tracker) = response(200, "application/json", &["{\"Providers\":[{"]);
    let http = Arc::new(ScriptedHttpClient::new().with_response(batch));
    let client = client_with(http, Arc::new(RecordingMeasurementSink::new()));

    let error = client
        .find_providers(&cid(KEY), CancellationToken::new())
        .await
        .expect_err("truncated json");

    assert_eq!(error.kind(), ClientErrorKind::Decode);
    assert_eq!(tracker.closes(), 1);
}

#[tokio::test]
async fn when_transport_fails_error_is_surfaced_verbatim() {
    let http = Arc::new(ScriptedHttpClient::new().with_error(HttpError::new("connection reset")));
    let client = client_with(http.clone(), Arc::new(RecordingMeasurementSink::new()));

    let error = client
        .find_providers(&cid(KEY), CancellationToken::new())
        .await
        .expect_err("transport failure");

    assert_eq!(error.kind(), ClientErrorKind::Transport);
    assert_eq!(error.to_string(), "making HTTP request: connection reset");
    assert_eq!(http.call_count(), 1, "failures are not retried");
}

// =============================================================================
// Lookup: Cancellation
// =============================================================================

#[tokio::test]
async fn when_cancelled_before_headers_arrive_lookup_returns_cancelled() {
    // Given: A transport that never answers and an already-cancelled signal
    let sink = Arc::new(RecordingMeasurementSink::new());
    let client = Client::builder("http://127.0.0.1:8080")
        .with_http_client(Arc::new(PendingHttpClient))
        .with_measurement_sink(sink.clone())
        .build()
        .expect("client");
    let cancel = CancellationToken::new();
    cancel.cancel();

    // When: Providers are requested
    let error = client
        .find_providers(&cid(KEY), cancel)
        .await
        .expect_err("cancelled");

    // Then: The call gives up and the measurement is tagged as cancelled
    assert!(matches!(error, ClientError::Cancelled));
    assert_eq!(sink.measurements()[0].error_tag(), "Canceled");
    assert_eq!(sink.measurements()[0].status_code, None);
}

#[tokio::test]
async fn when_cancelled_while_streaming_next_pull_fails_and_stream_is_released() {
    let (stream, tracker) = response(
        200,
        "application/x-ndjson",
        &[
            "{\"Schema\":\"bitswap/transport\"}\n",
            "{\"Schema\":\"bitswap/transport\"}\n",
        ],
    );
    let http = Arc::new(ScriptedHttpClient::new().with_response(stream));
    let client = client_with(http, Arc::new(RecordingMeasurementSink::new()));
    let cancel = CancellationToken::new();

    let mut iter = client
        .find_providers(&cid(KEY), cancel.clone())
        .await
        .expect("lookup");
    assert!(iter.next().await.expect("first").is_ok());

    cancel.cancel();

    let error = iter.next().await.expect("terminal").expect_err("cancelled");
    assert!(matches!(error, IterError::Cancelled));
    assert_eq!(tracker.closes(), 1);
    assert!(iter.next().await.is_none());
}
