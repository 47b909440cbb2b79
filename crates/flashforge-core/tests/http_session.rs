//! End-to-end sessions against a local HTTP server

use std::sync::Arc;
use std::thread;

use flashforge_core::{
    Flashcard, GenerationError, GenerationRequest, GenerationSession, GeneratorConfig,
    StaticToken, WireEncoding,
};
use tiny_http::{Header, Response, Server};
use url::Url;

/// What the server saw: authorization header and request body
struct Seen {
    authorization: String,
    body: String,
}

fn serve_once(
    status: u16,
    content_type: &'static str,
    body: &'static str,
) -> (Url, thread::JoinHandle<Seen>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let port = server.server_addr().to_ip().unwrap().port();
    let handle = thread::spawn(move || {
        let mut request = server.recv().unwrap();
        let mut received = String::new();
        request.as_reader().read_to_string(&mut received).unwrap();
        let authorization = request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Authorization"))
            .map(|h| h.value.as_str().to_string())
            .unwrap_or_default();
        let response = Response::from_data(body.as_bytes().to_vec())
            .with_status_code(status)
            .with_header(Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()).unwrap());
        request.respond(response).unwrap();
        Seen {
            authorization,
            body: received,
        }
    });
    let url = Url::parse(&format!("http://127.0.0.1:{}/generate", port)).unwrap();
    (url, handle)
}

fn session(endpoint: Url, prompt: &str) -> GenerationSession {
    let config = GeneratorConfig {
        endpoint: Some(endpoint),
        ..GeneratorConfig::default()
    };
    GenerationSession::new(
        config,
        GenerationRequest::new(prompt, 2).with_title(true),
        Arc::new(StaticToken::new("test-token")),
    )
}

#[tokio::test]
async fn test_event_stream_over_http() {
    let (url, server) = serve_once(
        200,
        "text/event-stream",
        "event: title\ndata: {\"title\": \"Capitals\"}\n\n\
         event: card\ndata: {\"question\": \"France?\", \"answer\": \"Paris\", \"index\": 0}\n\n\
         event: card\ndata: {\"question\": \"Japan?\", \"answer\": \"Tokyo\", \"index\": 1}\n\n",
    );
    let mut received = Vec::new();
    let mut sink = |card: &Flashcard, index: usize| -> anyhow::Result<()> {
        received.push((index, card.answer.clone()));
        Ok(())
    };
    let report = session(url, "capitals").stream(&mut sink).await.unwrap();

    assert_eq!(report.encoding, Some(WireEncoding::EventStream));
    assert_eq!(report.result.title.as_deref(), Some("Capitals"));
    assert_eq!(
        received,
        vec![(0, "Paris".to_string()), (1, "Tokyo".to_string())]
    );

    let seen = server.join().unwrap();
    assert_eq!(seen.authorization, "Bearer test-token");
    let body: serde_json::Value = serde_json::from_str(&seen.body).unwrap();
    assert_eq!(body["prompt"], "capitals");
    assert_eq!(body["stream"], true);
    assert_eq!(body["generateTitle"], true);
}

#[tokio::test]
async fn test_flat_text_over_http() {
    let (url, server) = serve_once(
        200,
        "text/plain; charset=utf-8",
        "TITLE: Chemistry\nCARD_START\nQ: H2O?\nA: Water\nCARD_END\n",
    );
    let mut sink = |_: &Flashcard, _: usize| -> anyhow::Result<()> { Ok(()) };
    let report = session(url, "chemistry").stream(&mut sink).await.unwrap();
    server.join().unwrap();

    assert_eq!(report.encoding, Some(WireEncoding::Flat));
    assert_eq!(report.result.title.as_deref(), Some("Chemistry"));
    assert_eq!(report.result.cards.len(), 1);
    assert_eq!(report.result.cards[0].answer, "Water");
}

#[tokio::test]
async fn test_error_status_is_upstream_error() {
    let (url, server) = serve_once(
        503,
        "application/json",
        "{\"error\": \"model overloaded\"}",
    );
    let mut sink = |_: &Flashcard, _: usize| -> anyhow::Result<()> { Ok(()) };
    let failure = session(url, "anything").stream(&mut sink).await.unwrap_err();
    server.join().unwrap();

    match failure.error {
        GenerationError::Upstream(message) => {
            assert!(message.contains("503"), "{}", message);
            assert!(message.contains("model overloaded"), "{}", message);
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_frame_keeps_earlier_cards() {
    let (url, server) = serve_once(
        200,
        "text/event-stream",
        "event: card\ndata: {\"question\": \"q\", \"answer\": \"a\", \"index\": 0}\n\n\
         event: error\ndata: {\"error\": \"generation aborted\"}\n\n\
         event: card\ndata: {\"question\": \"q2\", \"answer\": \"a2\", \"index\": 1}\n\n",
    );
    let mut count = 0;
    let mut sink = |_: &Flashcard, _: usize| -> anyhow::Result<()> {
        count += 1;
        Ok(())
    };
    let failure = session(url, "topic").stream(&mut sink).await.unwrap_err();
    server.join().unwrap();

    assert!(matches!(
        &failure.error,
        GenerationError::Upstream(message) if message == "generation aborted"
    ));
    assert_eq!(failure.partial.cards.len(), 1);
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_complete_response_without_sink() {
    let (url, server) = serve_once(
        200,
        "application/json",
        "{\"flashcards\": [{\"question\": \"Largest planet?\", \"answer\": \"Jupiter\"}], \"title\": \"Planets\"}",
    );
    let report = session(url, "planets").generate(None).await.unwrap();
    let seen = server.join().unwrap();

    assert_eq!(report.encoding, None);
    assert_eq!(report.result.title.as_deref(), Some("Planets"));
    assert_eq!(report.result.cards[0].answer, "Jupiter");
    let body: serde_json::Value = serde_json::from_str(&seen.body).unwrap();
    assert_eq!(body["stream"], false);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    // Bind then drop to get a port nobody listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = Url::parse(&format!("http://127.0.0.1:{}/generate", port)).unwrap();
    let mut sink = |_: &Flashcard, _: usize| -> anyhow::Result<()> { Ok(()) };
    let failure = session(url, "topic").stream(&mut sink).await.unwrap_err();
    assert!(matches!(failure.error, GenerationError::Network(_)));
}
