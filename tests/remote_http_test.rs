use mockito::{Matcher, Server};

use caption_api::client::{CaptionTransport, HttpTransport, TransportError};
use caption_api::remote::{CaptionModel, HuggingFaceModel, RemoteError};

const MODEL_PATH: &str = "/models/Salesforce/blip-image-captioning-large";
const MODEL_ID: &str = "Salesforce/blip-image-captioning-large";

#[tokio::test]
async fn test_model_sends_bytes_with_auth() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", MODEL_PATH)
        .match_header("authorization", "Bearer hf_test_key")
        .match_header("content-type", "image/webp")
        .match_body(Matcher::Exact("\u{1}\u{2}\u{3}".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"generated_text":"a cat sitting on a chair"}]"#)
        .create_async()
        .await;

    let model = HuggingFaceModel::new(&server.url(), MODEL_ID, Some("hf_test_key")).unwrap();
    let caption = model.caption(vec![1, 2, 3], "image/webp").await.unwrap();

    assert_eq!(caption, "a cat sitting on a chair");
    assert_eq!(model.model_id(), MODEL_ID);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_model_without_key_sends_no_auth() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", MODEL_PATH)
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(r#"{"generated_text":"a red bicycle"}"#)
        .create_async()
        .await;

    let model = HuggingFaceModel::new(&server.url(), MODEL_ID, None).unwrap();
    assert_eq!(model.caption(vec![9], "image/webp").await.unwrap(), "a red bicycle");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_model_error_message_is_kept() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", MODEL_PATH)
        .with_status(503)
        .with_body(r#"{"error":"Model is currently loading","estimated_time":20.0}"#)
        .create_async()
        .await;

    let model = HuggingFaceModel::new(&server.url(), MODEL_ID, None).unwrap();
    let err = model.caption(vec![1], "image/webp").await.unwrap_err();

    match err {
        RemoteError::Status { status, ref message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "Model is currently loading");
        },
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_model_non_json_error_gets_generic_message() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", MODEL_PATH)
        .with_status(500)
        .with_body("<html>Internal Server Error</html>")
        .create_async()
        .await;

    let model = HuggingFaceModel::new(&server.url(), MODEL_ID, None).unwrap();
    let err = model.caption(vec![1], "image/webp").await.unwrap_err();
    assert_eq!(err.to_string(), "Caption model returned HTTP 500");
}

#[tokio::test]
async fn test_model_unexpected_body_is_decode_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", MODEL_PATH)
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let model = HuggingFaceModel::new(&server.url(), MODEL_ID, None).unwrap();
    let err = model.caption(vec![1], "image/webp").await.unwrap_err();
    assert!(matches!(err, RemoteError::Decode(_)));
}

#[tokio::test]
async fn test_transport_posts_image_field() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate-caption")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(serde_json::json!({ "image": "data:image/png;base64,AAEC" })))
        .with_status(200)
        .with_body(r#"{"caption":"three tiny pixels"}"#)
        .create_async()
        .await;

    let transport = HttpTransport::new(&server.url()).unwrap();
    let caption = transport.generate_caption("data:image/png;base64,AAEC").await.unwrap();

    assert_eq!(caption, "three tiny pixels");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_transport_surfaces_server_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/generate-caption")
        .with_status(400)
        .with_body(r#"{"error":"The uploaded file appears to be empty"}"#)
        .create_async()
        .await;

    let transport = HttpTransport::new(&server.url()).unwrap();
    let err = transport.generate_caption("data:image/png;base64,").await.unwrap_err();

    match err {
        TransportError::Rejected { status, ref message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "The uploaded file appears to be empty");
        },
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transport_generic_message_without_error_body() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/generate-caption")
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;

    let transport = HttpTransport::new(&server.url()).unwrap();
    let err = transport.generate_caption("data:image/png;base64,AA==").await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to generate caption (HTTP 502)");
}

#[tokio::test]
async fn test_transport_only_accepts_200() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/generate-caption")
        .with_status(201)
        .with_body(r#"{"caption":"created, not captioned"}"#)
        .create_async()
        .await;

    let transport = HttpTransport::new(&server.url()).unwrap();
    let err = transport.generate_caption("data:image/png;base64,AA==").await.unwrap_err();

    match err {
        TransportError::Rejected { status, ref message } => {
            assert_eq!(status, 201);
            assert_eq!(message, "Failed to generate caption (HTTP 201)");
        },
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_transport_garbage_success_body() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/generate-caption")
        .with_status(200)
        .with_body("{\"unexpected\":true}")
        .create_async()
        .await;

    let transport = HttpTransport::new(&server.url()).unwrap();
    let err = transport.generate_caption("data:image/png;base64,AA==").await.unwrap_err();
    assert!(matches!(err, TransportError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_transport_unreachable_server() {
    let transport = HttpTransport::new("http://127.0.0.1:1").unwrap();
    let err = transport.generate_caption("data:image/png;base64,AA==").await.unwrap_err();
    assert!(matches!(err, TransportError::Network(_)));
}
