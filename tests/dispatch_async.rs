//! Futures dispatch against a local mock server: async shape decoding,
//! query assembly, SSE streaming, and status handling.

use futures::StreamExt;
use mockito::Server;
use restwire::descriptor::{MethodBuilder, ServiceBuilder, ServiceDescriptor};
use restwire::request::Arg;
use restwire::{Dispatcher, Error};
use serde_json::json;

fn chat_service() -> restwire::Result<ServiceDescriptor> {
    ServiceBuilder::new("Chat")
        .base_path("/api")
        .method(
            MethodBuilder::new("session")
                .get("/sessions/{id}")
                .path_param(0, "id")
                .returns("async<Session>"),
        )
        .method(
            MethodBuilder::new("history")
                .get("/sessions/{id}/messages")
                .path_param(0, "id")
                .query_param(1, "limit")
                .returns("async<list<Message>>"),
        )
        .method(
            MethodBuilder::new("page")
                .get("/sessions")
                .returns("async<page<Session>>"),
        )
        .method(
            MethodBuilder::new("export")
                .get("/sessions/{id}/export")
                .path_param(0, "id")
                .returns("async<bytes>"),
        )
        .method(
            MethodBuilder::new("stream")
                .post("/completions")
                .body(0)
                .returns("async<stream<Delta>>"),
        )
        .method(
            MethodBuilder::new("stream_named")
                .post("/completions")
                .body(0)
                .returns("async<stream<Delta>>")
                .events(["delta"], "Delta")
                .events(["usage"], "Usage"),
        )
        .build()
}

#[tokio::test]
async fn async_object_shape_decodes_json() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/sessions/s1")
        .with_status(200)
        .with_body(r#"{"id":"s1","open":true}"#)
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder(server.url()).build().unwrap();
    let chat = dispatcher.service("Chat", chat_service).unwrap();
    let session = chat.method("session").unwrap();

    let reply = dispatcher
        .invoke(&chat, session, &[Arg::Value(json!("s1"))])
        .await
        .unwrap();
    assert_eq!(
        reply.into_object().unwrap(),
        json!({"id": "s1", "open": true})
    );
}

#[tokio::test]
async fn async_list_shape_decodes_each_element() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/sessions/s1/messages?limit=2")
        .with_status(200)
        .with_body(r#"[{"text":"hi"},{"text":"there"}]"#)
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder(server.url()).build().unwrap();
    let chat = dispatcher.service("Chat", chat_service).unwrap();
    let history = chat.method("history").unwrap();

    let reply = dispatcher
        .invoke(
            &chat,
            history,
            &[Arg::Value(json!("s1")), Arg::Value(json!(2))],
        )
        .await
        .unwrap();
    let items = reply.into_list().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1], json!({"text": "there"}));
    mock.assert_async().await;
}

#[tokio::test]
async fn null_query_argument_is_omitted_from_the_url() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/sessions/s1/messages")
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder(server.url()).build().unwrap();
    let chat = dispatcher.service("Chat", chat_service).unwrap();
    let history = chat.method("history").unwrap();

    let reply = dispatcher
        .invoke(&chat, history, &[Arg::Value(json!("s1")), Arg::null()])
        .await
        .unwrap();
    assert!(reply.into_list().unwrap().is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn parametric_shape_uses_the_container_decoder() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/sessions")
        .with_status(200)
        .with_body(r#"{"items":[{"id":"s1"}],"next":null}"#)
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder(server.url()).build().unwrap();
    let chat = dispatcher.service("Chat", chat_service).unwrap();
    let page = chat.method("page").unwrap();

    let reply = dispatcher.invoke(&chat, page, &[]).await.unwrap();
    assert_eq!(
        reply.into_object().unwrap(),
        json!({"items": [{"id": "s1"}], "next": null})
    );
}

#[tokio::test]
async fn binary_shape_passes_raw_bytes_through() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/sessions/s1/export")
        .with_status(200)
        .with_body([0u8, 159, 146, 150].as_slice())
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder(server.url()).build().unwrap();
    let chat = dispatcher.service("Chat", chat_service).unwrap();
    let export = chat.method("export").unwrap();

    let reply = dispatcher
        .invoke(&chat, export, &[Arg::Value(json!("s1"))])
        .await
        .unwrap();
    assert_eq!(reply.into_binary().unwrap().as_ref(), &[0u8, 159, 146, 150]);
}

#[tokio::test]
async fn plain_stream_decodes_each_frame_lazily() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body("data: {\"token\":\"he\"}\n\ndata: {\"token\":\"llo\"}\n\n[DONE]\n")
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder(server.url()).build().unwrap();
    let chat = dispatcher.service("Chat", chat_service).unwrap();
    let stream_method = chat.method("stream").unwrap();

    let reply = dispatcher
        .invoke(&chat, stream_method, &[Arg::Value(json!({"prompt": "hi"}))])
        .await
        .unwrap();
    let tokens: Vec<_> = reply
        .into_stream()
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;
    assert_eq!(tokens, vec![json!({"token": "he"}), json!({"token": "llo"})]);
}

#[tokio::test]
async fn named_event_stream_maps_and_filters_by_event_name() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(concat!(
            "event: delta\n",
            "data: {\"token\":\"hi\"}\n",
            "\n",
            "event: ping\n",
            "data: {}\n",
            "\n",
            "event: usage\n",
            "data: {\"tokens\":2}\n",
            "\n",
            "[DONE]\n",
        ))
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder(server.url()).build().unwrap();
    let chat = dispatcher.service("Chat", chat_service).unwrap();
    let stream_named = chat.method("stream_named").unwrap();

    let reply = dispatcher
        .invoke(&chat, stream_named, &[Arg::Value(json!({"prompt": "hi"}))])
        .await
        .unwrap();
    let events: Vec<_> = reply
        .into_events()
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name, "delta");
    assert_eq!(events[0].payload, json!({"token": "hi"}));
    assert_eq!(events[1].name, "usage");
    assert_eq!(events[1].payload, json!({"tokens": 2}));
}

#[tokio::test]
async fn stream_shape_raises_status_error_before_decoding() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/completions")
        .with_status(404)
        .with_body("no such model")
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder(server.url()).build().unwrap();
    let chat = dispatcher.service("Chat", chat_service).unwrap();
    let stream_method = chat.method("stream").unwrap();

    let err = dispatcher
        .invoke(&chat, stream_method, &[Arg::Value(json!({"prompt": "hi"}))])
        .await
        .unwrap_err();
    match err {
        Error::HttpStatus(failure) => {
            assert_eq!(failure.status, 404);
            assert_eq!(failure.body, "no such model");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn codec_failure_surfaces_as_a_codec_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/sessions/s1")
        .with_status(200)
        .with_body("definitely not json")
        .create_async()
        .await;

    let dispatcher = Dispatcher::builder(server.url()).build().unwrap();
    let chat = dispatcher.service("Chat", chat_service).unwrap();
    let session = chat.method("session").unwrap();

    let err = dispatcher
        .invoke(&chat, session, &[Arg::Value(json!("s1"))])
        .await
        .unwrap_err();
    match err {
        Error::Codec(codec) => {
            assert_eq!(codec.target, "Session");
            assert_eq!(codec.text, "definitely not json");
        }
        other => panic!("unexpected error: {other}"),
    }
}
