use hypermocker::{Bytes, Server, StatusCode};

#[tokio::test]
async fn anticipated_request_is_answered() {
    let _ = env_logger::try_init();

    let server = Server::bind().await;
    let url = format!("{}/MapServer?f=json", server.url());
    let mut anticipated = server.anticipate("/MapServer").await;

    futures::future::join(
        async {
            let response = reqwest::get(url).await.unwrap();
            let bytes = response.bytes().await.unwrap();
            assert_eq!(&bytes[..], b"{}");
        },
        async {
            let request = anticipated.expect().await;
            assert_eq!(request.uri().query(), Some("f=json"));
            anticipated.respond(Bytes::from_static(b"{}")).await;
        },
    )
    .await;
}

#[tokio::test]
async fn same_path_is_served_in_order() {
    let _ = env_logger::try_init();

    let server = Server::bind().await;
    let first = server.anticipate("/export").await;
    let second = server.anticipate("/export").await;
    first.respond("first").await;
    second.respond("second").await;

    let url = format!("{}/export", server.url());
    let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
    assert_eq!(body, "first");
    let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
    assert_eq!(body, "second");
}

#[tokio::test]
async fn responding_with_status() {
    let _ = env_logger::try_init();

    let server = Server::bind().await;
    server
        .anticipate("/tile/0/0/0")
        .await
        .respond_with_status(StatusCode::NOT_FOUND)
        .await;

    let response = reqwest::get(format!("{}/tile/0/0/0", server.url()))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unexpected_request() {
    let _ = env_logger::try_init();

    let server = Server::bind().await;
    let url = format!("{}/foo", server.url());

    let response = reqwest::get(url).await.unwrap();
    let bytes = response.bytes().await.unwrap();
    assert_eq!(&bytes[..], b"unexpected");
    assert_eq!(server.unexpected(), vec!["/foo".to_string()]);

    // Dropping the server would panic otherwise.
    std::mem::forget(server);
}
