//! Control socket round trip against a real service.

use crate::cli::control_socket;
use nodashtube_core::control::{Request, Response};
use nodashtube_core::process::CommandLauncher;
use nodashtube_core::service::DownloadService;
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::test]
async fn requests_round_trip_over_socket() {
    let dir = tempfile::tempdir().unwrap();
    let downloads = dir.path().join("downloads");
    std::fs::create_dir(&downloads).unwrap();
    std::fs::write(downloads.join("a.mp4"), b"x").unwrap();
    let socket = dir.path().join("control.sock");

    let launcher = Arc::new(CommandLauncher::new(
        "sh",
        vec!["-c".into(), "sleep 30".into(), "sh".into()],
    ));
    let (service, _fatal) = DownloadService::new(&downloads, launcher).unwrap();
    let listener = control_socket::bind(&socket).unwrap();
    let (fatal_tx, _fatal_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(control_socket::serve(listener, Arc::new(service), fatal_tx));

    let send = |req: Request| {
        let socket = socket.clone();
        async move { control_socket::send(&socket, &req).await.unwrap() }
    };

    match send(Request::Stored { since: None }).await {
        Response::Stored { entries, .. } => assert_eq!(entries, vec!["a.mp4"]),
        other => panic!("expected Stored, got {:?}", other),
    }
    assert_eq!(
        send(Request::File("a.mp4".into())).await,
        Response::Path {
            path: downloads.join("a.mp4")
        }
    );
    assert_eq!(send(Request::Cancel("1".into())).await, Response::NotFound);

    // The stand-in downloader never prints a destination.
    assert_eq!(send(Request::Start("1".into())).await, Response::Accepted);
    assert_eq!(
        send(Request::Start("1".into())).await,
        Response::AlreadyInProgress
    );
    match send(Request::Status).await {
        Response::Status { sessions } => {
            assert_eq!(sessions.len(), 1);
            assert_eq!(sessions["1"].filename, None);
        }
        other => panic!("expected Status, got {:?}", other),
    }
    assert_eq!(send(Request::Partial("1".into())).await, Response::NotFound);
    assert_eq!(send(Request::Cancel("1".into())).await, Response::Cancelled);

    server.abort();
}

#[tokio::test]
async fn malformed_request_gets_error_response() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("control.sock");
    let launcher = Arc::new(CommandLauncher::new("true", Vec::new()));
    let (service, _fatal) = DownloadService::new(dir.path(), launcher).unwrap();
    let listener = control_socket::bind(&socket).unwrap();
    let (fatal_tx, _fatal_rx) = mpsc::unbounded_channel();
    let server = tokio::spawn(control_socket::serve(listener, Arc::new(service), fatal_tx));

    let stream = tokio::net::UnixStream::connect(&socket).await.unwrap();
    let (read, mut write) = stream.into_split();
    write.write_all(b"frobnicate now\n").await.unwrap();
    let line = BufReader::new(read).lines().next_line().await.unwrap().unwrap();
    let response: Response = serde_json::from_str(&line).unwrap();
    assert!(matches!(response, Response::Error { .. }));

    server.abort();
}

#[tokio::test]
async fn send_without_daemon_fails() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("absent.sock");
    assert!(control_socket::send(&socket, &Request::Status).await.is_err());
}
