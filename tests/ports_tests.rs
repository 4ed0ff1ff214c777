mod common;

use std::time::Duration;

use common::{stores, test_settings};
use endpoint_scan_rs::error::ScanError;
use endpoint_scan_rs::port_scan::{PortScanRequest, PortScanner};
use endpoint_scan_rs::ports::{parse_port_list, parse_port_range};
use endpoint_scan_rs::types::PortStatus;
use endpoint_scan_rs::worklist::PortSelection;
use tokio::net::TcpListener;
use tokio::time::timeout;

#[test]
fn range_and_list_parsing() {
    assert_eq!(parse_port_range("10-12"), vec![10, 11, 12]);
    assert!(parse_port_range("12-10").is_empty());
    assert_eq!(parse_port_list(" 443, ssh, 22,443 "), vec![443, 22, 443]);
}

#[tokio::test]
async fn missing_host_or_empty_range_is_rejected() {
    let (store, session) = stores();
    let scanner = PortScanner::new(store, session, &test_settings());

    let err = scanner
        .start(PortScanRequest {
            host: "  ".into(),
            ..PortScanRequest::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::MissingHost));

    let err = scanner
        .start(PortScanRequest {
            host: "127.0.0.1".into(),
            ports: PortSelection::Range("12-10".into()),
            timeout_ms: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::EmptyWorklist));
}

#[tokio::test]
async fn scan_reports_open_and_closed_ports() {
    let open = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let open_port = open.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            if open.accept().await.is_err() {
                break;
            }
        }
    });
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed_port = closed.local_addr().unwrap().port();
    drop(closed);

    let (store, session) = stores();
    let scanner = PortScanner::new(store, session, &test_settings());
    let handle = scanner
        .start(PortScanRequest {
            host: "127.0.0.1".into(),
            ports: PortSelection::Custom(format!("{open_port},{closed_port}")),
            timeout_ms: Some(1_000),
        })
        .await
        .unwrap();
    let summary = timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.passed, 1);

    let results = scanner.results().await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].port, open_port);
    assert_eq!(results[0].status, PortStatus::Open);
    assert_eq!(results[1].port, closed_port);
    assert_eq!(results[1].status, PortStatus::Closed);
}

#[tokio::test]
async fn zero_timeout_request_still_detects_open_port() {
    let open = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = open.local_addr().unwrap().port();
    tokio::spawn(async move { while open.accept().await.is_ok() {} });

    let (store, session) = stores();
    let scanner = PortScanner::new(store, session, &test_settings());
    let handle = scanner
        .start(PortScanRequest {
            host: "127.0.0.1".into(),
            ports: PortSelection::Custom(port.to_string()),
            timeout_ms: Some(0),
        })
        .await
        .unwrap();
    timeout(Duration::from_secs(10), handle).await.unwrap().unwrap();

    let results = scanner.results().await;
    assert_eq!(results[0].status, PortStatus::Open);
}
