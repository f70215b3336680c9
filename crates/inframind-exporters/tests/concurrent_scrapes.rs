//! Scrapes racing exports must always see one complete snapshot.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use inframind_core::{Exporter, MetricsSnapshot};
use inframind_exporters::{PrometheusExporter, render_prometheus};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn scrape_body(addr: SocketAddr) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"), "unexpected response: {raw}");
    let (_, body) = raw.split_once("\r\n\r\n").unwrap();
    body.to_string()
}

fn cycle_snapshot(cycle: u32, size: usize) -> MetricsSnapshot {
    let mut snap = MetricsSnapshot::new();
    for i in 0..size {
        snap.set_gauge(format!("im_test_gauge_{i:03}"), f64::from(cycle));
        snap.set_counter(format!("im_test_total_{i:03}"), f64::from(cycle) * 10.0);
    }
    snap
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_hybrid_snapshots() {
    let exporter = Arc::new(PrometheusExporter::new("127.0.0.1:0".parse().unwrap()));
    exporter.start().await.unwrap();
    let addr = exporter.local_addr().unwrap();

    let a = Arc::new(cycle_snapshot(1, 50));
    let b = Arc::new(cycle_snapshot(2, 50));
    let expected_a = render_prometheus(&a);
    let expected_b = render_prometheus(&b);
    exporter.export(a.clone()).await.unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let writer = {
        let exporter = exporter.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let mut flip = false;
            while !done.load(Ordering::Relaxed) {
                let next = if flip { a.clone() } else { b.clone() };
                exporter.export(next).await.unwrap();
                flip = !flip;
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..8 {
        readers.push(tokio::spawn(async move {
            let mut bodies = Vec::new();
            for _ in 0..20 {
                bodies.push(scrape_body(addr).await);
            }
            bodies
        }));
    }

    let mut seen = 0;
    for reader in readers {
        for body in reader.await.unwrap() {
            assert!(
                body == expected_a || body == expected_b,
                "scrape returned a document that is neither snapshot:\n{body}"
            );
            seen += 1;
        }
    }
    assert_eq!(seen, 160);

    done.store(true, Ordering::Relaxed);
    writer.await.unwrap();
    exporter.stop().await;
}

#[tokio::test]
async fn scrape_before_first_export_is_empty_document() {
    let exporter = PrometheusExporter::new("127.0.0.1:0".parse().unwrap());
    exporter.start().await.unwrap();

    let body = scrape_body(exporter.local_addr().unwrap()).await;
    assert_eq!(body, "");

    exporter.stop().await;
}
