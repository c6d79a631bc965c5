//! 싱크 워커 — 버퍼 적재와 분리된 내구 저장 경로
//!
//! 수집 루프는 배치를 유계 채널로 건네고 즉시 다음 사이클로 넘어갑니다.
//! 워커 태스크가 채널을 소비하며 [`EventSink::append`]를 호출합니다.
//! 싱크 실패는 로그와 카운터로만 보고되고 수집을 중단시키지 않습니다.
//!
//! 종료 시에는 채널에 남은 배치를 모두 기록한 뒤 빠져나갑니다.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use logward_core::metrics::{SINK_RECORDS_WRITTEN_TOTAL, SINK_WRITE_FAILURES_TOTAL};
use logward_core::sink::EventSink;
use logward_core::types::EventRecord;

/// 싱크 워커를 기동합니다.
///
/// 반환된 송신자로 배치를 보냅니다. 채널이 닫히거나 토큰이 취소되면
/// 워커는 잔여 배치를 비운 뒤 종료합니다.
pub fn spawn(
    sink: Arc<dyn EventSink>,
    queue_capacity: usize,
    cancel: CancellationToken,
) -> (mpsc::Sender<Vec<EventRecord>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(queue_capacity);
    let handle = tokio::spawn(run(sink, rx, cancel));
    (tx, handle)
}

async fn run(
    sink: Arc<dyn EventSink>,
    mut rx: mpsc::Receiver<Vec<EventRecord>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                rx.close();
                // 종료 전 잔여 배치 플러시
                while let Ok(batch) = rx.try_recv() {
                    write_batch(&sink, batch).await;
                }
                debug!("sink worker stopped");
                return;
            }
            batch = rx.recv() => {
                match batch {
                    Some(batch) => write_batch(&sink, batch).await,
                    None => {
                        debug!("sink channel closed, worker exiting");
                        return;
                    }
                }
            }
        }
    }
}

async fn write_batch(sink: &Arc<dyn EventSink>, batch: Vec<EventRecord>) {
    if batch.is_empty() {
        return;
    }
    let expected = batch.len();
    match sink.append(&batch).await {
        Ok(written) => {
            metrics::counter!(SINK_RECORDS_WRITTEN_TOTAL).increment(written as u64);
            if written < expected {
                warn!(written, expected, "sink accepted partial batch");
            }
        }
        Err(err) => {
            metrics::counter!(SINK_WRITE_FAILURES_TOTAL).increment(1);
            warn!(error = %err, count = expected, "sink append failed, batch lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logward_core::sink::MemorySink;

    fn batch(n: usize) -> Vec<EventRecord> {
        (0..n)
            .map(|i| EventRecord::new(format!("line {i}"), "2024-01-26T10:00:00", "test"))
            .collect()
    }

    #[tokio::test]
    async fn writes_batches_to_sink() {
        let sink = Arc::new(MemorySink::new());
        let cancel = CancellationToken::new();
        let (tx, handle) = spawn(sink.clone(), 8, cancel.clone());

        tx.send(batch(3)).await.unwrap();
        tx.send(batch(2)).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(sink.len().await, 5);
    }

    #[tokio::test]
    async fn cancel_flushes_pending_batches() {
        let sink = Arc::new(MemorySink::new());
        let cancel = CancellationToken::new();
        // 용량을 크게 잡고 워커가 돌기 전에 보내도 유실이 없어야 한다
        let (tx, handle) = spawn(sink.clone(), 16, cancel.clone());

        tx.send(batch(4)).await.unwrap();
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(sink.len().await, 4);
    }

    #[tokio::test]
    async fn empty_batches_are_ignored() {
        let sink = Arc::new(MemorySink::new());
        let cancel = CancellationToken::new();
        let (tx, handle) = spawn(sink.clone(), 8, cancel.clone());

        tx.send(Vec::new()).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(sink.is_empty().await);
    }
}
