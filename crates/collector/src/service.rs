//! 수집 서비스 — 소스 레지스트리와 주기 수집 루프
//!
//! [`CollectorService`]는 소스 어댑터 목록을 관리하고, 고정 주기로
//! 전 소스를 순회 수집하여 버퍼에 적재하고 싱크 워커로 미러링합니다.
//!
//! # 수집 사이클
//! 1. 활성(enabled + running) 소스를 등록 순서대로 순회
//! 2. 각 소스의 신규 레코드를 수집 (소스 에러는 격리)
//! 3. `source_type`/`collected_at` 스탬프
//! 4. 버퍼에 일괄 적재 (용량 초과분 축출)
//! 5. 싱크 큐로 배치 전달 (큐가 가득 차면 배치 드랍 + 경고)
//!
//! 소스 하나가 느리면 사이클 전체가 늦어집니다. 주기를 넘긴 사이클은
//! 건너뛰지 않고 지연 실행됩니다 ([`MissedTickBehavior::Delay`]).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use logward_core::config::{CollectorSettings, LogwardConfig, SourceConfig};
use logward_core::error::{CollectorError, LogwardError};
use logward_core::metrics::{
    BUFFER_EVICTED_TOTAL, BUFFER_SIZE, COLLECTOR_CYCLES_TOTAL, COLLECTOR_RECORDS_TOTAL,
    COLLECTOR_SOURCES_REGISTERED, LABEL_SOURCE, LABEL_SOURCE_TYPE, SINK_BATCHES_DROPPED_TOTAL,
};
use logward_core::sink::{EventSink, MemorySink};
use logward_core::types::{EventRecord, EventType, Severity, SourceStatus};

use crate::buffer::{BufferStats, QueryFilter, QueryPage, RecordBuffer};
use crate::classifier::now_iso;
use crate::sink_worker;
use crate::source::SourceAdapter;

/// 외부(프론트엔드 등)에서 제출되는 레코드
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalRecord {
    /// 로그 레벨 (debug/info/warn/error)
    pub level: String,
    /// 메시지 본문
    pub message: String,
    /// 발생 컴포넌트 (선택)
    #[serde(default)]
    pub component: Option<String>,
}

/// 수집 서비스 빌더
pub struct CollectorServiceBuilder {
    settings: CollectorSettings,
    sink: Option<Arc<dyn EventSink>>,
    sources: Vec<SourceConfig>,
}

impl CollectorServiceBuilder {
    /// 기본 설정으로 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            settings: CollectorSettings::default(),
            sink: None,
            sources: Vec::new(),
        }
    }

    /// 수집기 설정을 지정합니다.
    pub fn settings(mut self, settings: CollectorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 내구 싱크를 지정합니다. 미지정 시 [`MemorySink`]를 사용합니다.
    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 초기 소스를 추가합니다.
    pub fn source(mut self, config: SourceConfig) -> Self {
        self.sources.push(config);
        self
    }

    /// 서비스를 생성합니다.
    pub fn build(self) -> CollectorService {
        let sink = self.sink.unwrap_or_else(|| Arc::new(MemorySink::new()));
        let adapters = self
            .sources
            .iter()
            .map(SourceAdapter::from_config)
            .collect::<Vec<_>>();
        metrics::gauge!(COLLECTOR_SOURCES_REGISTERED).set(adapters.len() as f64);
        CollectorService {
            settings: self.settings.clone(),
            sources: Arc::new(Mutex::new(adapters)),
            buffer: Arc::new(Mutex::new(RecordBuffer::new(self.settings.buffer_capacity))),
            sink,
            running: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            sink_tx: None,
            loop_handle: None,
            sink_handle: None,
        }
    }
}

impl Default for CollectorServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 수집 서비스
pub struct CollectorService {
    settings: CollectorSettings,
    sources: Arc<Mutex<Vec<SourceAdapter>>>,
    buffer: Arc<Mutex<RecordBuffer>>,
    sink: Arc<dyn EventSink>,
    running: Arc<AtomicBool>,
    cancel: CancellationToken,
    sink_tx: Option<mpsc::Sender<Vec<EventRecord>>>,
    loop_handle: Option<JoinHandle<()>>,
    sink_handle: Option<JoinHandle<()>>,
}

impl CollectorService {
    /// 빌더를 반환합니다.
    pub fn builder() -> CollectorServiceBuilder {
        CollectorServiceBuilder::new()
    }

    /// 설정 파일 전체에서 서비스를 구성합니다.
    pub fn from_config(config: &LogwardConfig, sink: Arc<dyn EventSink>) -> Self {
        let mut builder = Self::builder().settings(config.collector.clone()).sink(sink);
        for source in &config.sources {
            builder = builder.source(source.clone());
        }
        builder.build()
    }

    /// 수집 루프와 싱크 워커를 기동합니다.
    pub async fn start(&mut self) -> Result<(), LogwardError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning.into());
        }
        self.cancel = CancellationToken::new();

        let (sink_tx, sink_handle) = sink_worker::spawn(
            self.sink.clone(),
            self.settings.sink_queue_capacity,
            self.cancel.clone(),
        );
        self.sink_tx = Some(sink_tx.clone());
        self.sink_handle = Some(sink_handle);

        {
            let mut sources = self.sources.lock().await;
            for adapter in sources.iter_mut() {
                if adapter.state().enabled {
                    adapter.set_running(true);
                }
            }
            info!(
                sources = sources.len(),
                poll_interval_secs = self.settings.poll_interval_secs,
                "collector started"
            );
        }

        let loop_handle = tokio::spawn(run_loop(
            self.sources.clone(),
            self.buffer.clone(),
            sink_tx,
            self.settings.poll_interval_secs,
            self.cancel.clone(),
        ));
        self.loop_handle = Some(loop_handle);
        Ok(())
    }

    /// 수집 루프와 싱크 워커를 정지합니다.
    ///
    /// 싱크 큐의 잔여 배치는 종료 전에 기록됩니다.
    pub async fn stop(&mut self) -> Result<(), LogwardError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(CollectorError::NotRunning.into());
        }
        self.cancel.cancel();
        self.sink_tx = None;

        if let Some(handle) = self.loop_handle.take()
            && let Err(err) = handle.await
        {
            warn!(error = %err, "collector loop task panicked");
        }
        if let Some(handle) = self.sink_handle.take()
            && let Err(err) = handle.await
        {
            warn!(error = %err, "sink worker task panicked");
        }

        let mut sources = self.sources.lock().await;
        for adapter in sources.iter_mut() {
            adapter.set_running(false);
        }
        info!("collector stopped");
        Ok(())
    }

    /// 실행 중 여부를 반환합니다.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// 수집 사이클 한 번을 즉시 실행하고 수집된 레코드 수를 반환합니다.
    ///
    /// 루프가 돌지 않는 상태에서도 동작합니다. 이때 배치는 싱크에
    /// 직접 기록됩니다.
    pub async fn collect_once(&self) -> usize {
        let batch = run_cycle(&self.sources, &self.buffer).await;
        let count = batch.len();
        if batch.is_empty() {
            return 0;
        }
        match &self.sink_tx {
            Some(tx) => deliver_to_sink(tx, batch),
            None => {
                if let Err(err) = self.sink.append(&batch).await {
                    warn!(error = %err, "direct sink append failed");
                }
            }
        }
        count
    }

    /// 소스를 추가합니다. 이름 중복은 거부됩니다.
    pub async fn add_source(&self, config: SourceConfig) -> Result<(), LogwardError> {
        config.validate()?;
        let mut sources = self.sources.lock().await;
        if sources.iter().any(|s| s.name() == config.name()) {
            warn!(name = config.name(), "rejected duplicate source");
            return Err(CollectorError::DuplicateSource {
                name: config.name().to_owned(),
            }
            .into());
        }
        let mut adapter = SourceAdapter::from_config(&config);
        if self.is_running() && adapter.state().enabled {
            adapter.set_running(true);
        }
        info!(name = adapter.name(), kind = %adapter.kind(), "source added");
        sources.push(adapter);
        metrics::gauge!(COLLECTOR_SOURCES_REGISTERED).set(sources.len() as f64);
        Ok(())
    }

    /// 소스를 제거합니다.
    pub async fn remove_source(&self, name: &str) -> Result<(), LogwardError> {
        let mut sources = self.sources.lock().await;
        let before = sources.len();
        sources.retain(|s| s.name() != name);
        if sources.len() == before {
            return Err(unknown_source(name));
        }
        info!(name, "source removed");
        metrics::gauge!(COLLECTOR_SOURCES_REGISTERED).set(sources.len() as f64);
        Ok(())
    }

    /// 소스 활성화 상태를 반전하고 새 상태를 반환합니다.
    pub async fn toggle_source(&self, name: &str) -> Result<bool, LogwardError> {
        let mut sources = self.sources.lock().await;
        let adapter = find_mut(&mut sources, name)?;
        let enabled = !adapter.state().enabled;
        adapter.set_enabled(enabled);
        if !enabled {
            adapter.set_running(false);
        } else if self.is_running() {
            adapter.set_running(true);
        }
        info!(name, enabled, "source toggled");
        Ok(enabled)
    }

    /// 소스 수집을 개별 시작합니다.
    pub async fn start_source(&self, name: &str) -> Result<(), LogwardError> {
        let mut sources = self.sources.lock().await;
        let adapter = find_mut(&mut sources, name)?;
        adapter.set_enabled(true);
        adapter.set_running(true);
        Ok(())
    }

    /// 소스 수집을 개별 정지합니다.
    pub async fn stop_source(&self, name: &str) -> Result<(), LogwardError> {
        let mut sources = self.sources.lock().await;
        let adapter = find_mut(&mut sources, name)?;
        adapter.set_running(false);
        Ok(())
    }

    /// 소스 연결을 점검합니다.
    pub async fn test_source(&self, name: &str) -> Result<bool, LogwardError> {
        let mut sources = self.sources.lock().await;
        let adapter = find_mut(&mut sources, name)?;
        Ok(adapter.test_connection().await)
    }

    /// 소스의 증분 커서를 초기화합니다.
    pub async fn reset_source_tracking(&self, name: &str) -> Result<(), LogwardError> {
        let mut sources = self.sources.lock().await;
        let adapter = find_mut(&mut sources, name)?;
        adapter.reset_tracking();
        info!(name, "source tracking reset");
        Ok(())
    }

    /// 모든 소스의 상태 스냅샷을 등록 순서대로 반환합니다.
    pub async fn source_statuses(&self) -> Vec<SourceStatus> {
        let sources = self.sources.lock().await;
        sources.iter().map(SourceAdapter::status).collect()
    }

    /// 외부 제출 레코드를 버퍼와 싱크에 적재합니다.
    pub async fn push_external(&self, external: ExternalRecord) -> usize {
        let severity = Severity::from_str_loose(&external.level).unwrap_or(Severity::Info);
        let raw = format!("[{}] {}", external.level.to_uppercase(), external.message);
        let message = match &external.component {
            Some(component) => format!("[{component}] {}", external.message),
            None => external.message.clone(),
        };
        let now = now_iso();

        let mut record = EventRecord::new(raw, now.clone(), "frontend");
        record.event_type = EventType::Log;
        record.severity = severity;
        record.message = message;
        record.source_type = Some("frontend".to_owned());
        record.collected_at = Some(now);

        let batch = vec![record];
        {
            let mut buffer = self.buffer.lock().await;
            let evicted = buffer.append(batch.clone());
            metrics::gauge!(BUFFER_SIZE).set(buffer.len() as f64);
            if evicted > 0 {
                metrics::counter!(BUFFER_EVICTED_TOTAL).increment(evicted as u64);
            }
        }
        match &self.sink_tx {
            Some(tx) => deliver_to_sink(tx, batch),
            None => {
                if let Err(err) = self.sink.append(&batch).await {
                    warn!(error = %err, "direct sink append failed");
                }
            }
        }
        1
    }

    /// 버퍼를 조회합니다.
    pub async fn query(&self, filter: &QueryFilter, page: usize, page_size: usize) -> QueryPage {
        let buffer = self.buffer.lock().await;
        buffer.query(filter, page, page_size)
    }

    /// 버퍼 집계를 반환합니다.
    pub async fn stats(&self) -> BufferStats {
        let buffer = self.buffer.lock().await;
        buffer.stats()
    }

    /// 버퍼와 싱크를 비우고 버퍼에서 제거된 레코드 수를 반환합니다.
    ///
    /// 소스별 `logs_collected` 카운터도 0으로 되돌립니다. 증분 커서는
    /// 유지되므로 이미 본 레코드가 재수집되지는 않습니다.
    pub async fn clear_logs(&self) -> usize {
        let removed = {
            let mut buffer = self.buffer.lock().await;
            let removed = buffer.clear();
            metrics::gauge!(BUFFER_SIZE).set(0.0);
            removed
        };
        {
            let mut sources = self.sources.lock().await;
            for adapter in sources.iter_mut() {
                adapter.reset_collected_count();
            }
        }
        // 싱크 삭제 실패는 버퍼 결과에 영향을 주지 않는다
        if let Err(err) = self.sink.delete_all().await {
            warn!(error = %err, "sink delete_all failed");
        }
        info!(removed, "logs cleared");
        removed
    }

    /// 싱크 참조를 반환합니다 (조회/집계용).
    pub fn sink(&self) -> Arc<dyn EventSink> {
        self.sink.clone()
    }
}

fn unknown_source(name: &str) -> LogwardError {
    CollectorError::UnknownSource {
        name: name.to_owned(),
    }
    .into()
}

fn find_mut<'a>(
    sources: &'a mut [SourceAdapter],
    name: &str,
) -> Result<&'a mut SourceAdapter, LogwardError> {
    sources
        .iter_mut()
        .find(|s| s.name() == name)
        .ok_or_else(|| unknown_source(name))
}

/// 배치를 싱크 큐에 비차단 전달합니다. 큐가 가득 차면 배치를 버립니다.
fn deliver_to_sink(tx: &mpsc::Sender<Vec<EventRecord>>, batch: Vec<EventRecord>) {
    match tx.try_send(batch) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(batch)) => {
            metrics::counter!(SINK_BATCHES_DROPPED_TOTAL).increment(1);
            warn!(count = batch.len(), "sink queue full, dropping batch");
        }
        Err(mpsc::error::TrySendError::Closed(batch)) => {
            warn!(count = batch.len(), "sink queue closed, dropping batch");
        }
    }
}

/// 주기 수집 루프.
async fn run_loop(
    sources: Arc<Mutex<Vec<SourceAdapter>>>,
    buffer: Arc<Mutex<RecordBuffer>>,
    sink_tx: mpsc::Sender<Vec<EventRecord>>,
    poll_interval_secs: u64,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(poll_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("collector loop stopped");
                return;
            }
            _ = ticker.tick() => {
                let batch = run_cycle(&sources, &buffer).await;
                if !batch.is_empty() {
                    deliver_to_sink(&sink_tx, batch);
                }
            }
        }
    }
}

/// 수집 사이클 한 번: 전 소스 수집, 스탬프, 버퍼 적재.
async fn run_cycle(
    sources: &Mutex<Vec<SourceAdapter>>,
    buffer: &Mutex<RecordBuffer>,
) -> Vec<EventRecord> {
    metrics::counter!(COLLECTOR_CYCLES_TOTAL).increment(1);
    let mut batch = Vec::new();
    {
        let mut sources = sources.lock().await;
        for adapter in sources.iter_mut() {
            if !adapter.is_active() {
                continue;
            }
            let records = adapter.collect().await;
            if records.is_empty() {
                continue;
            }
            metrics::counter!(
                COLLECTOR_RECORDS_TOTAL,
                LABEL_SOURCE => adapter.name().to_owned(),
                LABEL_SOURCE_TYPE => adapter.kind().as_str(),
            )
            .increment(records.len() as u64);

            let source_type = adapter.kind().as_str();
            let collected_at = now_iso();
            for mut record in records {
                record.source_type = Some(source_type.to_owned());
                if record.timestamp.is_empty() {
                    record.timestamp = collected_at.clone();
                }
                record.collected_at = Some(collected_at.clone());
                batch.push(record);
            }
        }
    }

    if !batch.is_empty() {
        let mut buffer = buffer.lock().await;
        let evicted = buffer.append(batch.clone());
        metrics::gauge!(BUFFER_SIZE).set(buffer.len() as f64);
        if evicted > 0 {
            metrics::counter!(BUFFER_EVICTED_TOTAL).increment(evicted as u64);
        }
        debug!(count = batch.len(), buffered = buffer.len(), "cycle complete");
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use logward_core::config::FileSourceConfig;
    use logward_core::sink::SinkQuery;

    fn file_source(name: &str, path: &str) -> SourceConfig {
        SourceConfig::File(FileSourceConfig {
            name: name.to_owned(),
            enabled: true,
            path: path.to_owned(),
            patterns: vec!["*.log".to_owned()],
            filter_important: false,
        })
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let mut service = CollectorService::builder().build();
        service.start().await.unwrap();
        let err = service.start().await.unwrap_err();
        assert!(matches!(
            err,
            LogwardError::Collector(CollectorError::AlreadyRunning)
        ));
        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_without_start_is_rejected() {
        let mut service = CollectorService::builder().build();
        let err = service.stop().await.unwrap_err();
        assert!(matches!(
            err,
            LogwardError::Collector(CollectorError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn add_source_rejects_duplicates() {
        let service = CollectorService::builder().build();
        service
            .add_source(file_source("app", "/tmp/a"))
            .await
            .unwrap();
        let err = service
            .add_source(file_source("app", "/tmp/b"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LogwardError::Collector(CollectorError::DuplicateSource { .. })
        ));
    }

    #[tokio::test]
    async fn remove_source_unknown_name() {
        let service = CollectorService::builder().build();
        let err = service.remove_source("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            LogwardError::Collector(CollectorError::UnknownSource { .. })
        ));
    }

    #[tokio::test]
    async fn toggle_flips_enabled_state() {
        let service = CollectorService::builder()
            .source(file_source("app", "/tmp/a"))
            .build();
        assert!(!service.toggle_source("app").await.unwrap());
        assert!(service.toggle_source("app").await.unwrap());
    }

    #[tokio::test]
    async fn statuses_preserve_registration_order() {
        let service = CollectorService::builder()
            .source(file_source("zeta", "/tmp/z"))
            .source(file_source("alpha", "/tmp/a"))
            .build();
        let statuses = service.source_statuses().await;
        let names: Vec<&str> = statuses.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[tokio::test]
    async fn push_external_maps_levels() {
        let service = CollectorService::builder().build();
        service
            .push_external(ExternalRecord {
                level: "warn".to_owned(),
                message: "slow render".to_owned(),
                component: Some("Dashboard".to_owned()),
            })
            .await;

        let page = service.query(&QueryFilter::default(), 1, 10).await;
        assert_eq!(page.total, 1);
        let record = &page.records[0];
        assert_eq!(record.severity, Severity::Warning);
        assert_eq!(record.event_type, EventType::Log);
        assert_eq!(record.source, "frontend");
        assert_eq!(record.raw, "[WARN] slow render");
        assert!(record.message.contains("Dashboard"));
    }

    #[tokio::test]
    async fn push_external_unknown_level_defaults_to_info() {
        let service = CollectorService::builder().build();
        service
            .push_external(ExternalRecord {
                level: "verbose".to_owned(),
                message: "hello".to_owned(),
                component: None,
            })
            .await;
        let page = service.query(&QueryFilter::default(), 1, 10).await;
        assert_eq!(page.records[0].severity, Severity::Info);
    }

    #[tokio::test]
    async fn push_external_reaches_sink_without_worker() {
        let sink = Arc::new(MemorySink::new());
        let service = CollectorService::builder().sink(sink.clone()).build();
        service
            .push_external(ExternalRecord {
                level: "error".to_owned(),
                message: "boom".to_owned(),
                component: None,
            })
            .await;
        assert_eq!(sink.len().await, 1);
    }

    #[tokio::test]
    async fn collect_once_stamps_and_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("app.log");
        std::fs::write(&file_path, "ERROR: something broke\n").unwrap();

        let service = CollectorService::builder()
            .source(file_source("app", file_path.to_str().unwrap()))
            .build();
        service.start_source("app").await.unwrap();

        let collected = service.collect_once().await;
        assert_eq!(collected, 1);

        let page = service.query(&QueryFilter::default(), 1, 10).await;
        let record = &page.records[0];
        assert_eq!(record.source, "app");
        assert_eq!(record.source_type.as_deref(), Some("file"));
        assert!(record.collected_at.is_some());
    }

    #[tokio::test]
    async fn collect_once_skips_inactive_sources() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("app.log");
        std::fs::write(&file_path, "a line\n").unwrap();

        let service = CollectorService::builder()
            .source(file_source("app", file_path.to_str().unwrap()))
            .build();
        // running으로 표시된 적 없으므로 수집 대상이 아님
        assert_eq!(service.collect_once().await, 0);
    }

    #[tokio::test]
    async fn clear_logs_empties_buffer_and_sink() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("app.log");
        std::fs::write(&file_path, "one\ntwo\n").unwrap();

        let sink = Arc::new(MemorySink::new());
        let service = CollectorService::builder()
            .sink(sink.clone())
            .source(file_source("app", file_path.to_str().unwrap()))
            .build();
        service.start_source("app").await.unwrap();
        service.collect_once().await;
        assert_eq!(sink.len().await, 2);

        let removed = service.clear_logs().await;
        assert_eq!(removed, 2);
        assert!(sink.is_empty().await);
        assert_eq!(service.stats().await.total, 0);
        let statuses = service.source_statuses().await;
        assert_eq!(statuses[0].logs_collected, 0);

        // 커서는 유지 — 같은 내용이 재수집되지 않는다
        assert_eq!(service.collect_once().await, 0);
    }

    #[tokio::test]
    async fn sink_receives_collected_records_via_query() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("app.log");
        std::fs::write(&file_path, "hello sink\n").unwrap();

        let sink = Arc::new(MemorySink::new());
        let service = CollectorService::builder()
            .sink(sink.clone())
            .source(file_source("app", file_path.to_str().unwrap()))
            .build();
        service.start_source("app").await.unwrap();
        service.collect_once().await;

        let hits = sink
            .query(SinkQuery {
                search: Some("hello".to_owned()),
                ..SinkQuery::new()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_type.as_deref(), Some("file"));
    }
}
