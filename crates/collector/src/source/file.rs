//! 파일 tail 어댑터
//!
//! 파일 또는 디렉토리를 주기적으로 읽어 신규 라인만 수집합니다.
//! 파일별 바이트 오프셋과 아이덴티티(유닉스 inode)를 추적하여
//! 로테이션과 잘림(truncation)을 감지합니다.
//!
//! # 커서 규칙
//! - 첫 발견 파일은 마지막 50KiB만 읽습니다 (초기 폭주 방지)
//! - 아이덴티티 변경 = 로테이션 → 오프셋 0부터 재수집
//! - 오프셋 > 파일 크기 = 잘림 → 오프셋 0부터 재수집
//! - 사라진 파일은 추적에서 조용히 제거

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use logward_core::config::FileSourceConfig;
use logward_core::types::EventRecord;

use crate::classifier::{classify, is_important};
use crate::error::CollectError;

/// 첫 발견 파일에서 읽는 꼬리 윈도우 크기 (바이트)
const FIRST_READ_WINDOW: u64 = 50 * 1024;

/// 파일 tail 소스
pub struct FileSource {
    config: FileSourceConfig,
    /// 파일별 다음 읽기 오프셋
    positions: HashMap<PathBuf, u64>,
    /// 파일별 아이덴티티 — 로테이션 감지용
    identities: HashMap<PathBuf, u64>,
}

impl FileSource {
    /// 설정에서 파일 소스를 생성합니다.
    pub fn new(config: FileSourceConfig) -> Self {
        Self {
            config,
            positions: HashMap::new(),
            identities: HashMap::new(),
        }
    }

    /// 소스 이름을 반환합니다.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// 모든 추적 파일의 신규 라인을 수집합니다.
    pub async fn collect(&mut self) -> Result<Vec<EventRecord>, CollectError> {
        let root = normalize_path(&self.config.path).await;
        let targets = match fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => self.discover_files(&root).await?,
            Ok(_) => vec![root],
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %root.display(), "watch path missing, skipping cycle");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for path in targets {
            match self.read_new_lines(&path).await {
                Ok(mut batch) => records.append(&mut batch),
                Err(e) => {
                    // 파일 하나의 실패가 소스 전체를 막지 않는다
                    warn!(file = %path.display(), error = %e, "failed to read file, skipping");
                }
            }
        }

        if self.config.filter_important {
            records.retain(is_important);
        }
        Ok(records)
    }

    /// 디렉토리를 재귀 순회하며 패턴에 맞는 파일을 찾습니다.
    async fn discover_files(&self, root: &Path) -> Result<Vec<PathBuf>, CollectError> {
        let mut found = Vec::new();
        let mut stack = vec![root.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "cannot read directory, skipping");
                    continue;
                }
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path);
                } else if let Some(name) = path.file_name().and_then(|n| n.to_str())
                    && self.config.patterns.iter().any(|p| glob_match(p, name))
                {
                    found.push(path);
                }
            }
        }
        found.sort();
        Ok(found)
    }

    /// 파일 하나의 커서 이후 라인을 읽어 분류합니다.
    async fn read_new_lines(&mut self, path: &Path) -> Result<Vec<EventRecord>, CollectError> {
        let meta = match fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.positions.remove(path);
                self.identities.remove(path);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let size = meta.len();
        let identity = file_identity(&meta);

        let offset = match (self.positions.get(path), self.identities.get(path)) {
            (Some(&pos), Some(&id)) if id == identity => {
                if pos > size {
                    debug!(file = %path.display(), "file truncated, restarting from 0");
                    0
                } else {
                    pos
                }
            }
            (Some(_), Some(_)) => {
                debug!(file = %path.display(), "file rotated, restarting from 0");
                0
            }
            _ => size.saturating_sub(FIRST_READ_WINDOW),
        };

        if offset >= size {
            self.positions.insert(path.to_path_buf(), size);
            self.identities.insert(path.to_path_buf(), identity);
            return Ok(Vec::new());
        }

        let mut file = fs::File::open(path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        self.positions
            .insert(path.to_path_buf(), offset + buf.len() as u64);
        self.identities.insert(path.to_path_buf(), identity);

        let text = String::from_utf8_lossy(&buf);
        let records = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| classify(line, &self.config.name))
            .collect();
        Ok(records)
    }

    /// 경로 존재와 읽기 가능 여부를 확인합니다.
    pub async fn test_connection(&mut self) -> Result<(), CollectError> {
        let path = normalize_path(&self.config.path).await;
        let meta = fs::metadata(&path).await.map_err(|_| CollectError::Source {
            source_type: "file".to_owned(),
            reason: format!(
                "path '{}' does not exist — check that the path is correct and absolute",
                path.display()
            ),
        })?;
        let readable = if meta.is_dir() {
            fs::read_dir(&path).await.map(|_| ())
        } else {
            fs::File::open(&path).await.map(|_| ())
        };
        readable.map_err(|e| CollectError::Source {
            source_type: "file".to_owned(),
            reason: format!(
                "path '{}' is not readable: {e} — check file permissions",
                path.display()
            ),
        })
    }

    /// 모든 파일 커서를 초기화합니다.
    pub fn reset_tracking(&mut self) {
        self.positions.clear();
        self.identities.clear();
    }
}

/// 경로 문자열을 정규화합니다 (공백/따옴표 제거, 가능하면 canonicalize).
async fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim().trim_matches('"').trim_matches('\'').trim();
    let path = PathBuf::from(trimmed);
    fs::canonicalize(&path).await.unwrap_or(path)
}

/// 파일 아이덴티티를 계산합니다.
///
/// 유닉스에서는 inode 번호를 사용합니다. 그 외 플랫폼에서는
/// (수정 시각, 크기) 해시로 대체합니다.
fn file_identity(meta: &std::fs::Metadata) -> u64 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        meta.ino()
    }
    #[cfg(not(unix))]
    {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        if let Ok(modified) = meta.modified() {
            modified.hash(&mut hasher);
        }
        meta.len().hash(&mut hasher);
        hasher.finish()
    }
}

/// `*` 와일드카드만 지원하는 단순 글롭 매칭.
fn glob_match(pattern: &str, name: &str) -> bool {
    let mut segments = pattern.split('*');
    let Some(first) = segments.next() else {
        return name.is_empty();
    };
    if !name.starts_with(first) {
        return false;
    }
    let mut rest = &name[first.len()..];
    let mut middle: Vec<&str> = segments.collect();
    let Some(last) = middle.pop() else {
        // 와일드카드 없음 — 정확 일치
        return rest.is_empty();
    };
    for segment in middle {
        if segment.is_empty() {
            continue;
        }
        match rest.find(segment) {
            Some(idx) => rest = &rest[idx + segment.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
