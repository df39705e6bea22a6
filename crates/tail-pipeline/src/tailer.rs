//! 파일 테일러 -- 경로 하나의 읽기 핸들과 오프셋을 소유
//!
//! [`FileTailer`]는 로그 파일 하나를 증분으로 읽습니다. 읽은 바이트는
//! 내부 [`LineBuffer`]로 들어가 라인 레코드로 재조립됩니다. 핸들
//! 수명과 오프셋은 분리되어 있어, 로테이션으로 파일이 사라졌다
//! 다시 생기면 핸들만 갈아끼우고 오프셋은 호출자가 명시적으로
//! 리셋합니다.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, trace};

use logpost_core::metrics as m;
use logpost_core::record::Record;

use crate::buffer::LineBuffer;
use crate::error::TailPipelineError;
use crate::rule::FilterChain;

/// 한 번의 테일 읽기에 사용하는 청크 크기
const READ_CHUNK_SIZE: usize = 8192;

/// 로그 파일 하나를 증분으로 읽는 테일러
#[derive(Debug)]
pub struct FileTailer {
    path: PathBuf,
    file: Option<tokio::fs::File>,
    /// 다음 읽기가 시작될 바이트 오프셋
    offset: u64,
    buffer: LineBuffer,
}

impl FileTailer {
    /// 경로와 분류 체인으로 테일러를 생성합니다. 핸들은 아직 열지 않습니다.
    pub fn new(path: impl Into<PathBuf>, chain: FilterChain, max_line_bytes: usize) -> Self {
        Self {
            path: path.into(),
            file: None,
            offset: 0,
            buffer: LineBuffer::new(chain, max_line_bytes),
        }
    }

    /// 읽기 핸들을 엽니다.
    ///
    /// 기존 핸들이 있으면 먼저 해제합니다. 경로가 일반 파일로 존재할
    /// 때만 새 핸들을 얻고, 없으면 닫힌 상태로 남습니다. 오프셋은
    /// 건드리지 않습니다.
    pub async fn open(&mut self) -> Result<(), TailPipelineError> {
        self.close();

        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => {
                let file = tokio::fs::File::open(&self.path).await.map_err(|e| {
                    TailPipelineError::Tail {
                        path: self.path.display().to_string(),
                        reason: format!("cannot open: {e}"),
                    }
                })?;
                self.file = Some(file);
                debug!(path = %self.path.display(), offset = self.offset, "file opened");
            }
            Ok(_) => {
                trace!(path = %self.path.display(), "path is not a regular file, staying closed");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "path does not exist, staying closed");
            }
            Err(e) => {
                return Err(TailPipelineError::Tail {
                    path: self.path.display().to_string(),
                    reason: format!("cannot stat: {e}"),
                });
            }
        }

        Ok(())
    }

    /// 읽기 핸들을 해제합니다. 오프셋과 버퍼는 유지됩니다.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(path = %self.path.display(), offset = self.offset, "file closed");
        }
    }

    /// 오프셋부터 파일 끝까지 읽어 버퍼에 밀어 넣습니다.
    ///
    /// 닫혀 있으면 아무것도 하지 않습니다. 이번 호출로 대기열에
    /// 추가된 레코드 수를 반환합니다.
    pub async fn tail(&mut self) -> Result<usize, TailPipelineError> {
        let path_str = self.path.display().to_string();
        let Some(file) = self.file.as_mut() else {
            return Ok(0);
        };

        file.seek(SeekFrom::Start(self.offset))
            .await
            .map_err(|e| TailPipelineError::Tail {
                path: path_str.clone(),
                reason: format!("seek failed: {e}"),
            })?;

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut total: u64 = 0;
        let mut queued = 0;

        loop {
            let n = file.read(&mut chunk).await.map_err(|e| TailPipelineError::Tail {
                path: path_str.clone(),
                reason: format!("read failed: {e}"),
            })?;
            if n == 0 {
                break;
            }
            self.offset += n as u64;
            total += n as u64;
            queued += self.buffer.push(&chunk[..n]);
        }

        if total > 0 {
            metrics::counter!(m::TAIL_BYTES_READ_TOTAL, m::LABEL_FILE => path_str.clone())
                .increment(total);
            trace!(
                path = %path_str,
                bytes = total,
                records = queued,
                offset = self.offset,
                "tail read"
            );
        }

        Ok(queued)
    }

    /// 경로가 일반 파일로 존재하고 핸들도 들고 있는지 여부
    pub async fn is_open(&self) -> bool {
        if self.file.is_none() {
            return false;
        }
        tokio::fs::metadata(&self.path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    /// 파일시스템 확인 없이 핸들 보유 여부만 봅니다.
    pub fn has_handle(&self) -> bool {
        self.file.is_some()
    }

    /// 현재 추적 중인 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 추적 경로를 바꿉니다. 핸들은 바꾸지 않으므로 호출자가 다시 열어야 합니다.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    /// 현재 읽기 오프셋
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// 오프셋을 0으로 되돌립니다. 재생성된 파일을 처음부터 읽을 때 사용합니다.
    pub fn reset_offset(&mut self) {
        self.offset = 0;
    }

    /// 대기 중인 레코드를 전부 꺼냅니다.
    pub fn drain_records(&mut self) -> Vec<Record> {
        self.buffer.drain()
    }

    /// 가장 오래된 대기 레코드를 꺼냅니다.
    pub fn pop_record(&mut self) -> Option<Record> {
        self.buffer.pop()
    }

    /// 내부 라인 버퍼 (통계 조회용)
    pub fn buffer(&self) -> &LineBuffer {
        &self.buffer
    }
}
