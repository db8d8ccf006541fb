use std::path::{Path, PathBuf};

use energycsv_client::{StatisticMetadata, StatisticRecord, StatisticsStore};
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};

/// Append-only NDJSON statistics files, one per statistic id.
///
/// Records go to `<dir>/<statistic_id>.ndjson`, metadata to
/// `<dir>/<statistic_id>.meta.json`.
pub struct JsonLinesStatisticsStore {
    directory: PathBuf,
}

impl JsonLinesStatisticsStore {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn records_path(&self, statistic_id: &str) -> PathBuf {
        self.directory.join(format!("{}.ndjson", file_stem(statistic_id)))
    }

    fn metadata_path(&self, statistic_id: &str) -> PathBuf {
        self.directory.join(format!("{}.meta.json", file_stem(statistic_id)))
    }
}

/// Statistic ids contain dots; keep them but drop path separators.
fn file_stem(statistic_id: &str) -> String {
    statistic_id
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

async fn last_record(path: &Path) -> anyhow::Result<Option<StatisticRecord>> {
    let file = match File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut lines = BufReader::new(file).lines();

    let mut last = None;
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            last = Some(line);
        }
    }

    match last {
        Some(line) => Ok(Some(serde_json::from_str(&line)?)),
        None => Ok(None),
    }
}

#[async_trait::async_trait]
impl StatisticsStore for JsonLinesStatisticsStore {
    async fn latest(&self, statistic_id: &str) -> anyhow::Result<Option<StatisticRecord>> {
        last_record(&self.records_path(statistic_id)).await
    }

    async fn import(
        &self,
        metadata: &StatisticMetadata,
        records: &[StatisticRecord],
    ) -> anyhow::Result<()> {
        fs::create_dir_all(&self.directory).await?;
        fs::write(
            self.metadata_path(&metadata.statistic_id),
            serde_json::to_vec_pretty(metadata)?,
        )
        .await?;

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.records_path(&metadata.statistic_id))
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;

        tracing::debug!(statistic_id = %metadata.statistic_id, count = records.len(), "appended statistics");
        Ok(())
    }
}
