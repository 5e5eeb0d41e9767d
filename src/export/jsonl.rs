//! JSON Lines sinks for pipeline output.
//!
//! One JSON object per line, UTF-8, no BOM. Records are de-duplicated by
//! natural key before writing; the first record for a key wins.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::pipeline::PipelineOutput;
use crate::store::{KeyedStore, NaturalKey};

pub const MESSAGES_FILE: &str = "messages.jsonl";
pub const SUB_MESSAGES_FILE: &str = "sub_messages.jsonl";
pub const TEXTS_FILE: &str = "texts.jsonl";
pub const MISSING_FILE: &str = "missing.txt";

/// Counts for one written file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    pub path: PathBuf,
    pub written: usize,
    pub duplicates: usize,
}

/// Counts for a whole export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    pub messages: SinkStats,
    pub sub_messages: SinkStats,
    pub texts: SinkStats,
    pub missing: SinkStats,
}

/// Write `records` to `path`, one JSON object per line.
pub fn write_jsonl<T, I>(records: I, path: &Path) -> Result<SinkStats>
where
    T: Serialize + NaturalKey,
    I: IntoIterator<Item = T>,
{
    let mut store = KeyedStore::new();
    store.extend(records);

    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for record in store.iter() {
        serde_json::to_writer(&mut writer, record)
            .map_err(|e| Error::Export(format!("{}: {e}", path.display())))?;
        writer.write_all(b"\n").map_err(|e| Error::io(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;

    Ok(SinkStats {
        path: path.to_path_buf(),
        written: store.len(),
        duplicates: store.duplicates(),
    })
}

/// Write one identifier per line.
pub fn write_missing(ids: &BTreeSet<String>, path: &Path) -> Result<SinkStats> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for id in ids {
        writeln!(writer, "{id}").map_err(|e| Error::io(path, e))?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(SinkStats {
        path: path.to_path_buf(),
        written: ids.len(),
        duplicates: 0,
    })
}

/// Write all four output files into `dir`, creating it if needed.
pub fn export_output(output: &PipelineOutput, dir: &Path) -> Result<ExportSummary> {
    std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let summary = ExportSummary {
        messages: write_jsonl(output.messages.iter().cloned(), &dir.join(MESSAGES_FILE))?,
        sub_messages: write_jsonl(output.sub_messages(), &dir.join(SUB_MESSAGES_FILE))?,
        texts: write_jsonl(output.text_pairs(), &dir.join(TEXTS_FILE))?,
        missing: write_missing(&output.missing_ancestors, &dir.join(MISSING_FILE))?,
    };

    info!(
        dir = %dir.display(),
        messages = summary.messages.written,
        sub_messages = summary.sub_messages.written,
        texts = summary.texts.written,
        duplicates = summary.messages.duplicates,
        "Export complete"
    );
    Ok(summary)
}
