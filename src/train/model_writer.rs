use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

use cqdb::CQDBWriter;

use crate::context::Context;
use crate::model::{MaxentModel, CHUNK_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Model file writer
///
/// Layout: a fixed header, a `PARM` chunk holding the sparse weight table,
/// then the outcome and predicate label tables as CQDB databases.
pub struct ModelWriter;

struct Offsets {
    file_size: u32,
    params: u32,
    outcomes: u32,
    preds: u32,
}

fn to_u32(value: u64, what: &str) -> io::Result<u32> {
    u32::try_from(value)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, format!("{} exceeds u32::MAX", what)))
}

impl ModelWriter {
    /// Write a trained model to `filename`
    pub fn write(filename: &Path, model: &MaxentModel) -> io::Result<()> {
        let mut file = File::create(filename)?;

        // Placeholder header, rewritten once the offsets are known
        file.write_all(&[0u8; HEADER_SIZE])?;

        let params = to_u32(file.stream_position()?, "file position")?;
        Self::write_params(&mut file, model.params())?;

        let outcomes = to_u32(file.stream_position()?, "file position")?;
        Self::write_cqdb(&mut file, model.outcome_names())?;

        let preds = to_u32(file.stream_position()?, "file position")?;
        Self::write_cqdb(&mut file, model.pred_labels())?;

        let file_size = to_u32(file.stream_position()?, "file position")?;
        file.seek(SeekFrom::Start(0))?;
        Self::write_header(
            &mut file,
            model,
            Offsets {
                file_size,
                params,
                outcomes,
                preds,
            },
        )?;
        file.flush()?;
        Ok(())
    }

    fn write_header(file: &mut File, model: &MaxentModel, offsets: Offsets) -> io::Result<()> {
        let num_params: usize = model.params().iter().map(Context::len).sum();
        file.write_all(MAGIC)?;
        file.write_all(&offsets.file_size.to_le_bytes())?;
        file.write_all(model.model_type().tag())?;
        file.write_all(&VERSION.to_le_bytes())?;
        file.write_all(&to_u32(model.num_preds() as u64, "predicate count")?.to_le_bytes())?;
        file.write_all(&to_u32(model.num_outcomes() as u64, "outcome count")?.to_le_bytes())?;
        file.write_all(&to_u32(num_params as u64, "parameter count")?.to_le_bytes())?;
        file.write_all(&offsets.params.to_le_bytes())?;
        file.write_all(&offsets.outcomes.to_le_bytes())?;
        file.write_all(&offsets.preds.to_le_bytes())?;
        Ok(())
    }

    fn write_params(file: &mut File, params: &[Context]) -> io::Result<()> {
        let body: usize = params.iter().map(|ctx| 4 + ctx.len() * 12).sum();
        let chunk_size = to_u32((CHUNK_SIZE + body) as u64, "parameter chunk")?;

        file.write_all(b"PARM")?;
        file.write_all(&chunk_size.to_le_bytes())?;
        file.write_all(&to_u32(params.len() as u64, "predicate count")?.to_le_bytes())?;

        for context in params {
            file.write_all(&to_u32(context.len() as u64, "active outcome count")?.to_le_bytes())?;
            for &oid in context.outcomes() {
                file.write_all(&to_u32(oid as u64, "outcome id")?.to_le_bytes())?;
            }
            for &weight in context.parameters() {
                file.write_all(&weight.to_le_bytes())?;
            }
        }
        Ok(())
    }

    fn write_cqdb(file: &mut File, labels: &[String]) -> io::Result<()> {
        let mut writer = CQDBWriter::new(file)?;
        for (id, label) in labels.iter().enumerate() {
            writer.put(label.as_str(), id as u32)?;
        }
        // The database is finalized when the writer is dropped
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::all_outcomes_pattern;
    use crate::model::ModelType;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_write_and_read_back() {
        let params = vec![
            Context::new(all_outcomes_pattern(3), vec![0.5, -1.25, 2.0]),
            Context::new(vec![2usize].into(), vec![0.75]),
            Context::new(vec![0usize, 1].into(), vec![-0.5, 1e-3]),
        ];
        let model = MaxentModel::new(
            ModelType::Maxent,
            params,
            labels(&["cat", "dog", "mouse"]),
            labels(&["X", "Y", "Z"]),
        );

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        ModelWriter::write(&path, &model).unwrap();

        let buf = std::fs::read(&path).unwrap();
        assert_eq!(&buf[0..4], MAGIC);
        assert_eq!(&buf[8..12], b"GIS_");
        // Active outcome count of the first context follows the PARM header
        assert_eq!(&buf[HEADER_SIZE + CHUNK_SIZE..HEADER_SIZE + CHUNK_SIZE + 4], &3u32.to_le_bytes());
        let loaded = MaxentModel::from_bytes(&buf).unwrap();
        assert_eq!(loaded, model);
        assert_eq!(loaded.pred_index("dog"), Some(1));
    }

    #[test]
    fn test_truncated_file_is_rejected() {
        let model = MaxentModel::new(
            ModelType::Perceptron,
            vec![Context::new(all_outcomes_pattern(2), vec![1.0, -1.0])],
            labels(&["p"]),
            labels(&["A", "B"]),
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        ModelWriter::write(&path, &model).unwrap();

        let buf = std::fs::read(&path).unwrap();
        assert!(MaxentModel::from_bytes(&buf[..buf.len() - 1]).is_err());
    }
}
