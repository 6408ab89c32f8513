//! Metadata table codec
//!
//! One CSV row per stored vector: `index, source, row_index, column, text`.
//! `column` is empty for row-mode and attribute records.

use simgraph_core::{Error, MetadataRecord, Result};

pub fn encode(records: &[MetadataRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    if records.is_empty() {
        writer.write_record(["index", "source", "row_index", "column", "text"])?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Serialization(format!("metadata flush: {e}")))
}

pub fn decode(data: &[u8]) -> Result<Vec<MetadataRecord>> {
    let mut reader = csv::Reader::from_reader(data);
    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<MetadataRecord>().enumerate() {
        let record = row.map_err(|e| Error::Persistence(format!("metadata row {i}: {e}")))?;
        if record.index != i {
            return Err(Error::Persistence(format!(
                "metadata row {i} carries index {}, rows must be in index order",
                record.index
            )));
        }
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simgraph_core::SourceKind;

    #[test]
    fn test_csv_layout() {
        let records = vec![
            MetadataRecord::row(0, 3, "course_title: Intro | description: a, b"),
            MetadataRecord::cell(1, 4, "description", "multi\nline"),
        ];
        let bytes = encode(&records).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("index,source,row_index,column,text\n"));
        assert!(text.contains("0,row,3,,"));

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, records);
        assert_eq!(decoded[0].column, None);
        assert_eq!(decoded[1].source, SourceKind::Cell);
    }

    #[test]
    fn test_out_of_order_index_rejected() {
        let data = b"index,source,row_index,column,text\n1,row,0,,x\n";
        assert!(matches!(decode(data), Err(Error::Persistence(_))));
    }
}
