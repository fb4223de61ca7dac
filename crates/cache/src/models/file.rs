use crate::error::{Error, ErrorKind};
use crate::record::FileRecord;
use exn::ResultExt;
use time::UtcDateTime;

#[derive(sqlx::FromRow)]
pub(crate) struct FileRow {
    pub path: String,
    pub local_path: String,
    pub uuid: Option<String>,
    pub file_size: i64,
    pub modified_time: i64,
}
impl TryFrom<&FileRecord> for FileRow {
    type Error = Error;
    fn try_from(file: &FileRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            path: file.path.clone(),
            local_path: file.local_path.clone(),
            uuid: file.uuid.clone(),
            file_size: i64::try_from(file.size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            modified_time: file.modified.unix_timestamp(),
        })
    }
}
impl TryFrom<FileRow> for FileRecord {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            path: row.path,
            local_path: row.local_path,
            uuid: row.uuid,
            size: u64::try_from(row.file_size).or_raise(|| ErrorKind::InvalidData("file size"))?,
            modified: UtcDateTime::from_unix_timestamp(row.modified_time)
                .or_raise(|| ErrorKind::InvalidData("modified time"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_row_to_record() {
        let modified = UtcDateTime::now();
        let row = FileRow {
            path: "/vam/AddonPackages/Author.Pack.1.var".to_string(),
            local_path: "Custom/Clothing/Female/top.vam".to_string(),
            uuid: Some("Author:top".to_string()),
            file_size: 1024,
            modified_time: modified.unix_timestamp(),
        };
        let record = FileRecord::try_from(row).unwrap();
        assert_eq!(record.size, 1024);
        // Converting to a Unix timestamp (measured in seconds) inherently strips the nanoseconds component.
        assert_eq!(record.modified, modified.replace_nanosecond(0).unwrap());
    }

    #[rstest]
    #[case::negative_size(-1, 0, "file size")]
    #[case::out_of_range_time(1, i64::MAX, "modified time")]
    fn test_invalid_rows(#[case] file_size: i64, #[case] modified_time: i64, #[case] field: &str) {
        let row = FileRow {
            path: "/vam/a.vam".to_string(),
            local_path: String::new(),
            uuid: None,
            file_size,
            modified_time,
        };
        let err = FileRecord::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData(f) if *f == field));
    }
}
