use crate::error::{Error, ErrorKind};
use crate::record::{FileKey, ReferenceRecord};
use exn::ResultExt;

/// A reference row joined with the identity of the file that owns it.
#[derive(sqlx::FromRow)]
pub(crate) struct ReferenceRow {
    pub path: String,
    pub local_path: String,
    pub value: String,
    pub offset: i64,
    pub length: i64,
    pub morph_name: Option<String>,
    pub internal_id: Option<String>,
}
impl TryFrom<ReferenceRow> for (FileKey, ReferenceRecord) {
    type Error = Error;
    fn try_from(row: ReferenceRow) -> Result<Self, Self::Error> {
        let reference = ReferenceRecord {
            value: row.value,
            offset: usize::try_from(row.offset).or_raise(|| ErrorKind::InvalidData("reference offset"))?,
            length: usize::try_from(row.length).or_raise(|| ErrorKind::InvalidData("reference length"))?,
            morph_name: row.morph_name,
            internal_id: row.internal_id,
        };
        Ok((FileKey::new(row.path, row.local_path), reference))
    }
}
