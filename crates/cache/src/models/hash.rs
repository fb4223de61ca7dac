use crate::record::HashRecord;

#[derive(sqlx::FromRow)]
pub(crate) struct HashRow {
    pub full_path: String,
    pub local_path: String,
    pub hash: String,
}
impl From<HashRow> for HashRecord {
    fn from(row: HashRow) -> Self {
        Self {
            full_path: row.full_path,
            local_path: row.local_path,
            hash: row.hash,
        }
    }
}
