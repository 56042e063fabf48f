//! Domain model structs and DTOs.
//!
//! Row structs implement `FromRow` by hand so that lookup ids and text
//! discriminants decode straight into the typed enums from `vidintel-core`.

pub mod ai_result;
pub mod task;
pub mod video;

/// Build a column decode error for a value that does not map to an enum.
pub(crate) fn decode_error(
    column: &str,
    source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: source.into(),
    }
}
