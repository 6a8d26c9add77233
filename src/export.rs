//! Text export
//!
//! Dumps every category, then every note, as INI-style blocks:
//!
//! ```text
//! [CAT-1]
//! unit=kWh
//! fractionalDigits=2
//!
//! [notes.CAT-1.1700000000]
//! description=meter swapped
//! ```

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::model::key::SEPARATOR;
use crate::model::{Category, ModelResult, Note};
use crate::storage::Store;

/// Write all categories and notes to `out`; returns the number of blocks
///
/// Nested value records turn up in a category scan with dotted names and
/// are left out.
pub async fn export_text<W>(store: &dyn Store, out: &mut W) -> ModelResult<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut blocks = 0;

    let mut categories = Category::entries(store).await?;
    while let Some(category) = categories.next().await? {
        if category.name().contains(SEPARATOR) {
            continue;
        }
        category.write_as_text(out).await?;
        blocks += 1;
    }

    let mut notes = Note::entries(store).await?;
    while let Some(note) = notes.next().await? {
        note.write_as_text(out).await?;
        blocks += 1;
    }

    out.flush().await?;
    tracing::debug!(blocks, "exported store as text");
    Ok(blocks)
}
