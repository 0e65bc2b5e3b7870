use crate::actual::model::Transaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    TopLevel,
    Split,
}

/// One ledger record whose notes get stamped before the category is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub id: String,
    pub kind: RecordKind,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSet {
    pub records: Vec<ArchiveRecord>,
    pub top_level: usize,
    pub split: usize,
}

impl ArchiveSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Picks every record assigned to `category_id`: transactions categorized
/// directly first, then parts of splits, each group in input order.
///
/// Parts are only inspected on transactions with no category of their own.
pub fn collect_archive_set(transactions: &[Transaction], category_id: &str) -> ArchiveSet {
    let top_level: Vec<ArchiveRecord> = transactions
        .iter()
        .filter(|tx| tx.category_id.as_deref() == Some(category_id))
        .map(|tx| ArchiveRecord {
            id: tx.id.clone(),
            kind: RecordKind::TopLevel,
            notes: tx.notes.clone(),
        })
        .collect();

    let split: Vec<ArchiveRecord> = transactions
        .iter()
        .filter(|tx| tx.category_id.is_none())
        .flat_map(|tx| tx.subtransactions.as_deref().unwrap_or_default())
        .filter(|sub| sub.category_id.as_deref() == Some(category_id))
        .map(|sub| ArchiveRecord {
            id: sub.id.clone(),
            kind: RecordKind::Split,
            notes: sub.notes.clone(),
        })
        .collect();

    let (top_count, split_count) = (top_level.len(), split.len());
    let mut records = top_level;
    records.extend(split);
    ArchiveSet {
        records,
        top_level: top_count,
        split: split_count,
    }
}

/// Provenance stamp written into notes: `[source:<category>] | <notes>`.
/// Missing notes leave the trailing side empty.
pub fn annotate_notes(category_name: &str, existing: Option<&str>) -> String {
    format!("[source:{category_name}] | {}", existing.unwrap_or_default())
}
