// Equi-join between two loaded row sets. The right side is built into a map
// keyed by its join-column value; every left row probes that map and emits
// one output row per match. Output columns are qualified as
// `<table>.<column>`; LEFT emits unmatched left rows with the right side
// absent, RIGHT additionally emits right rows whose keys were never probed.

use crate::common::{Row, RowId, Value};
use crate::execution::{JoinType, OutputRow};
use crate::index::IndexKey;
use std::collections::{BTreeMap, HashSet};

/// One side of a join: its rows plus the join column.
pub struct JoinInput<'a> {
    pub table: &'a str,
    pub rows: &'a [Row],
    pub column: &'a str,
}

pub fn execute_join(left: JoinInput<'_>, right: JoinInput<'_>, join_type: JoinType) -> Vec<OutputRow> {
    // Build phase: right rows bucketed by join key. The ordered map uses the
    // engine-wide value comparison, so keys match across numeric types the
    // same way `=` does.
    let mut built: BTreeMap<IndexKey, Vec<&Row>> = BTreeMap::new();
    for row in right.rows {
        let key = row.get(right.column).cloned().unwrap_or(Value::Null);
        built.entry(IndexKey(key)).or_default().push(row);
    }

    let mut output = Vec::new();
    let mut matched_right: HashSet<RowId> = HashSet::new();

    // Probe phase.
    for row in left.rows {
        let key = IndexKey(row.get(left.column).cloned().unwrap_or(Value::Null));
        match built.get(&key) {
            Some(partners) => {
                for partner in partners {
                    matched_right.insert(partner.row_id);
                    let mut joined = qualify(left.table, row);
                    joined.extend(qualify(right.table, partner));
                    output.push(joined);
                }
            }
            None => {
                if join_type == JoinType::Left {
                    output.push(qualify(left.table, row));
                }
            }
        }
    }

    if join_type == JoinType::Right {
        for row in right.rows {
            if !matched_right.contains(&row.row_id) {
                output.push(qualify(right.table, row));
            }
        }
    }

    output
}

fn qualify(table: &str, row: &Row) -> OutputRow {
    row.values
        .iter()
        .map(|(name, value)| (format!("{}.{}", table, name), value.clone()))
        .collect()
}
