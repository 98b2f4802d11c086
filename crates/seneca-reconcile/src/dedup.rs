//! Per-tick deduplication
//!
//! A routine may write several versions of the same plot between two ticks;
//! only the final one needs to reach the browser.

use indexmap::map::Entry;
use indexmap::IndexMap;
use seneca_record::{RecordKey, ResultRecord};

#[derive(Debug, PartialEq, Eq, Hash)]
enum Slot {
    Keyed(RecordKey),
    /// Records without identity keep their own slot
    Passthrough(usize),
}

/// Collapse records sharing an identity key
///
/// Each key keeps the record with the highest `sequence_counter` (ties go to
/// the later record), placed where the key first appeared. Messages and
/// completion markers pass through in place. Running it on its own output
/// changes nothing.
pub fn dedup(records: impl IntoIterator<Item = ResultRecord>) -> Vec<ResultRecord> {
    let mut slots: IndexMap<Slot, ResultRecord> = IndexMap::new();

    for (pos, record) in records.into_iter().enumerate() {
        let Some(key) = record.key() else {
            slots.insert(Slot::Passthrough(pos), record);
            continue;
        };
        match slots.entry(Slot::Keyed(key)) {
            Entry::Occupied(mut slot) => {
                if record.sequence_counter >= slot.get().sequence_counter {
                    slot.insert(record);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
    }

    slots.into_values().collect()
}
