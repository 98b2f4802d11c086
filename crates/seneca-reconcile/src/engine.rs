//! CREATE / UPDATE classification

use crate::state::DisplayState;
use seneca_record::{RecordKind, ResultRecord};

/// Display decision for one record
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileEvent {
    /// First record from a routine: add its titled list container
    IntroduceRoutine {
        /// Routine file
        routine_file: String,
    },
    /// Element not yet on screen
    Create(ResultRecord),
    /// Element already on screen
    Update(ResultRecord),
    /// Plot carrying table data for the first time: add its companion table
    CreateCompanion(ResultRecord),
    /// Companion table already on screen
    UpdateCompanion(ResultRecord),
    /// Status text from a routine
    Message {
        /// Routine file
        routine_file: String,
        /// Message text
        text: String,
    },
    /// Routine finished
    Complete {
        /// Routine file
        routine_file: String,
    },
}

impl ReconcileEvent {
    /// Short label for logs
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::IntroduceRoutine { .. } => "introduce",
            Self::Create(_) => "create",
            Self::Update(_) => "update",
            Self::CreateCompanion(_) => "create_companion",
            Self::UpdateCompanion(_) => "update_companion",
            Self::Message { .. } => "message",
            Self::Complete { .. } => "complete",
        }
    }
}

/// Classify deduplicated records against the rendered state
///
/// Records are processed in order. A routine seen for the first time gets
/// exactly one introduction, emitted immediately before its first CREATE.
/// A plot's table data follows its plot event, as a companion CREATE the
/// first time any version of the plot carries data. Messages and completion
/// markers never touch `state`.
pub fn reconcile(
    state: &mut DisplayState,
    records: impl IntoIterator<Item = ResultRecord>,
) -> Vec<ReconcileEvent> {
    let mut events = Vec::new();

    for record in records {
        let Some(key) = record.key() else {
            let routine_file = record.routine_file.clone();
            match record.kind {
                RecordKind::Complete => events.push(ReconcileEvent::Complete { routine_file }),
                _ => events.push(ReconcileEvent::Message {
                    routine_file,
                    text: record.message().unwrap_or_default().to_string(),
                }),
            }
            continue;
        };

        if state.introduce(&key.routine_file) {
            events.push(ReconcileEvent::IntroduceRoutine {
                routine_file: key.routine_file.clone(),
            });
        }

        let routine = state.routine_mut(&key.routine_file);
        let companion = (record.kind != RecordKind::Table && record.table().is_some())
            .then(|| routine.insert_companion(key.clone()));
        let element = if routine.insert(key) {
            ReconcileEvent::Create(record.clone())
        } else {
            ReconcileEvent::Update(record.clone())
        };
        events.push(element);
        match companion {
            Some(true) => events.push(ReconcileEvent::CreateCompanion(record)),
            Some(false) => events.push(ReconcileEvent::UpdateCompanion(record)),
            None => {}
        }
    }

    events
}
