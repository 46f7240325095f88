use serde::{Deserialize, Serialize};

use super::queue::{IssueChanged, Scheduler};
use crate::error::Result;
use crate::issues::IssueId;

/// Journals attached to issues carry this type
pub const ISSUE_JOURNAL_TYPE: &str = "Issue";

/// Something that happened in the tracker and may affect an issue's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    IssueCreated {
        issue_id: IssueId,
    },
    IssueEdited {
        issue_id: IssueId,
    },
    JournalCreated {
        journalized_type: String,
        journalized_id: IssueId,
    },
    JournalEdited {
        journalized_type: String,
        journalized_id: IssueId,
    },
    TimeEntrySaved {
        issue_id: Option<IssueId>,
    },
}

impl HostEvent {
    /// The issue whose content this event touches, if any.
    pub fn affected_issue(&self) -> Option<IssueId> {
        match self {
            HostEvent::IssueCreated { issue_id } | HostEvent::IssueEdited { issue_id } => {
                Some(*issue_id)
            }
            HostEvent::JournalCreated {
                journalized_type,
                journalized_id,
            }
            | HostEvent::JournalEdited {
                journalized_type,
                journalized_id,
            } => (journalized_type == ISSUE_JOURNAL_TYPE).then_some(*journalized_id),
            HostEvent::TimeEntrySaved { issue_id } => *issue_id,
        }
    }
}

/// Turns tracker events into indexing work. Holds no state beyond the enabled flag.
#[derive(Debug, Clone, Copy)]
pub struct IssueHooks {
    enabled: bool,
}

impl IssueHooks {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Schedule re-indexing for the issue `event` touches.
    /// Returns the scheduled event, or `None` when nothing was scheduled.
    pub fn dispatch<Q>(&self, event: &HostEvent, scheduler: &Q) -> Result<Option<IssueChanged>>
    where
        Q: Scheduler + ?Sized,
    {
        if !self.enabled {
            return Ok(None);
        }
        let Some(issue_id) = event.affected_issue() else {
            return Ok(None);
        };

        let changed = IssueChanged { issue_id };
        scheduler.schedule(changed)?;
        tracing::debug!(issue_id, ?event, "scheduled embedding update");
        Ok(Some(changed))
    }
}
