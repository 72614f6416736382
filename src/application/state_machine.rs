//! C4: the one place a record's status is allowed to change (§4.3).
//! Every other service routes status writes through here so the
//! transition table in `domain::models::record` is the single source of
//! truth.

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::models::RecordStatus;

/// Checked transition: rejects anything [`RecordStatus::can_transition_to`]
/// does not allow.
pub fn transition(from: RecordStatus, to: RecordStatus) -> CoreResult<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        })
    }
}
