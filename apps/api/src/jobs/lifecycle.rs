use crate::models::job::JobStatus;

/// Job status machine: open ⇄ closed, both may be archived, archived is
/// terminal. Same-status writes are accepted as no-ops.
pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    use JobStatus::*;
    from == to
        || matches!(
            (from, to),
            (Open, Closed) | (Closed, Open) | (Open, Archived) | (Closed, Archived)
        )
}

pub fn transition_error(from: JobStatus, to: JobStatus) -> String {
    format!(
        "Status cannot change from {} to {}",
        from.as_str(),
        to.as_str()
    )
}

/// The closed-job fan-out fires only on an actual open → closed change, so
/// re-closing an already-closed job notifies nobody.
pub fn triggers_close_fanout(previous: JobStatus, new: JobStatus) -> bool {
    previous == JobStatus::Open && new == JobStatus::Closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use JobStatus::*;

    #[test]
    fn open_and_closed_are_interchangeable() {
        assert!(can_transition(Open, Closed));
        assert!(can_transition(Closed, Open));
    }

    #[test]
    fn anything_active_can_be_archived() {
        assert!(can_transition(Open, Archived));
        assert!(can_transition(Closed, Archived));
    }

    #[test]
    fn archived_is_terminal() {
        assert!(!can_transition(Archived, Open));
        assert!(!can_transition(Archived, Closed));
        assert!(can_transition(Archived, Archived));
    }

    #[test]
    fn same_status_is_a_noop_not_an_error() {
        assert!(can_transition(Open, Open));
        assert!(can_transition(Closed, Closed));
    }

    #[test]
    fn fanout_only_on_actual_open_to_closed_change() {
        assert!(triggers_close_fanout(Open, Closed));
        assert!(!triggers_close_fanout(Closed, Closed));
        assert!(!triggers_close_fanout(Closed, Open));
        assert!(!triggers_close_fanout(Open, Archived));
    }

    #[test]
    fn transition_error_names_both_statuses() {
        assert_eq!(
            transition_error(Archived, Open),
            "Status cannot change from archived to open"
        );
    }
}
