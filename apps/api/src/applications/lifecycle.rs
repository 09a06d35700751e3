use crate::models::application::ApplicationStatus;
use crate::models::job::JobStatus;
use crate::validation::Validator;

/// Poster-side step: pending → reviewing → interviewed → accepted | rejected.
/// Reviewing and interviewed are ordered review stages with a fixed
/// predecessor; accept and reject may be issued from any active state.
pub fn poster_transition(
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> Result<(), String> {
    use ApplicationStatus::*;

    if !from.is_active() {
        return Err(format!(
            "Status cannot change, application is already {}",
            from.as_str()
        ));
    }

    let allowed = match to {
        Reviewing => from == Pending,
        Interviewed => from == Reviewing,
        Accepted | Rejected => true,
        Pending | Withdrawn => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(format!(
            "Status cannot change from {} to {}",
            from.as_str(),
            to.as_str()
        ))
    }
}

/// Applicant-side withdrawal, only from an active state.
pub fn withdraw(from: ApplicationStatus) -> Result<(), String> {
    if from.is_active() {
        Ok(())
    } else {
        Err(format!(
            "Status cannot change, application is already {}",
            from.as_str()
        ))
    }
}

/// Creation-time invariants: the job must be open and the (user, job) pair
/// must be unused. The applicant-capability check is an authorization concern
/// handled before this runs.
pub fn validate_create(v: &mut Validator, job_status: JobStatus, already_applied: bool) {
    if job_status != JobStatus::Open {
        v.add("Job is no longer open for applications");
    }
    if already_applied {
        v.add("You have already applied to this job");
    }
}

pub const DUPLICATE_APPLICATION_ERROR: &str = "You have already applied to this job";

#[cfg(test)]
mod tests {
    use super::*;
    use ApplicationStatus::*;

    #[test]
    fn review_only_from_pending() {
        assert!(poster_transition(Pending, Reviewing).is_ok());
        assert!(poster_transition(Reviewing, Reviewing).is_err());
        assert!(poster_transition(Interviewed, Reviewing).is_err());
    }

    #[test]
    fn interview_only_from_reviewing() {
        assert!(poster_transition(Reviewing, Interviewed).is_ok());
        assert!(poster_transition(Pending, Interviewed).is_err());
    }

    #[test]
    fn accept_and_reject_from_any_active_state() {
        for from in [Pending, Reviewing, Interviewed] {
            assert!(poster_transition(from, Accepted).is_ok());
            assert!(poster_transition(from, Rejected).is_ok());
        }
    }

    #[test]
    fn terminal_states_refuse_further_transitions() {
        for from in [Accepted, Rejected, Withdrawn] {
            for to in [Reviewing, Interviewed, Accepted, Rejected] {
                let err = poster_transition(from, to).unwrap_err();
                assert!(err.contains(from.as_str()), "{err}");
            }
        }
    }

    #[test]
    fn poster_cannot_withdraw_or_reset_to_pending() {
        assert!(poster_transition(Pending, Withdrawn).is_err());
        assert!(poster_transition(Reviewing, Pending).is_err());
    }

    #[test]
    fn withdraw_only_from_active() {
        for from in [Pending, Reviewing, Interviewed] {
            assert!(withdraw(from).is_ok());
        }
        for from in [Accepted, Rejected, Withdrawn] {
            assert!(withdraw(from).is_err());
        }
    }

    #[test]
    fn create_rejects_non_open_job() {
        for status in [JobStatus::Closed, JobStatus::Archived] {
            let mut v = Validator::new();
            validate_create(&mut v, status, false);
            assert_eq!(
                v.finish().unwrap_err().to_string(),
                "Validation error: Job is no longer open for applications"
            );
        }
    }

    #[test]
    fn create_rejects_duplicate_pair() {
        let mut v = Validator::new();
        validate_create(&mut v, JobStatus::Open, true);
        assert_eq!(
            v.finish().unwrap_err().to_string(),
            format!("Validation error: {DUPLICATE_APPLICATION_ERROR}")
        );
    }

    #[test]
    fn create_passes_open_job_fresh_pair() {
        let mut v = Validator::new();
        validate_create(&mut v, JobStatus::Open, false);
        assert!(v.finish().is_ok());
    }
}
