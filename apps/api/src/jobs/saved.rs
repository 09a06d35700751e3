use uuid::Uuid;

/// Outcome of a save/unsave on the caller's bookmark set. Both operations are
/// idempotent: a no-op still answers 200 with an informational message.
#[derive(Debug, PartialEq, Eq)]
pub enum SavedSetChange {
    Changed(Vec<String>),
    NoOp(&'static str),
}

pub fn is_saved(saved_jobs: &[String], job_id: Uuid) -> bool {
    let id = job_id.to_string();
    saved_jobs.iter().any(|s| s == &id)
}

pub fn save(saved_jobs: &[String], job_id: Uuid) -> SavedSetChange {
    if is_saved(saved_jobs, job_id) {
        return SavedSetChange::NoOp("Job already saved");
    }
    let mut updated = saved_jobs.to_vec();
    updated.push(job_id.to_string());
    SavedSetChange::Changed(updated)
}

pub fn unsave(saved_jobs: &[String], job_id: Uuid) -> SavedSetChange {
    if !is_saved(saved_jobs, job_id) {
        return SavedSetChange::NoOp("Job is not in saved jobs");
    }
    let id = job_id.to_string();
    let updated = saved_jobs.iter().filter(|s| *s != &id).cloned().collect();
    SavedSetChange::Changed(updated)
}

/// Parses the stored id strings, dropping anything unparseable.
pub fn saved_job_ids(saved_jobs: &[String]) -> Vec<Uuid> {
    saved_jobs
        .iter()
        .filter_map(|s| Uuid::parse_str(s).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_appends_once() {
        let id = Uuid::new_v4();
        let SavedSetChange::Changed(set) = save(&[], id) else {
            panic!("expected a change");
        };
        assert_eq!(set, vec![id.to_string()]);

        match save(&set, id) {
            SavedSetChange::NoOp(msg) => assert_eq!(msg, "Job already saved"),
            other => panic!("expected no-op, got {other:?}"),
        }
    }

    #[test]
    fn unsave_removes_only_the_target() {
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        let set = vec![keep.to_string(), drop.to_string()];
        let SavedSetChange::Changed(updated) = unsave(&set, drop) else {
            panic!("expected a change");
        };
        assert_eq!(updated, vec![keep.to_string()]);
    }

    #[test]
    fn unsave_after_emptying_the_set_stays_a_noop() {
        let id = Uuid::new_v4();
        let SavedSetChange::Changed(set) = save(&[], id) else {
            panic!("expected a change");
        };
        let SavedSetChange::Changed(emptied) = unsave(&set, id) else {
            panic!("expected a change");
        };
        assert!(emptied.is_empty());
        match unsave(&emptied, id) {
            SavedSetChange::NoOp(msg) => assert_eq!(msg, "Job is not in saved jobs"),
            other => panic!("expected no-op, got {other:?}"),
        }
    }

    #[test]
    fn unsave_of_absent_id_is_a_noop() {
        match unsave(&[], Uuid::new_v4()) {
            SavedSetChange::NoOp(msg) => assert_eq!(msg, "Job is not in saved jobs"),
            other => panic!("expected no-op, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_ids_are_skipped() {
        let good = Uuid::new_v4();
        let stored = vec!["not-a-uuid".to_string(), good.to_string()];
        assert_eq!(saved_job_ids(&stored), vec![good]);
    }
}
