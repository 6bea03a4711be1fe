//! Mutation lifecycle wired to an optimistic list, the way a screen uses it.

use pitstop_client::{EntityLocks, Mutation};
use pitstop_engine::{OptimisticList, OptimisticUpdate};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

type Jobs = Arc<Mutex<OptimisticList<Value>>>;

fn jobs() -> Jobs {
    Arc::new(Mutex::new(OptimisticList::with_data(vec![
        json!({"id": "job-1", "status": "pending"}),
        json!({"id": "job-2", "status": "pending"}),
    ])))
}

fn status(jobs: &Jobs, id: &str) -> Value {
    let list = jobs.lock().unwrap();
    list.data()
        .iter()
        .find(|j| j["id"] == id)
        .map(|j| j["status"].clone())
        .unwrap_or(Value::Null)
}

/// Status change for one job: (job id, new status, operation id).
type StatusChange = (String, String, String);

fn status_mutation(jobs: &Jobs, server_accepts: bool) -> Mutation<StatusChange, Value, String> {
    let on_mutate_jobs = jobs.clone();
    let on_success_jobs = jobs.clone();

    Mutation::new(move |(job_id, status, _op): StatusChange| async move {
        if server_accepts {
            Ok(json!({"id": job_id, "status": status}))
        } else {
            Err(format!("server rejected {job_id}"))
        }
    })
    .on_mutate(move |(job_id, status, op_id): &StatusChange| {
        on_mutate_jobs
            .lock()
            .unwrap()
            .add_optimistic_update(OptimisticUpdate::update(
                op_id.clone(),
                json!({"id": job_id, "status": status}),
                0,
            ))
            .unwrap();
    })
    .on_success(move |_, (_, _, op_id): &StatusChange| {
        on_success_jobs.lock().unwrap().confirm_update(op_id);
    })
}

fn change(job: &str, status: &str, op: &str) -> StatusChange {
    (job.to_string(), status.to_string(), op.to_string())
}

#[tokio::test]
async fn accepted_mutation_is_confirmed() {
    let jobs = jobs();
    let mutation = status_mutation(&jobs, true);

    mutation.mutate(change("job-1", "accepted", "op-1")).await.unwrap();

    assert_eq!(status(&jobs, "job-1"), "accepted");
    assert!(!jobs.lock().unwrap().has_pending_updates());
}

#[tokio::test]
async fn rejected_mutation_rolls_back() {
    let jobs = jobs();
    let mutation = status_mutation(&jobs, false);

    let rollback_jobs = jobs.clone();
    mutation.set_rollback(move || {
        rollback_jobs.lock().unwrap().rollback_update("op-1");
    });

    let result = mutation.mutate(change("job-1", "accepted", "op-1")).await;

    assert_eq!(result, Err("server rejected job-1".to_string()));
    assert_eq!(status(&jobs, "job-1"), "pending");
    assert!(!jobs.lock().unwrap().has_pending_updates());
}

#[tokio::test]
async fn serialized_mutations_on_one_entity_roll_back_cleanly() {
    let jobs = jobs();
    let accept = status_mutation(&jobs, true);
    let reject = status_mutation(&jobs, false);
    let locks = EntityLocks::new();

    let rollback_jobs = jobs.clone();
    reject.set_rollback(move || {
        rollback_jobs.lock().unwrap().rollback_update("op-2");
    });

    let (first, second) = tokio::join!(
        accept.mutate_exclusive(&locks, "job-1", change("job-1", "accepted", "op-1")),
        reject.mutate_exclusive(&locks, "job-1", change("job-1", "cancelled", "op-2")),
    );

    assert!(first.is_ok());
    assert!(second.is_err());
    // The rejected change rolls back to the confirmed one, not the original.
    assert_eq!(status(&jobs, "job-1"), "accepted");
    assert_eq!(status(&jobs, "job-2"), "pending");
}
