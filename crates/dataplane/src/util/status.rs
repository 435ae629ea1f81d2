use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Condition, Time};

pub const READY_CONDITION: &str = "Ready";
pub const REASON_APPLIED: &str = "DataplaneApplied";
pub const REASON_APPLY_FAILED: &str = "DataplaneApplyFailed";

/// Sets the condition of the same type in `conditions` to `new_condition`.
///
/// Returns the new list and whether anything changed. `last_transition_time` only moves
/// when the status flips or the condition is new.
pub fn set_status_condition(
    conditions: &[Condition],
    mut new_condition: Condition,
) -> (Vec<Condition>, bool) {
    let mut new_conditions = Vec::from(conditions);
    let mut changed = false;

    if let Some(existing) = new_conditions
        .iter_mut()
        .find(|c| c.type_ == new_condition.type_)
    {
        if existing.status != new_condition.status {
            existing.status = new_condition.status;
            existing.last_transition_time = Time(Utc::now());
            changed = true;
        }

        if existing.reason != new_condition.reason {
            existing.reason = new_condition.reason;
            changed = true;
        }

        if existing.message != new_condition.message {
            existing.message = new_condition.message;
            changed = true;
        }

        if existing.observed_generation != new_condition.observed_generation {
            existing.observed_generation = new_condition.observed_generation;
            changed = true;
        }
    } else {
        new_condition.last_transition_time = Time(Utc::now());
        new_conditions.push(new_condition);
        changed = true;
    }

    (new_conditions, changed)
}

/// Finds the condition_type in conditions.
pub fn find_status_condition<'a>(conditions: &'a [Condition], condition_type: &str) -> Option<&'a Condition> {
    conditions
        .iter()
        .find(|condition| condition.type_ == condition_type)
}

/// Returns true when the condition_type is present and set to `True`
pub fn is_status_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_status_condition(conditions, condition_type).is_some_and(|c| c.status == "True")
}

/// Builds the `Ready` condition for one reconciliation pass of the agent.
pub fn ready_condition(generation: Option<i64>, outcome: Result<bool, String>) -> Condition {
    let (status, reason, message) = match outcome {
        Ok(true) => ("True", REASON_APPLIED, "dataplane objects were created or updated".to_string()),
        Ok(false) => ("True", REASON_APPLIED, "dataplane objects are up to date".to_string()),
        Err(message) => ("False", REASON_APPLY_FAILED, message),
    };
    Condition {
        type_: READY_CONDITION.to_string(),
        status: status.to_string(),
        reason: reason.to_string(),
        message,
        last_transition_time: Time(Utc::now()),
        observed_generation: generation,
    }
}
