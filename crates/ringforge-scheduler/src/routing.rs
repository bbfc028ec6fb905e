//! Capability routing.
//!
//! Candidates must cover the task's required capabilities (an empty
//! requirement matches all) and be `online`, or `busy` under the load
//! threshold. Ties break on the sort tuple
//! `(state_priority, region_affinity, load)` ascending, so same-region
//! online agents with the least load win.

use ringforge_core::{AgentId, HubError, HubResult, PresenceEntry, PresenceState, Task};

/// Busy agents at or past this load are ineligible.
const BUSY_LOAD_CEILING: f64 = 0.8;

/// Region affinity cost for a non-local candidate.
const REMOTE_AFFINITY: f64 = 0.5;

fn state_priority(state: PresenceState) -> Option<f64> {
    match state {
        PresenceState::Online => Some(0.0),
        PresenceState::Busy => Some(1.0),
        PresenceState::Away | PresenceState::Offline => None,
    }
}

fn region_affinity(entry: &PresenceEntry, local_region: &str) -> f64 {
    if local_region == "local" {
        // Dev mode: everything counts as local.
        return 0.0;
    }
    match entry.region() {
        Some(region) if region == local_region => 0.0,
        _ => REMOTE_AFFINITY,
    }
}

/// Pick the best eligible agent for a task from a fleet roster.
///
/// # Errors
///
/// [`HubError::NoCapableAgent`] when no candidate passes the capability and
/// eligibility filters.
pub fn route_task(
    task: &Task,
    roster: &[PresenceEntry],
    local_region: &str,
) -> HubResult<AgentId> {
    let mut best: Option<(f64, f64, f64, &PresenceEntry)> = None;

    for entry in roster {
        if !task
            .capabilities_required
            .iter()
            .all(|cap| entry.capabilities.contains(cap))
        {
            continue;
        }
        let Some(priority) = state_priority(entry.state) else {
            continue;
        };
        if entry.state == PresenceState::Busy && entry.load >= BUSY_LOAD_CEILING {
            continue;
        }

        let key = (priority, region_affinity(entry, local_region), entry.load);
        let better = match &best {
            None => true,
            Some((p, a, l, _)) => {
                (key.0, key.1, key.2) < (*p, *a, *l)
            }
        };
        if better {
            best = Some((key.0, key.1, key.2, entry));
        }
    }

    best.map(|(_, _, _, entry)| entry.agent_id.clone())
        .ok_or(HubError::NoCapableAgent)
}
