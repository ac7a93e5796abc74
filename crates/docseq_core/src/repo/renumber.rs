//! Position renumbering under an eager `UNIQUE(document_uuid, position)`.
//!
//! # Responsibility
//! - Apply a target position plan for one document one row at a time.
//! - Never let two rows share a position between any two statements.
//!
//! # Invariants
//! - Must run inside the caller's transaction; it never commits.
//! - Plans are checked before the first write; a plan that cannot settle
//!   into distinct free positions is rejected without touching any row.
//! - Rows already at their target are not written.

use crate::model::document::DocumentId;
use crate::model::node::NodeId;
use crate::repo::node_repo::{parse_uuid, NodeRepoError, NodeRepoResult};
use log::debug;
use rusqlite::{params, Connection};
use std::collections::{HashMap, HashSet};

/// How a plan was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenumberStrategy {
    /// Every row was already in place.
    Noop,
    /// All rows move down; written in ascending target order.
    DirectAscending,
    /// All rows move up; written in descending target order.
    DirectDescending,
    /// Rows move both ways; parked above every live and target position
    /// first, then settled.
    TwoPhase,
}

impl RenumberStrategy {
    fn as_str(self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::DirectAscending => "direct_ascending",
            Self::DirectDescending => "direct_descending",
            Self::TwoPhase => "two_phase",
        }
    }
}

/// Outcome of one renumbering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenumberReport {
    /// Rows whose final position differs from their starting one.
    pub rows_moved: usize,
    pub strategy: RenumberStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlannedMove {
    pub node_uuid: NodeId,
    pub from: i64,
    pub to: i64,
}

/// Moves rows of `document_uuid` to the positions given in `plan`.
///
/// Rows not named in `plan` keep their position and must not be targeted.
pub fn renumber(
    conn: &Connection,
    document_uuid: DocumentId,
    plan: &[(NodeId, i64)],
) -> NodeRepoResult<RenumberReport> {
    let current = load_positions(conn, document_uuid)?;
    let moves = plan_moves(&current, plan)?;
    let strategy = choose_strategy(&moves);

    match strategy {
        RenumberStrategy::Noop => {}
        RenumberStrategy::DirectAscending => {
            let mut ordered = moves.clone();
            ordered.sort_by_key(|planned| planned.to);
            for planned in &ordered {
                write_position(conn, document_uuid, planned.node_uuid, planned.to)?;
            }
        }
        RenumberStrategy::DirectDescending => {
            let mut ordered = moves.clone();
            ordered.sort_by_key(|planned| std::cmp::Reverse(planned.to));
            for planned in &ordered {
                write_position(conn, document_uuid, planned.node_uuid, planned.to)?;
            }
        }
        RenumberStrategy::TwoPhase => {
            let base = escape_base(&current, &moves);
            for (offset, planned) in moves.iter().enumerate() {
                write_position(conn, document_uuid, planned.node_uuid, base + offset as i64)?;
            }
            let mut ordered = moves.clone();
            ordered.sort_by_key(|planned| planned.to);
            for planned in &ordered {
                write_position(conn, document_uuid, planned.node_uuid, planned.to)?;
            }
        }
    }

    debug!(
        "event=renumber module=repo status=ok document={} rows_planned={} rows_moved={} strategy={}",
        document_uuid,
        plan.len(),
        moves.len(),
        strategy.as_str()
    );
    Ok(RenumberReport {
        rows_moved: moves.len(),
        strategy,
    })
}

/// Plan that packs `ordered` into `start, start + 1, ...`.
pub fn dense_plan(ordered: &[NodeId], start: i64) -> Vec<(NodeId, i64)> {
    ordered
        .iter()
        .enumerate()
        .map(|(index, node_uuid)| (*node_uuid, start + index as i64))
        .collect()
}

pub(crate) fn plan_moves(
    current: &[(NodeId, i64)],
    plan: &[(NodeId, i64)],
) -> NodeRepoResult<Vec<PlannedMove>> {
    let positions: HashMap<NodeId, i64> = current.iter().copied().collect();
    let mut planned_ids = HashSet::with_capacity(plan.len());
    let mut targets = HashSet::with_capacity(plan.len());
    let mut moves = Vec::new();

    for &(node_uuid, to) in plan {
        let Some(&from) = positions.get(&node_uuid) else {
            return Err(NodeRepoError::ConstraintViolation(format!(
                "renumber plan names node {node_uuid} outside the document"
            )));
        };
        if to < 0 {
            return Err(NodeRepoError::ConstraintViolation(format!(
                "renumber plan assigns negative position {to} to node {node_uuid}"
            )));
        }
        if !planned_ids.insert(node_uuid) {
            return Err(NodeRepoError::ConstraintViolation(format!(
                "renumber plan names node {node_uuid} twice"
            )));
        }
        if !targets.insert(to) {
            return Err(NodeRepoError::ConstraintViolation(format!(
                "renumber plan assigns position {to} twice"
            )));
        }
        if from != to {
            moves.push(PlannedMove {
                node_uuid,
                from,
                to,
            });
        }
    }

    if let Some((node_uuid, position)) = current
        .iter()
        .find(|(node_uuid, position)| !planned_ids.contains(node_uuid) && targets.contains(position))
    {
        return Err(NodeRepoError::ConstraintViolation(format!(
            "renumber plan targets position {position} held by unplanned node {node_uuid}"
        )));
    }

    Ok(moves)
}

pub(crate) fn choose_strategy(moves: &[PlannedMove]) -> RenumberStrategy {
    if moves.is_empty() {
        RenumberStrategy::Noop
    } else if moves.iter().all(|planned| planned.to < planned.from) {
        RenumberStrategy::DirectAscending
    } else if moves.iter().all(|planned| planned.to > planned.from) {
        RenumberStrategy::DirectDescending
    } else {
        RenumberStrategy::TwoPhase
    }
}

fn escape_base(current: &[(NodeId, i64)], moves: &[PlannedMove]) -> i64 {
    let live_max = current.iter().map(|(_, position)| *position).max().unwrap_or(-1);
    let target_max = moves.iter().map(|planned| planned.to).max().unwrap_or(-1);
    live_max.max(target_max) + 1
}

fn load_positions(conn: &Connection, document_uuid: DocumentId) -> NodeRepoResult<Vec<(NodeId, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT node_uuid, position
         FROM nodes
         WHERE document_uuid = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([document_uuid.to_string()])?;
    let mut positions = Vec::new();
    while let Some(row) = rows.next()? {
        let text: String = row.get(0)?;
        positions.push((parse_uuid(&text, "nodes.node_uuid")?, row.get(1)?));
    }
    Ok(positions)
}

fn write_position(
    conn: &Connection,
    document_uuid: DocumentId,
    node_uuid: NodeId,
    position: i64,
) -> NodeRepoResult<()> {
    let changed = conn.execute(
        "UPDATE nodes
         SET position = ?3
         WHERE node_uuid = ?1
           AND document_uuid = ?2;",
        params![node_uuid.to_string(), document_uuid.to_string(), position],
    )?;
    if changed != 1 {
        return Err(NodeRepoError::NodeNotFound(node_uuid));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{choose_strategy, dense_plan, plan_moves, RenumberStrategy};
    use crate::repo::node_repo::NodeRepoError;
    use uuid::Uuid;

    fn ids(count: usize) -> Vec<Uuid> {
        (0..count).map(|_| Uuid::new_v4()).collect()
    }

    fn current(ids: &[Uuid]) -> Vec<(Uuid, i64)> {
        dense_plan(ids, 0)
    }

    #[test]
    fn shift_up_after_insert_point_is_direct_descending() {
        let ids = ids(4);
        let plan: Vec<(Uuid, i64)> = ids[1..]
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index as i64 + 2))
            .collect();
        let moves = plan_moves(&current(&ids), &plan).unwrap();
        assert_eq!(moves.len(), 3);
        assert_eq!(choose_strategy(&moves), RenumberStrategy::DirectDescending);
    }

    #[test]
    fn gap_closing_is_direct_ascending() {
        let ids = ids(4);
        let survivors = [ids[0], ids[2], ids[3]];
        let remaining: Vec<(Uuid, i64)> = current(&ids)
            .into_iter()
            .filter(|(id, _)| *id != ids[1])
            .collect();
        let moves = plan_moves(&remaining, &dense_plan(&survivors, 0)).unwrap();
        assert_eq!(moves.len(), 2);
        assert_eq!(choose_strategy(&moves), RenumberStrategy::DirectAscending);
    }

    #[test]
    fn permutation_needs_two_phases() {
        let ids = ids(3);
        let moves = plan_moves(&current(&ids), &dense_plan(&[ids[2], ids[0], ids[1]], 0)).unwrap();
        assert_eq!(choose_strategy(&moves), RenumberStrategy::TwoPhase);
    }

    #[test]
    fn unchanged_plan_is_noop() {
        let ids = ids(3);
        let moves = plan_moves(&current(&ids), &dense_plan(&ids, 0)).unwrap();
        assert!(moves.is_empty());
        assert_eq!(choose_strategy(&moves), RenumberStrategy::Noop);
    }

    #[test]
    fn plan_colliding_with_unplanned_row_is_rejected() {
        let ids = ids(3);
        let err = plan_moves(&current(&ids), &[(ids[2], 0)]).unwrap_err();
        assert!(matches!(err, NodeRepoError::ConstraintViolation(_)));
    }

    #[test]
    fn duplicate_targets_and_foreign_nodes_are_rejected() {
        let ids = ids(2);
        let err = plan_moves(&current(&ids), &[(ids[0], 1), (ids[1], 1)]).unwrap_err();
        assert!(matches!(err, NodeRepoError::ConstraintViolation(_)));

        let err = plan_moves(&current(&ids), &[(Uuid::new_v4(), 5)]).unwrap_err();
        assert!(matches!(err, NodeRepoError::ConstraintViolation(_)));

        let err = plan_moves(&current(&ids), &[(ids[0], -1)]).unwrap_err();
        assert!(matches!(err, NodeRepoError::ConstraintViolation(_)));
    }
}
