//! Which side of a history row may see it

use crate::core_types::{ActionType, OwnerType};
use crate::models::HistoryRecord;

/// Side of a history row whose organization sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibleSide {
    From,
    To,
    Either,
}

/// Visibility policy per action type
pub const fn visible_side(action: ActionType) -> VisibleSide {
    match action {
        ActionType::Produced
        | ActionType::Shipped
        | ActionType::ReturnSent
        | ActionType::Returned
        | ActionType::Treated
        | ActionType::Disposed => VisibleSide::From,
        ActionType::Received | ActionType::ReturnReceived => VisibleSide::To,
        ActionType::Recalled => VisibleSide::Either,
    }
}

/// Action types shown to `side`, for stores that evaluate the policy in SQL
pub fn actions_for_side(side: VisibleSide) -> Vec<ActionType> {
    ActionType::ALL
        .into_iter()
        .filter(|action| visible_side(*action) == side)
        .collect()
}

/// True if `organization_id` may see `row`
pub fn is_visible(row: &HistoryRecord, organization_id: &str) -> bool {
    let on_from = row.from_owner.owner_type == OwnerType::Organization
        && row.from_owner.id == organization_id;
    let on_to =
        row.to_owner.owner_type == OwnerType::Organization && row.to_owner.id == organization_id;

    match visible_side(row.action_type) {
        VisibleSide::From => on_from,
        VisibleSide::To => on_to,
        VisibleSide::Either => on_from || on_to,
    }
}
