//! Deal pipeline rules: the stage catalog, per-stage requirement
//! checklists, and the transition gate. Everything here is pure and
//! synchronous; resolvers and tests call the same functions.

use entity::deal::{self, NegotiationStatus, Stage};

/// Board order. Terminal stages come last and never gate anything.
pub const STAGES: [Stage; 7] = [
    Stage::Discussions,
    Stage::Qualified,
    Stage::Rfq,
    Stage::Offered,
    Stage::Won,
    Stage::Lost,
    Stage::Dropped,
];

pub fn index_of(stage: Stage) -> usize {
    STAGES
        .iter()
        .position(|s| *s == stage)
        .unwrap_or(STAGES.len() - 1)
}

pub fn is_terminal(stage: Stage) -> bool {
    matches!(stage, Stage::Won | Stage::Lost | Stage::Dropped)
}

/// The stage a deal would advance to from `stage`; terminal stages and
/// the end of the catalog advance nowhere and return `stage` itself.
pub fn next_after(stage: Stage) -> Stage {
    if is_terminal(stage) {
        return stage;
    }
    let idx = index_of(stage);
    match STAGES.get(idx + 1) {
        Some(next) => *next,
        None => stage,
    }
}

pub fn display_name(stage: Stage) -> &'static str {
    match stage {
        Stage::Discussions => "Discussions",
        Stage::Qualified => "Qualified",
        Stage::Rfq => "RFQ",
        Stage::Offered => "Offered",
        Stage::Won => "Won",
        Stage::Lost => "Lost",
        Stage::Dropped => "Dropped",
    }
}

/// One checklist entry: the label shown to users and the predicate the
/// gate evaluates against the deal's stage-group columns.
pub struct StageRequirement {
    pub label: &'static str,
    pub is_met: fn(&deal::Model) -> bool,
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(false, |s| !s.trim().is_empty())
}

const DISCUSSIONS_REQUIREMENTS: &[StageRequirement] = &[
    StageRequirement {
        label: "Customer need identified",
        is_met: |d| d.need_identified == Some(true),
    },
    StageRequirement {
        label: "Need summary captured",
        is_met: |d| non_blank(&d.need_summary),
    },
    StageRequirement {
        label: "Decision maker present",
        is_met: |d| d.decision_maker_present == Some(true),
    },
    StageRequirement {
        label: "Customer agreement recorded",
        is_met: |d| d.customer_agreement.is_some(),
    },
];

// nda_signed is tri-state: the requirement is that the question was
// answered, not that the answer was yes.
const QUALIFIED_REQUIREMENTS: &[StageRequirement] = &[
    StageRequirement {
        label: "NDA question answered",
        is_met: |d| d.nda_signed.is_some(),
    },
    StageRequirement {
        label: "Budget confirmation recorded",
        is_met: |d| d.budget_confirmed.is_some(),
    },
    StageRequirement {
        label: "Portal access recorded",
        is_met: |d| d.portal_access.is_some(),
    },
    StageRequirement {
        label: "Project timeline set",
        is_met: |d| d.timeline_start.is_some() && d.timeline_end.is_some(),
    },
];

const RFQ_REQUIREMENTS: &[StageRequirement] = &[
    StageRequirement {
        label: "RFQ value entered",
        is_met: |d| matches!(d.rfq_value_cents, Some(v) if v > 0),
    },
    StageRequirement {
        label: "RFQ document linked",
        is_met: |d| non_blank(&d.rfq_document_url),
    },
    StageRequirement {
        label: "RFQ scope described",
        is_met: |d| non_blank(&d.rfq_scope),
    },
];

// Accepted/Dropped/NoResponse describe how the negotiation ended, so
// they do not satisfy the in-stage tracking requirement.
const OFFERED_REQUIREMENTS: &[StageRequirement] = &[
    StageRequirement {
        label: "Proposal sent date set",
        is_met: |d| d.proposal_sent_date.is_some(),
    },
    StageRequirement {
        label: "Negotiation status tracked",
        is_met: |d| {
            matches!(
                d.negotiation_status,
                Some(NegotiationStatus::Ongoing)
                    | Some(NegotiationStatus::Finalized)
                    | Some(NegotiationStatus::Rejected)
            )
        },
    },
    StageRequirement {
        label: "Expected decision date set",
        is_met: |d| d.decision_expected_date.is_some(),
    },
];

/// Checklist for a stage, in display order. Terminal stages have none
/// and are therefore always complete.
pub fn requirements_for(stage: Stage) -> &'static [StageRequirement] {
    match stage {
        Stage::Discussions => DISCUSSIONS_REQUIREMENTS,
        Stage::Qualified => QUALIFIED_REQUIREMENTS,
        Stage::Rfq => RFQ_REQUIREMENTS,
        Stage::Offered => OFFERED_REQUIREMENTS,
        Stage::Won | Stage::Lost | Stage::Dropped => &[],
    }
}

pub fn is_stage_complete(deal: &deal::Model) -> bool {
    requirements_for(deal.stage)
        .iter()
        .all(|req| (req.is_met)(deal))
}

/// Labels of the unmet requirements of the deal's current stage, in
/// checklist order. Empty for a complete (or terminal) deal.
pub fn missing_requirements(deal: &deal::Model) -> Vec<&'static str> {
    requirements_for(deal.stage)
        .iter()
        .filter(|req| !(req.is_met)(deal))
        .map(|req| req.label)
        .collect()
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Completion {
    Complete,
    Partial,
    Incomplete,
}

/// Three-state classification the board paints cards with. A stage
/// without requirements is vacuously Complete.
pub fn classify(deal: &deal::Model) -> Completion {
    let requirements = requirements_for(deal.stage);
    if requirements.is_empty() {
        return Completion::Complete;
    }
    let met = requirements
        .iter()
        .filter(|req| (req.is_met)(deal))
        .count();
    if met == requirements.len() {
        Completion::Complete
    } else if met > 0 {
        Completion::Partial
    } else {
        Completion::Incomplete
    }
}

/// The transition gate. Self-moves never pass. Terminal targets always
/// pass, since closing a deal is never blocked by checklist gaps; the
/// required loss or drop reason is enforced at the mutation boundary
/// instead. Any other move, forward or backward, requires the deal's
/// current checklist to be complete.
pub fn can_move_to_stage(deal: &deal::Model, target: Stage) -> bool {
    if target == deal.stage {
        return false;
    }
    if is_terminal(target) {
        return true;
    }
    is_stage_complete(deal)
}
