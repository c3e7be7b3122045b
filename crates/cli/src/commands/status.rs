use billroute_core::config::LoadOptions;
use billroute_core::{InvoiceId, WorkflowState};

use crate::commands::workflow::{execute, to_data, CommandFailure, Wiring};
use crate::commands::CommandResult;

pub fn run(options: LoadOptions, invoice_id: &str) -> CommandResult {
    let invoice_id = InvoiceId(invoice_id.to_string());
    execute("status", options, Wiring::StoreOnly, |engine| async move {
        let state = engine.workflow_state(&invoice_id).await.map_err(CommandFailure::from)?;
        let message = match &state {
            WorkflowState::New => format!("invoice {invoice_id} has not been assigned"),
            WorkflowState::Pending { level, approver } => {
                format!("invoice {invoice_id} awaits employee {approver} at level {level}")
            }
            WorkflowState::Stalled { level, approver } => format!(
                "invoice {invoice_id} is stalled after level {level}: employee {approver} has no supervisor"
            ),
            WorkflowState::Done => format!("invoice {invoice_id} completed every approval level"),
        };
        Ok((message, to_data(&state)?))
    })
}
