use billroute_core::config::LoadOptions;
use billroute_core::InvoiceId;

use crate::commands::workflow::{execute, to_data, CommandFailure, Wiring};
use crate::commands::CommandResult;

pub fn run(options: LoadOptions, invoice_id: &str) -> CommandResult {
    let invoice_id = InvoiceId(invoice_id.to_string());
    execute("assign", options, Wiring::Full, |engine| async move {
        let assignment = engine
            .process_department_approval(&invoice_id)
            .await
            .map_err(CommandFailure::from)?;
        let message = format!(
            "invoice {} assigned to employee {} at level {}",
            assignment.invoice_id, assignment.approver, assignment.level
        );
        Ok((message, to_data(&assignment)?))
    })
}
