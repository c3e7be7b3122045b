use billroute_core::config::LoadOptions;
use billroute_core::InvoiceId;

use crate::commands::workflow::{execute, to_data, CommandFailure, Wiring};
use crate::commands::CommandResult;

/// Read-only: parses the invoice and classifies it without assigning anyone.
pub fn run(options: LoadOptions, invoice_id: &str) -> CommandResult {
    let invoice_id = InvoiceId(invoice_id.to_string());
    execute("details", options, Wiring::Full, |engine| async move {
        let details = engine.invoice_details(&invoice_id).await.map_err(CommandFailure::from)?;
        let category = engine
            .options()
            .departments
            .category(details.department)
            .unwrap_or("unknown")
            .to_string();
        let message = format!(
            "invoice {} totals {} and routes to {} (department {})",
            details.invoice_id, details.total_amount, category, details.department
        );
        Ok((message, to_data(&details)?))
    })
}
