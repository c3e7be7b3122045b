use billroute_core::config::LoadOptions;
use billroute_core::{Escalation, InvoiceId};

use crate::commands::workflow::{execute, to_data, CommandFailure, Wiring};
use crate::commands::CommandResult;

pub fn run(options: LoadOptions, invoice_id: &str) -> CommandResult {
    let invoice_id = InvoiceId(invoice_id.to_string());
    execute("escalate", options, Wiring::Full, |engine| async move {
        let escalation = engine.escalate_approval(&invoice_id).await.map_err(CommandFailure::from)?;
        Ok((describe(&invoice_id, &escalation), to_data(&escalation)?))
    })
}

fn describe(invoice_id: &InvoiceId, escalation: &Escalation) -> String {
    match escalation {
        Escalation::Escalated { from, to, level, .. } => {
            format!("invoice {invoice_id} moved from employee {from} to employee {to} at level {level}")
        }
        Escalation::Completed { notified: true, .. } => {
            format!("invoice {invoice_id} fully approved and handed downstream")
        }
        Escalation::Completed { notified: false, .. } => {
            format!("invoice {invoice_id} fully approved; downstream hand-off failed, see logs")
        }
    }
}

#[cfg(test)]
mod tests {
    use billroute_core::{EmployeeId, Escalation, InvoiceId};

    use super::describe;

    #[test]
    fn failed_hand_off_is_called_out() {
        let outcome = Escalation::Completed {
            approver: EmployeeId(5),
            purchase_order_number: None,
            notified: false,
        };
        let message = describe(&InvoiceId("INV-1".into()), &outcome);
        assert!(message.contains("hand-off failed"));
    }
}
