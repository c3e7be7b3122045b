use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmployeeId(pub i64);

impl std::fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub role_level: i64,
    /// Number of open approvals currently assigned.
    pub workload: i64,
    pub supervisor_id: Option<EmployeeId>,
    pub department: Option<String>,
}

/// Picks the approver for a rank: least workload first, lowest id on ties.
pub fn least_loaded<'a, I>(candidates: I, role_level: i64) -> Option<&'a Employee>
where
    I: IntoIterator<Item = &'a Employee>,
{
    candidates
        .into_iter()
        .filter(|employee| employee.role_level == role_level)
        .min_by_key(|employee| (employee.workload, employee.id))
}

#[cfg(test)]
mod tests {
    use super::{least_loaded, Employee, EmployeeId};

    fn employee(id: i64, role_level: i64, workload: i64) -> Employee {
        Employee {
            id: EmployeeId(id),
            role_level,
            workload,
            supervisor_id: None,
            department: None,
        }
    }

    #[test]
    fn lowest_workload_wins_then_lowest_id() {
        let staff = vec![employee(9, 2, 1), employee(4, 2, 0), employee(2, 2, 0), employee(1, 3, 0)];

        let picked = least_loaded(&staff, 2).expect("candidate");
        assert_eq!(picked.id, EmployeeId(2));
    }

    #[test]
    fn no_candidate_for_missing_rank() {
        let staff = vec![employee(1, 2, 0)];
        assert!(least_loaded(&staff, 4).is_none());
    }
}
