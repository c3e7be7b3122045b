pub mod approval;
pub mod department;
pub mod employee;
pub mod invoice;
pub mod threshold;
