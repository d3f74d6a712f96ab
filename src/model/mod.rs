pub mod attendance;
pub mod backup;
pub mod client;
pub mod department;
pub mod document;
pub mod employee;
pub mod finance;
pub mod inventory;
pub mod invoice;
pub mod leave_period;
pub mod payroll;
pub mod role;
pub mod user;
pub mod vehicle;
