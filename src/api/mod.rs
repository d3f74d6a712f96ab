pub mod attendance;
pub mod backup;
pub mod client;
pub mod department;
pub mod document;
pub mod employee;
pub mod finance;
pub mod general_inventory;
pub mod health;
pub mod invoice;
pub mod leave;
pub mod me;
pub mod payroll;
pub mod restricted_inventory;
pub mod user;
pub mod vehicle;
