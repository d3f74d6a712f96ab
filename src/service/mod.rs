pub mod codes;
pub mod import;
pub mod leave;
pub mod payroll_calc;
pub mod stock;
pub mod worktime;
