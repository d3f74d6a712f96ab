use crate::api::{
    attendance::{AttendanceListResponse, MarkAttendance, UpdateAttendance},
    backup::BackupRunListResponse,
    client::{ClientListResponse, CreateClient},
    department::{CreateDepartment, DepartmentListResponse},
    document::DocumentListResponse,
    employee::{CreateEmployee, EmployeeListResponse, SetPassword},
    finance::{
        AccountBalance, AccountListResponse, CreateAccount, CreateJournalEntry, JournalEntryDetail,
        JournalListResponse, NewJournalLine, Totals,
    },
    general_inventory::{
        CreateGeneralItem, CreateTransaction, GeneralItemListResponse, GeneralItemView,
        TransactionListResponse,
    },
    health::Health,
    invoice::{CreateInvoice, InvoiceDetail, InvoiceListResponse, NewInvoiceItem},
    leave::{CreateLeavePeriod, LeaveListResponse, LeaveSummary, UpdateLeavePeriod},
    payroll::{AdjustmentListResponse, CreateAdjustment, GeneratePayslip, PayslipListResponse},
    restricted_inventory::{
        CreateRestrictedItem, CreateUnit, IssueUnit, RestrictedItemListResponse,
        RestrictedItemView, SerialUnitDetail, SerialUnitListResponse,
    },
    user::{CreateUser, UserListResponse},
    vehicle::{CreateExpense, CreateVehicle, ExpenseListResponse, ExpenseSummary, VehicleListResponse},
};
use crate::error::ErrorBody;
use crate::model::{
    attendance::{Attendance, AttendanceStatus},
    backup::BackupRun,
    client::{Client, ClientStatus},
    department::Department,
    document::{Document, OwnerType},
    employee::{Employee, EmployeeStatus},
    finance::{AccountKind, FinanceAccount, JournalEntry, JournalLine, Side},
    inventory::{
        GeneralItem, GeneralTransaction, RestrictedItem, SerialMovement, SerialUnit,
        TransactionKind, UnitStatus,
    },
    invoice::{Invoice, InvoiceItem, InvoiceStatus},
    leave_period::{LeavePeriod, LeaveType},
    payroll::{PayrollAdjustment, Payslip},
    role::Role,
    user::User,
    vehicle::{ExpenseKind, Vehicle, VehicleExpense, VehicleStatus},
};
use crate::models::{EmployeeLoginReqDto, LoginReqDto, PrincipalKind, TokenPair};
use crate::service::import::{ChunkReport, ImportReport};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ERP Backend API",
        version = "1.0.0",
        description = r#"
## ERP Backend

Back-office API for a small transport and trading business.

### Areas
- **HR**: departments, employees, attendance, leave periods
- **Payroll**: salary advances, deductions, monthly payslips
- **Fleet**: vehicles and their running expenses
- **Sales & finance**: clients, invoices, chart of accounts, journal entries
- **Inventory**: general stock with issue/return tracking, serial-numbered restricted items
- **Documents**: files attached to employees, vehicles, clients and invoices
- **Self-service**: employees check in and out and read their own records

### Security
Everything under `/api` requires a **JWT bearer** access token. Back-office
users log in at `/auth/login`; employees log in with their employee code at
`/auth/employee/login`. Write access is role based (Admin, HR, Finance, Store).

### Response format
- JSON bodies; errors are `{"code": "...", "message": "..."}`
- List endpoints take `page` and `per_page` and return `{data, page, per_page, total}`
"#,
    ),
    paths(
        crate::api::health::health,

        crate::auth::handlers::login,
        crate::auth::handlers::employee_login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::me::profile,
        crate::api::me::my_attendance,
        crate::api::me::check_in,
        crate::api::me::check_out,
        crate::api::me::my_leave,
        crate::api::me::my_payslips,

        crate::api::user::create_user,
        crate::api::user::list_users,
        crate::api::user::set_user_password,
        crate::api::user::delete_user,

        crate::api::department::create_department,
        crate::api::department::list_departments,
        crate::api::department::get_department,
        crate::api::department::update_department,
        crate::api::department::delete_department,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,
        crate::api::employee::set_employee_password,
        crate::api::employee::import_employees,

        crate::api::attendance::mark_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::get_attendance,
        crate::api::attendance::update_attendance,
        crate::api::attendance::delete_attendance,

        crate::api::leave::create_leave,
        crate::api::leave::list_leave,
        crate::api::leave::get_leave,
        crate::api::leave::update_leave,
        crate::api::leave::delete_leave,
        crate::api::leave::leave_summary,

        crate::api::payroll::create_advance,
        crate::api::payroll::list_advances,
        crate::api::payroll::delete_advance,
        crate::api::payroll::create_deduction,
        crate::api::payroll::list_deductions,
        crate::api::payroll::delete_deduction,
        crate::api::payroll::generate_payslip,
        crate::api::payroll::list_payslips,
        crate::api::payroll::get_payslip,
        crate::api::payroll::delete_payslip,

        crate::api::vehicle::create_vehicle,
        crate::api::vehicle::list_vehicles,
        crate::api::vehicle::get_vehicle,
        crate::api::vehicle::update_vehicle,
        crate::api::vehicle::delete_vehicle,
        crate::api::vehicle::create_expense,
        crate::api::vehicle::list_expenses,
        crate::api::vehicle::delete_expense,
        crate::api::vehicle::expense_summary,

        crate::api::client::create_client,
        crate::api::client::list_clients,
        crate::api::client::get_client,
        crate::api::client::update_client,
        crate::api::client::delete_client,

        crate::api::invoice::create_invoice,
        crate::api::invoice::list_invoices,
        crate::api::invoice::get_invoice,
        crate::api::invoice::update_invoice,
        crate::api::invoice::delete_invoice,

        crate::api::finance::create_account,
        crate::api::finance::list_accounts,
        crate::api::finance::get_account,
        crate::api::finance::update_account,
        crate::api::finance::delete_account,
        crate::api::finance::account_balance,
        crate::api::finance::create_journal_entry,
        crate::api::finance::list_journal_entries,
        crate::api::finance::get_journal_entry,
        crate::api::finance::delete_journal_entry,

        crate::api::general_inventory::create_item,
        crate::api::general_inventory::list_items,
        crate::api::general_inventory::get_item,
        crate::api::general_inventory::update_item,
        crate::api::general_inventory::delete_item,
        crate::api::general_inventory::create_transaction,
        crate::api::general_inventory::list_transactions,

        crate::api::restricted_inventory::create_item,
        crate::api::restricted_inventory::list_items,
        crate::api::restricted_inventory::get_item,
        crate::api::restricted_inventory::update_item,
        crate::api::restricted_inventory::delete_item,
        crate::api::restricted_inventory::create_unit,
        crate::api::restricted_inventory::list_units,
        crate::api::restricted_inventory::get_unit,
        crate::api::restricted_inventory::update_unit,
        crate::api::restricted_inventory::delete_unit,
        crate::api::restricted_inventory::issue_unit,
        crate::api::restricted_inventory::return_unit,

        crate::api::document::upload_document,
        crate::api::document::list_documents,
        crate::api::document::download_document,
        crate::api::document::delete_document,

        crate::api::backup::run_backup,
        crate::api::backup::list_backups
    ),
    components(
        schemas(
            ErrorBody,
            Health,
            LoginReqDto,
            EmployeeLoginReqDto,
            TokenPair,
            PrincipalKind,
            Role,
            User,
            CreateUser,
            UserListResponse,
            Department,
            CreateDepartment,
            DepartmentListResponse,
            Employee,
            EmployeeStatus,
            CreateEmployee,
            SetPassword,
            EmployeeListResponse,
            ImportReport,
            ChunkReport,
            Attendance,
            AttendanceStatus,
            MarkAttendance,
            UpdateAttendance,
            AttendanceListResponse,
            LeavePeriod,
            LeaveType,
            CreateLeavePeriod,
            UpdateLeavePeriod,
            LeaveListResponse,
            LeaveSummary,
            PayrollAdjustment,
            CreateAdjustment,
            AdjustmentListResponse,
            Payslip,
            GeneratePayslip,
            PayslipListResponse,
            Vehicle,
            VehicleStatus,
            CreateVehicle,
            VehicleListResponse,
            VehicleExpense,
            ExpenseKind,
            CreateExpense,
            ExpenseListResponse,
            ExpenseSummary,
            Client,
            ClientStatus,
            CreateClient,
            ClientListResponse,
            Invoice,
            InvoiceItem,
            InvoiceStatus,
            NewInvoiceItem,
            CreateInvoice,
            InvoiceDetail,
            InvoiceListResponse,
            FinanceAccount,
            AccountKind,
            Side,
            CreateAccount,
            AccountListResponse,
            AccountBalance,
            JournalEntry,
            JournalLine,
            NewJournalLine,
            CreateJournalEntry,
            Totals,
            JournalEntryDetail,
            JournalListResponse,
            GeneralItem,
            GeneralItemView,
            CreateGeneralItem,
            GeneralItemListResponse,
            GeneralTransaction,
            TransactionKind,
            CreateTransaction,
            TransactionListResponse,
            RestrictedItem,
            RestrictedItemView,
            CreateRestrictedItem,
            RestrictedItemListResponse,
            SerialUnit,
            UnitStatus,
            SerialMovement,
            CreateUnit,
            IssueUnit,
            SerialUnitDetail,
            SerialUnitListResponse,
            Document,
            OwnerType,
            DocumentListResponse,
            BackupRun,
            BackupRunListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Auth", description = "Login, token rotation and logout"),
        (name = "Self-service", description = "Endpoints for the logged-in employee"),
        (name = "User", description = "Back-office accounts (admin)"),
        (name = "Department", description = "Department management APIs"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave period APIs"),
        (name = "Payroll", description = "Advances, deductions and payslips"),
        (name = "Vehicle", description = "Fleet and vehicle expenses"),
        (name = "Client", description = "Client management APIs"),
        (name = "Invoice", description = "Invoicing APIs"),
        (name = "Finance", description = "Chart of accounts and journal entries"),
        (name = "Inventory", description = "General and restricted inventory"),
        (name = "Document", description = "File attachments"),
        (name = "Backup", description = "Database export runs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_area_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/auth/login",
            "/auth/employee/login",
            "/api/me/attendance/check-in",
            "/api/employees/import",
            "/api/payroll/generate",
            "/api/vehicles/{id}/expenses/summary",
            "/api/invoices/{id}",
            "/api/finance/accounts/{id}/balance",
            "/api/inventory/serial-units/{unit_id}/issue",
            "/api/documents/{id}/download",
            "/api/backups/run",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
