use crate::{
    api::{
        attendance, backup, client, department, document, employee, finance, general_inventory,
        health, invoice, leave, me, payroll, restricted_inventory, user, vehicle,
    },
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::{json_error_handler, path_error_handler, query_error_handler},
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Per-IP limiter allowing `requests_per_min` with an equal burst.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond((60_000 / requests_per_min as u64).max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .app_data(web::PayloadConfig::new(config.upload_max_bytes));

    cfg.route("/health", web::get().to(health::health));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/employee/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::employee_login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::scope("/me")
                    .service(web::resource("").route(web::get().to(me::profile)))
                    .service(web::resource("/attendance").route(web::get().to(me::my_attendance)))
                    .service(
                        web::resource("/attendance/check-in").route(web::post().to(me::check_in)),
                    )
                    .service(
                        web::resource("/attendance/check-out")
                            .route(web::post().to(me::check_out)),
                    )
                    .service(web::resource("/leave-periods").route(web::get().to(me::my_leave)))
                    .service(web::resource("/payslips").route(web::get().to(me::my_payslips))),
            )
            .service(
                web::scope("/users")
                    .service(
                        web::resource("")
                            .route(web::post().to(user::create_user))
                            .route(web::get().to(user::list_users)),
                    )
                    .service(web::resource("/{id}").route(web::delete().to(user::delete_user)))
                    .service(
                        web::resource("/{id}/password")
                            .route(web::put().to(user::set_user_password)),
                    ),
            )
            .service(
                web::scope("/departments")
                    .service(
                        web::resource("")
                            .route(web::post().to(department::create_department))
                            .route(web::get().to(department::list_departments)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(department::get_department))
                            .route(web::put().to(department::update_department))
                            .route(web::delete().to(department::delete_department)),
                    ),
            )
            .service(
                web::scope("/employees")
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // literal segment before /{employee_id}
                    .service(
                        web::resource("/import").route(web::post().to(employee::import_employees)),
                    )
                    .service(
                        web::resource("/{employee_id}")
                            .route(web::get().to(employee::get_employee))
                            .route(web::put().to(employee::update_employee))
                            .route(web::delete().to(employee::delete_employee)),
                    )
                    .service(
                        web::resource("/{employee_id}/password")
                            .route(web::put().to(employee::set_employee_password)),
                    )
                    .service(
                        web::resource("/{employee_id}/leave-summary")
                            .route(web::get().to(leave::leave_summary)),
                    ),
            )
            .service(
                web::scope("/attendance")
                    .service(
                        web::resource("")
                            .route(web::post().to(attendance::mark_attendance))
                            .route(web::get().to(attendance::list_attendance)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(attendance::get_attendance))
                            .route(web::put().to(attendance::update_attendance))
                            .route(web::delete().to(attendance::delete_attendance)),
                    ),
            )
            .service(
                web::scope("/leave-periods")
                    .service(
                        web::resource("")
                            .route(web::post().to(leave::create_leave))
                            .route(web::get().to(leave::list_leave)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(leave::get_leave))
                            .route(web::put().to(leave::update_leave))
                            .route(web::delete().to(leave::delete_leave)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    .service(
                        web::resource("/advances")
                            .route(web::post().to(payroll::create_advance))
                            .route(web::get().to(payroll::list_advances)),
                    )
                    .service(
                        web::resource("/advances/{id}")
                            .route(web::delete().to(payroll::delete_advance)),
                    )
                    .service(
                        web::resource("/deductions")
                            .route(web::post().to(payroll::create_deduction))
                            .route(web::get().to(payroll::list_deductions)),
                    )
                    .service(
                        web::resource("/deductions/{id}")
                            .route(web::delete().to(payroll::delete_deduction)),
                    )
                    .service(
                        web::resource("/generate").route(web::post().to(payroll::generate_payslip)),
                    )
                    .service(
                        web::resource("/payslips").route(web::get().to(payroll::list_payslips)),
                    )
                    .service(
                        web::resource("/payslips/{id}")
                            .route(web::get().to(payroll::get_payslip))
                            .route(web::delete().to(payroll::delete_payslip)),
                    ),
            )
            .service(
                web::scope("/vehicles")
                    .service(
                        web::resource("")
                            .route(web::post().to(vehicle::create_vehicle))
                            .route(web::get().to(vehicle::list_vehicles)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(vehicle::get_vehicle))
                            .route(web::put().to(vehicle::update_vehicle))
                            .route(web::delete().to(vehicle::delete_vehicle)),
                    )
                    .service(
                        web::resource("/{id}/expenses")
                            .route(web::post().to(vehicle::create_expense))
                            .route(web::get().to(vehicle::list_expenses)),
                    )
                    // literal segment before /{expense_id}
                    .service(
                        web::resource("/{id}/expenses/summary")
                            .route(web::get().to(vehicle::expense_summary)),
                    )
                    .service(
                        web::resource("/{id}/expenses/{expense_id}")
                            .route(web::delete().to(vehicle::delete_expense)),
                    ),
            )
            .service(
                web::scope("/clients")
                    .service(
                        web::resource("")
                            .route(web::post().to(client::create_client))
                            .route(web::get().to(client::list_clients)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(client::get_client))
                            .route(web::put().to(client::update_client))
                            .route(web::delete().to(client::delete_client)),
                    ),
            )
            .service(
                web::scope("/invoices")
                    .service(
                        web::resource("")
                            .route(web::post().to(invoice::create_invoice))
                            .route(web::get().to(invoice::list_invoices)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(invoice::get_invoice))
                            .route(web::put().to(invoice::update_invoice))
                            .route(web::delete().to(invoice::delete_invoice)),
                    ),
            )
            .service(
                web::scope("/finance")
                    .service(
                        web::resource("/accounts")
                            .route(web::post().to(finance::create_account))
                            .route(web::get().to(finance::list_accounts)),
                    )
                    .service(
                        web::resource("/accounts/{id}")
                            .route(web::get().to(finance::get_account))
                            .route(web::put().to(finance::update_account))
                            .route(web::delete().to(finance::delete_account)),
                    )
                    .service(
                        web::resource("/accounts/{id}/balance")
                            .route(web::get().to(finance::account_balance)),
                    )
                    .service(
                        web::resource("/journal-entries")
                            .route(web::post().to(finance::create_journal_entry))
                            .route(web::get().to(finance::list_journal_entries)),
                    )
                    .service(
                        web::resource("/journal-entries/{id}")
                            .route(web::get().to(finance::get_journal_entry))
                            .route(web::delete().to(finance::delete_journal_entry)),
                    ),
            )
            .service(
                web::scope("/inventory")
                    .service(
                        web::resource("/general")
                            .route(web::post().to(general_inventory::create_item))
                            .route(web::get().to(general_inventory::list_items)),
                    )
                    .service(
                        web::resource("/general/{id}")
                            .route(web::get().to(general_inventory::get_item))
                            .route(web::put().to(general_inventory::update_item))
                            .route(web::delete().to(general_inventory::delete_item)),
                    )
                    .service(
                        web::resource("/general/{id}/transactions")
                            .route(web::post().to(general_inventory::create_transaction))
                            .route(web::get().to(general_inventory::list_transactions)),
                    )
                    .service(
                        web::resource("/restricted")
                            .route(web::post().to(restricted_inventory::create_item))
                            .route(web::get().to(restricted_inventory::list_items)),
                    )
                    .service(
                        web::resource("/restricted/{id}")
                            .route(web::get().to(restricted_inventory::get_item))
                            .route(web::put().to(restricted_inventory::update_item))
                            .route(web::delete().to(restricted_inventory::delete_item)),
                    )
                    .service(
                        web::resource("/restricted/{id}/units")
                            .route(web::post().to(restricted_inventory::create_unit))
                            .route(web::get().to(restricted_inventory::list_units)),
                    )
                    .service(
                        web::resource("/serial-units/{unit_id}")
                            .route(web::get().to(restricted_inventory::get_unit))
                            .route(web::put().to(restricted_inventory::update_unit))
                            .route(web::delete().to(restricted_inventory::delete_unit)),
                    )
                    .service(
                        web::resource("/serial-units/{unit_id}/issue")
                            .route(web::post().to(restricted_inventory::issue_unit)),
                    )
                    .service(
                        web::resource("/serial-units/{unit_id}/return")
                            .route(web::post().to(restricted_inventory::return_unit)),
                    ),
            )
            .service(
                web::scope("/documents")
                    .service(
                        web::resource("")
                            .route(web::post().to(document::upload_document))
                            .route(web::get().to(document::list_documents)),
                    )
                    .service(
                        web::resource("/{id}").route(web::delete().to(document::delete_document)),
                    )
                    .service(
                        web::resource("/{id}/download")
                            .route(web::get().to(document::download_document)),
                    ),
            )
            .service(
                web::scope("/backups")
                    .service(web::resource("").route(web::get().to(backup::list_backups)))
                    .service(web::resource("/run").route(web::post().to(backup::run_backup))),
            ),
    );
}
