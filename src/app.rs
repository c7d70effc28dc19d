use crate::state::AppState;
use crate::{admin, handlers, maintenance};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/login", post(admin::login))
        .route("/employees", get(admin::list_employees).post(admin::create_employee))
        .route(
            "/employees/:id",
            get(admin::get_employee)
                .put(admin::update_employee)
                .delete(admin::delete_employee),
        )
        .route("/time-logs", get(admin::list_time_logs).post(admin::create_time_log))
        .route(
            "/time-logs/:id",
            get(admin::get_time_log)
                .put(admin::update_time_log)
                .delete(admin::delete_time_log),
        )
        .route("/settings", get(admin::get_settings).post(admin::save_settings))
        .route("/dashboard", get(admin::dashboard))
        .route("/set-gas-url", post(admin::set_relay_url))
        .route("/test-gas", post(admin::test_relay))
        .route("/reset-admin", post(admin::reset_admin))
        .route("/import-employees", post(maintenance::import_employees))
        .route("/export-time-logs", post(maintenance::export_time_logs))
        .route("/cleanup-time-logs", post(maintenance::cleanup_time_logs))
        .route(
            "/cleanup-inactive-employees",
            post(maintenance::cleanup_inactive_employees),
        )
        .route("/delete-all-employees", post(maintenance::delete_all_employees))
        .route("/backup-database", get(maintenance::backup_database));

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/api/getdata", post(handlers::get_data))
        .route("/api/getemployee", post(handlers::get_employee))
        .route("/api/clockin", post(handlers::clock_in))
        .route("/api/clockout", post(handlers::clock_out))
        .route("/api/sendnotify", post(handlers::send_notify))
        .route("/api/getLiffId", get(handlers::liff_id))
        .route("/api/getTimeOffset", get(handlers::time_offset))
        .route("/api/reset-admin", get(admin::reset_admin))
        .nest("/api/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
