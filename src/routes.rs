use actix_web::{error, web};

use crate::error::ApiError;
use crate::handlers::{audit, auth, bookings, meetings, notifications, resources, users};

/// Mounts the whole API under `/api`. Fixed segments such as
/// `availability` are registered ahead of the `{id}` routes they would
/// otherwise collide with.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        error::Error::from(ApiError::bad_request(err.to_string()))
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _| {
        error::Error::from(ApiError::bad_request(err.to_string()))
    }))
    .app_data(web::PathConfig::default().error_handler(|_, _| {
        error::Error::from(ApiError::not_found(crate::handlers::NOT_FOUND))
    }))
    .service(
        web::scope("/api")
            .route("/auth/login/", web::post().to(auth::login))
            .route("/auth/logout/", web::post().to(auth::logout))
            .route("/auth/token/refresh/", web::post().to(auth::refresh))
            .route("/auth/register/", web::post().to(auth::signup))
            .route("/users/signup/", web::post().to(auth::signup))
            .route("/users/", web::get().to(users::list_users))
            .route("/users/student_stats/", web::get().to(users::student_stats))
            .route("/users/dashboard_stats/", web::get().to(users::dashboard_stats))
            .service(
                web::resource("/users/{id}/")
                    .route(web::get().to(users::get_user))
                    .route(web::put().to(users::update_user))
                    .route(web::patch().to(users::update_user))
                    .route(web::delete().to(users::deactivate_user)),
            )
            .service(
                web::resource("/resources/")
                    .route(web::get().to(resources::list_resources))
                    .route(web::post().to(resources::create_resource)),
            )
            .service(
                web::resource("/resources/{id}/")
                    .route(web::get().to(resources::get_resource))
                    .route(web::put().to(resources::update_resource))
                    .route(web::patch().to(resources::update_resource))
                    .route(web::delete().to(resources::delete_resource)),
            )
            .route("/bookings/availability/", web::get().to(bookings::availability))
            .service(
                web::resource("/bookings/")
                    .route(web::get().to(bookings::list_bookings))
                    .route(web::post().to(bookings::create_booking)),
            )
            .service(
                web::resource("/bookings/{id}/")
                    .route(web::get().to(bookings::get_booking))
                    .route(web::delete().to(bookings::cancel_booking)),
            )
            .route("/bookings/{id}/approve/", web::post().to(bookings::approve_booking))
            .route("/bookings/{id}/reject/", web::post().to(bookings::reject_booking))
            .service(
                web::resource("/meetings/")
                    .route(web::get().to(meetings::list_meetings))
                    .route(web::post().to(meetings::create_meeting)),
            )
            .route("/meetings/{id}/", web::get().to(meetings::get_meeting))
            .route("/audit/", web::get().to(audit::list_audit))
            .route("/audit/{id}/", web::get().to(audit::get_audit))
            .route("/notifications/", web::get().to(notifications::list_notifications))
            .route(
                "/notifications/mark_all_read/",
                web::post().to(notifications::mark_all_read),
            )
            .service(
                web::resource("/notifications/{id}/")
                    .route(web::patch().to(notifications::update_notification))
                    .route(web::delete().to(notifications::delete_notification)),
            ),
    );
}
