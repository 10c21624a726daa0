use crate::{api::attendance, auth::middleware::auth_middleware, config::Config};
use actix_governor::{
    Governor, GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor,
    governor::middleware::NoOpMiddleware,
};
use actix_web::{
    middleware::{Condition, from_fn},
    web,
};

// Per-IP limiter for the protected scope
fn protected_limiter(requests_per_min: u32) -> GovernorConfig<PeerIpKeyExtractor, NoOpMiddleware> {
    let burst = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(burst)).max(1);
    GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(burst)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default()
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    let limiter = protected_limiter(config.rate_protected_per_min);

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(Condition::new(
                config.rate_protected_per_min > 0,
                Governor::new(&limiter),
            )) // rate limiting, 0 disables
            .service(
                web::scope("/attendance")
                    // /attendance (self check-in / check-out)
                    .service(
                        web::resource("")
                            .route(web::put().to(attendance::check_out))
                            .route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/arrival").route(web::post().to(attendance::record_arrival)),
                    )
                    .service(
                        web::resource("/departure")
                            .route(web::post().to(attendance::record_departure)),
                    )
                    .service(web::resource("/daily").route(web::get().to(attendance::daily_view)))
                    .service(
                        web::resource("/bulk-toggle").route(web::post().to(attendance::bulk_toggle)),
                    )
                    .service(web::resource("/refresh").route(web::post().to(attendance::refresh)))
                    .service(web::resource("/stats").route(web::get().to(attendance::period_stats)))
                    .service(
                        web::resource("/stats/summary")
                            .route(web::get().to(attendance::period_summary)),
                    )
                    // /attendance/employee/{employee_id}
                    .service(
                        web::resource("/employee/{employee_id}")
                            .route(web::get().to(attendance::employee_history)),
                    ),
            ),
    );
}
