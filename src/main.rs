use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use proctoring_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    routes, AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    // Violation fan-out worker: drains unnotified ledger rows into
    // examiner notifications and the optional email webhook.
    {
        let state = app_state.clone();
        tokio::spawn(async move {
            loop {
                match state.notification_service.run_once().await {
                    Ok(true) => {}
                    Ok(false) => {
                        tokio::time::sleep(Duration::from_millis(1000)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = ?e, "Notification worker error");
                        tokio::time::sleep(Duration::from_secs(2)).await;
                    }
                }
            }
        });
    }

    // Deadline checker: force-ends sessions whose exam duration elapsed.
    {
        let state = app_state.clone();
        tokio::spawn(async move {
            loop {
                match state.session_service.end_expired().await {
                    Ok(ended) => {
                        for (session, _result) in ended {
                            if let Err(e) = state
                                .notification_service
                                .notify_session_ended(&session, "Exam duration elapsed")
                                .await
                            {
                                tracing::error!(error = ?e, "Failed to notify timeout");
                            }
                        }
                    }
                    Err(e) => tracing::error!(error = ?e, "Deadline checker error"),
                }
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        });
    }

    // Evidence retention sweeper.
    {
        let state = app_state.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = state.evidence_service.sweep(&state.pool).await {
                    tracing::error!(error = ?e, "Evidence sweep error");
                }
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        });
    }

    let base_routes = Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login));

    let student_api = Router::new()
        .route("/api/exams", get(routes::exam::list_exams))
        .route("/api/exams/:id/enroll", post(routes::exam::enroll))
        .route(
            "/api/exams/:id/accept-terms",
            post(routes::exam::accept_terms),
        )
        .route("/api/exams/:id/start", post(routes::exam::start_exam))
        .route("/api/exams/:id/questions", get(routes::exam::get_questions))
        .route(
            "/api/proctoring/violation",
            post(routes::proctoring::report_violation),
        )
        .route(
            "/api/proctoring/submit",
            post(routes::proctoring::submit_exam),
        )
        .route(
            "/api/proctoring/heartbeat",
            post(routes::proctoring::heartbeat),
        )
        .route(
            "/api/proctoring/session/:id",
            get(routes::proctoring::get_session_status),
        )
        .route("/api/results/me/:exam_id", get(routes::results::my_result))
        .layer(axum::middleware::from_fn(
            proctoring_backend::middleware::auth::require_bearer_auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            proctoring_backend::middleware::rate_limit::new_rps_state(config.student_rps),
            proctoring_backend::middleware::rate_limit::rps_middleware,
        ));

    let examiner_api = Router::new()
        .route("/api/examiner/exams", post(routes::exam::create_exam))
        .route(
            "/api/examiner/exams/:id",
            axum::routing::delete(routes::exam::delete_exam),
        )
        .route(
            "/api/examiner/exams/:id/questions",
            post(routes::exam::add_question),
        )
        .route(
            "/api/examiner/exams/:id/publish",
            post(routes::exam::publish_exam),
        )
        .route(
            "/api/examiner/exams/:id/results",
            get(routes::examiner::exam_results),
        )
        .route(
            "/api/examiner/monitor/active-sessions",
            get(routes::examiner::active_sessions),
        )
        .route(
            "/api/examiner/monitor/session/:id",
            get(routes::examiner::session_details),
        )
        .route(
            "/api/examiner/notifications",
            get(routes::examiner::list_notifications),
        )
        .route(
            "/api/examiner/notifications/:id/read",
            post(routes::examiner::mark_notification_read),
        )
        .route(
            "/api/examiner/notifications/read-all",
            post(routes::examiner::mark_all_notifications_read),
        )
        .route(
            "/api/examiner/evidence/:filename",
            get(routes::examiner::download_evidence),
        )
        .route(
            "/api/examiner/results/:id/review",
            post(routes::examiner::review_result),
        )
        .layer(axum::middleware::from_fn(
            proctoring_backend::middleware::auth::require_examiner,
        ))
        .layer(axum::middleware::from_fn_with_state(
            proctoring_backend::middleware::rate_limit::new_rps_state(config.examiner_rps),
            proctoring_backend::middleware::rate_limit::rps_middleware,
        ));

    let app = base_routes
        .merge(student_api)
        .merge(examiner_api)
        .with_state(app_state)
        .layer(proctoring_backend::middleware::cors::permissive_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(50 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
