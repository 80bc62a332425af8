use std::io;
use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notification_service::handlers::{
    devices::register_routes as register_devices,
    notifications::register_routes as register_notifications,
    preferences::register_routes as register_preferences,
};
use notification_service::services::{
    Dispatcher, EmailSender, HttpPushTransport, InAppSender, PushSender, Scheduler, SmtpMailer,
};
use notification_service::store::{
    GoalStore, NotificationStore, PgGoalStore, PgNotificationStore, PgPreferenceStore,
    PgSavingsStore, PgUserStore, PreferenceStore, SavingsStore, UserStore,
};
use notification_service::{metrics, ChannelSender, Config};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting notification service");

    let config = Config::from_env()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("config: {}", e)))?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("database: {}", e)))?;
    tracing::info!("Successfully connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("migrations: {}", e)))?;

    let notifications: Arc<dyn NotificationStore> = Arc::new(PgNotificationStore::new(pool.clone()));
    let preferences: Arc<dyn PreferenceStore> = Arc::new(PgPreferenceStore::new(pool.clone()));
    let goals: Arc<dyn GoalStore> = Arc::new(PgGoalStore::new(pool.clone()));
    let savings: Arc<dyn SavingsStore> = Arc::new(PgSavingsStore::new(pool.clone()));
    let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool.clone()));

    // Channel transports fail at startup when misconfigured, not per-send
    let mailer = SmtpMailer::from_config(&config.smtp)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("smtp: {}", e)))?;
    let push_transport = HttpPushTransport::from_config(&config.push)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, format!("push: {}", e)))?;

    let senders: Vec<Arc<dyn ChannelSender>> = vec![
        Arc::new(EmailSender::new(users.clone(), Arc::new(mailer))),
        Arc::new(PushSender::new(
            preferences.clone(),
            Arc::new(push_transport),
        )),
        Arc::new(InAppSender),
    ];

    let dispatcher = Arc::new(Dispatcher::new(
        notifications.clone(),
        preferences.clone(),
        senders,
    ));

    let scheduler = Arc::new(Scheduler::new(
        dispatcher.clone(),
        notifications.clone(),
        preferences.clone(),
        goals,
        savings,
        users,
        config.scheduler.clone(),
    ));
    scheduler.start();
    tracing::info!("Scheduler started");

    let addr = format!("0.0.0.0:{}", config.app.port);
    tracing::info!("Starting HTTP server on {}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(notifications.clone()))
            .app_data(web::Data::new(preferences.clone()))
            .app_data(web::Data::new(dispatcher.clone()))
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(|cfg| {
                register_notifications(cfg);
                register_devices(cfg);
                register_preferences(cfg);
            })
    })
    .bind(&addr)?
    .run()
    .await
}
