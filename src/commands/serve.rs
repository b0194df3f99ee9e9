use std::net::SocketAddr;

use axum::{routing::get, Router};
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::{
    api::health_checks::ok,
    app::App,
    config::Config,
    database::setup_database,
    environment::Environment,
    job_queue::JobQueue,
    jobs::{
        job_registry::JobRegistry, job_supervisor::job_supervisor, scheduled_job::ScheduledJob,
    },
    mailer::Mailer,
    router::router,
};

pub async fn handle_serve_command<AppMigrator: MigratorTrait>(
    environment: Environment,
    config: Config,
    job_registry: JobRegistry,
    job_schedule: Vec<ScheduledJob>,
) {
    let port = config.server.port;

    // Answers liveness probes while migrations run
    let liveness_server_task = tokio::spawn(start_liveness_server(port));

    let (db, migration_receiver) = match setup_database::<AppMigrator>(&config.database).await {
        Ok(setup) => setup,
        Err(e) => {
            error!("❌ Could not connect to the database: {}", e);
            liveness_server_task.abort();
            return;
        }
    };

    match migration_receiver.await {
        Ok(Ok(())) => info!("✅ Database is ready!"),
        Ok(Err(e)) => {
            error!("❌ Database migrations failed: {}", e);
            liveness_server_task.abort();
            return;
        }
        Err(_) => {
            error!("❌ Database setup channel closed unexpectedly");
            liveness_server_task.abort();
            return;
        }
    }

    let mailer = match Mailer::from_config(&config.email) {
        Ok(mailer) => mailer,
        Err(e) => {
            error!("❌ Failed to create mailer transport: {}", e);
            liveness_server_task.abort();
            return;
        }
    };

    let app = App {
        config: config.clone(),
        environment,
        db,
        mailer,
        job_queue: JobQueue::database(),
    };

    let supervisor_app = app.clone();
    tokio::spawn(async move {
        if let Err(e) = job_supervisor(config.jobs, supervisor_app, job_registry, job_schedule).await
        {
            error!("❌ Job supervisor stopped: {}", e);
        }
    });

    liveness_server_task.abort();
    let _ = liveness_server_task.await;

    if let Err(e) = start_server(router(app), port).await {
        error!("❌ Server error: {}", e);
    }
}

async fn start_liveness_server(port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;

    axum::serve(listener, Router::new().route("/liveness", get(ok))).await
}

async fn start_server(router: Router, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!("🌐 Server starting on http://{}", addr);
    axum::serve(listener, router).await
}
