pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod seats;
pub mod services;

use anyhow::Context;
use std::sync::Arc;

use services::{mailer::Mailer, payment::PaymentLinkClient, reservations::ReservationService};

// Shared state для всего приложения
pub struct AppState {
    pub db: database::Database,
    pub config: config::Config,
    pub reservations: ReservationService,
    pub payments: PaymentLinkClient,
    pub mailer: Mailer,
}

impl AppState {
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::connect(&config.database)
            .await
            .context("failed to connect to database")?;

        db.run_migrations()
            .await
            .context("failed to run migrations")?;

        let reservations = ReservationService::new(db.clone(), config.reservations.clone());
        let payments = PaymentLinkClient::from_config(&config.payment, &config.circuit_breaker);
        let mailer = Mailer::from_config(&config.smtp).context("failed to build mailer")?;

        Ok(Arc::new(Self {
            db,
            config,
            reservations,
            payments,
            mailer,
        }))
    }
}
