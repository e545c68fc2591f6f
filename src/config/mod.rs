use serde::Deserialize;
use std::env;

// Container for all runtime settings, sourced from the environment at
// startup. Nothing security-sensitive lives in source.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub booking: BookingConfig,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub rust_log: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

// Booking policy knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// Per-booking seat cap.
    pub max_seats_per_booking: usize,
    /// Cancellation closes this many minutes before showtime.
    pub cancellation_cutoff_minutes: i64,
}

// Payment settlement verification.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub merchant_id: String,
    pub merchant_password: String,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .expect("PORT must be a valid number"),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "cinema_booking=debug,tower_http=debug".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
                pool_size: env::var("DB_POOL_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("DB_POOL_SIZE must be a valid number"),
            },
            booking: BookingConfig {
                max_seats_per_booking: env::var("MAX_SEATS_PER_BOOKING")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()
                    .expect("MAX_SEATS_PER_BOOKING must be a valid number"),
                cancellation_cutoff_minutes: env::var("CANCELLATION_CUTOFF_MINUTES")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("CANCELLATION_CUTOFF_MINUTES must be a valid number"),
            },
            payment: PaymentConfig {
                merchant_id: env::var("MERCHANT_ID").expect("MERCHANT_ID must be set"),
                merchant_password: env::var("MERCHANT_PASSWORD")
                    .expect("MERCHANT_PASSWORD must be set"),
            },
        }
    }
}
