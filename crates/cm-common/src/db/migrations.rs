use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument};

use super::PgPool;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to run migration: {0}")]
    Postgres(#[from] PgError),
}

struct Migration {
    id: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        description: "caregiver, careseeker and booking tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS cm.users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT,
    phone TEXT,
    role TEXT NOT NULL CHECK (role IN ('caregiver', 'careseeker', 'admin')),
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS cm.caregiver_profiles (
    user_id TEXT PRIMARY KEY REFERENCES cm.users(id),
    profile_status TEXT NOT NULL DEFAULT 'pending'
        CHECK (profile_status IN ('pending', 'approved', 'rejected')),
    gender TEXT,
    date_of_birth DATE,
    education_level TEXT,
    years_of_experience INTEGER NOT NULL DEFAULT 0 CHECK (years_of_experience >= 0),
    latitude DOUBLE PRECISION,
    longitude DOUBLE PRECISION,
    id_card_number TEXT,
    permanent_address TEXT,
    hourly_rate BIGINT CHECK (hourly_rate IS NULL OR hourly_rate >= 0),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS cm.caregiver_certificates (
    id BIGSERIAL PRIMARY KEY,
    caregiver_id TEXT NOT NULL REFERENCES cm.caregiver_profiles(user_id),
    name TEXT NOT NULL,
    certificate_type TEXT,
    issuing_organization TEXT,
    issue_date DATE
);

CREATE TABLE IF NOT EXISTS cm.caregiver_skills (
    id BIGSERIAL PRIMARY KEY,
    caregiver_id TEXT NOT NULL REFERENCES cm.caregiver_profiles(user_id),
    skill_name TEXT NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS cm.caregiver_availability (
    id BIGSERIAL PRIMARY KEY,
    caregiver_id TEXT NOT NULL REFERENCES cm.caregiver_profiles(user_id),
    recurrence TEXT NOT NULL DEFAULT 'weekly' CHECK (recurrence IN ('weekly', 'daily', 'once')),
    days_of_week TEXT[] NOT NULL DEFAULT '{}',
    start_times TEXT[] NOT NULL DEFAULT '{}',
    end_times TEXT[] NOT NULL DEFAULT '{}',
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    CHECK (cardinality(start_times) = cardinality(end_times))
);

CREATE TABLE IF NOT EXISTS cm.reviews (
    id BIGSERIAL PRIMARY KEY,
    caregiver_id TEXT NOT NULL REFERENCES cm.caregiver_profiles(user_id),
    reviewer_id TEXT NOT NULL REFERENCES cm.users(id),
    rating SMALLINT NOT NULL CHECK (rating BETWEEN 1 AND 5),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS cm.bookings (
    id BIGSERIAL PRIMARY KEY,
    caregiver_id TEXT NOT NULL REFERENCES cm.caregiver_profiles(user_id),
    careseeker_id TEXT NOT NULL REFERENCES cm.users(id),
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS cm.elderly_profiles (
    id TEXT PRIMARY KEY,
    careseeker_id TEXT NOT NULL REFERENCES cm.users(id),
    full_name TEXT NOT NULL,
    medical_conditions TEXT[] NOT NULL DEFAULT '{}',
    personality_type TEXT,
    special_needs TEXT
);

CREATE TABLE IF NOT EXISTS cm.care_packages (
    id TEXT PRIMARY KEY,
    package_name TEXT NOT NULL,
    required_skills TEXT[] NOT NULL DEFAULT '{}',
    required_certificates TEXT[] NOT NULL DEFAULT '{}',
    optional_certificates TEXT[] NOT NULL DEFAULT '{}',
    is_active BOOLEAN NOT NULL DEFAULT TRUE
);
"#,
    },
    Migration {
        id: 2,
        description: "lookup indexes for matching",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_caregiver_profiles_status
    ON cm.caregiver_profiles(profile_status, years_of_experience);
CREATE INDEX IF NOT EXISTS idx_caregiver_skills_caregiver
    ON cm.caregiver_skills(caregiver_id);
CREATE INDEX IF NOT EXISTS idx_caregiver_certificates_caregiver
    ON cm.caregiver_certificates(caregiver_id);
CREATE INDEX IF NOT EXISTS idx_caregiver_availability_active
    ON cm.caregiver_availability(caregiver_id)
    WHERE is_active;
CREATE INDEX IF NOT EXISTS idx_reviews_caregiver
    ON cm.reviews(caregiver_id);
CREATE INDEX IF NOT EXISTS idx_bookings_caregiver_status
    ON cm.bookings(caregiver_id, status);
CREATE INDEX IF NOT EXISTS idx_bookings_careseeker_status
    ON cm.bookings(careseeker_id, status);
"#,
    },
    Migration {
        id: 3,
        description: "care package pricing details",
        sql: r#"
ALTER TABLE cm.care_packages ADD COLUMN IF NOT EXISTS package_type TEXT;
ALTER TABLE cm.care_packages ADD COLUMN IF NOT EXISTS price NUMERIC(12, 2);
ALTER TABLE cm.care_packages ADD COLUMN IF NOT EXISTS duration_hours NUMERIC(5, 2);
"#,
    },
];

/// Apply pending migrations, each in its own transaction.
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let mut client = pool.get().await?;
    client
        .batch_execute(
            "CREATE SCHEMA IF NOT EXISTS cm;
             CREATE TABLE IF NOT EXISTS cm.schema_migrations (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             );",
        )
        .await?;

    for migration in MIGRATIONS {
        let applied: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM cm.schema_migrations WHERE id = $1)",
                &[&migration.id],
            )
            .await?
            .get(0);
        if applied {
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql).await?;
        tx.execute(
            "INSERT INTO cm.schema_migrations (id, description) VALUES ($1, $2)",
            &[&migration.id, &migration.description],
        )
        .await?;
        tx.commit().await?;

        info!(id = migration.id, description = migration.description, "applied migration");
    }

    Ok(())
}
