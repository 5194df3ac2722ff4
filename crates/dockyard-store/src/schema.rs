//! Schema DDL, applied once at startup via [`crate::PgStore::migrate`].
//!
//! The workspace carries no separate migration runner (no `sqlx-cli`
//! migrations directory, no `refinery`) — a single idempotent `CREATE TABLE
//! IF NOT EXISTS` script is simple enough for the five entities plus the
//! job broker and is run from Rust at process startup, the way the
//! teacher's `FileStore` creates its state directory on first use rather
//! than requiring a separate provisioning step.

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id                   UUID PRIMARY KEY,
    source_host_id       BIGINT NOT NULL UNIQUE,
    login                TEXT NOT NULL,
    email                TEXT,
    avatar_url           TEXT,
    sealed_access_token  TEXT NOT NULL,
    created_at           TIMESTAMPTZ NOT NULL,
    updated_at           TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS projects (
    id                     UUID PRIMARY KEY,
    user_id                UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    name                   TEXT NOT NULL,
    slug                   TEXT NOT NULL UNIQUE,
    repo_full_name         TEXT NOT NULL UNIQUE,
    clone_url              TEXT NOT NULL,
    branch                 TEXT NOT NULL,
    root_dir               TEXT NOT NULL,
    build_command          TEXT,
    start_command          TEXT,
    runtime                TEXT,
    listen_port            INTEGER NOT NULL,
    webhook_id             TEXT,
    sealed_webhook_secret  TEXT,
    created_at             TIMESTAMPTZ NOT NULL,
    updated_at             TIMESTAMPTZ NOT NULL,
    CONSTRAINT webhook_fields_set_together
        CHECK ((webhook_id IS NULL) = (sealed_webhook_secret IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_projects_user_id ON projects(user_id);

CREATE TABLE IF NOT EXISTS environment_variables (
    id           UUID PRIMARY KEY,
    project_id   UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    key          TEXT NOT NULL,
    sealed_value TEXT NOT NULL,
    created_at   TIMESTAMPTZ NOT NULL,
    updated_at   TIMESTAMPTZ NOT NULL,
    UNIQUE (project_id, key)
);

CREATE TABLE IF NOT EXISTS deployments (
    id               UUID PRIMARY KEY,
    project_id       UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    commit_sha       TEXT NOT NULL,
    commit_message   TEXT,
    commit_author    TEXT,
    branch           TEXT NOT NULL,
    status           TEXT NOT NULL,
    image_ref        TEXT,
    container_id     TEXT,
    public_url       TEXT,
    error_message    TEXT,
    created_at       TIMESTAMPTZ NOT NULL,
    build_started_at TIMESTAMPTZ,
    completed_at     TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS idx_deployments_project_id ON deployments(project_id);
CREATE INDEX IF NOT EXISTS idx_deployments_project_status ON deployments(project_id, status);

-- Append-only audit trail of every `advance`/`supersede`/`fail`/`cancel`
-- transition. A supplement per SPEC_FULL.md §4.1: nothing reads this back
-- to drive behavior, it exists for operability.
CREATE TABLE IF NOT EXISTS deployment_events (
    id            UUID PRIMARY KEY,
    deployment_id UUID NOT NULL REFERENCES deployments(id) ON DELETE CASCADE,
    from_status   TEXT,
    to_status     TEXT NOT NULL,
    detail        TEXT,
    created_at    TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_deployment_events_deployment_id
    ON deployment_events(deployment_id);

-- The job broker backing the `builds` and `deploys` queues treated as an
-- external collaborator. `lease` claims the oldest ready row for a queue
-- with `FOR UPDATE SKIP LOCKED`, so two workers racing the
-- same queue never claim the same job.
CREATE TABLE IF NOT EXISTS jobs (
    id               UUID PRIMARY KEY,
    queue            TEXT NOT NULL,
    payload          JSONB NOT NULL,
    status           TEXT NOT NULL DEFAULT 'ready',
    attempts         INTEGER NOT NULL DEFAULT 0,
    max_attempts     INTEGER NOT NULL DEFAULT 3,
    available_at     TIMESTAMPTZ NOT NULL,
    lease_expires_at TIMESTAMPTZ,
    created_at       TIMESTAMPTZ NOT NULL,
    updated_at       TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_jobs_queue_status_available
    ON jobs(queue, status, available_at);
"#;
