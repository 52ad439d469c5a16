use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use referral_desk::auth::jwt::JwtService;
use referral_desk::auth::password::hash_password;
use referral_desk::config::AppConfig;
use referral_desk::db::{self, PgPool, MIGRATIONS};
use referral_desk::models::{
    Job, NewReferral, NewReferralAssignment, NewReferralUrgency, NewTopic, NewUnit,
    NewUnitMembership, NewUser,
};
use referral_desk::routes;
use referral_desk::schema::{
    jobs, referral_assignments, referral_urgencies, referrals, topics, unit_memberships, units,
    users,
};
use referral_desk::state::AppState;
use referral_desk::storage::ObjectStorage;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        content_disposition: Option<String>,
    ) -> Result<()> {
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type,
            content_disposition,
        };
        self.objects.lock().await.insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn presign_get_object(&self, key: &str, expires_in: Duration) -> Result<String> {
        let guard = self.objects.lock().await;
        ensure!(guard.contains_key(key), "object {key} missing");
        Ok(format!(
            "https://fake-storage/{key}?expires_in={}",
            expires_in.as_secs()
        ))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.objects.lock().await.remove(key);
        Ok(())
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

/// One file part of a multipart request, sent under the `files` field.
#[allow(dead_code)]
pub struct UploadFile<'a> {
    pub name: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            jwt_expiry_minutes: 60,
            refresh_token_expiry_days: 30,
            refresh_cookie_secure: false,
            refresh_cookie_domain: None,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".to_string(),
            s3_bucket: "test-bucket".to_string(),
            email_api_url: None,
            email_api_key: None,
            email_sender: "desk@example.org".to_string(),
            app_base_url: "http://localhost:3000".to_string(),
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let storage_for_state: Arc<dyn ObjectStorage> = storage.clone();
        let jwt = JwtService::from_config(&config)?;
        let state = AppState::new(pool.clone(), config, storage_for_state, jwt);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            storage,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(truncate_all).await
    }

    #[allow(dead_code)]
    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    pub async fn insert_user(&self, username: &str, password: &str, role: &str) -> Result<Uuid> {
        let username = username.to_string();
        let password = password.to_string();
        let role = role.to_string();
        self.with_conn(move |conn| {
            let user = NewUser {
                id: Uuid::new_v4(),
                email: format!("{username}@example.org"),
                username,
                password_hash: hash_password(&password)?,
                role,
                first_name: String::new(),
                last_name: String::new(),
                phone_number: String::new(),
                unit_name: String::new(),
                title: String::new(),
            };
            diesel::insert_into(users::table)
                .values(&user)
                .execute(conn)
                .context("failed to insert user")?;
            Ok(user.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn deactivate_user(&self, user_id: Uuid) -> Result<()> {
        self.with_conn(move |conn| {
            diesel::update(users::table.find(user_id))
                .set(users::is_active.eq(false))
                .execute(conn)
                .context("failed to deactivate user")?;
            Ok(())
        })
        .await
    }

    /// Inserts a user with the `user` role and returns its id and access token.
    #[allow(dead_code)]
    pub async fn user_with_token(&self, username: &str) -> Result<(Uuid, String)> {
        let password = format!("{username}-password");
        let id = self.insert_user(username, &password, "user").await?;
        let token = self.login_token(username, &password).await?;
        Ok((id, token))
    }

    #[allow(dead_code)]
    pub async fn admin_token(&self) -> Result<String> {
        self.insert_user("admin", "admin-password", "admin").await?;
        self.login_token("admin", "admin-password").await
    }

    pub async fn login_token(&self, username: &str, password: &str) -> Result<String> {
        #[derive(Serialize)]
        struct LoginPayload<'a> {
            username: &'a str,
            password: &'a str,
        }

        let response = self
            .post_json(
                "/api/auth/login",
                &LoginPayload { username, password },
                None,
            )
            .await?;

        ensure!(
            response.status() == StatusCode::OK,
            "login failed with status {}",
            response.status()
        );

        let body = json_body(response).await?;
        body["access_token"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("login response without access_token"))
    }

    #[allow(dead_code)]
    pub async fn insert_unit(&self, name: &str) -> Result<Uuid> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let unit = NewUnit {
                id: Uuid::new_v4(),
                name,
            };
            diesel::insert_into(units::table)
                .values(&unit)
                .execute(conn)
                .context("failed to insert unit")?;
            Ok(unit.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn add_membership(&self, user_id: Uuid, unit_id: Uuid, role: &str) -> Result<()> {
        let role = role.to_string();
        self.with_conn(move |conn| {
            diesel::insert_into(unit_memberships::table)
                .values(&NewUnitMembership {
                    id: Uuid::new_v4(),
                    user_id,
                    unit_id,
                    role,
                })
                .execute(conn)
                .context("failed to insert membership")?;
            Ok(())
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_topic(&self, name: &str, unit_id: Uuid) -> Result<Uuid> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let topic = NewTopic {
                id: Uuid::new_v4(),
                name,
                unit_id,
            };
            diesel::insert_into(topics::table)
                .values(&topic)
                .execute(conn)
                .context("failed to insert topic")?;
            Ok(topic.id)
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_urgency(
        &self,
        name: &str,
        duration_days: i32,
        requires_justification: bool,
    ) -> Result<i32> {
        self.insert_urgency_level(name, duration_days, false, requires_justification)
            .await
    }

    #[allow(dead_code)]
    pub async fn insert_default_urgency(&self, name: &str, duration_days: i32) -> Result<i32> {
        self.insert_urgency_level(name, duration_days, true, false)
            .await
    }

    async fn insert_urgency_level(
        &self,
        name: &str,
        duration_days: i32,
        is_default: bool,
        requires_justification: bool,
    ) -> Result<i32> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            diesel::insert_into(referral_urgencies::table)
                .values(&NewReferralUrgency {
                    name,
                    duration_days,
                    is_default,
                    requires_justification,
                })
                .returning(referral_urgencies::id)
                .get_result(conn)
                .context("failed to insert urgency")
        })
        .await
    }

    /// Inserts a referral directly, bypassing the API and its side effects.
    #[allow(dead_code)]
    pub async fn insert_referral(
        &self,
        topic_id: Uuid,
        creator: Option<Uuid>,
        state: &str,
    ) -> Result<i32> {
        let state = state.to_string();
        self.with_conn(move |conn| {
            diesel::insert_into(referrals::table)
                .values(&NewReferral {
                    context: "Some context".to_string(),
                    prior_work: "Some prior work".to_string(),
                    question: "A question?".to_string(),
                    requester: "A requester".to_string(),
                    topic_id,
                    urgency_level_id: None,
                    urgency_explanation: String::new(),
                    state,
                    user_id: creator,
                })
                .returning(referrals::id)
                .get_result(conn)
                .context("failed to insert referral")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn insert_assignment(
        &self,
        referral_id: i32,
        assignee_id: Uuid,
        unit_id: Uuid,
    ) -> Result<()> {
        self.with_conn(move |conn| {
            diesel::insert_into(referral_assignments::table)
                .values(&NewReferralAssignment {
                    id: Uuid::new_v4(),
                    referral_id,
                    assignee_id,
                    unit_id: Some(unit_id),
                    created_by: None,
                })
                .execute(conn)
                .context("failed to insert assignment")?;
            Ok(())
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn referral_state(&self, referral_id: i32) -> Result<String> {
        self.with_conn(move |conn| {
            referrals::table
                .find(referral_id)
                .select(referrals::state)
                .first(conn)
                .context("failed to load referral state")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn jobs_by_type(&self, ty: &str) -> Result<Vec<Job>> {
        let ty = ty.to_string();
        self.with_conn(move |conn| {
            jobs::table
                .filter(jobs::job_type.eq(&ty))
                .order(jobs::created_at.asc())
                .load::<Job>(conn)
                .context("failed to load jobs")
        })
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json");
        let request = with_token(builder, token).body(Body::from(serde_json::to_vec(payload)?))?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::GET).uri(path);
        let request = with_token(builder, token).body(Body::empty())?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        let builder = Request::builder().method(Method::DELETE).uri(path);
        let request = with_token(builder, token).body(Body::empty())?;
        self.send(request).await
    }

    #[allow(dead_code)]
    pub async fn post_multipart(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        files: &[UploadFile<'_>],
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend(value.as_bytes());
            body.extend(b"\r\n");
        }

        for file in files {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!(
                    "Content-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\n",
                    file.name
                )
                .as_bytes(),
            );
            body.extend(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
            body.extend(file.data);
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let builder = Request::builder().method(Method::POST).uri(path).header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        );
        let request = with_token(builder, token).body(Body::from(body))?;
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> Result<hyper::Response<Body>> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .map_err(|err| anyhow!("router error: {err}"))
    }

    /// Makes every insert into `table` fail until the database is reset.
    #[allow(dead_code)]
    pub async fn reject_inserts_into(&self, table: &'static str) -> Result<()> {
        self.with_conn(move |conn| {
            conn.batch_execute(&format!(
                "CREATE OR REPLACE FUNCTION reject_insert() RETURNS trigger AS $$ \
                 BEGIN RAISE EXCEPTION 'inserts are disabled'; END; $$ LANGUAGE plpgsql; \
                 CREATE TRIGGER reject_insert BEFORE INSERT ON {table} \
                 FOR EACH ROW EXECUTE FUNCTION reject_insert();"
            ))
            .context("failed to install insert trigger")
        })
        .await
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

fn with_token(
    builder: axum::http::request::Builder,
    token: Option<&str>,
) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header("authorization", format!("Bearer {token}")),
        None => builder,
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn json_body(response: hyper::Response<Body>) -> Result<Value> {
    let bytes = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "DROP FUNCTION IF EXISTS reject_insert() CASCADE; \
         TRUNCATE TABLE referral_answer_attachments, referral_answers, referral_attachments, \
         referral_activities, referral_assignments, referrals, referral_urgencies, topics, \
         unit_memberships, units, refresh_tokens, jobs, users RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
