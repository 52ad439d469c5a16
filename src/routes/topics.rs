use std::collections::HashMap;

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::AuthenticatedUser,
    error::{AppError, AppResult},
    models::{NewTopic, Topic, Unit},
    routes::units::UnitSummary,
    schema::{topics, units},
    state::AppState,
};

#[derive(Debug, Clone, Serialize)]
pub struct TopicResponse {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub unit: UnitSummary,
}

impl TopicResponse {
    pub fn new(topic: Topic, unit: UnitSummary) -> Self {
        Self {
            id: topic.id,
            name: topic.name,
            created_at: topic.created_at.and_utc(),
            unit,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateTopicRequest {
    pub name: String,
    pub unit_id: Uuid,
}

pub async fn list_topics(State(state): State<AppState>) -> AppResult<Json<Vec<TopicResponse>>> {
    let mut conn = state.db()?;
    let rows: Vec<(Topic, Unit)> = topics::table
        .inner_join(units::table)
        .order((units::name.asc(), topics::name.asc()))
        .load(&mut conn)?;

    let mut unit_cache: HashMap<Uuid, UnitSummary> = HashMap::new();
    let response = rows
        .into_iter()
        .map(|(topic, unit)| {
            let summary = unit_cache
                .entry(unit.id)
                .or_insert_with(|| UnitSummary::from(unit))
                .clone();
            TopicResponse::new(topic, summary)
        })
        .collect();

    Ok(Json(response))
}

pub async fn create_topic(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateTopicRequest>,
) -> AppResult<(StatusCode, Json<TopicResponse>)> {
    user.require_admin()?;
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let mut conn = state.db()?;
    let unit = units::table
        .find(payload.unit_id)
        .first::<Unit>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::bad_request("unit does not exist"))?;

    let new_topic = NewTopic {
        id: Uuid::new_v4(),
        name: name.to_string(),
        unit_id: unit.id,
    };
    diesel::insert_into(topics::table)
        .values(&new_topic)
        .execute(&mut conn)?;

    let topic: Topic = topics::table.find(new_topic.id).first(&mut conn)?;
    Ok((
        StatusCode::CREATED,
        Json(TopicResponse::new(topic, unit.into())),
    ))
}
