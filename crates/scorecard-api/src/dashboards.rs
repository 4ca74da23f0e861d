//! Dashboard resource
//!
//! CRUD plus breakdown, issues and recalculation for scorecard dashboards.
//! Handlers validate cheap inputs (ids, score types, group-by tokens) before
//! opening a session, then run one of the operations below against the
//! request's scoring engine.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use dq_scorecard_core::{
    apply_criteria_update, normalize_display_category, normalize_group_by,
    validation::{parse_dashboard_id, validate_dashboard_name, validate_project_code},
    Category, Criteria, DashboardDefinition, DefinitionQuery, FilterCondition, Result,
    ScoreCard, ScoreType, ScorecardError, SortField, HISTORY_WINDOW,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::ScoringEngine;
use crate::error::ApiError;
use crate::scorecards::{
    self, BreakdownItemResponse, DashboardResponse, IssueItemResponse,
};
use crate::session::with_session;
use crate::AppState;

pub const RECALCULATED_MESSAGE: &str = "Dashboard scores recalculated successfully";

// ============================================================================
// Request / Response Schemas
// ============================================================================

fn default_true() -> bool {
    true
}

/// Body of `POST /dashboards`
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardCreate {
    pub name: String,
    pub project_code: String,
    #[serde(default = "default_true")]
    pub total_score: bool,
    #[serde(default)]
    pub cde_score: bool,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    #[serde(default = "default_true")]
    pub group_by_field: bool,
}

/// Body of `PUT /dashboards/:id`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardUpdate {
    pub name: Option<String>,
    pub total_score: Option<bool>,
    pub cde_score: Option<bool>,
    pub category: Option<String>,
    /// Replaces the criteria when present, even if empty
    pub filters: Option<Vec<FilterCondition>>,
    pub group_by_field: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub project_code: Option<String>,
    pub name_filter: Option<String>,
    pub sorted_by: Option<String>,
    #[serde(default)]
    pub include_scores: bool,
    #[serde(default)]
    pub include_history: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadParams {
    #[serde(default)]
    pub include_breakdown: bool,
    #[serde(default = "default_true")]
    pub include_history: bool,
}

impl Default for ReadParams {
    fn default() -> Self {
        Self {
            include_breakdown: false,
            include_history: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakdownParams {
    pub score_type: String,
    pub group_by: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuesParams {
    pub score_type: String,
    pub group_by: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalculateResponse {
    pub message: String,
    pub dashboard: DashboardResponse,
}

// ============================================================================
// Operations
// ============================================================================

fn ensure_project<E: ScoringEngine + ?Sized>(engine: &E, project_code: &str) -> Result<()> {
    if engine.project_exists(project_code)? {
        Ok(())
    } else {
        Err(ScorecardError::ProjectNotFound(project_code.to_string()))
    }
}

fn load_dashboard<E: ScoringEngine + ?Sized>(engine: &E, id: &Uuid) -> Result<DashboardDefinition> {
    engine
        .get_definition(id)?
        .ok_or_else(|| ScorecardError::DashboardNotFound(id.to_string()))
}

/// Create a dashboard and return its freshly computed, cached card.
pub fn create_dashboard<E: ScoringEngine + ?Sized>(
    engine: &E,
    request: DashboardCreate,
) -> Result<ScoreCard> {
    validate_dashboard_name(&request.name)?;
    validate_project_code(&request.project_code)?;
    ensure_project(engine, &request.project_code)?;

    let mut definition = DashboardDefinition::new(request.project_code, request.name);
    definition.total_score = request.total_score;
    definition.cde_score = request.cde_score;
    definition.category = request
        .category
        .as_deref()
        .map(normalize_display_category)
        .transpose()?;
    definition.criteria = Criteria::from_filters(request.filters, request.group_by_field);

    engine.save_definition(&definition)?;
    tracing::info!(
        dashboard_id = %definition.id,
        project_code = %definition.project_code,
        filters = definition.criteria.filters.len(),
        "Created dashboard"
    );

    engine.score_card(&definition, true)
}

pub fn list_dashboards<E: ScoringEngine + ?Sized>(
    engine: &E,
    params: &ListParams,
) -> Result<Vec<ScoreCard>> {
    let sorted_by = params
        .sorted_by
        .as_deref()
        .map(str::parse::<SortField>)
        .transpose()?
        .unwrap_or_default();

    if let Some(project_code) = &params.project_code {
        ensure_project(engine, project_code)?;
    }

    let definitions = engine.list_definitions(&DefinitionQuery {
        project_code: params.project_code.clone(),
        name_filter: params.name_filter.clone(),
        sorted_by,
        last_history_items: if params.include_history {
            HISTORY_WINDOW
        } else {
            0
        },
    })?;

    definitions
        .iter()
        .map(|definition| {
            scorecards::list_card(
                engine,
                definition,
                params.include_scores,
                params.include_history,
            )
        })
        .collect()
}

pub fn read_dashboard<E: ScoringEngine + ?Sized>(
    engine: &E,
    id: &Uuid,
    params: &ReadParams,
) -> Result<DashboardResponse> {
    let definition = load_dashboard(engine, id)?;

    let breakdown = if params.include_breakdown {
        let group_by = definition.category.unwrap_or(Category::TableGroupsName);
        Some(engine.breakdown(&definition, definition.primary_score_type(), group_by)?)
    } else {
        None
    };

    let card = scorecards::read_card(engine, definition, params.include_history)?;
    let mut response = DashboardResponse::from(card);
    response.breakdown =
        breakdown.map(|items| items.into_iter().map(BreakdownItemResponse::from).collect());
    Ok(response)
}

/// Apply a partial update and return the cached card with its definition.
pub fn update_dashboard<E: ScoringEngine + ?Sized>(
    engine: &E,
    id: &Uuid,
    update: DashboardUpdate,
) -> Result<ScoreCard> {
    let mut definition = load_dashboard(engine, id)?;

    if let Some(name) = update.name {
        validate_dashboard_name(&name)?;
        definition.name = name;
    }
    if let Some(total_score) = update.total_score {
        definition.total_score = total_score;
    }
    if let Some(cde_score) = update.cde_score {
        definition.cde_score = cde_score;
    }
    if let Some(category) = update.category.as_deref() {
        definition.category = Some(normalize_display_category(category)?);
    }
    definition.criteria =
        apply_criteria_update(&definition.criteria, update.filters, update.group_by_field);

    engine.save_definition(&definition)?;
    tracing::info!(dashboard_id = %definition.id, "Updated dashboard");

    engine.cached_score_card(&definition, true)
}

pub fn delete_dashboard<E: ScoringEngine + ?Sized>(engine: &E, id: &Uuid) -> Result<()> {
    load_dashboard(engine, id)?;
    if !engine.delete_definition(id)? {
        return Err(ScorecardError::DashboardNotFound(id.to_string()));
    }
    tracing::info!(dashboard_id = %id, "Deleted dashboard");
    Ok(())
}

pub fn recalculate_dashboard<E: ScoringEngine + ?Sized>(engine: &E, id: &Uuid) -> Result<ScoreCard> {
    let definition = load_dashboard(engine, id)?;
    let card = scorecards::recalculated_card(engine, definition)?;
    tracing::info!(dashboard_id = %id, "Recalculated dashboard");
    Ok(card)
}

pub fn dashboard_breakdown<E: ScoringEngine + ?Sized>(
    engine: &E,
    id: &Uuid,
    score_type: ScoreType,
    group_by: Category,
) -> Result<Vec<BreakdownItemResponse>> {
    let definition = load_dashboard(engine, id)?;
    let items = engine.breakdown(&definition, score_type, group_by)?;
    Ok(items.into_iter().map(BreakdownItemResponse::from).collect())
}

pub fn dashboard_issues<E: ScoringEngine + ?Sized>(
    engine: &E,
    id: &Uuid,
    score_type: ScoreType,
    group_by: Category,
    value: &str,
) -> Result<Vec<IssueItemResponse>> {
    let definition = load_dashboard(engine, id)?;
    let issues = engine.issues(&definition, score_type, group_by, value)?;
    Ok(issues.into_iter().map(IssueItemResponse::from).collect())
}

// ============================================================================
// Handlers
// ============================================================================

type HandlerResult<T> = std::result::Result<T, ApiError>;

fn record<T>(operation: &'static str, result: &HandlerResult<T>) {
    #[cfg(feature = "metrics")]
    crate::metrics::record_dashboard_operation(
        operation,
        if result.is_ok() { "success" } else { "error" },
    );
    #[cfg(not(feature = "metrics"))]
    let _ = (operation, result);
}

fn parse_score_type(raw: &str) -> Result<ScoreType> {
    raw.parse()
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboards", post(create_handler).get(list_handler))
        .route(
            "/dashboards/:id",
            get(read_handler).put(update_handler).delete(delete_handler),
        )
        .route("/dashboards/:id/recalculate", post(recalculate_handler))
        .route("/dashboards/:id/breakdown", get(breakdown_handler))
        .route("/dashboards/:id/issues", get(issues_handler))
}

async fn create_handler(
    State(state): State<AppState>,
    Json(request): Json<DashboardCreate>,
) -> HandlerResult<(StatusCode, Json<DashboardResponse>)> {
    let result = with_session(&state, move |engine| create_dashboard(engine, request)).await;
    record("create", &result);
    Ok((StatusCode::CREATED, Json(result?.into())))
}

async fn list_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> HandlerResult<Json<Vec<DashboardResponse>>> {
    let cards = with_session(&state, move |engine| list_dashboards(engine, &params)).await?;
    tracing::debug!(count = cards.len(), "Listed dashboards");
    Ok(Json(cards.into_iter().map(DashboardResponse::from).collect()))
}

async fn read_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Query(params): Query<ReadParams>,
) -> HandlerResult<Json<DashboardResponse>> {
    let id = parse_dashboard_id(&raw_id)?;
    let response = with_session(&state, move |engine| read_dashboard(engine, &id, &params)).await?;
    Ok(Json(response))
}

async fn update_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Json(update): Json<DashboardUpdate>,
) -> HandlerResult<Json<DashboardResponse>> {
    let id = parse_dashboard_id(&raw_id)?;
    let result = with_session(&state, move |engine| update_dashboard(engine, &id, update)).await;
    record("update", &result);
    Ok(Json(result?.into()))
}

async fn delete_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> HandlerResult<StatusCode> {
    let id = parse_dashboard_id(&raw_id)?;
    let result = with_session(&state, move |engine| delete_dashboard(engine, &id)).await;
    record("delete", &result);
    result?;
    Ok(StatusCode::NO_CONTENT)
}

async fn recalculate_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> HandlerResult<Json<RecalculateResponse>> {
    let id = parse_dashboard_id(&raw_id)?;
    let result = with_session(&state, move |engine| recalculate_dashboard(engine, &id)).await;
    record("recalculate", &result);
    Ok(Json(RecalculateResponse {
        message: RECALCULATED_MESSAGE.to_string(),
        dashboard: result?.into(),
    }))
}

async fn breakdown_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Query(params): Query<BreakdownParams>,
) -> HandlerResult<Json<Vec<BreakdownItemResponse>>> {
    let id = parse_dashboard_id(&raw_id)?;
    let score_type = parse_score_type(&params.score_type)?;
    let group_by = normalize_group_by(&params.group_by)?;

    let result = with_session(&state, move |engine| {
        dashboard_breakdown(engine, &id, score_type, group_by)
    })
    .await;
    record("breakdown", &result);
    Ok(Json(result?))
}

async fn issues_handler(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    Query(params): Query<IssuesParams>,
) -> HandlerResult<Json<Vec<IssueItemResponse>>> {
    let id = parse_dashboard_id(&raw_id)?;
    let score_type = parse_score_type(&params.score_type)?;
    let group_by = normalize_group_by(&params.group_by)?;
    let value = params.value;

    let result = with_session(&state, move |engine| {
        dashboard_issues(engine, &id, score_type, group_by, &value)
    })
    .await;
    record("issues", &result);
    Ok(Json(result?))
}
