// src/task.rs

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::task::{CreateTaskRequest, Priority, Task, UpdateTaskRequest};
use crate::resolver::{resolve_fields, resolve_update};

const MAX_TITLE_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_CATEGORY_LEN: usize = 50;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Query parameters for listing tasks
#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub completed: Option<bool>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    pub total: u64,
    pub page: u64,
    pub pages: u64,
}

fn validate_create(payload: &CreateTaskRequest) -> Result<(), String> {
    let title = payload.title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(format!(
            "title must be between 1 and {} characters",
            MAX_TITLE_LEN
        ));
    }
    validate_optional_fields(
        payload.description.as_deref(),
        payload.category.as_deref(),
        payload.due_date,
    )
}

fn validate_update(payload: &UpdateTaskRequest) -> Result<(), String> {
    if let Some(title) = &payload.title {
        let title = title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
            return Err(format!(
                "title must be between 1 and {} characters",
                MAX_TITLE_LEN
            ));
        }
    }
    validate_optional_fields(
        payload.description.as_deref(),
        payload.category.as_deref(),
        payload.due_date,
    )
}

fn validate_optional_fields(
    description: Option<&str>,
    category: Option<&str>,
    due_date: Option<DateTime<Utc>>,
) -> Result<(), String> {
    if let Some(description) = description {
        if description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(format!(
                "description must be at most {} characters",
                MAX_DESCRIPTION_LEN
            ));
        }
    }
    if let Some(category) = category {
        if category.chars().count() > MAX_CATEGORY_LEN {
            return Err(format!(
                "category must be at most {} characters",
                MAX_CATEGORY_LEN
            ));
        }
    }
    if let Some(due_date) = due_date {
        if due_date <= Utc::now() {
            return Err("due_date must be in the future".to_string());
        }
    }
    Ok(())
}

/// Flip the completed flag, stamping `completed_at` when a task becomes
/// completed and clearing it when a task is reopened.
fn apply_completion(task: &mut Task, completed: bool, now: DateTime<Utc>) {
    if completed && !task.completed {
        task.completed_at = Some(now);
    } else if !completed && task.completed {
        task.completed_at = None;
    }
    task.completed = completed;
}

/// CREATE a new task; category/priority gaps are filled by the classifier.
pub async fn create_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateTaskRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };

    if let Err(msg) = validate_create(&payload) {
        return HttpResponse::BadRequest().body(msg);
    }

    let (category, priority) = resolve_fields(
        data.classifier.as_ref(),
        payload.title.trim(),
        payload.description.as_deref(),
        payload.category.clone(),
        payload.priority,
    )
    .await;

    let now = Utc::now();
    let new_task = Task {
        task_id: Uuid::new_v4().to_string(),
        user_id: current_user,
        title: payload.title.trim().to_string(),
        description: payload.description.clone(),
        due_date: payload.due_date,
        priority,
        category,
        completed: false,
        completed_at: None,
        created_at: now,
        updated_at: now,
    };

    let tasks_coll = data.mongodb.tasks();
    match tasks_coll.insert_one(&new_task).await {
        Ok(_) => {
            info!("Task created: {}", new_task.task_id);
            HttpResponse::Ok().json(&new_task)
        }
        Err(e) => {
            error!("Error inserting task: {}", e);
            HttpResponse::InternalServerError().body("Error inserting task")
        }
    }
}

/// LIST the caller's tasks with filtering, sorting and pagination.
pub async fn list_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<TaskListQuery>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };

    let mut filter = doc! { "user_id": &current_user };
    if let Some(completed) = query.completed {
        filter.insert("completed", completed);
    }
    if let Some(category) = &query.category {
        filter.insert("category", category);
    }
    if let Some(priority) = query.priority {
        filter.insert("priority", priority.as_str());
    }
    if let Some(search) = &query.search {
        let pattern = regex::escape(search);
        filter.insert(
            "$or",
            vec![
                doc! { "title": { "$regex": &pattern, "$options": "i" } },
                doc! { "description": { "$regex": &pattern, "$options": "i" } },
            ],
        );
    }

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = query.page.unwrap_or(1).max(1);
    let skip = (page - 1) * limit as u64;

    let sort_field = match query.sort_by.as_deref() {
        Some("due_date") => "due_date",
        Some("priority") => "priority",
        Some("title") => "title",
        Some("updated_at") => "updated_at",
        _ => "created_at",
    };
    let direction = if query.order.as_deref() == Some("asc") { 1 } else { -1 };
    let mut sort = Document::new();
    sort.insert(sort_field, direction);

    let tasks_coll = data.mongodb.tasks();
    let total = match tasks_coll.count_documents(filter.clone()).await {
        Ok(n) => n,
        Err(e) => {
            error!("Error counting tasks: {}", e);
            return HttpResponse::InternalServerError().body("Error counting tasks");
        }
    };

    let mut cursor = match tasks_coll
        .find(filter)
        .sort(sort)
        .skip(skip)
        .limit(limit)
        .await
    {
        Ok(cur) => cur,
        Err(e) => {
            error!("Error fetching tasks: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching tasks");
        }
    };

    let mut tasks = vec![];
    while let Some(task_res) = cursor.next().await {
        match task_res {
            Ok(task) => tasks.push(task),
            Err(e) => {
                error!("Error reading tasks: {}", e);
                return HttpResponse::InternalServerError().body("Error reading tasks");
            }
        }
    }

    let pages = if total == 0 {
        0
    } else {
        (total + limit as u64 - 1) / limit as u64
    };
    HttpResponse::Ok().json(TaskListResponse {
        tasks,
        total,
        page,
        pages,
    })
}

/// GET a single task
pub async fn get_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let task_id = path.into_inner();

    let tasks_coll = data.mongodb.tasks();
    let filter = doc! { "_id": &task_id, "user_id": &current_user };
    match tasks_coll.find_one(filter).await {
        Ok(Some(task)) => HttpResponse::Ok().json(task),
        Ok(None) => HttpResponse::NotFound().body("Task not found"),
        Err(e) => {
            error!("Error fetching task: {}", e);
            HttpResponse::InternalServerError().body("Error fetching task")
        }
    }
}

/// UPDATE an existing task. Changing the title or description re-runs the
/// classifier for any category/priority field the payload leaves out.
pub async fn update_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateTaskRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let task_id = path.into_inner();

    if update_is_empty(&payload) {
        return HttpResponse::BadRequest().body("No fields to update");
    }
    if let Err(msg) = validate_update(&payload) {
        return HttpResponse::BadRequest().body(msg);
    }

    let tasks_coll = data.mongodb.tasks();
    let filter = doc! { "_id": &task_id, "user_id": &current_user };
    let mut task = match tasks_coll.find_one(filter.clone()).await {
        Ok(Some(task)) => task,
        Ok(None) => return HttpResponse::NotFound().body("Task not found"),
        Err(e) => {
            error!("Error fetching task: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching task");
        }
    };

    // Resolve against the stored document before mutating it.
    let (category, priority) =
        resolve_update(data.classifier.as_ref(), &task, &payload).await;

    let now = Utc::now();
    if let Some(title) = &payload.title {
        task.title = title.trim().to_string();
    }
    if let Some(description) = &payload.description {
        task.description = Some(description.clone());
    }
    if let Some(due_date) = payload.due_date {
        task.due_date = Some(due_date);
    }
    if let Some(completed) = payload.completed {
        apply_completion(&mut task, completed, now);
    }
    task.category = category;
    task.priority = priority;
    task.updated_at = now;

    match tasks_coll.replace_one(filter, &task).await {
        Ok(res) if res.matched_count == 0 => HttpResponse::NotFound().body("Task not found"),
        Ok(_) => HttpResponse::Ok().json(&task),
        Err(e) => {
            error!("Error updating task: {}", e);
            HttpResponse::InternalServerError().body("Error updating task")
        }
    }
}

fn update_is_empty(p: &UpdateTaskRequest) -> bool {
    p.title.is_none()
        && p.description.is_none()
        && p.due_date.is_none()
        && p.priority.is_none()
        && p.category.is_none()
        && p.completed.is_none()
}

/// DELETE a task
pub async fn delete_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };
    let task_id = path.into_inner();

    let tasks_coll = data.mongodb.tasks();
    let filter = doc! { "_id": &task_id, "user_id": &current_user };
    match tasks_coll.delete_one(filter).await {
        Ok(res) => {
            if res.deleted_count == 0 {
                HttpResponse::NotFound().body("Task not found or already deleted")
            } else {
                HttpResponse::Ok().body("Task deleted successfully")
            }
        }
        Err(e) => {
            error!("Error deleting task: {}", e);
            HttpResponse::InternalServerError().body("Error deleting task")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::test_support::task_fixture;
    use chrono::Duration;

    #[test]
    fn completion_transition_sets_and_clears_timestamp() {
        let now = Utc::now();
        let mut task = task_fixture("A");

        apply_completion(&mut task, true, now);
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(now));

        // Re-completing an already completed task keeps the original stamp.
        let later = now + Duration::hours(1);
        apply_completion(&mut task, true, later);
        assert_eq!(task.completed_at, Some(now));

        apply_completion(&mut task, false, later);
        assert!(!task.completed);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn create_validation_enforces_lengths_and_future_due_date() {
        let valid = CreateTaskRequest {
            title: "Buy milk".to_string(),
            description: None,
            due_date: Some(Utc::now() + Duration::days(1)),
            priority: None,
            category: None,
        };
        assert!(validate_create(&valid).is_ok());

        let blank_title = CreateTaskRequest {
            title: "   ".to_string(),
            description: None,
            due_date: None,
            priority: None,
            category: None,
        };
        assert!(validate_create(&blank_title).is_err());

        let long_title = CreateTaskRequest {
            title: "x".repeat(MAX_TITLE_LEN + 1),
            description: None,
            due_date: None,
            priority: None,
            category: None,
        };
        assert!(validate_create(&long_title).is_err());

        let past_due = CreateTaskRequest {
            title: "Too late".to_string(),
            description: None,
            due_date: Some(Utc::now() - Duration::days(1)),
            priority: None,
            category: None,
        };
        assert!(validate_create(&past_due).is_err());
    }

    #[test]
    fn update_validation_only_checks_present_fields() {
        let empty = UpdateTaskRequest::default();
        assert!(update_is_empty(&empty));
        assert!(validate_update(&empty).is_ok());

        let long_category = UpdateTaskRequest {
            category: Some("c".repeat(MAX_CATEGORY_LEN + 1)),
            ..Default::default()
        };
        assert!(validate_update(&long_category).is_err());

        let fine = UpdateTaskRequest {
            completed: Some(true),
            ..Default::default()
        };
        assert!(!update_is_empty(&fine));
        assert!(validate_update(&fine).is_ok());
    }
}
