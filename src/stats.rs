//! Statistics over a user's tasks: scalar counts, priority/category
//! breakdowns and the AI insight hook for the dashboard.

use std::collections::HashMap;

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Duration, Utc};
use futures_util::StreamExt;
use log::error;
use mongodb::bson::doc;
use serde::Serialize;

use crate::ai::{TaskClassifier, NO_TASKS_INSIGHT};
use crate::app_state::AppState;
use crate::models::task::Task;

/// How far ahead "due this week" looks.
const DUE_SOON_DAYS: i64 = 7;

/// How many tasks are handed to the narrator.
const INSIGHT_SAMPLE: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    pub key: String,
    pub count: u64,
}

/// On-demand snapshot of one user's task collection. Computed per request,
/// never persisted.
#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub overdue: u64,
    pub due_this_week: u64,
    pub by_priority: Vec<GroupCount>,
    pub by_category: Vec<GroupCount>,
    pub completion_rate: f64,
    pub insights: String,
}

/// Pure aggregation over one user's tasks at the instant `now`.
///
/// Overdue and due-this-week only count pending tasks; the groupings cover
/// every task, so the priority counts always sum to `total`. The insights
/// field is left empty here and attached separately.
pub fn aggregate(tasks: &[Task], now: DateTime<Utc>) -> TaskStats {
    let week_ahead = now + Duration::days(DUE_SOON_DAYS);

    let total = tasks.len() as u64;
    let completed = tasks.iter().filter(|t| t.completed).count() as u64;
    let pending = total - completed;
    let overdue = tasks
        .iter()
        .filter(|t| !t.completed && t.due_date.map_or(false, |d| d < now))
        .count() as u64;
    let due_this_week = tasks
        .iter()
        .filter(|t| !t.completed && t.due_date.map_or(false, |d| now <= d && d <= week_ahead))
        .count() as u64;

    let mut by_priority: HashMap<&str, u64> = HashMap::new();
    let mut by_category: HashMap<&str, u64> = HashMap::new();
    for task in tasks {
        *by_priority.entry(task.priority.as_str()).or_insert(0) += 1;
        *by_category.entry(task.category.as_str()).or_insert(0) += 1;
    }

    let completion_rate = if total > 0 {
        completed as f64 / total as f64
    } else {
        0.0
    };

    TaskStats {
        total,
        completed,
        pending,
        overdue,
        due_this_week,
        by_priority: into_groups(by_priority),
        by_category: into_groups(by_category),
        completion_rate,
        insights: String::new(),
    }
}

fn into_groups(counts: HashMap<&str, u64>) -> Vec<GroupCount> {
    let mut groups: Vec<GroupCount> = counts
        .into_iter()
        .map(|(key, count)| GroupCount {
            key: key.to_string(),
            count,
        })
        .collect();
    groups.sort_by(|a, b| a.key.cmp(&b.key));
    groups
}

/// Aggregate and attach the narrator's summary. An empty collection never
/// reaches the narrator; the fixed "no tasks" sentence is used directly.
pub async fn with_insights(
    classifier: &dyn TaskClassifier,
    tasks: &[Task],
    now: DateTime<Utc>,
) -> TaskStats {
    let mut stats = aggregate(tasks, now);
    stats.insights = if tasks.is_empty() {
        NO_TASKS_INSIGHT.to_string()
    } else {
        let sample = &tasks[..tasks.len().min(INSIGHT_SAMPLE)];
        classifier.summarize(sample).await
    };
    stats
}

/// GET /tasks/stats
pub async fn get_task_stats(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };

    let tasks_coll = data.mongodb.tasks();
    let mut cursor = match tasks_coll.find(doc! { "user_id": &current_user }).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching tasks for stats: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching tasks");
        }
    };

    let mut tasks = Vec::new();
    while let Some(task_res) = cursor.next().await {
        match task_res {
            Ok(task) => tasks.push(task),
            Err(e) => {
                error!("Error reading tasks for stats: {}", e);
                return HttpResponse::InternalServerError().body("Error reading tasks");
            }
        }
    }

    let stats = with_insights(data.classifier.as_ref(), &tasks, Utc::now()).await;
    HttpResponse::Ok().json(stats)
}
