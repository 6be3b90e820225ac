use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use futures_util::StreamExt;
use log::error;
use mongodb::bson::doc;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::models::task::Task;
use crate::models::user::PublicUser;

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// GET /users/me
pub async fn get_profile(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };

    let users_collection = data.mongodb.users();
    match users_collection
        .find_one(doc! { "_id": &current_user })
        .await
    {
        Ok(Some(user)) => HttpResponse::Ok().json(PublicUser::from(user)),
        Ok(None) => HttpResponse::NotFound().body("User not found"),
        Err(e) => {
            error!("Error fetching user: {}", e);
            HttpResponse::InternalServerError().body("Error fetching user")
        }
    }
}

/// PUT /users/me
pub async fn update_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<UpdateProfileRequest>,
) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };

    let mut update_doc = doc! {};
    if let Some(username) = &payload.username {
        if username.trim().is_empty() {
            return HttpResponse::BadRequest().body("username must not be empty");
        }
        update_doc.insert("username", username.trim());
    }
    if let Some(email) = &payload.email {
        if !email.contains('@') {
            return HttpResponse::BadRequest().body("invalid email");
        }
        update_doc.insert("email", email);
    }
    if update_doc.is_empty() {
        return HttpResponse::BadRequest().body("No fields to update");
    }

    let users_collection = data.mongodb.users();
    let filter = doc! { "_id": &current_user };
    match users_collection
        .update_one(filter.clone(), doc! { "$set": update_doc })
        .await
    {
        Ok(res) if res.matched_count == 0 => HttpResponse::NotFound().body("User not found"),
        Ok(_) => match users_collection.find_one(filter).await {
            Ok(Some(user)) => HttpResponse::Ok().json(PublicUser::from(user)),
            Ok(None) => HttpResponse::NotFound().body("User not found"),
            Err(e) => {
                error!("Error fetching updated user: {}", e);
                HttpResponse::InternalServerError().body("Error fetching updated user")
            }
        },
        Err(e) => {
            error!("Error updating user: {}", e);
            HttpResponse::InternalServerError().body("Error updating user")
        }
    }
}

/// GET /users/me/export
/// Returns the caller's profile plus every task they own, as a
/// downloadable JSON document.
pub async fn export_user_data(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let current_user = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => return HttpResponse::Unauthorized().body("Unauthorized"),
    };

    let users_collection = data.mongodb.users();
    let user = match users_collection
        .find_one(doc! { "_id": &current_user })
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => return HttpResponse::NotFound().body("User not found"),
        Err(e) => {
            error!("Error fetching user for export: {}", e);
            return HttpResponse::InternalServerError().body("Error exporting data");
        }
    };

    let tasks_coll = data.mongodb.tasks();
    let mut cursor = match tasks_coll.find(doc! { "user_id": &current_user }).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching tasks for export: {}", e);
            return HttpResponse::InternalServerError().body("Error exporting data");
        }
    };

    let mut tasks: Vec<Task> = Vec::new();
    while let Some(task_res) = cursor.next().await {
        match task_res {
            Ok(task) => tasks.push(task),
            Err(e) => {
                error!("Error reading tasks for export: {}", e);
                return HttpResponse::InternalServerError().body("Error exporting data");
            }
        }
    }

    let export = serde_json::json!({
        "exportedAt": Utc::now(),
        "profile": PublicUser::from(user),
        "tasks": tasks,
    });
    HttpResponse::Ok()
        .insert_header((
            "Content-Disposition",
            "attachment; filename=\"taskpilot-export.json\"",
        ))
        .json(export)
}
