#![allow(dead_code)]

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use study_resource_hub::database_sea::connect_database;
use study_resource_hub::models::entity::users;
use study_resource_hub::models::{CreateResourceRequest, CreateUserRequest};
use study_resource_hub::{AccessPolicy, ResourceStore, UserStore};

pub async fn memory_db() -> DatabaseConnection {
    connect_database("sqlite::memory:")
        .await
        .expect("in-memory sqlite should connect")
}

pub async fn stores() -> (ResourceStore, UserStore) {
    let db = memory_db().await;
    (
        ResourceStore::new(db.clone(), Arc::new(AccessPolicy::default())),
        UserStore::new(db),
    )
}

pub async fn add_user(users: &UserStore, name: &str, role: &str, is_premium: bool) -> users::Model {
    users
        .create_user(&CreateUserRequest {
            name: Some(name.to_string()),
            email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
            role: Some(role.to_string()),
            is_premium,
        })
        .await
        .expect("user should be created")
}

pub fn algebra_notes() -> CreateResourceRequest {
    CreateResourceRequest {
        title: Some("Algebra Notes".to_string()),
        description: Some("Chapter 3 notes on quadratics".to_string()),
        file_url: Some("https://cdn.example.com/algebra.pdf".to_string()),
        file_type: Some("pdf".to_string()),
        file_size: Some(500_000),
        category: Some("lecture_notes".to_string()),
        subject: Some("Math".to_string()),
        ..Default::default()
    }
}

pub fn resource_titled(title: &str, subject: &str, category: &str) -> CreateResourceRequest {
    CreateResourceRequest {
        title: Some(title.to_string()),
        subject: Some(subject.to_string()),
        category: Some(category.to_string()),
        ..algebra_notes()
    }
}
