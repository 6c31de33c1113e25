// ABOUTME: In-app notification inbox of the caller
// ABOUTME: Each operation checks the caller's ability on the notification it touches
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use std::sync::Arc;

use account_core::errors::{AppError, AppResult};
use account_core::models::Notification;
use account_core::permissions::{define_abilities_for, Actions, SubjectType};
use chrono::Utc;
use uuid::Uuid;

use super::types::{
    page_size, AuthenticatedUser, CountResponse, MessageResponse, NotificationsQuery,
};
use crate::database_plugins::DatabaseProvider;
use crate::resources::ServerResources;

/// Notification inbox
#[derive(Clone)]
pub struct NotificationService {
    resources: Arc<ServerResources>,
}

impl NotificationService {
    /// Service over shared resources
    #[must_use]
    pub const fn new(resources: Arc<ServerResources>) -> Self {
        Self { resources }
    }

    /// Newest notifications of the caller
    ///
    /// # Errors
    ///
    /// Returns `PERMISSION_DENIED` or a database error
    pub async fn list(
        &self,
        caller: &AuthenticatedUser,
        query: &NotificationsQuery,
    ) -> AppResult<Vec<Notification>> {
        define_abilities_for(Some(&caller.user))
            .ensure_type(Actions::READ, SubjectType::Notification)?;
        self.resources
            .database
            .list_notifications(caller.user.id, query.unread_only, page_size(query.limit))
            .await
    }

    /// Number of unread notifications of the caller
    ///
    /// # Errors
    ///
    /// Returns `PERMISSION_DENIED` or a database error
    pub async fn unread_count(&self, caller: &AuthenticatedUser) -> AppResult<CountResponse> {
        define_abilities_for(Some(&caller.user))
            .ensure_type(Actions::READ, SubjectType::Notification)?;
        let count = self
            .resources
            .database
            .count_unread_notifications(caller.user.id)
            .await?;
        Ok(CountResponse { count })
    }

    /// Mark one notification read and return it
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` or `PERMISSION_DENIED`
    pub async fn mark_read(
        &self,
        caller: &AuthenticatedUser,
        notification_id: Uuid,
    ) -> AppResult<Notification> {
        let mut notification = self.load(notification_id).await?;
        define_abilities_for(Some(&caller.user)).ensure(Actions::UPDATE, &notification)?;

        if notification.read_at.is_none() {
            let now = Utc::now();
            self.resources
                .database
                .mark_notification_read(notification.id, now)
                .await?;
            notification.read_at = Some(now);
        }
        Ok(notification)
    }

    /// Mark every unread notification of the caller read
    ///
    /// # Errors
    ///
    /// Returns `PERMISSION_DENIED` or a database error
    pub async fn mark_all_read(&self, caller: &AuthenticatedUser) -> AppResult<CountResponse> {
        define_abilities_for(Some(&caller.user))
            .ensure_type(Actions::UPDATE, SubjectType::Notification)?;
        let updated = self
            .resources
            .database
            .mark_all_notifications_read(caller.user.id, Utc::now())
            .await?;
        Ok(CountResponse {
            count: i64::try_from(updated).unwrap_or(i64::MAX),
        })
    }

    /// Delete one notification
    ///
    /// # Errors
    ///
    /// Returns `RESOURCE_NOT_FOUND` or `PERMISSION_DENIED`
    pub async fn delete(
        &self,
        caller: &AuthenticatedUser,
        notification_id: Uuid,
    ) -> AppResult<MessageResponse> {
        let notification = self.load(notification_id).await?;
        define_abilities_for(Some(&caller.user)).ensure(Actions::DELETE, &notification)?;
        self.resources
            .database
            .delete_notification(notification.id)
            .await?;
        Ok(MessageResponse::new("Notification deleted"))
    }

    async fn load(&self, notification_id: Uuid) -> AppResult<Notification> {
        self.resources
            .database
            .get_notification(notification_id)
            .await?
            .ok_or_else(|| AppError::not_found("Notification"))
    }
}
