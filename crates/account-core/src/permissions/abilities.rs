// ABOUTME: Ability definitions per account kind (anonymous, deleted, user, admin)
// ABOUTME: Single place where the account permission policy is written down
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

use super::{Ability, AbilityBuilder, Actions, SubjectType};
use crate::models::User;

/// Profile fields a user may change on their own account
pub const SELF_EDITABLE_USER_FIELDS: &[&str] = &["name", "username", "image", "email", "password"];

/// Build the ability for the caller
///
/// - anonymous callers may only register
/// - soft-deleted accounts may do nothing (restore goes through credentials, not a session)
/// - users manage their own profile, sessions, notifications and linked accounts
/// - admins manage everything except their own role
#[must_use]
pub fn define_abilities_for(user: Option<&User>) -> Ability {
    let Some(user) = user else {
        let mut builder = AbilityBuilder::new(None);
        builder.can(Actions::CREATE, SubjectType::User);
        return builder.build();
    };

    let mut builder = AbilityBuilder::new(Some(user.id));
    if user.is_deleted {
        return builder.build();
    }

    if user.is_admin() {
        builder.can(Actions::MANAGE, SubjectType::All);
        builder
            .cannot_own(Actions::UPDATE, SubjectType::User)
            .fields(&["role"])
            .because("Administrators cannot change their own role");
        return builder.build();
    }

    builder.can_own(Actions::READ | Actions::DELETE, SubjectType::User);
    builder
        .can_own(Actions::UPDATE, SubjectType::User)
        .fields(SELF_EDITABLE_USER_FIELDS);
    builder.can_own(
        Actions::READ | Actions::UPDATE | Actions::DELETE,
        SubjectType::Notification,
    );
    builder.can_own(Actions::READ | Actions::DELETE, SubjectType::Session);
    builder.can_own(Actions::READ | Actions::DELETE, SubjectType::Account);
    builder
        .cannot(Actions::UPDATE, SubjectType::User)
        .fields(&["role"])
        .because("Only administrators can change roles");
    builder.build()
}
