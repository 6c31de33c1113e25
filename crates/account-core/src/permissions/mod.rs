// ABOUTME: Rule based ability engine deciding which actions a user may take on which records
// ABOUTME: Supports ownership conditions, field restrictions and inverted (deny) rules
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

//! # Abilities
//!
//! An [`Ability`] is an ordered list of [`Rule`]s. A check walks the rules from
//! last to first and the first rule that applies decides: allow for a normal
//! rule, deny for an inverted one. No applicable rule means deny.
//!
//! A rule applies when its actions contain the requested action, its subject
//! type matches (or is [`SubjectType::All`]) and:
//!
//! - for ownership rules, the record's owner is the acting user. On a
//!   type-level check (no record at hand) an ownership allow rule applies and an
//!   ownership deny rule does not, since some record could still be allowed.
//! - for field rules, the requested field is listed. A check without a field
//!   applies field-restricted allow rules but not field-restricted deny rules.

mod abilities;

pub use abilities::{define_abilities_for, SELF_EDITABLE_USER_FIELDS};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{LinkedAccount, Notification, Session, User};

bitflags! {
    /// Actions a rule can grant or deny
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Actions: u8 {
        /// Create a record
        const CREATE = 0b0001;
        /// Read a record
        const READ = 0b0010;
        /// Modify a record
        const UPDATE = 0b0100;
        /// Remove a record
        const DELETE = 0b1000;
        /// Every action
        const MANAGE = Self::CREATE.bits() | Self::READ.bits() | Self::UPDATE.bits() | Self::DELETE.bits();
    }
}

impl Actions {
    fn label(self) -> &'static str {
        if self == Self::CREATE {
            "create"
        } else if self == Self::READ {
            "read"
        } else if self == Self::UPDATE {
            "update"
        } else if self == Self::DELETE {
            "delete"
        } else {
            "manage"
        }
    }
}

/// Kinds of records rules are written against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectType {
    /// Wildcard matching every subject
    All,
    /// User accounts
    User,
    /// Sign-in sessions
    Session,
    /// Notifications
    Notification,
    /// Linked provider accounts
    Account,
}

impl SubjectType {
    const fn label(self) -> &'static str {
        match self {
            Self::All => "resource",
            Self::User => "user",
            Self::Session => "session",
            Self::Notification => "notification",
            Self::Account => "linked account",
        }
    }
}

/// A record that abilities can be checked against
pub trait Subject {
    /// Type the record belongs to
    fn subject_type(&self) -> SubjectType;

    /// User that owns the record
    fn owner_id(&self) -> Uuid;
}

impl Subject for User {
    fn subject_type(&self) -> SubjectType {
        SubjectType::User
    }

    fn owner_id(&self) -> Uuid {
        self.id
    }
}

impl Subject for Session {
    fn subject_type(&self) -> SubjectType {
        SubjectType::Session
    }

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Subject for Notification {
    fn subject_type(&self) -> SubjectType {
        SubjectType::Notification
    }

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

impl Subject for LinkedAccount {
    fn subject_type(&self) -> SubjectType {
        SubjectType::Account
    }

    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

/// One allow or deny rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Actions covered
    pub actions: Actions,
    /// Subject covered
    pub subject: SubjectType,
    /// Restrict to records owned by the acting user
    pub owner_only: bool,
    /// Restrict to these fields
    pub fields: Option<Vec<String>>,
    /// Deny instead of allow
    pub inverted: bool,
    /// Message returned when this rule denies
    pub reason: Option<String>,
}

impl Rule {
    /// Restrict the rule to the given fields
    pub fn fields(&mut self, fields: &[&str]) -> &mut Self {
        self.fields = Some(fields.iter().map(|f| (*f).to_owned()).collect());
        self
    }

    /// Message returned when this rule denies
    pub fn because(&mut self, reason: impl Into<String>) -> &mut Self {
        self.reason = Some(reason.into());
        self
    }

    fn applies(&self, action: Actions, check: &Check<'_>, actor_id: Option<Uuid>) -> bool {
        if !self.actions.contains(action) {
            return false;
        }
        if self.subject != SubjectType::All && self.subject != check.subject {
            return false;
        }
        if self.owner_only {
            match check.owner {
                Some(owner) => {
                    if actor_id != Some(owner) {
                        return false;
                    }
                }
                None => {
                    if self.inverted {
                        return false;
                    }
                }
            }
        }
        match (check.field, &self.fields) {
            (_, None) => true,
            (None, Some(_)) => !self.inverted,
            (Some(field), Some(fields)) => fields.iter().any(|f| f == field),
        }
    }
}

struct Check<'a> {
    subject: SubjectType,
    owner: Option<Uuid>,
    field: Option<&'a str>,
}

/// Builder collecting rules in declaration order
#[derive(Debug, Default)]
pub struct AbilityBuilder {
    actor_id: Option<Uuid>,
    rules: Vec<Rule>,
}

impl AbilityBuilder {
    /// Start an ability for `actor_id` (`None` for anonymous callers)
    #[must_use]
    pub const fn new(actor_id: Option<Uuid>) -> Self {
        Self {
            actor_id,
            rules: Vec::new(),
        }
    }

    fn push(
        &mut self,
        actions: Actions,
        subject: SubjectType,
        owner_only: bool,
        inverted: bool,
    ) -> &mut Rule {
        self.rules.push(Rule {
            actions,
            subject,
            owner_only,
            fields: None,
            inverted,
            reason: None,
        });
        let last = self.rules.len() - 1;
        &mut self.rules[last]
    }

    /// Allow `actions` on every record of `subject`
    pub fn can(&mut self, actions: Actions, subject: SubjectType) -> &mut Rule {
        self.push(actions, subject, false, false)
    }

    /// Allow `actions` on records of `subject` owned by the actor
    pub fn can_own(&mut self, actions: Actions, subject: SubjectType) -> &mut Rule {
        self.push(actions, subject, true, false)
    }

    /// Deny `actions` on every record of `subject`
    pub fn cannot(&mut self, actions: Actions, subject: SubjectType) -> &mut Rule {
        self.push(actions, subject, false, true)
    }

    /// Deny `actions` on records of `subject` owned by the actor
    pub fn cannot_own(&mut self, actions: Actions, subject: SubjectType) -> &mut Rule {
        self.push(actions, subject, true, true)
    }

    /// Finish the ability
    #[must_use]
    pub fn build(self) -> Ability {
        Ability {
            actor_id: self.actor_id,
            rules: self.rules,
        }
    }
}

/// Compiled set of rules for one actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ability {
    actor_id: Option<Uuid>,
    rules: Vec<Rule>,
}

impl Ability {
    /// Rules in declaration order
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    fn decide(&self, action: Actions, check: &Check<'_>) -> Option<&Rule> {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.applies(action, check, self.actor_id))
    }

    fn allowed(&self, action: Actions, check: &Check<'_>) -> bool {
        self.decide(action, check)
            .is_some_and(|rule| !rule.inverted)
    }

    /// Whether `action` is allowed on `subject`
    #[must_use]
    pub fn can(&self, action: Actions, subject: &impl Subject) -> bool {
        self.allowed(action, &instance_check(subject, None))
    }

    /// Whether `action` is allowed on `field` of `subject`
    #[must_use]
    pub fn can_field(&self, action: Actions, subject: &impl Subject, field: &str) -> bool {
        self.allowed(action, &instance_check(subject, Some(field)))
    }

    /// Whether `action` is allowed on at least some records of `subject_type`
    #[must_use]
    pub fn can_type(&self, action: Actions, subject_type: SubjectType) -> bool {
        self.allowed(
            action,
            &Check {
                subject: subject_type,
                owner: None,
                field: None,
            },
        )
    }

    /// Negation of [`Ability::can`]
    #[must_use]
    pub fn cannot(&self, action: Actions, subject: &impl Subject) -> bool {
        !self.can(action, subject)
    }

    /// Fail with `PERMISSION_DENIED` unless `action` is allowed on `subject`
    ///
    /// # Errors
    ///
    /// Returns a permission error carrying the deciding rule's reason, if any
    pub fn ensure(&self, action: Actions, subject: &impl Subject) -> AppResult<()> {
        self.ensure_check(action, &instance_check(subject, None))
    }

    /// Fail with `PERMISSION_DENIED` unless `action` is allowed on `field` of `subject`
    ///
    /// # Errors
    ///
    /// Returns a permission error carrying the deciding rule's reason, if any
    pub fn ensure_field(
        &self,
        action: Actions,
        subject: &impl Subject,
        field: &str,
    ) -> AppResult<()> {
        self.ensure_check(action, &instance_check(subject, Some(field)))
    }

    /// Fail with `PERMISSION_DENIED` unless `action` is allowed on some records of `subject_type`
    ///
    /// # Errors
    ///
    /// Returns a permission error carrying the deciding rule's reason, if any
    pub fn ensure_type(&self, action: Actions, subject_type: SubjectType) -> AppResult<()> {
        self.ensure_check(
            action,
            &Check {
                subject: subject_type,
                owner: None,
                field: None,
            },
        )
    }

    fn ensure_check(&self, action: Actions, check: &Check<'_>) -> AppResult<()> {
        match self.decide(action, check) {
            Some(rule) if !rule.inverted => Ok(()),
            Some(Rule {
                reason: Some(reason),
                ..
            }) => Err(AppError::permission_denied(reason.clone())),
            _ => {
                let target = check.field.map_or_else(
                    || check.subject.label().to_owned(),
                    |field| format!("{field} of this {}", check.subject.label()),
                );
                Err(AppError::permission_denied(format!(
                    "You are not allowed to {} {target}",
                    action.label()
                )))
            }
        }
    }
}

fn instance_check<'a>(subject: &impl Subject, field: Option<&'a str>) -> Check<'a> {
    Check {
        subject: subject.subject_type(),
        owner: Some(subject.owner_id()),
        field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::models::NotificationKind;

    fn note_for(user_id: Uuid) -> Notification {
        Notification::new(user_id, NotificationKind::Security, "t", "b")
    }

    #[test]
    fn test_no_rules_denies() {
        let ability = AbilityBuilder::new(None).build();
        assert!(!ability.can_type(Actions::READ, SubjectType::User));
    }

    #[test]
    fn test_manage_all_covers_everything() {
        let mut builder = AbilityBuilder::new(Some(Uuid::new_v4()));
        builder.can(Actions::MANAGE, SubjectType::All);
        let ability = builder.build();
        assert!(ability.can(Actions::DELETE, &note_for(Uuid::new_v4())));
        assert!(ability.can_type(Actions::CREATE, SubjectType::Session));
    }

    #[test]
    fn test_later_rule_wins() {
        let mut builder = AbilityBuilder::new(Some(Uuid::new_v4()));
        builder.can(Actions::READ, SubjectType::Notification);
        builder.cannot(Actions::READ, SubjectType::Notification);
        assert!(!builder
            .build()
            .can_type(Actions::READ, SubjectType::Notification));

        let mut builder = AbilityBuilder::new(Some(Uuid::new_v4()));
        builder.cannot(Actions::READ, SubjectType::Notification);
        builder.can(Actions::READ, SubjectType::Notification);
        assert!(builder
            .build()
            .can_type(Actions::READ, SubjectType::Notification));
    }

    #[test]
    fn test_ownership_condition() {
        let me = Uuid::new_v4();
        let mut builder = AbilityBuilder::new(Some(me));
        builder.can_own(Actions::READ, SubjectType::Notification);
        let ability = builder.build();

        assert!(ability.can(Actions::READ, &note_for(me)));
        assert!(!ability.can(Actions::READ, &note_for(Uuid::new_v4())));
        assert!(ability.can_type(Actions::READ, SubjectType::Notification));
    }

    #[test]
    fn test_conditional_deny_ignored_on_type_check() {
        let me = Uuid::new_v4();
        let mut builder = AbilityBuilder::new(Some(me));
        builder.can(Actions::DELETE, SubjectType::Session);
        builder.cannot_own(Actions::DELETE, SubjectType::Session);
        let ability = builder.build();

        assert!(ability.can_type(Actions::DELETE, SubjectType::Session));
        let mine = Session::new(me, chrono::Duration::hours(1), None, None);
        assert!(!ability.can(Actions::DELETE, &mine));
    }

    #[test]
    fn test_field_restrictions() {
        let me = Uuid::new_v4();
        let user = User {
            id: me,
            ..User::new("me@example.com".into(), None, None)
        };
        let mut builder = AbilityBuilder::new(Some(me));
        builder
            .can_own(Actions::UPDATE, SubjectType::User)
            .fields(&["name", "image"]);
        builder
            .cannot(Actions::UPDATE, SubjectType::User)
            .fields(&["role"])
            .because("Only administrators can change roles");
        let ability = builder.build();

        assert!(ability.can(Actions::UPDATE, &user));
        assert!(ability.can_field(Actions::UPDATE, &user, "name"));
        assert!(!ability.can_field(Actions::UPDATE, &user, "email"));

        let err = ability
            .ensure_field(Actions::UPDATE, &user, "role")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PermissionDenied);
        assert_eq!(err.message, "Only administrators can change roles");
    }

    #[test]
    fn test_default_denial_message() {
        let ability = AbilityBuilder::new(None).build();
        let err = ability
            .ensure(Actions::DELETE, &note_for(Uuid::new_v4()))
            .unwrap_err();
        assert_eq!(err.message, "You are not allowed to delete notification");
    }
}
