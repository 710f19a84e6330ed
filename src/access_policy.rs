//! 资源可见性策略。
//!
//! 普通请求者只能看到已审核且公开、并且访问级别对其开放的资源；
//! 上传者总能看到自己的资源，教师不受审核/公开状态限制，管理员不受任何限制。
//! `can_view` 与 `visibility_condition` 表达的是同一条规则，
//! 前者用于单条记录，后者在查询时下推到数据库。

use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::models::entity::{resources, users};
use crate::models::{AccessLevel, Role};

/// 已由身份服务解析过的请求者
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requester {
    pub user_id: Option<i32>,
    pub role: Option<Role>,
    pub is_premium: bool,
}

impl Requester {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_id: i32, role: Role, is_premium: bool) -> Self {
        Self {
            user_id: Some(user_id),
            role: Some(role),
            is_premium,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    pub fn is_elevated(&self) -> bool {
        self.role.map_or(false, |role| role.is_elevated())
    }

    pub fn is_owner_of(&self, resource: &resources::Model) -> bool {
        self.user_id == Some(resource.uploaded_by)
    }
}

impl From<&users::Model> for Requester {
    fn from(user: &users::Model) -> Self {
        Self {
            user_id: Some(user.id),
            role: Role::from_str(&user.role).ok(),
            is_premium: user.is_premium,
        }
    }
}

/// 某一访问级别面向的受众
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Everyone,
    Authenticated,
    Roles(Vec<Role>),
    Premium,
}

impl Audience {
    pub fn admits(&self, requester: &Requester) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::Authenticated => requester.is_authenticated(),
            Audience::Roles(roles) => requester.role.map_or(false, |role| roles.contains(&role)),
            Audience::Premium => requester.is_authenticated() && requester.is_premium,
        }
    }
}

/// 访问级别 → 受众 的策略表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    rules: BTreeMap<AccessLevel, Audience>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        let rules = BTreeMap::from([
            (AccessLevel::Public, Audience::Everyone),
            (AccessLevel::StudentsOnly, Audience::Authenticated),
            (AccessLevel::TutorsOnly, Audience::Roles(vec![Role::Tutor, Role::Admin])),
            (AccessLevel::Premium, Audience::Premium),
        ]);
        Self { rules }
    }
}

impl AccessPolicy {
    /// 用 JSON 覆盖默认策略表中的条目，例如
    /// `{"premium": "authenticated", "tutors_only": {"roles": ["admin"]}}`
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let overrides: BTreeMap<AccessLevel, Audience> = serde_json::from_str(json)?;
        let mut policy = Self::default();
        policy.rules.extend(overrides);
        Ok(policy)
    }

    pub fn with_rule(mut self, level: AccessLevel, audience: Audience) -> Self {
        self.rules.insert(level, audience);
        self
    }

    pub fn audience(&self, level: AccessLevel) -> Option<&Audience> {
        self.rules.get(&level)
    }

    /// 表中没有的级别只对管理员开放
    pub fn allows_level(&self, level: AccessLevel, requester: &Requester) -> bool {
        if requester.is_admin() {
            return true;
        }
        self.rules
            .get(&level)
            .map_or(false, |audience| audience.admits(requester))
    }

    pub fn visible_levels(&self, requester: &Requester) -> Vec<AccessLevel> {
        AccessLevel::ALL
            .iter()
            .copied()
            .filter(|level| self.allows_level(*level, requester))
            .collect()
    }

    pub fn can_view(&self, resource: &resources::Model, requester: &Requester) -> bool {
        if requester.is_admin() || requester.is_owner_of(resource) {
            return true;
        }
        let Ok(level) = AccessLevel::from_str(&resource.access_level) else {
            return false;
        };
        if !self.allows_level(level, requester) {
            return false;
        }
        requester.is_elevated() || (resource.is_approved && resource.is_public)
    }

    /// 与 `can_view` 等价的查询条件
    pub fn visibility_condition(&self, requester: &Requester) -> Condition {
        if requester.is_admin() {
            return Condition::all();
        }

        let levels: Vec<&'static str> = self
            .visible_levels(requester)
            .iter()
            .map(|level| level.as_str())
            .collect();

        let mut condition = Condition::any();
        let mut branches = 0;
        if !levels.is_empty() {
            let level_in = resources::Column::AccessLevel.is_in(levels);
            condition = if requester.is_elevated() {
                condition.add(level_in)
            } else {
                condition.add(
                    Condition::all()
                        .add(resources::Column::IsApproved.eq(true))
                        .add(resources::Column::IsPublic.eq(true))
                        .add(level_in),
                )
            };
            branches += 1;
        }
        if let Some(user_id) = requester.user_id {
            condition = condition.add(resources::Column::UploadedBy.eq(user_id));
            branches += 1;
        }
        if branches == 0 {
            // 没有任何可见分支时匹配空集
            condition = condition.add(Expr::val(1).eq(0));
        }
        condition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn resource(uploaded_by: i32, approved: bool, public: bool, level: AccessLevel) -> resources::Model {
        let now = Utc::now();
        resources::Model {
            id: 7,
            title: "Algebra Notes".into(),
            description: "Chapter 3 notes on quadratics".into(),
            file_url: "https://cdn.example.com/algebra.pdf".into(),
            file_type: "pdf".into(),
            file_size: 500_000,
            category: "lecture_notes".into(),
            subject: "Math".into(),
            grade_level: None,
            uploaded_by,
            tags: serde_json::json!([]),
            download_count: 0,
            is_approved: approved,
            approved_by: None,
            is_public: public,
            access_level: level.as_str().into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn default_table_matches_audiences() {
        let policy = AccessPolicy::default();
        let anonymous = Requester::anonymous();
        let student = Requester::user(2, Role::Student, false);
        let premium_student = Requester::user(3, Role::Student, true);
        let tutor = Requester::user(4, Role::Tutor, false);

        assert_eq!(policy.visible_levels(&anonymous), vec![AccessLevel::Public]);
        assert_eq!(
            policy.visible_levels(&student),
            vec![AccessLevel::Public, AccessLevel::StudentsOnly]
        );
        assert!(policy.allows_level(AccessLevel::Premium, &premium_student));
        assert!(!policy.allows_level(AccessLevel::TutorsOnly, &premium_student));
        assert!(policy.allows_level(AccessLevel::TutorsOnly, &tutor));
        assert!(!policy.allows_level(AccessLevel::Premium, &tutor));
    }

    #[test]
    fn unapproved_hidden_from_ordinary_requesters() {
        let policy = AccessPolicy::default();
        let pending = resource(1, false, true, AccessLevel::Public);
        assert!(!policy.can_view(&pending, &Requester::anonymous()));
        assert!(!policy.can_view(&pending, &Requester::user(2, Role::Student, true)));
        assert!(policy.can_view(&pending, &Requester::user(1, Role::Tutor, false)));
        assert!(policy.can_view(&pending, &Requester::user(4, Role::Tutor, false)));
        assert!(policy.can_view(&pending, &Requester::user(9, Role::Admin, false)));
    }

    #[test]
    fn private_resources_need_standing() {
        let policy = AccessPolicy::default();
        let private = resource(1, true, false, AccessLevel::Public);
        assert!(!policy.can_view(&private, &Requester::anonymous()));
        assert!(!policy.can_view(&private, &Requester::user(2, Role::Student, false)));
        assert!(policy.can_view(&private, &Requester::user(1, Role::Student, false)));
    }

    #[test]
    fn access_level_applies_to_tutors_but_not_owner() {
        let policy = AccessPolicy::default();
        let premium = resource(1, true, true, AccessLevel::Premium);
        assert!(!policy.can_view(&premium, &Requester::user(4, Role::Tutor, false)));
        assert!(policy.can_view(&premium, &Requester::user(4, Role::Tutor, true)));
        assert!(policy.can_view(&premium, &Requester::user(1, Role::Tutor, false)));
        assert!(!policy.can_view(&premium, &Requester::anonymous()));
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let policy = AccessPolicy::from_json(r#"{"premium": "authenticated", "tutors_only": {"roles": ["admin"]}}"#)
            .unwrap();
        let student = Requester::user(2, Role::Student, false);
        let tutor = Requester::user(4, Role::Tutor, false);
        assert!(policy.allows_level(AccessLevel::Premium, &student));
        assert!(!policy.allows_level(AccessLevel::TutorsOnly, &tutor));
        assert_eq!(policy.audience(AccessLevel::Public), Some(&Audience::Everyone));
        assert!(AccessPolicy::from_json("[1, 2]").is_err());
    }

    #[test]
    fn requester_from_user_record() {
        let now = Utc::now();
        let user = users::Model {
            id: 5,
            name: "Grace".into(),
            email: "grace@example.com".into(),
            role: "admin".into(),
            is_premium: false,
            created_at: now,
            updated_at: now,
        };
        let requester = Requester::from(&user);
        assert!(requester.is_admin());
        assert!(requester.is_elevated());
        assert_eq!(requester.user_id, Some(5));
    }
}
