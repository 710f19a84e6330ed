//! 资源与用户的显式校验。
//!
//! 每个写操作（创建、更新）在落库前都同步调用这里的函数，返回
//! 字段 → 违规信息的映射；持久化的记录因此总是满足全部约束。

use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::ValidationErrors;
use crate::models::entity::resources;
use crate::models::{
    AccessLevel, Category, CreateResourceRequest, CreateUserRequest, FileType, GradeLevel, Role,
    UpdateResourceRequest,
};

pub const TITLE_MIN: usize = 3;
pub const TITLE_MAX: usize = 200;
pub const DESCRIPTION_MIN: usize = 10;
pub const DESCRIPTION_MAX: usize = 1000;
pub const SUBJECT_MAX: usize = 100;
pub const TAG_MAX: usize = 50;
pub const FILE_SIZE_MIN: i64 = 1;
// 100 MB
pub const FILE_SIZE_MAX: i64 = 100 * 1024 * 1024;
pub const USER_NAME_MIN: usize = 2;
pub const USER_NAME_MAX: usize = 50;

// scheme://host.tld/...
static FILE_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}(:\d{1,5})?(/\S*)?$")
        .expect("file url regex is valid")
});

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

/// 通过校验的新资源
#[derive(Debug, Clone, PartialEq)]
pub struct NewResource {
    pub title: String,
    pub description: String,
    pub file_url: String,
    pub file_type: FileType,
    pub file_size: i64,
    pub category: Category,
    pub subject: String,
    pub grade_level: Option<GradeLevel>,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub access_level: AccessLevel,
}

/// 通过校验的部分更新，`None` 表示该字段不变；`grade_level` 为 `Some(None)` 时清除年级
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_url: Option<String>,
    pub file_type: Option<FileType>,
    pub file_size: Option<i64>,
    pub category: Option<Category>,
    pub subject: Option<String>,
    pub grade_level: Option<Option<GradeLevel>>,
    pub tags: Option<Vec<String>>,
    pub is_public: Option<bool>,
    pub access_level: Option<AccessLevel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_premium: bool,
}

pub fn validate_new_resource(input: &CreateResourceRequest) -> Result<NewResource, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let title = required_text(&mut errors, "title", "Title", input.title.as_deref(), TITLE_MIN, TITLE_MAX);
    let description = required_text(
        &mut errors,
        "description",
        "Description",
        input.description.as_deref(),
        DESCRIPTION_MIN,
        DESCRIPTION_MAX,
    );
    let file_url = match input.file_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => check_file_url(&mut errors, url),
        _ => {
            errors.add("file_url", "File URL is required");
            None
        }
    };
    let file_type = required_enum::<FileType>(&mut errors, "file_type", "File type", input.file_type.as_deref());
    let file_size = match input.file_size {
        Some(size) => check_file_size(&mut errors, size),
        None => {
            errors.add("file_size", "File size is required");
            None
        }
    };
    let category = required_enum::<Category>(&mut errors, "category", "Category", input.category.as_deref());
    let subject = required_text(&mut errors, "subject", "Subject", input.subject.as_deref(), 1, SUBJECT_MAX);
    let grade_level = optional_enum::<GradeLevel>(&mut errors, "grade_level", "Grade level", input.grade_level.as_deref());
    let tags = check_tags(&mut errors, &input.tags);
    let access_level =
        optional_enum::<AccessLevel>(&mut errors, "access_level", "Access level", input.access_level.as_deref());

    if let (Some(url), Some(file_type)) = (&file_url, file_type) {
        if !url_matches_file_type(url, file_type) {
            errors.add("file_url", extension_mismatch_message(file_type));
        }
    }

    match (title, description, file_url, file_type, file_size, category, subject, tags) {
        (
            Some(title),
            Some(description),
            Some(file_url),
            Some(file_type),
            Some(file_size),
            Some(category),
            Some(subject),
            Some(tags),
        ) if errors.is_empty() => Ok(NewResource {
            title,
            description,
            file_url,
            file_type,
            file_size,
            category,
            subject,
            grade_level,
            tags,
            is_public: input.is_public.unwrap_or(true),
            access_level: access_level.unwrap_or_default(),
        }),
        _ => Err(errors),
    }
}

/// 只校验出现的字段；file_url 或 file_type 变化时，用合并后的值复查扩展名一致性
pub fn validate_resource_patch(
    current: &resources::Model,
    input: &UpdateResourceRequest,
) -> Result<ResourcePatch, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut patch = ResourcePatch::default();

    if let Some(title) = input.title.as_deref() {
        patch.title = required_text(&mut errors, "title", "Title", Some(title), TITLE_MIN, TITLE_MAX);
    }
    if let Some(description) = input.description.as_deref() {
        patch.description = required_text(
            &mut errors,
            "description",
            "Description",
            Some(description),
            DESCRIPTION_MIN,
            DESCRIPTION_MAX,
        );
    }
    if let Some(url) = input.file_url.as_deref().map(str::trim) {
        if url.is_empty() {
            errors.add("file_url", "File URL is required");
        } else {
            patch.file_url = check_file_url(&mut errors, url);
        }
    }
    if let Some(file_type) = input.file_type.as_deref() {
        patch.file_type = required_enum::<FileType>(&mut errors, "file_type", "File type", Some(file_type));
    }
    if let Some(size) = input.file_size {
        patch.file_size = check_file_size(&mut errors, size);
    }
    if let Some(category) = input.category.as_deref() {
        patch.category = required_enum::<Category>(&mut errors, "category", "Category", Some(category));
    }
    if let Some(subject) = input.subject.as_deref() {
        patch.subject = required_text(&mut errors, "subject", "Subject", Some(subject), 1, SUBJECT_MAX);
    }
    if let Some(grade_level) = input.grade_level.as_deref() {
        let grade_level = grade_level.trim();
        // 空字符串表示清除
        patch.grade_level = if grade_level.is_empty() {
            Some(None)
        } else {
            parse_enum::<GradeLevel>(&mut errors, "grade_level", "Grade level", grade_level).map(Some)
        };
    }
    if let Some(tags) = &input.tags {
        patch.tags = check_tags(&mut errors, tags);
    }
    if let Some(access_level) = input.access_level.as_deref() {
        patch.access_level =
            optional_enum::<AccessLevel>(&mut errors, "access_level", "Access level", Some(access_level));
    }
    patch.is_public = input.is_public;

    let url_changed = patch.file_url.is_some();
    let type_changed = patch.file_type.is_some();
    if (url_changed || type_changed) && !errors.contains("file_url") && !errors.contains("file_type") {
        let url = patch.file_url.as_deref().unwrap_or(&current.file_url);
        let file_type = patch
            .file_type
            .or_else(|| FileType::from_str(&current.file_type).ok());
        match file_type {
            Some(file_type) if url_matches_file_type(url, file_type) => {}
            Some(file_type) => {
                let field = if url_changed { "file_url" } else { "file_type" };
                errors.add(field, extension_mismatch_message(file_type));
            }
            None => errors.add("file_type", "File type is required"),
        }
    }

    if errors.is_empty() {
        Ok(patch)
    } else {
        Err(errors)
    }
}

pub fn validate_new_user(input: &CreateUserRequest) -> Result<NewUser, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let name = required_text(&mut errors, "name", "Name", input.name.as_deref(), USER_NAME_MIN, USER_NAME_MAX);
    let email = match input.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => {
            if EMAIL_PATTERN.is_match(email) {
                Some(email.to_lowercase())
            } else {
                errors.add("email", "Please provide a valid email");
                None
            }
        }
        _ => {
            errors.add("email", "Email is required");
            None
        }
    };
    let role = optional_enum::<Role>(&mut errors, "role", "Role", input.role.as_deref());

    match (name, email) {
        (Some(name), Some(email)) if errors.is_empty() => Ok(NewUser {
            name,
            email,
            role: role.unwrap_or(Role::Student),
            is_premium: input.is_premium,
        }),
        _ => Err(errors),
    }
}

/// file_url 的路径中需要出现 `.<file_type>` 片段（忽略大小写）。
/// 片段之后不能紧跟字母或数字，`.doc` 不会匹配 `.docx`。
pub fn url_matches_file_type(url: &str, file_type: FileType) -> bool {
    let path = url_path(url).to_ascii_lowercase();
    let needle = format!(".{}", file_type.as_str());
    path.match_indices(&needle).any(|(index, _)| {
        path[index + needle.len()..]
            .chars()
            .next()
            .map_or(true, |next| !next.is_ascii_alphanumeric())
    })
}

// 去掉 scheme、host、query 与 fragment
fn url_path(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme
        .find('/')
        .map_or("", |index| &without_scheme[index..]);
    let end = path.find(|c: char| c == '?' || c == '#').unwrap_or(path.len());
    &path[..end]
}

fn extension_mismatch_message(file_type: FileType) -> String {
    format!("File URL must contain a .{} extension matching the file type", file_type)
}

fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    label: &str,
    value: Option<&str>,
    min: usize,
    max: usize,
) -> Option<String> {
    let value = match value.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => {
            errors.add(field, format!("{} is required", label));
            return None;
        }
    };
    let length = value.chars().count();
    if length < min {
        errors.add(field, format!("{} must be at least {} characters", label, min));
        None
    } else if length > max {
        errors.add(field, format!("{} cannot exceed {} characters", label, max));
        None
    } else {
        Some(value.to_string())
    }
}

fn required_enum<T: FromStr>(
    errors: &mut ValidationErrors,
    field: &str,
    label: &str,
    value: Option<&str>,
) -> Option<T> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => parse_enum(errors, field, label, value),
        _ => {
            errors.add(field, format!("{} is required", label));
            None
        }
    }
}

fn optional_enum<T: FromStr>(
    errors: &mut ValidationErrors,
    field: &str,
    label: &str,
    value: Option<&str>,
) -> Option<T> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => parse_enum(errors, field, label, value),
        _ => None,
    }
}

fn parse_enum<T: FromStr>(errors: &mut ValidationErrors, field: &str, label: &str, value: &str) -> Option<T> {
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            errors.add(field, format!("{} '{}' is not supported", label, value));
            None
        }
    }
}

fn check_file_url(errors: &mut ValidationErrors, url: &str) -> Option<String> {
    if FILE_URL_PATTERN.is_match(url) {
        Some(url.to_string())
    } else {
        errors.add("file_url", "Please provide a valid URL");
        None
    }
}

fn check_file_size(errors: &mut ValidationErrors, size: i64) -> Option<i64> {
    if size < FILE_SIZE_MIN {
        errors.add("file_size", format!("File size must be at least {} byte", FILE_SIZE_MIN));
        None
    } else if size > FILE_SIZE_MAX {
        errors.add("file_size", "File size cannot exceed 100MB");
        None
    } else {
        Some(size)
    }
}

fn check_tags(errors: &mut ValidationErrors, tags: &[String]) -> Option<Vec<String>> {
    let cleaned: Vec<String> = tags
        .iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect();
    if cleaned.iter().any(|tag| tag.chars().count() > TAG_MAX) {
        errors.add("tags", format!("Each tag cannot exceed {} characters", TAG_MAX));
        None
    } else {
        Some(cleaned)
    }
}
